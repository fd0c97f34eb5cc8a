//! Plugin registry: plugin name -> widget factory.
//!
//! Every plugin placement in a dashboard descriptor is checked against the registry
//! when the configuration is validated, so an unknown name fails early with
//! [`DashError::UnknownPlugin`] instead of at render time.

use crate::error::{DashError, DashResult};
use crate::models::{PluginConfig, PluginIndex};
use crate::widgets::{Legend, Longbar, Sidebar, TimeControl, Widget, longbar, sidebar};
use indexmap::IndexMap;
use log::warn;

pub type WidgetFactory = fn(&PluginConfig) -> DashResult<Box<dyn Widget>>;

#[derive(Debug, Clone, Default)]
pub struct Registry {
    widgets: IndexMap<String, WidgetFactory>,
    /// Host plugin -> names of nested sections it understands.
    sections: IndexMap<String, Vec<String>>,
}

impl Registry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in widgets: `TimeControl`, `Legend`, `Sidebar`, `Longbar`.
    pub fn builtin() -> Self {
        let mut r = Self::empty();
        r.register("TimeControl", time_control);
        r.register("Legend", legend);
        r.register("Sidebar", sidebar_panel);
        r.register("Longbar", longbar_panel);
        for s in sidebar::SECTIONS {
            r.register_section("Sidebar", *s);
        }
        for s in longbar::SECTIONS {
            r.register_section("Longbar", *s);
        }
        r
    }

    pub fn register(&mut self, name: impl Into<String>, factory: WidgetFactory) {
        self.widgets.insert(name.into(), factory);
    }

    pub fn register_section(&mut self, host: impl Into<String>, name: impl Into<String>) {
        self.sections.entry(host.into()).or_default().push(name.into());
    }

    pub fn knows(&self, name: &str) -> bool {
        self.widgets.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.widgets.keys().map(String::as_str)
    }

    /// Check every placement and its nested sections.
    pub fn validate(&self, plugins: &[PluginConfig]) -> DashResult<()> {
        for p in plugins {
            if !self.knows(&p.name) {
                return Err(DashError::UnknownPlugin(p.name.clone()));
            }
            let allowed = self.sections.get(&p.name);
            for nested in &p.plugins {
                let ok = allowed.is_some_and(|a| a.iter().any(|s| s == &nested.name));
                if !ok {
                    return Err(DashError::UnknownPlugin(format!("{}/{}", p.name, nested.name)));
                }
            }
        }
        Ok(())
    }

    pub fn instantiate(&self, config: &PluginConfig) -> DashResult<Box<dyn Widget>> {
        let factory = self
            .widgets
            .get(&config.name)
            .ok_or_else(|| DashError::UnknownPlugin(config.name.clone()))?;
        factory(config)
    }
}

fn time_control(c: &PluginConfig) -> DashResult<Box<dyn Widget>> {
    Ok(Box::new(TimeControl::new(c)))
}

fn legend(c: &PluginConfig) -> DashResult<Box<dyn Widget>> {
    Ok(Box::new(Legend::new(c)?))
}

fn sidebar_panel(c: &PluginConfig) -> DashResult<Box<dyn Widget>> {
    Ok(Box::new(Sidebar::new(c)))
}

fn longbar_panel(c: &PluginConfig) -> DashResult<Box<dyn Widget>> {
    Ok(Box::new(Longbar::new(c)))
}

/// Drop nested sections whose plugin index entry applies to a different host.
pub fn apply_index_filter(config: &PluginConfig, index: &PluginIndex) -> PluginConfig {
    let mut out = config.clone();
    out.plugins.retain(|nested| {
        match index.get(&nested.name).and_then(|e| e.applies_to.as_deref()) {
            Some(host) if host != config.name => {
                warn!(
                    "plugin `{}` applies to `{host}`, not `{}`; skipped",
                    nested.name, config.name
                );
                false
            }
            _ => true,
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PluginIndexEntry;
    use serde_json::json;

    fn cfg(v: serde_json::Value) -> PluginConfig {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn unknown_names_fail_validation() {
        let r = Registry::builtin();
        assert!(r.validate(&[cfg(json!({"name": "Legend"}))]).is_ok());
        assert!(matches!(
            r.validate(&[cfg(json!({"name": "Minimap"}))]),
            Err(DashError::UnknownPlugin(n)) if n == "Minimap"
        ));
        assert!(matches!(
            r.validate(&[cfg(json!({"name": "Sidebar", "plugins": [{"name": "LongbarLineChart"}]}))]),
            Err(DashError::UnknownPlugin(n)) if n == "Sidebar/LongbarLineChart"
        ));
    }

    #[test]
    fn index_filter_drops_foreign_sections() {
        let mut index = PluginIndex::new();
        index.insert(
            "SidebarLineChart".into(),
            PluginIndexEntry {
                tag_name: "vis-main-sidebar-line-chart".into(),
                path: "x.js".into(),
                export_name: None,
                applies_to: Some("Longbar".into()),
            },
        );
        let c = cfg(json!({"name": "Sidebar", "plugins": [
            {"name": "SidebarMetadata"}, {"name": "SidebarLineChart"}
        ]}));
        let filtered = apply_index_filter(&c, &index);
        assert_eq!(filtered.plugins.len(), 1);
        assert_eq!(filtered.plugins[0].name, "SidebarMetadata");
    }
}
