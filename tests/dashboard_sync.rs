mod common;

use geodash::color::PIN_PALETTE;
use geodash::selection::{DEFAULT_BORDER, HIGHLIGHT_BORDER};
use geodash::timeline::CursorState;
use geodash::widgets::{Legend, Longbar, Sidebar, TimeControl};
use geodash::{
    ControllerEvent, DashError, Dashboard, DashboardConfig, MemorySource, Registry, Slices, TimeKey,
    Widget, WidgetEvent,
};

fn loaded() -> Dashboard<MemorySource> {
    loaded_with(common::memory_source(), common::config())
}

fn loaded_with(src: MemorySource, config: DashboardConfig) -> Dashboard<MemorySource> {
    let mut dash = Dashboard::new(src, config, Registry::builtin()).unwrap();
    dash.load().unwrap();
    dash
}

fn fill(dash: &Dashboard<MemorySource>, layer: &str, id: &str) -> Option<String> {
    dash.feature_style(layer, id)
        .unwrap()
        .fill_color
        .map(|c| c.to_css())
}

#[test]
fn load_builds_timeline_from_first_layer_and_fills() {
    let dash = loaded();
    let ds = dash.dataset();
    assert_eq!(ds.layers.len(), 2);
    assert!(ds.failed.is_empty());
    assert_eq!(ds.skipped, vec!["Contour".to_string()]);
    assert_eq!(
        ds.layer("Sites").unwrap().bounds,
        Some((40.0, -112.0, 42.0, -110.0))
    );

    let entries: Vec<String> = dash
        .cursor()
        .timeline()
        .entries()
        .iter()
        .map(|k| k.to_string())
        .collect();
    assert_eq!(entries, vec!["2010/0", "2010/1", "2011/0"]);
    assert_eq!(dash.cursor().index(), Some(0));
    assert_eq!(dash.cursor().state(), CursorState::Ready);

    assert_eq!(fill(&dash, "Sites", "1").as_deref(), Some("#D8F3DC"));
    assert_eq!(fill(&dash, "Sites", "2").as_deref(), Some("#2D6A4F"));
    assert_eq!(fill(&dash, "Snow", "a").as_deref(), Some("#808080"));
    assert_eq!(fill(&dash, "Snow", "1").as_deref(), Some("#000000"));
}

#[test]
fn feature_without_data_is_rendered_as_no_data() {
    let dash = loaded();
    let sites = dash.dataset().layer("Sites").unwrap();
    assert_eq!(sites.feature_ids, vec!["1", "2", "3"]);
    assert!(!sites.data.contains("3"));
    assert_eq!(sites.degraded, vec!["3"]);
    assert!(dash.dataset().layer("Snow").unwrap().degraded.is_empty());
    assert!(sites.metadata.contains_key("3"));
    assert_eq!(fill(&dash, "Sites", "3"), None);

    let row = dash
        .frame()
        .into_iter()
        .find(|r| r.layer == "Sites" && r.feature_id == "3")
        .unwrap();
    assert_eq!(row.average, None);
    assert_eq!(row.fill_color, None);
}

#[test]
fn fills_follow_the_cursor() {
    let mut dash = loaded();
    assert_eq!(dash.seek(2).unwrap(), Slices::TIME);
    assert_eq!(dash.cursor().current(), Some(&TimeKey::new("2011", "0")));
    assert_eq!(fill(&dash, "Sites", "1").as_deref(), Some("#2D6A4F"));
    // no 2011 bundle for feature 2: the 2010 color must not linger
    assert_eq!(fill(&dash, "Sites", "2"), None);
    // 150 is past the last stop
    assert_eq!(fill(&dash, "Snow", "a").as_deref(), Some("#FFFFFF"));

    assert!(matches!(
        dash.seek(3),
        Err(DashError::InvalidSeekIndex { index: 3, len: 3 })
    ));
    assert_eq!(dash.cursor().index(), Some(2));
}

#[test]
fn selection_is_exclusive_across_layers() {
    let mut dash = loaded();
    assert_eq!(dash.click_feature("Sites", "1").unwrap(), Slices::SELECTION);
    assert_eq!(dash.styles().highlighted_count(), 1);
    assert_eq!(dash.feature_style("Sites", "1").unwrap().border_color, HIGHLIGHT_BORDER);

    dash.click_feature("Snow", "a").unwrap();
    assert_eq!(dash.styles().highlighted_count(), 1);
    assert_eq!(dash.feature_style("Sites", "1").unwrap().border_color, DEFAULT_BORDER);
    assert_eq!(dash.feature_style("Snow", "a").unwrap().border_color, HIGHLIGHT_BORDER);
    assert_eq!(dash.selection().unwrap().layer, "Snow");
    assert_eq!(
        dash.styles().layer("Snow").unwrap().draw_order().last().map(String::as_str),
        Some("a")
    );

    // sticky: clicking again keeps it
    dash.click_feature("Snow", "a").unwrap();
    assert_eq!(dash.selection().unwrap().id, "a");

    // selection survives time changes
    dash.seek(1).unwrap();
    assert!(dash.feature_style("Snow", "a").unwrap().is_highlighted());

    assert_eq!(dash.clear_selection(), Slices::SELECTION);
    assert_eq!(dash.styles().highlighted_count(), 0);
    assert_eq!(dash.clear_selection(), Slices::NONE);
}

#[test]
fn click_on_unknown_feature_keeps_selection() {
    let mut dash = loaded();
    dash.click_feature("Sites", "2").unwrap();
    assert_eq!(dash.click_feature("Sites", "99").unwrap(), Slices::NONE);
    assert_eq!(dash.click_feature("Nowhere", "1").unwrap(), Slices::NONE);
    assert_eq!(dash.selection().unwrap().id, "2");
}

#[test]
fn failed_layer_does_not_block_the_others() {
    let src = common::memory_source();
    src.remove("snow/index.json");
    let mut dash = loaded_with(src, common::config());

    let ds = dash.dataset();
    assert_eq!(ds.layers.len(), 1);
    assert_eq!(ds.failed.len(), 1);
    assert_eq!(ds.failed[0].layer, "Snow");
    assert_eq!(fill(&dash, "Sites", "2").as_deref(), Some("#2D6A4F"));
    assert_eq!(dash.click_feature("Snow", "a").unwrap(), Slices::NONE);
    assert_eq!(dash.frame().len(), 3);

    // the surviving layer keeps following time and selection
    assert_eq!(dash.seek(2).unwrap(), Slices::TIME);
    assert_eq!(fill(&dash, "Sites", "1").as_deref(), Some("#2D6A4F"));
    assert_eq!(fill(&dash, "Sites", "2"), None);
    assert_eq!(dash.click_feature("Sites", "1").unwrap(), Slices::SELECTION);
    assert_eq!(dash.feature_style("Sites", "1").unwrap().border_color, HIGHLIGHT_BORDER);
    assert_eq!(dash.styles().highlighted_count(), 1);
}

#[test]
fn missing_geometry_fails_only_that_layer() {
    let src = common::memory_source();
    src.remove("sites/geo.json");
    let dash = loaded_with(src, common::config());
    assert_eq!(dash.dataset().failed[0].layer, "Sites");
    // the timeline falls back to the next loaded layer
    assert_eq!(dash.cursor().timeline().len(), 2);
    assert_eq!(dash.dataset().timeline_layer(None).unwrap().name(), "Snow");
}

#[test]
fn failed_timeline_layer_falls_back_to_first_loaded() {
    let src = common::memory_source();
    src.remove("sites/index.json");
    let mut v = common::config_json();
    v["timelineLayer"] = "Sites".into();
    let dash = loaded_with(src, serde_json::from_value(v).unwrap());

    let ds = dash.dataset();
    assert_eq!(ds.timeline_layer(Some("Sites")).unwrap().name(), "Snow");
    let entries: Vec<String> = dash
        .cursor()
        .timeline()
        .entries()
        .iter()
        .map(|k| k.to_string())
        .collect();
    assert_eq!(entries, vec!["2010/0", "2011/0"]);
}

#[test]
fn declared_timeline_layer_and_initial_timestamp() {
    let mut v = common::config_json();
    v["timelineLayer"] = "Snow".into();
    let dash = loaded_with(common::memory_source(), serde_json::from_value(v).unwrap());
    assert_eq!(dash.cursor().timeline().len(), 2);

    let mut v = common::config_json();
    v["timestamp"] = serde_json::json!({"year": "2010", "timestamp": "1"});
    let dash = loaded_with(common::memory_source(), serde_json::from_value(v).unwrap());
    assert_eq!(dash.cursor().index(), Some(1));
}

#[test]
fn widgets_only_receive_changes_they_depend_on() {
    let mut dash = loaded();
    let pushes = |d: &Dashboard<MemorySource>| {
        (
            d.widget_of::<TimeControl>().unwrap().pushes(),
            d.widgets_of::<Legend>()[0].pushes(),
            d.widget_of::<Sidebar>().unwrap().pushes(),
            d.widget_of::<Longbar>().unwrap().pushes(),
        )
    };
    assert_eq!(pushes(&dash), (1, 1, 1, 1));

    dash.click_feature("Sites", "1").unwrap();
    assert_eq!(pushes(&dash), (1, 1, 2, 1));

    dash.seek(1).unwrap();
    assert_eq!(pushes(&dash), (2, 1, 3, 2));

    dash.set_steps_per_second(4.0).unwrap();
    assert_eq!(pushes(&dash), (3, 1, 3, 2));

    // nothing changed, nothing pushed
    dash.click_feature("Sites", "99").unwrap();
    assert_eq!(pushes(&dash), (3, 1, 3, 2));
}

#[test]
fn props_leave_out_slices_the_widget_ignores() {
    let mut dash = loaded();
    dash.click_feature("Sites", "1").unwrap();
    let props = dash.widget_of::<TimeControl>().unwrap().props().unwrap();
    assert!(props.dataset.is_none());
    assert!(props.selection.is_none());
    assert!(props.time.is_some());
    assert_eq!(props.key, "TimeControl#0");
}

#[test]
fn legends_render_from_the_matching_layer() {
    let dash = loaded();
    let legends = dash.widgets_of::<Legend>();
    let labels: Vec<&str> = legends[0].rows().iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["low", "high"]);
    assert!(dash.widget("Legend#1").unwrap().render().contains("[#D8F3DC] low"));

    // variable `nope` matches no layer
    assert!(legends[1].rows().is_empty());
    assert_eq!(dash.widget("Legend#2").unwrap().render(), "");
}

#[test]
fn time_control_drives_the_cursor_through_events() {
    let mut dash = loaded();
    let tc = dash.widget_of::<TimeControl>().unwrap();
    assert_eq!(tc.len(), 3);
    tc.slide_to(2).unwrap();
    assert!(tc.slide_to(3).is_err());
    assert_eq!(dash.pump(), 1);
    assert_eq!(dash.cursor().index(), Some(2));

    let tc = dash.widget_of::<TimeControl>().unwrap();
    assert_eq!(tc.position(), Some(2));
    assert!(tc.render().contains("Year: 2011, Timestamp: 0 (January)"));

    tc.set_interval(0.01).unwrap();
    tc.press_play().unwrap();
    dash.pump();
    assert_eq!(dash.cursor().state(), CursorState::Playing);
    assert!(dash.widget_of::<TimeControl>().unwrap().is_playing());

    dash.widget_of::<TimeControl>().unwrap().press_pause().unwrap();
    dash.pump();
    assert_eq!(dash.cursor().state(), CursorState::Ready);
}

#[test]
fn widgets_may_only_raise_their_own_events() {
    let mut dash = loaded();
    assert!(matches!(
        dash.apply("Legend#1", WidgetEvent::TimeChanged { index: 1 }),
        Err(DashError::EventNotAllowed { .. })
    ));
    assert!(matches!(
        dash.apply("map", WidgetEvent::SelectionCleared),
        Err(DashError::EventNotAllowed { .. })
    ));
    assert!(dash.apply("Ghost#9", WidgetEvent::SelectionCleared).is_err());
    assert_eq!(dash.cursor().index(), Some(0));

    // a rejected event in the queue is logged and skipped
    let tx = dash.sender();
    tx.send(ControllerEvent::Widget {
        source: "Legend#1".into(),
        event: WidgetEvent::TimeChanged { index: 1 },
    })
    .unwrap();
    assert_eq!(dash.pump(), 1);
    assert_eq!(dash.cursor().index(), Some(0));
}

#[test]
fn sidebar_selects_by_id_and_shows_details() {
    let mut dash = loaded();
    let sidebar = dash.widget_of::<Sidebar>().unwrap();
    assert_eq!(sidebar.sections().len(), 2);

    // `1` is rendered by both layers; the first configured one wins
    sidebar.select_id("1").unwrap();
    dash.pump();
    assert_eq!(dash.selection().unwrap().layer, "Sites");

    let text = dash.widget_of::<Sidebar>().unwrap().render();
    assert!(text.contains("Selected: Sites / 1"));
    assert!(text.contains("Layer range at 2010/0: 10 to 55"));
    assert!(text.contains("Site One"));
    assert!(text.contains("## Trend"));
    assert!(text.contains("na: now=10 mean=50"));
    assert!(text.contains("swe: now=0"));

    dash.widget_of::<Sidebar>().unwrap().select_id("a").unwrap();
    dash.pump();
    assert_eq!(dash.selection().unwrap().layer, "Snow");

    dash.widget_of::<Sidebar>().unwrap().close().unwrap();
    dash.pump();
    assert!(dash.selection().is_none());
    assert!(dash.widget_of::<Sidebar>().unwrap().render().contains("No selection"));
}

#[test]
fn pins_get_palette_colors_and_reach_the_longbar() {
    let mut dash = loaded();
    dash.click_feature("Sites", "1").unwrap();
    dash.widget_of::<Sidebar>().unwrap().toggle_pin().unwrap();
    dash.pump();
    assert_eq!(dash.pins().len(), 1);
    assert_eq!(dash.pins()[0].color, PIN_PALETTE[0]);

    let longbar = dash.widget_of::<Longbar>().unwrap();
    assert_eq!(longbar.pin_count(), 1);
    assert!(longbar.render().contains("[#4472C4] Sites / 1"));
    assert!(dash.widget_of::<Sidebar>().unwrap().render().contains("(pinned)"));

    dash.click_feature("Sites", "2").unwrap();
    dash.widget_of::<Sidebar>().unwrap().toggle_pin().unwrap();
    dash.pump();
    assert_eq!(dash.pins()[1].color, PIN_PALETTE[1]);

    dash.widget_of::<Longbar>().unwrap().unpin("Sites", "1").unwrap();
    dash.pump();
    assert_eq!(dash.pins().len(), 1);
    assert_eq!(dash.widget_of::<Longbar>().unwrap().pin_count(), 1);
}

#[test]
fn pins_only_toggle_rendered_features() {
    let mut dash = loaded();
    // nothing selected: the sidebar has nothing to pin
    dash.widget_of::<Sidebar>().unwrap().toggle_pin().unwrap();
    assert_eq!(dash.pump(), 0);
    // nothing pinned: unpin sends nothing
    dash.widget_of::<Longbar>().unwrap().unpin("Sites", "1").unwrap();
    assert_eq!(dash.pump(), 0);
    assert!(dash.pins().is_empty());

    let ghost = WidgetEvent::PinToggled {
        layer: "Ghost".into(),
        id: "zzz".into(),
    };
    assert_eq!(dash.apply("Longbar#4", ghost).unwrap(), Slices::NONE);
    let missing = WidgetEvent::PinToggled {
        layer: "Sites".into(),
        id: "99".into(),
    };
    assert_eq!(dash.apply("Sidebar#3", missing).unwrap(), Slices::NONE);
    assert!(dash.pins().is_empty());
    assert_eq!(dash.widget_of::<Longbar>().unwrap().pin_count(), 0);

    let real = WidgetEvent::PinToggled {
        layer: "Snow".into(),
        id: "a".into(),
    };
    assert_eq!(dash.apply("Longbar#4", real).unwrap(), Slices::PINS);
    assert!(dash.widget_of::<Longbar>().unwrap().is_pinned("Snow", "a"));
}

#[test]
fn manual_ticks_wrap_around() {
    let mut dash = loaded();
    dash.set_steps_per_second(0.01).unwrap();
    assert_eq!(dash.tick(), Slices::NONE);
    dash.play();
    for _ in 0..3 {
        assert_eq!(dash.tick(), Slices::TIME);
    }
    assert_eq!(dash.cursor().index(), Some(0));
    dash.pause();
}

#[test]
fn ticks_from_a_stopped_timer_are_ignored() {
    let mut dash = loaded();
    dash.set_steps_per_second(0.01).unwrap();
    dash.play();
    let old = dash.cursor().timer_generation().unwrap();
    dash.pause();
    dash.play();
    let current = dash.cursor().timer_generation().unwrap();
    assert_ne!(old, current);

    let tx = dash.sender();
    tx.send(ControllerEvent::Tick(old)).unwrap();
    dash.pump();
    assert_eq!(dash.cursor().index(), Some(0));

    tx.send(ControllerEvent::Tick(current)).unwrap();
    dash.pump();
    assert_eq!(dash.cursor().index(), Some(1));
    dash.pause();
}

#[test]
fn timer_advances_playback_in_the_event_loop() {
    let mut dash = loaded();
    dash.set_steps_per_second(50.0).unwrap();
    dash.play();
    let before = dash.widget_of::<TimeControl>().unwrap().pushes();
    dash.run_for(std::time::Duration::from_millis(400)).unwrap();
    dash.pause();
    assert!(dash.widget_of::<TimeControl>().unwrap().pushes() > before);
}

#[test]
fn shutdown_ends_the_event_loop() {
    let mut dash = loaded();
    let tx = dash.sender();
    let feeder = std::thread::spawn(move || {
        tx.send(ControllerEvent::Widget {
            source: "map".into(),
            event: WidgetEvent::FeatureClicked {
                layer: Some("Snow".into()),
                id: "a".into(),
            },
        })
        .unwrap();
        tx.send(ControllerEvent::Shutdown).unwrap();
    });
    dash.run().unwrap();
    feeder.join().unwrap();
    assert_eq!(dash.selection().unwrap().id, "a");
}

#[test]
fn unknown_plugin_is_rejected_before_loading() {
    let mut v = common::config_json();
    v["plugins"][0]["name"] = "Minimap".into();
    let config: DashboardConfig = serde_json::from_value(v).unwrap();
    assert!(matches!(
        Dashboard::new(common::memory_source(), config, Registry::builtin()),
        Err(DashError::UnknownPlugin(n)) if n == "Minimap"
    ));
}

#[test]
fn mounted_widget_keys_follow_configuration_order() {
    let dash = loaded();
    let keys: Vec<(&str, &str)> = dash.widgets().map(|(k, w)| (k, w.plugin())).collect();
    assert_eq!(
        keys,
        vec![
            ("TimeControl#0", "TimeControl"),
            ("Legend#1", "Legend"),
            ("Legend#2", "Legend"),
            ("Sidebar#3", "Sidebar"),
            ("Longbar#4", "Longbar"),
        ]
    );
}
