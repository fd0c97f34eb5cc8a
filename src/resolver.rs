//! Data Index Resolver: layer index URL -> geometry, per-feature data and metadata.
//!
//! Fetches run sequentially inside one layer. Index and geometry failures are fatal
//! for the layer; a failed per-feature data or metadata fetch only leaves that
//! feature out of the store.

use crate::api::{JsonSource, encode_segment};
use crate::error::{DashError, DashResult};
use crate::models::{DataIndex, FeatureCollection, FeatureDataDoc, FeatureId, OverlayLayer};
use crate::store::{LayerDataStore, LayerMetadata};
use log::{info, warn};

/// Everything fetched for one overlay layer.
#[derive(Debug, Clone)]
pub struct ResolvedLayer {
    pub index: DataIndex,
    pub geometry: FeatureCollection,
    /// Feature ids in geometry order.
    pub feature_ids: Vec<FeatureId>,
    pub data: LayerDataStore,
    pub metadata: LayerMetadata,
    /// Features whose data or metadata could not be fetched.
    pub degraded: Vec<FeatureId>,
}

/// Directory of an index path: every segment but the last, with a trailing `/`.
/// A bare file name has an empty directory.
pub fn index_directory(index_url: &str) -> String {
    match index_url.rfind('/') {
        Some(pos) => index_url[..=pos].to_string(),
        None => String::new(),
    }
}

/// Substitute `{VARIABLE}`, `{GRANULARITY}` and `{ID}` into a URL template.
pub fn expand_template(template: &str, variable: &str, granularity: &str, id: &str) -> String {
    template
        .replace("{VARIABLE}", &encode_segment(variable))
        .replace("{GRANULARITY}", &encode_segment(granularity))
        .replace("{ID}", &encode_segment(id))
}

/// Resolve one shape layer against `source`.
pub fn resolve_layer<S: JsonSource + ?Sized>(source: &S, layer: &OverlayLayer) -> DashResult<ResolvedLayer> {
    let index_url = layer
        .data_index_url
        .as_deref()
        .ok_or_else(|| DashError::InvalidConfig(format!("layer `{}` has no dataIndexUrl", layer.name)))?;

    let index: DataIndex = serde_json::from_value(source.get_json(index_url)?)
        .map_err(|e| DashError::decode(index_url, e))?;
    let missing = |field| DashError::InvalidIndex {
        url: index_url.to_string(),
        field,
    };
    let geo_url = index.geo_json_url.as_deref().ok_or_else(|| missing("geoJSONUrl"))?;
    let data_tpl = index
        .data_url_template
        .as_deref()
        .ok_or_else(|| missing("dataUrlTemplate"))?;
    let meta_tpl = index
        .metadata_url_template
        .as_deref()
        .ok_or_else(|| missing("metadataUrlTemplate"))?;

    let dir = index_directory(index_url);
    let geometry_path = format!("{dir}{geo_url}");
    let geometry: FeatureCollection = serde_json::from_value(source.get_json(&geometry_path)?)
        .map_err(|e| DashError::decode(geometry_path.clone(), e))?;
    let feature_ids = geometry.feature_ids();
    if feature_ids.len() < geometry.features.len() {
        warn!(
            "layer `{}`: {} geometry features carry no id and cannot be joined",
            layer.name,
            geometry.features.len() - feature_ids.len()
        );
    }

    let variable = layer.variable.as_deref().unwrap_or_default();
    let granularity = layer.granularity();
    let mut data = LayerDataStore::new();
    let mut metadata = LayerMetadata::default();
    let mut degraded = Vec::new();

    for id in &feature_ids {
        let data_path = format!("{dir}{}", expand_template(data_tpl, variable, granularity, id));
        let fetched = source.get_json(&data_path).and_then(|v| {
            serde_json::from_value::<FeatureDataDoc>(v).map_err(|e| DashError::decode(data_path.clone(), e))
        });
        let mut ok = true;
        match fetched {
            Ok(doc) => data.insert(id.clone(), doc.into_series()),
            Err(e) => {
                warn!("layer `{}`: no data for feature {id}: {e}", layer.name);
                ok = false;
            }
        }

        let meta_path = format!("{dir}{}", expand_template(meta_tpl, variable, granularity, id));
        match source.get_json(&meta_path) {
            Ok(doc) => {
                metadata.insert(id.clone(), doc);
            }
            Err(e) => {
                warn!("layer `{}`: no metadata for feature {id}: {e}", layer.name);
                ok = false;
            }
        }
        if !ok {
            degraded.push(id.clone());
        }
    }

    info!(
        "layer `{}` resolved: {} features, {} with data, {} degraded",
        layer.name,
        feature_ids.len(),
        data.len(),
        degraded.len()
    );

    Ok(ResolvedLayer {
        index,
        geometry,
        feature_ids,
        data,
        metadata,
        degraded,
    })
}
