use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Stable join key between geometry, per-feature data and metadata.
pub type FeatureId = String;

/// Time series of one feature: year -> timestamp-within-year -> statistics.
///
/// Insertion order of both levels is preserved; the timeline is built from it.
pub type FeatureSeries = IndexMap<String, IndexMap<String, StatBundle>>;

/// Base map tile layers the dashboard can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaseLayer {
    Grayscale,
    Streets,
    #[serde(alias = "Satelitte")]
    Satellite,
}

/// Resolved descriptor for one layer, as served next to its geometry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataIndex {
    #[serde(rename = "geoJSONUrl", alias = "geoJsonUrl")]
    pub geo_json_url: Option<String>,
    pub metadata_url_template: Option<String>,
    pub data_url_template: Option<String>,
    pub matrix_data_url: Option<String>,
    pub min_latitude: Option<f64>,
    pub max_latitude: Option<f64>,
    pub min_longitude: Option<f64>,
    pub max_longitude: Option<f64>,
}

impl DataIndex {
    /// Bounding box as `(min_lat, min_lon, max_lat, max_lon)` when all four are present.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        Some((
            self.min_latitude?,
            self.min_longitude?,
            self.max_latitude?,
            self.max_longitude?,
        ))
    }
}

/// GeoJSON feature collection. Geometry stays opaque; rendering is not ours.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Feature ids in document order. Features without an `id` property are skipped.
    pub fn feature_ids(&self) -> Vec<FeatureId> {
        self.features
            .iter()
            .filter_map(|f| f.properties.id.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub geometry: serde_json::Value,
    #[serde(default)]
    pub properties: FeatureProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureProperties {
    /// Geometry files carry ids as strings or as numbers; normalize to a string.
    #[serde(default, deserialize_with = "de_opt_id_from_string_or_number")]
    pub id: Option<FeatureId>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Serde helper: parse an optional id from a JSON string or number.
fn de_opt_id_from_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    struct IdVisitor;

    impl<'de> Visitor<'de> for IdVisitor {
        type Value = Option<String>;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "a string or number identifying a feature")
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(v.to_string()))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(v.to_string()))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.fract() == 0.0 && v.is_finite() {
                Ok(Some(format!("{}", v as i64)))
            } else {
                Ok(Some(v.to_string()))
            }
        }

        fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(s.to_string()))
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(IdVisitor)
}

/// Statistics for one feature at one (year, timestamp).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatBundle {
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    /// The scalar used for coloring.
    #[serde(default)]
    pub average: Option<f64>,
    #[serde(default)]
    pub value: Vec<f64>,
}

/// Per-feature data document. Served either bare or wrapped in `{"data": ...}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FeatureDataDoc {
    Wrapped { data: FeatureSeries },
    Bare(FeatureSeries),
}

impl FeatureDataDoc {
    pub fn into_series(self) -> FeatureSeries {
        match self {
            FeatureDataDoc::Wrapped { data } => data,
            FeatureDataDoc::Bare(series) => series,
        }
    }
}

/// A (year, timestamp) pair. Both are kept as the string keys used by the data documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeKey {
    pub year: String,
    pub timestamp: String,
}

impl TimeKey {
    pub fn new(year: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            year: year.into(),
            timestamp: timestamp.into(),
        }
    }
}

impl std::fmt::Display for TimeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.year, self.timestamp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    #[default]
    Shape,
    Matrix,
}

/// Rendering mode of a non-geographic (matrix) layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotMode {
    Scatter,
    Contour,
}

/// `thresholds` may be a single count or an explicit list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Thresholds {
    Count(u32),
    Values(Vec<f64>),
}

/// One discrete bucket as written in configuration: `[min, max, color, label?]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketSpec {
    pub min: f64,
    pub max: f64,
    pub color: String,
    pub label: Option<String>,
}

impl<'de> Deserialize<'de> for BucketSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, SeqAccess, Visitor};
        struct BucketVisitor;

        impl<'de> Visitor<'de> for BucketVisitor {
            type Value = BucketSpec;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "an array [min, max, color] or [min, max, color, label]")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let min = seq
                    .next_element::<f64>()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let max = seq
                    .next_element::<f64>()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                let color = seq
                    .next_element::<String>()?
                    .ok_or_else(|| de::Error::invalid_length(2, &self))?;
                let label = seq.next_element::<Option<String>>()?.flatten();
                if seq.next_element::<de::IgnoredAny>()?.is_some() {
                    return Err(de::Error::invalid_length(5, &self));
                }
                Ok(BucketSpec {
                    min,
                    max,
                    color,
                    label,
                })
            }
        }

        deserializer.deserialize_seq(BucketVisitor)
    }
}

/// A named statistical layer as configured by the dashboard descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayLayer {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: LayerKind,
    pub data_index_url: Option<String>,
    pub variable: Option<String>,
    pub granularity: Option<String>,
    pub color_map: Option<Vec<BucketSpec>>,
    pub value_color_pairs: Option<Vec<(f64, String)>>,
    pub thresholds: Option<Thresholds>,
    pub plot: Option<PlotMode>,
    pub point_radius: Option<f64>,
    pub color_scheme: Option<String>,
}

impl OverlayLayer {
    pub const DEFAULT_GRANULARITY: &'static str = "monthly";

    pub fn granularity(&self) -> &str {
        self.granularity
            .as_deref()
            .unwrap_or(Self::DEFAULT_GRANULARITY)
    }
}

/// One plugin placement: a registered name plus arbitrary per-plugin options.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PluginConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<PluginConfig>,
    #[serde(flatten)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl PluginConfig {
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(|v| v.as_str())
    }

    pub fn option_bool(&self, key: &str) -> Option<bool> {
        self.options.get(key).and_then(|v| v.as_bool())
    }

    pub fn option_strings(&self, key: &str) -> Vec<String> {
        self.options
            .get(key)
            .and_then(|v| v.as_array())
            .map(|a| {
                a.iter()
                    .filter_map(|s| s.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Entry of the plugin index document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginIndexEntry {
    pub tag_name: String,
    pub path: String,
    pub export_name: Option<String>,
    /// Host plugin this entry applies to.
    #[serde(rename = "for")]
    pub applies_to: Option<String>,
}

pub type PluginIndex = IndexMap<String, PluginIndexEntry>;
