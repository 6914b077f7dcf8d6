// Observations and component metadata: the only input the pipeline consumes

use anyhow::{anyhow, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

static NULL_VALUE: ObservationValue = ObservationValue::Null;

/// A single cell of an observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObservationValue {
    Number(f64),
    String(String),
    Null,
}

impl ObservationValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ObservationValue::Null)
    }

    /// Numeric reading of the cell. Null reads as `None`; a string that does
    /// not parse reads as `NaN`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ObservationValue::Number(n) => Some(*n),
            ObservationValue::String(s) => Some(s.trim().parse::<f64>().unwrap_or(f64::NAN)),
            ObservationValue::Null => None,
        }
    }

    /// Raw string form of the cell (empty for null)
    pub fn as_string(&self) -> String {
        match self {
            ObservationValue::Number(n) => n.to_string(),
            ObservationValue::String(s) => s.clone(),
            ObservationValue::Null => String::new(),
        }
    }
}

impl fmt::Display for ObservationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObservationValue::Number(n) => write!(f, "{}", n),
            ObservationValue::String(s) => f.write_str(s),
            ObservationValue::Null => f.write_str("null"),
        }
    }
}

impl Hash for ObservationValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            ObservationValue::Number(n) => {
                0u8.hash(state);
                n.to_bits().hash(state);
            }
            ObservationValue::String(s) => {
                1u8.hash(state);
                s.hash(state);
            }
            ObservationValue::Null => 2u8.hash(state),
        }
    }
}

impl From<f64> for ObservationValue {
    fn from(value: f64) -> Self {
        ObservationValue::Number(value)
    }
}

impl From<Option<f64>> for ObservationValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(ObservationValue::Null, ObservationValue::Number)
    }
}

impl From<&str> for ObservationValue {
    fn from(value: &str) -> Self {
        ObservationValue::String(value.to_string())
    }
}

impl From<String> for ObservationValue {
    fn from(value: String) -> Self {
        ObservationValue::String(value)
    }
}

/// One flat data row keyed by component identifier.
///
/// Key order is irrelevant for lookups but preserved for output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Observation(IndexMap<String, ObservationValue>);

impl Observation {
    pub fn new() -> Self {
        Observation(IndexMap::new())
    }

    /// Builder-style insert, mostly for fixtures
    pub fn with(mut self, key: &str, value: impl Into<ObservationValue>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Value for `key`; absent keys read as null
    pub fn get(&self, key: &str) -> &ObservationValue {
        self.0.get(key).unwrap_or(&NULL_VALUE)
    }

    pub fn insert(&mut self, key: String, value: ObservationValue) {
        self.0.insert(key, value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ObservationValue)> {
        self.0.iter()
    }
}

/// Hashes entries sorted by key, matching the order-insensitive equality
impl Hash for Observation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut entries: Vec<(&String, &ObservationValue)> = self.0.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        self.0.len().hash(state);
        for (key, value) in entries {
            key.hash(state);
            value.hash(state);
        }
    }
}

impl FromIterator<(String, ObservationValue)> for Observation {
    fn from_iter<I: IntoIterator<Item = (String, ObservationValue)>>(iter: I) -> Self {
        Observation(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Dimension,
    Measure,
}

/// Variant tag of a component. Dimensions use everything but `Numerical`;
/// measures use `Numerical` or `Ordinal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentVariant {
    Nominal,
    Ordinal,
    Temporal,
    TemporalEntity,
    TemporalOrdinal,
    GeoCoordinates,
    GeoShapes,
    Numerical,
}

impl ComponentVariant {
    /// Whether values of this variant are points in time
    pub fn is_temporal(&self) -> bool {
        matches!(self, ComponentVariant::Temporal | ComponentVariant::TemporalEntity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScaleType {
    Nominal,
    Ordinal,
    Interval,
    Ratio,
}

/// Declared display position of a dimension value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Position {
    Number(f64),
    Text(String),
}

impl Position {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Position::Number(n) => Some(*n),
            Position::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            Position::Number(n) => n.to_string(),
            Position::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionValue {
    pub value: String,
    pub label: String,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub alternate_name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl DimensionValue {
    pub fn new(value: &str, label: &str) -> Self {
        DimensionValue {
            value: value.to_string(),
            label: label.to_string(),
            position: None,
            identifier: None,
            alternate_name: None,
            color: None,
        }
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_identifier(mut self, identifier: &str) -> Self {
        self.identifier = Some(identifier.to_string());
        self
    }

    pub fn with_alternate_name(mut self, name: &str) -> Self {
        self.alternate_name = Some(name.to_string());
        self
    }
}

/// Ids of the measures carrying the lower and upper uncertainty bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBounds {
    pub lower: String,
    pub upper: String,
}

/// Metadata describing one column of the dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub id: String,
    pub label: String,
    pub kind: ComponentKind,
    pub variant: ComponentVariant,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub scale_type: Option<ScaleType>,
    /// strftime-style format of temporal values, e.g. `%Y-%m-%d`
    #[serde(default)]
    pub time_format: Option<String>,
    #[serde(default)]
    pub values: Vec<DimensionValue>,
    #[serde(default)]
    pub error_bounds: Option<ErrorBounds>,
}

impl Component {
    pub fn dimension(id: &str, variant: ComponentVariant) -> Self {
        Component {
            id: id.to_string(),
            label: id.to_string(),
            kind: ComponentKind::Dimension,
            variant,
            unit: None,
            scale_type: None,
            time_format: None,
            values: Vec::new(),
            error_bounds: None,
        }
    }

    pub fn measure(id: &str) -> Self {
        Component {
            kind: ComponentKind::Measure,
            scale_type: Some(ScaleType::Ratio),
            ..Component::dimension(id, ComponentVariant::Numerical)
        }
    }

    pub fn with_values(mut self, values: Vec<DimensionValue>) -> Self {
        self.values = values;
        self
    }

    pub fn with_time_format(mut self, format: &str) -> Self {
        self.time_format = Some(format.to_string());
        self
    }

    pub fn with_scale_type(mut self, scale_type: ScaleType) -> Self {
        self.scale_type = Some(scale_type);
        self
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }

    pub fn is_measure(&self) -> bool {
        self.kind == ComponentKind::Measure
    }
}

/// Lookup table of all dimensions and measures of a dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Components {
    items: Vec<Component>,
}

impl Components {
    pub fn new(items: Vec<Component>) -> Self {
        Components { items }
    }

    /// Find a component by id. A missing id is a configuration error.
    pub fn get(&self, id: &str) -> Result<&Component> {
        self.items.iter().find(|c| c.id == id).ok_or_else(|| {
            anyhow!(
                "Component '{}' not found. Available components: {}",
                id,
                self.items
                    .iter()
                    .map(|c| c.id.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.items.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
