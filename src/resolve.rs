use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::collections::HashMap;
use tracing::debug;

use crate::config::{ChartConfig, XKind, YField};
use crate::ir::{AnimationAccessor, MeasureAccessor, ResolvedEncoding, SegmentAccessor, XAccessor};
use crate::observation::{Component, ComponentVariant, Components, DimensionValue, Observation};
use crate::time;

/// Reads a component as a number. Null and absent cells read as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericGetter {
    pub key: String,
}

impl NumericGetter {
    pub fn new(key: &str) -> Self {
        NumericGetter { key: key.to_string() }
    }

    pub fn get(&self, obs: &Observation) -> Option<f64> {
        obs.get(&self.key).as_f64()
    }
}

/// Reads a component verbatim as a string (banding and segmentation keys)
#[derive(Debug, Clone, PartialEq)]
pub struct StringGetter {
    pub key: String,
}

impl StringGetter {
    pub fn new(key: &str) -> Self {
        StringGetter { key: key.to_string() }
    }

    pub fn get(&self, obs: &Observation) -> String {
        obs.get(&self.key).as_string()
    }
}

/// Dimension values of one component, indexed by raw value and by label
#[derive(Debug, Clone, Default)]
pub struct ValueTable {
    by_value: HashMap<String, DimensionValue>,
    by_label: HashMap<String, DimensionValue>,
}

impl ValueTable {
    pub fn from_component(component: &Component) -> Self {
        let mut table = ValueTable::default();
        for dv in &component.values {
            table.by_value.insert(dv.value.clone(), dv.clone());
            table.by_label.entry(dv.label.clone()).or_insert_with(|| dv.clone());
        }
        table
    }

    pub fn get(&self, raw: &str) -> Option<&DimensionValue> {
        self.by_value.get(raw).or_else(|| self.by_label.get(raw))
    }

    pub fn is_empty(&self) -> bool {
        self.by_value.is_empty()
    }
}

/// Label and abbreviation lookups; unknown values fall back to the raw value
#[derive(Debug, Clone)]
pub struct LabelGetter {
    pub key: String,
    pub table: ValueTable,
    pub use_abbreviations: bool,
}

impl LabelGetter {
    pub fn new(component: &Component, use_abbreviations: bool) -> Self {
        LabelGetter {
            key: component.id.clone(),
            table: ValueTable::from_component(component),
            use_abbreviations,
        }
    }

    pub fn label_of(&self, raw: &str) -> String {
        match self.table.get(raw) {
            Some(dv) => dv.label.clone(),
            None => raw.to_string(),
        }
    }

    pub fn abbreviation_or_label_of(&self, raw: &str) -> String {
        match self.table.get(raw) {
            Some(dv) => dv.alternate_name.clone().unwrap_or_else(|| dv.label.clone()),
            None => raw.to_string(),
        }
    }

    /// Label as displayed: the abbreviation when abbreviations are on
    pub fn display_of(&self, raw: &str) -> String {
        if self.use_abbreviations {
            self.abbreviation_or_label_of(raw)
        } else {
            self.label_of(raw)
        }
    }

    pub fn label(&self, obs: &Observation) -> String {
        self.display_of(&obs.get(&self.key).as_string())
    }
}

/// Parses a temporal component into dates
#[derive(Debug, Clone)]
pub struct TemporalGetter {
    pub key: String,
    pub format: Option<String>,
    /// Raw value → date, for temporal entities whose dates live in the value table
    pub entity_dates: Option<HashMap<String, NaiveDateTime>>,
}

impl TemporalGetter {
    pub fn new(component: &Component) -> Self {
        let entity_dates = (component.variant == ComponentVariant::TemporalEntity).then(|| {
            component
                .values
                .iter()
                .filter_map(|dv| {
                    let text = dv
                        .position
                        .as_ref()
                        .map(|p| p.as_text())
                        .unwrap_or_else(|| dv.label.clone());
                    parse_entity_date(&text, component.time_format.as_deref())
                        .map(|date| (dv.value.clone(), date))
                })
                .collect()
        });
        TemporalGetter {
            key: component.id.clone(),
            format: component.time_format.clone(),
            entity_dates,
        }
    }

    pub fn get(&self, obs: &Observation) -> Option<NaiveDateTime> {
        self.parse(&obs.get(&self.key).as_string())
    }

    /// Resolve a raw value the same way cells are resolved
    pub fn parse(&self, raw: &str) -> Option<NaiveDateTime> {
        if let Some(date) = self.entity_dates.as_ref().and_then(|m| m.get(raw)) {
            return Some(*date);
        }
        time::parse_date_with(raw, self.format.as_deref())
    }
}

fn parse_entity_date(text: &str, format: Option<&str>) -> Option<NaiveDateTime> {
    time::parse_date_with(text, format).or_else(|| time::parse_date_with(text, None))
}

/// Resolve every field of the chart against the component metadata.
///
/// Fails fast when the mapping names a component that does not exist.
pub fn resolve_encoding(config: &ChartConfig, components: &Components) -> Result<ResolvedEncoding> {
    let policy = config.policy();
    let fields = &config.fields;

    // 1. X (optional for pie, map and table)
    let x = match (&fields.x, policy.x_kind) {
        (Some(x_field), kind) => {
            let component = components
                .get(&x_field.component_id)
                .context("Failed to resolve x field")?;
            Some(resolve_x(component, kind, x_field.use_abbreviations))
        }
        (None, _) => None,
    };

    // 2. Y (required)
    let y = resolve_measure(&fields.y, components).context("Failed to resolve y field")?;
    let y_secondary = match &fields.y_secondary {
        Some(field) => Some(
            resolve_measure(field, components).context("Failed to resolve secondary y field")?,
        ),
        None => None,
    };

    // 3. Segment
    let segment = match &fields.segment {
        Some(field) => {
            let component = components
                .get(&field.component_id)
                .context("Failed to resolve segment field")?;
            Some(SegmentAccessor {
                raw: StringGetter::new(&component.id),
                labels: LabelGetter::new(component, field.use_abbreviations),
                field: field.clone(),
            })
        }
        None => None,
    };

    // 4. Animation
    let animation = match &fields.animation {
        Some(field) => {
            let component = components
                .get(&field.component_id)
                .context("Failed to resolve animation field")?;
            Some(AnimationAccessor {
                raw: StringGetter::new(&component.id),
                temporal: component.variant.is_temporal().then(|| TemporalGetter::new(component)),
                dynamic_scales: field.dynamic_scales,
            })
        }
        None => None,
    };

    debug!(
        chart_type = ?config.chart_type,
        x_kind = ?x.as_ref().map(|x| x.kind),
        segment = segment.is_some(),
        animation = animation.is_some(),
        "resolved chart encoding"
    );

    Ok(ResolvedEncoding {
        policy,
        x,
        y,
        y_secondary,
        segment,
        animation,
    })
}

fn resolve_x(component: &Component, kind: XKind, use_abbreviations: bool) -> XAccessor {
    let temporal = component.variant.is_temporal().then(|| TemporalGetter::new(component));

    // Temporal layout needs dates; numeric layout needs a measure
    let kind = match kind {
        XKind::Temporal if temporal.is_none() => XKind::Band,
        XKind::Numeric if !component.is_measure() => XKind::Band,
        XKind::None => XKind::Band,
        other => other,
    };

    XAccessor {
        kind,
        raw: StringGetter::new(&component.id),
        labels: LabelGetter::new(component, use_abbreviations),
        temporal,
        numeric: component.is_measure().then(|| NumericGetter::new(&component.id)),
    }
}

fn resolve_measure(field: &YField, components: &Components) -> Result<MeasureAccessor> {
    let component = components.get(&field.component_id)?;

    let error_range = match (&component.error_bounds, field.show_error_whiskers) {
        (Some(bounds), true) => {
            let lower = components
                .get(&bounds.lower)
                .context("Failed to resolve lower error bound")?;
            let upper = components
                .get(&bounds.upper)
                .context("Failed to resolve upper error bound")?;
            Some((NumericGetter::new(&lower.id), NumericGetter::new(&upper.id)))
        }
        _ => None,
    };

    Ok(MeasureAccessor {
        value: NumericGetter::new(&component.id),
        label: component.label.clone(),
        unit: component.unit.clone(),
        scale_type: component.scale_type,
        error_range,
        color: field.color.clone(),
    })
}
