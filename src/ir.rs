use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::Serialize;

use crate::config::{ChartPolicy, SegmentField, XKind};
use crate::observation::{Observation, ScaleType};
use crate::resolve::{LabelGetter, NumericGetter, StringGetter, TemporalGetter};
use crate::time;

// =============================================================================
// Phase 1: Resolution
// =============================================================================

/// All accessors of one chart, resolved once per configuration
#[derive(Debug, Clone)]
pub struct ResolvedEncoding {
    pub policy: ChartPolicy,
    pub x: Option<XAccessor>,
    pub y: MeasureAccessor,
    pub y_secondary: Option<MeasureAccessor>,
    pub segment: Option<SegmentAccessor>,
    pub animation: Option<AnimationAccessor>,
}

#[derive(Debug, Clone)]
pub struct XAccessor {
    /// Effective layout (the chart policy, downgraded when the component
    /// cannot support it)
    pub kind: XKind,
    pub raw: StringGetter,
    pub labels: LabelGetter,
    /// Present whenever the component is temporal, whatever the layout
    pub temporal: Option<TemporalGetter>,
    /// Present when the component is a measure
    pub numeric: Option<NumericGetter>,
}

impl XAccessor {
    /// Raw x value, used as grouping key
    pub fn key(&self, obs: &Observation) -> String {
        self.raw.get(obs)
    }

    pub fn date(&self, obs: &Observation) -> Option<NaiveDateTime> {
        self.temporal.as_ref().and_then(|t| t.get(obs))
    }

    pub fn number(&self, obs: &Observation) -> Option<f64> {
        self.numeric.as_ref().and_then(|n| n.get(obs))
    }

    pub fn label(&self, obs: &Observation) -> String {
        self.labels.label(obs)
    }

    /// Position of a raw x value along a continuous axis, if it has one
    pub fn position_of(&self, raw: &str) -> Option<f64> {
        match (&self.temporal, self.kind) {
            (Some(t), _) => t.parse(raw).map(|d| time::timestamp_millis(&d) as f64),
            (None, XKind::Numeric) => raw.trim().parse::<f64>().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MeasureAccessor {
    pub value: NumericGetter,
    pub label: String,
    pub unit: Option<String>,
    pub scale_type: Option<ScaleType>,
    /// Lower and upper uncertainty bounds, when whiskers are shown
    pub error_range: Option<(NumericGetter, NumericGetter)>,
    pub color: Option<String>,
}

impl MeasureAccessor {
    pub fn get(&self, obs: &Observation) -> Option<f64> {
        self.value.get(obs)
    }

    pub fn error_bounds(&self, obs: &Observation) -> Option<(Option<f64>, Option<f64>)> {
        self.error_range
            .as_ref()
            .map(|(lower, upper)| (lower.get(obs), upper.get(obs)))
    }
}

#[derive(Debug, Clone)]
pub struct SegmentAccessor {
    pub raw: StringGetter,
    pub labels: LabelGetter,
    pub field: SegmentField,
}

impl SegmentAccessor {
    pub fn value(&self, obs: &Observation) -> String {
        self.raw.get(obs)
    }

    pub fn label(&self, obs: &Observation) -> String {
        self.labels.label(obs)
    }
}

#[derive(Debug, Clone)]
pub struct AnimationAccessor {
    pub raw: StringGetter,
    pub temporal: Option<TemporalGetter>,
    pub dynamic_scales: bool,
}

impl AnimationAccessor {
    /// Whether `obs` sits at the slider position. Temporal fields compare by
    /// timestamp, ordinal ones by string.
    pub fn matches(&self, obs: &Observation, slider: &str) -> bool {
        match &self.temporal {
            Some(t) => match (t.get(obs), t.parse(slider)) {
                (Some(a), Some(b)) => time::timestamp_millis(&a) == time::timestamp_millis(&b),
                _ => false,
            },
            None => self.raw.get(obs) == slider,
        }
    }
}

// =============================================================================
// Phase 2: Filtering
// =============================================================================

/// The differently-filtered views of one snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedViews {
    /// All interactive filters applied; the shapes that get drawn
    pub chart_data: Vec<Observation>,
    /// Legend and time range only, so domains stay put while animating
    pub scales_data: Vec<Observation>,
    /// Time range only, so unchecked legend entries keep their color
    pub segment_data: Vec<Observation>,
    /// Dashboard time range only; feeds the brush
    pub time_range_data: Vec<Observation>,
    pub padding_data: Vec<Observation>,
}

// =============================================================================
// Phase 3: Reshaping
// =============================================================================

/// One x value with one field per segment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WideRow {
    pub x: String,
    pub values: IndexMap<String, f64>,
    pub total: f64,
}

impl WideRow {
    pub fn get(&self, segment: &str) -> Option<f64> {
        self.values.get(segment).copied()
    }
}

/// One segment of a stack: `[y0, y1]` per wide row, in wide-row order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackLayer {
    pub key: String,
    pub offsets: Vec<[f64; 2]>,
}

// =============================================================================
// Phase 4: Scaling
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Domain {
    pub min: f64,
    pub max: f64,
}

impl Domain {
    pub fn new(min: f64, max: f64) -> Self {
        Domain { min, max }
    }

    pub fn zero() -> Self {
        Domain { min: 0.0, max: 0.0 }
    }

    pub fn union(&self, other: &Domain) -> Domain {
        Domain {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Independent left/right domains of a dual-axis chart
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DualAxisDomains {
    pub left: Domain,
    pub right: Domain,
    /// Covers both axes; only used to reserve consistent margins
    pub union: Domain,
}

// =============================================================================
// Phase 5: Annotation
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlacementX {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlacementY {
    Top,
    Middle,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub x: PlacementX,
    pub y: PlacementY,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TooltipValue {
    pub label: String,
    pub value: String,
    pub color: String,
}

/// Normalized tooltip payload, the same for every chart type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TooltipPayload {
    pub x_anchor: f64,
    pub y_anchor: f64,
    pub placement: Placement,
    pub datum: TooltipValue,
    pub values: Vec<TooltipValue>,
}
