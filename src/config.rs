//! Declarative chart configuration: chart type, field mapping and the
//! interactive filter state owned by one chart instance.
//!
//! All types deserialize from the configurator's JSON shape (camelCase keys).

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::observation::Components;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChartType {
    Column,
    Bar,
    Line,
    Area,
    Scatterplot,
    Pie,
    Map,
    Table,
    ComboLineSingle,
    ComboLineDual,
    ComboLineColumn,
}

/// How the x role is read and laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum XKind {
    /// Discrete categories, one band each
    Band,
    /// Continuous dates, observations sorted by x
    Temporal,
    /// Continuous numbers (scatterplots)
    Numeric,
    /// No x role (pie, map, table)
    None,
}

/// Lower bound policy of numeric domains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MinPolicy {
    /// Always include zero
    ZeroBaseline,
    /// True data minimum, only honoured for `Interval` measures
    DynamicMinimum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StackOffset {
    /// Positive values above zero, negative below
    Diverging,
    /// Like `Diverging`, but zero values sit on top of the positive stack
    DivergingPositiveZeros,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Orientation {
    Vertical,
    Horizontal,
}

/// Everything that differs between chart types, resolved once per config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPolicy {
    pub x_kind: XKind,
    pub min_policy: MinPolicy,
    /// Offset used when the segment is stacked; `None` means never stacked
    pub stack_offset: Option<StackOffset>,
    pub sort_default: SortingType,
    pub orientation: Orientation,
}

impl ChartPolicy {
    /// Sorting used when a field carries none; measure sorts run largest first
    pub fn default_sorting(&self) -> Sorting {
        let order = match self.sort_default {
            SortingType::ByMeasure => SortingOrder::Desc,
            _ => SortingOrder::Asc,
        };
        Sorting::new(self.sort_default, order)
    }
}

impl ChartType {
    pub fn policy(&self) -> ChartPolicy {
        let base = ChartPolicy {
            x_kind: XKind::Band,
            min_policy: MinPolicy::ZeroBaseline,
            stack_offset: None,
            sort_default: SortingType::ByAuto,
            orientation: Orientation::Vertical,
        };
        match self {
            ChartType::Column => ChartPolicy {
                stack_offset: Some(StackOffset::Diverging),
                ..base
            },
            ChartType::Bar => ChartPolicy {
                stack_offset: Some(StackOffset::Diverging),
                orientation: Orientation::Horizontal,
                ..base
            },
            ChartType::Line | ChartType::ComboLineSingle | ChartType::ComboLineDual => ChartPolicy {
                x_kind: XKind::Temporal,
                min_policy: MinPolicy::DynamicMinimum,
                sort_default: SortingType::ByDimensionLabel,
                ..base
            },
            ChartType::Area => ChartPolicy {
                x_kind: XKind::Temporal,
                stack_offset: Some(StackOffset::DivergingPositiveZeros),
                ..base
            },
            ChartType::ComboLineColumn => ChartPolicy {
                x_kind: XKind::Temporal,
                sort_default: SortingType::ByDimensionLabel,
                ..base
            },
            ChartType::Scatterplot => ChartPolicy {
                x_kind: XKind::Numeric,
                min_policy: MinPolicy::DynamicMinimum,
                ..base
            },
            ChartType::Pie => ChartPolicy {
                x_kind: XKind::None,
                sort_default: SortingType::ByMeasure,
                ..base
            },
            ChartType::Map | ChartType::Table => ChartPolicy {
                x_kind: XKind::None,
                ..base
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortingType {
    ByDimensionLabel,
    ByMeasure,
    ByTotalSize,
    ByAuto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortingOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sorting {
    pub sorting_type: SortingType,
    #[serde(default)]
    pub sorting_order: SortingOrder,
}

impl Sorting {
    pub fn new(sorting_type: SortingType, sorting_order: SortingOrder) -> Self {
        Sorting {
            sorting_type,
            sorting_order,
        }
    }
}

/// How a segment missing at some x is filled before stacking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImputationType {
    #[default]
    None,
    Zeros,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentType {
    #[default]
    Stacked,
    Grouped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Calculation {
    #[default]
    Identity,
    Percent,
}

/// Segment colors: explicit value → color pairs, then the palette by index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorMapping {
    #[serde(default)]
    pub palette: Option<String>,
    #[serde(default)]
    pub color_mapping: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XField {
    pub component_id: String,
    #[serde(default)]
    pub sorting: Option<Sorting>,
    #[serde(default)]
    pub use_abbreviations: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YField {
    pub component_id: String,
    #[serde(default)]
    pub show_error_whiskers: bool,
    /// Single color for charts without a segment
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentField {
    pub component_id: String,
    #[serde(default)]
    pub sorting: Option<Sorting>,
    #[serde(default)]
    pub use_abbreviations: bool,
    #[serde(default, rename = "type")]
    pub segment_type: SegmentType,
    #[serde(default)]
    pub imputation_type: ImputationType,
    #[serde(default)]
    pub colors: ColorMapping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationField {
    pub component_id: String,
    /// Let scale domains follow the time slider instead of staying fixed
    #[serde(default)]
    pub dynamic_scales: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fields {
    #[serde(default)]
    pub x: Option<XField>,
    pub y: YField,
    /// Right-hand axis of dual-axis combo charts
    #[serde(default)]
    pub y_secondary: Option<YField>,
    #[serde(default)]
    pub segment: Option<SegmentField>,
    #[serde(default)]
    pub animation: Option<AnimationField>,
}

/// Which interactive controls the chart exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractiveFiltersConfig {
    #[serde(default)]
    pub legend: bool,
    #[serde(default)]
    pub time_range: bool,
    /// Absolute/percent toggle; when present the value axis padding must not
    /// move on toggling
    #[serde(default)]
    pub calculation: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartConfig {
    pub chart_type: ChartType,
    pub fields: Fields,
    #[serde(default)]
    pub interactive_filters: InteractiveFiltersConfig,
    /// Column sort keys of table charts, highest priority first
    #[serde(default)]
    pub table_sorting: Vec<TableSortKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSortKey {
    pub component_id: String,
    #[serde(default)]
    pub sorting_order: SortingOrder,
}

impl ChartConfig {
    pub fn policy(&self) -> ChartPolicy {
        self.chart_type.policy()
    }

    /// Whether the segment of this chart is drawn as stacks
    pub fn is_stacked(&self) -> bool {
        let policy = self.policy();
        match &self.fields.segment {
            Some(segment) => {
                policy.stack_offset.is_some() && segment.segment_type == SegmentType::Stacked
            }
            None => false,
        }
    }
}

/// Inclusive `[from, to]` window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
}

impl DateRange {
    pub fn contains(&self, date: &NaiveDateTime) -> bool {
        *date >= self.from && *date <= self.to
    }
}

/// Live state of the interactive controls of one chart instance.
///
/// Owned by the caller; the pipeline only borrows it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractiveFilterState {
    /// Segment labels unchecked in the legend
    #[serde(default)]
    pub deactivated_categories: BTreeSet<String>,
    /// Brush window of the chart itself
    #[serde(default)]
    pub time_range: Option<DateRange>,
    /// Preset window shared by a dashboard
    #[serde(default)]
    pub dashboard_time_range: Option<DateRange>,
    /// Current raw value of the animation field
    #[serde(default)]
    pub time_slider: Option<String>,
    #[serde(default)]
    pub calculation: Calculation,
}

/// A chart file: dataset metadata, the chart itself and the filter state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDocument {
    pub components: Components,
    pub chart: ChartConfig,
    #[serde(default)]
    pub filters: InteractiveFilterState,
}

impl ChartDocument {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse chart configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read chart configuration '{}'", path.display()))?;
        Self::from_json(&text)
    }
}
