//! The chart data pipeline: resolve → filter → sort → reshape → scale →
//! annotate.
//!
//! [`compute_chart_data`] is the one-shot entry point. [`ChartState`] keeps a
//! memo per derived value so that repeated calls with unchanged inputs do no
//! work, and exposes every value through its own accessor.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashSet;
use std::rc::Rc;
use tracing::debug;

use crate::config::{
    Calculation, ChartConfig, DateRange, InteractiveFilterState, Sorting, SortingOrder, StackOffset, XKind,
};
use crate::filter::FilterSet;
use crate::ir::{DerivedViews, Domain, DualAxisDomains, ResolvedEncoding, StackLayer, TooltipPayload, WideRow};
use crate::memo::{self, Memo};
use crate::observation::{Components, Observation};
use crate::palette::SegmentColors;
use crate::resolve::{resolve_encoding, LabelGetter, NumericGetter};
use crate::scale::{self, LinearScale};
use crate::sort::{self, SortContext, TableColumn};
use crate::time::{self, StepDirection};
use crate::tooltip::{self, TooltipContext, XPosition};
use crate::transform::{self, PivotSpec, StackOrder};

/// Apply the interactive filters to `observations` and return every view.
///
/// Pure: the same inputs always give the same views, and nothing is mutated.
pub fn compute_chart_data(
    observations: &[Observation],
    components: &Components,
    config: &ChartConfig,
    filter_state: &InteractiveFilterState,
) -> Result<DerivedViews> {
    let encoding = resolve_encoding(config, components).context("Failed to resolve chart encoding")?;
    Ok(derive_views(observations, &encoding, config, filter_state))
}

fn derive_views(
    observations: &[Observation],
    encoding: &ResolvedEncoding,
    config: &ChartConfig,
    state: &InteractiveFilterState,
) -> DerivedViews {
    let filters = FilterSet::build(encoding, &config.interactive_filters, state);
    let mut views = filters.views(observations);

    // Continuous x axes draw rows in x order
    if let Some(x) = encoding.x.as_ref().filter(|x| matches!(x.kind, XKind::Temporal | XKind::Numeric)) {
        views.chart_data = sort::sort_by_x(&views.chart_data, x);
        views.time_range_data = sort::sort_by_x(&views.time_range_data, x);
    }
    views
}

/// One input snapshot: observations plus the filter state, hashed once
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub observations: &'a [Observation],
    pub state: &'a InteractiveFilterState,
    observations_hash: u64,
}

impl<'a> Snapshot<'a> {
    pub fn new(observations: &'a [Observation], state: &'a InteractiveFilterState) -> Self {
        Snapshot {
            observations,
            state,
            observations_hash: memo::hash_of(observations),
        }
    }

    fn percent(&self) -> bool {
        self.state.calculation == Calculation::Percent
    }
}

/// Wide rows and the segment keys they were pivoted over, in chart order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WideTable {
    pub keys: Vec<String>,
    pub rows: Vec<WideRow>,
}

/// Every domain the axes need
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDomains {
    pub y: Domain,
    /// `y` widened to round tick steps
    pub y_nice: Domain,
    /// Left/right domains of dual-axis combos
    pub dual: Option<DualAxisDomains>,
    /// Numeric x (scatterplots)
    pub x: Option<Domain>,
    /// Date extent of the brush
    pub time: Option<DateRange>,
    /// Value domain used to reserve axis label space
    pub padding: Domain,
}

/// Memoized pipeline of one chart instance
#[derive(Debug)]
pub struct ChartState {
    config: ChartConfig,
    components: Components,
    encoding: ResolvedEncoding,
    table_columns: Vec<(TableColumn, SortingOrder)>,
    config_hash: u64,
    views: Memo<Rc<DerivedViews>>,
    x_domain: Memo<Rc<Vec<String>>>,
    segments: Memo<Rc<Vec<String>>>,
    colors: Memo<Rc<SegmentColors>>,
    wide: Memo<Rc<WideTable>>,
    stacked: Memo<Rc<Vec<StackLayer>>>,
    domains: Memo<Rc<ChartDomains>>,
}

impl ChartState {
    pub fn new(config: ChartConfig, components: Components) -> Result<Self> {
        let encoding = resolve_encoding(&config, &components).context("Failed to resolve chart encoding")?;
        let table_columns = resolve_table_columns(&config, &components).context("Failed to resolve table sorting")?;
        let config_hash = memo::combine(&[memo::hash_serialized(&config)?, memo::hash_serialized(&components)?]);
        Ok(ChartState {
            config,
            components,
            encoding,
            table_columns,
            config_hash,
            views: Memo::new(),
            x_domain: Memo::new(),
            segments: Memo::new(),
            colors: Memo::new(),
            wide: Memo::new(),
            stacked: Memo::new(),
            domains: Memo::new(),
        })
    }

    /// Swap in a new configuration; derived values recompute on next access
    pub fn set_config(&mut self, config: ChartConfig, components: Components) -> Result<()> {
        let next = ChartState::new(config, components)?;
        self.config = next.config;
        self.components = next.components;
        self.encoding = next.encoding;
        self.table_columns = next.table_columns;
        self.config_hash = next.config_hash;
        Ok(())
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    pub fn encoding(&self) -> &ResolvedEncoding {
        &self.encoding
    }

    /// Key of values depending on the whole filter state
    fn full_key(&self, snapshot: &Snapshot<'_>) -> u64 {
        memo::combine(&[self.config_hash, snapshot.observations_hash, memo::hash_of(snapshot.state)])
    }

    /// Key of values depending on the time ranges only (the segment view)
    fn time_key(&self, snapshot: &Snapshot<'_>) -> u64 {
        let state = snapshot.state;
        memo::combine(&[
            self.config_hash,
            snapshot.observations_hash,
            memo::hash_of(&(state.dashboard_time_range, state.time_range)),
        ])
    }

    pub fn views(&mut self, snapshot: &Snapshot<'_>) -> Rc<DerivedViews> {
        let key = self.full_key(snapshot);
        let (encoding, config) = (&self.encoding, &self.config);
        let views = self.views.get_or_compute(key, || {
            debug!("recomputing derived views");
            Rc::new(derive_views(snapshot.observations, encoding, config, snapshot.state))
        });
        Rc::clone(views)
    }

    /// Band domain of the x axis (raw values, display order). Built from the
    /// scales view so bands stay put while the time slider plays.
    pub fn x_domain(&mut self, snapshot: &Snapshot<'_>) -> Rc<Vec<String>> {
        let key = self.full_key(snapshot);
        let views = self.views(snapshot);
        let sorting = self.x_sorting();
        let encoding = &self.encoding;
        let domain = self.x_domain.get_or_compute(key, || {
            debug!("recomputing x domain");
            let Some(x) = &encoding.x else {
                return Rc::new(Vec::new());
            };
            let rows = &views.scales_data;
            let categories = sort::distinct_values(rows, &x.raw);
            if x.kind != XKind::Band {
                return Rc::new(categories);
            }
            let ctx = SortContext {
                key: &x.raw,
                labels: &x.labels,
                temporal: x.temporal.as_ref(),
                measure: &encoding.y.value,
            };
            Rc::new(sort::sort_categories(&categories, rows, &ctx, sorting))
        });
        Rc::clone(domain)
    }

    /// Every segment of the time-filtered data, in legend order. Unchecked
    /// legend entries are kept.
    pub fn segments(&mut self, snapshot: &Snapshot<'_>) -> Rc<Vec<String>> {
        let key = self.time_key(snapshot);
        let views = self.views(snapshot);
        let sorting = self.segment_sorting();
        let encoding = &self.encoding;
        let segments = self.segments.get_or_compute(key, || {
            debug!("recomputing segments");
            let Some(segment) = &encoding.segment else {
                return Rc::new(Vec::new());
            };
            let categories = sort::distinct_values(&views.segment_data, &segment.raw);
            let ctx = SortContext {
                key: &segment.raw,
                labels: &segment.labels,
                temporal: None,
                measure: &encoding.y.value,
            };
            Rc::new(sort::sort_categories(&categories, &views.segment_data, &ctx, sorting))
        });
        Rc::clone(segments)
    }

    pub fn segment_colors(&mut self, snapshot: &Snapshot<'_>) -> Rc<SegmentColors> {
        let key = self.time_key(snapshot);
        let segments = self.segments(snapshot);
        let encoding = &self.encoding;
        let colors = self.colors.get_or_compute(key, || {
            Rc::new(match &encoding.segment {
                Some(segment) => SegmentColors::assign(&segments, segment),
                None => SegmentColors::single(encoding.y.color.as_deref()),
            })
        });
        Rc::clone(colors)
    }

    /// Chart rows pivoted to one row per x, ordered like the x domain
    pub fn wide_rows(&mut self, snapshot: &Snapshot<'_>) -> Rc<WideTable> {
        let key = self.full_key(snapshot);
        let views = self.views(snapshot);
        let segments = self.segments(snapshot);
        let x_domain = self.x_domain(snapshot);
        let encoding = &self.encoding;
        let percent = snapshot.percent();
        let wide = self.wide.get_or_compute(key, || {
            debug!("recomputing wide rows");
            Rc::new(pivot_table(&views.chart_data, encoding, &segments, &x_domain, percent))
        });
        Rc::clone(wide)
    }

    /// Stacked layers of the chart rows; empty unless the segment is stacked
    pub fn stacked(&mut self, snapshot: &Snapshot<'_>) -> Rc<Vec<StackLayer>> {
        let key = self.full_key(snapshot);
        let wide = self.wide_rows(snapshot);
        let params = self.stack_params(snapshot.percent());
        let stacked = self.stacked.get_or_compute(key, || {
            debug!("recomputing stacked layers");
            Rc::new(match params {
                Some((order, offset)) => transform::stack(&wide.rows, &wide.keys, order, offset),
                None => Vec::new(),
            })
        });
        Rc::clone(stacked)
    }

    pub fn domains(&mut self, snapshot: &Snapshot<'_>) -> Rc<ChartDomains> {
        let key = self.full_key(snapshot);
        let views = self.views(snapshot);
        let segments = self.segments(snapshot);
        let percent = snapshot.percent();
        // a configured absolute/percent toggle must not move the axis
        let padding_percent = percent && !self.config.interactive_filters.calculation;
        let params = self.stack_params(percent);
        let padding_params = self.stack_params(padding_percent);
        let x_scale_type = self
            .config
            .fields
            .x
            .as_ref()
            .and_then(|field| self.components.get(&field.component_id).ok())
            .and_then(|component| component.scale_type);
        let encoding = &self.encoding;

        let domains = self.domains.get_or_compute(key, || {
            debug!("recomputing domains");
            let min_policy = encoding.policy.min_policy;
            let value_domain = |rows: &[Observation], params: Option<(StackOrder, StackOffset)>, percent: bool| {
                match params {
                    Some((order, offset)) => {
                        let table = pivot_table(rows, encoding, &segments, &[], percent);
                        scale::stacked_domain(&transform::stack(&table.rows, &table.keys, order, offset))
                    }
                    None if percent => {
                        let normalized = transform::normalize_to_percent(rows, encoding.x.as_ref(), &encoding.y);
                        scale::y_domain(&normalized, &encoding.y, min_policy)
                    }
                    None => scale::y_domain(rows, &encoding.y, min_policy),
                }
            };

            let y = value_domain(&views.scales_data, params, percent);
            let padding = value_domain(&views.padding_data, padding_params, padding_percent);
            let dual = encoding
                .y_secondary
                .as_ref()
                .map(|right| scale::dual_axis_domains(&views.scales_data, &encoding.y, right, min_policy));
            let x = encoding
                .x
                .as_ref()
                .filter(|x| x.kind == XKind::Numeric)
                .map(|x| scale::x_numeric_domain(&views.scales_data, x, min_policy, x_scale_type));
            let time = encoding
                .x
                .as_ref()
                .filter(|x| x.kind == XKind::Temporal)
                .and_then(|x| scale::time_extent(&views.time_range_data, x));

            Rc::new(ChartDomains {
                y,
                y_nice: scale::nice_domain(y, 5),
                dual,
                x,
                time,
                padding,
            })
        });
        Rc::clone(domains)
    }

    /// Tooltip for the band with raw x value `key`, on a chart of `size`
    /// (width, height) pixels
    pub fn tooltip_at_band(&mut self, snapshot: &Snapshot<'_>, key: &str, size: (f64, f64)) -> Option<TooltipPayload> {
        self.with_tooltip_context(snapshot, size, |rows, ctx| tooltip::hover_band(rows, ctx, key))
    }

    /// Tooltip for the observed date nearest to `date`
    pub fn tooltip_at_date(
        &mut self,
        snapshot: &Snapshot<'_>,
        date: NaiveDateTime,
        size: (f64, f64),
    ) -> Option<TooltipPayload> {
        self.with_tooltip_context(snapshot, size, |rows, ctx| tooltip::hover_date(rows, ctx, date))
    }

    fn with_tooltip_context(
        &mut self,
        snapshot: &Snapshot<'_>,
        (width, height): (f64, f64),
        hover: impl FnOnce(&[Observation], &TooltipContext<'_>) -> Option<TooltipPayload>,
    ) -> Option<TooltipPayload> {
        let views = self.views(snapshot);
        let x_domain = self.x_domain(snapshot);
        let segments = self.segments(snapshot);
        let colors = self.segment_colors(snapshot);
        let domains = self.domains(snapshot);
        let stacked = self.stack_params(snapshot.percent()).is_some();

        let encoding = &self.encoding;
        let x = encoding.x.as_ref()?;
        let x_position = match x.kind {
            XKind::Temporal => {
                let range = domains.time?;
                let domain = Domain::new(
                    time::timestamp_millis(&range.from) as f64,
                    time::timestamp_millis(&range.to) as f64,
                );
                XPosition::Continuous(LinearScale::new(domain, (0.0, width)))
            }
            XKind::Numeric => XPosition::Continuous(LinearScale::new(domains.x?, (0.0, width))),
            XKind::Band | XKind::None => XPosition::Band {
                domain: &x_domain,
                width,
            },
        };

        let rows = if snapshot.percent() {
            transform::normalize_to_percent(&views.chart_data, Some(x), &encoding.y)
        } else {
            views.chart_data.clone()
        };
        let ctx = TooltipContext {
            x,
            y: &encoding.y,
            segment: encoding.segment.as_ref(),
            segment_order: &segments,
            colors: &colors,
            x_position,
            y_scale: LinearScale::new(domains.y, (height, 0.0)),
            stacked,
        };
        hover(&rows, &ctx)
    }

    /// Move a brush handle to the adjacent observed date
    pub fn step_brush(
        &mut self,
        snapshot: &Snapshot<'_>,
        current: NaiveDateTime,
        direction: StepDirection,
    ) -> Option<NaiveDateTime> {
        let views = self.views(snapshot);
        let x = self.encoding.x.as_ref().filter(|x| x.temporal.is_some())?;
        tooltip::step_brush(&views.time_range_data, x, current, direction)
    }

    /// Chart rows in table order (configured column sort keys, highest first)
    pub fn table_rows(&mut self, snapshot: &Snapshot<'_>) -> Vec<Observation> {
        let views = self.views(snapshot);
        if self.table_columns.is_empty() {
            return views.chart_data.clone();
        }
        sort::sort_table(&views.chart_data, &self.table_columns)
    }

    fn x_sorting(&self) -> Sorting {
        self.config
            .fields
            .x
            .as_ref()
            .and_then(|field| field.sorting)
            .unwrap_or_else(|| self.encoding.policy.default_sorting())
    }

    fn segment_sorting(&self) -> Sorting {
        self.config
            .fields
            .segment
            .as_ref()
            .and_then(|field| field.sorting)
            .unwrap_or_else(|| self.encoding.policy.default_sorting())
    }

    /// Stack order and offset, or `None` when nothing is stacked.
    /// Percent stacks always use the zero-preserving offset.
    fn stack_params(&self, percent: bool) -> Option<(StackOrder, StackOffset)> {
        if !self.config.is_stacked() {
            return None;
        }
        let offset = if percent {
            StackOffset::DivergingPositiveZeros
        } else {
            self.encoding.policy.stack_offset?
        };
        Some((StackOrder::for_sorting(self.segment_sorting()), offset))
    }
}

/// Pivot `rows` over the segments present in them, ordered by `x_domain`
/// (rows whose x is not in the domain keep their relative order at the end)
fn pivot_table(
    rows: &[Observation],
    encoding: &ResolvedEncoding,
    segments: &[String],
    x_domain: &[String],
    percent: bool,
) -> WideTable {
    let (Some(x), Some(segment)) = (&encoding.x, &encoding.segment) else {
        return WideTable::default();
    };
    let normalized;
    let rows = if percent {
        normalized = transform::normalize_to_percent(rows, Some(x), &encoding.y);
        &normalized[..]
    } else {
        rows
    };

    let present: HashSet<String> = rows.iter().map(|obs| segment.value(obs)).collect();
    let keys: Vec<String> = segments.iter().filter(|s| present.contains(*s)).cloned().collect();
    let spec = PivotSpec {
        x,
        segment,
        y: &encoding.y,
        segments: &keys,
        imputation: segment.field.imputation_type,
    };
    let mut wide = transform::pivot_wide(rows, &spec);
    wide.sort_by_key(|row| x_domain.iter().position(|k| *k == row.x).unwrap_or(usize::MAX));
    WideTable { keys, rows: wide }
}

fn resolve_table_columns(
    config: &ChartConfig,
    components: &Components,
) -> Result<Vec<(TableColumn, SortingOrder)>> {
    config
        .table_sorting
        .iter()
        .map(|key| {
            let component = components.get(&key.component_id)?;
            let column = if component.is_measure() {
                TableColumn::Measure(NumericGetter::new(&component.id))
            } else {
                TableColumn::Dimension(LabelGetter::new(component, false))
            };
            Ok((column, key.sorting_order))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        AnimationField, ChartType, Fields, ImputationType, SegmentField, SortingType, TableSortKey, XField, YField,
    };
    use crate::ir::PlacementY;
    use crate::observation::{Component, ComponentVariant, DimensionValue};
    use chrono::NaiveDate;

    fn make_components() -> Components {
        Components::new(vec![
            Component::dimension("x", ComponentVariant::Temporal).with_time_format("%Y"),
            Component::dimension("seg", ComponentVariant::Nominal).with_values(vec![
                DimensionValue::new("A", "Alpha"),
                DimensionValue::new("B", "Beta"),
            ]),
            Component::measure("y"),
        ])
    }

    fn make_config(chart_type: ChartType, sorting: Option<Sorting>) -> ChartConfig {
        ChartConfig {
            chart_type,
            fields: Fields {
                x: Some(XField {
                    component_id: "x".to_string(),
                    sorting: None,
                    use_abbreviations: false,
                }),
                y: YField {
                    component_id: "y".to_string(),
                    show_error_whiskers: false,
                    color: None,
                },
                y_secondary: None,
                segment: Some(SegmentField {
                    component_id: "seg".to_string(),
                    sorting,
                    use_abbreviations: false,
                    segment_type: Default::default(),
                    imputation_type: ImputationType::Zeros,
                    colors: Default::default(),
                }),
                animation: None,
            },
            interactive_filters: Default::default(),
            table_sorting: Vec::new(),
        }
    }

    fn make_rows() -> Vec<Observation> {
        vec![
            Observation::new().with("x", "2020").with("seg", "A").with("y", 10.0),
            Observation::new().with("x", "2020").with("seg", "B").with("y", -4.0),
            Observation::new().with("x", "2021").with("seg", "A").with("y", 5.0),
        ]
    }

    fn wide_values(row: &WideRow) -> Vec<(String, f64)> {
        row.values.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }

    #[test]
    fn test_compute_chart_data_filters_legend() {
        let rows = make_rows();
        let mut state = InteractiveFilterState::default();
        state.deactivated_categories.insert("Beta".to_string());
        let views = compute_chart_data(&rows, &make_components(), &make_config(ChartType::Column, None), &state).unwrap();
        assert_eq!(views.chart_data.len(), 2);
        assert_eq!(views.segment_data.len(), 3);
        assert_eq!(views.time_range_data.len(), 3);
    }

    #[test]
    fn test_compute_chart_data_is_idempotent() {
        let rows = make_rows();
        let state = InteractiveFilterState::default();
        let config = make_config(ChartType::Column, None);
        let first = compute_chart_data(&rows, &make_components(), &config, &state).unwrap();
        let again = compute_chart_data(&first.chart_data, &make_components(), &config, &state).unwrap();
        assert_eq!(first.chart_data, again.chart_data);
    }

    #[test]
    fn test_wide_rows_with_zero_imputation() {
        let rows = make_rows();
        let filter_state = InteractiveFilterState::default();
        let snapshot = Snapshot::new(&rows, &filter_state);
        let mut chart = ChartState::new(make_config(ChartType::Column, None), make_components()).unwrap();

        let wide = chart.wide_rows(&snapshot);
        assert_eq!(wide.keys, vec!["A", "B"]);
        assert_eq!(wide.rows[0].x, "2020");
        assert_eq!(wide_values(&wide.rows[0]), vec![("A".to_string(), 10.0), ("B".to_string(), -4.0)]);
        assert_eq!(wide.rows[0].total, 6.0);
        assert_eq!(wide.rows[1].x, "2021");
        assert_eq!(wide_values(&wide.rows[1]), vec![("A".to_string(), 5.0), ("B".to_string(), 0.0)]);
        assert_eq!(wide.rows[1].total, 5.0);
    }

    #[test]
    fn test_segments_by_total_size_desc() {
        let rows = make_rows();
        let filter_state = InteractiveFilterState::default();
        let snapshot = Snapshot::new(&rows, &filter_state);
        let sorting = Sorting::new(SortingType::ByTotalSize, SortingOrder::Desc);
        let mut chart = ChartState::new(make_config(ChartType::Column, Some(sorting)), make_components()).unwrap();

        assert_eq!(*chart.segments(&snapshot), vec!["A", "B"]);
        let stacked = chart.stacked(&snapshot);
        assert_eq!(stacked[0].key, "A");
        assert_eq!(stacked[0].offsets, vec![[0.0, 10.0], [0.0, 5.0]]);
        assert_eq!(stacked[1].offsets, vec![[-4.0, 0.0], [0.0, 0.0]]);
        assert_eq!(chart.domains(&snapshot).y, Domain::new(-4.0, 10.0));
    }

    #[test]
    fn test_memo_recomputes_only_on_relevant_change() {
        let rows = make_rows();
        let mut chart = ChartState::new(make_config(ChartType::Column, None), make_components()).unwrap();

        let open = InteractiveFilterState::default();
        chart.wide_rows(&Snapshot::new(&rows, &open));
        chart.wide_rows(&Snapshot::new(&rows, &open));
        assert_eq!(chart.views.recomputations(), 1);
        assert_eq!(chart.wide.recomputations(), 1);

        // legend toggles change the chart rows but not the legend itself
        let mut toggled = InteractiveFilterState::default();
        toggled.deactivated_categories.insert("Beta".to_string());
        let wide = chart.wide_rows(&Snapshot::new(&rows, &toggled));
        assert_eq!(wide.keys, vec!["A"]);
        assert_eq!(chart.views.recomputations(), 2);
        assert_eq!(chart.segments.recomputations(), 1);
        assert_eq!(*chart.segments(&Snapshot::new(&rows, &toggled)), vec!["A", "B"]);
    }

    #[test]
    fn test_line_chart_rows_sorted_by_date() {
        let rows = vec![
            Observation::new().with("x", "2022").with("seg", "A").with("y", 1.0),
            Observation::new().with("x", "2020").with("seg", "A").with("y", 2.0),
            Observation::new().with("x", "2021").with("seg", "A").with("y", 3.0),
        ];
        let views = compute_chart_data(
            &rows,
            &make_components(),
            &make_config(ChartType::Line, None),
            &InteractiveFilterState::default(),
        )
        .unwrap();
        let xs: Vec<String> = views.chart_data.iter().map(|o| o.get("x").as_string()).collect();
        assert_eq!(xs, vec!["2020", "2021", "2022"]);
    }

    #[test]
    fn test_percent_stack_domain() {
        let rows = make_rows();
        let filter_state = InteractiveFilterState {
            calculation: Calculation::Percent,
            ..Default::default()
        };
        let snapshot = Snapshot::new(&rows, &filter_state);
        let mut chart = ChartState::new(make_config(ChartType::Area, None), make_components()).unwrap();

        let stacked = chart.stacked(&snapshot);
        // 2021: A is the only value
        let a = stacked.iter().find(|l| l.key == "A").unwrap();
        assert_eq!(a.offsets[1], [0.0, 100.0]);
        let domains = chart.domains(&snapshot);
        assert!(domains.y.max >= 100.0);
    }

    #[test]
    fn test_tooltip_through_state() {
        let rows = make_rows();
        let filter_state = InteractiveFilterState::default();
        let snapshot = Snapshot::new(&rows, &filter_state);
        let mut chart = ChartState::new(make_config(ChartType::Column, None), make_components()).unwrap();

        let payload = chart.tooltip_at_band(&snapshot, "2020", (200.0, 100.0)).unwrap();
        assert_eq!(payload.x_anchor, 50.0);
        assert_eq!(payload.placement.y, PlacementY::Top);
        assert_eq!(payload.values.len(), 2);
        assert_eq!(payload.values[0].label, "Alpha");
        assert!(chart.tooltip_at_band(&snapshot, "1999", (200.0, 100.0)).is_none());
    }

    #[test]
    fn test_tooltip_at_date_and_brush() {
        let rows = make_rows();
        let filter_state = InteractiveFilterState::default();
        let snapshot = Snapshot::new(&rows, &filter_state);
        let mut chart = ChartState::new(make_config(ChartType::Line, None), make_components()).unwrap();

        let date = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let payload = chart.tooltip_at_date(&snapshot, date, (400.0, 100.0)).unwrap();
        assert_eq!(payload.datum.label, "2020");
        assert_eq!(payload.x_anchor, 0.0);

        let next = chart.step_brush(&snapshot, date, StepDirection::Next).unwrap();
        assert_eq!(next.format("%Y").to_string(), "2021");
    }

    fn make_animated_band_config(dynamic_scales: bool) -> ChartConfig {
        let mut config = make_config(ChartType::Column, None);
        config.fields.x.as_mut().unwrap().component_id = "seg".to_string();
        config.fields.segment = None;
        config.fields.animation = Some(AnimationField {
            component_id: "x".to_string(),
            dynamic_scales,
        });
        config
    }

    #[test]
    fn test_x_domain_stays_put_under_time_slider() {
        let rows = make_rows();
        let filter_state = InteractiveFilterState {
            time_slider: Some("2021".to_string()),
            ..Default::default()
        };
        let snapshot = Snapshot::new(&rows, &filter_state);

        let mut chart = ChartState::new(make_animated_band_config(false), make_components()).unwrap();
        assert_eq!(chart.views(&snapshot).chart_data.len(), 1);
        assert_eq!(*chart.x_domain(&snapshot), vec!["A", "B"]);
        assert_eq!(chart.domains(&snapshot).y, Domain::new(-4.0, 10.0));

        let mut dynamic = ChartState::new(make_animated_band_config(true), make_components()).unwrap();
        assert_eq!(*dynamic.x_domain(&snapshot), vec!["A"]);
    }

    #[test]
    fn test_padding_ignores_calculation_toggle_when_configured() {
        let rows = make_rows();
        let absolute = InteractiveFilterState::default();
        let percent = InteractiveFilterState {
            calculation: Calculation::Percent,
            ..Default::default()
        };

        let mut config = make_config(ChartType::Column, None);
        config.interactive_filters.calculation = true;
        let mut chart = ChartState::new(config, make_components()).unwrap();
        let before = chart.domains(&Snapshot::new(&rows, &absolute));
        let after = chart.domains(&Snapshot::new(&rows, &percent));
        assert_eq!(before.padding, Domain::new(-4.0, 10.0));
        assert_eq!(after.padding, before.padding);
        assert_ne!(after.y, before.y);

        // without the toggle the padding follows the drawn values
        let mut chart = ChartState::new(make_config(ChartType::Column, None), make_components()).unwrap();
        let before = chart.domains(&Snapshot::new(&rows, &absolute));
        let after = chart.domains(&Snapshot::new(&rows, &percent));
        assert_ne!(after.padding, before.padding);
    }

    #[test]
    fn test_table_sorting() {
        let rows = make_rows();
        let filter_state = InteractiveFilterState::default();
        let snapshot = Snapshot::new(&rows, &filter_state);
        let mut config = make_config(ChartType::Table, None);
        config.table_sorting = vec![TableSortKey {
            component_id: "y".to_string(),
            sorting_order: SortingOrder::Desc,
        }];
        let mut chart = ChartState::new(config.clone(), make_components()).unwrap();
        let values: Vec<Option<f64>> = chart.table_rows(&snapshot).iter().map(|o| o.get("y").as_f64()).collect();
        assert_eq!(values, vec![Some(10.0), Some(5.0), Some(-4.0)]);

        config.table_sorting[0].component_id = "missing".to_string();
        assert!(ChartState::new(config, make_components()).is_err());
    }
}
