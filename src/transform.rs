use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use tracing::trace;

use crate::config::{ImputationType, Sorting, SortingOrder, SortingType, StackOffset};
use crate::ir::{MeasureAccessor, SegmentAccessor, StackLayer, WideRow, XAccessor};
use crate::observation::{Observation, ObservationValue};

/// Rescale every value to its share of the total at the same x, in percent.
///
/// Sums are taken per x on the long data before anything is pivoted, so the
/// shares at one x add up to 100 whatever segments are missing. Without an x
/// (pie charts) all rows form one group. A zero sum yields 0, never NaN.
pub fn normalize_to_percent(
    rows: &[Observation],
    x: Option<&XAccessor>,
    y: &MeasureAccessor,
) -> Vec<Observation> {
    let x_key = |obs: &Observation| x.map(|x| x.key(obs)).unwrap_or_default();

    let mut sums_by_x: HashMap<String, f64> = HashMap::new();
    for obs in rows {
        let value = finite_or_zero(y.get(obs));
        *sums_by_x.entry(x_key(obs)).or_insert(0.0) += value;
    }

    rows.iter()
        .map(|obs| {
            let mut normalized = obs.clone();
            if let Some(value) = y.get(obs) {
                let sum = sums_by_x.get(&x_key(obs)).copied().unwrap_or(0.0);
                let share = if sum == 0.0 || !value.is_finite() {
                    0.0
                } else {
                    value / sum * 100.0
                };
                normalized.insert(y.value.key.clone(), ObservationValue::Number(share));
            }
            normalized
        })
        .collect()
}

fn finite_or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Accessors and options of one long → wide pivot
#[derive(Debug, Clone, Copy)]
pub struct PivotSpec<'a> {
    pub x: &'a XAccessor,
    pub segment: &'a SegmentAccessor,
    pub y: &'a MeasureAccessor,
    /// Every segment of the chart, in display order
    pub segments: &'a [String],
    pub imputation: ImputationType,
}

/// Turn long rows into one wide row per distinct x (first appearance order).
///
/// Null measurements leave their segment absent. Repeated (x, segment) pairs
/// are summed. Missing segments are then filled according to the imputation
/// type; imputed values count toward the row total.
pub fn pivot_wide(rows: &[Observation], spec: &PivotSpec<'_>) -> Vec<WideRow> {
    // 1. Group by x
    let mut groups: IndexMap<String, HashMap<String, f64>> = IndexMap::new();
    for obs in rows {
        let values = groups.entry(spec.x.key(obs)).or_default();
        match spec.y.get(obs) {
            Some(value) => *values.entry(spec.segment.value(obs)).or_insert(0.0) += value,
            None => trace!(x = %spec.x.key(obs), "null measurement left out of wide row"),
        }
    }

    // 2. Build rows with segment keys in display order
    let mut wide: Vec<WideRow> = groups
        .into_iter()
        .map(|(x, mut present)| {
            let mut values = IndexMap::new();
            for segment in spec.segments {
                if let Some(value) = present.remove(segment) {
                    values.insert(segment.clone(), value);
                }
            }
            let mut leftovers: Vec<(String, f64)> = present.into_iter().collect();
            leftovers.sort_by(|a, b| a.0.cmp(&b.0));
            values.extend(leftovers);
            WideRow { x, values, total: 0.0 }
        })
        .collect();

    // 3. Impute missing segments
    match spec.imputation {
        ImputationType::None => {}
        ImputationType::Zeros => impute_zeros(&mut wide, spec.segments),
        ImputationType::Linear => impute_linear(&mut wide, spec.segments, spec.x),
    }

    // 4. Totals
    for row in &mut wide {
        row.total = row.values.values().map(|v| finite_or_zero(Some(*v))).sum();
    }
    wide
}

fn impute_zeros(wide: &mut [WideRow], segments: &[String]) {
    for row in wide.iter_mut() {
        fill_missing(row, segments, |_| 0.0);
    }
}

/// Interpolate each missing segment between its nearest present neighbours
/// along x. Edges without a neighbour on one side get 0.
fn impute_linear(wide: &mut [WideRow], segments: &[String], x: &XAccessor) {
    let positions: Vec<f64> = {
        let parsed: Vec<Option<f64>> = wide.iter().map(|row| x.position_of(&row.x)).collect();
        if parsed.iter().all(|p| p.is_some()) {
            parsed.into_iter().flatten().collect()
        } else {
            (0..wide.len()).map(|i| i as f64).collect()
        }
    };
    let mut order: Vec<usize> = (0..wide.len()).collect();
    order.sort_by(|&a, &b| positions[a].total_cmp(&positions[b]));

    let mut imputed: Vec<HashMap<String, f64>> = vec![HashMap::new(); wide.len()];
    for segment in segments {
        let present: Vec<(f64, f64)> = order
            .iter()
            .filter_map(|&i| wide[i].get(segment).map(|v| (positions[i], v)))
            .collect();
        for &i in &order {
            if wide[i].get(segment).is_some() {
                continue;
            }
            let p = positions[i];
            let before = present.iter().rev().find(|(pos, _)| *pos < p);
            let after = present.iter().find(|(pos, _)| *pos > p);
            let value = match (before, after) {
                (Some(&(p0, v0)), Some(&(p1, v1))) if p1 != p0 => v0 + (v1 - v0) * (p - p0) / (p1 - p0),
                _ => 0.0,
            };
            imputed[i].insert(segment.clone(), value);
        }
    }

    for (row, values) in wide.iter_mut().zip(imputed) {
        fill_missing(row, segments, |segment| values.get(segment).copied().unwrap_or(0.0));
    }
}

/// Insert missing segments, keeping keys in display order
fn fill_missing(row: &mut WideRow, segments: &[String], value_for: impl Fn(&str) -> f64) {
    if segments.iter().all(|s| row.values.contains_key(s)) {
        return;
    }
    let mut values = IndexMap::with_capacity(segments.len());
    for segment in segments {
        let value = row.values.get(segment).copied().unwrap_or_else(|| value_for(segment));
        values.insert(segment.clone(), value);
    }
    for (key, value) in &row.values {
        values.entry(key.clone()).or_insert(*value);
    }
    row.values = values;
}

/// Order in which segments are stacked, bottom first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StackOrder {
    /// Smallest per-segment total at the bottom
    Ascending,
    /// Largest per-segment total at the bottom
    Descending,
    /// Input key order reversed
    Reverse,
    /// Input key order
    Input,
}

impl StackOrder {
    /// Stack order matching the segment sorting, so legend and stack agree
    pub fn for_sorting(sorting: Sorting) -> Self {
        match (sorting.sorting_type, sorting.sorting_order) {
            (SortingType::ByTotalSize, SortingOrder::Asc) => StackOrder::Ascending,
            (SortingType::ByTotalSize, SortingOrder::Desc) => StackOrder::Descending,
            _ => StackOrder::Reverse,
        }
    }
}

/// Indices into `keys`, bottom of the stack first
pub fn stack_order(wide: &[WideRow], keys: &[String], order: StackOrder) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..keys.len()).collect();
    match order {
        StackOrder::Input => {}
        StackOrder::Reverse => indices.reverse(),
        StackOrder::Ascending | StackOrder::Descending => {
            // one pass per key, independent of row order
            let sums: Vec<f64> = keys
                .iter()
                .map(|key| wide.iter().map(|row| finite_or_zero(row.get(key))).sum())
                .collect();
            // stable: equal totals keep key order in both directions
            indices.sort_by(|&a, &b| match order {
                StackOrder::Descending => sums[b].total_cmp(&sums[a]),
                _ => sums[a].total_cmp(&sums[b]),
            });
        }
    }
    indices
}

/// Stack the wide rows. Returns one layer per key in stack order (bottom
/// first); each layer has one `[y0, y1]` per wide row. Missing keys stack as 0.
pub fn stack(wide: &[WideRow], keys: &[String], order: StackOrder, offset: StackOffset) -> Vec<StackLayer> {
    let order = stack_order(wide, keys, order);
    let mut layers: Vec<StackLayer> = order
        .iter()
        .map(|&i| StackLayer {
            key: keys[i].clone(),
            offsets: Vec::with_capacity(wide.len()),
        })
        .collect();

    for row in wide {
        let mut positive = 0.0;
        let mut negative = 0.0;
        for layer in layers.iter_mut() {
            let value = finite_or_zero(row.get(&layer.key));
            let interval = match offset {
                // zeros count as positive: a zero-height layer on top of the positive stack
                StackOffset::DivergingPositiveZeros if value >= 0.0 => {
                    let interval = [positive, positive + value];
                    positive += value;
                    interval
                }
                StackOffset::Diverging if value > 0.0 => {
                    let interval = [positive, positive + value];
                    positive += value;
                    interval
                }
                _ if value < 0.0 => {
                    let interval = [negative + value, negative];
                    negative += value;
                    interval
                }
                _ => [0.0, value],
            };
            layer.offsets.push(interval);
        }
    }
    layers
}
