//! Hover lookups and the tooltip payload shared by every chart type.
//!
//! Banded charts match rows exactly by x key. Temporal charts snap the
//! pointer to the nearest observed date first, then match exactly.

use chrono::NaiveDateTime;

use crate::ir::{
    MeasureAccessor, Placement, PlacementX, PlacementY, SegmentAccessor, TooltipPayload, TooltipValue, XAccessor,
};
use crate::observation::Observation;
use crate::palette::SegmentColors;
use crate::scale::LinearScale;
use crate::time::{self, StepDirection};

/// Rendered in place of a missing value
pub const MISSING_VALUE: &str = "–";

/// Horizontal layout of the x axis
#[derive(Debug, Clone, Copy)]
pub enum XPosition<'a> {
    /// One band per domain entry over `width` pixels
    Band { domain: &'a [String], width: f64 },
    /// Dates or numbers mapped continuously
    Continuous(LinearScale),
}

impl XPosition<'_> {
    fn anchor(&self, x: &XAccessor, key: &str) -> f64 {
        match self {
            XPosition::Band { domain, width } => match domain.iter().position(|d| d == key) {
                Some(i) => (i as f64 + 0.5) * width / domain.len() as f64,
                None => 0.0,
            },
            XPosition::Continuous(scale) => x.position_of(key).map(|p| scale.map(p)).unwrap_or(scale.range.0),
        }
    }

    fn width(&self) -> f64 {
        match self {
            XPosition::Band { width, .. } => *width,
            XPosition::Continuous(scale) => (scale.range.1 - scale.range.0).abs(),
        }
    }
}

/// Everything a tooltip needs from the resolved chart
#[derive(Debug, Clone, Copy)]
pub struct TooltipContext<'a> {
    pub x: &'a XAccessor,
    pub y: &'a MeasureAccessor,
    pub segment: Option<&'a SegmentAccessor>,
    /// Segment raw values in chart order
    pub segment_order: &'a [String],
    pub colors: &'a SegmentColors,
    pub x_position: XPosition<'a>,
    pub y_scale: LinearScale,
    pub stacked: bool,
}

/// Rows sharing the band key `key`
pub fn exact_matches<'a>(rows: &'a [Observation], x: &XAccessor, key: &str) -> Vec<&'a Observation> {
    rows.iter().filter(|obs| x.key(obs) == key).collect()
}

/// Distinct dates of `rows`, ascending, each with the raw key it came from
pub fn observed_dates(rows: &[Observation], x: &XAccessor) -> Vec<(NaiveDateTime, String)> {
    let mut dates: Vec<(NaiveDateTime, String)> =
        rows.iter().filter_map(|obs| x.date(obs).map(|d| (d, x.key(obs)))).collect();
    dates.sort_by(|a, b| a.0.cmp(&b.0));
    dates.dedup_by(|a, b| a.0 == b.0);
    dates
}

/// Tooltip for the band under the pointer
pub fn hover_band(rows: &[Observation], ctx: &TooltipContext<'_>, key: &str) -> Option<TooltipPayload> {
    build_payload(&exact_matches(rows, ctx.x, key), key, ctx)
}

/// Tooltip for the observed date nearest to `target`
pub fn hover_date(rows: &[Observation], ctx: &TooltipContext<'_>, target: NaiveDateTime) -> Option<TooltipPayload> {
    let observed = observed_dates(rows, ctx.x);
    let dates: Vec<NaiveDateTime> = observed.iter().map(|(d, _)| *d).collect();
    let i = time::nearest_index(&dates, target)?;
    let date = dates[i];
    let matched: Vec<&Observation> = rows.iter().filter(|obs| ctx.x.date(obs) == Some(date)).collect();
    build_payload(&matched, &observed[i].1, ctx)
}

/// Keyboard stepping of a brush handle over the observed dates
pub fn step_brush(rows: &[Observation], x: &XAccessor, current: NaiveDateTime, direction: StepDirection) -> Option<NaiveDateTime> {
    let dates: Vec<NaiveDateTime> = observed_dates(rows, x).into_iter().map(|(d, _)| d).collect();
    time::step_date(&dates, current, direction)
}

fn build_payload(matched: &[&Observation], key: &str, ctx: &TooltipContext<'_>) -> Option<TooltipPayload> {
    if matched.is_empty() {
        return None;
    }

    // 1. Values in chart segment order; unknown segments last
    let mut rows: Vec<&Observation> = matched.to_vec();
    if let Some(segment) = ctx.segment {
        let rank = |obs: &Observation| {
            let raw = segment.value(obs);
            ctx.segment_order
                .iter()
                .position(|s| *s == raw)
                .unwrap_or(ctx.segment_order.len())
        };
        rows.sort_by_key(|obs| rank(*obs));
    }
    let values: Vec<TooltipValue> = rows
        .iter()
        .map(|obs| {
            let (label, color) = match ctx.segment {
                Some(segment) => (segment.label(obs), ctx.colors.color_of(&segment.value(obs)).to_string()),
                None => (ctx.y.label.clone(), ctx.colors.color_of("").to_string()),
            };
            TooltipValue {
                label,
                value: format_value(ctx.y.get(obs), ctx.y.unit.as_deref()),
                color,
            }
        })
        .collect();

    // 2. Anchors
    let numbers: Vec<f64> = rows.iter().filter_map(|obs| ctx.y.get(obs)).filter(|v| v.is_finite()).collect();
    let y_value = if ctx.stacked {
        numbers.iter().filter(|v| **v > 0.0).sum()
    } else if numbers.is_empty() {
        0.0
    } else {
        numbers.iter().sum::<f64>() / numbers.len() as f64
    };
    let x_anchor = ctx.x_position.anchor(ctx.x, key);
    let y_anchor = ctx.y_scale.map(y_value);

    // 3. Placement
    let width = ctx.x_position.width();
    let placement = Placement {
        x: if x_anchor < width / 4.0 {
            PlacementX::Right
        } else if x_anchor > width * 3.0 / 4.0 {
            PlacementX::Left
        } else {
            PlacementX::Center
        },
        y: if ctx.stacked { PlacementY::Top } else { PlacementY::Middle },
    };

    let datum_value = if ctx.stacked {
        format_value(Some(numbers.iter().sum()), ctx.y.unit.as_deref())
    } else {
        values[0].value.clone()
    };
    let datum = TooltipValue {
        label: ctx.x.labels.display_of(key),
        value: datum_value,
        color: values[0].color.clone(),
    };

    Some(TooltipPayload {
        x_anchor,
        y_anchor,
        placement,
        datum,
        values,
    })
}

/// Format a measurement with at most two decimals and its unit
pub fn format_value(value: Option<f64>, unit: Option<&str>) -> String {
    let Some(value) = value.filter(|v| v.is_finite()) else {
        return MISSING_VALUE.to_string();
    };
    let mut text = format!("{:.2}", value);
    while text.ends_with('0') {
        text.pop();
    }
    if text.ends_with('.') {
        text.pop();
    }
    if text == "-0" {
        text = "0".to_string();
    }
    match unit {
        Some(unit) if !unit.is_empty() => format!("{} {}", text, unit),
        _ => text,
    }
}
