use chrono::NaiveDateTime;
use serde::Serialize;

use crate::config::{DateRange, MinPolicy};
use crate::ir::{Domain, DualAxisDomains, MeasureAccessor, StackLayer, XAccessor};
use crate::observation::{Observation, ScaleType};

/// Value domain of one measure over `rows`.
///
/// With error whiskers enabled the domain spans the lower and upper bounds
/// too. Empty or all-null input yields `[0, 0]`.
pub fn y_domain(rows: &[Observation], y: &MeasureAccessor, policy: MinPolicy) -> Domain {
    let values = rows.iter().flat_map(|obs| {
        let (lower, upper) = y.error_bounds(obs).unwrap_or((None, None));
        [y.get(obs), lower, upper]
    });
    apply_min_policy(extent(values.flatten()), policy, y.scale_type)
}

/// Domain of a numeric x axis (scatterplots)
pub fn x_numeric_domain(rows: &[Observation], x: &XAccessor, policy: MinPolicy, scale_type: Option<ScaleType>) -> Domain {
    let values = rows.iter().filter_map(|obs| x.number(obs));
    apply_min_policy(extent(values), policy, scale_type)
}

/// Domain of stacked layers: every `y0` and `y1`, always including zero
pub fn stacked_domain(layers: &[StackLayer]) -> Domain {
    let values = layers
        .iter()
        .flat_map(|layer| layer.offsets.iter())
        .flat_map(|[y0, y1]| [*y0, *y1]);
    apply_min_policy(extent(values), MinPolicy::ZeroBaseline, None)
}

/// Left and right domains of a dual-axis chart, each with its own extent
pub fn dual_axis_domains(
    rows: &[Observation],
    left: &MeasureAccessor,
    right: &MeasureAccessor,
    policy: MinPolicy,
) -> DualAxisDomains {
    let left = y_domain(rows, left, policy);
    let right = y_domain(rows, right, policy);
    DualAxisDomains {
        left,
        right,
        union: left.union(&right),
    }
}

/// First and last date of a temporal x; `None` when no row has a date
pub fn time_extent(rows: &[Observation], x: &XAccessor) -> Option<DateRange> {
    let mut dates = rows.iter().filter_map(|obs| x.date(obs));
    let first = dates.next()?;
    let (from, to) = dates.fold((first, first), |(from, to): (NaiveDateTime, NaiveDateTime), d| {
        (from.min(d), to.max(d))
    });
    Some(DateRange { from, to })
}

fn extent(values: impl Iterator<Item = f64>) -> Option<Domain> {
    values
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<Domain>, v| match acc {
            Some(d) => Some(Domain::new(d.min.min(v), d.max.max(v))),
            None => Some(Domain::new(v, v)),
        })
}

/// The true minimum is only kept for interval measures; everything else
/// is anchored at zero.
fn apply_min_policy(extent: Option<Domain>, policy: MinPolicy, scale_type: Option<ScaleType>) -> Domain {
    let Some(extent) = extent else {
        return Domain::zero();
    };
    match (policy, scale_type) {
        (MinPolicy::DynamicMinimum, Some(ScaleType::Interval)) => extent,
        _ => Domain::new(extent.min.min(0.0), extent.max.max(0.0)),
    }
}

/// Continuous mapping from a domain onto a pixel range
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearScale {
    pub domain: Domain,
    pub range: (f64, f64),
}

impl LinearScale {
    pub fn new(domain: Domain, range: (f64, f64)) -> Self {
        LinearScale { domain, range }
    }

    /// Map a domain value into the range. A degenerate domain maps
    /// everything onto the range start.
    pub fn map(&self, value: f64) -> f64 {
        let span = self.domain.span();
        if span == 0.0 || !span.is_finite() {
            return self.range.0;
        }
        let t = (value - self.domain.min) / span;
        self.range.0 + t * (self.range.1 - self.range.0)
    }
}

/// Widen a domain to multiples of a round tick step (1, 2 or 5 × 10ⁿ),
/// aiming at about `count` ticks.
pub fn nice_domain(domain: Domain, count: usize) -> Domain {
    let mut nice = domain;
    if !(nice.span() > 0.0) || !nice.span().is_finite() {
        return nice;
    }

    let mut previous_step = None;
    for _ in 0..10 {
        let step = tick_step(nice.min, nice.max, count);
        if previous_step == Some(step) || !step.is_finite() || step == 0.0 {
            break;
        }
        nice = Domain::new((nice.min / step).floor() * step, (nice.max / step).ceil() * step);
        previous_step = Some(step);
    }
    nice
}

fn tick_step(start: f64, stop: f64, count: usize) -> f64 {
    let raw = (stop - start).abs() / count.max(1) as f64;
    let mut step = 10f64.powf(raw.log10().floor());
    let error = raw / step;
    if error >= 50f64.sqrt() {
        step *= 10.0;
    } else if error >= 10f64.sqrt() {
        step *= 5.0;
    } else if error >= 2f64.sqrt() {
        step *= 2.0;
    }
    step
}
