//! Interactive filters: legend toggles, time brushes and the time slider.
//!
//! Each active filter becomes one predicate. Views are lists of predicates
//! applied with AND semantics in a single pass; a predicate instance is built
//! once per filter-state snapshot and shared by every view that needs it.

use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use tracing::debug;

use crate::config::{DateRange, InteractiveFilterState, InteractiveFiltersConfig};
use crate::ir::{DerivedViews, ResolvedEncoding};
use crate::observation::Observation;

pub type Predicate = Rc<dyn Fn(&Observation) -> bool>;

/// Names of the derived views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum View {
    Chart,
    Scales,
    Segment,
    TimeRange,
    Padding,
}

impl View {
    pub const ALL: [View; 5] = [
        View::Chart,
        View::Scales,
        View::Segment,
        View::TimeRange,
        View::Padding,
    ];
}

/// The active predicates of one snapshot. Inactive filters are `None`.
#[derive(Clone, Default)]
pub struct FilterSet {
    pub legend: Option<Predicate>,
    pub dashboard_time_range: Option<Predicate>,
    pub time_range: Option<Predicate>,
    pub time_slider: Option<Predicate>,
    /// Scales follow the slider instead of the whole animation
    pub dynamic_scales: bool,
    /// Padding must not move when toggling absolute/percent values
    pub stable_padding: bool,
}

impl fmt::Debug for FilterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterSet")
            .field("legend", &self.legend.is_some())
            .field("dashboard_time_range", &self.dashboard_time_range.is_some())
            .field("time_range", &self.time_range.is_some())
            .field("time_slider", &self.time_slider.is_some())
            .field("dynamic_scales", &self.dynamic_scales)
            .field("stable_padding", &self.stable_padding)
            .finish()
    }
}

impl FilterSet {
    pub fn build(
        encoding: &ResolvedEncoding,
        interactive: &InteractiveFiltersConfig,
        state: &InteractiveFilterState,
    ) -> Self {
        let filters = FilterSet {
            legend: legend_predicate(encoding, state),
            dashboard_time_range: time_range_predicate(encoding, state.dashboard_time_range),
            time_range: time_range_predicate(encoding, state.time_range),
            time_slider: time_slider_predicate(encoding, state),
            dynamic_scales: encoding.animation.as_ref().is_some_and(|a| a.dynamic_scales),
            stable_padding: interactive.calculation,
        };
        debug!(?filters, "built interactive filters");
        filters
    }

    /// Predicates making up `view`, in application order
    pub fn predicates(&self, view: View) -> Vec<Predicate> {
        let time_ranges = [&self.dashboard_time_range, &self.time_range];
        let picked: Vec<&Option<Predicate>> = match view {
            View::Chart => vec![
                &self.legend,
                time_ranges[0],
                time_ranges[1],
                &self.time_slider,
            ],
            View::Scales if self.dynamic_scales => vec![
                &self.legend,
                time_ranges[0],
                time_ranges[1],
                &self.time_slider,
            ],
            View::Scales => vec![&self.legend, time_ranges[0], time_ranges[1]],
            View::Segment => time_ranges.to_vec(),
            View::TimeRange => vec![&self.dashboard_time_range],
            View::Padding if self.stable_padding => vec![&self.legend],
            View::Padding => return self.predicates(View::Chart),
        };
        picked.into_iter().flatten().cloned().collect()
    }

    pub fn view(&self, observations: &[Observation], view: View) -> Vec<Observation> {
        apply(observations, &self.predicates(view))
    }

    pub fn views(&self, observations: &[Observation]) -> DerivedViews {
        DerivedViews {
            chart_data: self.view(observations, View::Chart),
            scales_data: self.view(observations, View::Scales),
            segment_data: self.view(observations, View::Segment),
            time_range_data: self.view(observations, View::TimeRange),
            padding_data: self.view(observations, View::Padding),
        }
    }
}

/// Keep the rows every predicate accepts. Never touches the input.
pub fn apply(observations: &[Observation], predicates: &[Predicate]) -> Vec<Observation> {
    if predicates.is_empty() {
        return observations.to_vec();
    }
    observations
        .iter()
        .filter(|obs| predicates.iter().all(|p| p(*obs)))
        .cloned()
        .collect()
}

fn legend_predicate(encoding: &ResolvedEncoding, state: &InteractiveFilterState) -> Option<Predicate> {
    let segment = encoding.segment.clone()?;
    if state.deactivated_categories.is_empty() {
        return None;
    }
    let deactivated = state.deactivated_categories.clone();
    Some(Rc::new(move |obs: &Observation| {
        !deactivated.contains(&segment.label(obs))
    }))
}

fn time_range_predicate(encoding: &ResolvedEncoding, range: Option<DateRange>) -> Option<Predicate> {
    let range = range?;
    let temporal = encoding.x.as_ref()?.temporal.clone()?;
    Some(Rc::new(move |obs: &Observation| {
        temporal.get(obs).is_some_and(|date| range.contains(&date))
    }))
}

fn time_slider_predicate(encoding: &ResolvedEncoding, state: &InteractiveFilterState) -> Option<Predicate> {
    let animation = encoding.animation.clone()?;
    let value = state.time_slider.clone()?;
    Some(Rc::new(move |obs: &Observation| animation.matches(obs, &value)))
}
