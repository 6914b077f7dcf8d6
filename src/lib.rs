// Library exports for chartflow

pub mod config;
pub mod csv_reader;
pub mod observation;
pub mod palette;
pub mod time;

// Pipeline phases
pub mod ir;
pub mod resolve;
pub mod filter;
pub mod sort;
pub mod transform;
pub mod scale;
pub mod tooltip;

pub mod memo;
pub mod pipeline;

pub use pipeline::{compute_chart_data, ChartState, Snapshot};
