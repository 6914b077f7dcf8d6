use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde_json::{json, Value};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use chartflow::config::ChartDocument;
use chartflow::csv_reader;
use chartflow::{ChartState, Snapshot};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ViewArg {
    All,
    Chart,
    Scales,
    Segment,
    TimeRange,
    Padding,
    Wide,
    Stacked,
    Domain,
}

#[derive(Parser, Debug)]
#[command(name = "chartflow")]
#[command(about = "Derive chart-ready data from CSV observations", long_about = None)]
struct Args {
    #[arg(short = 'c', long = "config", required = true, help = "Chart configuration (JSON)")]
    config: PathBuf,

    #[arg(long = "view", value_enum, default_value = "all", help = "Derived value to print")]
    view: ViewArg,

    #[arg(long = "pretty", help = "Pretty-print the JSON output")]
    pretty: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let ChartDocument {
        components,
        chart,
        filters,
    } = ChartDocument::load(&args.config)?;

    let observations = csv_reader::read_observations_from_stdin(&components)
        .context("Failed to read observations from stdin")?;

    let mut state = ChartState::new(chart, components)?;
    let snapshot = Snapshot::new(&observations, &filters);
    let output = render(&mut state, &snapshot, args.view).context("Failed to serialize output")?;

    let text = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", text).context("Failed to write JSON to stdout")?;
    handle.flush().context("Failed to flush stdout")?;

    Ok(())
}

fn render(state: &mut ChartState, snapshot: &Snapshot<'_>, view: ViewArg) -> Result<Value> {
    let value = match view {
        ViewArg::Chart => serde_json::to_value(&state.views(snapshot).chart_data)?,
        ViewArg::Scales => serde_json::to_value(&state.views(snapshot).scales_data)?,
        ViewArg::Segment => serde_json::to_value(&state.views(snapshot).segment_data)?,
        ViewArg::TimeRange => serde_json::to_value(&state.views(snapshot).time_range_data)?,
        ViewArg::Padding => serde_json::to_value(&state.views(snapshot).padding_data)?,
        ViewArg::Wide => serde_json::to_value(&*state.wide_rows(snapshot))?,
        ViewArg::Stacked => serde_json::to_value(&*state.stacked(snapshot))?,
        ViewArg::Domain => serde_json::to_value(&*state.domains(snapshot))?,
        ViewArg::All => {
            let colors: serde_json::Map<String, Value> = state
                .segment_colors(snapshot)
                .iter()
                .map(|(segment, color)| (segment.clone(), Value::String(color.clone())))
                .collect();
            json!({
                "views": serde_json::to_value(&*state.views(snapshot))?,
                "xDomain": serde_json::to_value(&*state.x_domain(snapshot))?,
                "segments": serde_json::to_value(&*state.segments(snapshot))?,
                "colors": colors,
                "wide": serde_json::to_value(&*state.wide_rows(snapshot))?,
                "stacked": serde_json::to_value(&*state.stacked(snapshot))?,
                "domains": serde_json::to_value(&*state.domains(snapshot))?,
            })
        }
    };
    Ok(value)
}
