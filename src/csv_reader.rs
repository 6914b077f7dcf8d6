use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::collections::HashSet;
use std::io;

use crate::observation::{Components, Observation, ObservationValue};

/// Read observations from stdin; see [`read_observations`]
pub fn read_observations_from_stdin(components: &Components) -> Result<Vec<Observation>> {
    read_observations(io::stdin(), components)
}

/// Read one observation per CSV record, keyed by header.
///
/// Empty and `null` cells become nulls. Cells of measure columns must parse
/// as numbers; every other cell is kept as a string.
pub fn read_observations<R: io::Read>(input: R, components: &Components) -> Result<Vec<Observation>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(input);

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read CSV headers")?
        .iter()
        .map(|s| s.trim().to_string())
        .collect();

    let measures: HashSet<&str> = components
        .iter()
        .filter(|c| c.is_measure())
        .map(|c| c.id.as_str())
        .collect();

    let mut observations = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record = result.context("Failed to read CSV record")?;
        let mut obs = Observation::new();
        for (column, cell) in headers.iter().zip(record.iter()) {
            let value = parse_cell(cell, column, measures.contains(column.as_str()), row_idx)?;
            obs.insert(column.clone(), value);
        }
        observations.push(obs);
    }

    Ok(observations)
}

fn parse_cell(cell: &str, column: &str, is_measure: bool, row_idx: usize) -> Result<ObservationValue> {
    let cell = cell.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("null") {
        return Ok(ObservationValue::Null);
    }
    if !is_measure {
        return Ok(ObservationValue::String(cell.to_string()));
    }
    let value = cell.parse::<f64>().with_context(|| {
        format!(
            "Failed to parse value '{}' as number in column '{}' at row {}",
            cell,
            column,
            row_idx + 1
        )
    })?;
    Ok(ObservationValue::Number(value))
}
