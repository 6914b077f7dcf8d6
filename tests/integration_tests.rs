use serde_json::Value;
use std::fs;
use std::io::Write;
use std::process::{Command, Stdio};

use chartflow::config::{ChartDocument, InteractiveFilterState};
use chartflow::{compute_chart_data, ChartState, Snapshot};

/// Helper function to run chartflow with a config file, extra args and CSV input
fn run_chartflow(config: &str, args: &[&str], csv_content: &str) -> Result<String, String> {
    let mut child = Command::new(env!("CARGO_BIN_EXE_chartflow"))
        .args(["--config", config])
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("Failed to spawn process: {}", e))?;

    // Write CSV to stdin
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(csv_content.as_bytes())
            .map_err(|e| format!("Failed to write to stdin: {}", e))?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| format!("Failed to wait for process: {}", e))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        Err(String::from_utf8_lossy(&output.stderr).to_string())
    }
}

fn run_json(config: &str, args: &[&str]) -> Value {
    let csv = fs::read_to_string("test/emissions.csv").expect("Failed to read test CSV");
    let result = run_chartflow(config, args, &csv);
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    serde_json::from_str(&result.unwrap()).expect("Output is not valid JSON")
}

fn load_document(path: &str) -> ChartDocument {
    ChartDocument::load(path.as_ref()).expect("Failed to load test config")
}

fn load_observations(document: &ChartDocument) -> Vec<chartflow::observation::Observation> {
    let csv = fs::read_to_string("test/emissions.csv").expect("Failed to read test CSV");
    chartflow::csv_reader::read_observations(csv.as_bytes(), &document.components).unwrap()
}

#[test]
fn test_end_to_end_wide_rows() {
    let output = run_json("test/column.json", &["--view", "wide"]);
    assert_eq!(output["keys"], serde_json::json!(["ZH", "BE", "GE"]));

    let rows = output["rows"].as_array().unwrap();
    let xs: Vec<&str> = rows.iter().map(|r| r["x"].as_str().unwrap()).collect();
    assert_eq!(xs, vec!["2019", "2020", "2021", "2022"]);

    assert_eq!(rows[1]["values"]["ZH"].as_f64(), Some(10.0));
    assert_eq!(rows[1]["values"]["BE"].as_f64(), Some(-4.0));
    assert_eq!(rows[1]["values"]["GE"].as_f64(), Some(0.0));
    assert_eq!(rows[1]["total"].as_f64(), Some(6.0));

    // null GE value imputed as zero
    assert_eq!(rows[2]["values"]["GE"].as_f64(), Some(0.0));
    assert_eq!(rows[2]["total"].as_f64(), Some(5.0));
}

#[test]
fn test_end_to_end_stacked_domain() {
    let output = run_json("test/column.json", &["--view", "domain"]);
    assert_eq!(output["y"]["min"].as_f64(), Some(-4.0));
    assert_eq!(output["y"]["max"].as_f64(), Some(17.0));
    assert_eq!(output["yNice"]["min"].as_f64(), Some(-5.0));
    assert_eq!(output["yNice"]["max"].as_f64(), Some(20.0));
    assert!(output["time"].is_null());
}

#[test]
fn test_end_to_end_stack_order() {
    let output = run_json("test/column.json", &["--view", "stacked"]);
    let keys: Vec<&str> = output
        .as_array()
        .unwrap()
        .iter()
        .map(|layer| layer["key"].as_str().unwrap())
        .collect();
    // first legend entry ends up on top
    assert_eq!(keys, vec!["GE", "BE", "ZH"]);
}

#[test]
fn test_end_to_end_filtered_views() {
    let chart = run_json("test/line_filtered.json", &["--view", "chart"]);
    let rows = chart.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    let pairs: Vec<(&str, &str)> = rows
        .iter()
        .map(|r| (r["year"].as_str().unwrap(), r["canton"].as_str().unwrap()))
        .collect();
    assert_eq!(pairs, vec![("2020", "ZH"), ("2021", "ZH"), ("2021", "GE")]);
    assert!(rows[2]["value"].is_null());

    let segment = run_json("test/line_filtered.json", &["--view", "segment"]);
    assert_eq!(segment.as_array().unwrap().len(), 4);

    let time_range = run_json("test/line_filtered.json", &["--view", "time-range"]);
    assert_eq!(time_range.as_array().unwrap().len(), 7);
}

#[test]
fn test_end_to_end_line_domains() {
    let output = run_json("test/line_filtered.json", &["--view", "domain"]);
    assert_eq!(output["y"]["min"].as_f64(), Some(0.0));
    assert_eq!(output["y"]["max"].as_f64(), Some(10.0));
    assert_eq!(output["time"]["from"], "2019-01-01T00:00:00");
    assert_eq!(output["time"]["to"], "2022-01-01T00:00:00");
}

#[test]
fn test_end_to_end_all_views() {
    let output = run_json("test/column.json", &[]);
    for key in ["views", "xDomain", "segments", "colors", "wide", "stacked", "domains"] {
        assert!(output.get(key).is_some(), "missing '{}'", key);
    }
    assert_eq!(output["views"]["chartData"].as_array().unwrap().len(), 7);
    assert_eq!(output["segments"], serde_json::json!(["ZH", "BE", "GE"]));
    assert_eq!(output["colors"]["ZH"], "#1f77b4");
}

#[test]
fn test_end_to_end_pretty_output() {
    let csv = fs::read_to_string("test/emissions.csv").expect("Failed to read test CSV");
    let result = run_chartflow("test/column.json", &["--view", "segment", "--pretty"], &csv);
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    assert!(result.unwrap().contains("\n  {"));
}

#[test]
fn test_end_to_end_missing_component() {
    let result = run_chartflow("test/missing_component.json", &[], "year,value\n2020,1\n");
    assert!(result.is_err(), "Should have failed with missing component");
    assert!(result.unwrap_err().contains("Component 'month' not found"));
}

#[test]
fn test_end_to_end_non_numeric_measure() {
    let result = run_chartflow("test/column.json", &[], "year,canton,value\n2020,ZH,lots\n");
    assert!(result.is_err(), "Should have failed with non-numeric data");
    assert!(result.unwrap_err().contains("Failed to parse value 'lots'"));
}

#[test]
fn test_end_to_end_missing_config_file() {
    let result = run_chartflow("test/does_not_exist.json", &[], "");
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("Failed to read chart configuration"));
}

#[test]
fn test_end_to_end_empty_data() {
    let csv = "year,canton,value\n";
    let result = run_chartflow("test/column.json", &["--view", "domain"], csv);
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    let output: Value = serde_json::from_str(&result.unwrap()).unwrap();
    assert_eq!(output["y"]["min"].as_f64(), Some(0.0));
    assert_eq!(output["y"]["max"].as_f64(), Some(0.0));
}

// Library-level pipeline tests

#[test]
fn test_library_views_match_binary() {
    let document = load_document("test/line_filtered.json");
    let observations = load_observations(&document);
    let views = compute_chart_data(&observations, &document.components, &document.chart, &document.filters).unwrap();
    assert_eq!(views.chart_data.len(), 3);
    assert_eq!(views.scales_data.len(), 3);
    assert_eq!(views.padding_data.len(), 3);
}

#[test]
fn test_library_filters_are_idempotent() {
    let document = load_document("test/line_filtered.json");
    let observations = load_observations(&document);
    let once = compute_chart_data(&observations, &document.components, &document.chart, &document.filters).unwrap();
    let twice =
        compute_chart_data(&once.chart_data, &document.components, &document.chart, &document.filters).unwrap();
    assert_eq!(once.chart_data, twice.chart_data);
}

#[test]
fn test_library_state_reuses_results() {
    let document = load_document("test/column.json");
    let observations = load_observations(&document);
    let mut state = ChartState::new(document.chart.clone(), document.components.clone()).unwrap();

    let open = InteractiveFilterState::default();
    let first = state.stacked(&Snapshot::new(&observations, &open));
    let second = state.stacked(&Snapshot::new(&observations, &open));
    assert!(std::rc::Rc::ptr_eq(&first, &second));

    let mut toggled = InteractiveFilterState::default();
    toggled.deactivated_categories.insert("Zurich".to_string());
    let third = state.stacked(&Snapshot::new(&observations, &toggled));
    assert!(!std::rc::Rc::ptr_eq(&first, &third));
    assert!(third.iter().all(|layer| layer.key != "ZH"));
}
