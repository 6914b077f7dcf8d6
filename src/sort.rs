//! Orderings over observations and over category domains.
//!
//! Every function here returns a new vector and uses a stable sort, so rows
//! or categories with equal keys keep their input order (also under `desc`).

use chrono::NaiveDateTime;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::config::{Sorting, SortingOrder, SortingType, XKind};
use crate::ir::XAccessor;
use crate::observation::Observation;
use crate::resolve::{LabelGetter, NumericGetter, StringGetter, TemporalGetter};

/// Missing measure values sort as this
const NULL_SORT_VALUE: f64 = -1.0;

/// What a category ordering needs to know about the rows
#[derive(Debug, Clone, Copy)]
pub struct SortContext<'a> {
    /// Raw category of a row
    pub key: &'a StringGetter,
    pub labels: &'a LabelGetter,
    /// Natural order of temporal categories
    pub temporal: Option<&'a TemporalGetter>,
    pub measure: &'a NumericGetter,
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
enum NaturalKey {
    Date(NaiveDateTime),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Natural(NaturalKey),
    Number(f64),
    /// Declared position, numeric identifier, label
    Auto(f64, f64, String),
}

fn compare_keys(a: &SortKey, b: &SortKey) -> Ordering {
    match (a, b) {
        (SortKey::Natural(a), SortKey::Natural(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
        (SortKey::Auto(pa, ia, la), SortKey::Auto(pb, ib, lb)) => pa
            .total_cmp(pb)
            .then_with(|| ia.total_cmp(ib))
            .then_with(|| la.cmp(lb)),
        _ => Ordering::Equal,
    }
}

/// Stable sort of `items` by precomputed keys
fn sort_by_keys<T: Clone>(items: &[T], keys: Vec<SortKey>, order: SortingOrder) -> Vec<T> {
    let mut indexed: Vec<(usize, SortKey)> = keys.into_iter().enumerate().collect();
    indexed.sort_by(|(_, a), (_, b)| match order {
        SortingOrder::Asc => compare_keys(a, b),
        SortingOrder::Desc => compare_keys(b, a),
    });
    indexed.into_iter().map(|(i, _)| items[i].clone()).collect()
}

fn auto_key(labels: &LabelGetter, raw: &str) -> SortKey {
    match labels.table.get(raw) {
        Some(dv) => {
            let position = dv
                .position
                .as_ref()
                .and_then(|p| p.as_number())
                .unwrap_or(f64::INFINITY);
            let identifier = dv
                .identifier
                .as_ref()
                .and_then(|id| id.trim().parse::<i64>().ok())
                .map_or(f64::INFINITY, |id| id as f64);
            SortKey::Auto(position, identifier, dv.label.clone())
        }
        None => SortKey::Auto(f64::INFINITY, f64::INFINITY, raw.to_string()),
    }
}

fn natural_key(ctx: &SortContext<'_>, raw: &str) -> SortKey {
    let date = ctx.temporal.and_then(|t| t.parse(raw));
    match date {
        Some(date) => SortKey::Natural(NaturalKey::Date(date)),
        None => SortKey::Natural(NaturalKey::Text(ctx.labels.label_of(raw))),
    }
}

/// Distinct raw values in order of first appearance
pub fn distinct_values(rows: &[Observation], key: &StringGetter) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .map(|obs| key.get(obs))
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

/// Sum of the measure per category, computed once up front
pub fn totals_by_category(rows: &[Observation], ctx: &SortContext<'_>) -> HashMap<String, f64> {
    let mut totals: HashMap<String, f64> = HashMap::new();
    for obs in rows {
        let value = ctx.measure.get(obs).filter(|v| !v.is_nan()).unwrap_or(0.0);
        *totals.entry(ctx.key.get(obs)).or_insert(0.0) += value;
    }
    totals
}

/// Measure per category: the sum of its values, or the null sort value when
/// every row of the category is null. Independent of row order.
fn measure_by_category(rows: &[Observation], ctx: &SortContext<'_>) -> HashMap<String, f64> {
    let mut sums: HashMap<String, Option<f64>> = HashMap::new();
    for obs in rows {
        let sum = sums.entry(ctx.key.get(obs)).or_insert(None);
        if let Some(value) = ctx.measure.get(obs).filter(|v| !v.is_nan()) {
            *sum = Some(sum.unwrap_or(0.0) + value);
        }
    }
    sums.into_iter()
        .map(|(category, sum)| (category, sum.unwrap_or(NULL_SORT_VALUE)))
        .collect()
}

/// Order a set of distinct categories (band domains, segments)
pub fn sort_categories(
    categories: &[String],
    rows: &[Observation],
    ctx: &SortContext<'_>,
    sorting: Sorting,
) -> Vec<String> {
    let keys: Vec<SortKey> = match sorting.sorting_type {
        SortingType::ByDimensionLabel => categories.iter().map(|c| natural_key(ctx, c)).collect(),
        SortingType::ByMeasure => {
            let measures = measure_by_category(rows, ctx);
            categories
                .iter()
                .map(|c| SortKey::Number(measures.get(c).copied().unwrap_or(NULL_SORT_VALUE)))
                .collect()
        }
        SortingType::ByTotalSize => {
            let totals = totals_by_category(rows, ctx);
            categories
                .iter()
                .map(|c| SortKey::Number(totals.get(c).copied().unwrap_or(0.0)))
                .collect()
        }
        SortingType::ByAuto => categories.iter().map(|c| auto_key(ctx.labels, c)).collect(),
    };
    sort_by_keys(categories, keys, sorting.sorting_order)
}

/// Order rows by their category with the same policies as `sort_categories`.
/// `ByMeasure` compares each row's own value.
pub fn sort_observations(rows: &[Observation], ctx: &SortContext<'_>, sorting: Sorting) -> Vec<Observation> {
    let keys: Vec<SortKey> = match sorting.sorting_type {
        SortingType::ByDimensionLabel => rows.iter().map(|o| natural_key(ctx, &ctx.key.get(o))).collect(),
        SortingType::ByMeasure => rows
            .iter()
            .map(|o| SortKey::Number(ctx.measure.get(o).unwrap_or(NULL_SORT_VALUE)))
            .collect(),
        SortingType::ByTotalSize => {
            let totals = totals_by_category(rows, ctx);
            rows.iter()
                .map(|o| SortKey::Number(totals.get(&ctx.key.get(o)).copied().unwrap_or(0.0)))
                .collect()
        }
        SortingType::ByAuto => rows.iter().map(|o| auto_key(ctx.labels, &ctx.key.get(o))).collect(),
    };
    sort_by_keys(rows, keys, sorting.sorting_order)
}

/// Rows in ascending x order; line and area charts rely on monotonic x.
/// Rows whose x cannot be read go last, in input order.
pub fn sort_by_x(rows: &[Observation], x: &XAccessor) -> Vec<Observation> {
    let keys: Vec<SortKey> = rows
        .iter()
        .map(|obs| match x.kind {
            XKind::Temporal => match x.date(obs) {
                Some(date) => SortKey::Natural(NaturalKey::Date(date)),
                None => SortKey::Natural(NaturalKey::Text(String::new())),
            },
            XKind::Numeric => SortKey::Number(x.number(obs).unwrap_or(f64::INFINITY)),
            XKind::Band | XKind::None => auto_key(&x.labels, &x.key(obs)),
        })
        .collect();
    sort_by_keys(rows, keys, SortingOrder::Asc)
}

/// One column of a multi-column table sort
#[derive(Debug, Clone)]
pub enum TableColumn {
    Measure(NumericGetter),
    Dimension(LabelGetter),
}

/// Sort table rows by several columns; later columns break ties of earlier ones
pub fn sort_table(rows: &[Observation], columns: &[(TableColumn, SortingOrder)]) -> Vec<Observation> {
    let key_rows: Vec<Vec<SortKey>> = rows
        .iter()
        .map(|obs| {
            columns
                .iter()
                .map(|(column, _)| match column {
                    TableColumn::Measure(getter) => {
                        SortKey::Number(getter.get(obs).unwrap_or(NULL_SORT_VALUE))
                    }
                    TableColumn::Dimension(labels) => {
                        auto_key(labels, &obs.get(&labels.key).as_string())
                    }
                })
                .collect()
        })
        .collect();

    let mut indices: Vec<usize> = (0..rows.len()).collect();
    indices.sort_by(|&a, &b| {
        columns
            .iter()
            .enumerate()
            .map(|(c, (_, order))| {
                let ord = compare_keys(&key_rows[a][c], &key_rows[b][c]);
                match order {
                    SortingOrder::Asc => ord,
                    SortingOrder::Desc => ord.reverse(),
                }
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
    indices.into_iter().map(|i| rows[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::{Component, ComponentVariant, DimensionValue, Position};

    struct Fixture {
        key: StringGetter,
        labels: LabelGetter,
        measure: NumericGetter,
    }

    impl Fixture {
        fn new(values: Vec<DimensionValue>) -> Self {
            let component = Component::dimension("seg", ComponentVariant::Nominal).with_values(values);
            Fixture {
                key: StringGetter::new("seg"),
                labels: LabelGetter::new(&component, false),
                measure: NumericGetter::new("y"),
            }
        }

        fn ctx(&self) -> SortContext<'_> {
            SortContext {
                key: &self.key,
                labels: &self.labels,
                temporal: None,
                measure: &self.measure,
            }
        }
    }

    fn row(x: &str, seg: &str, y: Option<f64>) -> Observation {
        Observation::new().with("x", x).with("seg", seg).with("y", y)
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn make_rows() -> Vec<Observation> {
        vec![
            row("2020", "A", Some(10.0)),
            row("2020", "B", Some(-4.0)),
            row("2021", "A", Some(5.0)),
        ]
    }

    #[test]
    fn test_by_total_size_desc() {
        let fixture = Fixture::new(vec![]);
        let sorted = sort_categories(
            &strings(&["B", "A"]),
            &make_rows(),
            &fixture.ctx(),
            Sorting::new(SortingType::ByTotalSize, SortingOrder::Desc),
        );
        assert_eq!(sorted, strings(&["A", "B"]));
    }

    #[test]
    fn test_by_auto_chain() {
        let fixture = Fixture::new(vec![
            DimensionValue::new("c", "Gamma").with_position(Position::Number(1.0)),
            DimensionValue::new("a", "Alpha").with_position(Position::Number(2.0)),
            DimensionValue::new("b", "Beta").with_identifier("10"),
            DimensionValue::new("d", "Delta").with_identifier("9"),
            DimensionValue::new("e", "Epsilon").with_identifier("x"),
        ]);
        let sorted = sort_categories(
            &strings(&["zz", "e", "a", "b", "c", "d"]),
            &[],
            &fixture.ctx(),
            Sorting::new(SortingType::ByAuto, SortingOrder::Asc),
        );
        // positioned first, then identifiers 9 < 10, then label order among the rest
        assert_eq!(sorted, strings(&["c", "a", "d", "b", "e", "zz"]));
    }

    #[test]
    fn test_unknown_categories_sort_last_by_label() {
        let fixture = Fixture::new(vec![DimensionValue::new("k", "Known").with_position(Position::Number(5.0))]);
        let sorted = sort_categories(
            &strings(&["y", "x", "k"]),
            &[],
            &fixture.ctx(),
            Sorting::new(SortingType::ByAuto, SortingOrder::Asc),
        );
        assert_eq!(sorted, strings(&["k", "x", "y"]));
    }

    #[test]
    fn test_by_measure_treats_null_as_lowest() {
        let fixture = Fixture::new(vec![]);
        let rows = vec![row("1", "A", Some(0.5)), row("1", "B", None), row("1", "C", Some(-0.5))];
        let sorted = sort_categories(
            &strings(&["A", "B", "C"]),
            &rows,
            &fixture.ctx(),
            Sorting::new(SortingType::ByMeasure, SortingOrder::Asc),
        );
        assert_eq!(sorted, strings(&["B", "C", "A"]));
    }

    #[test]
    fn test_by_measure_sums_each_category_regardless_of_row_order() {
        let fixture = Fixture::new(vec![]);
        let sorting = Sorting::new(SortingType::ByMeasure, SortingOrder::Desc);
        let rows = vec![
            row("ZH", "2020", Some(1.0)),
            row("BE", "2020", Some(100.0)),
            row("ZH", "2021", Some(50.0)),
            row("BE", "2021", Some(1.0)),
        ];
        let permuted = vec![rows[3].clone(), rows[1].clone(), rows[2].clone(), rows[0].clone()];
        let categories = strings(&["2020", "2021"]);

        let sorted = sort_categories(&categories, &rows, &fixture.ctx(), sorting);
        assert_eq!(sorted, strings(&["2020", "2021"]));
        assert_eq!(sort_categories(&categories, &permuted, &fixture.ctx(), sorting), sorted);
    }

    #[test]
    fn test_by_measure_ignores_nulls_within_a_category() {
        let fixture = Fixture::new(vec![]);
        let rows = vec![
            row("1", "A", None),
            row("2", "A", Some(-0.5)),
            row("1", "B", None),
        ];
        let sorted = sort_categories(
            &strings(&["A", "B"]),
            &rows,
            &fixture.ctx(),
            Sorting::new(SortingType::ByMeasure, SortingOrder::Asc),
        );
        // A sums to -0.5; only the all-null B sorts as -1
        assert_eq!(sorted, strings(&["B", "A"]));
    }

    #[test]
    fn test_by_dimension_label_uses_labels() {
        let fixture = Fixture::new(vec![
            DimensionValue::new("1", "Zug"),
            DimensionValue::new("2", "Aargau"),
        ]);
        let sorted = sort_categories(
            &strings(&["1", "2"]),
            &[],
            &fixture.ctx(),
            Sorting::new(SortingType::ByDimensionLabel, SortingOrder::Asc),
        );
        assert_eq!(sorted, strings(&["2", "1"]));
    }

    #[test]
    fn test_by_dimension_label_compares_dates() {
        let component =
            Component::dimension("seg", ComponentVariant::Temporal).with_time_format("%d.%m.%Y");
        let temporal = TemporalGetter::new(&component);
        let fixture = Fixture::new(vec![]);
        let ctx = SortContext {
            temporal: Some(&temporal),
            ..fixture.ctx()
        };
        let sorted = sort_categories(
            &strings(&["15.01.2020", "01.01.2021", "01.02.2020"]),
            &[],
            &ctx,
            Sorting::new(SortingType::ByDimensionLabel, SortingOrder::Desc),
        );
        assert_eq!(sorted, strings(&["01.01.2021", "01.02.2020", "15.01.2020"]));
    }

    #[test]
    fn test_sort_is_stable_for_all_types() {
        let fixture = Fixture::new(vec![]);
        // all rows share segment and value, so every key ties
        let rows: Vec<Observation> = (0..6).map(|i| row(&i.to_string(), "S", Some(1.0))).collect();
        for sorting_type in [
            SortingType::ByDimensionLabel,
            SortingType::ByMeasure,
            SortingType::ByTotalSize,
            SortingType::ByAuto,
        ] {
            for order in [SortingOrder::Asc, SortingOrder::Desc] {
                let sorted = sort_observations(&rows, &fixture.ctx(), Sorting::new(sorting_type, order));
                assert_eq!(sorted, rows, "{:?} {:?}", sorting_type, order);
            }
        }
    }

    #[test]
    fn test_sort_does_not_mutate_input() {
        let fixture = Fixture::new(vec![]);
        let rows = make_rows();
        let before = rows.clone();
        let sorted = sort_observations(
            &rows,
            &fixture.ctx(),
            Sorting::new(SortingType::ByMeasure, SortingOrder::Asc),
        );
        assert_eq!(rows, before);
        assert_eq!(sorted[0].get("y").as_f64(), Some(-4.0));
    }

    #[test]
    fn test_distinct_values_first_appearance() {
        let values = distinct_values(&make_rows(), &StringGetter::new("x"));
        assert_eq!(values, strings(&["2020", "2021"]));
    }

    #[test]
    fn test_sort_table_multi_column() {
        let fixture = Fixture::new(vec![]);
        let rows = vec![
            row("1", "B", Some(1.0)),
            row("2", "A", Some(2.0)),
            row("3", "A", Some(1.0)),
        ];
        let sorted = sort_table(
            &rows,
            &[
                (TableColumn::Dimension(fixture.labels.clone()), SortingOrder::Asc),
                (TableColumn::Measure(fixture.measure.clone()), SortingOrder::Desc),
            ],
        );
        let xs: Vec<String> = sorted.iter().map(|o| o.get("x").as_string()).collect();
        assert_eq!(xs, strings(&["2", "3", "1"]));
    }
}
