// Segment colors for legends, shapes and tooltips

use indexmap::IndexMap;

use crate::config::ColorMapping;
use crate::ir::SegmentAccessor;

const CATEGORY10: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f", "#bcbd22", "#17becf",
];

const SET2: [&str; 8] = [
    "#66c2a5", "#fc8d62", "#8da0cb", "#e78ac3", "#a6d854", "#ffd92f", "#e5c494", "#b3b3b3",
];

const DARK2: [&str; 8] = [
    "#1b9e77", "#d95f02", "#7570b3", "#e7298a", "#66a61e", "#e6ab02", "#a6761d", "#666666",
];

/// Color palette for categorical data
#[derive(Debug, Clone, PartialEq)]
pub struct ColorPalette {
    colors: Vec<String>,
}

impl ColorPalette {
    /// Category10 color palette (D3)
    pub fn category10() -> Self {
        ColorPalette::from_slice(&CATEGORY10)
    }

    /// Palette by name; unknown names fall back to category10
    pub fn named(name: Option<&str>) -> Self {
        match name {
            Some("set2") => ColorPalette::from_slice(&SET2),
            Some("dark2") => ColorPalette::from_slice(&DARK2),
            _ => ColorPalette::category10(),
        }
    }

    fn from_slice(colors: &[&str]) -> Self {
        ColorPalette {
            colors: colors.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Color for an index, wrapping around past the palette size
    pub fn get_color(&self, index: usize) -> String {
        self.colors[index % self.colors.len()].clone()
    }
}

/// Resolved color of every segment value
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentColors {
    colors: IndexMap<String, String>,
    fallback: String,
}

impl SegmentColors {
    /// Assign colors to `segments` (raw values, display order).
    ///
    /// An explicit mapping wins, then the color declared on the dimension
    /// value, then the palette by position.
    pub fn assign(segments: &[String], accessor: &SegmentAccessor) -> Self {
        let mapping: &ColorMapping = &accessor.field.colors;
        let palette = ColorPalette::named(mapping.palette.as_deref());

        let colors = segments
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                let color = mapping
                    .color_mapping
                    .get(raw)
                    .cloned()
                    .or_else(|| accessor.labels.table.get(raw).and_then(|dv| dv.color.clone()))
                    .unwrap_or_else(|| palette.get_color(i));
                (raw.clone(), color)
            })
            .collect();

        SegmentColors {
            colors,
            fallback: palette.get_color(0),
        }
    }

    /// One color for charts without a segment
    pub fn single(color: Option<&str>) -> Self {
        SegmentColors {
            colors: IndexMap::new(),
            fallback: color.map(str::to_string).unwrap_or_else(|| ColorPalette::category10().get_color(0)),
        }
    }

    pub fn color_of(&self, raw: &str) -> &str {
        self.colors.get(raw).unwrap_or(&self.fallback)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.colors.iter()
    }
}
