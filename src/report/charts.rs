//! SVG chart rendering for report figures
//!
//! Every function takes already-aggregated data and returns the SVG
//! document as a string. Nothing here touches the filesystem.

use std::collections::BTreeMap;

use svg::node::element::{Line, Rectangle, Text};
use svg::Document;

use crate::contrast::Direction;
use crate::data::TimePoint;
use crate::overlap::{OverlapClass, TimepointGeneSets};
use crate::temporal::TimepointCounts;

const SVG_WIDTH: f32 = 860.0;
const SVG_HEIGHT: f32 = 560.0;
const PLOT_LEFT: f32 = 90.0;
const PLOT_RIGHT: f32 = SVG_WIDTH - 60.0;
const PLOT_TOP: f32 = 80.0;
const PLOT_BOTTOM: f32 = SVG_HEIGHT - 90.0;

const UP_FILL: &str = "#dc2626";
const DOWN_FILL: &str = "#2563eb";
const AXIS_STROKE: &str = "#334155";
const GRID_STROKE: &str = "#e2e8f0";
const TEXT_FILL: &str = "#0f172a";

fn base_document(title: &str, subtitle: &str) -> Document {
    Document::new()
        .set("viewBox", (0, 0, SVG_WIDTH, SVG_HEIGHT))
        .set("width", SVG_WIDTH)
        .set("height", SVG_HEIGHT)
        .add(
            Rectangle::new()
                .set("x", 0)
                .set("y", 0)
                .set("width", SVG_WIDTH)
                .set("height", SVG_HEIGHT)
                .set("fill", "#ffffff"),
        )
        .add(
            Text::new(title.to_string())
                .set("x", PLOT_LEFT)
                .set("y", 34.0)
                .set("font-family", "sans-serif")
                .set("font-size", 18)
                .set("fill", TEXT_FILL),
        )
        .add(
            Text::new(subtitle.to_string())
                .set("x", PLOT_LEFT)
                .set("y", 56.0)
                .set("font-family", "sans-serif")
                .set("font-size", 12)
                .set("fill", "#475569"),
        )
}

fn axes(mut doc: Document, y_max: f64, y_label: &str) -> Document {
    doc = doc
        .add(
            Line::new()
                .set("x1", PLOT_LEFT)
                .set("y1", PLOT_TOP)
                .set("x2", PLOT_LEFT)
                .set("y2", PLOT_BOTTOM)
                .set("stroke", AXIS_STROKE)
                .set("stroke-width", 1.5),
        )
        .add(
            Line::new()
                .set("x1", PLOT_LEFT)
                .set("y1", PLOT_BOTTOM)
                .set("x2", PLOT_RIGHT)
                .set("y2", PLOT_BOTTOM)
                .set("stroke", AXIS_STROKE)
                .set("stroke-width", 1.5),
        )
        .add(
            Text::new(y_label.to_string())
                .set("x", 20.0)
                .set("y", PLOT_TOP - 14.0)
                .set("font-family", "sans-serif")
                .set("font-size", 12)
                .set("fill", "#475569"),
        );

    let n_ticks = 5;
    for tick in 0..=n_ticks {
        let frac = tick as f32 / n_ticks as f32;
        let y = PLOT_BOTTOM - frac * (PLOT_BOTTOM - PLOT_TOP);
        let value = y_max * frac as f64;
        doc = doc
            .add(
                Line::new()
                    .set("x1", PLOT_LEFT)
                    .set("y1", y)
                    .set("x2", PLOT_RIGHT)
                    .set("y2", y)
                    .set("stroke", GRID_STROKE)
                    .set("stroke-width", 1),
            )
            .add(
                Text::new(format!("{:.0}", value))
                    .set("x", PLOT_LEFT - 10.0)
                    .set("y", y + 4.0)
                    .set("text-anchor", "end")
                    .set("font-family", "monospace")
                    .set("font-size", 11)
                    .set("fill", "#475569"),
            );
    }
    doc
}

fn legend(doc: Document) -> Document {
    doc.add(
        Rectangle::new()
            .set("x", PLOT_RIGHT - 160.0)
            .set("y", PLOT_TOP - 44.0)
            .set("width", 12)
            .set("height", 12)
            .set("fill", UP_FILL),
    )
    .add(
        Text::new("up")
            .set("x", PLOT_RIGHT - 142.0)
            .set("y", PLOT_TOP - 34.0)
            .set("font-family", "sans-serif")
            .set("font-size", 12)
            .set("fill", TEXT_FILL),
    )
    .add(
        Rectangle::new()
            .set("x", PLOT_RIGHT - 100.0)
            .set("y", PLOT_TOP - 44.0)
            .set("width", 12)
            .set("height", 12)
            .set("fill", DOWN_FILL),
    )
    .add(
        Text::new("down")
            .set("x", PLOT_RIGHT - 82.0)
            .set("y", PLOT_TOP - 34.0)
            .set("font-family", "sans-serif")
            .set("font-size", 12)
            .set("fill", TEXT_FILL),
    )
}

fn x_tick_label(doc: Document, x: f32, label: &str) -> Document {
    doc.add(
        Text::new(label.to_string())
            .set("x", x)
            .set("y", PLOT_BOTTOM + 22.0)
            .set("text-anchor", "middle")
            .set("font-family", "monospace")
            .set("font-size", 12)
            .set("fill", TEXT_FILL),
    )
}

/// Stacked bar chart of up/down counts per time point
pub fn de_counts_chart(counts: &[TimepointCounts], policy_label: &str) -> String {
    let y_max = counts
        .iter()
        .map(TimepointCounts::total)
        .max()
        .unwrap_or(0)
        .max(1) as f64;

    let mut doc = base_document(
        "Differentially expressed genes per time point",
        &format!("significance: {}", policy_label),
    );
    doc = axes(doc, y_max, "genes");
    doc = legend(doc);

    let n = counts.len().max(1);
    let slot = (PLOT_RIGHT - PLOT_LEFT) / n as f32;
    let bar_width = (slot * 0.55).min(70.0);
    let plot_height = PLOT_BOTTOM - PLOT_TOP;

    for (idx, entry) in counts.iter().enumerate() {
        let x_center = PLOT_LEFT + slot * (idx as f32 + 0.5);
        let up_height = (entry.upregulated as f64 / y_max) as f32 * plot_height;
        let down_height = (entry.downregulated as f64 / y_max) as f32 * plot_height;

        doc = doc
            .add(
                Rectangle::new()
                    .set("x", x_center - bar_width * 0.5)
                    .set("y", PLOT_BOTTOM - up_height)
                    .set("width", bar_width)
                    .set("height", up_height)
                    .set("fill", UP_FILL),
            )
            .add(
                Rectangle::new()
                    .set("x", x_center - bar_width * 0.5)
                    .set("y", PLOT_BOTTOM - up_height - down_height)
                    .set("width", bar_width)
                    .set("height", down_height)
                    .set("fill", DOWN_FILL),
            )
            .add(
                Text::new(format!("{}", entry.total()))
                    .set("x", x_center)
                    .set("y", PLOT_BOTTOM - up_height - down_height - 6.0)
                    .set("text-anchor", "middle")
                    .set("font-family", "monospace")
                    .set("font-size", 11)
                    .set("fill", TEXT_FILL),
            );
        doc = x_tick_label(doc, x_center, entry.time_point.label());
    }

    doc.to_string()
}

/// Grouped bar chart of first-DE onsets per time point and direction
pub fn first_de_counts_chart(
    summary: &BTreeMap<TimePoint, BTreeMap<Direction, usize>>,
    policy_label: &str,
) -> String {
    let y_max = summary
        .values()
        .flat_map(|by_dir| by_dir.values())
        .copied()
        .max()
        .unwrap_or(0)
        .max(1) as f64;

    let mut doc = base_document(
        "Gene onset of differential expression",
        &format!("earliest significant time point per gene, significance: {}", policy_label),
    );
    doc = axes(doc, y_max, "genes");
    doc = legend(doc);

    let n = summary.len().max(1);
    let slot = (PLOT_RIGHT - PLOT_LEFT) / n as f32;
    let bar_width = (slot * 0.28).min(40.0);
    let plot_height = PLOT_BOTTOM - PLOT_TOP;

    for (idx, (time_point, by_dir)) in summary.iter().enumerate() {
        let x_center = PLOT_LEFT + slot * (idx as f32 + 0.5);
        for (direction, offset, fill) in [
            (Direction::Up, -bar_width * 0.55, UP_FILL),
            (Direction::Down, bar_width * 0.55, DOWN_FILL),
        ] {
            let count = by_dir.get(&direction).copied().unwrap_or(0);
            let height = (count as f64 / y_max) as f32 * plot_height;
            doc = doc
                .add(
                    Rectangle::new()
                        .set("x", x_center + offset - bar_width * 0.5)
                        .set("y", PLOT_BOTTOM - height)
                        .set("width", bar_width)
                        .set("height", height)
                        .set("fill", fill),
                )
                .add(
                    Text::new(format!("{}", count))
                        .set("x", x_center + offset)
                        .set("y", PLOT_BOTTOM - height - 6.0)
                        .set("text-anchor", "middle")
                        .set("font-family", "monospace")
                        .set("font-size", 11)
                        .set("fill", TEXT_FILL),
                );
        }
        doc = x_tick_label(doc, x_center, time_point.label());
    }

    doc.to_string()
}

/// Five-number summary over a non-empty sorted slice
fn quartiles(sorted: &[f64]) -> (f64, f64, f64, f64, f64) {
    let quantile = |q: f64| {
        let pos = q * (sorted.len() - 1) as f64;
        let lo = pos.floor() as usize;
        let hi = pos.ceil() as usize;
        let frac = pos - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    };
    (
        sorted[0],
        quantile(0.25),
        quantile(0.5),
        quantile(0.75),
        sorted[sorted.len() - 1],
    )
}

/// Box plot of |log2 fold change| at onset, split by direction
pub fn first_de_lfc_chart(
    magnitudes: &BTreeMap<TimePoint, BTreeMap<Direction, Vec<f64>>>,
    policy_label: &str,
) -> String {
    let y_max = magnitudes
        .values()
        .flat_map(|by_dir| by_dir.values())
        .flatten()
        .fold(0.0_f64, |acc, &v| acc.max(v))
        .max(1.0);

    let mut doc = base_document(
        "Fold change magnitude at onset",
        &format!("|log2 fold change| by first significant time point, significance: {}", policy_label),
    );
    doc = axes(doc, y_max, "|log2FC|");
    doc = legend(doc);

    let n = magnitudes.len().max(1);
    let slot = (PLOT_RIGHT - PLOT_LEFT) / n as f32;
    let box_width = (slot * 0.24).min(36.0);
    let plot_height = PLOT_BOTTOM - PLOT_TOP;
    let y_for = |value: f64| PLOT_BOTTOM - (value / y_max) as f32 * plot_height;

    for (idx, (time_point, by_dir)) in magnitudes.iter().enumerate() {
        let x_center = PLOT_LEFT + slot * (idx as f32 + 0.5);
        for (direction, offset, fill) in [
            (Direction::Up, -box_width * 0.65, UP_FILL),
            (Direction::Down, box_width * 0.65, DOWN_FILL),
        ] {
            let Some(values) = by_dir.get(&direction) else {
                continue;
            };
            if values.is_empty() {
                continue;
            }
            let mut sorted = values.clone();
            sorted.sort_by(f64::total_cmp);
            let (min, q1, median, q3, max) = quartiles(&sorted);
            let x = x_center + offset;

            // whisker, box, median bar
            doc = doc
                .add(
                    Line::new()
                        .set("x1", x)
                        .set("y1", y_for(min))
                        .set("x2", x)
                        .set("y2", y_for(max))
                        .set("stroke", fill)
                        .set("stroke-width", 1.5),
                )
                .add(
                    Rectangle::new()
                        .set("x", x - box_width * 0.5)
                        .set("y", y_for(q3))
                        .set("width", box_width)
                        .set("height", (y_for(q1) - y_for(q3)).max(1.0))
                        .set("fill", fill)
                        .set("opacity", 0.35)
                        .set("stroke", fill)
                        .set("stroke-width", 1.5),
                )
                .add(
                    Line::new()
                        .set("x1", x - box_width * 0.5)
                        .set("y1", y_for(median))
                        .set("x2", x + box_width * 0.5)
                        .set("y2", y_for(median))
                        .set("stroke", fill)
                        .set("stroke-width", 2),
                );
        }
        doc = x_tick_label(doc, x_center, time_point.label());
    }

    doc.to_string()
}

fn class_label(class: &OverlapClass) -> String {
    class
        .time_points
        .iter()
        .map(TimePoint::label)
        .collect::<Vec<_>>()
        .join("+")
}

/// Horizontal bar chart of the exclusive intersection classes for one
/// direction, largest degree first
pub fn overlap_chart(sets: &TimepointGeneSets, policy_label: &str) -> String {
    let mut classes = sets.exclusive_breakdown();
    classes.sort_by(|a, b| {
        b.degree()
            .cmp(&a.degree())
            .then_with(|| a.time_points.cmp(&b.time_points))
    });
    let x_max = classes.iter().map(|c| c.count).max().unwrap_or(0).max(1) as f64;

    let mut doc = base_document(
        &format!("{}regulated gene overlap across time points", sets.direction),
        &format!(
            "genes significant at exactly these time points, significance: {}",
            policy_label
        ),
    );

    doc = doc.add(
        Line::new()
            .set("x1", PLOT_LEFT + 110.0)
            .set("y1", PLOT_TOP)
            .set("x2", PLOT_LEFT + 110.0)
            .set("y2", PLOT_BOTTOM)
            .set("stroke", AXIS_STROKE)
            .set("stroke-width", 1.5),
    );

    let n = classes.len().max(1);
    let slot = ((PLOT_BOTTOM - PLOT_TOP) / n as f32).min(34.0);
    let bar_height = slot * 0.62;
    let bar_left = PLOT_LEFT + 110.0;
    let bar_span = PLOT_RIGHT - bar_left - 50.0;
    let fill = match sets.direction {
        Direction::Up => UP_FILL,
        Direction::Down => DOWN_FILL,
    };

    for (idx, class) in classes.iter().enumerate() {
        let y_center = PLOT_TOP + slot * (idx as f32 + 0.5);
        let width = (class.count as f64 / x_max) as f32 * bar_span;
        doc = doc
            .add(
                Text::new(class_label(class))
                    .set("x", bar_left - 8.0)
                    .set("y", y_center + 4.0)
                    .set("text-anchor", "end")
                    .set("font-family", "monospace")
                    .set("font-size", 11)
                    .set("fill", TEXT_FILL),
            )
            .add(
                Rectangle::new()
                    .set("x", bar_left)
                    .set("y", y_center - bar_height * 0.5)
                    .set("width", width.max(1.0))
                    .set("height", bar_height)
                    .set("fill", fill)
                    .set("opacity", 0.85),
            )
            .add(
                Text::new(format!("{}", class.count))
                    .set("x", bar_left + width.max(1.0) + 8.0)
                    .set("y", y_center + 4.0)
                    .set("font-family", "monospace")
                    .set("font-size", 11)
                    .set("fill", TEXT_FILL),
            );
    }

    doc.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contrast::test_support::row;
    use crate::contrast::ContrastTable;
    use crate::filter::{FilteredGeneSet, MODERATE};
    use crate::temporal;

    fn sample_table() -> ContrastTable {
        ContrastTable::new(vec![
            row("g1", "2", 2.0, 0.001),
            row("g1", "8", 2.5, 0.001),
            row("g2", "8", -1.8, 0.004),
            row("g3", "24", 3.0, 0.02),
        ])
    }

    #[test]
    fn test_de_counts_chart_structure() {
        let table = sample_table();
        let filtered = FilteredGeneSet::from_table(&table, MODERATE);
        let counts = temporal::per_timepoint_summary(&filtered);
        let svg = de_counts_chart(&counts, MODERATE.label);
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Differentially expressed genes per time point"));
        // counts annotated above the bars: 1 up at t=2, 1 up + 1 down at t=8
        assert!(svg.contains("significance: moderate"));
    }

    #[test]
    fn test_first_de_charts_render() {
        let table = sample_table();
        let filtered = FilteredGeneSet::from_table(&table, MODERATE);
        let records = temporal::first_de_records(&filtered);
        let counts_svg =
            first_de_counts_chart(&temporal::first_de_summary(&records), MODERATE.label);
        let lfc_svg =
            first_de_lfc_chart(&temporal::first_de_magnitudes(&records), MODERATE.label);
        assert!(counts_svg.contains("Gene onset of differential expression"));
        assert!(lfc_svg.contains("Fold change magnitude at onset"));
    }

    #[test]
    fn test_overlap_chart_renders_class_labels() {
        let table = sample_table();
        let filtered = FilteredGeneSet::from_table(&table, MODERATE);
        let sets = TimepointGeneSets::from_filtered(&filtered, Direction::Up);
        let svg = overlap_chart(&sets, MODERATE.label);
        assert!(svg.contains("upregulated gene overlap"));
        // g1 is significant at 2 and 8 only
        assert!(svg.contains("2+8"));
    }

    #[test]
    fn test_quartiles_odd_length() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let (min, q1, median, q3, max) = quartiles(&values);
        assert_eq!(min, 1.0);
        assert_eq!(q1, 2.0);
        assert_eq!(median, 3.0);
        assert_eq!(q3, 4.0);
        assert_eq!(max, 5.0);
    }
}
