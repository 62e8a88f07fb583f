//! Long-format contrast results: one row per gene per time-vs-baseline
//! comparison

use serde::{Deserialize, Serialize};

use crate::data::{GeneNameIndex, TimePoint};
use crate::error::{PipelineError, Result};

/// Direction of a fold change
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Classify a log2 fold change by sign
    ///
    /// Zero fold changes never pass a positive magnitude threshold, so
    /// the Up assignment for exactly 0.0 is unobservable downstream.
    pub fn of(log2_fold_change: f64) -> Self {
        if log2_fold_change < 0.0 {
            Direction::Down
        } else {
            Direction::Up
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// One gene in one contrast
///
/// `pvalue` and `padj` use NaN for missing values. Genes excluded from
/// multiple-testing correction by low-count filtering keep their raw
/// p-value but carry a NaN `padj`; they are treated as not significant,
/// never as an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContrastRow {
    pub gene_id: String,
    pub gene_name: String,
    pub time_point: TimePoint,
    pub log2_fold_change: f64,
    pub pvalue: f64,
    pub padj: f64,
}

impl ContrastRow {
    /// Whether the adjusted p-value is present
    pub fn has_padj(&self) -> bool {
        self.padj.is_finite()
    }

    /// Direction of the fold change
    pub fn direction(&self) -> Direction {
        Direction::of(self.log2_fold_change)
    }
}

/// Union of per-contrast result tables across all non-baseline time
/// points. Produced once by the engine, immutable afterwards.
#[derive(Debug, Clone, Default)]
pub struct ContrastTable {
    rows: Vec<ContrastRow>,
}

impl ContrastTable {
    pub fn new(rows: Vec<ContrastRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[ContrastRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct contrast time points in ascending numeric order
    pub fn time_points(&self) -> Vec<TimePoint> {
        let mut points: Vec<TimePoint> =
            self.rows.iter().map(|r| r.time_point.clone()).collect();
        points.sort();
        points.dedup();
        points
    }

    /// Rows belonging to one contrast
    pub fn rows_at<'a>(&'a self, time_point: &'a TimePoint) -> impl Iterator<Item = &'a ContrastRow> {
        self.rows.iter().filter(move |r| &r.time_point == time_point)
    }

    /// Number of rows with a missing adjusted p-value
    ///
    /// Reported for transparency: these genes are invisible to every
    /// significance filter but remain in the table.
    pub fn n_missing_padj(&self) -> usize {
        self.rows.iter().filter(|r| !r.has_padj()).count()
    }

    /// Annotate rows with display names via an inner join on gene_id
    ///
    /// The index is derived from the same source as the gene ids, so a
    /// missing entry is a fatal schema error.
    pub fn annotate(&mut self, names: &GeneNameIndex) -> Result<()> {
        for row in &mut self.rows {
            match names.name(&row.gene_id) {
                Some(name) => row.gene_name = name.to_string(),
                None => {
                    return Err(PipelineError::Alignment {
                        reason: format!(
                            "gene id '{}' has no entry in the gene name index",
                            row.gene_id
                        ),
                    })
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Hand-built contrast row for aggregator tests
    pub fn row(gene_id: &str, time: &str, lfc: f64, padj: f64) -> ContrastRow {
        ContrastRow {
            gene_id: gene_id.to_string(),
            gene_name: gene_id.to_lowercase(),
            time_point: TimePoint::parse(time).unwrap(),
            log2_fold_change: lfc,
            pvalue: if padj.is_finite() { padj / 2.0 } else { f64::NAN },
            padj,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::row;
    use super::*;

    #[test]
    fn test_direction_of_sign() {
        assert_eq!(Direction::of(1.5), Direction::Up);
        assert_eq!(Direction::of(-0.2), Direction::Down);
    }

    #[test]
    fn test_time_points_sorted_numerically() {
        let table = ContrastTable::new(vec![
            row("g1", "12", 1.0, 0.01),
            row("g1", "2", 1.0, 0.01),
            row("g2", "4", -1.0, 0.20),
        ]);
        let labels: Vec<String> = table
            .time_points()
            .iter()
            .map(|t| t.label().to_string())
            .collect();
        assert_eq!(labels, vec!["2", "4", "12"]);
    }

    #[test]
    fn test_missing_padj_count() {
        let table = ContrastTable::new(vec![
            row("g1", "2", 1.0, 0.01),
            row("g2", "2", 3.0, f64::NAN),
            row("g3", "2", -2.0, f64::NAN),
        ]);
        assert_eq!(table.n_missing_padj(), 2);
    }

    #[test]
    fn test_annotate_inner_join() {
        let ids = vec!["g1".to_string()];
        let names = vec!["GeneOne".to_string()];
        let index = GeneNameIndex::new(&ids, &names).unwrap();

        let mut table = ContrastTable::new(vec![row("g1", "2", 1.0, 0.01)]);
        table.annotate(&index).unwrap();
        assert_eq!(table.rows()[0].gene_name, "GeneOne");

        let mut bad = ContrastTable::new(vec![row("g2", "2", 1.0, 0.01)]);
        assert!(matches!(
            bad.annotate(&index),
            Err(PipelineError::Alignment { .. })
        ));
    }
}
