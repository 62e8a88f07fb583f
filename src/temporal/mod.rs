//! Temporal aggregation of significant genes
//!
//! Two views of a filtered gene set: how many genes move in each
//! direction at every time point, and when each gene first becomes
//! differentially expressed (its onset).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::contrast::Direction;
use crate::data::TimePoint;
use crate::filter::FilteredGeneSet;

/// Up/down/total counts for one contrast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimepointCounts {
    pub time_point: TimePoint,
    pub upregulated: usize,
    pub downregulated: usize,
}

impl TimepointCounts {
    pub fn total(&self) -> usize {
        self.upregulated + self.downregulated
    }
}

/// Per-timepoint counts in ascending chronological order
pub fn per_timepoint_summary(filtered: &FilteredGeneSet<'_>) -> Vec<TimepointCounts> {
    let mut by_time: BTreeMap<TimePoint, (usize, usize)> = BTreeMap::new();

    for row in filtered.rows() {
        let entry = by_time.entry(row.time_point.clone()).or_insert((0, 0));
        match row.direction() {
            Direction::Up => entry.0 += 1,
            Direction::Down => entry.1 += 1,
        }
    }

    by_time
        .into_iter()
        .map(|(time_point, (upregulated, downregulated))| TimepointCounts {
            time_point,
            upregulated,
            downregulated,
        })
        .collect()
}

/// Earliest significant change for one gene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirstDeRecord {
    pub gene_id: String,
    pub first_de_time: TimePoint,
    pub direction: Direction,
    pub log2_fold_change: f64,
}

/// Onset record per gene: the minimum time point at which the gene
/// passes the filter
///
/// Tie-break when a gene somehow registers both directions at its
/// earliest time: the larger absolute fold change wins, and equal
/// magnitudes keep the first row in contrast order. This makes the
/// result independent of upstream row ordering.
pub fn first_de_records(filtered: &FilteredGeneSet<'_>) -> Vec<FirstDeRecord> {
    let mut earliest: BTreeMap<&str, FirstDeRecord> = BTreeMap::new();

    for row in filtered.rows() {
        let candidate = FirstDeRecord {
            gene_id: row.gene_id.clone(),
            first_de_time: row.time_point.clone(),
            direction: row.direction(),
            log2_fold_change: row.log2_fold_change,
        };

        match earliest.get_mut(row.gene_id.as_str()) {
            None => {
                earliest.insert(row.gene_id.as_str(), candidate);
            }
            Some(existing) => {
                if candidate.first_de_time < existing.first_de_time
                    || (candidate.first_de_time == existing.first_de_time
                        && candidate.log2_fold_change.abs()
                            > existing.log2_fold_change.abs())
                {
                    *existing = candidate;
                }
            }
        }
    }

    earliest.into_values().collect()
}

/// Onset counts grouped by (time point, direction), chronological
pub fn first_de_summary(
    records: &[FirstDeRecord],
) -> BTreeMap<TimePoint, BTreeMap<Direction, usize>> {
    let mut summary: BTreeMap<TimePoint, BTreeMap<Direction, usize>> = BTreeMap::new();
    for record in records {
        *summary
            .entry(record.first_de_time.clone())
            .or_default()
            .entry(record.direction)
            .or_insert(0) += 1;
    }
    summary
}

/// Absolute fold changes at onset grouped by (time point, direction)
///
/// Feeds the box plot of effect magnitude by onset time.
pub fn first_de_magnitudes(
    records: &[FirstDeRecord],
) -> BTreeMap<TimePoint, BTreeMap<Direction, Vec<f64>>> {
    let mut magnitudes: BTreeMap<TimePoint, BTreeMap<Direction, Vec<f64>>> = BTreeMap::new();
    for record in records {
        magnitudes
            .entry(record.first_de_time.clone())
            .or_default()
            .entry(record.direction)
            .or_default()
            .push(record.log2_fold_change.abs());
    }
    magnitudes
}
