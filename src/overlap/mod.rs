//! Multi-set overlap of significant genes across time points
//!
//! For one direction, each time point contributes the set of genes
//! significant there. Two quantities come out: the exclusive
//! intersection breakdown (for every non-empty subset of time points,
//! the genes present in exactly those sets and no others) and the
//! plain full intersection (genes present at every time point).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::contrast::Direction;
use crate::data::TimePoint;
use crate::filter::FilteredGeneSet;

/// Per-direction, per-timepoint gene id sets
///
/// Time points are kept in ascending numeric order; all derived
/// groupings and chart legends inherit that order.
#[derive(Debug, Clone)]
pub struct TimepointGeneSets {
    pub direction: Direction,
    /// (time point, gene ids significant there), chronological
    pub sets: Vec<(TimePoint, BTreeSet<String>)>,
}

impl TimepointGeneSets {
    /// Build the per-timepoint sets for one direction
    pub fn from_filtered(filtered: &FilteredGeneSet<'_>, direction: Direction) -> Self {
        let mut by_time: BTreeMap<TimePoint, BTreeSet<String>> = BTreeMap::new();

        for row in filtered.rows() {
            if row.direction() == direction {
                by_time
                    .entry(row.time_point.clone())
                    .or_default()
                    .insert(row.gene_id.clone());
            }
        }

        Self {
            direction,
            sets: by_time.into_iter().collect(),
        }
    }

    /// Number of time points carrying at least one gene
    pub fn n_sets(&self) -> usize {
        self.sets.len()
    }

    /// Genes present in every time point's set, iterative intersection
    ///
    /// Unlike the exclusive breakdown this does not require absence
    /// anywhere; it is the "consistently changed at all time points"
    /// quantity, reported separately. Sorted by gene id.
    pub fn full_intersection(&self) -> Vec<String> {
        let mut iter = self.sets.iter().map(|(_, set)| set);
        let first = match iter.next() {
            Some(set) => set.clone(),
            None => return vec![],
        };
        let common = iter.fold(first, |acc, set| {
            acc.intersection(set).cloned().collect()
        });
        common.into_iter().collect()
    }

    /// Exclusive intersection sizes for every non-empty time point
    /// subset
    ///
    /// A gene contributes to exactly one subset: the one matching its
    /// full membership pattern. Subsets with zero genes are omitted.
    pub fn exclusive_breakdown(&self) -> Vec<OverlapClass> {
        let n = self.sets.len();
        if n == 0 {
            return vec![];
        }

        // Membership bitmask per gene, bit i = present at sets[i]
        let mut patterns: HashMap<&str, u64> = HashMap::new();
        for (i, (_, set)) in self.sets.iter().enumerate() {
            for gene in set {
                *patterns.entry(gene.as_str()).or_insert(0) |= 1 << i;
            }
        }

        let mut counts: BTreeMap<u64, usize> = BTreeMap::new();
        for &mask in patterns.values() {
            *counts.entry(mask).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .map(|(mask, count)| OverlapClass {
                time_points: self
                    .sets
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| mask & (1 << i) != 0)
                    .map(|(_, (tp, _))| tp.clone())
                    .collect(),
                count,
            })
            .collect()
    }
}

/// One exclusive intersection class: the genes present at exactly
/// these time points
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlapClass {
    /// Member time points, chronological
    pub time_points: Vec<TimePoint>,
    pub count: usize,
}

impl OverlapClass {
    /// Degree of the intersection (how many sets intersect)
    pub fn degree(&self) -> usize {
        self.time_points.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contrast::test_support::row;
    use crate::contrast::ContrastTable;
    use crate::filter::{FilteredGeneSet, STRINGENT};

    /// g_all up at 2, 4, 12; g_late up at 4 and 12; g_single up at 4
    /// only; g_down down at 2
    fn table() -> ContrastTable {
        ContrastTable::new(vec![
            row("g_all", "2", 2.0, 0.01),
            row("g_all", "4", 2.1, 0.01),
            row("g_all", "12", 2.2, 0.01),
            row("g_late", "4", 1.5, 0.01),
            row("g_late", "12", 1.6, 0.01),
            row("g_single", "4", 3.0, 0.01),
            row("g_down", "2", -2.0, 0.01),
        ])
    }

    fn up_sets(table: &ContrastTable) -> TimepointGeneSets {
        let filtered = FilteredGeneSet::from_table(table, STRINGENT);
        TimepointGeneSets::from_filtered(&filtered, Direction::Up)
    }

    #[test]
    fn test_sets_split_by_direction() {
        let table = table();
        let filtered = FilteredGeneSet::from_table(&table, STRINGENT);
        let up = TimepointGeneSets::from_filtered(&filtered, Direction::Up);
        let down = TimepointGeneSets::from_filtered(&filtered, Direction::Down);

        assert_eq!(up.n_sets(), 3);
        assert_eq!(down.n_sets(), 1);
        assert!(down.sets[0].1.contains("g_down"));
    }

    #[test]
    fn test_sets_chronological() {
        let table = table();
        let up = up_sets(&table);
        let labels: Vec<&str> = up.sets.iter().map(|(tp, _)| tp.label()).collect();
        assert_eq!(labels, vec!["2", "4", "12"]);
    }

    #[test]
    fn test_full_intersection() {
        let table = table();
        let up = up_sets(&table);
        assert_eq!(up.full_intersection(), vec!["g_all".to_string()]);
    }

    #[test]
    fn test_full_intersection_subset_of_each_set() {
        let table = table();
        let up = up_sets(&table);
        let common = up.full_intersection();
        for (_, set) in &up.sets {
            for gene in &common {
                assert!(set.contains(gene));
            }
        }
    }

    #[test]
    fn test_exclusive_breakdown() {
        let table = table();
        let up = up_sets(&table);
        let breakdown = up.exclusive_breakdown();

        let find = |labels: &[&str]| {
            breakdown
                .iter()
                .find(|c| {
                    let got: Vec<&str> =
                        c.time_points.iter().map(|tp| tp.label()).collect();
                    got == labels
                })
                .map(|c| c.count)
        };

        // g_single is at 4 only, exclusively
        assert_eq!(find(&["4"]), Some(1));
        // g_late is at 4 and 12 but not 2
        assert_eq!(find(&["4", "12"]), Some(1));
        // g_all is everywhere
        assert_eq!(find(&["2", "4", "12"]), Some(1));
        // nothing is exclusive to 2 in the up direction
        assert_eq!(find(&["2"]), None);
    }

    #[test]
    fn test_exclusive_classes_partition_all_genes() {
        let table = table();
        let up = up_sets(&table);

        let distinct: BTreeSet<&String> =
            up.sets.iter().flat_map(|(_, set)| set.iter()).collect();
        let total: usize = up.exclusive_breakdown().iter().map(|c| c.count).sum();
        assert_eq!(total, distinct.len());
    }
}
