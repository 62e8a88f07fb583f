//! Significance filtering of contrast results

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::contrast::{ContrastRow, ContrastTable};

/// A named pair of significance cutoffs
///
/// Pure predicate data; applying a policy never mutates the contrast
/// table. The two cutoffs are independent axes, so gene sets from
/// different presets need not nest even when both cutoffs loosen
/// together; [`compare_policies`] measures the actual overlaps instead
/// of assuming containment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdPolicy {
    pub label: &'static str,
    pub padj_max: f64,
    pub abs_log2fc_min: f64,
}

/// padj < 0.05, |log2FC| > 0.58 (1.5-fold)
pub const MODERATE: ThresholdPolicy = ThresholdPolicy {
    label: "moderate",
    padj_max: 0.05,
    abs_log2fc_min: 0.58,
};

/// padj < 0.05, |log2FC| > 1 (2-fold)
pub const STRINGENT: ThresholdPolicy = ThresholdPolicy {
    label: "stringent",
    padj_max: 0.05,
    abs_log2fc_min: 1.0,
};

/// padj < 0.01, |log2FC| > 2 (4-fold)
pub const VERY_STRINGENT: ThresholdPolicy = ThresholdPolicy {
    label: "very_stringent",
    padj_max: 0.01,
    abs_log2fc_min: 2.0,
};

/// The three fixed presets, loosest first
pub const PRESETS: [ThresholdPolicy; 3] = [MODERATE, STRINGENT, VERY_STRINGENT];

impl ThresholdPolicy {
    /// Whether a contrast row passes this policy
    ///
    /// A missing padj never passes, regardless of fold change.
    pub fn is_significant(&self, row: &ContrastRow) -> bool {
        row.padj.is_finite()
            && row.padj < self.padj_max
            && row.log2_fold_change.abs() > self.abs_log2fc_min
    }
}

/// The contrast rows passing one policy
///
/// Derived on demand from the immutable contrast table and recomputed
/// per policy, never persisted across policy changes.
#[derive(Debug, Clone)]
pub struct FilteredGeneSet<'a> {
    policy: ThresholdPolicy,
    rows: Vec<&'a ContrastRow>,
}

impl<'a> FilteredGeneSet<'a> {
    pub fn from_table(table: &'a ContrastTable, policy: ThresholdPolicy) -> Self {
        let rows = table
            .rows()
            .iter()
            .filter(|r| policy.is_significant(r))
            .collect();
        Self { policy, rows }
    }

    pub fn policy(&self) -> ThresholdPolicy {
        self.policy
    }

    /// Significant rows, in contrast order
    pub fn rows(&self) -> &[&'a ContrastRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct gene ids across all contrasts
    pub fn distinct_genes(&self) -> HashSet<&'a str> {
        self.rows.iter().map(|r| r.gene_id.as_str()).collect()
    }
}

/// Distinct gene counts per policy and pairwise overlaps between them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyComparison {
    /// (policy label, distinct significant gene count)
    pub gene_counts: Vec<(String, usize)>,
    /// (label a, label b, |set a ∩ set b|)
    pub pairwise_overlaps: Vec<(String, String, usize)>,
}

/// Compare the preset policies over one contrast table
pub fn compare_policies(table: &ContrastTable) -> PolicyComparison {
    let sets: Vec<(ThresholdPolicy, HashSet<&str>)> = PRESETS
        .iter()
        .map(|&policy| {
            let set = FilteredGeneSet::from_table(table, policy);
            (policy, set.distinct_genes())
        })
        .collect();

    let gene_counts = sets
        .iter()
        .map(|(p, s)| (p.label.to_string(), s.len()))
        .collect();

    let mut pairwise_overlaps = Vec::new();
    for i in 0..sets.len() {
        for j in (i + 1)..sets.len() {
            let overlap = sets[i].1.intersection(&sets[j].1).count();
            pairwise_overlaps.push((
                sets[i].0.label.to_string(),
                sets[j].0.label.to_string(),
                overlap,
            ));
        }
    }

    PolicyComparison {
        gene_counts,
        pairwise_overlaps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contrast::test_support::row;

    #[test]
    fn test_predicate_both_cutoffs() {
        assert!(STRINGENT.is_significant(&row("g", "2", 1.5, 0.01)));
        assert!(STRINGENT.is_significant(&row("g", "2", -1.5, 0.01)));
        // fold change too small
        assert!(!STRINGENT.is_significant(&row("g", "2", 0.9, 0.01)));
        // padj too large
        assert!(!STRINGENT.is_significant(&row("g", "2", 3.0, 0.06)));
        // boundary values are exclusive
        assert!(!STRINGENT.is_significant(&row("g", "2", 1.0, 0.01)));
        assert!(!STRINGENT.is_significant(&row("g", "2", 1.5, 0.05)));
    }

    #[test]
    fn test_missing_padj_never_passes() {
        let r = row("g", "2", 9.0, f64::NAN);
        for policy in PRESETS {
            assert!(!policy.is_significant(&r));
        }
    }

    #[test]
    fn test_tightening_either_cutoff_shrinks_set() {
        let table = ContrastTable::new(vec![
            row("g1", "2", 0.7, 0.04),
            row("g2", "2", 1.2, 0.04),
            row("g3", "2", 2.5, 0.04),
            row("g4", "2", 2.5, 0.005),
            row("g5", "2", -3.0, 0.002),
        ]);

        let count = |padj_max: f64, lfc_min: f64| {
            let policy = ThresholdPolicy {
                label: "probe",
                padj_max,
                abs_log2fc_min: lfc_min,
            };
            FilteredGeneSet::from_table(&table, policy).len()
        };

        // hold padj fixed, tighten fold change
        assert!(count(0.05, 0.58) >= count(0.05, 1.0));
        assert!(count(0.05, 1.0) >= count(0.05, 2.0));
        // hold fold change fixed, tighten padj
        assert!(count(0.05, 1.0) >= count(0.01, 1.0));
    }

    #[test]
    fn test_compare_policies_counts_distinct_genes() {
        // g1 significant in both contrasts, must count once
        let table = ContrastTable::new(vec![
            row("g1", "2", 2.5, 0.001),
            row("g1", "4", 2.6, 0.001),
            row("g2", "2", 1.2, 0.03),
            row("g3", "2", 0.7, 0.03),
        ]);

        let cmp = compare_policies(&table);
        let by_label: std::collections::HashMap<&str, usize> = cmp
            .gene_counts
            .iter()
            .map(|(l, c)| (l.as_str(), *c))
            .collect();

        assert_eq!(by_label["moderate"], 3);
        assert_eq!(by_label["stringent"], 2);
        assert_eq!(by_label["very_stringent"], 1);

        let overlap = cmp
            .pairwise_overlaps
            .iter()
            .find(|(a, b, _)| a == "moderate" && b == "stringent")
            .map(|(_, _, n)| *n)
            .unwrap();
        assert_eq!(overlap, 2);
    }
}
