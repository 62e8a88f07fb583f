//! Count matrix and gene name index for RNA-seq data

use std::collections::HashMap;

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{PipelineError, Result};

/// A count matrix of RNA-seq read counts
/// Rows are genes, columns are samples. Counts are integer-valued
/// (rounded at load time) but stored as f64 for the statistical model.
#[derive(Debug, Clone)]
pub struct CountMatrix {
    /// Count data (genes x samples)
    counts: Array2<f64>,
    /// Gene identifiers (row labels)
    gene_ids: Vec<String>,
    /// Sample identifiers (column labels)
    sample_ids: Vec<String>,
}

impl CountMatrix {
    /// Create a new count matrix from raw data
    ///
    /// Values are rounded to the nearest integer; upstream quantification
    /// can produce fractional estimated counts but the negative-binomial
    /// model requires integers.
    pub fn new(
        counts: Array2<f64>,
        gene_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let (n_genes, n_samples) = counts.dim();

        if gene_ids.len() != n_genes {
            return Err(PipelineError::MalformedInput {
                reason: format!("expected {} gene ids, got {}", n_genes, gene_ids.len()),
            });
        }

        if sample_ids.len() != n_samples {
            return Err(PipelineError::MalformedInput {
                reason: format!(
                    "expected {} sample ids, got {}",
                    n_samples,
                    sample_ids.len()
                ),
            });
        }

        if counts.iter().any(|&x| x < 0.0 || !x.is_finite()) {
            return Err(PipelineError::MalformedInput {
                reason: "counts must be non-negative finite values".to_string(),
            });
        }

        if !counts.is_empty() && counts.iter().all(|&x| x == 0.0) {
            return Err(PipelineError::MalformedInput {
                reason: "all samples have 0 counts for all genes".to_string(),
            });
        }

        let counts = counts.mapv(f64::round);

        Ok(Self {
            counts,
            gene_ids,
            sample_ids,
        })
    }

    /// Get the number of genes
    pub fn n_genes(&self) -> usize {
        self.counts.nrows()
    }

    /// Get the number of samples
    pub fn n_samples(&self) -> usize {
        self.counts.ncols()
    }

    /// Get the counts as a view
    pub fn counts(&self) -> ArrayView2<'_, f64> {
        self.counts.view()
    }

    /// Get gene IDs
    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    /// Get sample IDs
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Get counts for a specific gene
    pub fn gene_counts(&self, gene_idx: usize) -> ArrayView1<'_, f64> {
        self.counts.row(gene_idx)
    }

    /// Sum of counts per sample (library size)
    pub fn library_sizes(&self) -> Vec<f64> {
        self.counts
            .axis_iter(Axis(1))
            .map(|col| col.sum())
            .collect()
    }
}

/// Mapping from gene id to a human-readable display name
///
/// Built once from the first data column of the raw count table and
/// immutable afterwards. Derived from the same source as the count
/// matrix rows, so a missing entry at annotation time is a schema
/// error, not a recoverable condition.
#[derive(Debug, Clone, Default)]
pub struct GeneNameIndex {
    names: HashMap<String, String>,
}

impl GeneNameIndex {
    /// Build the index from parallel id/name slices
    pub fn new(gene_ids: &[String], gene_names: &[String]) -> Result<Self> {
        if gene_ids.len() != gene_names.len() {
            return Err(PipelineError::MalformedInput {
                reason: format!(
                    "{} gene ids but {} gene names",
                    gene_ids.len(),
                    gene_names.len()
                ),
            });
        }
        let mut names = HashMap::with_capacity(gene_ids.len());
        for (id, name) in gene_ids.iter().zip(gene_names.iter()) {
            if names.insert(id.clone(), name.clone()).is_some() {
                log::warn!("Duplicate gene id '{}' in name index; keeping last entry", id);
            }
        }
        Ok(Self { names })
    }

    /// Look up the display name for a gene id
    pub fn name(&self, gene_id: &str) -> Option<&str> {
        self.names.get(gene_id).map(|s| s.as_str())
    }

    /// Number of indexed genes
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
