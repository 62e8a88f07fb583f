//! Differential expression engine
//!
//! The statistical backend sits behind [`DeBackend`] so the
//! aggregation and overlap stages never depend on how effect sizes and
//! p-values were produced. The built-in [`NbWaldBackend`] fits one
//! negative binomial GLM of counts against {time_point, replicate} and
//! extracts a Wald contrast for every non-baseline time point.

mod design;
mod fdr;
mod glm;
mod size_factors;

pub use design::{build_design, DesignInfo};
pub use fdr::benjamini_hochberg;
pub use glm::{estimate_dispersion, fit_gene, GeneFit, GlmFitParams};
pub use size_factors::median_of_ratios;

use rayon::prelude::*;
use statrs::distribution::{ContinuousCDF, Normal};

use crate::contrast::{ContrastRow, ContrastTable};
use crate::data::{CountMatrix, SampleMetadata};
use crate::error::{PipelineError, Result};

/// A swappable differential expression backend
///
/// Implementations produce one long table with a row per gene per
/// time-vs-baseline contrast. Multiple-testing correction must be
/// applied within each contrast independently.
pub trait DeBackend {
    fn fit(&self, counts: &CountMatrix, metadata: &SampleMetadata) -> Result<ContrastTable>;
}

/// Negative binomial Wald-test backend
#[derive(Debug, Clone)]
pub struct NbWaldBackend {
    pub glm: GlmFitParams,
    /// Genes with mean normalized count below this are excluded from
    /// multiple-testing correction and surface with a NaN padj
    pub padj_filter_min_mean: f64,
}

impl Default for NbWaldBackend {
    fn default() -> Self {
        Self {
            glm: GlmFitParams::default(),
            padj_filter_min_mean: 0.5,
        }
    }
}

struct GeneStats {
    log2_fold_change: f64,
    pvalue: f64,
}

impl DeBackend for NbWaldBackend {
    fn fit(&self, counts: &CountMatrix, metadata: &SampleMetadata) -> Result<ContrastTable> {
        metadata.check_alignment(counts.sample_ids())?;

        let (design, info) = build_design(metadata)?;
        log::info!(
            "Fitting counts ~ time_point + replicate, baseline time {}, {} contrasts",
            info.baseline.label(),
            info.time_coefficients.len()
        );

        let size_factors = median_of_ratios(counts.counts())?;
        log::debug!("Size factors: {:?}", size_factors.to_vec());

        let n_genes = counts.n_genes();
        let n_samples = counts.n_samples();
        let raw = counts.counts();

        // Mean normalized count per gene, drives the padj filter and
        // the all-zero short circuit
        let base_means: Vec<f64> = (0..n_genes)
            .map(|i| {
                (0..n_samples)
                    .map(|j| raw[[i, j]] / size_factors[j])
                    .sum::<f64>()
                    / n_samples as f64
            })
            .collect();

        let fits: Vec<Option<GeneFit>> = (0..n_genes)
            .into_par_iter()
            .map(|i| {
                if base_means[i] == 0.0 {
                    return None;
                }
                let gene_counts = counts.gene_counts(i);
                let alpha =
                    estimate_dispersion(gene_counts, size_factors.view(), &design, &self.glm);
                Some(fit_gene(
                    gene_counts,
                    &design,
                    size_factors.view(),
                    alpha,
                    &self.glm,
                ))
            })
            .collect();

        let n_unconverged = fits
            .iter()
            .flatten()
            .filter(|f| !f.converged)
            .count();
        if n_unconverged > 0 {
            log::warn!("{} of {} genes did not converge", n_unconverged, n_genes);
        }

        let normal = Normal::new(0.0, 1.0).map_err(|e| PipelineError::StatisticalFitting {
            reason: format!("cannot construct standard normal: {}", e),
        })?;

        let mut rows = Vec::with_capacity(n_genes * info.time_coefficients.len());
        let ln2 = std::f64::consts::LN_2;

        for (time_point, coef_idx) in &info.time_coefficients {
            let stats: Vec<GeneStats> = fits
                .iter()
                .map(|fit| match fit {
                    Some(f) if f.converged => {
                        let beta = f.coefficients[*coef_idx];
                        let se = f.standard_errors[*coef_idx];
                        let pvalue = if se > 0.0 && se.is_finite() && beta.is_finite() {
                            2.0 * normal.cdf(-(beta / se).abs())
                        } else {
                            f64::NAN
                        };
                        GeneStats {
                            log2_fold_change: beta / ln2,
                            pvalue,
                        }
                    }
                    // All-zero genes report a zero effect; genes the
                    // fitter gave up on report nothing
                    Some(_) | None => GeneStats {
                        log2_fold_change: if fit.is_none() { 0.0 } else { f64::NAN },
                        pvalue: f64::NAN,
                    },
                })
                .collect();

            // Independent-filtering shape: low-mean genes keep their
            // raw p-value but are left out of the correction
            let filtered_pvalues: Vec<f64> = stats
                .iter()
                .zip(base_means.iter())
                .map(|(s, &mean)| {
                    if mean >= self.padj_filter_min_mean {
                        s.pvalue
                    } else {
                        f64::NAN
                    }
                })
                .collect();
            let padj = benjamini_hochberg(&filtered_pvalues);

            for (i, (stat, padj)) in stats.iter().zip(padj.iter()).enumerate() {
                rows.push(ContrastRow {
                    gene_id: counts.gene_ids()[i].clone(),
                    gene_name: String::new(),
                    time_point: time_point.clone(),
                    log2_fold_change: stat.log2_fold_change,
                    pvalue: stat.pvalue,
                    padj: *padj,
                });
            }
        }

        Ok(ContrastTable::new(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CountMatrix;
    use ndarray::Array2;

    fn sample_ids() -> Vec<String> {
        ["trt_0_1", "trt_0_2", "trt_4_1", "trt_4_2", "trt_12_1", "trt_12_2"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn matrix(rows: Vec<(&str, [f64; 6])>) -> CountMatrix {
        let gene_ids: Vec<String> = rows.iter().map(|(id, _)| id.to_string()).collect();
        let flat: Vec<f64> = rows.iter().flat_map(|(_, r)| r.to_vec()).collect();
        let counts = Array2::from_shape_vec((rows.len(), 6), flat).unwrap();
        CountMatrix::new(counts, gene_ids, sample_ids()).unwrap()
    }

    #[test]
    fn test_backend_detects_strong_changes() {
        let counts = matrix(vec![
            // 8x up at both later times
            ("g_up", [100.0, 110.0, 800.0, 820.0, 810.0, 790.0]),
            // 8x down at both later times
            ("g_down", [800.0, 820.0, 100.0, 105.0, 95.0, 100.0]),
            // flat
            ("g_flat1", [300.0, 310.0, 305.0, 295.0, 300.0, 305.0]),
            ("g_flat2", [50.0, 55.0, 48.0, 52.0, 50.0, 49.0]),
            ("g_flat3", [120.0, 118.0, 121.0, 122.0, 119.0, 120.0]),
            ("g_flat4", [600.0, 610.0, 605.0, 595.0, 600.0, 590.0]),
        ]);
        let metadata = SampleMetadata::from_sample_ids(&sample_ids()).unwrap();

        let table = NbWaldBackend::default().fit(&counts, &metadata).unwrap();

        // 6 genes x 2 contrasts
        assert_eq!(table.len(), 12);
        let labels: Vec<String> = table
            .time_points()
            .iter()
            .map(|t| t.label().to_string())
            .collect();
        assert_eq!(labels, vec!["4", "12"]);

        for row in table.rows() {
            match row.gene_id.as_str() {
                "g_up" => {
                    assert!(row.log2_fold_change > 2.0, "lfc = {}", row.log2_fold_change);
                    assert!(row.padj < 0.05, "padj = {}", row.padj);
                }
                "g_down" => {
                    assert!(row.log2_fold_change < -2.0);
                    assert!(row.padj < 0.05);
                }
                _ => {
                    assert!(row.log2_fold_change.abs() < 0.5);
                }
            }
        }
    }

    #[test]
    fn test_all_zero_gene_gets_nan_padj() {
        let counts = matrix(vec![
            ("g_zero", [0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            ("g_a", [100.0, 110.0, 120.0, 115.0, 105.0, 100.0]),
            ("g_b", [200.0, 210.0, 220.0, 215.0, 205.0, 200.0]),
        ]);
        let metadata = SampleMetadata::from_sample_ids(&sample_ids()).unwrap();

        let table = NbWaldBackend::default().fit(&counts, &metadata).unwrap();

        for row in table.rows().iter().filter(|r| r.gene_id == "g_zero") {
            assert_eq!(row.log2_fold_change, 0.0);
            assert!(row.pvalue.is_nan());
            assert!(!row.has_padj());
        }
        assert_eq!(table.n_missing_padj(), 2);
    }
}
