//! Size factor estimation using the median of ratios method

use ndarray::{Array1, ArrayView2, Axis};

use crate::error::{PipelineError, Result};

/// Estimate size factors with the median of ratios method
///
/// Accounts for both sequencing depth and RNA composition bias. Genes
/// with a zero count in any sample are skipped for the geometric mean
/// reference, matching the standard estimator.
pub fn median_of_ratios(counts: ArrayView2<f64>) -> Result<Array1<f64>> {
    let (n_genes, n_samples) = counts.dim();

    if n_genes == 0 || n_samples == 0 {
        return Err(PipelineError::StatisticalFitting {
            reason: "count matrix is empty".to_string(),
        });
    }

    // Geometric mean per gene across samples, all-positive genes only
    let mut geo_means = Vec::new();
    let mut reference_genes = Vec::new();

    for (i, row) in counts.axis_iter(Axis(0)).enumerate() {
        if row.iter().all(|&x| x > 0.0) {
            let log_sum: f64 = row.iter().map(|&x| x.ln()).sum();
            geo_means.push((log_sum / n_samples as f64).exp());
            reference_genes.push(i);
        }
    }

    if reference_genes.is_empty() {
        return Err(PipelineError::StatisticalFitting {
            reason: "no genes with all non-zero counts; cannot estimate size factors"
                .to_string(),
        });
    }

    let mut size_factors = Array1::zeros(n_samples);

    for j in 0..n_samples {
        let mut ratios: Vec<f64> = reference_genes
            .iter()
            .zip(geo_means.iter())
            .map(|(&i, &geo_mean)| counts[[i, j]] / geo_mean)
            .collect();

        ratios.sort_by(|a, b| a.total_cmp(b));
        let median = if ratios.len() % 2 == 0 {
            (ratios[ratios.len() / 2 - 1] + ratios[ratios.len() / 2]) / 2.0
        } else {
            ratios[ratios.len() / 2]
        };

        size_factors[j] = median;
    }

    if size_factors.iter().any(|&x| x <= 0.0 || !x.is_finite()) {
        return Err(PipelineError::StatisticalFitting {
            reason: "invalid size factors computed".to_string(),
        });
    }

    Ok(size_factors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_size_factors_track_depth() {
        // Samples 2 and 4 have exactly twice the depth of 1 and 3
        let counts = array![
            [100.0, 200.0, 80.0, 160.0],
            [500.0, 1000.0, 400.0, 800.0],
            [50.0, 100.0, 40.0, 80.0],
        ];
        let sf = median_of_ratios(counts.view()).unwrap();
        assert_eq!(sf.len(), 4);
        assert!(sf.iter().all(|&x| x > 0.0));
        assert!((sf[1] / sf[0] - 2.0).abs() < 1e-9);
        assert!((sf[3] / sf[2] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_zero_reference_fails() {
        let counts = array![[0.0, 10.0], [5.0, 0.0]];
        assert!(matches!(
            median_of_ratios(counts.view()),
            Err(PipelineError::StatisticalFitting { .. })
        ));
    }
}
