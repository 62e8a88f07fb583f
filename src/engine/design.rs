//! Design matrix construction for the time-course model

use ndarray::Array2;

use crate::data::{SampleMetadata, TimePoint};
use crate::error::{PipelineError, Result};

/// Metadata about the fitted design
///
/// `time_coefficients` records, for each non-baseline time point in
/// ascending order, the design column holding its vs-baseline effect.
#[derive(Debug, Clone)]
pub struct DesignInfo {
    pub coef_names: Vec<String>,
    pub baseline: TimePoint,
    pub time_coefficients: Vec<(TimePoint, usize)>,
}

/// Build the model matrix for counts ~ time_point + replicate
///
/// Treatment coding with the baseline time as the time_point reference
/// and the first (sorted) replicate as the replicate reference. The
/// time-vs-baseline contrasts are then read directly off the time
/// indicator coefficients.
pub fn build_design(metadata: &SampleMetadata) -> Result<(Array2<f64>, DesignInfo)> {
    let time_points = metadata.time_points();
    let replicates = metadata.replicates();
    let n_samples = metadata.n_samples();

    if time_points.len() < 2 {
        return Err(PipelineError::StatisticalFitting {
            reason: format!(
                "need at least 2 time points to form a contrast, found {}",
                time_points.len()
            ),
        });
    }

    let baseline = time_points[0].clone();
    let non_baseline = &time_points[1..];
    let non_ref_reps: &[String] = if replicates.len() > 1 {
        &replicates[1..]
    } else {
        &[]
    };

    let n_coefs = 1 + non_baseline.len() + non_ref_reps.len();
    if n_samples <= n_coefs {
        return Err(PipelineError::StatisticalFitting {
            reason: format!(
                "design is rank deficient: {} samples for {} coefficients \
                 ({} time points, {} replicates); covariate levels need replicate variation",
                n_samples,
                n_coefs,
                time_points.len(),
                replicates.len()
            ),
        });
    }

    let mut design: Array2<f64> = Array2::zeros((n_samples, n_coefs));
    let mut coef_names = vec!["Intercept".to_string()];
    let mut time_coefficients = Vec::with_capacity(non_baseline.len());

    for (j, tp) in non_baseline.iter().enumerate() {
        coef_names.push(format!("time_{}_vs_{}", tp.label(), baseline.label()));
        time_coefficients.push((tp.clone(), 1 + j));
    }
    for rep in non_ref_reps {
        coef_names.push(format!("replicate_{}", rep));
    }

    for (i, sample) in metadata.samples().iter().enumerate() {
        design[[i, 0]] = 1.0;
        for (j, tp) in non_baseline.iter().enumerate() {
            if &sample.time_point == tp {
                design[[i, 1 + j]] = 1.0;
            }
        }
        for (k, rep) in non_ref_reps.iter().enumerate() {
            if &sample.replicate == rep {
                design[[i, 1 + non_baseline.len() + k]] = 1.0;
            }
        }
    }

    // Every modeled level must actually appear in the data
    for j in 0..n_coefs {
        let col_sum: f64 = (0..n_samples).map(|i| design[[i, j]].abs()).sum();
        if col_sum == 0.0 {
            return Err(PipelineError::StatisticalFitting {
                reason: format!("design matrix column '{}' is all zeros", coef_names[j]),
            });
        }
    }

    Ok((
        design,
        DesignInfo {
            coef_names,
            baseline,
            time_coefficients,
        },
    ))
}
