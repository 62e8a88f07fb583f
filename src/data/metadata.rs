//! Per-sample covariates derived from structured sample identifiers

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Delimiter between fields of a sample identifier
pub const SAMPLE_ID_DELIMITER: char = '_';

/// A time point with its numeric position attached at construction
///
/// Carrying the parsed number here removes the repeated string surgery
/// that deriving chronological order from contrast names would need at
/// every use site. Ordering is by numeric value; equality and hashing
/// are by label (labels with equal values compare equal in practice
/// because both come from the same identifier field).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimePoint {
    label: String,
    value: f64,
}

impl TimePoint {
    /// Parse a time point from its textual label
    pub fn parse(label: &str) -> Option<Self> {
        let value = label.trim().parse::<f64>().ok()?;
        if !value.is_finite() {
            return None;
        }
        Some(Self {
            label: label.trim().to_string(),
            value,
        })
    }

    /// The textual label as it appeared in the sample id
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The numeric position on the time axis
    pub fn value(&self) -> f64 {
        self.value
    }
}

impl PartialEq for TimePoint {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label
    }
}

impl Eq for TimePoint {}

impl Hash for TimePoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.label.hash(state);
    }
}

impl PartialOrd for TimePoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimePoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .total_cmp(&other.value)
            .then_with(|| self.label.cmp(&other.label))
    }
}

impl std::fmt::Display for TimePoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label)
    }
}

/// Covariates for a single sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleInfo {
    pub sample_id: String,
    pub group: String,
    pub time_point: TimePoint,
    pub replicate: String,
}

/// Ordered per-sample covariates for the whole experiment
///
/// Keyed identically to the count matrix columns, in the same order.
/// The caller must verify that alignment explicitly before model
/// fitting; silent misalignment would mis-associate every sample.
#[derive(Debug, Clone)]
pub struct SampleMetadata {
    samples: Vec<SampleInfo>,
}

impl SampleMetadata {
    /// Build metadata by parsing structured sample identifiers
    ///
    /// Each id has the form `<group>_<time_point>_<replicate>`; fields
    /// are consumed positionally (index 1 = time point, index 2 =
    /// replicate). Extra trailing fields are tolerated.
    pub fn from_sample_ids<S: AsRef<str>>(sample_ids: &[S]) -> Result<Self> {
        let mut samples = Vec::with_capacity(sample_ids.len());

        for id in sample_ids {
            let id = id.as_ref();
            let fields: Vec<&str> = id.split(SAMPLE_ID_DELIMITER).collect();
            if fields.len() < 3 {
                return Err(PipelineError::SampleIdFormat {
                    sample_id: id.to_string(),
                    reason: format!(
                        "expected at least 3 '{}'-delimited fields, found {}",
                        SAMPLE_ID_DELIMITER,
                        fields.len()
                    ),
                });
            }

            let time_point = TimePoint::parse(fields[1]).ok_or_else(|| {
                PipelineError::SampleIdFormat {
                    sample_id: id.to_string(),
                    reason: format!("time point field '{}' is not numeric", fields[1]),
                }
            })?;

            samples.push(SampleInfo {
                sample_id: id.to_string(),
                group: fields[0].to_string(),
                time_point,
                replicate: fields[2].to_string(),
            });
        }

        Ok(Self { samples })
    }

    /// Get the samples in column order
    pub fn samples(&self) -> &[SampleInfo] {
        &self.samples
    }

    /// Number of samples
    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    /// Sample ids in column order
    pub fn sample_ids(&self) -> Vec<&str> {
        self.samples.iter().map(|s| s.sample_id.as_str()).collect()
    }

    /// Distinct time points in ascending numeric order
    pub fn time_points(&self) -> Vec<TimePoint> {
        let mut points: Vec<TimePoint> = self
            .samples
            .iter()
            .map(|s| s.time_point.clone())
            .collect();
        points.sort();
        points.dedup();
        points
    }

    /// Distinct replicate labels, sorted
    pub fn replicates(&self) -> Vec<String> {
        let mut reps: Vec<String> = self.samples.iter().map(|s| s.replicate.clone()).collect();
        reps.sort();
        reps.dedup();
        reps
    }

    /// The baseline: the earliest time point in the experiment
    pub fn baseline(&self) -> Result<TimePoint> {
        self.time_points()
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::Alignment {
                reason: "metadata contains no samples".to_string(),
            })
    }

    /// Verify column-order equality against the count matrix columns
    ///
    /// Fatal on violation: downstream model fitting would silently
    /// mis-associate samples otherwise.
    pub fn check_alignment<S: AsRef<str>>(&self, matrix_columns: &[S]) -> Result<()> {
        if matrix_columns.len() != self.samples.len() {
            return Err(PipelineError::Alignment {
                reason: format!(
                    "count matrix has {} columns, metadata has {} samples",
                    matrix_columns.len(),
                    self.samples.len()
                ),
            });
        }
        for (i, (col, sample)) in matrix_columns.iter().zip(self.samples.iter()).enumerate() {
            if col.as_ref() != sample.sample_id {
                return Err(PipelineError::Alignment {
                    reason: format!(
                        "column {} is '{}' in the count matrix but '{}' in metadata",
                        i,
                        col.as_ref(),
                        sample.sample_id
                    ),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_id_parsing() {
        let meta = SampleMetadata::from_sample_ids(&["trt_12_1"]).unwrap();
        let sample = &meta.samples()[0];
        assert_eq!(sample.group, "trt");
        assert_eq!(sample.time_point.label(), "12");
        assert_eq!(sample.time_point.value(), 12.0);
        assert_eq!(sample.replicate, "1");
    }

    #[test]
    fn test_malformed_sample_id() {
        let result = SampleMetadata::from_sample_ids(&["trt_12"]);
        assert!(matches!(
            result,
            Err(PipelineError::SampleIdFormat { .. })
        ));
    }

    #[test]
    fn test_non_numeric_time_point() {
        let result = SampleMetadata::from_sample_ids(&["trt_early_1"]);
        assert!(matches!(
            result,
            Err(PipelineError::SampleIdFormat { .. })
        ));
    }

    #[test]
    fn test_time_points_numeric_order() {
        // "2" must sort before "12" despite lexical order
        let meta =
            SampleMetadata::from_sample_ids(&["t_12_1", "t_2_1", "t_0_1", "t_2_2"]).unwrap();
        let points = meta.time_points();
        let labels: Vec<&str> = points.iter().map(|p| p.label()).collect();
        assert_eq!(labels, vec!["0", "2", "12"]);
        assert_eq!(meta.baseline().unwrap().label(), "0");
    }

    #[test]
    fn test_alignment_check() {
        let meta = SampleMetadata::from_sample_ids(&["t_0_1", "t_4_1"]).unwrap();
        assert!(meta.check_alignment(&["t_0_1", "t_4_1"]).is_ok());
        assert!(matches!(
            meta.check_alignment(&["t_4_1", "t_0_1"]),
            Err(PipelineError::Alignment { .. })
        ));
        assert!(matches!(
            meta.check_alignment(&["t_0_1"]),
            Err(PipelineError::Alignment { .. })
        ));
    }
}
