//! Core data structures: counts, gene names, sample covariates

mod count_matrix;
mod metadata;

pub use count_matrix::{CountMatrix, GeneNameIndex};
pub use metadata::{SampleInfo, SampleMetadata, TimePoint, SAMPLE_ID_DELIMITER};
