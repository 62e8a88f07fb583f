//! decourse: time-course differential expression reports
//!
//! Takes a raw RNA-seq count table for a single-group time course,
//! fits a negative binomial GLM per gene, tests every time point
//! against the baseline and renders the results as a set of SVG
//! figures plus text and JSON summaries.
//!
//! # Example
//!
//! ```ignore
//! use decourse::prelude::*;
//!
//! let (counts, names) = read_count_table("counts.tsv")?;
//! let metadata = SampleMetadata::from_sample_ids(counts.sample_ids())?;
//! let mut table = NbWaldBackend::default().fit(&counts, &metadata)?;
//! table.annotate(&names)?;
//! write_report(&table, &ReportConfig::new("report", STRINGENT))?;
//! ```

pub mod cli;
pub mod contrast;
pub mod data;
pub mod engine;
pub mod error;
pub mod filter;
pub mod io;
pub mod overlap;
pub mod report;
pub mod temporal;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::contrast::{ContrastRow, ContrastTable, Direction};
    pub use crate::data::{CountMatrix, GeneNameIndex, SampleMetadata, TimePoint};
    pub use crate::engine::{DeBackend, NbWaldBackend};
    pub use crate::error::{PipelineError, Result};
    pub use crate::filter::{
        FilteredGeneSet, ThresholdPolicy, MODERATE, PRESETS, STRINGENT, VERY_STRINGENT,
    };
    pub use crate::io::{read_count_table, write_contrast_table};
    pub use crate::overlap::TimepointGeneSets;
    pub use crate::report::{write_report, ReportConfig};
}

use std::path::Path;

use log::info;

use prelude::*;

/// Fit the model for one count table and return the annotated
/// contrast table
pub fn fit_contrasts<P: AsRef<Path>>(counts_path: P) -> Result<ContrastTable> {
    let (counts, names) = read_count_table(counts_path)?;
    info!(
        "loaded {} genes x {} samples",
        counts.n_genes(),
        counts.n_samples()
    );

    let metadata = SampleMetadata::from_sample_ids(counts.sample_ids())?;
    info!(
        "baseline t={}, testing {} later time points",
        metadata.baseline()?,
        metadata.time_points().len() - 1
    );

    let backend = NbWaldBackend::default();
    let mut table = backend.fit(&counts, &metadata)?;
    table.annotate(&names)?;
    Ok(table)
}

/// Run the complete pipeline: load, fit, report
pub fn run_report<P: AsRef<Path>>(counts_path: P, config: &ReportConfig) -> Result<()> {
    let table = fit_contrasts(counts_path)?;
    write_report(&table, config)
}
