//! Command-line interface for decourse

use clap::{Parser, Subcommand};

use crate::filter::{ThresholdPolicy, PRESETS, STRINGENT};

#[derive(Parser)]
#[command(name = "decourse")]
#[command(version)]
#[command(about = "Time-course differential expression reports from RNA-seq counts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full analysis and write the report
    #[command(
        about = "Run the full analysis and write the report",
        long_about = "Run the full analysis and write the report\n\n\
            Loads the count table, derives sample covariates from the column\n\
            headers, fits a negative binomial GLM per gene, tests every\n\
            time point against the baseline and writes the report figures\n\
            and summaries into the output directory.",
        after_long_help = "\
Examples:
  # Default significance policy (stringent)
  decourse run -c counts.tsv -o report/

  # Looser or stricter cutoffs
  decourse run -c counts.tsv -o report/ --policy moderate
  decourse run -c counts.tsv -o report/ --policy very-stringent"
    )]
    Run {
        /// Path to count table TSV file
        #[arg(short, long,
            long_help = "Path to the count table, tab-delimited.\n\
                First column: gene IDs. Second column: gene display names.\n\
                Remaining columns: raw counts, one per sample, with headers\n\
                of the form <group>_<time>_<replicate> (e.g. trt_12_1).")]
        counts: String,

        /// Output directory for the report [default: report]
        #[arg(short, long, default_value = "report")]
        output: String,

        /// Significance policy [default: stringent]
        #[arg(long, default_value = "stringent",
            long_help = "Significance policy driving the report figures.\n\
                moderate:       padj < 0.05, |log2FC| > 0.58\n\
                stringent:      padj < 0.05, |log2FC| > 1\n\
                very-stringent: padj < 0.01, |log2FC| > 2")]
        policy: String,
    },

    /// Fit the model and export the contrast table only
    #[command(about = "Fit the model and export the contrast table only")]
    Contrasts {
        /// Path to count table TSV file
        #[arg(short, long)]
        counts: String,

        /// Output TSV path [default: contrasts.tsv]
        #[arg(short, long, default_value = "contrasts.tsv")]
        output: String,
    },
}

/// Resolve a policy name from the command line
///
/// Accepts both hyphenated and underscored spellings.
pub fn parse_policy(name: &str) -> Option<ThresholdPolicy> {
    let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
    if normalized.is_empty() {
        return Some(STRINGENT);
    }
    PRESETS
        .iter()
        .find(|p| p.label == normalized)
        .copied()
}
