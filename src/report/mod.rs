//! Report generation: figures, tables and summaries for one analysis
//!
//! `write_report` is the single entry point. It takes a finished
//! contrast table and an explicit [`ReportConfig`] and writes every
//! output file into the configured directory.

pub mod charts;

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use crate::contrast::{ContrastTable, Direction};
use crate::filter::{self, FilteredGeneSet, PolicyComparison, ThresholdPolicy};
use crate::io as table_io;
use crate::overlap::TimepointGeneSets;
use crate::temporal::{self, TimepointCounts};
use crate::error::Result;

/// Where the report goes and which significance policy drives it
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
    pub policy: ThresholdPolicy,
    /// Cap on gene names listed verbatim in the text summary
    pub max_listed_genes: usize,
}

impl ReportConfig {
    pub fn new<P: Into<PathBuf>>(output_dir: P, policy: ThresholdPolicy) -> Self {
        Self {
            output_dir: output_dir.into(),
            policy,
            max_listed_genes: 20,
        }
    }
}

/// Machine-readable counterpart of the text summary
#[derive(Debug, Serialize)]
struct ReportSummary {
    policy: ThresholdPolicy,
    n_contrast_rows: usize,
    n_missing_padj: usize,
    time_points: Vec<String>,
    per_timepoint: Vec<TimepointCounts>,
    first_de: Vec<FirstDeEntry>,
    overlaps: Vec<DirectionOverlap>,
    policy_comparison: PolicyComparison,
}

#[derive(Debug, Serialize)]
struct FirstDeEntry {
    time_point: String,
    upregulated: usize,
    downregulated: usize,
}

#[derive(Debug, Serialize)]
struct DirectionOverlap {
    direction: String,
    consistent_genes: Vec<String>,
    exclusive_classes: Vec<OverlapClassEntry>,
}

#[derive(Debug, Serialize)]
struct OverlapClassEntry {
    time_points: Vec<String>,
    count: usize,
}

/// Write the complete report for one contrast table
///
/// Outputs: contrasts.tsv, de_counts.svg, first_de_counts.svg,
/// first_de_lfc.svg, overlap_up.svg, overlap_down.svg, summary.txt and
/// summary.json.
pub fn write_report(table: &ContrastTable, config: &ReportConfig) -> Result<()> {
    fs::create_dir_all(&config.output_dir)?;
    let policy = config.policy;

    table_io::write_contrast_table(config.output_dir.join("contrasts.tsv"), table)?;

    let filtered = FilteredGeneSet::from_table(table, policy);
    info!(
        "policy '{}': {} significant rows of {}",
        policy.label,
        filtered.len(),
        table.len()
    );

    let per_timepoint = temporal::per_timepoint_summary(&filtered);
    let records = temporal::first_de_records(&filtered);
    let first_de_summary = temporal::first_de_summary(&records);
    let magnitudes = temporal::first_de_magnitudes(&records);
    let up_sets = TimepointGeneSets::from_filtered(&filtered, Direction::Up);
    let down_sets = TimepointGeneSets::from_filtered(&filtered, Direction::Down);

    write_svg(
        &config.output_dir.join("de_counts.svg"),
        &charts::de_counts_chart(&per_timepoint, policy.label),
    )?;
    write_svg(
        &config.output_dir.join("first_de_counts.svg"),
        &charts::first_de_counts_chart(&first_de_summary, policy.label),
    )?;
    write_svg(
        &config.output_dir.join("first_de_lfc.svg"),
        &charts::first_de_lfc_chart(&magnitudes, policy.label),
    )?;
    write_svg(
        &config.output_dir.join("overlap_up.svg"),
        &charts::overlap_chart(&up_sets, policy.label),
    )?;
    write_svg(
        &config.output_dir.join("overlap_down.svg"),
        &charts::overlap_chart(&down_sets, policy.label),
    )?;

    let comparison = filter::compare_policies(table);

    let first_de: Vec<FirstDeEntry> = first_de_summary
        .iter()
        .map(|(time_point, by_dir)| FirstDeEntry {
            time_point: time_point.label().to_string(),
            upregulated: by_dir.get(&Direction::Up).copied().unwrap_or(0),
            downregulated: by_dir.get(&Direction::Down).copied().unwrap_or(0),
        })
        .collect();

    let overlaps: Vec<DirectionOverlap> = [&up_sets, &down_sets]
        .into_iter()
        .map(|sets| DirectionOverlap {
            direction: sets.direction.to_string(),
            consistent_genes: sets.full_intersection(),
            exclusive_classes: sets
                .exclusive_breakdown()
                .into_iter()
                .map(|class| OverlapClassEntry {
                    time_points: class
                        .time_points
                        .iter()
                        .map(|t| t.label().to_string())
                        .collect(),
                    count: class.count,
                })
                .collect(),
        })
        .collect();

    let summary = ReportSummary {
        policy,
        n_contrast_rows: table.len(),
        n_missing_padj: table.n_missing_padj(),
        time_points: table
            .time_points()
            .iter()
            .map(|t| t.label().to_string())
            .collect(),
        per_timepoint: per_timepoint.clone(),
        first_de,
        overlaps,
        policy_comparison: comparison.clone(),
    };

    let json_file = File::create(config.output_dir.join("summary.json"))?;
    serde_json::to_writer_pretty(BufWriter::new(json_file), &summary)?;

    write_text_summary(
        &config.output_dir.join("summary.txt"),
        table,
        config,
        &per_timepoint,
        &summary,
        &comparison,
        &up_sets,
        &down_sets,
    )?;

    info!("report written to {}", config.output_dir.display());
    Ok(())
}

fn write_svg(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content)?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn write_text_summary(
    path: &Path,
    table: &ContrastTable,
    config: &ReportConfig,
    per_timepoint: &[TimepointCounts],
    summary: &ReportSummary,
    comparison: &PolicyComparison,
    up_sets: &TimepointGeneSets,
    down_sets: &TimepointGeneSets,
) -> Result<()> {
    let names: HashMap<&str, &str> = table
        .rows()
        .iter()
        .map(|r| (r.gene_id.as_str(), r.gene_name.as_str()))
        .collect();

    let file = File::create(path)?;
    let mut w = BufWriter::new(file);

    writeln!(w, "Time-course differential expression summary")?;
    writeln!(w, "===========================================")?;
    writeln!(w)?;
    writeln!(
        w,
        "Contrasts: {} rows across time points [{}]",
        summary.n_contrast_rows,
        summary.time_points.join(", ")
    )?;
    writeln!(
        w,
        "Rows without adjusted p-value: {}",
        summary.n_missing_padj
    )?;
    writeln!(
        w,
        "Active policy: {} (padj < {}, |log2FC| > {})",
        config.policy.label, config.policy.padj_max, config.policy.abs_log2fc_min
    )?;
    writeln!(w)?;

    writeln!(w, "Significant genes per time point ({})", config.policy.label)?;
    for entry in per_timepoint {
        writeln!(
            w,
            "  t={}: {} up, {} down, {} total",
            entry.time_point.label(),
            entry.upregulated,
            entry.downregulated,
            entry.total()
        )?;
    }
    writeln!(w)?;

    writeln!(w, "Policy comparison (distinct significant genes)")?;
    for (label, count) in &comparison.gene_counts {
        writeln!(w, "  {}: {}", label, count)?;
    }
    for (a, b, overlap) in &comparison.pairwise_overlaps {
        writeln!(w, "  {} ∩ {}: {}", a, b, overlap)?;
    }
    writeln!(w)?;

    for sets in [up_sets, down_sets] {
        let consistent = sets.full_intersection();
        writeln!(
            w,
            "Consistently {}regulated at every time point: {} genes",
            sets.direction,
            consistent.len()
        )?;
        for gene_id in consistent.iter().take(config.max_listed_genes) {
            let name = names.get(gene_id.as_str()).copied().unwrap_or("");
            if name.is_empty() || name == gene_id {
                writeln!(w, "  {}", gene_id)?;
            } else {
                writeln!(w, "  {} ({})", gene_id, name)?;
            }
        }
        if consistent.len() > config.max_listed_genes {
            writeln!(
                w,
                "  ... and {} more",
                consistent.len() - config.max_listed_genes
            )?;
        }
        writeln!(w)?;
    }

    w.flush()?;
    Ok(())
}
