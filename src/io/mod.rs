//! Tabular input and output
//!
//! The count table is whitespace-stable TSV: header row, first column
//! gene ids (row labels), second column gene display names, remaining
//! columns one per sample with `<group>_<time>_<replicate>` headers.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use ndarray::Array2;

use crate::contrast::ContrastTable;
use crate::data::{CountMatrix, GeneNameIndex};
use crate::error::{PipelineError, Result};

/// Read a count table, producing the matrix and the gene name index
pub fn read_count_table<P: AsRef<Path>>(path: P) -> Result<(CountMatrix, GeneNameIndex)> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();

    let header_line = lines.next().ok_or_else(|| PipelineError::MalformedInput {
        reason: "empty count table".to_string(),
    })??;

    let header: Vec<&str> = header_line.split('\t').map(str::trim).collect();
    if header.len() < 3 {
        return Err(PipelineError::MalformedInput {
            reason: format!(
                "header has {} columns; need gene id, gene name and at least one sample",
                header.len()
            ),
        });
    }
    let sample_ids: Vec<String> = header[2..].iter().map(|s| s.to_string()).collect();
    let n_samples = sample_ids.len();

    let mut gene_ids = Vec::new();
    let mut gene_names = Vec::new();
    let mut counts_data: Vec<f64> = Vec::new();

    for (lineno, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        if fields.len() != n_samples + 2 {
            return Err(PipelineError::MalformedInput {
                reason: format!(
                    "row {} has {} columns, expected {}",
                    lineno + 2,
                    fields.len(),
                    n_samples + 2
                ),
            });
        }

        if fields[0].is_empty() {
            return Err(PipelineError::MalformedInput {
                reason: format!("row {} has an empty gene id", lineno + 2),
            });
        }
        gene_ids.push(fields[0].to_string());
        gene_names.push(fields[1].to_string());

        for value in &fields[2..] {
            let parsed = value.parse::<f64>().map_err(|_| PipelineError::MalformedInput {
                reason: format!("invalid count value '{}' in row {}", value, lineno + 2),
            })?;
            counts_data.push(parsed);
        }
    }

    if gene_ids.is_empty() {
        return Err(PipelineError::MalformedInput {
            reason: "no genes found in count table".to_string(),
        });
    }

    let n_genes = gene_ids.len();
    let counts = Array2::from_shape_vec((n_genes, n_samples), counts_data).map_err(|e| {
        PipelineError::MalformedInput {
            reason: format!("cannot shape count data: {}", e),
        }
    })?;

    let names = GeneNameIndex::new(&gene_ids, &gene_names)?;
    let matrix = CountMatrix::new(counts, gene_ids, sample_ids)?;
    Ok((matrix, names))
}

/// Write the full contrast table as TSV
pub fn write_contrast_table<P: AsRef<Path>>(path: P, table: &ContrastTable) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(
        writer,
        "gene_id\tgene_name\ttime_point\tlog2FoldChange\tpvalue\tpadj"
    )?;

    for row in table.rows() {
        writeln!(
            writer,
            "{}\t{}\t{}\t{:.6}\t{:.6e}\t{:.6e}",
            row.gene_id,
            row.gene_name,
            row.time_point.label(),
            row.log2_fold_change,
            row.pvalue,
            row.padj,
        )?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    fn write_lines(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn test_read_count_table() {
        let file = write_lines(&[
            "gene_id\tgene_name\ttrt_0_1\ttrt_4_1",
            "ENSG1\tTnf\t100\t200.4",
            "ENSG2\tIl6\t50\t75",
        ]);

        let (matrix, names) = read_count_table(file.path()).unwrap();
        assert_eq!(matrix.n_genes(), 2);
        assert_eq!(matrix.n_samples(), 2);
        assert_eq!(matrix.sample_ids(), &["trt_0_1", "trt_4_1"]);
        // fractional counts round at load time
        assert_eq!(matrix.counts()[[0, 1]], 200.0);
        assert_eq!(names.name("ENSG2"), Some("Il6"));
    }

    #[test]
    fn test_ragged_row_rejected() {
        let file = write_lines(&[
            "gene_id\tgene_name\ttrt_0_1\ttrt_4_1",
            "ENSG1\tTnf\t100",
        ]);
        assert!(matches!(
            read_count_table(file.path()),
            Err(PipelineError::MalformedInput { .. })
        ));
    }

    #[test]
    fn test_missing_sample_columns_rejected() {
        let file = write_lines(&["gene_id\tgene_name", "ENSG1\tTnf"]);
        assert!(matches!(
            read_count_table(file.path()),
            Err(PipelineError::MalformedInput { .. })
        ));
    }

    #[test]
    fn test_empty_gene_id_rejected() {
        let file = write_lines(&[
            "gene_id\tgene_name\ttrt_0_1",
            "\tTnf\t100",
        ]);
        assert!(matches!(
            read_count_table(file.path()),
            Err(PipelineError::MalformedInput { .. })
        ));
    }

    #[test]
    fn test_write_contrast_table() {
        use crate::contrast::test_support::row;

        let table = ContrastTable::new(vec![row("g1", "4", 1.5, 0.01)]);
        let out = NamedTempFile::new().unwrap();
        write_contrast_table(out.path(), &table).unwrap();

        let text = std::fs::read_to_string(out.path()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "gene_id\tgene_name\ttime_point\tlog2FoldChange\tpvalue\tpadj"
        );
        assert!(lines.next().unwrap().starts_with("g1\tg1\t4\t1.5"));
    }
}
