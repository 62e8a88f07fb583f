//! Benjamini-Hochberg multiple-testing correction

/// Adjust p-values with the Benjamini-Hochberg procedure
///
/// NaN inputs are carried through as NaN and excluded from the number
/// of tests. Adjustment is computed over exactly the slice given;
/// callers decide the correction scope (this pipeline corrects within
/// each contrast independently, never across contrasts).
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    let n = pvalues.len();
    if n == 0 {
        return vec![];
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| pvalues[a].total_cmp(&pvalues[b]));

    let m = pvalues.iter().filter(|p| p.is_finite()).count();
    if m == 0 {
        return vec![f64::NAN; n];
    }

    let mut padj = vec![f64::NAN; n];
    let mut running_min = f64::INFINITY;
    let mut rank = m;

    // total_cmp sorts NaN last, so walking the order backwards visits
    // the NaNs first and the finite values in descending rank order
    for &i in order.iter().rev() {
        let p = pvalues[i];
        if p.is_finite() {
            let adjusted = (p * m as f64 / rank as f64).min(1.0);
            running_min = running_min.min(adjusted);
            padj[i] = running_min;
            rank -= 1;
        }
    }

    padj
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bh_monotone_and_bounded() {
        let pvalues = vec![0.001, 0.01, 0.05, 0.1];
        let padj = benjamini_hochberg(&pvalues);

        for (p, adj) in pvalues.iter().zip(padj.iter()) {
            assert!(adj >= p);
            assert!(*adj <= 1.0);
        }
        for w in padj.windows(2) {
            assert!(w[0] <= w[1]);
        }
    }

    #[test]
    fn test_bh_known_values() {
        // p * m / rank with cumulative minimum from the largest rank
        let pvalues = vec![0.01, 0.04, 0.03, 0.02];
        let padj = benjamini_hochberg(&pvalues);
        assert!((padj[0] - 0.04).abs() < 1e-12);
        assert!((padj[1] - 0.04).abs() < 1e-12);
        assert!((padj[2] - 0.04).abs() < 1e-12);
        assert!((padj[3] - 0.04).abs() < 1e-12);
    }

    #[test]
    fn test_bh_nan_passthrough() {
        let pvalues = vec![0.01, f64::NAN, 0.03];
        let padj = benjamini_hochberg(&pvalues);
        assert!(padj[0].is_finite());
        assert!(padj[1].is_nan());
        assert!(padj[2].is_finite());
    }

    #[test]
    fn test_bh_empty() {
        assert!(benjamini_hochberg(&[]).is_empty());
    }
}
