use serde::Serialize;
use tracing::info;

use crate::data_handling::clustering_levels::ClusterAlignment;
use crate::helper_functions::median;

const LEVEL_NAMES: [&str; 3] = ["I", "II", "III"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelSignificance {
    pub level: String,
    pub alignments: usize,
    pub significant: usize,
    pub pct_significant: f64,
    pub median_min_identity: Option<f64>,
}

/// Roman numeral for the 0-based level index, falling back to the 1-based
/// number past level III.
pub fn level_name(index: usize) -> String {
    LEVEL_NAMES
        .get(index)
        .map(|s| s.to_string())
        .unwrap_or_else(|| (index + 1).to_string())
}

/// Share of alignments with `log10(evalue) <= log10(max_evalue)`, rounded to
/// one decimal.
pub fn level_significance(level: &str, rows: &[ClusterAlignment], max_evalue: f64) -> LevelSignificance {
    let threshold = max_evalue.log10();
    let significant = rows.iter().filter(|r| r.log10_evalue() <= threshold).count();
    let pct = if rows.is_empty() {
        0.0
    } else {
        (significant as f64 * 1000.0 / rows.len() as f64).round() / 10.0
    };
    let min_ids: Vec<f64> = rows.iter().map(ClusterAlignment::min_identity).collect();

    info!("Clustering level {}: {}/{} significant ({}%)", level, significant, rows.len(), pct);
    LevelSignificance {
        level: level.to_string(),
        alignments: rows.len(),
        significant,
        pct_significant: pct,
        median_min_identity: median(&min_ids),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aln(identity: f64, gap_identity: f64, evalue: f64) -> ClusterAlignment {
        ClusterAlignment { identity, gap_identity, evalue }
    }

    #[test]
    fn counts_significant_alignments() {
        let rows = vec![aln(90.0, 80.0, 1e-10), aln(40.0, 50.0, 1e-5), aln(30.0, 20.0, 0.3), aln(60.0, 60.0, 0.0)];
        let s = level_significance("I", &rows, 1e-5);
        assert_eq!(s.alignments, 4);
        assert_eq!(s.significant, 3);
        assert_eq!(s.pct_significant, 75.0);
        assert_eq!(s.median_min_identity, Some(50.0));
    }

    #[test]
    fn percentage_is_rounded_to_one_decimal() {
        let rows = vec![aln(1.0, 1.0, 1e-9), aln(1.0, 1.0, 1.0), aln(1.0, 1.0, 1.0)];
        assert_eq!(level_significance("II", &rows, 1e-5).pct_significant, 33.3);
        assert_eq!(level_significance("III", &[], 1e-5).pct_significant, 0.0);
    }

    #[test]
    fn level_names_are_roman_then_numeric() {
        assert_eq!(level_name(0), "I");
        assert_eq!(level_name(2), "III");
        assert_eq!(level_name(3), "4");
    }
}
