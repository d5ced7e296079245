//! Multiple-testing correction for a family of p-values.
//!
//! All methods return adjusted p-values in the input order, capped at 1.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Correction {
    /// Step-down Holm with Šidák adjustment (family-wise error rate).
    #[serde(rename = "holm-sidak")]
    HolmSidak,
    /// Step-down Holm with Bonferroni adjustment.
    #[serde(rename = "holm")]
    Holm,
    /// Benjamini-Hochberg (false discovery rate).
    #[serde(rename = "fdr-bh")]
    BenjaminiHochberg,
}

impl Correction {
    pub fn adjust(&self, p_values: &[f64]) -> Vec<f64> {
        match self {
            Correction::HolmSidak => holm_sidak(p_values),
            Correction::Holm => holm(p_values),
            Correction::BenjaminiHochberg => benjamini_hochberg(p_values),
        }
    }
}

/// Indices of `p_values` in ascending order; ties keep input order.
fn ascending_order(p_values: &[f64]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..p_values.len()).collect();
    indices.sort_by(|&a, &b| {
        p_values[a]
            .partial_cmp(&p_values[b])
            .unwrap_or(Ordering::Equal)
    });
    indices
}

/// Step-down adjustment: `step(p, k)` with `k = n, n-1, …, 1` along the
/// sorted p-values, then a running maximum.
fn step_down(p_values: &[f64], step: impl Fn(f64, f64) -> f64) -> Vec<f64> {
    let n = p_values.len();
    let order = ascending_order(p_values);

    let mut adjusted = vec![0.0; n];
    let mut running_max: f64 = 0.0;
    for (rank, &idx) in order.iter().enumerate() {
        let remaining = (n - rank) as f64;
        let candidate = step(p_values[idx], remaining).min(1.0);
        running_max = running_max.max(candidate);
        adjusted[idx] = running_max;
    }
    adjusted
}

/// `1 - (1 - p)^k`, computed as `-expm1(k * ln(1 - p))` to keep precision for
/// small p.
pub fn holm_sidak(p_values: &[f64]) -> Vec<f64> {
    step_down(p_values, |p, k| -(k * (-p).ln_1p()).exp_m1())
}

pub fn holm(p_values: &[f64]) -> Vec<f64> {
    step_down(p_values, |p, k| p * k)
}

/// q[i] = min(p[i] * n / rank[i], q[i+1]), from the largest p down.
pub fn benjamini_hochberg(p_values: &[f64]) -> Vec<f64> {
    let n = p_values.len();
    if n == 0 {
        return Vec::new();
    }
    let order = ascending_order(p_values);

    let mut q_sorted = vec![0.0; n];
    q_sorted[n - 1] = p_values[order[n - 1]].min(1.0);
    for i in (0..n - 1).rev() {
        let adjusted = p_values[order[i]] * n as f64 / (i + 1) as f64;
        q_sorted[i] = adjusted.min(q_sorted[i + 1]).min(1.0);
    }

    let mut q_values = vec![0.0; n];
    for (i, &orig_idx) in order.iter().enumerate() {
        q_values[orig_idx] = q_sorted[i];
    }
    q_values
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: [f64; 4] = [0.01, 0.04, 0.03, 0.50];

    fn assert_close(a: &[f64], b: &[f64]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-12, "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn holm_sidak_matches_closed_form() {
        let adj = holm_sidak(&RAW);
        let k4 = 1.0 - 0.99_f64.powi(4);
        let k3 = 1.0 - 0.97_f64.powi(3);
        // 1 - 0.96^2 = 0.0784 falls below the running max from the 0.03 step
        assert_close(&adj, &[k4, k3, k3, 0.5]);
    }

    #[test]
    fn step_down_adjustments_are_monotone_and_conservative() {
        for method in [Correction::HolmSidak, Correction::Holm, Correction::BenjaminiHochberg] {
            let adj = method.adjust(&RAW);
            let order = ascending_order(&RAW);
            for w in order.windows(2) {
                assert!(adj[w[0]] <= adj[w[1]], "{method:?}: {adj:?}");
            }
            for (a, p) in adj.iter().zip(RAW) {
                assert!(*a >= p && *a <= 1.0, "{method:?}: {adj:?}");
            }
        }
    }

    #[test]
    fn holm_caps_at_one() {
        assert_close(&holm(&[0.3, 0.6]), &[0.6, 0.6]);
        assert_close(&holm(&[0.9, 0.8]), &[1.0, 1.0]);
    }

    #[test]
    fn holm_sidak_is_never_above_holm() {
        let hs = holm_sidak(&RAW);
        let h = holm(&RAW);
        for (a, b) in hs.iter().zip(&h) {
            assert!(a <= b);
        }
    }

    #[test]
    fn bh_matches_hand_computation() {
        let q = 0.04 * 4.0 / 3.0;
        assert_close(&benjamini_hochberg(&RAW), &[0.04, q, q, 0.5]);
    }

    #[test]
    fn empty_and_single_families() {
        assert!(holm_sidak(&[]).is_empty());
        assert!(benjamini_hochberg(&[]).is_empty());
        assert_close(&holm_sidak(&[0.2]), &[0.2]);
        assert_close(&holm_sidak(&[1.0, 0.0]), &[1.0, 0.0]);
    }

    #[test]
    fn methods_deserialize_from_config_names() {
        let m: Correction = serde_json::from_str("\"holm-sidak\"").unwrap();
        assert_eq!(m, Correction::HolmSidak);
        let m: Correction = serde_json::from_str("\"fdr-bh\"").unwrap();
        assert_eq!(m, Correction::BenjaminiHochberg);
    }
}
