//! Two-sided Mann-Whitney U test.
//!
//! The reported statistic is U of the first sample, so swapping the samples
//! gives `n1 * n2 - U` with the same p-value. Small tie-free samples use the
//! exact null distribution; everything else uses the normal approximation
//! with tie and continuity corrections.

use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::{HabitatError, Result};

/// Above this size at least one sample is considered large.
const EXACT_MAX_SAMPLE: usize = 8;
/// Upper bound on `n1 * n2` for the exact distribution table.
const EXACT_MAX_CELLS: usize = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Exact,
    Asymptotic,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MannWhitney {
    pub statistic: f64,
    pub p_value: f64,
    pub method: Method,
}

/// Average ranks (1-based) plus the size of every group of tied values.
pub fn rank_data(vals: &[f64]) -> (Vec<f64>, Vec<usize>) {
    let mut indexed: Vec<(usize, f64)> = vals.iter().cloned().enumerate().collect();
    indexed.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut ranks = vec![0.0; vals.len()];
    let mut ties = Vec::new();
    let mut i = 0;
    while i < indexed.len() {
        let val = indexed[i].1;
        let mut j = i + 1;
        while j < indexed.len() && indexed[j].1 == val {
            j += 1;
        }

        let avg_rank = ((i + 1) as f64 + j as f64) / 2.0;
        for item in &indexed[i..j] {
            ranks[item.0] = avg_rank;
        }
        if j - i > 1 {
            ties.push(j - i);
        }
        i = j;
    }

    (ranks, ties)
}

pub fn mann_whitney_u(x: &[f64], y: &[f64]) -> Result<MannWhitney> {
    for (name, sample) in [("first sample", x), ("second sample", y)] {
        if sample.is_empty() {
            return Err(HabitatError::InsufficientSampleSize { group: name.to_string(), n: 0 });
        }
    }
    let (n1, n2) = (x.len(), y.len());

    let combined: Vec<f64> = x.iter().chain(y).copied().collect();
    let (ranks, ties) = rank_data(&combined);
    let r1: f64 = ranks[..n1].iter().sum();
    let u1 = r1 - (n1 * (n1 + 1)) as f64 / 2.0;
    let u2 = (n1 * n2) as f64 - u1;
    let u = u1.max(u2);

    let exact = ties.is_empty()
        && (n1 <= EXACT_MAX_SAMPLE || n2 <= EXACT_MAX_SAMPLE)
        && n1 * n2 <= EXACT_MAX_CELLS;

    let (p, method) = if exact {
        (2.0 * exact_sf(u.round() as usize, n1, n2), Method::Exact)
    } else {
        (asymptotic_p(u, n1, n2, &ties), Method::Asymptotic)
    };

    Ok(MannWhitney {
        statistic: u1,
        p_value: p.clamp(0.0, 1.0),
        method,
    })
}

fn asymptotic_p(u: f64, n1: usize, n2: usize, ties: &[usize]) -> f64 {
    let (n1f, n2f) = (n1 as f64, n2 as f64);
    let n = n1f + n2f;
    let mu = n1f * n2f / 2.0;
    let tie_term: f64 = ties.iter().map(|&t| (t * t * t - t) as f64).sum();
    let var = n1f * n2f / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));

    // every value tied: no evidence either way
    if !(var > 0.0) {
        return 1.0;
    }
    let z = (u - mu - 0.5) / var.sqrt();
    2.0 * Normal::standard().sf(z)
}

/// P(U >= u) under the null for sample sizes `n1`, `n2` without ties.
///
/// Counts of U come from the Gaussian binomial coefficient
/// `[n1 + n2 choose m]_q = prod_{i=1..m} (1 - q^(n+i)) / (1 - q^i)`
/// with `m = min(n1, n2)`, `n = max(n1, n2)`, expanded one factor at a time so
/// every intermediate stays a polynomial.
fn exact_sf(u: usize, n1: usize, n2: usize) -> f64 {
    let (m, n) = if n1 <= n2 { (n1, n2) } else { (n2, n1) };
    let max_deg = m * n;
    if u > max_deg {
        return 0.0;
    }

    let mut coef = vec![0.0_f64; max_deg + m + 1];
    coef[0] = 1.0;
    let mut deg = 0;
    for i in 1..=m {
        let shift = n + i;
        for k in (shift..=deg + shift).rev() {
            coef[k] -= coef[k - shift];
        }
        deg += shift;

        for k in i..=deg {
            coef[k] += coef[k - i];
        }
        deg -= i;
        for c in coef.iter_mut().skip(deg + 1) {
            *c = 0.0;
        }
    }

    let total: f64 = coef[..=max_deg].iter().sum();
    let tail: f64 = coef[u..=max_deg].iter().sum();
    tail / total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_average_ties() {
        let (ranks, ties) = rank_data(&[3.0, 1.0, 3.0, 2.0]);
        assert_eq!(ranks, vec![3.5, 1.0, 3.5, 2.0]);
        assert_eq!(ties, vec![2]);
    }

    #[test]
    fn gaussian_binomial_counts() {
        // [6 choose 3]_q = 1 + q + 2q^2 + 3q^3 + 3q^4 + 3q^5 + 3q^6 + 2q^7 + q^8 + q^9
        assert!((exact_sf(0, 3, 3) - 1.0).abs() < 1e-15);
        assert!((exact_sf(9, 3, 3) - 1.0 / 20.0).abs() < 1e-15);
        assert!((exact_sf(7, 3, 3) - 4.0 / 20.0).abs() < 1e-15);
        assert!((exact_sf(1, 1, 1) - 0.5).abs() < 1e-15);
        assert_eq!(exact_sf(10, 3, 3), 0.0);
    }

    #[test]
    fn separated_groups_are_significant_in_both_directions() {
        let a = [1.0, 2.0, 3.0];
        let b = [10.0, 20.0, 30.0];
        let ab = mann_whitney_u(&a, &b).unwrap();
        let ba = mann_whitney_u(&b, &a).unwrap();

        assert_eq!(ab.method, Method::Exact);
        assert!(ab.p_value <= 0.1 + 1e-12);
        assert_eq!(ab.statistic, 0.0);
        assert_eq!(ba.statistic, 9.0);
        assert_ne!(ab.statistic, ba.statistic);
        assert_eq!(ab.p_value, ba.p_value);
    }

    #[test]
    fn exact_matches_reference_value() {
        let r = mann_whitney_u(&[1.0, 2.0, 3.0, 4.0, 5.0], &[6.0, 7.0, 8.0, 9.0, 10.0]).unwrap();
        assert!((r.p_value - 2.0 / 252.0).abs() < 1e-12);
    }

    #[test]
    fn ties_switch_to_normal_approximation() {
        let r = mann_whitney_u(&[1.0, 1.0, 2.0, 2.0, 3.0], &[2.0, 3.0, 3.0, 4.0, 4.0]).unwrap();
        assert_eq!(r.method, Method::Asymptotic);
        assert_eq!(r.statistic, 3.0);
        // z = 9 / sqrt(25/12 * (11 - 60/90))
        assert!(r.p_value > 0.05 && r.p_value < 0.055, "{}", r.p_value);
    }

    #[test]
    fn constant_groups_still_give_a_defined_result() {
        let all_same = mann_whitney_u(&[5.0, 5.0], &[5.0, 5.0, 5.0]).unwrap();
        assert_eq!(all_same.statistic, 3.0);
        assert_eq!(all_same.p_value, 1.0);

        let one_constant = mann_whitney_u(&[1.0, 1.0, 1.0], &[2.0, 3.0, 4.0]).unwrap();
        assert_eq!(one_constant.statistic, 0.0);
        assert!(one_constant.p_value.is_finite() && one_constant.p_value < 1.0);
    }

    #[test]
    fn large_samples_use_the_approximation() {
        let x: Vec<f64> = (0..20).map(f64::from).collect();
        let y: Vec<f64> = (10..30).map(|v| f64::from(v) + 0.5).collect();
        let r = mann_whitney_u(&x, &y).unwrap();
        assert_eq!(r.method, Method::Asymptotic);
        assert!(r.p_value < 0.01);
    }

    #[test]
    fn empty_sample_is_rejected() {
        assert!(matches!(
            mann_whitney_u(&[], &[1.0]),
            Err(HabitatError::InsufficientSampleSize { n: 0, .. })
        ));
    }
}
