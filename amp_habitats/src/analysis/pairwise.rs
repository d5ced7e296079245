//! All-ordered-pairs Mann-Whitney comparison of habitat rate distributions.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::analysis::correction::Correction;
use crate::analysis::mann_whitney::mann_whitney_u;
use crate::error::{HabitatError, Result};
use crate::models::SampleRecord;

/// One row of the comparison table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairwiseTest {
    #[serde(rename = "s1")]
    pub group_a: String,
    #[serde(rename = "s2")]
    pub group_b: String,
    #[serde(rename = "U")]
    pub statistic: f64,
    #[serde(rename = "pval")]
    pub p_value: f64,
    #[serde(rename = "p_adj")]
    pub p_adjusted: f64,
}

/// Defined rates per raw habitat label. Samples without a rate are left out.
pub fn rates_by_habitat(records: &[SampleRecord]) -> BTreeMap<String, Vec<f64>> {
    let mut rates: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for record in records {
        if let Some(rate) = record.rate() {
            rates.entry(record.habitat.clone()).or_default().push(rate);
        }
    }
    rates
}

/// Tests every ordered pair `(A, B)`, `A != B`, with the outer loop over `A`
/// in `labels` order, and adjusts all p-values as one family.
///
/// Every label needs at least two rates; that is checked before any test
/// runs.
pub fn pairwise_tests(
    labels: &[String],
    rates: &BTreeMap<String, Vec<f64>>,
    correction: Correction,
) -> Result<Vec<PairwiseTest>> {
    let mut samples: Vec<(&str, &[f64])> = Vec::with_capacity(labels.len());
    for label in labels {
        let values = rates.get(label).map(Vec::as_slice).unwrap_or(&[]);
        if values.len() < 2 {
            return Err(HabitatError::InsufficientSampleSize {
                group: label.clone(),
                n: values.len(),
            });
        }
        samples.push((label.as_str(), values));
    }

    let mut tests = Vec::with_capacity(labels.len() * labels.len().saturating_sub(1));
    for (i, &(a, xs)) in samples.iter().enumerate() {
        for (j, &(b, ys)) in samples.iter().enumerate() {
            if i == j {
                continue;
            }
            let mw = mann_whitney_u(xs, ys)?;
            debug!("{} vs {}: U={} p={:.3e} ({:?})", a, b, mw.statistic, mw.p_value, mw.method);
            tests.push(PairwiseTest {
                group_a: a.to_string(),
                group_b: b.to_string(),
                statistic: mw.statistic,
                p_value: mw.p_value,
                p_adjusted: f64::NAN,
            });
        }
    }

    let raw: Vec<f64> = tests.iter().map(|t| t.p_value).collect();
    for (test, adjusted) in tests.iter_mut().zip(correction.adjust(&raw)) {
        test.p_adjusted = adjusted;
    }

    info!(
        "Ran {} pairwise comparisons over {} habitats ({:?})",
        tests.len(),
        labels.len(),
        correction
    );
    Ok(tests)
}
