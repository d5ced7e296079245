//! Per-group aggregation of samples and AMP occurrences.
//!
//! AMP occurrences are deduplicated on (amp, sample) first. An occurrence
//! belongs to the group of its sample record; occurrences from samples with no
//! record (no resolved metadata) fall back to their own habitat label.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::habitat::{HabitatGroup, HabitatTables};
use crate::helper_functions::median;
use crate::models::{AmpHit, SampleRecord};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    #[serde(rename = "high level environment")]
    pub group: HabitatGroup,
    /// Raw habitat labels seen in the group, sorted and comma-separated.
    pub habitats: String,
    pub samples: usize,
    /// Distinct (amp, sample) occurrences.
    #[serde(rename = "redundant AMPs")]
    pub amp_occurrences: usize,
    #[serde(rename = "non-redundant AMPs")]
    pub distinct_amps: usize,
    #[serde(rename = "assembled bp")]
    pub assembly_bp: u64,
    #[serde(rename = "samples with rate")]
    pub rate_samples: usize,
    #[serde(rename = "samples without rate")]
    pub excluded_samples: usize,
    #[serde(rename = "median AMPs per assembled Mbp")]
    pub median_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostSummary {
    #[serde(rename = "is_host_associated")]
    pub host: &'static str,
    pub samples: usize,
    #[serde(rename = "redundant AMPs")]
    pub amp_occurrences: usize,
    #[serde(rename = "non-redundant AMPs")]
    pub distinct_amps: usize,
    #[serde(rename = "assembled bp")]
    pub assembly_bp: u64,
    #[serde(rename = "samples with rate")]
    pub rate_samples: usize,
    #[serde(rename = "samples without rate")]
    pub excluded_samples: usize,
    #[serde(rename = "median AMPs per assembled Mbp")]
    pub median_rate: Option<f64>,
}

pub fn host_label(host_associated: bool) -> &'static str {
    if host_associated {
        "host"
    } else {
        "non-host"
    }
}

#[derive(Debug, Default)]
struct Accumulator<'a> {
    habitats: BTreeSet<&'a str>,
    samples: HashSet<&'a str>,
    occurrences: HashSet<(&'a str, &'a str)>,
    amps: HashSet<&'a str>,
    assembly_bp: u64,
    rates: Vec<f64>,
    excluded: usize,
}

impl<'a> Accumulator<'a> {
    fn add_record(&mut self, record: &'a SampleRecord) {
        self.habitats.insert(record.habitat.as_str());
        if self.samples.insert(record.sample.as_str()) {
            self.assembly_bp += record.assembly_length.unwrap_or(0);
            match record.rate() {
                Some(rate) => self.rates.push(rate),
                None => self.excluded += 1,
            }
        }
    }

    fn add_hit(&mut self, hit: &'a AmpHit) {
        self.occurrences.insert((hit.amp.as_str(), hit.sample.as_str()));
        self.amps.insert(hit.amp.as_str());
    }
}

/// Shared grouping pass; `fallback` assigns hits whose sample has no record.
fn accumulate<'a, K, F>(
    records: &'a [SampleRecord],
    hits: &'a [AmpHit],
    key_of: impl Fn(&SampleRecord) -> K,
    fallback: F,
) -> Result<BTreeMap<K, Accumulator<'a>>>
where
    K: Ord + Copy,
    F: Fn(&AmpHit) -> Result<K>,
{
    let mut groups: BTreeMap<K, Accumulator<'a>> = BTreeMap::new();
    let mut sample_key: HashMap<&str, K> = HashMap::with_capacity(records.len());

    for record in records {
        let key = key_of(record);
        sample_key.insert(record.sample.as_str(), key);
        groups.entry(key).or_default().add_record(record);
    }
    for hit in hits {
        let key = match sample_key.get(hit.sample.as_str()) {
            Some(&key) => key,
            None => fallback(hit)?,
        };
        groups.entry(key).or_default().add_hit(hit);
    }
    Ok(groups)
}

pub fn aggregate_groups(
    records: &[SampleRecord],
    hits: &[AmpHit],
    tables: &HabitatTables,
) -> Result<Vec<GroupSummary>> {
    let groups = accumulate(records, hits, |r| r.group, |h| Ok(tables.normalize(&h.habitat)))?;

    let summaries: Vec<GroupSummary> = groups
        .into_iter()
        .map(|(group, acc)| GroupSummary {
            group,
            habitats: acc.habitats.iter().copied().collect::<Vec<_>>().join(", "),
            samples: acc.samples.len(),
            amp_occurrences: acc.occurrences.len(),
            distinct_amps: acc.amps.len(),
            assembly_bp: acc.assembly_bp,
            rate_samples: acc.rates.len(),
            excluded_samples: acc.excluded,
            median_rate: median(&acc.rates),
        })
        .collect();

    info!("Aggregated {} habitat groups", summaries.len());
    Ok(summaries)
}

/// Host-associated vs free-living split. Hits of unrecorded samples are
/// classified from their own label, so a missing host entry fails here too.
pub fn aggregate_host(
    records: &[SampleRecord],
    hits: &[AmpHit],
    tables: &HabitatTables,
) -> Result<Vec<HostSummary>> {
    let groups = accumulate(
        records,
        hits,
        |r| r.host_associated,
        |h| tables.classify(&h.habitat).map(|(_, host)| host),
    )?;

    // host rows first
    Ok(groups
        .into_iter()
        .rev()
        .map(|(host, acc)| HostSummary {
            host: host_label(host),
            samples: acc.samples.len(),
            amp_occurrences: acc.occurrences.len(),
            distinct_amps: acc.amps.len(),
            assembly_bp: acc.assembly_bp,
            rate_samples: acc.rates.len(),
            excluded_samples: acc.excluded,
            median_rate: median(&acc.rates),
        })
        .collect())
}
