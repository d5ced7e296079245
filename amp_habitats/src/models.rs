use polars::prelude::*;

use crate::error::Result;
use crate::habitat::HabitatGroup;

/// A source table. `load` reads it and returns a validated frame whose
/// columns already carry their final types.
pub trait Dataset {
    const TABLE: &'static str;

    fn load(&self) -> Result<DataFrame>;
}

/// One metadata sample after joining and normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    pub sample: String,
    pub habitat: String,
    pub group: HabitatGroup,
    pub host_associated: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// `None` for samples without assembly statistics.
    pub assembly_length: Option<u64>,
    pub inserts_filtered: Option<u64>,
    pub smorfs: Option<u64>,
    /// Distinct AMPs found in the sample.
    pub amps: u64,
}

impl SampleRecord {
    /// AMPs per assembled megabase; undefined for empty or unknown assemblies.
    pub fn rate(&self) -> Option<f64> {
        self.assembly_length.and_then(|len| per_megabase(self.amps, len))
    }

    pub fn smorf_rate(&self) -> Option<f64> {
        self.smorfs
            .zip(self.assembly_length)
            .and_then(|(n, len)| per_megabase(n, len))
    }
}

pub fn per_megabase(count: u64, assembly_length: u64) -> Option<f64> {
    if assembly_length == 0 {
        None
    } else {
        Some(count as f64 * 1_000_000.0 / assembly_length as f64)
    }
}

/// One row of the AMP occurrence table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AmpHit {
    pub amp: String,
    pub sample: String,
    pub habitat: String,
}

impl AmpHit {
    /// Rows of a validated occurrence frame (`amp`, `sample`,
    /// `general_envo_name`, no nulls).
    pub fn from_frame(df: &DataFrame) -> Result<Vec<AmpHit>> {
        let amps = df.column("amp")?.str()?;
        let samples = df.column("sample")?.str()?;
        let habitats = df.column("general_envo_name")?.str()?;

        Ok(amps
            .into_no_null_iter()
            .zip(samples.into_no_null_iter())
            .zip(habitats.into_no_null_iter())
            .map(|((amp, sample), habitat)| AmpHit {
                amp: amp.to_string(),
                sample: sample.to_string(),
                habitat: habitat.to_string(),
            })
            .collect())
    }
}
