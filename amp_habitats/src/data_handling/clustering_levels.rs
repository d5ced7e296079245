use std::path::PathBuf;

use polars::prelude::*;

use crate::error::Result;
use crate::helper_functions::{read_tsv, str_column, Cell};
use crate::models::Dataset;

/// One alignment of a clustering-significance table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterAlignment {
    pub identity: f64,
    pub gap_identity: f64,
    pub evalue: f64,
}

impl ClusterAlignment {
    pub fn min_identity(&self) -> f64 {
        self.identity.min(self.gap_identity)
    }

    /// `-inf` for an e-value of exactly zero.
    pub fn log10_evalue(&self) -> f64 {
        self.evalue.log10()
    }

    /// Rows of a validated level frame.
    pub fn from_frame(df: &DataFrame) -> Result<Vec<ClusterAlignment>> {
        let identity = df.column("identity")?.f64()?;
        let gap_identity = df.column("gap_identity")?.f64()?;
        let evalue = df.column("evalue")?.f64()?;

        Ok(identity
            .into_no_null_iter()
            .zip(gap_identity.into_no_null_iter())
            .zip(evalue.into_no_null_iter())
            .map(|((identity, gap_identity), evalue)| ClusterAlignment { identity, gap_identity, evalue })
            .collect())
    }
}

pub struct ClusteringLevelDataset {
    pub path: PathBuf,
}

impl ClusteringLevelDataset {
    /// `identity`, `gap_identity`, `evalue` as f64; e-values must be
    /// non-negative.
    pub fn validate(raw: &DataFrame) -> Result<DataFrame> {
        let table = Self::TABLE;
        let identity = str_column(raw, table, "identity")?;
        let gap_identity = str_column(raw, table, "gap_identity")?;
        let evalue = str_column(raw, table, "evalue")?;

        let height = raw.height();
        let (mut ids, mut gap_ids, mut evalues) =
            (Vec::with_capacity(height), Vec::with_capacity(height), Vec::with_capacity(height));
        for i in 0..height {
            let cell = |column| Cell { table, row: i, column, key: "-" };
            let e = cell("evalue").number(evalue.get(i))?;
            if e < 0.0 {
                return Err(cell("evalue").malformed(&e.to_string(), "e-value must be non-negative"));
            }
            ids.push(cell("identity").number(identity.get(i))?);
            gap_ids.push(cell("gap_identity").number(gap_identity.get(i))?);
            evalues.push(e);
        }

        Ok(df!["identity" => ids, "gap_identity" => gap_ids, "evalue" => evalues]?)
    }
}

impl Dataset for ClusteringLevelDataset {
    const TABLE: &'static str = "clustering_significance";

    fn load(&self) -> Result<DataFrame> {
        Self::validate(&read_tsv(&self.path)?)
    }
}
