use std::path::PathBuf;

use polars::prelude::*;
use tracing::info;

use crate::error::Result;
use crate::helper_functions::{read_tsv, str_column, Cell};
use crate::models::Dataset;

const AMP_COLUMN: &str = "AMP accession";
const FAMILY_COLUMN: &str = "SPHERE_fam level III";

/// Family assignment of catalog AMPs (clustering level III).
pub struct FamilyDataset {
    pub path: PathBuf,
}

impl FamilyDataset {
    /// `amp`, `family`; both required on every row.
    pub fn validate(raw: &DataFrame) -> Result<DataFrame> {
        let table = Self::TABLE;
        let amps = str_column(raw, table, AMP_COLUMN)?;
        let families = str_column(raw, table, FAMILY_COLUMN)?;

        let mut amp_ids = Vec::with_capacity(raw.height());
        let mut family_ids = Vec::with_capacity(raw.height());
        for i in 0..raw.height() {
            let amp = Cell { table, row: i, column: AMP_COLUMN, key: "-" }.required(amps.get(i))?;
            let family = Cell { table, row: i, column: FAMILY_COLUMN, key: amp }.required(families.get(i))?;
            amp_ids.push(amp);
            family_ids.push(family);
        }

        Ok(df!["amp" => amp_ids, "family" => family_ids]?)
    }
}

impl Dataset for FamilyDataset {
    const TABLE: &'static str = "families";

    fn load(&self) -> Result<DataFrame> {
        let df = Self::validate(&read_tsv(&self.path)?)?;
        info!("Family assignments for {} AMPs", df.height());
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HabitatError;

    #[test]
    fn reads_verbatim_column_names() {
        let raw = df![
            "AMP accession" => &["AMP10.000_000"],
            "SPHERE_fam level III" => &["SPHERE-III.001_396"],
        ]
        .unwrap();
        let fams = FamilyDataset::validate(&raw).unwrap();
        assert_eq!(fams.column("family").unwrap().str().unwrap().get(0), Some("SPHERE-III.001_396"));
    }

    #[test]
    fn empty_family_is_malformed() {
        let raw = df![
            "AMP accession" => &["AMP10.000_000"],
            "SPHERE_fam level III" => &[None::<&str>],
        ]
        .unwrap();
        match FamilyDataset::validate(&raw) {
            Err(HabitatError::MalformedInputRow { table, row, key, .. }) => {
                assert_eq!(table, "families");
                assert_eq!(row, 1);
                assert_eq!(key, "AMP10.000_000");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
