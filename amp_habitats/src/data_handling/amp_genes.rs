use std::path::PathBuf;

use polars::prelude::*;
use tracing::info;

use crate::error::Result;
use crate::helper_functions::{opt_str_column, read_tsv, str_column, Cell};
use crate::models::Dataset;

/// AMP occurrences per sample. Rows flagged as non-metagenomic are skipped.
pub struct AmpGenesDataset {
    pub path: PathBuf,
}

impl AmpGenesDataset {
    /// `amp`, `sample`, `general_envo_name`, metagenomic rows only.
    pub fn validate(raw: &DataFrame) -> Result<DataFrame> {
        let table = Self::TABLE;
        let amps = str_column(raw, table, "amp")?;
        let samples = str_column(raw, table, "sample")?;
        let habitats = str_column(raw, table, "general_envo_name")?;
        let metagenomic = opt_str_column(raw, "is_metagenomic")?;

        let height = raw.height();
        let (mut amp_ids, mut sample_ids, mut labels, mut keep) = (
            Vec::with_capacity(height),
            Vec::with_capacity(height),
            Vec::with_capacity(height),
            Vec::with_capacity(height),
        );
        for i in 0..height {
            let sample = Cell { table, row: i, column: "sample", key: "-" }.required(samples.get(i))?;
            let cell = |column| Cell { table, row: i, column, key: sample };

            keep.push(match metagenomic {
                Some(flags) => cell("is_metagenomic").flag(flags.get(i))?,
                None => true,
            });
            amp_ids.push(cell("amp").required(amps.get(i))?);
            labels.push(cell("general_envo_name").required(habitats.get(i))?);
            sample_ids.push(sample);
        }

        let typed = df![
            "amp" => amp_ids,
            "sample" => sample_ids,
            "general_envo_name" => labels,
            "is_metagenomic" => keep,
        ]?;
        let hits = typed
            .lazy()
            .filter(col("is_metagenomic"))
            .select([col("amp"), col("sample"), col("general_envo_name")])
            .collect()?;

        info!("{} of {} AMP rows are metagenomic", hits.height(), height);
        Ok(hits)
    }
}

impl Dataset for AmpGenesDataset {
    const TABLE: &'static str = "amp_genes";

    fn load(&self) -> Result<DataFrame> {
        Self::validate(&read_tsv(&self.path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HabitatError;

    #[test]
    fn drops_non_metagenomic_rows() {
        let raw = df![
            "amp" => &["AMP10.000_000", "AMP10.000_001", "AMP10.000_002"],
            "sample" => &["S1", "S1", "G1"],
            "general_envo_name" => &["soil", "soil", "soil"],
            "is_metagenomic" => &["True", "True", "False"],
        ]
        .unwrap();
        let hits = AmpGenesDataset::validate(&raw).unwrap();
        assert_eq!(hits.height(), 2);
        assert_eq!(hits.width(), 3);
        let samples: Vec<&str> = hits.column("sample").unwrap().str().unwrap().into_no_null_iter().collect();
        assert_eq!(samples, vec!["S1", "S1"]);
    }

    #[test]
    fn flag_column_is_optional() {
        let raw = df![
            "amp" => &["A"],
            "sample" => &["S1"],
            "general_envo_name" => &["marine"],
        ]
        .unwrap();
        assert_eq!(AmpGenesDataset::validate(&raw).unwrap().height(), 1);
    }

    #[test]
    fn bad_flag_is_malformed() {
        let raw = df![
            "amp" => &["A"],
            "sample" => &["S1"],
            "general_envo_name" => &["marine"],
            "is_metagenomic" => &["maybe"],
        ]
        .unwrap();
        assert!(matches!(
            AmpGenesDataset::validate(&raw),
            Err(HabitatError::MalformedInputRow { row: 1, .. })
        ));
    }
}
