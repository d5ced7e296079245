use std::path::PathBuf;

use polars::prelude::*;
use tracing::info;

use crate::error::Result;
use crate::helper_functions::{opt_str_column, read_tsv, reject_duplicates, str_column, Cell};
use crate::models::Dataset;

/// Count columns carried when present; all-null otherwise.
pub const OPTIONAL_COUNTS: [&str; 5] = [
    "inserts_filtered",
    "smORFs",
    "inserts_raw",
    "assembly_N50",
    "prodigal_total_orfs",
];

/// Assembly statistics, one row per sample.
pub struct SampleStatsDataset {
    pub path: PathBuf,
}

impl SampleStatsDataset {
    /// `sample_accession` (string), `assembly_total_length` (u64) and the
    /// optional counts (nullable u64). Duplicate accessions are rejected.
    pub fn validate(raw: &DataFrame) -> Result<DataFrame> {
        let table = Self::TABLE;
        let samples = str_column(raw, table, "sample_accession")?;
        let lengths = str_column(raw, table, "assembly_total_length")?;
        let optional = OPTIONAL_COUNTS
            .iter()
            .map(|name| opt_str_column(raw, name))
            .collect::<Result<Vec<_>>>()?;

        let height = raw.height();
        let mut ids = Vec::with_capacity(height);
        let mut assembly = Vec::with_capacity(height);
        let mut counts: Vec<Vec<Option<u64>>> = vec![Vec::with_capacity(height); OPTIONAL_COUNTS.len()];

        for i in 0..height {
            let sample = Cell { table, row: i, column: "sample_accession", key: "-" }
                .required(samples.get(i))?;
            let cell = |column| Cell { table, row: i, column, key: sample };

            assembly.push(cell("assembly_total_length").count(lengths.get(i))?);
            for ((name, column), values) in OPTIONAL_COUNTS.iter().zip(&optional).zip(counts.iter_mut()) {
                values.push(cell(*name).opt_count(column.and_then(|c| c.get(i)))?);
            }
            ids.push(sample);
        }

        let mut columns = vec![
            Column::from(Series::new("sample_accession".into(), ids)),
            Column::from(Series::new("assembly_total_length".into(), assembly)),
        ];
        for (name, values) in OPTIONAL_COUNTS.iter().zip(counts) {
            columns.push(Column::from(Series::new((*name).into(), values)));
        }
        let df = DataFrame::new(columns)?;

        reject_duplicates(&df, table, "sample_accession")?;
        Ok(df)
    }
}

impl Dataset for SampleStatsDataset {
    const TABLE: &'static str = "sample_stats";

    fn load(&self) -> Result<DataFrame> {
        let df = Self::validate(&read_tsv(&self.path)?)?;
        info!("Assembly statistics for {} samples", df.height());
        Ok(df)
    }
}
