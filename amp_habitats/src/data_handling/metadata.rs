//! Sample metadata joined with the habitat vocabulary.
//!
//! The vocabulary maps (`microontology`, `host_tax_id`) to a
//! `general_envo_name`. Samples without a vocabulary entry are dropped by the
//! inner join; a missing `host_tax_id` matches a missing one.

use std::path::PathBuf;

use polars::prelude::*;
use tracing::{info, warn};

use crate::error::Result;
use crate::helper_functions::{
    first_conflict, join_key, opt_str_column, read_tsv, reject_duplicates, str_column, text_column, Cell,
};
use crate::models::Dataset;

pub const ENVO_TABLE: &str = "general_envo_names";

/// Metadata columns copied to the per-sample table as they are.
pub const PASS_THROUGH: [&str; 6] = [
    "ena_ers_sample_id",
    "database",
    "access_status",
    "study",
    "study_accession",
    "host_common_name",
];

const JOIN_KEYS: [&str; 2] = ["onto_key", "host_key"];

fn with_join_keys(df: DataFrame) -> Result<DataFrame> {
    Ok(df
        .lazy()
        .with_columns([
            join_key("microontology").alias(JOIN_KEYS[0]),
            join_key("host_tax_id").alias(JOIN_KEYS[1]),
        ])
        .collect()?)
}

/// One `general_envo_name` per join key. Two different names under the same
/// key are an error.
fn vocabulary(raw: &DataFrame) -> Result<DataFrame> {
    let names = str_column(raw, ENVO_TABLE, "general_envo_name")?;
    str_column(raw, ENVO_TABLE, "microontology")?;
    str_column(raw, ENVO_TABLE, "host_tax_id")?;
    for i in 0..raw.height() {
        Cell { table: ENVO_TABLE, row: i, column: "general_envo_name", key: "-" }.required(names.get(i))?;
    }

    let keyed = with_join_keys(raw.select(["general_envo_name", "microontology", "host_tax_id"])?)?;
    if let Some(conflict) = first_conflict(&keyed, &JOIN_KEYS, "general_envo_name")? {
        let onto = keyed.column("microontology")?.str()?.get(conflict.row).unwrap_or_default();
        let cell = Cell { table: ENVO_TABLE, row: conflict.row, column: "general_envo_name", key: onto };
        return Err(cell.malformed(
            &conflict.value,
            &format!("(microontology, host_tax_id) already maps to '{}'", conflict.earlier),
        ));
    }

    Ok(keyed
        .lazy()
        .group_by([col(JOIN_KEYS[0]), col(JOIN_KEYS[1])])
        .agg([col("general_envo_name").first()])
        .collect()?)
}

/// Typed metadata: validated accession and coordinates, join columns and the
/// pass-through columns (all-null when absent).
fn typed_metadata(raw: &DataFrame) -> Result<DataFrame> {
    let table = MetadataDataset::TABLE;
    let samples = str_column(raw, table, "sample_accession")?;
    let onto = str_column(raw, table, "microontology")?;
    let host = str_column(raw, table, "host_tax_id")?;
    let lat = opt_str_column(raw, "latitude")?;
    let lon = opt_str_column(raw, "longitude")?;

    let height = raw.height();
    let (mut ids, mut lats, mut lons) =
        (Vec::with_capacity(height), Vec::with_capacity(height), Vec::with_capacity(height));
    for i in 0..height {
        let sample = Cell { table, row: i, column: "sample_accession", key: "-" }.required(samples.get(i))?;
        let cell = |column| Cell { table, row: i, column, key: sample };

        lats.push(cell("latitude").opt_number(lat.and_then(|c| c.get(i)))?);
        lons.push(cell("longitude").opt_number(lon.and_then(|c| c.get(i)))?);
        ids.push(sample);
    }

    let mut columns = vec![
        Column::from(Series::new("sample_accession".into(), ids)),
        Column::from(onto.clone().into_series()),
        Column::from(host.clone().into_series()),
        Column::from(Series::new("latitude".into(), lats)),
        Column::from(Series::new("longitude".into(), lons)),
    ];
    for name in PASS_THROUGH {
        columns.push(text_column(raw, name)?);
    }
    let df = DataFrame::new(columns)?;

    reject_duplicates(&df, table, "sample_accession")?;
    with_join_keys(df)
}

/// Joins raw metadata with the raw vocabulary. Rows keep the metadata order.
pub fn resolve_habitats(metadata: &DataFrame, envo_names: &DataFrame) -> Result<DataFrame> {
    let vocab = vocabulary(envo_names)?;
    let meta = typed_metadata(metadata)?;
    let keys = [col(JOIN_KEYS[0]), col(JOIN_KEYS[1])];

    let mut keep = vec![
        col("sample_accession"),
        col("general_envo_name"),
        col("latitude"),
        col("longitude"),
    ];
    keep.extend(PASS_THROUGH.iter().map(|c| col(*c)));
    let resolved = meta
        .clone()
        .lazy()
        .with_row_index("row", None)
        .join(vocab.lazy(), keys.clone(), keys, JoinArgs::from(JoinType::Inner))
        .sort_by_exprs([col("row")], SortMultipleOptions::default())
        .select(keep)
        .collect()?;

    let unresolved = meta.height() - resolved.height();
    if unresolved > 0 {
        warn!("{} metadata rows have no habitat vocabulary entry and were dropped", unresolved);
    }
    info!("Resolved habitats for {} metadata rows", resolved.height());
    Ok(resolved)
}

pub struct MetadataDataset {
    pub metadata_path: PathBuf,
    pub envo_names_path: PathBuf,
}

impl Dataset for MetadataDataset {
    const TABLE: &'static str = "metadata";

    /// Metadata rows that resolved to a habitat, with `general_envo_name`
    /// attached.
    fn load(&self) -> Result<DataFrame> {
        let metadata = read_tsv(&self.metadata_path)?;
        let envo_names = read_tsv(&self.envo_names_path)?;
        resolve_habitats(&metadata, &envo_names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HabitatError;
    use std::fs;

    fn write(dir: &std::path::Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    fn strings<'a>(df: &'a DataFrame, name: &str) -> Vec<Option<&'a str>> {
        df.column(name).unwrap().str().unwrap().into_iter().collect()
    }

    #[test]
    fn joins_on_ontology_and_host_with_missing_hosts_matching() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = MetadataDataset {
            metadata_path: write(
                dir.path(),
                "metadata.tsv",
                "sample_accession\tmicroontology\thost_tax_id\tlatitude\tlongitude\tstudy\n\
                 S1\tgut\t9606\t10.5\t-3.0\tPRJ1\n\
                 S2\tmarine\t\t\t\tPRJ2\n\
                 S3\tunknown\t1\t\t\tPRJ3\n\
                 S4\tgut\t9606.0\t\t\tPRJ1\n",
            ),
            envo_names_path: write(
                dir.path(),
                "envo.tsv",
                "general_envo_name\tmicroontology\thost_tax_id\n\
                 human gut\tgut\t9606.0\n\
                 marine\tmarine\t\n\
                 human gut\tgut\t9606\n",
            ),
        };

        let df = dataset.load().unwrap();
        assert_eq!(strings(&df, "sample_accession"), vec![Some("S1"), Some("S2"), Some("S4")]);
        assert_eq!(strings(&df, "general_envo_name"), vec![Some("human gut"), Some("marine"), Some("human gut")]);
        assert_eq!(strings(&df, "study"), vec![Some("PRJ1"), Some("PRJ2"), Some("PRJ1")]);
        assert_eq!(df.column("database").unwrap().null_count(), 3);

        let lat = df.column("latitude").unwrap().f64().unwrap();
        assert_eq!(lat.get(0), Some(10.5));
        assert_eq!(lat.get(1), None);
    }

    #[test]
    fn conflicting_vocabulary_entries_are_rejected() {
        let metadata = df![
            "sample_accession" => &["S1"],
            "microontology" => &["gut"],
            "host_tax_id" => &["1"],
        ]
        .unwrap();
        let vocab = df![
            "general_envo_name" => &["cat gut", "marine", "dog gut"],
            "microontology" => &["gut", "marine", "gut"],
            "host_tax_id" => &["1", "2", "1.0"],
        ]
        .unwrap();
        match resolve_habitats(&metadata, &vocab) {
            Err(HabitatError::MalformedInputRow { table, row, value, .. }) => {
                assert_eq!(table, ENVO_TABLE);
                assert_eq!(row, 3);
                assert_eq!(value, "dog gut");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn duplicate_samples_are_rejected() {
        let metadata = df![
            "sample_accession" => &["S1", "S1"],
            "microontology" => &["gut", "gut"],
            "host_tax_id" => &["1", "1"],
        ]
        .unwrap();
        let vocab = df![
            "general_envo_name" => &["cat gut"],
            "microontology" => &["gut"],
            "host_tax_id" => &["1"],
        ]
        .unwrap();
        assert!(matches!(
            resolve_habitats(&metadata, &vocab),
            Err(HabitatError::MalformedInputRow { row: 2, .. })
        ));
    }

    #[test]
    fn missing_join_column_is_reported() {
        let metadata = df!["sample_accession" => &["S1"], "microontology" => &["gut"]].unwrap();
        let vocab = df![
            "general_envo_name" => &["cat gut"],
            "microontology" => &["gut"],
            "host_tax_id" => &["1"],
        ]
        .unwrap();
        match resolve_habitats(&metadata, &vocab) {
            Err(HabitatError::MissingColumn { table, column }) => {
                assert_eq!(table, "metadata");
                assert_eq!(column, "host_tax_id");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
