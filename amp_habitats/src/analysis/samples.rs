//! Joins the loaded tables into one normalized row per sample.

use polars::prelude::*;
use tracing::{info, warn};

use crate::analysis::aggregate::host_label;
use crate::error::Result;
use crate::habitat::HabitatTables;
use crate::models::SampleRecord;

/// The per-sample frame and the typed records parsed from it, row for row.
#[derive(Debug, Clone)]
pub struct Samples {
    pub frame: DataFrame,
    pub records: Vec<SampleRecord>,
}

/// Distinct AMPs per sample; repeated (amp, sample) rows count once.
pub fn amp_counts(hits: &DataFrame) -> LazyFrame {
    hits.clone()
        .lazy()
        .group_by([col("sample")])
        .agg([col("amp").n_unique().cast(DataType::UInt64).alias("ampsphere_amps")])
        .select([col("sample").alias("sample_accession"), col("ampsphere_amps")])
}

/// Every resolved metadata sample, in metadata order, with its assembly
/// statistics (null when absent) and distinct AMP count (0 when absent).
pub fn sample_frame(metadata: &DataFrame, stats: &DataFrame, hits: &DataFrame) -> Result<DataFrame> {
    let on = || [col("sample_accession")];
    Ok(metadata
        .clone()
        .lazy()
        .with_row_index("row", None)
        .join(stats.clone().lazy(), on(), on(), JoinArgs::from(JoinType::Left))
        .join(amp_counts(hits), on(), on(), JoinArgs::from(JoinType::Left))
        .with_column(col("ampsphere_amps").fill_null(lit(0u64)))
        .sort_by_exprs([col("row")], SortMultipleOptions::default())
        .select([col("*").exclude(["row"])])
        .collect()?)
}

fn records_from_frame(frame: &DataFrame, tables: &HabitatTables) -> Result<Vec<SampleRecord>> {
    let samples = frame.column("sample_accession")?.str()?;
    let habitats = frame.column("general_envo_name")?.str()?;
    let latitude = frame.column("latitude")?.f64()?;
    let longitude = frame.column("longitude")?.f64()?;
    let assembly = frame.column("assembly_total_length")?.u64()?;
    let inserts = frame.column("inserts_filtered")?.u64()?;
    let smorfs = frame.column("smORFs")?.u64()?;
    let amps = frame.column("ampsphere_amps")?.u64()?;

    let mut records = Vec::with_capacity(frame.height());
    for i in 0..frame.height() {
        let habitat = habitats.get(i).unwrap_or_default();
        let (group, host_associated) = tables.classify(habitat)?;
        records.push(SampleRecord {
            sample: samples.get(i).unwrap_or_default().to_string(),
            habitat: habitat.to_string(),
            group,
            host_associated,
            latitude: latitude.get(i),
            longitude: longitude.get(i),
            assembly_length: assembly.get(i),
            inserts_filtered: inserts.get(i),
            smorfs: smorfs.get(i),
            amps: amps.get(i).unwrap_or(0),
        });
    }
    Ok(records)
}

/// Joins metadata, statistics and AMP occurrences, then classifies every
/// sample. The returned frame gains `macro_environment`,
/// `is_host_associated` and both per-megabase rates.
pub fn build_samples(
    metadata: &DataFrame,
    stats: &DataFrame,
    hits: &DataFrame,
    tables: &HabitatTables,
) -> Result<Samples> {
    let mut frame = sample_frame(metadata, stats, hits)?;
    let records = records_from_frame(&frame, tables)?;

    let derived = [
        Series::new(
            "macro_environment".into(),
            records.iter().map(|r| r.group.as_str()).collect::<Vec<_>>(),
        ),
        Series::new(
            "is_host_associated".into(),
            records.iter().map(|r| host_label(r.host_associated)).collect::<Vec<_>>(),
        ),
        Series::new(
            "ampsphere_amps_per_assembly_mbps".into(),
            records.iter().map(SampleRecord::rate).collect::<Vec<_>>(),
        ),
        Series::new(
            "smorfs_per_assembly_mbps".into(),
            records.iter().map(SampleRecord::smorf_rate).collect::<Vec<_>>(),
        ),
    ];
    for series in derived {
        frame.with_column(Column::from(series))?;
    }

    let unassembled = records.iter().filter(|r| r.assembly_length.is_none()).count();
    if unassembled > 0 {
        warn!("{} samples have no assembly statistics", unassembled);
    }
    let undefined = records.iter().filter(|r| r.rate().is_none()).count();
    if undefined > 0 {
        warn!("{} samples have no defined AMP rate", undefined);
    }
    info!("Built {} sample records", records.len());
    Ok(Samples { frame, records })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::habitat::HabitatGroup;

    fn metadata() -> DataFrame {
        df![
            "sample_accession" => &["S1", "S2", "S3", "S5"],
            "general_envo_name" => &["soil", "human gut", "volcano", "marine"],
            "latitude" => &[Some(1.5), None, None, None],
            "longitude" => &[None::<f64>, None, None, None],
        ]
        .unwrap()
    }

    fn stats() -> DataFrame {
        df![
            "sample_accession" => &["S2", "S1", "S3", "S4"],
            "assembly_total_length" => &[2_000_000u64, 1_000_000, 0, 5],
            "inserts_filtered" => &[Some(10u64), Some(10), None, None],
            "smORFs" => &[Some(4u64), None, None, None],
        ]
        .unwrap()
    }

    fn hits() -> DataFrame {
        df![
            "amp" => &["X", "X", "Y", "X", "Z"],
            "sample" => &["S1", "S1", "S1", "S2", "G1"],
            "general_envo_name" => &["soil", "soil", "soil", "human gut", "soil"],
        ]
        .unwrap()
    }

    #[test]
    fn duplicate_amp_rows_count_once() {
        let counts = amp_counts(&hits())
            .sort_by_exprs([col("sample_accession")], SortMultipleOptions::default())
            .collect()
            .unwrap();
        let samples: Vec<&str> = counts.column("sample_accession").unwrap().str().unwrap().into_no_null_iter().collect();
        let amps: Vec<u64> = counts.column("ampsphere_amps").unwrap().u64().unwrap().into_no_null_iter().collect();
        assert_eq!(samples, vec!["G1", "S1", "S2"]);
        assert_eq!(amps, vec![1, 2, 1]);
    }

    #[test]
    fn keeps_every_metadata_sample_in_order() {
        let samples = build_samples(&metadata(), &stats(), &hits(), &HabitatTables::default()).unwrap();
        let records = &samples.records;

        let order: Vec<&str> = records.iter().map(|r| r.sample.as_str()).collect();
        assert_eq!(order, vec!["S1", "S2", "S3", "S5"]);

        assert_eq!(records[0].amps, 2);
        assert_eq!(records[0].rate(), Some(2.0));
        assert_eq!(records[0].latitude, Some(1.5));
        assert_eq!(records[1].group, HabitatGroup::HumanGut);
        assert!(records[1].host_associated);
        assert_eq!(records[1].smorf_rate(), Some(2.0));
        assert_eq!(records[2].group, HabitatGroup::Other);
        assert_eq!(records[2].amps, 0);
        assert_eq!(records[2].rate(), None);
        // no statistics row
        assert_eq!(records[3].assembly_length, None);
        assert_eq!(records[3].rate(), None);
    }

    #[test]
    fn frame_gains_classification_and_rates() {
        let samples = build_samples(&metadata(), &stats(), &hits(), &HabitatTables::default()).unwrap();
        let frame = &samples.frame;
        assert_eq!(frame.height(), 4);

        let macro_env: Vec<&str> = frame.column("macro_environment").unwrap().str().unwrap().into_no_null_iter().collect();
        assert_eq!(macro_env, vec!["soil/plant", "human gut", "other", "aquatic"]);
        let host = frame.column("is_host_associated").unwrap().str().unwrap();
        assert_eq!(host.get(1), Some("host"));
        let rates = frame.column("ampsphere_amps_per_assembly_mbps").unwrap().f64().unwrap();
        assert_eq!(rates.get(1), Some(0.5));
        assert_eq!(rates.get(3), None);
        let amps = frame.column("ampsphere_amps").unwrap().u64().unwrap();
        assert_eq!(amps.get(3), Some(0));
    }
}
