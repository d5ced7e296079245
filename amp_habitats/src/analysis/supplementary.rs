//! Supplementary tables built from the per-sample frame: the per-sample
//! listings, per-habitat totals, habitat rate ranking, AMP family counts and
//! AMPs per host species.

use polars::prelude::*;
use tracing::info;

use crate::config::RankingConfig;
use crate::error::Result;
use crate::habitat::HabitatTables;

pub const OTHER_HABITATS: &str = "other";
pub const MEDIAN_RATE: &str = "median AMPs per assembled Mbp";
pub const PLANT_HOST: &str = "plant";

/// Host species pooled as [`PLANT_HOST`] in the per-host AMP counts.
pub const PLANT_HOSTS: [&str; 27] = [
    "lettuce",
    "monocots",
    "cowpea",
    "mosses",
    "pitcher plant",
    "maize",
    "thale cress",
    "siratro",
    "grapevine",
    "Norway spruce",
    "black cottonwood",
    "soy",
    "french bean",
    "silvergrass",
    "sorghum",
    "bread wheat",
    "sunflower",
    "carrot",
    "lodgepole pine",
    "burclover",
    "cottongrass",
    "switchgrass",
    "eudicots",
    "agave",
    "barrelclover",
    "alfalfa",
    "red fir",
];

/// Per-sample table (`table_S2`).
pub fn sample_table(samples: &DataFrame) -> Result<DataFrame> {
    Ok(samples
        .clone()
        .lazy()
        .select([
            col("sample_accession"),
            col("ena_ers_sample_id"),
            col("database"),
            col("access_status"),
            col("study"),
            col("study_accession"),
            col("general_envo_name").alias("micro_environment"),
            col("macro_environment"),
            col("inserts_filtered"),
            col("assembly_total_length"),
            col("smORFs"),
            col("ampsphere_amps"),
            col("ampsphere_amps_per_assembly_mbps"),
            col("smorfs_per_assembly_mbps"),
            col("is_host_associated"),
            col("latitude"),
            col("longitude"),
        ])
        .collect()?)
}

/// Assembly statistics of every assembled sample (`table_S1`).
pub fn assembly_table(samples: &DataFrame) -> Result<DataFrame> {
    Ok(samples
        .clone()
        .lazy()
        .filter(col("assembly_total_length").is_not_null())
        .select([
            col("sample_accession").alias("sample"),
            col("general_envo_name").alias("habitat"),
            col("inserts_raw").alias("raw inserts"),
            col("assembly_total_length").alias("assembled bp"),
            col("assembly_N50").alias("N50"),
            col("prodigal_total_orfs").alias("ORFs+smORFs"),
            col("smORFs"),
            col("ampsphere_amps").alias("non-redundant AMPs"),
        ])
        .collect()?)
}

/// Samples, filtered inserts, smORFs and assembled bp per raw habitat.
/// Habitats with more than `min_samples` samples keep their own row; the
/// rest are pooled into `other`.
pub fn habitat_totals(samples: &DataFrame, min_samples: usize) -> Result<DataFrame> {
    let sums = || {
        [
            col("inserts_filtered").sum().alias("inserts_filtered"),
            col("smORFs").sum().alias("smORFs"),
            col("assembly_total_length").sum().alias("assembly_total_length"),
        ]
    };

    let per_habitat = samples
        .clone()
        .lazy()
        .group_by([col("general_envo_name").alias("habitat")])
        .agg([vec![len().cast(DataType::UInt64).alias("samples")], sums().to_vec()].concat());

    let pooled = per_habitat
        .with_column(
            when(col("samples").lt_eq(lit(min_samples as u64)))
                .then(lit(OTHER_HABITATS))
                .otherwise(col("habitat"))
                .alias("habitat"),
        )
        .group_by([col("habitat")])
        .agg([vec![col("samples").sum().alias("samples")], sums().to_vec()].concat())
        .sort_by_exprs(
            [col("samples"), col("habitat")],
            SortMultipleOptions {
                descending: vec![true, false],
                nulls_last: vec![false, false],
                multithreaded: true,
                maintain_order: true,
                limit: None,
            },
        )
        .collect()?;

    info!("Habitat totals: {} rows (pooling at <= {} samples)", pooled.height(), min_samples);
    Ok(pooled)
}

/// Habitats with at least `min_samples` samples, ranked by median rate
/// (ascending) over samples with `assembly > min_assembly_bp` and
/// `rate < max_rate`.
pub fn rate_ranking(samples: &DataFrame, ranking: &RankingConfig) -> Result<DataFrame> {
    let habitat = || [col("general_envo_name")];
    let sizes = samples
        .clone()
        .lazy()
        .group_by(habitat())
        .agg([len().cast(DataType::UInt64).alias("habitat_samples")]);

    Ok(samples
        .clone()
        .lazy()
        .join(sizes, habitat(), habitat(), JoinArgs::from(JoinType::Inner))
        .filter(
            col("habitat_samples")
                .gt_eq(lit(ranking.min_samples as u64))
                .and(col("assembly_total_length").gt(lit(ranking.min_assembly_bp)))
                .and(col("ampsphere_amps_per_assembly_mbps").lt(lit(ranking.max_rate))),
        )
        .group_by(habitat())
        .agg([
            col("macro_environment").first(),
            len().cast(DataType::UInt64).alias("samples"),
            col("ampsphere_amps_per_assembly_mbps").median().alias(MEDIAN_RATE),
        ])
        .sort_by_exprs([col(MEDIAN_RATE), col("general_envo_name")], SortMultipleOptions::default())
        .select([
            col("general_envo_name").alias("habitat"),
            col("macro_environment"),
            col("samples"),
            col(MEDIAN_RATE),
        ])
        .collect()?)
}

/// Attaches a coarse group to every AMP occurrence: the group of its sample,
/// or of its own label when the sample has no row.
pub fn hit_groups(hits: &DataFrame, samples: &DataFrame, tables: &HabitatTables) -> Result<DataFrame> {
    let known = samples
        .clone()
        .lazy()
        .select([col("sample_accession").alias("sample"), col("macro_environment")]);
    let joined = hits
        .clone()
        .lazy()
        .with_row_index("row", None)
        .join(known, [col("sample")], [col("sample")], JoinArgs::from(JoinType::Left))
        .sort_by_exprs([col("row")], SortMultipleOptions::default())
        .collect()?;

    let labels = joined.column("general_envo_name")?.str()?;
    let groups = joined.column("macro_environment")?.str()?;
    let resolved: Vec<&str> = labels
        .into_iter()
        .zip(groups)
        .map(|(label, group)| group.unwrap_or_else(|| tables.normalize(label.unwrap_or_default()).as_str()))
        .collect();

    let mut out = joined.select(["amp", "sample"])?;
    out.with_column(Column::from(Series::new("macro_environment".into(), resolved)))?;
    Ok(out)
}

/// Distinct families per coarse group, overall and restricted to families
/// with at least `min_family_size` catalog members.
pub fn family_summary(groups: &DataFrame, families: &DataFrame, min_family_size: usize) -> Result<DataFrame> {
    let sizes = families
        .clone()
        .lazy()
        .group_by([col("family")])
        .agg([len().cast(DataType::UInt64).alias("family_size")]);

    Ok(groups
        .clone()
        .lazy()
        .join(families.clone().lazy(), [col("amp")], [col("amp")], JoinArgs::from(JoinType::Inner))
        .join(sizes, [col("family")], [col("family")], JoinArgs::from(JoinType::Inner))
        .group_by([col("macro_environment")])
        .agg([
            col("family").n_unique().cast(DataType::UInt64).alias("AMP families"),
            col("family")
                .filter(col("family_size").gt_eq(lit(min_family_size as u64)))
                .n_unique()
                .cast(DataType::UInt64)
                .alias("AMP families (min size)"),
        ])
        .sort_by_exprs([col("macro_environment")], SortMultipleOptions::default())
        .select([
            col("macro_environment").alias("high level environment"),
            col("AMP families"),
            col("AMP families (min size)"),
        ])
        .collect()?)
}

/// Distinct AMPs per `host_common_name`, plant hosts pooled as `plant`.
/// Samples without a host name are left out. Sorted by count, ascending.
pub fn host_amp_counts(samples: &DataFrame, hits: &DataFrame) -> Result<DataFrame> {
    let host = || [col("host_common_name")];
    let plants = df![
        "host_common_name" => PLANT_HOSTS,
        "plant" => [PLANT_HOST; PLANT_HOSTS.len()],
    ]?;
    let hosts = samples
        .clone()
        .lazy()
        .select([col("sample_accession").alias("sample"), col("host_common_name")])
        .filter(col("host_common_name").is_not_null());

    let counts = hits
        .clone()
        .lazy()
        .join(hosts, [col("sample")], [col("sample")], JoinArgs::from(JoinType::Inner))
        .join(plants.lazy(), host(), host(), JoinArgs::from(JoinType::Left))
        .with_column(col("plant").fill_null(col("host_common_name")).alias("host_common_name"))
        .group_by(host())
        .agg([col("amp").n_unique().cast(DataType::UInt64).alias("non-redundant AMPs")])
        .sort_by_exprs([col("non-redundant AMPs"), col("host_common_name")], SortMultipleOptions::default())
        .collect()?;

    info!("Distinct AMPs for {} host species", counts.height());
    Ok(counts)
}
