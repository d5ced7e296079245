//! Load → normalize → aggregate → test → report, once per run.
//!
//! Every input is loaded and every table computed before the first output is
//! written, so a failing run leaves the output directory untouched.

use polars::prelude::DataFrame;
use tracing::{info, warn};

use crate::analysis::aggregate::{aggregate_groups, aggregate_host, GroupSummary, HostSummary};
use crate::analysis::clustering::{level_name, level_significance, LevelSignificance};
use crate::analysis::pairwise::{pairwise_tests, rates_by_habitat, PairwiseTest};
use crate::analysis::samples::build_samples;
use crate::analysis::supplementary::{
    assembly_table, family_summary, habitat_totals, hit_groups, host_amp_counts, rate_ranking, sample_table,
};
use crate::config::PipelineConfig;
use crate::data_handling::amp_genes::AmpGenesDataset;
use crate::data_handling::clustering_levels::{ClusterAlignment, ClusteringLevelDataset};
use crate::data_handling::families::FamilyDataset;
use crate::data_handling::metadata::MetadataDataset;
use crate::data_handling::sample_stats::SampleStatsDataset;
use crate::error::Result;
use crate::habitat::HabitatTables;
use crate::helper_functions::{write_dataframe_tsv, write_records_tsv};
use crate::models::{AmpHit, Dataset};

pub const PAIRWISE_OUTPUT: &str = "mannwhitneyu_test_mammalguts.tsv";
pub const SAMPLE_TABLE_OUTPUT: &str = "table_S2.tsv";
pub const ASSEMBLY_TABLE_OUTPUT: &str = "table_S1.tsv";
pub const HABITAT_SUMMARY_OUTPUT: &str = "habitat_summary.tsv";
pub const HOST_SUMMARY_OUTPUT: &str = "host_summary.tsv";
pub const HABITAT_TOTALS_OUTPUT: &str = "habitat_totals.tsv";
pub const RATE_RANKING_OUTPUT: &str = "habitat_rate_ranking.tsv";
pub const HOST_AMPS_OUTPUT: &str = "host_common_name_amps.tsv";
pub const FAMILY_SUMMARY_OUTPUT: &str = "family_summary.tsv";
pub const CLUSTERING_OUTPUT: &str = "clustering_significance_summary.tsv";

/// Habitat tables from the configured override, or the built-in ones.
pub fn habitat_tables(config: &PipelineConfig) -> Result<HabitatTables> {
    let tables = match &config.habitat_tables {
        Some(path) => HabitatTables::from_json_path(path)?,
        None => HabitatTables::default(),
    };
    tables.validate()?;
    Ok(tables)
}

/// Validated input frames.
struct Inputs {
    metadata: DataFrame,
    stats: DataFrame,
    hits: DataFrame,
    families: Option<DataFrame>,
    levels: Vec<DataFrame>,
}

fn load(config: &PipelineConfig) -> Result<Inputs> {
    let metadata = MetadataDataset {
        metadata_path: config.input(&config.metadata),
        envo_names_path: config.input(&config.envo_names),
    }
    .load()?;
    let stats = SampleStatsDataset { path: config.input(&config.sample_stats) }.load()?;
    let hits = AmpGenesDataset { path: config.input(&config.amp_genes) }.load()?;

    let families = match &config.families {
        Some(file) => Some(FamilyDataset { path: config.input(file) }.load()?),
        None => None,
    };
    let levels = config
        .clustering_levels
        .iter()
        .map(|file| ClusteringLevelDataset { path: config.input(file) }.load())
        .collect::<Result<Vec<_>>>()?;

    Ok(Inputs { metadata, stats, hits, families, levels })
}

/// Every output table of one run.
struct Report {
    tests: Vec<PairwiseTest>,
    samples: DataFrame,
    assemblies: DataFrame,
    groups: Vec<GroupSummary>,
    host: Vec<HostSummary>,
    totals: DataFrame,
    ranking: DataFrame,
    host_amps: DataFrame,
    families: Option<DataFrame>,
    clustering: Vec<LevelSignificance>,
}

fn compute(config: &PipelineConfig, tables: &HabitatTables, inputs: &Inputs) -> Result<Report> {
    // ── normalize ────────────────────────────────────────────────────
    let samples = build_samples(&inputs.metadata, &inputs.stats, &inputs.hits, tables)?;
    let hits = AmpHit::from_frame(&inputs.hits)?;

    // ── aggregate ────────────────────────────────────────────────────
    let groups = aggregate_groups(&samples.records, &hits, tables)?;
    let host = aggregate_host(&samples.records, &hits, tables)?;
    let totals = habitat_totals(&samples.frame, config.ranking.min_samples)?;
    let ranking = rate_ranking(&samples.frame, &config.ranking)?;
    let host_amps = host_amp_counts(&samples.frame, &inputs.hits)?;

    let families = match &inputs.families {
        Some(families) => {
            let grouped = hit_groups(&inputs.hits, &samples.frame, tables)?;
            Some(family_summary(&grouped, families, config.min_family_size)?)
        }
        None => None,
    };
    let mut clustering = Vec::with_capacity(inputs.levels.len());
    for (i, level) in inputs.levels.iter().enumerate() {
        let rows = ClusterAlignment::from_frame(level)?;
        clustering.push(level_significance(&level_name(i), &rows, config.max_evalue));
    }

    // ── test ─────────────────────────────────────────────────────────
    let rates = rates_by_habitat(&samples.records);
    let tests = pairwise_tests(&config.comparison_habitats, &rates, config.correction)?;

    info!("{} samples in {} habitat groups", samples.records.len(), groups.len());
    Ok(Report {
        tests,
        samples: sample_table(&samples.frame)?,
        assemblies: assembly_table(&samples.frame)?,
        groups,
        host,
        totals,
        ranking,
        host_amps,
        families,
        clustering,
    })
}

impl Report {
    fn write(&self, config: &PipelineConfig) -> Result<()> {
        write_records_tsv(&config.output(PAIRWISE_OUTPUT), &self.tests)?;
        write_dataframe_tsv(&config.output(SAMPLE_TABLE_OUTPUT), &self.samples)?;
        write_dataframe_tsv(&config.output(ASSEMBLY_TABLE_OUTPUT), &self.assemblies)?;
        write_records_tsv(&config.output(HABITAT_SUMMARY_OUTPUT), &self.groups)?;
        write_records_tsv(&config.output(HOST_SUMMARY_OUTPUT), &self.host)?;
        write_dataframe_tsv(&config.output(HABITAT_TOTALS_OUTPUT), &self.totals)?;
        write_dataframe_tsv(&config.output(RATE_RANKING_OUTPUT), &self.ranking)?;
        write_dataframe_tsv(&config.output(HOST_AMPS_OUTPUT), &self.host_amps)?;
        if let Some(families) = &self.families {
            write_dataframe_tsv(&config.output(FAMILY_SUMMARY_OUTPUT), families)?;
        }
        if !self.clustering.is_empty() {
            write_records_tsv(&config.output(CLUSTERING_OUTPUT), &self.clustering)?;
        }
        Ok(())
    }
}

pub fn run(config: &PipelineConfig) -> Result<()> {
    let tables = habitat_tables(config)?;

    // ── 1) load ──────────────────────────────────────────────────────
    let inputs = load(config)?;

    // ── 2-4) normalize, aggregate, test ──────────────────────────────
    let report = compute(config, &tables, &inputs)?;

    // ── 5) report ────────────────────────────────────────────────────
    report.write(config)?;

    let significant = report.tests.iter().filter(|t| t.p_adjusted < 0.05).count();
    if significant == 0 {
        warn!("No pairwise comparison is significant after correction");
    }
    info!(
        "{}/{} comparisons significant at 0.05",
        significant,
        report.tests.len()
    );
    Ok(())
}
