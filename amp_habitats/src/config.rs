use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analysis::correction::Correction;
use crate::error::Result;

pub const CONFIG_FILE_NAME: &str = "amp_habitats.json";

/// Thresholds behind the per-habitat rate ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub min_samples: usize,
    pub min_assembly_bp: u64,
    pub max_rate: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            min_samples: 100,
            min_assembly_bp: 1_000_000,
            max_rate: 4.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,

    pub metadata: String,
    pub envo_names: String,
    pub sample_stats: String,
    pub amp_genes: String,
    pub families: Option<String>,
    /// Clustering significance tables, one per level, in level order.
    pub clustering_levels: Vec<String>,
    pub habitat_tables: Option<PathBuf>,

    pub comparison_habitats: Vec<String>,
    pub correction: Correction,
    pub ranking: RankingConfig,
    pub min_family_size: usize,
    pub max_evalue: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("outputs"),
            metadata: "metadata.tsv.gz".to_string(),
            envo_names: "general_envo_names.tsv.gz".to_string(),
            sample_stats: "samples-min500k-assembly-prodigal-stats.tsv.gz".to_string(),
            amp_genes: "gmsc_amp_genes_envohr_source.tsv.gz".to_string(),
            families: None,
            clustering_levels: Vec::new(),
            habitat_tables: None,
            comparison_habitats: [
                "human gut",
                "cat gut",
                "dog gut",
                "chicken gut",
                "pig gut",
                "cattle gut",
                "mouse gut",
                "rat gut",
                "primate gut",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            correction: Correction::HolmSidak,
            ranking: RankingConfig::default(),
            min_family_size: 8,
            max_evalue: 1e-5,
        }
    }
}

impl PipelineConfig {
    /// Loads `amp_habitats.json` from the project root, or the defaults when
    /// no such file exists. Relative paths resolve against the project root.
    pub fn load(project_root: &Path) -> Result<Self> {
        let path = project_root.join(CONFIG_FILE_NAME);
        let mut config = if path.exists() {
            info!("Reading configuration from {}", path.display());
            let file = std::fs::File::open(&path)?;
            serde_json::from_reader(std::io::BufReader::new(file))?
        } else {
            info!("No {} in {}, using defaults", CONFIG_FILE_NAME, project_root.display());
            Self::default()
        };
        config.data_dir = project_root.join(&config.data_dir);
        config.output_dir = project_root.join(&config.output_dir);
        config.habitat_tables = config.habitat_tables.map(|p| project_root.join(p));
        Ok(config)
    }

    pub fn input(&self, file_name: &str) -> PathBuf {
        self.data_dir.join(file_name)
    }

    pub fn output(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::load(dir.path()).unwrap();
        assert_eq!(config.data_dir, dir.path().join("data"));
        assert_eq!(config.comparison_habitats.len(), 9);
        assert_eq!(config.correction, Correction::HolmSidak);
        assert_eq!(config.ranking.min_samples, 100);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{"output_dir": "results", "correction": "holm", "ranking": {"min_samples": 5}}"#,
        )
        .unwrap();
        let config = PipelineConfig::load(dir.path()).unwrap();
        assert_eq!(config.output("x.tsv"), dir.path().join("results").join("x.tsv"));
        assert_eq!(config.correction, Correction::Holm);
        assert_eq!(config.ranking.min_samples, 5);
        assert_eq!(config.ranking.max_rate, 4.0);
        assert_eq!(config.min_family_size, 8);
    }
}
