pub mod amp_genes;
pub mod clustering_levels;
pub mod families;
pub mod metadata;
pub mod sample_stats;
