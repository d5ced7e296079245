pub mod aggregate;
pub mod clustering;
pub mod correction;
pub mod mann_whitney;
pub mod pairwise;
pub mod samples;
pub mod supplementary;
