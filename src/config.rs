use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{bail, Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};

/// Tunables of one tracking run. Every field can be set on the command line
/// or in a JSON file; missing JSON fields take the defaults below.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[derive(clap::Parser)]
#[serde(default)]
pub struct Config {
    /// Trajectories are finalized once they hold this many points
    #[clap(long, default_value = "10")]
    pub max_age: usize,

    /// Detect new candidates when at most this many trajectories are active
    #[clap(long, default_value = "5")]
    pub lower_bound: usize,

    /// Minimum per-frame Manhattan displacement of a kept point, in pixels
    #[clap(long, default_value = "1.5")]
    pub movement_sensitivity: f64,

    #[clap(long, default_value = "100")]
    pub max_candidates: usize,

    /// Candidates weaker than this fraction of the strongest corner are dropped
    #[clap(long, default_value = "0.01")]
    pub quality_level: f64,

    /// Minimum distance between two candidates, in pixels
    #[clap(long, default_value = "10.0")]
    pub min_distance: f64,

    /// Side of the structure tensor window of the corner detector
    #[clap(long, default_value = "3")]
    pub block_size: usize,

    #[clap(long, default_value = "3")]
    pub lk_levels: usize,

    /// Side of the Lucas-Kanade integration window, must be odd
    #[clap(long, default_value = "15")]
    pub lk_win_size: usize,

    #[clap(long, default_value = "10")]
    pub lk_iters: usize,

    /// Stop iterating once the flow update is shorter than this
    #[clap(long, default_value = "0.01")]
    pub lk_term: f64,

    #[clap(long, default_value = "0.0001")]
    pub lk_min_eig: f64,

    /// Compare new descriptors only against the most recent finalized
    /// trajectories. Unbounded when unset.
    #[clap(long)]
    pub comparison_window: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_age: 10,
            lower_bound: 5,
            movement_sensitivity: 1.5,
            max_candidates: 100,
            quality_level: 0.01,
            min_distance: 10.,
            block_size: 3,
            lk_levels: 3,
            lk_win_size: 15,
            lk_iters: 10,
            lk_term: 0.01,
            lk_min_eig: 1e-4,
            comparison_window: None,
        }
    }
}

impl Config {
    pub fn from_json_file(path: &Path) -> Result<Config> {
        let file = File::open(path).with_context(|| format!("cannot open config {}", path.display()))?;
        let config: Config = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("invalid config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_age < 2 {
            bail!("max_age must be at least 2, got {}", self.max_age);
        }
        if !(self.movement_sensitivity >= 0.) {
            bail!("movement_sensitivity must be non-negative");
        }
        if !(self.quality_level > 0. && self.quality_level <= 1.) {
            bail!("quality_level must be in (0, 1], got {}", self.quality_level);
        }
        if !(self.min_distance >= 0.) {
            bail!("min_distance must be non-negative");
        }
        if self.block_size == 0 || self.block_size % 2 == 0 {
            bail!("block_size must be odd, got {}", self.block_size);
        }
        if self.lk_win_size < 3 || self.lk_win_size % 2 == 0 {
            bail!("lk_win_size must be odd and at least 3, got {}", self.lk_win_size);
        }
        if self.lk_iters == 0 {
            bail!("lk_iters must be positive");
        }
        if self.comparison_window == Some(0) {
            bail!("comparison_window must be positive when set");
        }
        Ok(())
    }
}
