use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use serde_json::from_reader;

use crate::error::{Error, Result};
use crate::metadata::{Candidates, LayerConfig};

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    // naming convention of result tables
    #[serde(default = "default_wide_prefix")]
    pub wide_prefix: String,
    #[serde(default = "default_wide_suffix")]
    pub wide_suffix: String,

    // naming convention of training logs
    #[serde(default = "default_log_suffix")]
    pub log_suffix: String,

    #[serde(default = "default_batch_sizes")]
    pub batch_sizes: Vec<u32>,

    #[serde(default = "default_curve_batch_sizes")]
    pub curve_batch_sizes: Vec<u32>,

    #[serde(default = "default_layers")]
    pub layers: Vec<LayerConfig>,

    // fractions, not percents
    #[serde(default = "default_prune_fractions")]
    pub prune_fractions: Vec<f64>,

    #[serde(default = "default_grid_columns")]
    pub grid_columns: usize,

    #[serde(default)]
    pub shared_y_axis: bool,

    #[serde(default = "default_image_width")]
    pub image_width: u32,
    #[serde(default = "default_image_height")]
    pub image_height: u32,
}

// relative to the working directory, never a machine-specific location
fn default_root_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("plots")
}

fn default_wide_prefix() -> String {
    "prune_layers_".to_string()
}

fn default_wide_suffix() -> String {
    "_output.txt".to_string()
}

fn default_log_suffix() -> String {
    "run_0.txt".to_string()
}

fn default_batch_sizes() -> Vec<u32> {
    vec![64, 1024]
}

fn default_curve_batch_sizes() -> Vec<u32> {
    vec![1024]
}

fn default_layers() -> Vec<LayerConfig> {
    LayerConfig::ALL_CONFIGS.to_vec()
}

// 0.0, 0.1, ... 1.0
fn default_prune_fractions() -> Vec<f64> {
    (0..=10).map(|i| i as f64 / 10.0).collect()
}

fn default_grid_columns() -> usize {
    3
}

fn default_image_width() -> u32 {
    1000
}

fn default_image_height() -> u32 {
    600
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            output_dir: default_output_dir(),
            wide_prefix: default_wide_prefix(),
            wide_suffix: default_wide_suffix(),
            log_suffix: default_log_suffix(),
            batch_sizes: default_batch_sizes(),
            curve_batch_sizes: default_curve_batch_sizes(),
            layers: default_layers(),
            prune_fractions: default_prune_fractions(),
            grid_columns: default_grid_columns(),
            shared_y_axis: false,
            image_width: default_image_width(),
            image_height: default_image_height(),
        }
    }
}

impl Config {
    // get config from the json file
    pub fn from_json(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config: Config = from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.grid_columns == 0 {
            return Err(Error::Config("grid_columns must be at least 1".to_string()));
        }
        if self.image_width == 0 || self.image_height == 0 {
            return Err(Error::Config(format!(
                "image size must be non-zero, got {}x{}",
                self.image_width, self.image_height
            )));
        }
        if let Some(p) = self.prune_fractions.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            return Err(Error::Config(format!(
                "prune fraction {} is outside [0, 1]; percentages are written as fractions",
                p
            )));
        }
        if self.wide_suffix.is_empty() || self.log_suffix.is_empty() {
            return Err(Error::Config("file suffixes must not be empty".to_string()));
        }
        Ok(())
    }

    /// candidate values for directory-token lookups on training logs
    pub fn candidates(&self) -> Candidates {
        Candidates {
            batch_sizes: self.curve_batch_sizes.clone(),
            layers: self.layers.clone(),
            prune_fractions: self.prune_fractions.clone(),
        }
    }
}
