use rescene_srs::MissingTrackPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub rar: RarConfig,

    #[serde(default)]
    pub sample: SampleConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Directory rebuilt files are written to
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Replace existing files instead of refusing to run
    #[serde(default)]
    pub overwrite: bool,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            overwrite: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RarConfig {
    /// Accept source files whose size differs from the archived size
    #[serde(default)]
    pub skip_validation: bool,

    /// Check rebuilt volumes against an SFV stored in the SRR (default: true)
    #[serde(default = "default_true")]
    pub verify_sfv: bool,
}

impl Default for RarConfig {
    fn default() -> Self {
        Self {
            skip_validation: false,
            verify_sfv: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SampleConfig {
    /// Behaviour when track data runs out: "zero-fill" or "fail"
    #[serde(default)]
    pub missing_tracks: MissingTrackPolicy,

    /// Fail when the rebuilt sample's size or CRC differs (default: true)
    #[serde(default = "default_true")]
    pub verify: bool,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            missing_tracks: MissingTrackPolicy::default(),
            verify: true,
        }
    }
}

fn default_true() -> bool {
    true
}
