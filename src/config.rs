use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{AnalysisError, Result};

const CONFIG_FILE_NAME: &str = "analyze_mix.toml";

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: FramingConfig,
    #[serde(default)]
    pub harmony: HarmonyConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FramingConfig {
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_hop_size")]
    pub hop_size: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct HarmonyConfig {
    /// Minimum profile correlation for a key to be reported.
    #[serde(default = "default_key_confidence_threshold")]
    pub key_confidence_threshold: f32,
    #[serde(default = "default_top_key_candidates")]
    pub top_key_candidates: usize,
    /// Frames pooled into one local key estimate.
    #[serde(default = "default_local_key_frames")]
    pub local_key_frames: usize,
    /// Frames pooled into one chroma block for chord-change tracking.
    #[serde(default = "default_chord_block_frames")]
    pub chord_block_frames: usize,
    /// Cosine similarity below which consecutive chroma blocks count as a change.
    #[serde(default = "default_chord_change_similarity")]
    pub chord_change_similarity: f32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ReportConfig {
    /// Notes kept per module when `--detailed` is not set.
    #[serde(default = "default_brief_note_limit")]
    pub brief_note_limit: usize,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            hop_size: default_hop_size(),
        }
    }
}

impl Default for HarmonyConfig {
    fn default() -> Self {
        Self {
            key_confidence_threshold: default_key_confidence_threshold(),
            top_key_candidates: default_top_key_candidates(),
            local_key_frames: default_local_key_frames(),
            chord_block_frames: default_chord_block_frames(),
            chord_change_similarity: default_chord_change_similarity(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            brief_note_limit: default_brief_note_limit(),
        }
    }
}

fn default_window_size() -> usize { 4096 }
fn default_hop_size() -> usize { 2048 }
fn default_key_confidence_threshold() -> f32 { 0.65 }
fn default_top_key_candidates() -> usize { 5 }
fn default_local_key_frames() -> usize { 16 }
fn default_chord_block_frames() -> usize { 4 }
fn default_chord_change_similarity() -> f32 { 0.8 }
fn default_brief_note_limit() -> usize { 2 }

impl Config {
    pub fn validate(&self) -> Result<()> {
        let a = &self.analysis;
        if a.window_size < 256 {
            return Err(AnalysisError::InvalidConfig(format!(
                "window_size must be at least 256, got {}",
                a.window_size
            )));
        }
        if a.hop_size == 0 || a.hop_size > a.window_size {
            return Err(AnalysisError::InvalidConfig(format!(
                "hop_size must be in 1..={}, got {}",
                a.window_size, a.hop_size
            )));
        }

        let h = &self.harmony;
        if !(0.0..=1.0).contains(&h.key_confidence_threshold) {
            return Err(AnalysisError::InvalidConfig(format!(
                "key_confidence_threshold must be within 0.0-1.0, got {}",
                h.key_confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&h.chord_change_similarity) {
            return Err(AnalysisError::InvalidConfig(format!(
                "chord_change_similarity must be within 0.0-1.0, got {}",
                h.chord_change_similarity
            )));
        }
        if h.local_key_frames == 0 || h.chord_block_frames == 0 {
            return Err(AnalysisError::InvalidConfig(
                "local_key_frames and chord_block_frames must be non-zero".into(),
            ));
        }
        if h.top_key_candidates == 0 || h.top_key_candidates > 24 {
            return Err(AnalysisError::InvalidConfig(format!(
                "top_key_candidates must be in 1..=24, got {}",
                h.top_key_candidates
            )));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AnalysisError::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
    })?;
    let config: Config = toml::from_str(&content).map_err(|e| {
        AnalysisError::InvalidConfig(format!("failed to parse {}: {}", path.display(), e))
    })?;
    config.validate()?;
    Ok(config)
}

/// Resolve the config file: explicit path, then `./analyze_mix.toml`,
/// then the per-user config locations.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("analyze_mix").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("analyze_mix").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}
