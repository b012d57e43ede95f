//! JSON report returned to the calling process.
//!
//! Field names are consumed verbatim by the subprocess wrapper and must not
//! change. Optional sections are omitted rather than serialized as `null`.

mod assemble;

use serde::{Deserialize, Serialize};

pub use assemble::{assemble, ModuleResults};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Filled in by the calling wrapper, never by this crate.
    #[serde(rename = "processingTime", default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_balance: Option<FrequencyBalanceReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_range: Option<DynamicRangeReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stereo_field: Option<StereoFieldReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarity: Option<ClarityReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transients: Option<TransientsReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub harmonic_content: Option<HarmonicContentReport>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBalanceReport {
    pub balance_score: f32,
    pub band_energy: BandEnergyReport,
    pub analysis: Vec<String>,
}

/// Percentage of total band power per band.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BandEnergyReport {
    pub sub_bass: f32,
    pub bass: f32,
    pub low_mid: f32,
    pub mid: f32,
    pub high_mid: f32,
    pub high: f32,
    pub air: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DynamicRangeReport {
    pub dynamic_range_score: f32,
    pub dynamic_range_db: f32,
    pub crest_factor_db: f32,
    pub plr: f32,
    pub analysis: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StereoFieldReport {
    pub width_score: f32,
    pub phase_score: f32,
    pub correlation: f32,
    pub mid_ratio: f32,
    pub side_ratio: f32,
    pub analysis: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClarityReport {
    pub clarity_score: f32,
    pub spectral_contrast: f32,
    pub spectral_flatness: f32,
    pub spectral_centroid: f32,
    pub analysis: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransientsReport {
    pub transients_score: f32,
    pub attack_time: f32,
    pub transient_density: f32,
    pub percussion_energy: f32,
    pub analysis: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HarmonicContentReport {
    pub key: String,
    pub harmonic_complexity: f32,
    pub key_consistency: f32,
    pub chord_changes_per_minute: f32,
    pub analysis: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_relationships: Option<KeyRelationships>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_key_candidates: Option<Vec<KeyCandidateReport>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyRelationships {
    pub relative: String,
    pub parallel: String,
    pub dominant: String,
    pub subdominant: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyCandidateReport {
    pub key: String,
    pub confidence: f32,
}

impl AnalysisReport {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Every score in the report, for range checks.
    pub fn scores(&self) -> Vec<f32> {
        let mut scores = Vec::new();
        if let Some(s) = &self.frequency_balance {
            scores.push(s.balance_score);
        }
        if let Some(s) = &self.dynamic_range {
            scores.push(s.dynamic_range_score);
        }
        if let Some(s) = &self.stereo_field {
            scores.push(s.width_score);
            scores.push(s.phase_score);
        }
        if let Some(s) = &self.clarity {
            scores.push(s.clarity_score);
        }
        if let Some(s) = &self.transients {
            scores.push(s.transients_score);
        }
        scores
    }

    /// Pretty JSON followed by a newline, as written to stdout and `--output`.
    pub fn render(&self) -> serde_json::Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }
}
