//! Chroma-based key detection and harmonic statistics.

pub mod chroma;
pub mod key;

use crate::audio::{FrameFeatures, SampleBuffer};
use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::{guard, AnalysisError, Result};
use crate::metrics::ensure_duration;
use chroma::Chroma;
pub use key::{Key, Mode};

pub const UNKNOWN_KEY: &str = "Unknown";

#[derive(Clone, Debug, PartialEq)]
pub struct KeyCandidate {
    pub key: Key,
    pub confidence: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HarmonicResult {
    /// `None` when the best correlation is below the confidence threshold
    pub key: Option<Key>,
    pub confidence: f32,
    pub harmonic_complexity: f32,
    pub key_consistency: f32,
    pub chord_changes_per_minute: f32,
    pub top_key_candidates: Vec<KeyCandidate>,
    pub notes: Vec<String>,
}

impl HarmonicResult {
    pub fn unknown(note: String) -> Self {
        Self {
            key: None,
            confidence: 0.0,
            harmonic_complexity: 0.0,
            key_consistency: 0.0,
            chord_changes_per_minute: 0.0,
            top_key_candidates: Vec::new(),
            notes: vec![note],
        }
    }

    pub fn key_name(&self) -> String {
        self.key.map_or_else(|| UNKNOWN_KEY.to_string(), |k| k.to_string())
    }
}

pub fn analyze_harmony(frames: &[FrameFeatures], buffer: &SampleBuffer, config: &Config) -> Result<HarmonicResult> {
    ensure_duration(buffer, config)?;
    let settings = &config.harmony;

    let chromas: Vec<Chroma> = frames
        .iter()
        .map(|f| if f.is_silent() { [0.0; 12] } else { chroma::frame_chroma(f) })
        .collect();
    let active: Vec<&Chroma> = chromas.iter().filter(|c| chroma::energy(c) > 1e-12).collect();

    let global = chroma::sum(&chromas);
    if active.is_empty() || chroma::energy(&global) <= 1e-12 {
        return Ok(HarmonicResult::unknown("No tonal content detected".into()));
    }

    let ranked = key::rank_keys(&global);
    let (best_key, best_corr) = ranked[0];
    let key = (best_corr >= settings.key_confidence_threshold).then_some(best_key);

    let harmonic_complexity =
        100.0 * active.iter().map(|c| chroma::normalized_entropy(c)).sum::<f32>() / active.len() as f32;

    let local_keys: Vec<Key> = chromas
        .chunks(settings.local_key_frames)
        .map(chroma::sum)
        .filter(|c| chroma::energy(c) > 1e-12)
        .map(|c| key::rank_keys(&c)[0].0)
        .collect();
    let key_consistency = if local_keys.is_empty() {
        0.0
    } else {
        100.0 * local_keys.iter().filter(|&&k| k == best_key).count() as f32 / local_keys.len() as f32
    };

    let blocks: Vec<Chroma> = chromas
        .chunks(settings.chord_block_frames)
        .map(chroma::sum)
        .filter(|c| chroma::energy(c) > 1e-12)
        .collect();
    let changes = blocks
        .windows(2)
        .filter(|w| chroma::cosine_similarity(&w[0], &w[1]) < settings.chord_change_similarity)
        .count();
    let minutes = buffer.duration_secs() / 60.0;
    let chord_changes_per_minute = if minutes > 0.0 { changes as f32 / minutes } else { 0.0 };

    let top_key_candidates = ranked
        .iter()
        .take(settings.top_key_candidates)
        .map(|&(key, corr)| KeyCandidate {
            key,
            confidence: corr.clamp(0.0, 1.0),
        })
        .collect();

    let mut notes = Vec::new();
    notes.push(match key {
        Some(k) => format!("Detected key: {} (confidence {:.2})", k, best_corr),
        None => format!(
            "Key could not be determined confidently (best guess {} at {:.2}, threshold {:.2})",
            best_key, best_corr, settings.key_confidence_threshold
        ),
    });
    notes.push(if harmonic_complexity < 40.0 {
        format!("Simple harmonic content ({:.0}% complexity)", harmonic_complexity)
    } else if harmonic_complexity < 70.0 {
        format!("Moderately rich harmonic content ({:.0}% complexity)", harmonic_complexity)
    } else {
        format!("Dense harmonic content ({:.0}% complexity)", harmonic_complexity)
    });
    notes.push(if key_consistency >= 75.0 {
        format!("Tonal center is stable ({:.0}% of passages agree with {})", key_consistency, best_key)
    } else {
        format!(
            "Tonal center shifts often; only {:.0}% of passages agree with {}",
            key_consistency, best_key
        )
    });
    notes.push(format!("Approximately {:.1} chord changes per minute", chord_changes_per_minute));

    log::debug!(
        "Harmony: best={} r={:.3} complexity={:.1} consistency={:.1}",
        best_key,
        best_corr,
        harmonic_complexity,
        key_consistency
    );

    Ok(HarmonicResult {
        key,
        confidence: best_corr.max(0.0),
        harmonic_complexity,
        key_consistency,
        chord_changes_per_minute,
        top_key_candidates,
        notes,
    })
}

/// Run the analyzer with the same downgrade rules as the metric modules.
pub fn run_harmony(
    frames: &[FrameFeatures],
    buffer: &SampleBuffer,
    config: &Config,
    cancel: &CancelToken,
) -> Result<HarmonicResult> {
    cancel.check("harmonic analysis")?;

    let outcome = guard("harmonic analyzer", || analyze_harmony(frames, buffer, config));

    match outcome {
        Ok(result) => Ok(result),
        Err(AnalysisError::InsufficientDuration { frames, .. }) => Ok(HarmonicResult::unknown(format!(
            "Insufficient duration for harmonic analysis: {:.3}s of audio is shorter than one analysis window",
            frames as f32 / buffer.sample_rate() as f32
        ))),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            log::error!("Harmonic analysis failed: {}", e);
            Ok(HarmonicResult::unknown(format!("Harmonic analysis failed: {}", e)))
        }
    }
}
