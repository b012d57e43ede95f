use super::{ensure_duration, mean, MetricModule, MetricResult};
use crate::audio::{power_db, Band, FrameFeatures, SampleBuffer};
use crate::config::Config;
use crate::error::Result;

/// Share of each band's bins averaged for the peak and the valley estimate.
const CONTRAST_QUANTILE: f32 = 0.2;
const CONTRAST_FLOOR_DB: f32 = 6.0;
const CONTRAST_CEILING_DB: f32 = 36.0;
const CENTROID_RANGE_HZ: (f32, f32) = (500.0, 6000.0);

pub struct Clarity;

impl MetricModule for Clarity {
    fn name(&self) -> &'static str {
        "clarity"
    }

    fn stat_names(&self) -> &'static [&'static str] {
        &["spectral_contrast", "spectral_flatness", "spectral_centroid"]
    }

    fn compute(&self, frames: &[FrameFeatures], buffer: &SampleBuffer, config: &Config) -> Result<MetricResult> {
        ensure_duration(buffer, config)?;

        let active: Vec<&FrameFeatures> = frames.iter().filter(|f| !f.is_silent()).collect();
        if active.is_empty() {
            return Ok(MetricResult::zeroed(self, "No audible frames; clarity cannot be assessed".into()));
        }

        let contrast = mean(&active.iter().map(|f| spectral_contrast(f)).collect::<Vec<_>>());
        let flatness = mean(&active.iter().map(|f| spectral_flatness(&f.magnitudes)).collect::<Vec<_>>());
        let centroid = mean(&active.iter().map(|f| spectral_centroid(f)).collect::<Vec<_>>());

        let contrast_norm =
            ((contrast - CONTRAST_FLOOR_DB) / (CONTRAST_CEILING_DB - CONTRAST_FLOOR_DB)).clamp(0.0, 1.0);
        let mut score = 100.0 * (0.6 * contrast_norm + 0.4 * (1.0 - flatness));
        let (low, high) = CENTROID_RANGE_HZ;
        if centroid < low || centroid > high {
            score *= 0.9;
        }

        let mut result = MetricResult::new(score)
            .with_stat("spectral_contrast", contrast)
            .with_stat("spectral_flatness", flatness)
            .with_stat("spectral_centroid", centroid);

        result = result.with_note(if contrast_norm >= 0.6 {
            format!("Good separation between spectral peaks and valleys ({:.1} dB contrast)", contrast)
        } else if contrast_norm >= 0.3 {
            format!("Average spectral contrast ({:.1} dB); some elements may mask each other", contrast)
        } else {
            format!("Low spectral contrast ({:.1} dB): the mix sounds dense and smeared", contrast)
        });

        if centroid < low {
            result = result.with_note(format!(
                "Dark or muddy tonality: spectral centroid at {:.0} Hz",
                centroid
            ));
        } else if centroid > high {
            result = result.with_note(format!(
                "Bright, possibly harsh tonality: spectral centroid at {:.0} Hz",
                centroid
            ));
        }
        if flatness > 0.3 {
            result = result.with_note(format!(
                "Noise-like spectrum (flatness {:.2}) reduces definition",
                flatness
            ));
        }

        Ok(result)
    }
}

/// Mean peak-to-valley gap (dB) across bands that fall inside the spectrum.
fn spectral_contrast(frame: &FrameFeatures) -> f32 {
    let num_bins = frame.magnitudes.len();
    let mut gaps = Vec::with_capacity(Band::ALL.len());

    for band in Band::ALL {
        let (low, high) = band.bins(frame.freq_resolution, num_bins);
        if high <= low + 1 {
            continue;
        }
        let mut power: Vec<f32> = frame.magnitudes[low..high].iter().map(|m| m * m).collect();
        power.sort_by(f32::total_cmp);
        let take = ((power.len() as f32 * CONTRAST_QUANTILE).ceil() as usize).max(1);
        let valley = mean(&power[..take]);
        let peak = mean(&power[power.len() - take..]);
        gaps.push(power_db(peak) - power_db(valley));
    }

    mean(&gaps)
}

/// Geometric over arithmetic mean of the power spectrum: ~0 for tones, ~1 for noise.
pub fn spectral_flatness(magnitudes: &[f32]) -> f32 {
    let power: Vec<f32> = magnitudes
        .iter()
        .map(|m| m * m)
        .filter(|&p| p > f32::EPSILON * f32::EPSILON)
        .collect();
    if power.is_empty() {
        return 0.0;
    }
    let n = power.len() as f32;
    let log_mean = power.iter().map(|p| p.ln()).sum::<f32>() / n;
    let arithmetic = power.iter().sum::<f32>() / n;
    if arithmetic > 0.0 {
        (log_mean.exp() / arithmetic).min(1.0)
    } else {
        0.0
    }
}

pub fn spectral_centroid(frame: &FrameFeatures) -> f32 {
    let total: f32 = frame.magnitudes.iter().sum();
    if total <= 1e-10 {
        return 0.0;
    }
    frame
        .magnitudes
        .iter()
        .enumerate()
        .map(|(i, &m)| frame.bin_frequency(i) * m)
        .sum::<f32>()
        / total
}
