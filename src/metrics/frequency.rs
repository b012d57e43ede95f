use super::{ensure_duration, MetricModule, MetricResult};
use crate::audio::{Band, FrameFeatures, SampleBuffer};
use crate::config::Config;
use crate::error::Result;

/// Share of total power per band for a balanced mix, in [`Band::ALL`] order.
const REFERENCE_CURVE: [f32; 7] = [0.08, 0.25, 0.17, 0.25, 0.12, 0.08, 0.05];

/// Deviation (dB) tolerated before a band is penalized.
const TOLERANCE_DB: f32 = 3.0;
const MAX_DEVIATION_DB: f32 = 24.0;
const PENALTY_PER_DB: f32 = 8.0;

const STAT_NAMES: [&str; 7] = ["sub_bass", "bass", "low_mid", "mid", "high_mid", "high", "air"];

pub struct FrequencyBalance;

impl MetricModule for FrequencyBalance {
    fn name(&self) -> &'static str {
        "frequency balance"
    }

    fn stat_names(&self) -> &'static [&'static str] {
        &STAT_NAMES
    }

    fn compute(&self, frames: &[FrameFeatures], buffer: &SampleBuffer, config: &Config) -> Result<MetricResult> {
        ensure_duration(buffer, config)?;

        let mut totals = [0.0f64; 7];
        for frame in frames {
            for (total, &energy) in totals.iter_mut().zip(frame.bands.0.iter()) {
                *total += energy as f64;
            }
        }
        let sum: f64 = totals.iter().sum();

        if sum <= 1e-12 {
            return Ok(MetricResult::zeroed(self, "No measurable spectral energy; the track appears to be silent".into()));
        }

        let shares: Vec<f32> = totals.iter().map(|t| (t / sum) as f32).collect();
        let available = Band::ALL.map(|band| band.fits_below_nyquist(buffer.sample_rate()));
        let deviations = band_deviations(&shares, &available);
        let score = balance_score(&deviations);

        let mut result = MetricResult::new(score);
        for (band, share) in Band::ALL.iter().zip(&shares) {
            result = result.with_stat(band.key(), share * 100.0);
        }

        // Largest imbalances first
        let mut offenders: Vec<(Band, f32)> = deviations
            .into_iter()
            .filter(|(_, d)| d.abs() > TOLERANCE_DB)
            .collect();
        offenders.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));

        if offenders.is_empty() {
            result = result.with_note("Frequency balance is well distributed across all bands");
        }
        for (band, deviation) in offenders {
            let verdict = if deviation > 0.0 { "over-represented" } else { "under-represented" };
            result = result.with_note(format!(
                "{} {} by {:+.1} dB relative to a balanced mix",
                band.label(),
                verdict,
                deviation
            ));
        }

        log::debug!("Band shares: {:?}", shares);
        Ok(result)
    }
}

/// Deviation (dB) of each available band's share from the reference curve,
/// renormalized over the available bands.
fn band_deviations(shares: &[f32], available: &[bool; 7]) -> Vec<(Band, f32)> {
    let reference_total: f32 = REFERENCE_CURVE
        .iter()
        .zip(available)
        .filter(|(_, ok)| **ok)
        .map(|(r, _)| r)
        .sum();

    Band::ALL
        .iter()
        .zip(shares)
        .zip(REFERENCE_CURVE.iter().zip(available))
        .filter(|(_, (_, ok))| **ok)
        .map(|((&band, &share), (&reference, _))| {
            let expected = reference / reference_total;
            let deviation = 10.0 * (share.max(1e-9) / expected).log10();
            (band, deviation.clamp(-MAX_DEVIATION_DB, MAX_DEVIATION_DB))
        })
        .collect()
}

fn balance_score(deviations: &[(Band, f32)]) -> f32 {
    if deviations.is_empty() {
        return 0.0;
    }
    let mean_excess = deviations
        .iter()
        .map(|(_, d)| (d.abs() - TOLERANCE_DB).max(0.0))
        .sum::<f32>()
        / deviations.len() as f32;
    100.0 - PENALTY_PER_DB * mean_excess
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::frames;

    fn run(samples: Vec<f32>) -> MetricResult {
        let config = Config::default();
        let buf = SampleBuffer::new(vec![samples], 44100).unwrap();
        let frames = frames::analyze(&buf, 4096, 2048).unwrap().collect_parallel();
        FrequencyBalance.compute(&frames, &buf, &config).unwrap()
    }

    /// Deterministic pseudo-random noise (xorshift).
    fn noise(len: usize) -> Vec<f32> {
        let mut state = 0x2545_f491u32;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state as f32 / u32::MAX as f32) * 2.0 - 1.0
            })
            .collect()
    }

    #[test]
    fn bands_above_nyquist_are_not_penalized() {
        let mut available = [true; 7];
        available[Band::Air as usize] = false;
        let scale = 1.0 - REFERENCE_CURVE[Band::Air as usize];
        let mut shares: Vec<f32> = REFERENCE_CURVE.iter().map(|r| r / scale).collect();
        shares[Band::Air as usize] = 0.0;

        let deviations = band_deviations(&shares, &available);
        assert_eq!(deviations.len(), 6);
        assert!(deviations.iter().all(|(band, d)| *band != Band::Air && d.abs() < 1e-3));
        assert!((balance_score(&deviations) - 100.0).abs() < 1e-3);

        // The same spectrum judged as full-band loses the empty air band
        let full = band_deviations(&shares, &[true; 7]);
        assert!(balance_score(&full) < 80.0);
    }

    #[test]
    fn narrowband_source_has_no_air_note() {
        let buf = SampleBuffer::new(vec![noise(32000)], 16000).unwrap();
        let frames = frames::analyze(&buf, 4096, 2048).unwrap().collect_parallel();
        let result = FrequencyBalance.compute(&frames, &buf, &Config::default()).unwrap();
        assert!(!result.notes.iter().any(|n| n.starts_with("Air")));
        assert!((0.0..=100.0).contains(&result.score));
    }

    #[test]
    fn reference_curve_sums_to_one() {
        assert!((REFERENCE_CURVE.iter().sum::<f32>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn pure_bass_tone_is_unbalanced() {
        let tone: Vec<f32> = (0..44100)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 100.0 * i as f32 / 44100.0).sin())
            .collect();
        let result = run(tone);
        assert!(result.score < 50.0, "score {}", result.score);
        assert!(result.stat("bass") > 90.0);
        assert!(result.notes.iter().any(|n| n.starts_with("Bass over-represented")));
    }

    #[test]
    fn white_noise_is_top_heavy() {
        let result = run(noise(44100));
        // White noise spends most of its power above 8 kHz
        assert!(result.stat("air") > result.stat("bass"));
        assert!(result.notes.iter().any(|n| n.starts_with("Air over-represented")));
        assert!((0.0..=100.0).contains(&result.score));
    }

    #[test]
    fn shares_sum_to_hundred() {
        let result = run(noise(20000));
        let total: f32 = STAT_NAMES.iter().map(|n| result.stat(n)).sum();
        assert!((total - 100.0).abs() < 0.01);
    }

    #[test]
    fn silence_scores_zero() {
        let result = run(vec![0.0; 10000]);
        assert_eq!(result.score, 0.0);
        assert!(result.notes[0].contains("silent"));
    }
}
