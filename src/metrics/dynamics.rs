use super::{ensure_duration, MetricModule, MetricResult};
use crate::audio::{amplitude_db, power_db, FrameFeatures, SampleBuffer};
use crate::config::Config;
use crate::error::Result;

const DR_BLOCK_SECS: f32 = 3.0;
const LOUDNESS_BLOCK_SECS: f32 = 0.4;
const ABSOLUTE_GATE_DB: f32 = -70.0;
const RELATIVE_GATE_DB: f32 = 10.0;
const CLIP_LEVEL: f32 = 0.999;

/// DR at which the score starts rising / saturates.
const DR_FLOOR_DB: f32 = 3.0;
const DR_CEILING_DB: f32 = 15.0;

pub struct DynamicRange;

impl MetricModule for DynamicRange {
    fn name(&self) -> &'static str {
        "dynamic range"
    }

    fn stat_names(&self) -> &'static [&'static str] {
        &["dynamic_range_db", "crest_factor_db", "plr"]
    }

    fn compute(&self, _frames: &[FrameFeatures], buffer: &SampleBuffer, config: &Config) -> Result<MetricResult> {
        ensure_duration(buffer, config)?;

        let sr = buffer.sample_rate() as f32;
        let channels = buffer.channels();
        let n = buffer.frames();

        let peak = channels
            .iter()
            .flat_map(|c| c.iter())
            .fold(0.0f32, |acc, s| acc.max(s.abs()));
        if peak < 1e-6 {
            return Ok(MetricResult::zeroed(self, "Track is silent; no dynamics to measure".into()));
        }

        let clipped = channels
            .iter()
            .flat_map(|c| c.iter())
            .filter(|s| s.abs() >= CLIP_LEVEL)
            .count();

        let total_power = block_power(channels, 0, n);
        let rms = total_power.sqrt();

        let dr_block = ((DR_BLOCK_SECS * sr) as usize).clamp(1, n);
        let mut block_powers: Vec<f32> = (0..n)
            .step_by(dr_block)
            .map(|start| block_power(channels, start, (start + dr_block).min(n)))
            .collect();
        block_powers.sort_by(|a, b| b.total_cmp(a));
        let loudest = (block_powers.len() as f32 * 0.2).ceil().max(1.0) as usize;
        let loud_rms = (block_powers[..loudest].iter().sum::<f32>() / loudest as f32).sqrt();

        let peak_db = amplitude_db(peak);
        let dynamic_range_db = (peak_db - amplitude_db(loud_rms)).max(0.0);
        let crest_factor_db = (peak_db - amplitude_db(rms)).max(0.0);
        let loudness_db = gated_loudness_db(channels, sr, n);
        let plr = (peak_db - loudness_db).max(0.0);

        let score = (dynamic_range_db - DR_FLOOR_DB) / (DR_CEILING_DB - DR_FLOOR_DB) * 100.0;

        let mut result = MetricResult::new(score)
            .with_stat("dynamic_range_db", dynamic_range_db)
            .with_stat("crest_factor_db", crest_factor_db)
            .with_stat("plr", plr);

        result = result.with_note(if dynamic_range_db < 6.0 {
            format!(
                "Heavily compressed: {:.1} dB of dynamic range suggests aggressive limiting",
                dynamic_range_db
            )
        } else if dynamic_range_db < 10.0 {
            format!("Moderate dynamics: {:.1} dB of dynamic range, typical of modern masters", dynamic_range_db)
        } else {
            format!("Healthy dynamics: {:.1} dB of dynamic range", dynamic_range_db)
        });

        if crest_factor_db < 6.0 {
            result = result.with_note(format!(
                "Low crest factor ({:.1} dB): transients are flattened relative to the average level",
                crest_factor_db
            ));
        }
        if plr < 8.0 {
            result = result.with_note(format!(
                "PLR of {:.1} dB is typical of loudness-maximized material",
                plr
            ));
        }
        if clipped > 0 {
            result = result.with_note(format!(
                "{} samples at or near full scale ({:.1} dBFS peak); possible clipping",
                clipped, peak_db
            ));
        }

        log::debug!(
            "Dynamics: peak={:.2}dBFS rms={:.2}dBFS loudness={:.2}dB dr={:.2}dB",
            peak_db,
            amplitude_db(rms),
            loudness_db,
            dynamic_range_db
        );
        Ok(result)
    }
}

/// Mean square over `[start, end)`, averaged across channels.
fn block_power(channels: &[Vec<f32>], start: usize, end: usize) -> f32 {
    if end <= start {
        return 0.0;
    }
    let sum: f64 = channels
        .iter()
        .map(|c| c[start..end].iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>())
        .sum();
    (sum / ((end - start) * channels.len()) as f64) as f32
}

/// Two-gate integrated level over 400 ms blocks (unweighted).
fn gated_loudness_db(channels: &[Vec<f32>], sample_rate: f32, n: usize) -> f32 {
    let block = ((LOUDNESS_BLOCK_SECS * sample_rate) as usize).clamp(1, n);
    let powers: Vec<f32> = (0..n)
        .step_by(block)
        .map(|start| block_power(channels, start, (start + block).min(n)))
        .filter(|&p| power_db(p) > ABSOLUTE_GATE_DB)
        .collect();
    if powers.is_empty() {
        return ABSOLUTE_GATE_DB;
    }

    let ungated = power_db(super::mean(&powers));
    let gated: Vec<f32> = powers
        .iter()
        .copied()
        .filter(|&p| power_db(p) > ungated - RELATIVE_GATE_DB)
        .collect();
    power_db(super::mean(&gated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sine(amp: f32, secs: f32) -> Vec<f32> {
        (0..(44100.0 * secs) as usize)
            .map(|i| amp * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin())
            .collect()
    }

    fn run(channels: Vec<Vec<f32>>) -> MetricResult {
        let buf = SampleBuffer::new(channels, 44100).unwrap();
        DynamicRange.compute(&[], &buf, &Config::default()).unwrap()
    }

    #[test]
    fn steady_sine_has_three_db_crest() {
        let result = run(vec![sine(0.5, 6.0)]);
        assert_abs_diff_eq!(result.stat("crest_factor_db"), 3.01, epsilon = 0.05);
        assert_abs_diff_eq!(result.stat("dynamic_range_db"), 3.01, epsilon = 0.05);
        assert_abs_diff_eq!(result.stat("plr"), 3.01, epsilon = 0.05);
        assert!(result.score < 1.0);
        assert!(result.notes[0].starts_with("Heavily compressed"));
    }

    #[test]
    fn quiet_passage_with_loud_hits_has_range() {
        // Low bed with sparse full-scale clicks
        let mut samples = sine(0.02, 9.0);
        for i in (0..samples.len()).step_by(22050) {
            samples[i] = 0.95;
        }
        let result = run(vec![samples]);
        assert!(result.stat("dynamic_range_db") > 20.0);
        assert!(result.stat("crest_factor_db") > 20.0);
        assert_eq!(result.score, 100.0);
        assert!(result.notes[0].starts_with("Healthy dynamics"));
    }

    #[test]
    fn clipping_is_flagged() {
        let samples: Vec<f32> = sine(1.6, 3.0); // clamped to ±1 on construction
        let result = run(vec![samples.clone(), samples]);
        assert!(result.notes.iter().any(|n| n.contains("possible clipping")));
    }

    #[test]
    fn silence_scores_zero() {
        let result = run(vec![vec![0.0; 8192]]);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.stat("plr"), 0.0);
    }

    #[test]
    fn gating_ignores_silent_tail() {
        let mut samples = sine(0.5, 2.0);
        samples.extend(std::iter::repeat(0.0).take(44100 * 4));
        let buf = SampleBuffer::new(vec![samples], 44100).unwrap();
        let level = gated_loudness_db(buf.channels(), 44100.0, buf.frames());
        // Level of the sine alone: 20*log10(0.5/sqrt(2))
        assert_abs_diff_eq!(level, -9.03, epsilon = 0.1);
    }
}
