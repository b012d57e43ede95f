use super::{ensure_duration, MetricModule, MetricResult};
use crate::audio::{FrameFeatures, SampleBuffer};
use crate::config::Config;
use crate::error::Result;

const ENVELOPE_BLOCK_SECS: f32 = 0.01;
/// Envelope blocks on each side used for the adaptive threshold.
const THRESHOLD_WINDOW: usize = 10;
const MIN_ONSET_GAP_SECS: f32 = 0.05;
const TRANSIENT_REGION_SECS: f32 = 0.05;
/// Attack time (ms) at which sharpness reaches zero.
const SLOW_ATTACK_MS: f32 = 50.0;

pub struct Transients;

/// Onsets and envelope detail shared by the statistics.
struct OnsetTrack {
    envelope: Vec<f32>,
    onsets: Vec<usize>,
    block_ms: f32,
}

impl MetricModule for Transients {
    fn name(&self) -> &'static str {
        "transients"
    }

    fn stat_names(&self) -> &'static [&'static str] {
        &["attack_time", "transient_density", "percussion_energy"]
    }

    fn compute(&self, _frames: &[FrameFeatures], buffer: &SampleBuffer, config: &Config) -> Result<MetricResult> {
        ensure_duration(buffer, config)?;

        let track = detect_onsets(buffer);
        if track.onsets.is_empty() {
            return Ok(MetricResult::zeroed(self, "No distinct transients detected".into()));
        }

        let attack_time = mean_attack_ms(&track);
        let transient_density = track.onsets.len() as f32 / buffer.duration_secs();
        let percussion_energy = percussion_energy_pct(&track);

        let sharpness = ((SLOW_ATTACK_MS - attack_time) / (SLOW_ATTACK_MS - 5.0)).clamp(0.0, 1.0);
        let presence = (percussion_energy / 30.0).clamp(0.0, 1.0);
        let score = 100.0 * (0.5 * sharpness + 0.5 * presence);

        let mut result = MetricResult::new(score)
            .with_stat("attack_time", attack_time)
            .with_stat("transient_density", transient_density)
            .with_stat("percussion_energy", percussion_energy);

        result = result.with_note(format!(
            "{} onsets detected ({:.2} per second)",
            track.onsets.len(),
            transient_density
        ));
        result = result.with_note(if attack_time < 15.0 {
            format!("Sharp, punchy attacks (average rise {:.1} ms)", attack_time)
        } else if attack_time < 35.0 {
            format!("Moderate attack definition (average rise {:.1} ms)", attack_time)
        } else {
            format!("Soft attacks (average rise {:.1} ms); transients may be over-compressed", attack_time)
        });
        if percussion_energy < 10.0 {
            result = result.with_note(format!(
                "Only {:.1}% of the energy sits in transient regions; little percussive content",
                percussion_energy
            ));
        }

        Ok(result)
    }
}

fn detect_onsets(buffer: &SampleBuffer) -> OnsetTrack {
    let mono = buffer.mono();
    let sr = buffer.sample_rate() as f32;
    let block = ((ENVELOPE_BLOCK_SECS * sr) as usize).max(1);
    let block_ms = block as f32 / sr * 1000.0;

    let envelope: Vec<f32> = mono
        .chunks(block)
        .map(|c| (c.iter().map(|s| s * s).sum::<f32>() / c.len() as f32).sqrt())
        .collect();

    // Positive energy derivative; the track starts from silence
    let mut rise = vec![0.0f32; envelope.len()];
    if let Some(&first) = envelope.first() {
        rise[0] = first;
    }
    for i in 1..envelope.len() {
        rise[i] = (envelope[i] - envelope[i - 1]).max(0.0);
    }

    let peak_env = envelope.iter().copied().fold(0.0f32, f32::max);
    let floor = peak_env * 0.05;
    let min_gap = ((MIN_ONSET_GAP_SECS * sr) as usize / block).max(1);

    let mut onsets: Vec<usize> = Vec::new();
    for i in 0..rise.len() {
        let start = i.saturating_sub(THRESHOLD_WINDOW);
        let end = (i + THRESHOLD_WINDOW + 1).min(rise.len());
        let local_mean = rise[start..end].iter().sum::<f32>() / (end - start) as f32;
        let threshold = local_mean * 1.5 + floor;

        if rise[i] > threshold {
            let is_peak = (i == 0 || rise[i] >= rise[i - 1])
                && (i == rise.len() - 1 || rise[i] >= rise[i + 1]);
            let far_enough = onsets.last().map_or(true, |&last| i - last >= min_gap);
            if is_peak && far_enough {
                onsets.push(i);
            }
        }
    }

    OnsetTrack {
        envelope,
        onsets,
        block_ms,
    }
}

/// Average time from the local minimum before each onset to the local maximum after it.
fn mean_attack_ms(track: &OnsetTrack) -> f32 {
    let env = &track.envelope;
    let total: f32 = track
        .onsets
        .iter()
        .map(|&onset| {
            let mut lo = onset.saturating_sub(1);
            while lo > 0 && env[lo - 1] < env[lo] {
                lo -= 1;
            }
            let mut hi = onset;
            while hi + 1 < env.len() && env[hi + 1] > env[hi] {
                hi += 1;
            }
            // At least one block of rise
            (hi - lo).max(1) as f32 * track.block_ms
        })
        .sum();
    total / track.onsets.len() as f32
}

/// Percentage of envelope energy within the region following each onset.
fn percussion_energy_pct(track: &OnsetTrack) -> f32 {
    let env = &track.envelope;
    let total: f32 = env.iter().map(|e| e * e).sum();
    if total <= 1e-12 {
        return 0.0;
    }
    let region = ((TRANSIENT_REGION_SECS * 1000.0 / track.block_ms).round() as usize).max(1);

    let mut in_region = vec![false; env.len()];
    for &onset in &track.onsets {
        let start = onset.saturating_sub(1);
        let end = (onset + region).min(env.len());
        in_region[start..end].iter_mut().for_each(|flag| *flag = true);
    }
    let transient: f32 = env
        .iter()
        .zip(&in_region)
        .filter(|(_, inside)| **inside)
        .map(|(e, _)| e * e)
        .sum();
    transient / total * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Decaying noise bursts at a fixed interval.
    fn drum_loop(interval_secs: f32, secs: f32) -> Vec<f32> {
        let sr = 44100.0;
        let len = (secs * sr) as usize;
        let interval = (interval_secs * sr) as usize;
        let mut state = 0x1234_5678u32;
        (0..len)
            .map(|i| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                let noise = (state as f32 / u32::MAX as f32) * 2.0 - 1.0;
                let since_hit = (i % interval) as f32 / sr;
                0.8 * noise * (-since_hit * 30.0).exp()
            })
            .collect()
    }

    fn run(samples: Vec<f32>) -> MetricResult {
        let buf = SampleBuffer::new(vec![samples], 44100).unwrap();
        Transients.compute(&[], &buf, &Config::default()).unwrap()
    }

    #[test]
    fn regular_hits_are_counted() {
        let result = run(drum_loop(0.5, 4.0));
        let density = result.stat("transient_density");
        assert!((1.75..=2.25).contains(&density), "density {}", density);
        assert!(result.stat("attack_time") <= 20.0);
        assert!(result.stat("percussion_energy") > 30.0);
        assert!(result.score > 50.0);
    }

    #[test]
    fn steady_tone_has_no_transients_after_start() {
        let tone: Vec<f32> = (0..44100 * 3)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin())
            .collect();
        let result = run(tone);
        // Only the initial rise can register
        assert!(result.stat("transient_density") <= 0.34);
        assert!(result.stat("percussion_energy") < 10.0);
    }

    #[test]
    fn silence_has_no_onsets() {
        let result = run(vec![0.0; 44100]);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.notes, vec!["No distinct transients detected".to_string()]);
    }
}
