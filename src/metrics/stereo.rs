use super::{ensure_duration, MetricModule, MetricResult};
use crate::audio::{FrameFeatures, SampleBuffer};
use crate::config::Config;
use crate::error::Result;

/// Side share of total energy that earns a full width score.
const IDEAL_SIDE_RATIO: f32 = 0.3;

pub struct StereoField;

impl MetricModule for StereoField {
    fn name(&self) -> &'static str {
        "stereo field"
    }

    fn stat_names(&self) -> &'static [&'static str] {
        &["phase_score", "correlation", "mid_ratio", "side_ratio"]
    }

    fn compute(&self, frames: &[FrameFeatures], buffer: &SampleBuffer, config: &Config) -> Result<MetricResult> {
        // Mono is reported regardless of length
        let Some(right) = buffer.right() else {
            return Ok(MetricResult::new(0.0)
                .with_stat("phase_score", 100.0)
                .with_stat("correlation", 1.0)
                .with_stat("mid_ratio", 1.0)
                .with_stat("side_ratio", 0.0)
                .with_note("mono source: stereo width cannot be measured"));
        };
        ensure_duration(buffer, config)?;
        let left = buffer.left();

        let mut sum_ll = 0.0f64;
        let mut sum_rr = 0.0f64;
        let mut sum_lr = 0.0f64;
        let mut mid_energy = 0.0f64;
        let mut side_energy = 0.0f64;
        for (&l, &r) in left.iter().zip(right) {
            let (l, r) = (l as f64, r as f64);
            sum_ll += l * l;
            sum_rr += r * r;
            sum_lr += l * r;
            let mid = (l + r) * 0.5;
            let side = (l - r) * 0.5;
            mid_energy += mid * mid;
            side_energy += side * side;
        }

        let total = mid_energy + side_energy;
        if total < 1e-12 {
            return Ok(MetricResult::zeroed(self, "No stereo energy detected; the track appears to be silent".into()));
        }

        let correlation = if sum_ll > 1e-12 && sum_rr > 1e-12 {
            (sum_lr / (sum_ll.sqrt() * sum_rr.sqrt())).clamp(-1.0, 1.0) as f32
        } else {
            // Hard-panned to one side
            0.0
        };
        let mid_ratio = (mid_energy / total) as f32;
        let side_ratio = (side_energy / total) as f32;

        let stereo_frames: Vec<f32> = frames
            .iter()
            .filter(|f| !f.is_silent())
            .filter_map(|f| f.stereo.map(|s| s.correlation))
            .collect();
        let negative_fraction = if stereo_frames.is_empty() {
            0.0
        } else {
            stereo_frames.iter().filter(|&&c| c < 0.0).count() as f32 / stereo_frames.len() as f32
        };

        let mut width = if side_ratio <= IDEAL_SIDE_RATIO {
            side_ratio / IDEAL_SIDE_RATIO * 100.0
        } else {
            100.0 - (side_ratio - IDEAL_SIDE_RATIO) / (1.0 - IDEAL_SIDE_RATIO) * 100.0
        };
        if correlation < 0.0 {
            width *= 1.0 + correlation;
        }
        let phase_score = (100.0 * (1.0 - negative_fraction) * (1.0 + correlation.min(0.0))).clamp(0.0, 100.0);

        let mut result = MetricResult::new(width)
            .with_stat("phase_score", phase_score)
            .with_stat("correlation", correlation)
            .with_stat("mid_ratio", mid_ratio)
            .with_stat("side_ratio", side_ratio);

        result = result.with_note(if side_ratio < 0.02 {
            "Near-mono image: left and right channels are almost identical".to_string()
        } else if side_ratio <= 0.4 {
            format!("Controlled stereo width: side channel carries {:.0}% of the energy", side_ratio * 100.0)
        } else {
            format!(
                "Very wide image: side channel carries {:.0}% of the energy, mono playback will lose detail",
                side_ratio * 100.0
            )
        });

        if correlation < 0.0 {
            result = result.with_note(format!(
                "Negative inter-channel correlation ({:.2}) indicates phase problems",
                correlation
            ));
        }
        if negative_fraction > 0.1 {
            result = result.with_note(format!(
                "{:.0}% of frames are out of phase between channels",
                negative_fraction * 100.0
            ));
        }

        Ok(result)
    }
}
