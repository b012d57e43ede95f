#![allow(dead_code)]

use std::f32::consts::PI;
use std::path::Path;

pub const SR: u32 = 44100;

/// Write 16-bit PCM, one sample vector per channel.
pub fn write_wav(path: &Path, channels: &[Vec<f32>]) {
    let spec = hound::WavSpec {
        channels: channels.len() as u16,
        sample_rate: SR,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..channels[0].len() {
        for ch in channels {
            let v = (ch[i].clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
            writer.write_sample(v).unwrap();
        }
    }
    writer.finalize().unwrap();
}

pub fn sine(freq: f32, amp: f32, secs: f32) -> Vec<f32> {
    (0..(secs * SR as f32) as usize)
        .map(|i| amp * (2.0 * PI * freq * i as f32 / SR as f32).sin())
        .collect()
}

pub fn chord(freqs: &[f32], amp: f32, secs: f32) -> Vec<f32> {
    let parts: Vec<Vec<f32>> = freqs.iter().map(|&f| sine(f, amp / freqs.len() as f32, secs)).collect();
    (0..parts[0].len()).map(|i| parts.iter().map(|p| p[i]).sum()).collect()
}

/// Deterministic xorshift noise in [-amp, amp].
pub fn noise(amp: f32, secs: f32, seed: u32) -> Vec<f32> {
    let mut state = seed.max(1);
    (0..(secs * SR as f32) as usize)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            amp * ((state as f32 / u32::MAX as f32) * 2.0 - 1.0)
        })
        .collect()
}

/// Noise bursts every `interval` seconds over a soft chord bed.
pub fn drum_mix(interval: f32, secs: f32) -> Vec<f32> {
    let hits = noise(0.7, secs, 7);
    let bed = chord(&[261.63, 329.63, 392.00], 0.2, secs);
    let step = (interval * SR as f32) as usize;
    hits.iter()
        .zip(bed)
        .enumerate()
        .map(|(i, (h, b))| h * (-((i % step) as f32 / SR as f32) * 25.0).exp() + b)
        .collect()
}

/// Every object key and array prefix in `brief` is present and equal in `full`.
pub fn is_subset(brief: &serde_json::Value, full: &serde_json::Value) -> bool {
    use serde_json::Value;
    match (brief, full) {
        (Value::Object(b), Value::Object(f)) => b
            .iter()
            .all(|(k, v)| f.get(k).is_some_and(|fv| is_subset(v, fv))),
        (Value::Array(b), Value::Array(f)) => {
            b.len() <= f.len() && b.iter().zip(f).all(|(bv, fv)| is_subset(bv, fv))
        }
        (b, f) => b == f,
    }
}
