use crate::audio::FrameFeatures;

const MIN_FREQ_HZ: f32 = 55.0;
const MAX_FREQ_HZ: f32 = 5000.0;
const A4_HZ: f32 = 440.0;

pub type Chroma = [f32; 12];

/// Pitch class (C = 0) of a frequency, rounded to the nearest semitone.
pub fn pitch_class(freq: f32) -> usize {
    let semitones_from_a4 = (12.0 * (freq / A4_HZ).log2()).round() as i32;
    (semitones_from_a4 + 9).rem_euclid(12) as usize
}

/// 12-bin pitch-class power of one frame.
pub fn frame_chroma(frame: &FrameFeatures) -> Chroma {
    let mut chroma = [0.0f32; 12];
    for (bin, &mag) in frame.magnitudes.iter().enumerate().skip(1) {
        let freq = frame.bin_frequency(bin);
        if freq < MIN_FREQ_HZ {
            continue;
        }
        if freq > MAX_FREQ_HZ {
            break;
        }
        chroma[pitch_class(freq)] += mag * mag;
    }
    chroma
}

pub fn sum(chromas: &[Chroma]) -> Chroma {
    let mut total = [0.0f32; 12];
    for c in chromas {
        for (t, v) in total.iter_mut().zip(c.iter()) {
            *t += v;
        }
    }
    total
}

pub fn energy(chroma: &Chroma) -> f32 {
    chroma.iter().sum()
}

/// Shannon entropy normalized to 0..1 (1 = all pitch classes equal).
pub fn normalized_entropy(chroma: &Chroma) -> f32 {
    let total = energy(chroma);
    if total <= 1e-12 {
        return 0.0;
    }
    let h: f32 = chroma
        .iter()
        .map(|&v| v / total)
        .filter(|&p| p > 0.0)
        .map(|p| -p * p.ln())
        .sum();
    h / 12f32.ln()
}

pub fn cosine_similarity(a: &Chroma, b: &Chroma) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let mag_b = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    let denom = mag_a * mag_b;
    if denom > 1e-10 {
        (dot / denom).clamp(-1.0, 1.0)
    } else {
        1.0
    }
}
