pub mod decode;
pub mod features;
pub mod frames;

pub use decode::{decode, SampleBuffer};
pub use features::{Band, BandEnergies, FrameFeatures, StereoFrame};
pub use frames::{analyze, FrameAnalyzer};

/// Linear amplitude to dBFS, floored at -120 dB.
pub fn amplitude_db(amplitude: f32) -> f32 {
    20.0 * amplitude.max(1e-6).log10()
}

/// Linear power to dB, floored at -120 dB.
pub fn power_db(power: f32) -> f32 {
    10.0 * power.max(1e-12).log10()
}
