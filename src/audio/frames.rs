use rayon::prelude::*;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use super::decode::SampleBuffer;
use super::features::{Band, BandEnergies, FrameFeatures, StereoFrame};
use crate::error::{AnalysisError, Result};

/// Splits a buffer into overlapping Hann-windowed FFT frames.
///
/// Cheap to build; frames are computed on demand by [`FrameAnalyzer::iter`]
/// (restartable, one frame per hop) or all at once by
/// [`FrameAnalyzer::collect_parallel`].
pub struct FrameAnalyzer<'a> {
    buffer: &'a SampleBuffer,
    mono: Vec<f32>,
    window_size: usize,
    hop_size: usize,
    hann: Vec<f32>,
    window_gain: f32,
    fft: Arc<dyn Fft<f32>>,
}

pub fn analyze(buffer: &SampleBuffer, window_size: usize, hop_size: usize) -> Result<FrameAnalyzer<'_>> {
    if buffer.is_empty() {
        return Err(AnalysisError::EmptyBuffer);
    }
    if window_size < 2 || hop_size == 0 || hop_size > window_size {
        return Err(AnalysisError::InvalidConfig(format!(
            "invalid framing: window={} hop={}",
            window_size, hop_size
        )));
    }

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(window_size);
    let hann = hann_window(window_size);
    let window_gain = hann.iter().sum::<f32>().max(1e-10);

    Ok(FrameAnalyzer {
        buffer,
        mono: buffer.mono(),
        window_size,
        hop_size,
        hann,
        window_gain,
        fft,
    })
}

impl<'a> FrameAnalyzer<'a> {
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    pub fn len(&self) -> usize {
        self.mono.len().div_ceil(self.hop_size)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn freq_resolution(&self) -> f32 {
        self.buffer.sample_rate() as f32 / self.window_size as f32
    }

    pub fn iter(&self) -> FrameIter<'_, 'a> {
        FrameIter { analyzer: self, next: 0 }
    }

    pub fn collect_parallel(&self) -> Vec<FrameFeatures> {
        (0..self.len())
            .into_par_iter()
            .map(|idx| self.compute(idx))
            .collect()
    }

    /// Features of frame `index`, `None` past the last frame.
    pub fn frame(&self, index: usize) -> Option<FrameFeatures> {
        (index < self.len()).then(|| self.compute(index))
    }

    fn compute(&self, index: usize) -> FrameFeatures {
        let start = index * self.hop_size;
        let end = (start + self.window_size).min(self.mono.len());
        let filled = end.saturating_sub(start);

        // Zero-padded past the end of the buffer
        let mut fft_input = vec![Complex::new(0.0f32, 0.0); self.window_size];
        for i in 0..filled {
            fft_input[i] = Complex::new(self.mono[start + i] * self.hann[i], 0.0);
        }
        self.fft.process(&mut fft_input);

        let num_bins = self.window_size / 2 + 1;
        let magnitudes: Vec<f32> = fft_input[..num_bins]
            .iter()
            .map(|c| c.norm() / self.window_gain)
            .collect();

        let freq_resolution = self.freq_resolution();
        let mut bands = [0.0f32; 7];
        for band in Band::ALL {
            let (low, high) = band.bins(freq_resolution, num_bins);
            bands[band as usize] = magnitudes[low..high].iter().map(|m| m * m).sum();
        }

        let segment = &self.mono[start..end];
        let rms = if segment.is_empty() {
            0.0
        } else {
            (segment.iter().map(|s| s * s).sum::<f32>() / segment.len() as f32).sqrt()
        };

        let peak = self
            .buffer
            .channels()
            .iter()
            .flat_map(|c| c[start..end].iter())
            .fold(0.0f32, |acc, s| acc.max(s.abs()));

        let stereo = self
            .buffer
            .right()
            .map(|right| stereo_frame(&self.buffer.left()[start..end], &right[start..end]));

        FrameFeatures {
            index,
            time: start as f32 / self.buffer.sample_rate() as f32,
            magnitudes,
            freq_resolution,
            rms,
            peak,
            bands: BandEnergies(bands),
            stereo,
        }
    }
}

pub struct FrameIter<'r, 'a> {
    analyzer: &'r FrameAnalyzer<'a>,
    next: usize,
}

impl Iterator for FrameIter<'_, '_> {
    type Item = FrameFeatures;

    fn next(&mut self) -> Option<FrameFeatures> {
        if self.next >= self.analyzer.len() {
            return None;
        }
        let frame = self.analyzer.frame(self.next);
        self.next += 1;
        frame
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.analyzer.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FrameIter<'_, '_> {}

fn stereo_frame(left: &[f32], right: &[f32]) -> StereoFrame {
    let mut sum_ll = 0.0f32;
    let mut sum_rr = 0.0f32;
    let mut sum_lr = 0.0f32;
    let mut mid_energy = 0.0f32;
    let mut side_energy = 0.0f32;

    for (&l, &r) in left.iter().zip(right) {
        sum_ll += l * l;
        sum_rr += r * r;
        sum_lr += l * r;
        let mid = (l + r) * 0.5;
        let side = (l - r) * 0.5;
        mid_energy += mid * mid;
        side_energy += side * side;
    }

    let correlation = if sum_ll > 1e-10 && sum_rr > 1e-10 {
        (sum_lr / (sum_ll.sqrt() * sum_rr.sqrt())).clamp(-1.0, 1.0)
    } else {
        // Silent or one-sided window
        1.0
    };

    StereoFrame {
        correlation,
        mid_energy,
        side_energy,
    }
}

pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, len: usize, amp: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amp * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn empty_buffer_is_rejected() {
        let buf = SampleBuffer::new(vec![Vec::new()], 44100).unwrap();
        assert!(matches!(analyze(&buf, 1024, 512), Err(AnalysisError::EmptyBuffer)));
    }

    #[test]
    fn invalid_hop_is_rejected() {
        let buf = SampleBuffer::new(vec![vec![0.1; 100]], 44100).unwrap();
        assert!(analyze(&buf, 64, 0).is_err());
        assert!(analyze(&buf, 64, 128).is_err());
    }

    #[test]
    fn one_frame_per_hop_with_padding() {
        let buf = SampleBuffer::new(vec![vec![0.25; 5000]], 8000).unwrap();
        let frames = analyze(&buf, 1024, 512).unwrap();
        assert_eq!(frames.len(), 10); // ceil(5000 / 512)
        let all: Vec<_> = frames.iter().collect();
        assert_eq!(all.len(), 10);
        assert_eq!(all[9].index, 9);
        assert_eq!(all[9].magnitudes.len(), 513);
        assert!((all[9].time - 4608.0 / 8000.0).abs() < 1e-6);
    }

    #[test]
    fn out_of_range_frame_is_none() {
        let buf = SampleBuffer::new(vec![vec![0.25; 5000]], 8000).unwrap();
        let frames = analyze(&buf, 1024, 512).unwrap();
        assert!(frames.frame(9).is_some());
        assert!(frames.frame(10).is_none());
        assert!(frames.frame(usize::MAX).is_none());
    }

    #[test]
    fn iteration_is_restartable_and_matches_parallel() {
        let buf = SampleBuffer::new(vec![sine(440.0, 8000, 6000, 0.5)], 8000).unwrap();
        let frames = analyze(&buf, 1024, 512).unwrap();
        let first: Vec<f32> = frames.iter().map(|f| f.rms).collect();
        let second: Vec<f32> = frames.iter().map(|f| f.rms).collect();
        let parallel: Vec<f32> = frames.collect_parallel().iter().map(|f| f.rms).collect();
        assert_eq!(first, second);
        assert_eq!(first, parallel);
    }

    #[test]
    fn sine_energy_lands_in_its_band() {
        let buf = SampleBuffer::new(vec![sine(1000.0, 44100, 8192, 0.8)], 44100).unwrap();
        let frames = analyze(&buf, 4096, 2048).unwrap();
        let frame = frames.frame(0).unwrap();
        let mid = frame.bands.get(Band::Mid);
        assert!(mid > 0.9 * frame.bands.total());

        let (peak_bin, _) = frame
            .magnitudes
            .iter()
            .enumerate()
            .fold((0, 0.0f32), |best, (i, &m)| if m > best.1 { (i, m) } else { best });
        assert!((frame.bin_frequency(peak_bin) - 1000.0).abs() < frame.freq_resolution);
    }

    #[test]
    fn identical_channels_are_fully_correlated() {
        let tone = sine(220.0, 8000, 2048, 0.5);
        let buf = SampleBuffer::new(vec![tone.clone(), tone], 8000).unwrap();
        let frame = analyze(&buf, 1024, 1024).unwrap().frame(0).unwrap();
        let stereo = frame.stereo.unwrap();
        assert!((stereo.correlation - 1.0).abs() < 1e-4);
        assert!(stereo.side_energy < 1e-6);
    }

    #[test]
    fn inverted_channels_are_anticorrelated() {
        let tone = sine(220.0, 8000, 2048, 0.5);
        let inverted: Vec<f32> = tone.iter().map(|s| -s).collect();
        let buf = SampleBuffer::new(vec![tone, inverted], 8000).unwrap();
        let frame = analyze(&buf, 1024, 1024).unwrap().frame(0).unwrap();
        assert!((frame.stereo.unwrap().correlation + 1.0).abs() < 1e-4);
        assert!(frame.stereo.unwrap().mid_energy < 1e-6);
    }

    #[test]
    fn mono_input_has_no_stereo_stats() {
        let buf = SampleBuffer::new(vec![vec![0.1; 2048]], 8000).unwrap();
        let frame = analyze(&buf, 1024, 512).unwrap().frame(0).unwrap();
        assert!(frame.stereo.is_none());
    }

    #[test]
    fn hann_window_endpoints() {
        let w = hann_window(8);
        assert!(w[0].abs() < 1e-6);
        assert!(w[7].abs() < 1e-6);
        assert!(w.iter().all(|&x| (0.0..=1.0).contains(&x)));
    }
}
