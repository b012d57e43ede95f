use serde::Serialize;

/// Frequency bands used for balance and contrast measurements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    SubBass,
    Bass,
    LowMid,
    Mid,
    HighMid,
    High,
    Air,
}

impl Band {
    pub const ALL: [Band; 7] = [
        Band::SubBass,
        Band::Bass,
        Band::LowMid,
        Band::Mid,
        Band::HighMid,
        Band::High,
        Band::Air,
    ];

    /// Lower and upper edge in Hz.
    pub fn range_hz(self) -> (f32, f32) {
        match self {
            Band::SubBass => (20.0, 60.0),
            Band::Bass => (60.0, 250.0),
            Band::LowMid => (250.0, 500.0),
            Band::Mid => (500.0, 2000.0),
            Band::HighMid => (2000.0, 4000.0),
            Band::High => (4000.0, 8000.0),
            Band::Air => (8000.0, 20000.0),
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Band::SubBass => "sub_bass",
            Band::Bass => "bass",
            Band::LowMid => "low_mid",
            Band::Mid => "mid",
            Band::HighMid => "high_mid",
            Band::High => "high",
            Band::Air => "air",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Band::SubBass => "Sub-bass",
            Band::Bass => "Bass",
            Band::LowMid => "Low-mids",
            Band::Mid => "Mids",
            Band::HighMid => "High-mids",
            Band::High => "Highs",
            Band::Air => "Air",
        }
    }

    /// Whether a source at `sample_rate` can carry any content in this band.
    pub fn fits_below_nyquist(self, sample_rate: u32) -> bool {
        self.range_hz().0 < sample_rate as f32 / 2.0
    }

    /// FFT bin range `[low, high)` covered by this band.
    pub fn bins(self, freq_resolution: f32, num_bins: usize) -> (usize, usize) {
        let (low_hz, high_hz) = self.range_hz();
        let low = ((low_hz / freq_resolution).ceil() as usize).min(num_bins);
        let high = ((high_hz / freq_resolution).ceil() as usize).min(num_bins);
        (low, high)
    }
}

/// Linear power per band, indexed in [`Band::ALL`] order.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BandEnergies(pub [f32; 7]);

impl BandEnergies {
    pub fn get(&self, band: Band) -> f32 {
        self.0[band as usize]
    }

    pub fn total(&self) -> f32 {
        self.0.iter().sum()
    }
}

/// Per-window inter-channel statistics.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StereoFrame {
    /// Pearson correlation between left and right (-1.0..1.0)
    pub correlation: f32,
    pub mid_energy: f32,
    pub side_energy: f32,
}

/// Features for one analysis window. Immutable once produced.
#[derive(Clone, Debug)]
pub struct FrameFeatures {
    pub index: usize,
    /// Window start in seconds
    pub time: f32,
    /// FFT magnitude bins of the mono mixdown (window/2 + 1 elements, linear scale)
    pub magnitudes: Vec<f32>,
    /// Hz per magnitude bin
    pub freq_resolution: f32,
    /// RMS of the unwindowed mono samples
    pub rms: f32,
    /// Absolute peak across channels
    pub peak: f32,
    pub bands: BandEnergies,
    /// Present only for two-channel input
    pub stereo: Option<StereoFrame>,
}

impl FrameFeatures {
    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.freq_resolution
    }

    pub fn is_silent(&self) -> bool {
        self.rms < 1e-5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_are_contiguous() {
        for pair in Band::ALL.windows(2) {
            assert_eq!(pair[0].range_hz().1, pair[1].range_hz().0);
        }
    }

    #[test]
    fn band_bins_clamp_to_spectrum() {
        // 8 kHz sample rate, 1024-point window → 7.8125 Hz per bin, 513 bins
        let (low, high) = Band::Air.bins(7.8125, 513);
        assert_eq!((low, high), (513, 513));
        let (low, high) = Band::Bass.bins(7.8125, 513);
        assert_eq!((low, high), (8, 32));
    }

    #[test]
    fn air_band_needs_more_than_16k_sample_rate() {
        assert!(!Band::Air.fits_below_nyquist(16000));
        assert!(Band::High.fits_below_nyquist(16000));
        assert!(Band::ALL.iter().all(|b| b.fits_below_nyquist(44100)));
    }

    #[test]
    fn band_energy_lookup_follows_order() {
        let energies = BandEnergies([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(energies.get(Band::SubBass), 1.0);
        assert_eq!(energies.get(Band::Air), 7.0);
        assert_eq!(energies.total(), 28.0);
    }
}
