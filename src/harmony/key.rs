use std::fmt;

/// Krumhansl-Kessler probe-tone profiles, tonic first.
const KK_MAJOR: [f32; 12] = [6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88];
const KK_MINOR: [f32; 12] = [6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17];

pub const PITCH_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    Major,
    Minor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Key {
    /// Pitch class of the tonic, C = 0
    pub tonic: usize,
    pub mode: Mode,
}

impl Key {
    pub fn new(tonic: usize, mode: Mode) -> Self {
        Self { tonic: tonic % 12, mode }
    }

    /// All 24 keys: the twelve majors then the twelve minors.
    pub fn all() -> impl Iterator<Item = Key> {
        [Mode::Major, Mode::Minor]
            .into_iter()
            .flat_map(|mode| (0..12).map(move |tonic| Key::new(tonic, mode)))
    }

    pub fn relative(self) -> Key {
        match self.mode {
            Mode::Major => Key::new(self.tonic + 9, Mode::Minor),
            Mode::Minor => Key::new(self.tonic + 3, Mode::Major),
        }
    }

    pub fn parallel(self) -> Key {
        match self.mode {
            Mode::Major => Key::new(self.tonic, Mode::Minor),
            Mode::Minor => Key::new(self.tonic, Mode::Major),
        }
    }

    pub fn dominant(self) -> Key {
        Key::new(self.tonic + 7, self.mode)
    }

    pub fn subdominant(self) -> Key {
        Key::new(self.tonic + 5, self.mode)
    }

    fn profile(self) -> &'static [f32; 12] {
        match self.mode {
            Mode::Major => &KK_MAJOR,
            Mode::Minor => &KK_MINOR,
        }
    }

    /// Pearson correlation between a chroma vector and this key's profile.
    pub fn correlate(self, chroma: &[f32; 12]) -> f32 {
        let profile = self.profile();
        // Rotate so the tonic lines up with profile index 0
        let x: [f32; 12] = std::array::from_fn(|i| chroma[(i + self.tonic) % 12]);

        let mean_x = x.iter().sum::<f32>() / 12.0;
        let mean_y = profile.iter().sum::<f32>() / 12.0;

        let mut cov = 0.0f32;
        let mut var_x = 0.0f32;
        let mut var_y = 0.0f32;
        for (xi, yi) in x.iter().zip(profile.iter()) {
            let dx = xi - mean_x;
            let dy = yi - mean_y;
            cov += dx * dy;
            var_x += dx * dx;
            var_y += dy * dy;
        }

        let denom = (var_x * var_y).sqrt();
        if denom > 1e-10 {
            cov / denom
        } else {
            0.0
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            Mode::Major => "major",
            Mode::Minor => "minor",
        };
        write!(f, "{} {}", PITCH_NAMES[self.tonic], mode)
    }
}

/// All keys ranked by correlation, best first. Ties keep [`Key::all`] order.
pub fn rank_keys(chroma: &[f32; 12]) -> Vec<(Key, f32)> {
    let mut ranked: Vec<(Key, f32)> = Key::all().map(|k| (k, k.correlate(chroma))).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}
