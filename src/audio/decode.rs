use std::path::Path;
use symphonia::core::audio::SampleBuffer as PacketBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{AnalysisError, Result};

pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "aac", "ogg", "m4a"];

/// Decoded audio, one sample vector per channel, normalized to [-1, 1].
#[derive(Clone, Debug)]
pub struct SampleBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidConfig("sample rate must be positive".into()));
        }
        if channels.is_empty() || channels.len() > 2 {
            return Err(AnalysisError::InvalidConfig(format!(
                "expected 1 or 2 channels, got {}",
                channels.len()
            )));
        }
        if channels.iter().any(|c| c.len() != channels[0].len()) {
            return Err(AnalysisError::InvalidConfig(
                "channels must have equal length".into(),
            ));
        }

        let channels = channels
            .into_iter()
            .map(|c| c.into_iter().map(|s| if s.is_finite() { s.clamp(-1.0, 1.0) } else { 0.0 }).collect())
            .collect();

        Ok(Self { channels, sample_rate })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn is_stereo(&self) -> bool {
        self.channels.len() == 2
    }

    /// Samples per channel.
    pub fn frames(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    pub fn duration_secs(&self) -> f32 {
        self.frames() as f32 / self.sample_rate as f32
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn left(&self) -> &[f32] {
        &self.channels[0]
    }

    pub fn right(&self) -> Option<&[f32]> {
        self.channels.get(1).map(|c| c.as_slice())
    }

    /// Mean of all channels.
    pub fn mono(&self) -> Vec<f32> {
        match self.right() {
            None => self.left().to_vec(),
            Some(right) => self
                .left()
                .iter()
                .zip(right)
                .map(|(l, r)| (l + r) * 0.5)
                .collect(),
        }
    }
}

pub fn decode(path: &Path) -> Result<SampleBuffer> {
    if !path.exists() {
        return Err(AnalysisError::FileNotFound(path.to_path_buf()));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(AnalysisError::UnsupportedFormat(if ext.is_empty() {
            format!("{} has no file extension", path.display())
        } else {
            format!(".{} (expected one of {})", ext, SUPPORTED_EXTENSIONS.join(", "))
        }));
    }

    let file = std::fs::File::open(path)
        .map_err(|e| AnalysisError::CorruptFile(format!("failed to open {}: {}", path.display(), e)))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(&ext);

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| match e {
            SymphoniaError::Unsupported(what) => AnalysisError::UnsupportedFormat(what.to_string()),
            other => AnalysisError::CorruptFile(format!("failed to probe container: {}", other)),
        })?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| AnalysisError::UnsupportedFormat("no decodable audio track".into()))?;

    let track_id = track.id;
    let source_channels = track.codec_params.channels.map_or(1, |c| c.count()).max(1);
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AnalysisError::CorruptFile("unknown sample rate".into()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| match e {
            SymphoniaError::Unsupported(what) => AnalysisError::UnsupportedFormat(what.to_string()),
            other => AnalysisError::CorruptFile(format!("failed to create decoder: {}", other)),
        })?;

    if source_channels > 2 {
        log::warn!(
            "{} channels found, keeping the first two for analysis",
            source_channels
        );
    }
    let kept = source_channels.min(2);
    let mut channels: Vec<Vec<f32>> = vec![Vec::new(); kept];
    let mut decode_errors = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                return Err(AnalysisError::CorruptFile(format!("failed to read packet: {}", e)));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(msg)) => {
                log::debug!("Skipping undecodable packet: {}", msg);
                decode_errors += 1;
                continue;
            }
            Err(e) => return Err(AnalysisError::CorruptFile(format!("decode failed: {}", e))),
        };

        let spec = *decoded.spec();
        let packet_channels = spec.channels.count().max(1);
        let num_frames = decoded.frames();

        let mut sample_buf = PacketBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        // De-interleave, duplicating mono packets if the track is stereo
        for frame in sample_buf.samples().chunks(packet_channels) {
            for (ch, out) in channels.iter_mut().enumerate() {
                out.push(frame[ch.min(frame.len() - 1)]);
            }
        }
    }

    if channels[0].is_empty() && decode_errors > 0 {
        return Err(AnalysisError::CorruptFile(format!(
            "{} packets failed to decode and no audio was recovered",
            decode_errors
        )));
    }
    if decode_errors > 0 {
        log::warn!("{} packets skipped due to decode errors", decode_errors);
    }

    let buffer = SampleBuffer::new(channels, sample_rate)?;

    log::info!(
        "Decoded audio: {} samples x {} ch, {}Hz, {:.1}s",
        buffer.frames(),
        buffer.channel_count(),
        sample_rate,
        buffer.duration_secs()
    );

    Ok(buffer)
}
