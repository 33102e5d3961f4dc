// Decode - Turns imported audio file bytes into planar f32 buffers
//
// WAV goes through hound and FLAC through claxon; everything else is probed
// by symphonia. Decoded audio is resampled to the engine rate once, at
// import, so playback never has to convert rates.

use claxon::FlacReader;
use hound::{SampleFormat, WavReader};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

/// Number of buckets in the waveform overview
pub const PEAK_BUCKETS: usize = 500;

/// Decoded audio shared between the document and the engines, by file reference
pub type AudioPool = HashMap<String, Arc<DecodedAudio>>;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("WAV decode error: {0}")]
    Wav(#[from] hound::Error),

    #[error("FLAC decode error: {0}")]
    Flac(#[from] claxon::Error),

    #[error("Audio decode error: {0}")]
    Symphonia(#[from] SymphoniaError),

    #[error("MIDI parse error: {0}")]
    Midi(#[from] midly::Error),

    #[error("Unsupported MIDI file: {0}")]
    UnsupportedMidi(String),

    #[error("File contains no audio")]
    Empty,

    #[error("Resampling failed: {0}")]
    Resample(String),
}

/// Planar audio plus a precomputed waveform overview
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub sample_rate: u32,
    /// One buffer per channel, all the same length
    pub channels: Vec<Vec<f32>>,
    /// Max absolute amplitude per bucket, across channels
    pub peaks: Vec<f32>,
}

impl DecodedAudio {
    /// Build from planar channels, computing the peak overview
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Self {
        let peaks = compute_peaks(&channels, PEAK_BUCKETS);
        Self {
            sample_rate,
            channels,
            peaks,
        }
    }

    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Sample of `channel` at fractional frame `position` (linear interpolation)
    ///
    /// Mono audio answers for every channel; out-of-range positions are silent.
    #[inline]
    pub fn sample_at(&self, channel: usize, position: f64) -> f32 {
        let Some(data) = self
            .channels
            .get(channel)
            .or_else(|| self.channels.first())
        else {
            return 0.0;
        };
        if position < 0.0 {
            return 0.0;
        }
        let index = position as usize;
        let Some(&a) = data.get(index) else {
            return 0.0;
        };
        let b = data.get(index + 1).copied().unwrap_or(0.0);
        let frac = (position - index as f64) as f32;
        a + (b - a) * frac
    }
}

/// Split `channels` into `buckets` windows and keep the loudest sample of each
pub fn compute_peaks(channels: &[Vec<f32>], buckets: usize) -> Vec<f32> {
    let frames = channels.first().map_or(0, Vec::len);
    if frames == 0 || buckets == 0 {
        return Vec::new();
    }
    let per_bucket = frames.div_ceil(buckets).max(1);
    (0..buckets)
        .map(|bucket| {
            let start = (bucket * per_bucket).min(frames);
            let end = ((bucket + 1) * per_bucket).min(frames);
            channels
                .iter()
                .flat_map(|c| c[start..end].iter())
                .fold(0.0_f32, |peak, s| peak.max(s.abs()))
        })
        .collect()
}

/// Decode an audio file held in memory
///
/// # Arguments
/// * `bytes` - Full file contents
/// * `extension` - File extension hint (e.g. "wav"); the content is sniffed when absent
/// * `target_rate` - Engine sample rate to resample to
pub fn decode_audio(
    bytes: &[u8],
    extension: Option<&str>,
    target_rate: u32,
) -> Result<DecodedAudio, DecodeError> {
    let extension = extension.map(str::to_ascii_lowercase);
    let (sample_rate, channels) = match extension.as_deref() {
        Some("wav") | Some("wave") => decode_wav(bytes)?,
        Some("flac") => decode_flac(bytes)?,
        None if bytes.starts_with(b"RIFF") => decode_wav(bytes)?,
        None if bytes.starts_with(b"fLaC") => decode_flac(bytes)?,
        other => decode_with_symphonia(bytes, other)?,
    };

    if channels.is_empty() || channels[0].is_empty() {
        return Err(DecodeError::Empty);
    }

    let (sample_rate, channels) = if sample_rate != target_rate && target_rate > 0 {
        (target_rate, resample(channels, sample_rate, target_rate)?)
    } else {
        (sample_rate, channels)
    };

    log::debug!(
        "Decoded {} channel(s), {} frames at {} Hz",
        channels.len(),
        channels[0].len(),
        sample_rate
    );
    Ok(DecodedAudio::new(sample_rate, channels))
}

fn deinterleave(samples: Vec<f32>, channel_count: usize) -> Vec<Vec<f32>> {
    let channel_count = channel_count.max(1);
    let frames = samples.len() / channel_count;
    let mut channels = vec![Vec::with_capacity(frames); channel_count];
    for frame in samples.chunks_exact(channel_count) {
        for (channel, &sample) in channels.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }
    channels
}

fn decode_wav(bytes: &[u8]) -> Result<(u32, Vec<Vec<f32>>), DecodeError> {
    let reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    Ok((spec.sample_rate, deinterleave(samples, spec.channels as usize)))
}

fn decode_flac(bytes: &[u8]) -> Result<(u32, Vec<Vec<f32>>), DecodeError> {
    let mut reader = FlacReader::new(Cursor::new(bytes))?;
    let info = reader.streaminfo();
    let scale = (1_i64 << (info.bits_per_sample.clamp(1, 32) - 1)) as f32;

    let samples: Vec<f32> = reader
        .samples()
        .map(|s| s.map(|s| s as f32 / scale))
        .collect::<Result<_, _>>()?;

    Ok((info.sample_rate, deinterleave(samples, info.channels as usize)))
}

fn decode_with_symphonia(
    bytes: &[u8],
    extension: Option<&str>,
) -> Result<(u32, Vec<Vec<f32>>), DecodeError> {
    let source = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
    let mut hint = Hint::new();
    if let Some(extension) = extension {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        source,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::Empty)?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let mut decoder =
        symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

    let mut sample_rate = codec_params.sample_rate.unwrap_or(0);
    let mut channel_count = codec_params.channels.map_or(0, |c| c.count());
    let mut interleaved = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Corrupt packets are skipped
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        sample_rate = spec.rate;
        channel_count = spec.channels.count();
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        interleaved.extend_from_slice(buffer.samples());
    }

    if sample_rate == 0 || channel_count == 0 {
        return Err(DecodeError::Empty);
    }
    Ok((sample_rate, deinterleave(interleaved, channel_count)))
}

fn resample(
    channels: Vec<Vec<f32>>,
    from_rate: u32,
    to_rate: u32,
) -> Result<Vec<Vec<f32>>, DecodeError> {
    let frames = channels.first().map_or(0, Vec::len);
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(
        to_rate as f64 / from_rate as f64,
        2.0,
        params,
        frames,
        channels.len(),
    )
    .map_err(|e| DecodeError::Resample(e.to_string()))?;

    resampler
        .process(&channels, None)
        .map_err(|e| DecodeError::Resample(e.to_string()))
}
