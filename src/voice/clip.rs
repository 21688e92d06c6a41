//! Decoded audio clips
//!
//! Speech replies arrive as MPEG streams, cue sounds may be MP3 or WAV files.
//! Everything is decoded to mono `f32` before it reaches playback.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::{Error, Result};

/// Mono audio ready for playback
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl AudioClip {
    /// Create a clip from mono samples
    #[must_use]
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    /// Decode an MPEG audio stream (the speech endpoint's response body)
    ///
    /// # Errors
    ///
    /// Returns error if the data is not decodable MP3
    pub fn from_mp3(mp3_data: &[u8]) -> Result<Self> {
        let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
        let mut samples = Vec::new();
        let mut sample_rate = 0_u32;

        loop {
            match decoder.next_frame() {
                Ok(frame) => {
                    sample_rate = u32::try_from(frame.sample_rate)
                        .map_err(|_| Error::Audio("invalid MP3 sample rate".to_string()))?;
                    if frame.channels == 2 {
                        // Stereo: average channels
                        samples.extend(frame.data.chunks(2).map(|chunk| {
                            let left = f32::from(chunk[0]) / 32768.0;
                            let right =
                                f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                            f32::midpoint(left, right)
                        }));
                    } else {
                        samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                    }
                }
                Err(minimp3::Error::Eof) => break,
                Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
            }
        }

        if sample_rate == 0 {
            return Err(Error::Audio("MP3 stream contained no frames".to_string()));
        }

        Ok(Self::new(samples, sample_rate))
    }

    /// Decode WAV bytes, downmixing to mono
    ///
    /// # Errors
    ///
    /// Returns error if the data is not a readable WAV file
    pub fn from_wav(wav_data: &[u8]) -> Result<Self> {
        let mut reader =
            hound::WavReader::new(Cursor::new(wav_data)).map_err(|e| Error::Audio(e.to_string()))?;
        let spec = reader.spec();
        let channels = usize::from(spec.channels.max(1));

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::Audio(e.to_string()))?,
            hound::SampleFormat::Int => {
                #[allow(clippy::cast_precision_loss)]
                let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| {
                        #[allow(clippy::cast_precision_loss)]
                        let v = v as f32;
                        v / scale
                    }))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| Error::Audio(e.to_string()))?
            }
        };

        #[allow(clippy::cast_precision_loss)]
        let samples = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        Ok(Self::new(samples, spec.sample_rate))
    }

    /// Load a cue sound from disk, choosing the decoder by extension
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or decoded
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("mp3") => Self::from_mp3(&data),
            Some("wav") => Self::from_wav(&data),
            other => Err(Error::Audio(format!(
                "unsupported audio file type {other:?}: {}",
                path.display()
            ))),
        }
    }

    /// Generate a sine tone
    #[must_use]
    pub fn tone(frequency: f32, duration: Duration, amplitude: f32, sample_rate: u32) -> Self {
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let count = (duration.as_secs_f32() * sample_rate as f32) as usize;
        #[allow(clippy::cast_precision_loss)]
        let samples = (0..count)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
            })
            .collect();
        Self::new(samples, sample_rate)
    }

    /// Mono samples
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample rate in Hz
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Playback length
    #[must_use]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        #[allow(clippy::cast_precision_loss)]
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }

    /// Check if the clip has no samples
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Convert to another sample rate
    ///
    /// # Errors
    ///
    /// Returns error if the resampler cannot be built
    pub fn resampled(&self, to_rate: u32) -> Result<Self> {
        if to_rate == self.sample_rate || self.samples.is_empty() {
            return Ok(Self {
                samples: Arc::clone(&self.samples),
                sample_rate: to_rate,
            });
        }
        let samples = resample(&self.samples, self.sample_rate, to_rate)?;
        Ok(Self::new(samples, to_rate))
    }
}

/// Resample audio using rubato
#[allow(clippy::cast_possible_truncation)]
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{FftFixedIn, Resampler};

    let chunk_size = 1024;
    let sub_chunks = 2;

    let mut resampler =
        FftFixedIn::<f64>::new(from_rate as usize, to_rate as usize, chunk_size, sub_chunks, 1)
            .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;

    let mut output = Vec::new();

    // Pad the tail with silence so the last partial chunk is not dropped
    for chunk in samples.chunks(chunk_size) {
        let mut block: Vec<f64> = chunk.iter().map(|&s| f64::from(s)).collect();
        block.resize(chunk_size, 0.0);
        let result = resampler
            .process(&[block], None)
            .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        output.extend(result[0].iter().map(|&s| s as f32));
    }

    #[allow(clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let expected =
        (samples.len() as f64 * f64::from(to_rate) / f64::from(from_rate)).ceil() as usize;
    output.truncate(expected);

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(samples: &[i16], channels: u16, sample_rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_wav_stereo_downmix() {
        let data = wav_bytes(&[16384, 0, -16384, -16384], 2, 22050);
        let clip = AudioClip::from_wav(&data).unwrap();

        assert_eq!(clip.sample_rate(), 22050);
        assert_eq!(clip.samples().len(), 2);
        assert!((clip.samples()[0] - 0.25).abs() < 1e-3);
        assert!((clip.samples()[1] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_invalid_mp3_rejected() {
        assert!(AudioClip::from_mp3(b"definitely not audio").is_err());
    }

    #[test]
    fn test_duration() {
        let clip = AudioClip::new(vec![0.0; 24_000], 24_000);
        assert_eq!(clip.duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_resample_length() {
        let clip = AudioClip::tone(440.0, Duration::from_millis(500), 0.5, 24_000);
        let resampled = clip.resampled(48_000).unwrap();

        assert_eq!(resampled.sample_rate(), 48_000);
        let expected = clip.samples().len() * 2;
        assert!(resampled.samples().len() <= expected);
        assert!(resampled.samples().len() + 2048 >= expected);
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cue.ogg");
        std::fs::write(&path, b"data").unwrap();
        assert!(matches!(AudioClip::from_file(&path), Err(Error::Audio(_))));
    }
}
