//! Audio playback to speakers

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, Stream, StreamConfig};

use super::AudioClip;
use crate::{Error, Result};

/// Preferred playback rate (matches TTS output)
const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Number of recent output samples kept for lip sync
pub const TAP_WINDOW: usize = 256;

/// Audio sink used for cue sounds and synthesized speech
pub trait AudioOutput {
    /// Start playing a clip alongside anything already playing
    ///
    /// # Errors
    ///
    /// Returns error if the clip cannot be prepared for the device
    fn play(&mut self, clip: &AudioClip) -> Result<()>;

    /// Check if any clip is still playing
    fn is_playing(&self) -> bool;
}

/// Recent output samples, sampled by the lip sync driver
#[derive(Clone, Default)]
pub struct OutputTap {
    window: Arc<Mutex<VecDeque<f32>>>,
}

impl OutputTap {
    /// Copy of the most recent output samples (at most [`TAP_WINDOW`])
    #[must_use]
    pub fn window(&self) -> Vec<f32> {
        self.window
            .lock()
            .map(|w| w.iter().copied().collect())
            .unwrap_or_default()
    }

    fn push(&self, samples: &[f32]) {
        if let Ok(mut window) = self.window.lock() {
            for &s in samples {
                if window.len() == TAP_WINDOW {
                    window.pop_front();
                }
                window.push_back(s);
            }
        }
    }
}

struct Voice {
    samples: Arc<[f32]>,
    position: usize,
}

/// Sums concurrently playing clips into one mono signal
#[derive(Default)]
pub struct Mixer {
    voices: Vec<Voice>,
}

impl Mixer {
    /// Add a clip's samples (already at the output rate)
    pub fn add(&mut self, samples: Arc<[f32]>) {
        if !samples.is_empty() {
            self.voices.push(Voice {
                samples,
                position: 0,
            });
        }
    }

    /// Check if any voice has samples left
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.voices.is_empty()
    }

    /// Fill an interleaved output buffer, returning the mono mix written
    pub fn render(&mut self, data: &mut [f32], channels: usize) -> Vec<f32> {
        let channels = channels.max(1);
        let mut mono = Vec::with_capacity(data.len() / channels);

        for frame in data.chunks_mut(channels) {
            let mut sample = 0.0;
            for voice in &mut self.voices {
                if let Some(&s) = voice.samples.get(voice.position) {
                    sample += s;
                    voice.position += 1;
                }
            }
            let sample = sample.clamp(-1.0, 1.0);

            for out in frame.iter_mut() {
                *out = sample;
            }
            mono.push(sample);
        }

        self.voices.retain(|v| v.position < v.samples.len());
        mono
    }
}

/// Plays audio to the default output device
///
/// The output stream stays open for the lifetime of the value; clips are
/// mixed in as they are played.
pub struct AudioPlayback {
    _stream: Stream,
    sample_rate: u32,
    mixer: Arc<Mutex<Mixer>>,
    tap: OutputTap,
}

impl AudioPlayback {
    /// Create a new audio playback instance
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let config: StreamConfig = match device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.sample_format() == SampleFormat::F32
                    && c.channels() <= 2
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            }) {
            Some(c) => c.with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE)).config(),
            None => {
                // Fallback: device default, resampling clips to its rate
                let default = device
                    .default_output_config()
                    .map_err(|e| Error::Audio(e.to_string()))?;
                if default.sample_format() != SampleFormat::F32 {
                    return Err(Error::Audio("no f32 output config found".to_string()));
                }
                default.config()
            }
        };

        let channels = usize::from(config.channels);
        let mixer = Arc::new(Mutex::new(Mixer::default()));
        let tap = OutputTap::default();

        let mixer_clone = Arc::clone(&mixer);
        let tap_clone = tap.clone();

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if let Ok(mut mixer) = mixer_clone.lock() {
                        let mono = mixer.render(data, channels);
                        tap_clone.push(&mono);
                    } else {
                        data.fill(0.0);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self {
            _stream: stream,
            sample_rate: config.sample_rate.0,
            mixer,
            tap,
        })
    }

    /// Handle for sampling recent output
    #[must_use]
    pub fn tap(&self) -> OutputTap {
        self.tap.clone()
    }

    /// Device sample rate
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl AudioOutput for AudioPlayback {
    fn play(&mut self, clip: &AudioClip) -> Result<()> {
        if clip.is_empty() {
            return Ok(());
        }

        let clip = clip.resampled(self.sample_rate)?;
        let samples: Arc<[f32]> = clip.samples().into();
        let count = samples.len();

        self.mixer
            .lock()
            .map_err(|_| Error::Audio("playback mixer poisoned".to_string()))?
            .add(samples);

        tracing::debug!(samples = count, "playback started");
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.mixer.lock().is_ok_and(|m| m.is_active())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixer_sums_and_finishes() {
        let mut mixer = Mixer::default();
        mixer.add(vec![0.25, 0.25, 0.25].into());
        mixer.add(vec![0.5].into());
        assert!(mixer.is_active());

        let mut out = vec![0.0; 4];
        let mono = mixer.render(&mut out, 2);
        assert_eq!(mono, vec![0.75, 0.25]);
        assert_eq!(out, vec![0.75, 0.75, 0.25, 0.25]);
        assert!(mixer.is_active());

        let mut out = vec![0.0; 2];
        mixer.render(&mut out, 1);
        assert_eq!(out, vec![0.25, 0.0]);
        assert!(!mixer.is_active());
    }

    #[test]
    fn test_mixer_clamps() {
        let mut mixer = Mixer::default();
        mixer.add(vec![0.8].into());
        mixer.add(vec![0.8].into());

        let mut out = vec![0.0; 1];
        mixer.render(&mut out, 1);
        assert!((out[0] - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_empty_clip_ignored() {
        let mut mixer = Mixer::default();
        mixer.add(Vec::<f32>::new().into());
        assert!(!mixer.is_active());
    }

    #[test]
    fn test_tap_keeps_recent_window() {
        let tap = OutputTap::default();
        let samples: Vec<f32> = (0..300u16).map(f32::from).collect();
        tap.push(&samples);

        let window = tap.window();
        assert_eq!(window.len(), TAP_WINDOW);
        assert!((window[0] - 44.0).abs() < f32::EPSILON);
        assert!((window[TAP_WINDOW - 1] - 299.0).abs() < f32::EPSILON);
    }
}
