//! Audio utilities: stream segmentation and minimal WAV parsing.
//!
//! Samples are mono `f32` in `[-1, 1]` (16-bit PCM scaled by 1/32768).
//! The capture type holds only a borrowed view; the caller keeps the
//! sample buffer alive and unmodified while chunks are being read.

use thiserror::Error;

use crate::window::SlidingWindow;

/// Segments a long sample buffer into pipeline-sized overlapping chunks.
///
/// A thin wrapper over [`SlidingWindow`]; the final partial chunk, if any,
/// is zero-padded to the full window size.
#[derive(Debug)]
pub struct AudioCapture<'a> {
    window: SlidingWindow<'a, f32>,
    data: &'a [f32],
    size: usize,
    stride: usize,
    tail_emitted: bool,
}

impl<'a> AudioCapture<'a> {
    #[must_use]
    pub fn new(data: &'a [f32], window_size: usize, stride: usize) -> Self {
        Self {
            window: SlidingWindow::new(data, window_size, stride),
            data,
            size: window_size,
            stride,
            tail_emitted: false,
        }
    }

    /// Index one past the last sample any already-emitted chunk covered.
    fn covered_end(&self) -> usize {
        let next_start = self.window.next_window_start();
        if next_start == 0 {
            0
        } else {
            next_start - self.stride + self.size
        }
    }

    fn has_tail(&self) -> bool {
        !self.tail_emitted && self.covered_end() < self.data.len()
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.window.has_next() || self.has_tail()
    }

    /// The next chunk, padded with zeros when the stream ends mid-window.
    pub fn next(&mut self) -> Option<Vec<f32>> {
        if let Some(chunk) = self.window.next() {
            return Some(chunk.to_vec());
        }
        if !self.has_tail() {
            return None;
        }
        self.tail_emitted = true;

        // Keep the stride grid: the tail starts where the next full window
        // would have, holding whatever samples are left.
        let start = self.window.next_window_start().min(self.data.len());
        let remaining = self.data.len() - start;
        let mut chunk = vec![0.0f32; self.size];
        chunk[..remaining].copy_from_slice(&self.data[start..]);
        Some(chunk)
    }
}

#[derive(Debug, Clone)]
pub struct WavData {
    pub sample_rate_hz: u32,
    pub channels: u16,
    pub samples_mono: Vec<f32>,
}

#[derive(Debug, Error)]
pub enum WavError {
    #[error("not a valid WAV file")]
    InvalidHeader,
    #[error("unsupported WAV format (need 16-bit PCM)")]
    UnsupportedFormat,
    #[error("malformed WAV chunks")]
    MalformedChunks,
}

fn read_u16_le(p: &[u8]) -> u16 {
    u16::from_le_bytes([p[0], p[1]])
}

fn read_u32_le(p: &[u8]) -> u32 {
    u32::from_le_bytes([p[0], p[1], p[2], p[3]])
}

/// Parse WAV bytes and return mono `f32` samples at the file's sample rate.
///
/// Supports PCM (`audio_format=1`), 16-bit, >=1 channels; multi-channel
/// input is averaged down to mono.
pub fn parse_wav_bytes(data: &[u8]) -> Result<WavData, WavError> {
    if data.len() < 44 || &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        return Err(WavError::InvalidHeader);
    }

    let mut channels: u16 = 0;
    let mut sample_rate_hz: u32 = 0;
    let mut bits_per_sample: u16 = 0;
    let mut audio_format: u16 = 0;
    let mut pcm_data: Option<&[u8]> = None;

    let mut p = 12usize;
    while p + 8 <= data.len() {
        let chunk_id = &data[p..p + 4];
        let chunk_size = read_u32_le(&data[p + 4..p + 8]) as usize;
        let chunk_data_start = p + 8;
        let chunk_data_end = chunk_data_start.saturating_add(chunk_size);
        if chunk_data_end > data.len() {
            break;
        }

        if chunk_id == b"fmt " && chunk_size >= 16 {
            audio_format = read_u16_le(&data[chunk_data_start..chunk_data_start + 2]);
            channels = read_u16_le(&data[chunk_data_start + 2..chunk_data_start + 4]);
            sample_rate_hz = read_u32_le(&data[chunk_data_start + 4..chunk_data_start + 8]);
            bits_per_sample = read_u16_le(&data[chunk_data_start + 14..chunk_data_start + 16]);
        } else if chunk_id == b"data" {
            pcm_data = Some(&data[chunk_data_start..chunk_data_end]);
        }

        p = chunk_data_end;
        if chunk_size & 1 == 1 {
            p = p.saturating_add(1);
        }
    }

    let Some(pcm_data) = pcm_data else {
        return Err(WavError::MalformedChunks);
    };

    if audio_format != 1 || bits_per_sample != 16 || channels < 1 {
        return Err(WavError::UnsupportedFormat);
    }

    let frame_bytes = usize::from(channels) * 2;
    let n_frames = pcm_data.len() / frame_bytes;

    let mut samples_mono = Vec::with_capacity(n_frames);
    for i in 0..n_frames {
        let frame = &pcm_data[i * frame_bytes..(i + 1) * frame_bytes];
        if channels == 1 {
            let s = i16::from_le_bytes([frame[0], frame[1]]);
            samples_mono.push(f32::from(s) / 32768.0);
        } else {
            let mut sum = 0.0f32;
            for c in 0..usize::from(channels) {
                let off = c * 2;
                let s = i16::from_le_bytes([frame[off], frame[off + 1]]);
                sum += f32::from(s) / 32768.0;
            }
            samples_mono.push(sum / f32::from(channels));
        }
    }

    Ok(WavData {
        sample_rate_hz,
        channels,
        samples_mono,
    })
}

#[cfg(test)]
mod tests {
    use super::{parse_wav_bytes, AudioCapture};

    #[test]
    fn capture_pads_the_final_chunk() {
        let data: Vec<f32> = (0..10).map(|i| i as f32 + 1.0).collect();
        let mut cap = AudioCapture::new(&data, 4, 4);

        assert_eq!(cap.next().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(cap.next().unwrap(), vec![5.0, 6.0, 7.0, 8.0]);
        assert!(cap.has_next());
        assert_eq!(cap.next().unwrap(), vec![9.0, 10.0, 0.0, 0.0]);
        assert!(!cap.has_next());
        assert!(cap.next().is_none());
    }

    #[test]
    fn capture_exact_fit_has_no_tail() {
        let data = vec![0.5f32; 8];
        let mut cap = AudioCapture::new(&data, 4, 4);
        assert!(cap.next().is_some());
        assert!(cap.next().is_some());
        assert!(!cap.has_next());
        assert!(cap.next().is_none());
    }

    #[test]
    fn capture_overlapping_chunks() {
        let data: Vec<f32> = (0..6).map(|i| i as f32).collect();
        let mut cap = AudioCapture::new(&data, 4, 2);
        assert_eq!(cap.next().unwrap(), vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(cap.next().unwrap(), vec![2.0, 3.0, 4.0, 5.0]);
        assert!(!cap.has_next());
    }

    #[test]
    fn wav_parse_smoke() {
        // Minimal 16-bit PCM mono WAV: 44-byte header + one sample.
        let mut wav = Vec::<u8>::new();
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(36u32 + 2).to_le_bytes());
        wav.extend_from_slice(b"WAVE");

        wav.extend_from_slice(b"fmt ");
        wav.extend_from_slice(&(16u32).to_le_bytes());
        wav.extend_from_slice(&(1u16).to_le_bytes()); // PCM
        wav.extend_from_slice(&(1u16).to_le_bytes()); // mono
        wav.extend_from_slice(&(16_000u32).to_le_bytes());
        wav.extend_from_slice(&(32_000u32).to_le_bytes());
        wav.extend_from_slice(&(2u16).to_le_bytes());
        wav.extend_from_slice(&(16u16).to_le_bytes());

        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&(2u32).to_le_bytes());
        wav.extend_from_slice(&(16384i16).to_le_bytes());

        let parsed = parse_wav_bytes(&wav).expect("parse wav");
        assert_eq!(parsed.sample_rate_hz, 16_000);
        assert_eq!(parsed.channels, 1);
        assert_eq!(parsed.samples_mono, vec![0.5]);
    }

    #[test]
    fn wav_rejects_garbage() {
        assert!(parse_wav_bytes(b"not a wav").is_err());
        let mut wav = vec![0u8; 64];
        wav[..4].copy_from_slice(b"RIFF");
        wav[8..12].copy_from_slice(b"WAVE");
        assert!(parse_wav_bytes(&wav).is_err());
    }
}
