use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use cepstra::audio::{parse_wav_bytes, AudioCapture};
use cepstra::params::{AsrProfile, KwsProfile};
use cepstra::quantize::QuantParams;

#[derive(Debug, Parser)]
#[command(name = "cepstra")]
#[command(about = "Fixed-point speech feature extraction front-end", long_about = None)]
struct Args {
    /// Path to a WAV file (16-bit PCM).
    #[arg(long)]
    audio: Option<PathBuf>,

    /// Read audio from stdin (WAV bytes).
    #[arg(long, default_value_t = false)]
    stdin: bool,

    /// Built-in model profile.
    #[arg(long, value_parser = ["asr", "kws"], default_value = "kws")]
    profile: String,

    /// Load the profile from a JSON file instead of the built-in one.
    #[arg(long)]
    profile_json: Option<PathBuf>,

    /// Input-tensor quantization scale (from the model's metadata).
    #[arg(long, default_value_t = 1.107164)]
    quant_scale: f32,

    /// Input-tensor quantization zero-point offset.
    #[arg(long, default_value_t = 95)]
    quant_offset: i32,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let modes = u32::from(args.audio.is_some()) + u32::from(args.stdin);
    if modes != 1 {
        anyhow::bail!("choose exactly one input mode: --audio or --stdin");
    }

    let bytes = if let Some(path) = &args.audio {
        std::fs::read(path).with_context(|| format!("read file {path:?}"))?
    } else {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("read stdin")?;
        buf
    };

    let wav = parse_wav_bytes(&bytes).context("parse wav")?;
    let quant = QuantParams {
        scale: args.quant_scale,
        offset: args.quant_offset,
    };

    match args.profile.as_str() {
        "asr" => run_asr(&args, &wav.samples_mono, wav.sample_rate_hz, quant),
        _ => run_kws(&args, &wav.samples_mono, wav.sample_rate_hz, quant),
    }
}

fn check_sample_rate(file_hz: u32, profile_hz: f32) -> Result<()> {
    anyhow::ensure!(
        file_hz == profile_hz as u32,
        "file sample rate {file_hz} Hz does not match the profile's {profile_hz} Hz \
         (sample-rate conversion is out of scope)"
    );
    Ok(())
}

fn run_asr(args: &Args, samples: &[f32], file_hz: u32, quant: QuantParams) -> Result<()> {
    let profile = match &args.profile_json {
        Some(path) => AsrProfile::from_path(path)?,
        None => AsrProfile::wav2letter(),
    };
    check_sample_rate(file_hz, profile.mfcc.sampling_freq)?;

    let mut preprocessor = profile.preprocessor();
    let mut capture = AudioCapture::new(samples, profile.samples_per_window, profile.window_stride);

    let mut buffer: Vec<i8> = Vec::new();
    let mut windows = 0usize;
    while let Some(chunk) = capture.next() {
        preprocessor
            .invoke(&chunk, quant, &mut buffer)
            .context("preprocess window")?;
        windows += 1;
        report_window(windows, &buffer);
    }
    eprintln!(
        "asr: {windows} windows of {} bytes from {} samples",
        buffer.len(),
        samples.len()
    );
    Ok(())
}

fn run_kws(args: &Args, samples: &[f32], file_hz: u32, quant: QuantParams) -> Result<()> {
    let profile = match &args.profile_json {
        Some(path) => KwsProfile::from_path(path)?,
        None => KwsProfile::ds_cnn(),
    };
    check_sample_rate(file_hz, profile.mfcc.sampling_freq)?;

    let mut preprocessor = profile.preprocessor();
    let mut capture = AudioCapture::new(samples, profile.samples_per_window, profile.window_stride);

    let mut buffer: Vec<i8> = Vec::new();
    let mut windows = 0usize;
    while let Some(chunk) = capture.next() {
        preprocessor
            .invoke(&chunk, quant, &mut buffer)
            .context("preprocess window")?;
        windows += 1;
        report_window(windows, &buffer);
    }
    eprintln!(
        "kws: {windows} windows of {} bytes from {} samples",
        buffer.len(),
        samples.len()
    );
    Ok(())
}

fn report_window(index: usize, buffer: &[i8]) {
    let (mut min, mut max) = (i8::MAX, i8::MIN);
    let mut sum = 0i64;
    for &v in buffer {
        min = min.min(v);
        max = max.max(v);
        sum += i64::from(v);
    }
    let mean = sum as f64 / buffer.len().max(1) as f64;
    eprintln!("window {index}: {} bytes, min {min} max {max} mean {mean:.2}", buffer.len());
}
