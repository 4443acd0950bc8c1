mod audio;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use libnybl_audio::{encode_stream_cbr, encode_stream_vbr, NyblMetadata, QualityPreset, Reader};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "renybl")]
#[command(version = "0.1.0")]
#[command(about = "nybl audio format converter", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode an audio file to nybl format
    Encode {
        /// Input audio file (mp3, wav, flac, ogg, etc.)
        input: PathBuf,
        /// Output nybl file
        output: PathBuf,
        /// Transform block size (power of two)
        #[arg(long, default_value = "2048")]
        block_size: usize,
        /// Quality level (low, medium, high, veryhigh, transparent)
        #[arg(long, default_value = "high")]
        quality: String,
        /// Target bitrate in kbps (switches to CBR, overrides quality)
        #[arg(long)]
        kbps: Option<f32>,
        /// Title metadata
        #[arg(long)]
        title: Option<String>,
        /// Artist metadata
        #[arg(long)]
        artist: Option<String>,
        /// Album metadata
        #[arg(long)]
        album: Option<String>,
    },
    /// Show information about a nybl file
    Info {
        /// Input nybl file
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Encode {
            input,
            output,
            block_size,
            quality,
            kbps,
            title,
            artist,
            album,
        } => encode(input, output, block_size, &quality, kbps, title, artist, album),
        Commands::Info { input } => info(input),
    }
}

#[allow(clippy::too_many_arguments)]
fn encode(
    input: PathBuf,
    output: PathBuf,
    block_size: usize,
    quality: &str,
    kbps: Option<f32>,
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
) -> Result<()> {
    let (samples, sample_rate, channels) = audio::read_audio_file(&input)?;
    println!(
        "Input: {} Hz, {} channel(s), {:.1}s",
        sample_rate,
        channels,
        samples.len() as f64 / channels as f64 / sample_rate as f64
    );

    let metadata = NyblMetadata {
        title,
        artist,
        album,
        comment: None,
    };
    let meta_opt = if metadata.is_empty() {
        None
    } else {
        Some(&metadata)
    };

    let encoded = if let Some(kbps) = kbps {
        println!("Encoding CBR at {} kbps, block size {}", kbps, block_size);
        encode_stream_cbr(
            &samples,
            sample_rate,
            channels as u8,
            block_size,
            kbps,
            meta_opt,
        )
    } else {
        let preset = parse_quality(quality)?;
        println!(
            "Encoding VBR at quality {:?}, block size {}",
            preset, block_size
        );
        encode_stream_vbr(
            &samples,
            sample_rate,
            channels as u8,
            block_size,
            preset.as_f32(),
            meta_opt,
        )
    }
    .map_err(|e| anyhow::anyhow!("Encoding failed: {}", e))?;

    let in_size = samples.len() * 2; // vs 16-bit PCM
    println!(
        "Wrote {} bytes ({:.1}x smaller than 16-bit PCM)",
        encoded.len(),
        in_size as f64 / encoded.len() as f64
    );
    fs::write(&output, &encoded).context("Failed to write output file")?;
    Ok(())
}

fn parse_quality(s: &str) -> Result<QualityPreset> {
    Ok(match s.to_ascii_lowercase().as_str() {
        "low" => QualityPreset::Low,
        "medium" => QualityPreset::Medium,
        "high" => QualityPreset::High,
        "veryhigh" => QualityPreset::VeryHigh,
        "transparent" => QualityPreset::Transparent,
        _ => bail!("Unknown quality preset: {} (use low, medium, high, veryhigh, transparent)", s),
    })
}

fn info(input: PathBuf) -> Result<()> {
    let data = fs::read(&input).context("Failed to read file")?;
    let file = Reader::new()
        .read(&data)
        .map_err(|e| anyhow::anyhow!("Not a valid nybl file: {}", e))?;
    let h = &file.header;

    let duration = h.total_samples as f64 / h.sample_rate as f64;
    let coded_bits: usize = file.blocks.iter().map(|b| b.bit_size).sum();
    let mean_kbps = if duration > 0.0 {
        coded_bits as f64 / duration / 1000.0
    } else {
        0.0
    };

    println!("nybl file: {}", input.display());
    println!("  version:     {}.{}", h.version_major, h.version_minor);
    println!("  sample rate: {} Hz", h.sample_rate);
    println!("  channels:    {}", h.channels);
    println!("  block size:  {}", h.block_size);
    println!("  duration:    {:.2}s ({} samples)", duration, h.total_samples);
    println!("  blocks:      {}", h.n_blocks);
    println!(
        "  mode:        {}",
        if h.flags & libnybl_audio::FLAG_CBR != 0 {
            "CBR"
        } else {
            "VBR"
        }
    );
    println!("  mean rate:   {:.1} kbps", mean_kbps);
    println!(
        "  crc:         {}",
        if file.crc_valid() { "ok" } else { "MISMATCH" }
    );

    if !file.metadata.is_empty() {
        if let Ok(meta) = NyblMetadata::from_json(&file.metadata) {
            if let Some(t) = meta.title {
                println!("  title:       {}", t);
            }
            if let Some(a) = meta.artist {
                println!("  artist:      {}", a);
            }
            if let Some(a) = meta.album {
                println!("  album:       {}", a);
            }
        }
    }
    Ok(())
}
