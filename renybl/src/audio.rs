//! Input decoding via symphonia

use anyhow::{bail, Context, Result};
use std::path::Path;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Read an audio file and return (samples, sample_rate, channels).
/// Samples are interleaved f32 in range [-1.0, 1.0].
pub fn read_audio_file(path: &Path) -> Result<(Vec<f32>, u32, usize)> {
    let file = std::fs::File::open(path).context("Failed to open audio file")?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("Unsupported audio format")?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("No decodable audio track found")?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create decoder")?;

    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(0);
    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(symphonia::core::errors::Error::ResetRequired) => break,
            Err(e) => bail!("Error reading packet: {}", e),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count();
                append_interleaved(&decoded, channels, &mut samples);
            }
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => bail!("Decode error: {}", e),
        }
    }

    if sample_rate == 0 || channels == 0 || samples.is_empty() {
        bail!("No audio data decoded");
    }
    Ok((samples, sample_rate, channels))
}

/// Interleave one decoded buffer onto the output
fn append_interleaved(decoded: &AudioBufferRef, channels: usize, out: &mut Vec<f32>) {
    macro_rules! interleave {
        ($buf:expr, $to_f32:expr) => {{
            let buf = $buf;
            let frames = buf.frames();
            out.reserve(frames * channels);
            for frame in 0..frames {
                for ch in 0..channels {
                    out.push($to_f32(buf.chan(ch)[frame]));
                }
            }
        }};
    }

    match decoded {
        AudioBufferRef::F32(buf) => interleave!(buf.as_ref(), |v: f32| v),
        AudioBufferRef::F64(buf) => interleave!(buf.as_ref(), |v: f64| v as f32),
        AudioBufferRef::S32(buf) => {
            interleave!(buf.as_ref(), |v: i32| v as f32 / i32::MAX as f32)
        }
        AudioBufferRef::S16(buf) => {
            interleave!(buf.as_ref(), |v: i16| v as f32 / i16::MAX as f32)
        }
        AudioBufferRef::U8(buf) => {
            interleave!(buf.as_ref(), |v: u8| (v as f32 - 128.0) / 128.0)
        }
        _ => {
            // remaining sample formats are rare in practice; decode as silence
            let frames = decoded.frames();
            out.extend(std::iter::repeat(0.0).take(frames * channels));
        }
    }
}
