//! Block encoder
//!
//! Couples the transient-controlled transform, the masking model, and the
//! rate-controlled nybble coder into the per-block encoding pipeline.

pub mod emit;
pub mod noise_fill;
pub mod psycho;
pub mod quants;
pub mod transform;
pub mod window;

use crate::core::{max_coding_kbps, NybbleWriter, MAX_QBANDS, PCM_SCALE};
use crate::mdct::{LapBuffer, Mdct};
use crate::NyblResult;
use transform::AnalysisKey;

/// Per-channel analysis weight decay; later channels matter a little less
const POWER_DECAY: f32 = 0.75;

/// Half the dynamic range of the quantized coefficients, in nepers:
/// ln((2*7)^2 / 2), about 39.8 dB
const QUANT_RANGE_NP: f32 = 4.584_999_859_333_038;

/// One encoded block: packed nybble stream plus accounting
#[derive(Debug, Clone)]
pub struct EncodedBlock {
    /// Packed bitstream, window-control byte first
    pub data: Vec<u8>,
    /// Exact coded length in bits
    pub bit_size: usize,
    /// Coefficients that survived with a non-zero code
    pub n_nz_coded: usize,
}

/// Quality presets for VBR encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityPreset {
    /// Lowest quality, speech and low bandwidth
    Low,
    /// General music
    Medium,
    /// Quality-conscious listening
    High,
    /// Near-transparent for most content
    VeryHigh,
    /// Perceptually lossless for almost all content
    Transparent,
}

impl QualityPreset {
    /// Numeric quality value (0.0-1.0)
    pub fn as_f32(self) -> f32 {
        match self {
            QualityPreset::Low => 0.1,
            QualityPreset::Medium => 0.25,
            QualityPreset::High => 0.4,
            QualityPreset::VeryHigh => 0.6,
            QualityPreset::Transparent => 1.0,
        }
    }

    /// Create from a numeric value
    pub fn from_f32(quality: f32) -> Self {
        if quality < 0.175 {
            QualityPreset::Low
        } else if quality < 0.325 {
            QualityPreset::Medium
        } else if quality < 0.5 {
            QualityPreset::High
        } else if quality < 0.8 {
            QualityPreset::VeryHigh
        } else {
            QualityPreset::Transparent
        }
    }
}

/// Streaming block encoder.
///
/// All working memory is laid out at construction; `encode_block_cbr` /
/// `encode_block_vbr` reuse it and carry the lapped-transform and
/// transient-detector state across calls. One encoder serves one stream;
/// parallel streams each get their own.
pub struct Encoder {
    rate_hz: u32,
    n_chan: usize,
    block_size: usize,

    mdct: Mdct,
    window: window::WindowController,

    /// Previous block's raw input, channel-major; the transient detector
    /// looks across the block boundary
    sample_buffer: Vec<f32>,
    /// Current block's scaled MDCT output, channel-major
    transform_buffer: Vec<f32>,
    /// ln|coef| per bin, with the out-of-range sentinel
    transform_nepers: Vec<f32>,
    /// Lapped-transform carry, one per channel
    fwd_lap: Vec<LapBuffer>,
    /// Scratch block
    transform_temp: Vec<f32>,
    /// Masking curve scratch
    masking_np: Vec<f32>,
    /// Noise-floor pairs per channel for the tail coder
    noise_pairs: Vec<Vec<(f32, f32)>>,

    window_ctrl: u8,
    this_overlap: usize,

    analysis_keys: Vec<AnalysisKey>,
    survivors: Vec<AnalysisKey>,
    quants: Vec<u8>,
    quants_bw: Vec<u16>,
    writer: NybbleWriter,
}

impl Encoder {
    /// Create an encoder for one stream.
    ///
    /// `block_size` must be a power of two in `64..=8192`; `n_chan` at
    /// least 1. Input blocks are channel-major f32 in ±1.0.
    pub fn new(rate_hz: u32, n_chan: usize, block_size: usize) -> NyblResult<Self> {
        if rate_hz == 0 {
            return Err("Sample rate must be non-zero".to_string());
        }
        if n_chan < 1 || n_chan > 32 {
            return Err(format!("Unsupported channel count: {}", n_chan));
        }
        if !block_size.is_power_of_two() || !(64..=8192).contains(&block_size) {
            return Err(format!(
                "Block size must be a power of two in 64..=8192, got {}",
                block_size
            ));
        }

        Ok(Self {
            rate_hz,
            n_chan,
            block_size,
            mdct: Mdct::new(block_size),
            window: window::WindowController::new(block_size, rate_hz),
            sample_buffer: vec![0.0; n_chan * block_size],
            transform_buffer: vec![0.0; n_chan * block_size],
            transform_nepers: vec![0.0; n_chan * block_size],
            fwd_lap: (0..n_chan).map(|_| LapBuffer::new(block_size / 2)).collect(),
            transform_temp: vec![0.0; n_chan.max(2) * block_size],
            masking_np: vec![0.0; block_size],
            noise_pairs: vec![Vec::new(); n_chan],
            window_ctrl: 0x10,
            this_overlap: block_size,
            analysis_keys: Vec::with_capacity(n_chan * block_size),
            survivors: Vec::with_capacity(n_chan * block_size),
            quants: vec![0; n_chan * MAX_QBANDS],
            quants_bw: Vec::with_capacity(MAX_QBANDS),
            writer: NybbleWriter::new(),
        })
    }

    pub fn rate_hz(&self) -> u32 {
        self.rate_hz
    }

    pub fn channels(&self) -> usize {
        self.n_chan
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Window-control code chosen for the most recent block
    pub fn window_ctrl(&self) -> u8 {
        self.window_ctrl
    }

    /// Transition length, in samples, applied to the most recent block's
    /// transient sub-block
    pub fn overlap_samples(&self) -> usize {
        self.this_overlap
    }

    /// Quantizer-zone widths of the most recent block; they sum to the
    /// block size
    pub fn quants_bw(&self) -> &[u16] {
        &self.quants_bw
    }

    /// Drop all cross-block state (lap, transient filter, history)
    pub fn reset(&mut self) {
        self.sample_buffer.fill(0.0);
        for lap in &mut self.fwd_lap {
            lap.clear();
        }
        self.window.reset();
        self.window_ctrl = 0x10;
        self.this_overlap = self.block_size;
    }

    /// Encode one block against a bit budget. The emitted size lands at or
    /// just below `rate_kbps * block_size / rate_hz * 1000` bits whenever
    /// the budget is reachable.
    pub fn encode_block_cbr(&mut self, src: &[f32], rate_kbps: f32) -> NyblResult<EncodedBlock> {
        let n_keys = self.analyze_block(src, rate_kbps)?;
        let target_bits =
            rate_kbps * 1000.0 * self.block_size as f32 / self.rate_hz as f32;

        // binary-search the survivor count; coded size grows with it
        let mut lo = 0usize;
        let mut hi = n_keys;
        let mut best = 0usize;
        while lo <= hi {
            let mid = (lo + hi) / 2;
            let trial = self.emit_trial(mid);
            if (trial.bit_size as f32) <= target_bits {
                best = mid;
                if mid == hi {
                    break;
                }
                lo = mid + 1;
            } else {
                if mid == 0 {
                    break;
                }
                hi = mid - 1;
            }
        }

        let result = self.emit_trial(best);
        Ok(self.take_block(result))
    }

    /// Encode one block at a quality target in `[0, 1]`: the fraction of
    /// analysis keys that survive rate control.
    pub fn encode_block_vbr(&mut self, src: &[f32], quality: f32) -> NyblResult<EncodedBlock> {
        let quality = quality.clamp(0.0, 1.0);
        let rate_kbps =
            quality * max_coding_kbps(self.n_chan, self.block_size, self.rate_hz);
        let n_keys = self.analyze_block(src, rate_kbps)?;
        let n_nz_max = (quality * n_keys as f32).round() as usize;
        let result = self.emit_trial(n_nz_max);
        Ok(self.take_block(result))
    }

    fn take_block(&mut self, result: emit::EmitResult) -> EncodedBlock {
        let writer = std::mem::take(&mut self.writer);
        let (data, bit_size) = writer.into_bytes();
        debug_assert_eq!(bit_size, result.bit_size);
        EncodedBlock {
            data,
            bit_size,
            n_nz_coded: result.n_nz_coded,
        }
    }

    /// Transform and analyze one input block, filling the key list.
    /// Returns the number of keys.
    fn analyze_block(&mut self, src: &[f32], rate_kbps: f32) -> NyblResult<usize> {
        let bs = self.block_size;
        let n_chan = self.n_chan;
        if src.len() != n_chan * bs {
            return Err(format!(
                "Input block must hold {} samples ({} channels x {}), got {}",
                n_chan * bs,
                n_chan,
                bs,
                src.len()
            ));
        }

        // window control for this block, from the boundary-spanning data
        let ctrl = self.window.next_window_ctrl(
            src,
            &self.sample_buffer,
            n_chan,
            &mut self.transform_temp[..bs / 2],
        );
        self.window_ctrl = ctrl;
        self.this_overlap = bs >> window::overlap_scale(ctrl);

        // allowed log-domain spread inside one quantizer zone; cheap rates
        // get wider zones to keep the header small
        let ceiling = max_coding_kbps(n_chan, bs, self.rate_hz);
        let quant_range = QUANT_RANGE_NP * (2.0 - rate_kbps / ceiling).max(1.0);

        self.analysis_keys.clear();
        let mut analysis_power_np = 0.0f32;
        let power_decay_np = POWER_DECAY.ln();
        for chan in 0..n_chan {
            // PCM-scale the channel and transform each sub-block; the
            // transient sub-block gets the shortened transition
            for (tmp, &s) in self.transform_temp[..bs]
                .iter_mut()
                .zip(&src[chan * bs..(chan + 1) * bs])
            {
                *tmp = s * PCM_SCALE;
            }
            let coefs = &mut self.transform_buffer[chan * bs..(chan + 1) * bs];
            let mut offset = 0;
            for (sub, transient) in window::sub_blocks(ctrl, bs) {
                let overlap = if transient {
                    sub >> window::overlap_scale(ctrl)
                } else {
                    sub
                };
                self.mdct.forward_sub_block(
                    &self.transform_temp[offset..offset + sub],
                    &mut self.fwd_lap[chan],
                    overlap,
                    &mut coefs[offset..offset + sub],
                );
                offset += sub;
            }

            // log-domain copy, per sub-block scaling
            let nepers = &mut self.transform_nepers[chan * bs..(chan + 1) * bs];
            let mut offset = 0;
            for (sub, _) in window::sub_blocks(ctrl, bs) {
                transform::scale_and_to_nepers(
                    &mut nepers[offset..offset + sub],
                    &mut coefs[offset..offset + sub],
                );
                offset += sub;
            }

            // masking over the squared spectrum
            for (tmp, &c) in self.transform_temp[..bs].iter_mut().zip(coefs.iter()) {
                *tmp = c * c;
            }
            psycho::calculate_masking(&mut self.masking_np, &self.transform_temp[..bs], ctrl, bs);

            // noise floor for the tail coder
            self.noise_pairs[chan] =
                noise_fill::noise_log_spectrum(&self.transform_temp[..bs], self.rate_hz);

            transform::insert_keys(
                &mut self.analysis_keys,
                coefs,
                nepers,
                &self.masking_np,
                chan,
                analysis_power_np,
                quant_range,
                &mut self.quants_bw,
            );
            analysis_power_np += power_decay_np;
        }

        transform::sort_keys_by_weight(&mut self.analysis_keys);

        // history for the next block's transient analysis
        self.sample_buffer.copy_from_slice(src);

        Ok(self.analysis_keys.len())
    }

    /// Re-quantize and emit the block with the top `n_nz_max` keys
    fn emit_trial(&mut self, n_nz_max: usize) -> emit::EmitResult {
        let n = n_nz_max.min(self.analysis_keys.len());
        self.survivors.clear();
        self.survivors.extend_from_slice(&self.analysis_keys[..n]);
        transform::sort_keys_by_position(&mut self.survivors, self.block_size);

        quants::build_quants(
            &mut self.quants,
            &self.survivors,
            &self.transform_nepers,
            self.block_size,
            self.n_chan,
            self.quants_bw.len(),
        );

        self.writer.clear();
        emit::encode_block_payload(
            &mut self.writer,
            self.window_ctrl,
            &self.survivors,
            &self.transform_buffer,
            &self.quants,
            &self.quants_bw,
            self.quants_bw.len(),
            self.n_chan,
            self.block_size,
            &self.noise_pairs,
        )
    }
}
