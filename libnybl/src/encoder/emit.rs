//! Nybble-stream emission of one coded block

use super::noise_fill::hf_extension_params;
use super::transform::AnalysisKey;
use crate::core::{NybbleWriter, MAX_QBANDS, QUANTIZER_UNUSED};

/// Outcome of emitting one block
#[derive(Debug, Clone, Copy)]
pub struct EmitResult {
    pub bit_size: usize,
    pub n_nz_coded: usize,
}

/// Emit the window-control byte, then per channel the quantizer header,
/// the coefficient stream with zero-run escapes, the stop code, and the
/// noise tail. `keys` are the surviving keys sorted by (chan, band).
#[allow(clippy::too_many_arguments)]
pub fn encode_block_payload(
    writer: &mut NybbleWriter,
    window_ctrl: u8,
    keys: &[AnalysisKey],
    coefs: &[f32],
    quants: &[u8],
    quants_bw: &[u16],
    n_qbands: usize,
    n_chan: usize,
    block_size: usize,
    noise_pairs: &[Vec<(f32, f32)>],
) -> EmitResult {
    writer.push_nybble(window_ctrl & 0xF);
    writer.push_nybble(window_ctrl >> 4);

    let mut n_nz_coded = 0usize;
    let mut key_idx = 0usize;
    for chan in 0..n_chan {
        let chan_quants = &quants[chan * MAX_QBANDS..chan * MAX_QBANDS + n_qbands];
        let chan_coefs = &coefs[chan * block_size..(chan + 1) * block_size];

        // quantizer header, one nybble per zone
        for q in 0..n_qbands {
            writer.push_nybble(chan_quants[q]);
        }

        // walk contiguous spans of used zones
        let mut spans = 0usize;
        let mut tail_start = 0usize;
        let mut last_nz = 0usize;
        let mut nxt_q = 0usize;
        loop {
            while nxt_q < n_qbands && chan_quants[nxt_q] == QUANTIZER_UNUSED {
                last_nz += quants_bw[nxt_q] as usize;
                nxt_q += 1;
            }
            if nxt_q >= n_qbands {
                break;
            }
            let mut next_nz = last_nz;
            last_nz += quants_bw[nxt_q] as usize;
            let mut cur_q = nxt_q;
            let mut cur_end = last_nz;
            nxt_q += 1;
            while nxt_q < n_qbands && chan_quants[nxt_q] != QUANTIZER_UNUSED {
                last_nz += quants_bw[nxt_q] as usize;
                nxt_q += 1;
            }
            spans += 1;

            while key_idx < keys.len() {
                let key = &keys[key_idx];
                if key.chan as usize != chan {
                    break;
                }
                let t_band = key.band as usize;
                if t_band >= last_nz {
                    break;
                }
                if t_band < next_nz {
                    // key in a zone that fell out of use (its survivors all
                    // carried underflowed weights); nothing to code
                    key_idx += 1;
                    continue;
                }

                // Zero runs of 4+ take the escape codes; shorter gaps fall
                // through to the coefficient loop below, where skipped bins
                // usually quantize to 0h anyway and cost the same.
                let mut zr = t_band - next_nz;
                while zr >= 4 {
                    let advanced = if zr < 26 {
                        let n = (zr - 2) / 2;
                        writer.push_nybble(0x8);
                        writer.push_nybble(n as u8);
                        n * 2 + 2
                    } else {
                        let n = ((zr - 26) / 2).min(0x3F);
                        writer.push_nybble(0x8);
                        writer.push_nybble(0xC + (n >> 4) as u8);
                        writer.push_nybble((n & 0xF) as u8);
                        n * 2 + 26
                    };
                    next_nz += advanced;
                    zr -= advanced;
                }

                // Code every bin up to and including the keyed one; bins
                // the run coding left behind are quantized as-is.
                loop {
                    if next_nz >= cur_end {
                        cur_q += 1;
                        cur_end += quants_bw[cur_q] as usize;
                    }
                    let step = (1u32 << chan_quants[cur_q]) as f32;
                    let qn = (chan_coefs[next_nz] / step).round().clamp(-7.0, 7.0) as i32;
                    writer.push_nybble((qn & 0xF) as u8);
                    if qn != 0 {
                        n_nz_coded += 1;
                    }
                    next_nz += 1;
                    if next_nz > t_band {
                        break;
                    }
                }
                key_idx += 1;
            }

            // close out the span (8h,0h: stop); a span ending exactly on
            // its last coded bin needs nothing
            let n = last_nz - next_nz;
            if n == 1 {
                writer.push_nybble(0x0);
            } else if n >= 2 {
                writer.push_nybble(0x8);
                writer.push_nybble(0x0);
            }
            tail_start = last_nz;
        }

        // drop any keys left in zones that fell out of use before moving on
        while key_idx < keys.len() && keys[key_idx].chan as usize == chan {
            key_idx += 1;
        }

        if spans == 0 {
            // no coded zones at all; terminate the channel explicitly
            writer.push_nybble(0x8);
            writer.push_nybble(0x0);
            continue;
        }

        // Noise tail: amplitude (0 = silent fill) and, when active, an
        // 8-bit exponential decay for the synthesized spectrum
        let noise_step = last_used_step(chan_quants, n_qbands);
        let (noise_q, noise_decay) =
            hf_extension_params(&noise_pairs[chan], tail_start, 1.0 / noise_step);
        writer.push_nybble(noise_q);
        if noise_q != 0 {
            writer.push_nybble(noise_decay >> 4);
            writer.push_nybble(noise_decay & 0xF);
        }
    }

    EmitResult {
        bit_size: writer.bit_size(),
        n_nz_coded,
    }
}

/// Linear step of the last used zone; the noise amplitude is coded
/// relative to it
fn last_used_step(chan_quants: &[u8], n_qbands: usize) -> f32 {
    for q in (0..n_qbands).rev() {
        if chan_quants[q] != QUANTIZER_UNUSED {
            return (1u32 << chan_quants[q]) as f32;
        }
    }
    1.0
}
