#![allow(dead_code)]

//! Reference decoder used by the round-trip tests.
//!
//! The product ships no decoder, so the tests carry a straightforward one:
//! parse the nybble stream back into quantized spectra, run the inverse
//! transform, and overlap-add with the same per-sub-block windows the
//! encoder applied. The quantizer-zone layout travels out of band (it is
//! encoder state, not bitstream content).

use libnybl_audio::core::{NybbleReader, PCM_SCALE, QUANTIZER_UNUSED};
use libnybl_audio::encoder::window::{overlap_scale, sub_blocks};
use libnybl_audio::Mdct;

/// One parsed block: window-control code plus per-channel reconstructed
/// (still frequency-domain) spectra
pub struct ParsedBlock {
    pub ctrl: u8,
    pub spectra: Vec<Vec<f32>>,
}

/// Parse one coded block given the zone layout the encoder used for it
pub fn parse_block(
    data: &[u8],
    n_chan: usize,
    block_size: usize,
    quants_bw: &[u16],
) -> ParsedBlock {
    let mut r = NybbleReader::new(data);
    let lo = r.next_nybble().expect("missing window control");
    let hi = r.next_nybble().expect("missing window control");
    let ctrl = lo | (hi << 4);
    let n_qbands = quants_bw.len();

    let mut spectra = Vec::with_capacity(n_chan);
    for _ in 0..n_chan {
        let quants: Vec<u8> = (0..n_qbands)
            .map(|_| r.next_nybble().expect("missing quantizer header"))
            .collect();
        let mut spec = vec![0.0f32; block_size];

        if quants.iter().all(|&q| q == QUANTIZER_UNUSED) {
            // bare terminator, nothing else for this channel
            assert_eq!(r.next_nybble(), Some(0x8), "expected stop code");
            assert_eq!(r.next_nybble(), Some(0x0), "expected stop code");
            spectra.push(spec);
            continue;
        }

        let mut tail_start = 0usize;
        let mut last_nz = 0usize;
        let mut q = 0usize;
        loop {
            while q < n_qbands && quants[q] == QUANTIZER_UNUSED {
                last_nz += quants_bw[q] as usize;
                q += 1;
            }
            if q >= n_qbands {
                break;
            }
            let mut pos = last_nz;
            let mut cur_q = q;
            let mut cur_end = last_nz + quants_bw[q] as usize;
            last_nz = cur_end;
            q += 1;
            while q < n_qbands && quants[q] != QUANTIZER_UNUSED {
                last_nz += quants_bw[q] as usize;
                q += 1;
            }
            let span_end = last_nz;

            while pos < span_end {
                let x = r.next_nybble().expect("stream truncated");
                if x == 0x8 {
                    let y = r.next_nybble().expect("stream truncated");
                    if y == 0x0 {
                        pos = span_end;
                    } else if y < 0xC {
                        pos += y as usize * 2 + 2;
                    } else {
                        let z = r.next_nybble().expect("stream truncated");
                        pos += 2 * ((((y - 0xC) as usize) << 4) | z as usize) + 26;
                    }
                } else {
                    while pos >= cur_end {
                        cur_q += 1;
                        cur_end += quants_bw[cur_q] as usize;
                    }
                    let v = if x >= 0x9 { x as i32 - 16 } else { x as i32 };
                    let step = (1u32 << quants[cur_q]) as f32;
                    spec[pos] = v as f32 * step;
                    pos += 1;
                }
            }
            tail_start = span_end;
        }

        // noise tail: amplitude nybble, then an 8-bit decay when active
        let noise_q = r.next_nybble().expect("missing noise tail") as f32;
        if noise_q != 0.0 {
            let d_hi = r.next_nybble().expect("missing decay") as u32;
            let d_lo = r.next_nybble().expect("missing decay") as u32;
            let dq = ((d_hi << 4) | d_lo) as f32;
            let step = quants
                .iter()
                .rev()
                .find(|&&qq| qq != QUANTIZER_UNUSED)
                .map(|&qq| (1u32 << qq) as f32)
                .unwrap_or(1.0);
            let mut amp = noise_q * noise_q * step / 4.0;
            let decay = (1.0 - dq * dq / 524_288.0).max(0.0);
            let mut sign = 1.0f32;
            for bin in spec.iter_mut().take(block_size).skip(tail_start) {
                *bin = amp * sign;
                amp *= decay;
                sign = -sign;
            }
        }

        spectra.push(spec);
    }

    ParsedBlock { ctrl, spectra }
}

/// Inverse transform + overlap-add of a whole parsed stream. Returns one
/// time-domain vector per channel, aligned with the encoder's input (the
/// final block is only complete if a flush block follows it).
pub fn synthesize(blocks: &[ParsedBlock], n_chan: usize, block_size: usize) -> Vec<Vec<f32>> {
    let mdct = Mdct::new(block_size);
    let total = blocks.len() * block_size;
    let mut out = vec![vec![0.0f32; total]; n_chan];

    for chan in 0..n_chan {
        let mut cursor = 0isize;
        // previous sub-block geometry for the shared transition
        let mut prev: Option<(usize, usize)> = None;
        for block in blocks {
            let mut offset = 0usize;
            for (n, transient) in sub_blocks(block.ctrl, block_size) {
                let o = if transient {
                    n >> overlap_scale(block.ctrl)
                } else {
                    n
                };
                let h = n / 2;
                let mut u = vec![0.0f32; n];
                mdct.inverse_sub_block(&block.spectra[chan][offset..offset + n], &mut u);
                // undo the 2/n coding scale and the PCM gain
                let gain = (n as f32 / 2.0) / PCM_SCALE;

                // second half of the fold reconstructs the previous
                // sub-block through its own window
                if let Some((np, op)) = prev {
                    let hp = np / 2;
                    let start = cursor - np as isize;
                    for j in 0..h.min(hp) {
                        let a = start + j as isize;
                        if a >= 0 {
                            out[chan][a as usize] +=
                                u[h + j] * Mdct::transition_window(np, op, j) * gain;
                        }
                        let b = start + (np - 1 - j) as isize;
                        if b >= 0 {
                            out[chan][b as usize] -=
                                u[h + j] * Mdct::transition_window(np, op, np - 1 - j) * gain;
                        }
                    }
                }

                // first half reconstructs this sub-block through its fall
                for j in 0..h {
                    let c = cursor + (h - 1 - j) as isize;
                    let d = cursor + (h + j) as isize;
                    if c >= 0 && (c as usize) < total {
                        out[chan][c as usize] -=
                            u[j] * Mdct::transition_window(n, o, h + j) * gain;
                    }
                    if d >= 0 && (d as usize) < total {
                        out[chan][d as usize] -=
                            u[j] * Mdct::transition_window(n, o, h - 1 - j) * gain;
                    }
                }

                prev = Some((n, o));
                cursor += n as isize;
                offset += n;
            }
        }
    }
    out
}

/// Normalized cross-correlation over a sample range
pub fn correlation(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let ea: f32 = a.iter().map(|x| x * x).sum();
    let eb: f32 = b.iter().map(|x| x * x).sum();
    if ea == 0.0 || eb == 0.0 {
        return 0.0;
    }
    dot / (ea.sqrt() * eb.sqrt())
}

/// Relative L2 error over a sample range
pub fn relative_error(reference: &[f32], decoded: &[f32]) -> f32 {
    let num: f32 = reference
        .iter()
        .zip(decoded)
        .map(|(x, y)| (x - y) * (x - y))
        .sum();
    let den: f32 = reference.iter().map(|x| x * x).sum();
    if den == 0.0 {
        return if num == 0.0 { 0.0 } else { f32::INFINITY };
    }
    (num / den).sqrt()
}
