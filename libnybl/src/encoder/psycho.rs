//! Psychoacoustic masking model
//!
//! Produces a per-bin masking level in nepers for each sub-block. The level
//! is a contraharmonic mean in the log domain: importance is compared as
//! `ln(coef^3 / band_energy^2)`, so a bin standing clear of its critical
//! band scores high and a bin buried in band energy scores low. Sums run in
//! fixed point so the sliding windows stay cheap and deterministic.

use super::window::sub_blocks;

/// Compute masking levels for every bin of the (possibly decimated) block.
///
/// `buffer_amp2` holds squared coefficient amplitudes laid out sub-block by
/// sub-block; `masking_np` receives one level per bin. Silent sub-blocks
/// yield zeroed levels (their bins never produce keys).
pub fn calculate_masking(
    masking_np: &mut [f32],
    buffer_amp2: &[f32],
    window_ctrl: u8,
    block_size: usize,
) {
    let mut offset = 0;
    for (sub_size, _) in sub_blocks(window_ctrl, block_size) {
        mask_sub_block(
            &mut masking_np[offset..offset + sub_size],
            &buffer_amp2[offset..offset + sub_size],
        );
        offset += sub_size;
    }
}

fn mask_sub_block(masking_np: &mut [f32], amp2: &[f32]) {
    let n = amp2.len();

    // Normalization factor for the fixed-point precision scaling
    let mut peak = 0.0f32;
    for &v in amp2 {
        if v > peak {
            peak = v;
        }
    }
    if peak == 0.0 {
        masking_np.fill(0.0);
        return;
    }

    // Normalize the energy and convert to fixed point. The log scale is
    // chosen so that a sum over the widest analysis bandwidth still fits
    // a u32: (2^32/ln(2^32)) / (1 - 29/45), divided by the sub-block size.
    // Everything truncates; rounding could overflow.
    let norm = 4_294_967_296.0f32 / peak;
    let log_scale = 544_599_136.0f32 / n as f32;
    let mut energy = vec![0u32; n];
    let mut energy_np = vec![0u32; n];
    for i in 0..n {
        let v = amp2[i] * norm;
        energy_np[i] = if v <= 1.0 {
            0
        } else {
            (v.ln() * log_scale) as u32
        };
        // Q16 amplitude; clip, the square root can overflow the range
        let a = v.sqrt() * 65536.0;
        energy[i] = if a <= 1.0 {
            1
        } else if a >= 4_294_967_296.0 {
            u32::MAX
        } else {
            a as u32
        };
    }
    let norm_log = 0.333_333_328_366_279_6f32 * norm.ln();
    let inv_log_scale = -(n as f32) / (3.0 * 544_599_136.0);

    let log2_n = n.ilog2();

    // Two windows slide over the spectrum in fixed-point steps:
    // the main window [0.90625*n, 1.40625*n] accumulates amplitude-weighted
    // logs, the noise window [0.9375*n, 1.25*n] plain logs.
    let mut band_beg = 0usize;
    let mut band_end = 0usize;
    let mut sum = 0u64;
    let mut sum_w = 0u64;
    let mut noise_beg = 0usize;
    let mut noise_end = 0usize;
    let mut noise_sum = 0u32;
    for i in 0..n {
        // main window; at most one sample leaves per step
        let old = band_beg >> 5;
        band_beg += 29;
        let new = band_beg >> 5;
        if old < new {
            sum_w -= energy[old] as u64;
            sum -= energy[old] as u64 * energy_np[old] as u64;
        }
        let old = band_end >> 5;
        band_end += 45;
        let new = (band_end >> 5).min(n);
        for j in old..new {
            sum_w += energy[j] as u64;
            sum += energy[j] as u64 * energy_np[j] as u64;
        }

        // noise window, log sums only
        let old = noise_beg >> 4;
        noise_beg += 15;
        let new = noise_beg >> 4;
        if old < new {
            noise_sum = noise_sum.wrapping_sub(energy_np[old]);
        }
        let old = noise_end >> 4;
        noise_end += 20;
        let new = (noise_end >> 4).min(n);
        for j in old..new {
            noise_sum = noise_sum.wrapping_add(energy_np[j]);
        }

        let mut x = (sum / sum_w) as u32;
        x = x.wrapping_add(noise_sum >> log2_n);
        masking_np[i] = x as f32 * inv_log_scale + norm_log;
    }
}
