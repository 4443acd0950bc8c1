//! Per-channel spectral analysis: log-domain conversion, quantizer-zone
//! layout, and perceptual key extraction.

use crate::core::{COEF_EPS, COEF_NEPER_OUT_OF_RANGE, MAX_QBANDS};

/// One candidate spectral bin, ranked for rate control by `weight`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisKey {
    pub band: u16,
    pub chan: u16,
    pub qband: u16,
    pub weight: f32,
}

/// Scale raw transform output by `2 / sub_block_size` and derive the
/// natural log of each magnitude, with a sentinel for values too small to
/// ever survive quantization.
pub fn scale_and_to_nepers(nepers: &mut [f32], coefs: &mut [f32]) {
    let scale = 2.0 / coefs.len() as f32;
    for (np, c) in nepers.iter_mut().zip(coefs.iter_mut()) {
        let v = *c * scale;
        *np = if v.abs() < 0.5 * COEF_EPS {
            COEF_NEPER_OUT_OF_RANGE
        } else {
            v.abs().ln()
        };
        *c = v;
    }
}

/// Masking equation weights; empirically tuned (30dB and 22dB in nepers)
const MASK_VAL_GAIN: f32 = 3.453_869_819_641_113_3;
const MASK_LEVEL_GAIN: f32 = 2.532_843_589_782_714_8;

/// Walk one channel's spectrum, grouping bins into quantizer zones whose
/// log-domain spread stays within `quant_range`, and emit one key per
/// codeable bin with its post-masking perceptual weight.
///
/// Channel 0's walk defines the zone boundaries (`quants_bw`); later
/// channels map their bins onto that shared layout so every key agrees on
/// where the zones sit.
#[allow(clippy::too_many_arguments)]
pub fn insert_keys(
    keys: &mut Vec<AnalysisKey>,
    coefs: &[f32],
    nepers: &[f32],
    masking_np: &[f32],
    chan: usize,
    analysis_power_np: f32,
    quant_range: f32,
    quants_bw: &mut Vec<u16>,
) {
    let block_size = coefs.len();
    if chan == 0 {
        quants_bw.clear();
    }

    let mut qband = 0usize;
    let mut qband_avg = 0.0f32;
    let mut qband_avg_w = 0.0f32;
    let mut zone_start = 0usize;
    // lookup cursor for channels reusing the channel-0 layout
    let mut zone_end = if chan == 0 {
        block_size
    } else {
        quants_bw.first().copied().unwrap_or(block_size as u16) as usize
    };

    for band in 0..block_size {
        if chan == 0 {
            let val_np = nepers[band];
            if val_np != COEF_NEPER_OUT_OF_RANGE {
                // Compare this bin against the zone's background level; when
                // it falls outside the allowed spread, open a new zone here.
                if (val_np + quant_range) * qband_avg_w < qband_avg
                    || (val_np - quant_range) * qband_avg_w > qband_avg
                {
                    if qband < MAX_QBANDS - 1 {
                        quants_bw.push((band - zone_start) as u16);
                        zone_start = band;
                        qband_avg = 0.0;
                        qband_avg_w = 0.0;
                        qband += 1;
                    }
                }
                let w = coefs[band] * coefs[band];
                qband_avg += w * val_np;
                qband_avg_w += w;
            }
        } else {
            while band >= zone_end && qband + 1 < quants_bw.len() {
                qband += 1;
                zone_end += quants_bw[qband] as usize;
            }
        }

        let val_np = nepers[band];
        if val_np == COEF_NEPER_OUT_OF_RANGE {
            continue;
        }

        // Post-masking importance. The gains are trial-and-error values
        // that consistently beat the plain 2*val - mask form.
        let val_np = MASK_VAL_GAIN * val_np - MASK_LEVEL_GAIN * masking_np[band];

        keys.push(AnalysisKey {
            band: band as u16,
            chan: chan as u16,
            qband: qband as u16,
            weight: (2.0 * val_np + analysis_power_np).exp(),
        });
    }

    if chan == 0 {
        quants_bw.push((block_size - zone_start) as u16);
    }
}

/// Order keys by descending perceptual weight. Stability keeps equal
/// weights in spectral order, which makes rate-control tie-breaks
/// deterministic.
pub fn sort_keys_by_weight(keys: &mut [AnalysisKey]) {
    keys.sort_by(|a, b| b.weight.total_cmp(&a.weight));
}

/// Order the surviving keys by `(chan << log2_block_size) | band` so the
/// coder can walk channels then bands sequentially.
pub fn sort_keys_by_position(keys: &mut [AnalysisKey], block_size: usize) {
    let shift = block_size.ilog2();
    keys.sort_by_key(|k| ((k.chan as u32) << shift) | k.band as u32);
}
