//! Nybble-exact checks of the block emitter

use libnybl_audio::core::{NybbleReader, NybbleWriter, MAX_QBANDS};
use libnybl_audio::encoder::emit::encode_block_payload;
use libnybl_audio::encoder::transform::AnalysisKey;

fn key(chan: u16, band: u16, qband: u16) -> AnalysisKey {
    AnalysisKey {
        band,
        chan,
        qband,
        weight: 1.0,
    }
}

fn nybbles_of(data: &[u8], n: usize) -> Vec<u8> {
    let mut r = NybbleReader::new(data);
    (0..n).map(|_| r.next_nybble().unwrap()).collect()
}

#[test]
fn test_long_zero_run_uses_three_nybble_escape() {
    let block_size = 128;
    let mut coefs = vec![0.0f32; block_size];
    coefs[0] = 112.0; // quantizes to +7 at step 16
    coefs[100] = -48.0; // quantizes to -3

    let mut quants = vec![0u8; MAX_QBANDS];
    quants[0] = 4; // step 16
    let quants_bw = vec![block_size as u16];
    let keys = vec![key(0, 0, 0), key(0, 100, 0)];
    let noise_pairs = vec![Vec::new()];

    let mut writer = NybbleWriter::new();
    let result = encode_block_payload(
        &mut writer,
        0x10,
        &keys,
        &coefs,
        &quants,
        &quants_bw,
        1,
        1,
        block_size,
        &noise_pairs,
    );

    // ctrl, header, +7, escape run of 98 zeros (8h,Eh,4h), a left-over
    // zero, -3, stop, empty noise tail
    let expected = vec![0x0, 0x1, 0x4, 0x7, 0x8, 0xE, 0x4, 0x0, 0xD, 0x8, 0x0, 0x0];
    assert_eq!(result.bit_size, expected.len() * 4);
    assert_eq!(nybbles_of(writer.as_bytes(), expected.len()), expected);
    assert_eq!(result.n_nz_coded, 2);
}

#[test]
fn test_short_zero_run_uses_two_nybble_escape() {
    let block_size = 64;
    let mut coefs = vec![0.0f32; block_size];
    coefs[0] = 2.0; // +2 at step 1
    coefs[11] = 3.0; // +3, ten zeros in between

    let mut quants = vec![0u8; MAX_QBANDS];
    quants[0] = 0; // step 1
    let quants_bw = vec![block_size as u16];
    let keys = vec![key(0, 0, 0), key(0, 11, 0)];
    let noise_pairs = vec![Vec::new()];

    let mut writer = NybbleWriter::new();
    encode_block_payload(
        &mut writer,
        0x10,
        &keys,
        &coefs,
        &quants,
        &quants_bw,
        1,
        1,
        block_size,
        &noise_pairs,
    );

    // run of 10 zeros: 8h then (10-2)/2 = 4h, which restores 4*2+2 = 10
    let nybbles = nybbles_of(writer.as_bytes(), 7);
    assert_eq!(nybbles, vec![0x0, 0x1, 0x0, 0x2, 0x8, 0x4, 0x3]);
}

#[test]
fn test_gap_under_four_zeros_coded_inline() {
    let block_size = 64;
    let mut coefs = vec![0.0f32; block_size];
    coefs[0] = 1.0;
    coefs[3] = 2.0; // two zeros in between stay inline

    let mut quants = vec![0u8; MAX_QBANDS];
    quants[0] = 0;
    let quants_bw = vec![block_size as u16];
    let keys = vec![key(0, 0, 0), key(0, 3, 0)];
    let noise_pairs = vec![Vec::new()];

    let mut writer = NybbleWriter::new();
    encode_block_payload(
        &mut writer,
        0x10,
        &keys,
        &coefs,
        &quants,
        &quants_bw,
        1,
        1,
        block_size,
        &noise_pairs,
    );

    let nybbles = nybbles_of(writer.as_bytes(), 7);
    assert_eq!(nybbles, vec![0x0, 0x1, 0x0, 0x1, 0x0, 0x0, 0x2]);
}

#[test]
fn test_unused_leading_zone_skipped_without_output() {
    let block_size = 64;
    let mut coefs = vec![0.0f32; block_size];
    coefs[32] = 5.0;

    let mut quants = vec![0u8; MAX_QBANDS];
    quants[0] = 0xF; // first zone unused
    quants[1] = 0; // second zone carries the coefficient
    let quants_bw = vec![32u16, 32u16];
    let keys = vec![key(0, 32, 1)];
    let noise_pairs = vec![Vec::new()];

    let mut writer = NybbleWriter::new();
    let result = encode_block_payload(
        &mut writer,
        0x10,
        &keys,
        &coefs,
        &quants,
        &quants_bw,
        2,
        1,
        block_size,
        &noise_pairs,
    );

    // ctrl, two header nybbles, then immediately the coefficient at the
    // zone boundary, stop, noise tail
    let nybbles = nybbles_of(writer.as_bytes(), 8);
    assert_eq!(nybbles, vec![0x0, 0x1, 0xF, 0x0, 0x5, 0x8, 0x0, 0x0]);
    assert_eq!(result.n_nz_coded, 1);
}

#[test]
fn test_trailing_single_zero_uses_plain_nybble() {
    let block_size = 64;
    let mut coefs = vec![0.0f32; block_size];
    coefs[62] = 4.0; // one bin left after it

    let mut quants = vec![0u8; MAX_QBANDS];
    quants[0] = 0;
    let quants_bw = vec![block_size as u16];
    let keys = vec![key(0, 62, 0)];
    let noise_pairs = vec![Vec::new()];

    let mut writer = NybbleWriter::new();
    encode_block_payload(
        &mut writer,
        0x10,
        &keys,
        &coefs,
        &quants,
        &quants_bw,
        1,
        1,
        block_size,
        &noise_pairs,
    );

    // run of 62 zeros: escape (8h,Dh,2h) covers 2*18+26 = 62, then +4,
    // then the single trailing zero as a bare 0h, then the noise tail
    let nybbles = nybbles_of(writer.as_bytes(), 9);
    assert_eq!(nybbles, vec![0x0, 0x1, 0x0, 0x8, 0xD, 0x2, 0x4, 0x0, 0x0]);
}
