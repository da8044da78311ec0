//! RGBE shared-exponent pixel codec.
//!
//! Each pixel is stored in 4 bytes: three 8-bit mantissas and one exponent biased by 128.
//! Decoding computes `mantissa * 2^(exponent - 136)`; an exponent byte of 0 is exact black.
//! Alpha is not stored, 4-channel pixels decode with alpha 1. Pixels at or above 2^127
//! saturate to exponent byte 255.
//!
//! Two implementations of the per-chunk kernels exist. The `reference` functions are
//! written for clarity, the default [`encode_chunk`]/[`decode_chunk`] use bit manipulation
//! and a lookup table and process fixed-width lanes so the compiler can vectorize them.
//! Decoding is exact integer math and both paths produce identical bits. Encoding may
//! differ by one mantissa step because the scale factor is rounded differently.

use std::io::{ErrorKind, Read, Write};

use crate::error::{IblError, Result};

/// Pixels per streaming chunk.
pub const CHUNK_PIXELS: usize = 4096;

/// Encoded bytes per streaming chunk (16 KiB).
pub const CHUNK_BYTES: usize = CHUNK_PIXELS * 4;

/// Channel maxima below this encode as exact black.
const BLACK_THRESHOLD: f32 = 1e-32;

const EXPONENT_BIAS: i32 = 128;

/// Channel maxima at or above this (2^127) need exponent byte 256 and saturate instead.
const SATURATION_THRESHOLD: f32 = 1.701_411_8e38;

/// Brightest pixel with the hue of `(r, g, b)` kept for the finite channels.
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn saturated_pixel(r: f32, g: f32, b: f32, max: f32) -> [u8; 4] {
    let channel = |c: f32| {
        if c >= max {
            255
        } else {
            (c / max * 255.0) as u8
        }
    };
    [channel(r), channel(g), channel(b), 255]
}

fn check_channels(channels: usize) -> Result<()> {
    if channels == 3 || channels == 4 {
        Ok(())
    } else {
        Err(IblError::InvalidChannels(channels))
    }
}

/// `2^(e - 136)` for every exponent byte, built from raw bits.
static DECODE_SCALE: [f32; 256] = decode_scale_table();

const fn decode_scale_table() -> [f32; 256] {
    let mut table = [0.0f32; 256];
    let mut e = 1;
    while e < 256 {
        // biased f32 exponent of 2^(e - 136) is e - 9
        let bits: u32 = if e >= 10 {
            ((e - 9) as u32) << 23
        } else {
            // subnormal: 2^(e - 136) = 2^-149 * 2^(e + 13)
            1u32 << (e + 13)
        };
        table[e] = f32::from_bits(bits);
        e += 1;
    }
    table
}

/// Splits a positive normal `x` into a fraction in [0.5, 1) and a power of two.
#[inline]
fn fast_frexp(x: f32) -> (f32, i32) {
    let bits = x.to_bits();
    #[allow(clippy::cast_possible_wrap)]
    let exp = ((bits >> 23) & 0xff) as i32 - 0x7e;
    let frac = f32::from_bits((bits & 0x807f_ffff) | 0x3f00_0000);
    (frac, exp)
}

#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn encode_pixel_fast(r: f32, g: f32, b: f32) -> [u8; 4] {
    let max = r.max(g).max(b);
    if max < BLACK_THRESHOLD {
        return [0; 4];
    }
    if max >= SATURATION_THRESHOLD {
        return saturated_pixel(r, g, b, max);
    }
    let (frac, exp) = fast_frexp(max);
    let f = frac * 256.0 / max;
    [
        (r * f) as u8,
        (g * f) as u8,
        (b * f) as u8,
        (exp + EXPONENT_BIAS) as u8,
    ]
}

/// Encodes `src` (3 or 4 channels per pixel) into `dst`, returning the number of bytes written.
///
/// # Panics
///
/// Panics if `channels` is not 3 or 4 or if `dst` is shorter than 4 bytes per pixel.
pub fn encode_chunk(channels: usize, src: &[f32], dst: &mut [u8]) -> usize {
    assert!(channels == 3 || channels == 4, "invalid channel count");
    let pixels = src.len() / channels;
    let dst = &mut dst[..pixels * 4];

    const LANES: usize = 8;
    let mut src_lanes = src.chunks_exact(channels * LANES);
    let mut dst_lanes = dst.chunks_exact_mut(4 * LANES);
    for (s, d) in (&mut src_lanes).zip(&mut dst_lanes) {
        for i in 0..LANES {
            let px = encode_pixel_fast(s[i * channels], s[i * channels + 1], s[i * channels + 2]);
            d[i * 4..i * 4 + 4].copy_from_slice(&px);
        }
    }
    for (s, d) in src_lanes
        .remainder()
        .chunks_exact(channels)
        .zip(dst_lanes.into_remainder().chunks_exact_mut(4))
    {
        d.copy_from_slice(&encode_pixel_fast(s[0], s[1], s[2]));
    }

    pixels * 4
}

/// Decodes RGBE bytes from `src` into `dst` with 3 or 4 channels, returning the number of
/// floats written. Trailing bytes that do not form a whole pixel are ignored.
///
/// # Panics
///
/// Panics if `channels` is not 3 or 4 or if `dst` is too short.
pub fn decode_chunk(channels: usize, src: &[u8], dst: &mut [f32]) -> usize {
    assert!(channels == 3 || channels == 4, "invalid channel count");
    let pixels = src.len() / 4;
    let dst = &mut dst[..pixels * channels];

    for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(channels)) {
        let scale = DECODE_SCALE[usize::from(s[3])];
        d[0] = f32::from(s[0]) * scale;
        d[1] = f32::from(s[1]) * scale;
        d[2] = f32::from(s[2]) * scale;
        if channels == 4 {
            d[3] = 1.0;
        }
    }

    pixels * channels
}

/// Portable per-pixel kernels kept as the reference for the fast path.
pub mod reference {
    use super::{saturated_pixel, BLACK_THRESHOLD, EXPONENT_BIAS, SATURATION_THRESHOLD};

    /// Splits `x > 0` into `(frac, exp)` with `x = frac * 2^exp` and `frac` in [0.5, 1).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn frexp(x: f32) -> (f32, i32) {
        let x = f64::from(x);
        let mut exp = x.log2().floor() as i32 + 1;
        let mut frac = x / 2f64.powi(exp);
        if frac >= 1.0 {
            frac /= 2.0;
            exp += 1;
        } else if frac < 0.5 {
            frac *= 2.0;
            exp -= 1;
        }
        (frac as f32, exp)
    }

    /// Returns `x * 2^exp`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn ldexp(x: f32, exp: i32) -> f32 {
        (f64::from(x) * 2f64.powi(exp)) as f32
    }

    /// Encodes one pixel.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn encode_pixel(r: f32, g: f32, b: f32) -> [u8; 4] {
        let max = r.max(g).max(b);
        if max < BLACK_THRESHOLD {
            return [0; 4];
        }
        if max >= SATURATION_THRESHOLD {
            return saturated_pixel(r, g, b, max);
        }
        let (frac, exp) = frexp(max);
        let f = frac * 256.0 / max;
        [
            (r * f) as u8,
            (g * f) as u8,
            (b * f) as u8,
            (exp + EXPONENT_BIAS) as u8,
        ]
    }

    /// Decodes one pixel.
    #[must_use]
    pub fn decode_pixel(rgbe: [u8; 4]) -> [f32; 3] {
        if rgbe[3] == 0 {
            return [0.0; 3];
        }
        let f = ldexp(1.0, i32::from(rgbe[3]) - (EXPONENT_BIAS + 8));
        [
            f32::from(rgbe[0]) * f,
            f32::from(rgbe[1]) * f,
            f32::from(rgbe[2]) * f,
        ]
    }

    /// Encodes a chunk one pixel at a time.
    pub fn encode_chunk(channels: usize, src: &[f32], dst: &mut [u8]) -> usize {
        let mut n = 0;
        for (s, d) in src.chunks_exact(channels).zip(dst.chunks_exact_mut(4)) {
            d.copy_from_slice(&encode_pixel(s[0], s[1], s[2]));
            n += 4;
        }
        n
    }

    /// Decodes a chunk one pixel at a time.
    pub fn decode_chunk(channels: usize, src: &[u8], dst: &mut [f32]) -> usize {
        let mut n = 0;
        for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(channels)) {
            let rgb = decode_pixel([s[0], s[1], s[2], s[3]]);
            d[..3].copy_from_slice(&rgb);
            if channels == 4 {
                d[3] = 1.0;
            }
            n += channels;
        }
        n
    }
}

/// Encodes `data` and returns the RGBE bytes.
///
/// # Errors
///
/// Returns [`IblError::InvalidChannels`] for unsupported channel counts and
/// [`IblError::SizeMismatch`] if `data` is not a whole number of pixels.
pub fn encode(data: &[f32], channels: usize) -> Result<Vec<u8>> {
    check_channels(channels)?;
    check_whole_pixels(data.len(), channels)?;
    let mut out = vec![0u8; data.len() / channels * 4];
    let n = encode_chunk(channels, data, &mut out);
    out.truncate(n);
    Ok(out)
}

fn check_whole_pixels(len: usize, channels: usize) -> Result<()> {
    if len % channels == 0 {
        Ok(())
    } else {
        Err(IblError::SizeMismatch {
            expected: len - len % channels + channels,
            actual: len,
        })
    }
}

/// Encodes `data` into `writer` one 16 KiB chunk at a time.
///
/// # Errors
///
/// Same as [`encode`], plus I/O errors from `writer`.
pub fn encode_to_writer<W: Write>(writer: &mut W, data: &[f32], channels: usize) -> Result<()> {
    check_channels(channels)?;
    check_whole_pixels(data.len(), channels)?;

    let mut buf = vec![0u8; CHUNK_BYTES];
    for chunk in data.chunks(CHUNK_PIXELS * channels) {
        let n = encode_chunk(channels, chunk, &mut buf);
        writer.write_all(&buf[..n])?;
    }
    Ok(())
}

/// Decodes a complete RGBE byte buffer.
///
/// # Errors
///
/// Returns [`IblError::InvalidChannels`] for unsupported channel counts and
/// [`IblError::DecodeTruncated`] if `data` is not a multiple of 4 bytes.
pub fn decode(data: &[u8], channels: usize) -> Result<Vec<f32>> {
    check_channels(channels)?;
    if data.len() % 4 != 0 {
        return Err(IblError::DecodeTruncated {
            expected: data.len() + 4 - data.len() % 4,
            actual: data.len(),
        });
    }
    let mut out = vec![0.0; data.len() / 4 * channels];
    let n = decode_chunk(channels, data, &mut out);
    out.truncate(n);
    Ok(out)
}

/// Reads until `buf` is full or the reader is exhausted, returning the bytes read.
pub(crate) fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Grows `out` so that it can hold `needed` more floats.
///
/// Capacity grows by 25% per step, or by four chunks while the buffer is still small,
/// so long streams do not reallocate once per chunk.
fn reserve_chunk(out: &mut Vec<f32>, needed: usize, chunk_floats: usize) {
    let cap = out.capacity();
    let required = out.len() + needed;
    if cap >= required {
        return;
    }
    let grown = (cap * 5 / 4).max(cap + 4 * chunk_floats).max(required);
    out.reserve_exact(grown - out.len());
}

/// Decodes an RGBE stream until the reader is exhausted.
///
/// # Errors
///
/// Returns [`IblError::DecodeTruncated`] if the stream ends inside a pixel, plus any I/O
/// error from `reader`.
pub fn decode_from_reader<R: Read>(reader: &mut R, channels: usize) -> Result<Vec<f32>> {
    check_channels(channels)?;

    let chunk_floats = CHUNK_PIXELS * channels;
    let mut buf = vec![0u8; CHUNK_BYTES];
    let mut out: Vec<f32> = Vec::with_capacity(chunk_floats);
    let mut total = 0;

    loop {
        let n = read_up_to(reader, &mut buf)?;
        total += n;
        if n % 4 != 0 {
            return Err(IblError::DecodeTruncated {
                expected: total + 4 - n % 4,
                actual: total,
            });
        }
        if n > 0 {
            let floats = n / 4 * channels;
            reserve_chunk(&mut out, floats, chunk_floats);
            let start = out.len();
            out.resize(start + floats, 0.0);
            decode_chunk(channels, &buf[..n], &mut out[start..]);
        }
        if n < CHUNK_BYTES {
            break;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::{Rng, SeedableRng};

    fn random_floats(n: usize, min: f32, max: f32, seed: u64) -> Vec<f32> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        (0..n).map(|_| rng.gen_range(min..max)).collect()
    }

    /// Upper bound of the quantization error for a pixel whose largest channel is `max`.
    fn quantization_bound(max: f32) -> f32 {
        let (_, exp) = reference::frexp(max.max(1e-30));
        reference::ldexp(1.0, exp - 8) * 1.0001
    }

    #[test]
    fn test_decode_scale_table_matches_ldexp() {
        for e in 1u8..=255 {
            let fast = DECODE_SCALE[usize::from(e)];
            let slow = reference::ldexp(1.0, i32::from(e) - 136);
            assert_eq!(fast.to_bits(), slow.to_bits(), "exponent {e}");
        }
    }

    #[test]
    fn test_frexp_matches_bit_version() {
        for x in [1.0f32, 0.5, 0.75, 3.0, 1e-30, 12345.678, f32::MAX / 2.0] {
            let (f0, e0) = reference::frexp(x);
            let (f1, e1) = fast_frexp(x);
            assert_eq!(e0, e1, "{x}");
            assert_eq!(f0.to_bits(), f1.to_bits(), "{x}");
            assert!((0.5..1.0).contains(&f0));
        }
    }

    #[test]
    fn test_black_is_exact() {
        let bytes = encode(&[0.0, 0.0, 0.0, 1e-35, 0.0, 1e-33], 3).unwrap();
        assert_eq!(bytes, vec![0; 8]);
        let back = decode(&bytes, 3).unwrap();
        assert!(back.iter().all(|&x| x.to_bits() == 0));
    }

    #[test]
    fn test_powers_of_two_are_exact() {
        let data = [1.0f32, 0.5, 0.25, 2.0, 4.0, 8.0, 0.125, 0.0, 0.0625];
        let back = decode(&encode(&data, 3).unwrap(), 3).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_huge_values_saturate() {
        let brightest = 255.0 * 2f32.powi(119);
        for max in [2f32.powi(127), f32::MAX, f32::INFINITY] {
            let bytes = encode(&[max, max / 2.0, 0.0], 3).unwrap();
            assert_eq!(bytes[3], 255);
            assert_eq!(reference::encode_pixel(max, max / 2.0, 0.0)[3], 255);
            let decoded = decode(&bytes, 3).unwrap();
            assert_eq!(decoded[0], brightest);
            assert!(decoded[1] >= 127.0 * 2f32.powi(119));
            assert_eq!(decoded[2], 0.0);
        }
        // just below the threshold keeps the regular encoding
        let below = f32::from_bits(2f32.powi(127).to_bits() - 1);
        assert_eq!(encode(&[below, 0.0, 0.0], 3).unwrap(), vec![255, 0, 0, 255]);
    }

    #[test]
    fn test_known_bytes() {
        assert_eq!(encode(&[1.0, 0.5, 0.0], 3).unwrap(), vec![128, 64, 0, 129]);
        assert_eq!(decode(&[128, 64, 0, 129], 3).unwrap(), vec![1.0, 0.5, 0.0]);
        assert_eq!(
            decode(&[128, 64, 0, 129], 4).unwrap(),
            vec![1.0, 0.5, 0.0, 1.0]
        );
    }

    #[test]
    fn test_reference_and_fast_decode_identical() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let bytes: Vec<u8> = (0..4 * 1000).map(|_| rng.gen()).collect();
        for channels in [3, 4] {
            let mut fast = vec![0.0; 1000 * channels];
            let mut slow = vec![0.0; 1000 * channels];
            assert_eq!(decode_chunk(channels, &bytes, &mut fast), 1000 * channels);
            assert_eq!(
                reference::decode_chunk(channels, &bytes, &mut slow),
                1000 * channels
            );
            for (a, b) in fast.iter().zip(&slow) {
                assert_eq!(a.to_bits(), b.to_bits());
            }
        }
    }

    #[test]
    fn test_reference_and_fast_encode_close() {
        let data = random_floats(3 * 1001, 0.0, 100.0, 11);
        let mut fast = vec![0u8; 1001 * 4];
        let mut slow = vec![0u8; 1001 * 4];
        encode_chunk(3, &data, &mut fast);
        reference::encode_chunk(3, &data, &mut slow);
        for (a, b) in fast.chunks(4).zip(slow.chunks(4)) {
            assert_eq!(a[3], b[3]);
            for c in 0..3 {
                assert!(a[c].abs_diff(b[c]) <= 1);
            }
        }
    }

    #[test]
    fn test_stream_matches_buffer() {
        // several chunks plus a partial one
        let data = random_floats(3 * (CHUNK_PIXELS * 3 + 123), 0.0, 100.0, 3);
        let mut stream = Vec::new();
        encode_to_writer(&mut stream, &data, 3).unwrap();
        let bytes = encode(&data, 3).unwrap();
        assert_eq!(stream, bytes);

        let from_reader = decode_from_reader(&mut stream.as_slice(), 3).unwrap();
        let from_buffer = decode(&bytes, 3).unwrap();
        assert_eq!(from_reader.len(), data.len());
        assert_eq!(from_reader, from_buffer);
    }

    #[test]
    fn test_stream_exact_chunk_multiple() {
        let data = random_floats(4 * CHUNK_PIXELS * 2, 0.0, 10.0, 5);
        let bytes = encode(&data, 4).unwrap();
        assert_eq!(bytes.len(), 2 * CHUNK_BYTES);
        let back = decode_from_reader(&mut bytes.as_slice(), 4).unwrap();
        assert_eq!(back.len(), data.len());
    }

    #[test]
    fn test_truncated_stream() {
        let bytes = encode(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3).unwrap();
        let err = decode_from_reader(&mut &bytes[..6], 3).unwrap_err();
        assert!(matches!(
            err,
            IblError::DecodeTruncated {
                expected: 8,
                actual: 6
            }
        ));
        assert!(matches!(
            decode(&bytes[..7], 3),
            Err(IblError::DecodeTruncated { .. })
        ));
    }

    #[test]
    fn test_invalid_input() {
        assert!(matches!(encode(&[1.0; 6], 2), Err(IblError::InvalidChannels(2))));
        assert!(matches!(
            encode(&[1.0; 7], 3),
            Err(IblError::SizeMismatch { .. })
        ));
        assert!(matches!(decode(&[0; 4], 5), Err(IblError::InvalidChannels(5))));
    }

    #[test]
    fn test_empty_stream() {
        let out = decode_from_reader(&mut std::io::empty(), 3).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_growth_policy() {
        let mut v: Vec<f32> = Vec::with_capacity(10);
        let before = v.capacity();
        reserve_chunk(&mut v, 8, 10);
        assert_eq!(v.capacity(), before);
        reserve_chunk(&mut v, 11, 10);
        assert!(v.capacity() >= 50);
    }

    proptest! {
        #[test]
        fn prop_round_trip_within_quantization(
            pixels in proptest::collection::vec(proptest::array::uniform3(0.0f32..1000.0), 1..64),
            alpha in proptest::bool::ANY,
        ) {
            let channels = if alpha { 4 } else { 3 };
            let data: Vec<f32> = pixels
                .iter()
                .flat_map(|p| {
                    let mut v = p.to_vec();
                    if alpha {
                        v.push(1.0);
                    }
                    v
                })
                .collect();
            let back = decode(&encode(&data, channels).unwrap(), channels).unwrap();
            prop_assert_eq!(back.len(), data.len());
            for (src, dst) in data.chunks(channels).zip(back.chunks(channels)) {
                let max = src[0].max(src[1]).max(src[2]);
                let bound = quantization_bound(max);
                for c in 0..3 {
                    prop_assert!((src[c] - dst[c]).abs() <= bound, "{} vs {}", src[c], dst[c]);
                }
            }
        }

        #[test]
        fn prop_decode_is_idempotent_after_one_pass(pixels in proptest::collection::vec(0.0f32..50.0, 3..300)) {
            let n = pixels.len() / 3 * 3;
            let data = &pixels[..n];
            let once = decode(&encode(data, 3).unwrap(), 3).unwrap();
            let twice = decode(&encode(&once, 3).unwrap(), 3).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
