//! Row-level pixel conversions between bitmap stores and the RGBA working
//! layout. All alpha math runs on RGBA rows (alpha at byte 3).

use crate::types::PixelFormat;

// === Channel order ===

/// Convert one row of `format` pixels into RGBA.
///
/// `dst` must hold `width * 4` bytes and `src` `width * bpp` bytes.
pub(crate) fn row_to_rgba(format: PixelFormat, src: &[u8], dst: &mut [u8]) {
    match format {
        PixelFormat::Rgba => dst.copy_from_slice(src),
        PixelFormat::Bgra => {
            for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
                d.copy_from_slice(&[s[2], s[1], s[0], s[3]]);
            }
        }
        PixelFormat::Argb => {
            for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
                d.copy_from_slice(&[s[1], s[2], s[3], s[0]]);
            }
        }
        PixelFormat::Rgb => {
            for (s, d) in src.chunks_exact(3).zip(dst.chunks_exact_mut(4)) {
                d.copy_from_slice(&[s[0], s[1], s[2], 0xFF]);
            }
        }
        PixelFormat::Bgr => {
            for (s, d) in src.chunks_exact(3).zip(dst.chunks_exact_mut(4)) {
                d.copy_from_slice(&[s[2], s[1], s[0], 0xFF]);
            }
        }
        PixelFormat::Unsupported => {}
    }
}

/// Convert one RGBA row into `format` pixels. Alpha is dropped for 3-byte formats.
pub(crate) fn row_from_rgba(format: PixelFormat, src: &[u8], dst: &mut [u8]) {
    match format {
        PixelFormat::Rgba => dst.copy_from_slice(src),
        PixelFormat::Bgra => {
            for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
                d.copy_from_slice(&[s[2], s[1], s[0], s[3]]);
            }
        }
        PixelFormat::Argb => {
            for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
                d.copy_from_slice(&[s[3], s[0], s[1], s[2]]);
            }
        }
        PixelFormat::Rgb => {
            for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(3)) {
                d.copy_from_slice(&s[..3]);
            }
        }
        PixelFormat::Bgr => {
            for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(3)) {
                d.copy_from_slice(&[s[2], s[1], s[0]]);
            }
        }
        PixelFormat::Unsupported => {}
    }
}

// === Alpha ===

#[inline(always)]
fn mul_div_255(c: u8, a: u8) -> u8 {
    ((c as u32 * a as u32 + 127) / 255) as u8
}

/// Scale color channels by alpha, in place.
pub(crate) fn premultiply_row(row: &mut [u8]) {
    for px in row.chunks_exact_mut(4) {
        let a = px[3];
        if a == 0xFF {
            continue;
        }
        px[0] = mul_div_255(px[0], a);
        px[1] = mul_div_255(px[1], a);
        px[2] = mul_div_255(px[2], a);
    }
}

/// Undo [`premultiply_row`], in place. Fully transparent pixels become black.
pub(crate) fn unpremultiply_row(row: &mut [u8]) {
    for px in row.chunks_exact_mut(4) {
        let a = px[3] as u32;
        match a {
            0xFF => {}
            0 => px[..3].fill(0),
            _ => {
                for c in &mut px[..3] {
                    *c = ((*c as u32 * 255 + a / 2) / a).min(255) as u8;
                }
            }
        }
    }
}

/// Multiply alpha by `factor` (0.0..=1.0), in place.
///
/// Premultiplied rows have their color channels scaled by the same factor so
/// the un-premultiplied color is unchanged.
pub(crate) fn scale_alpha_row(row: &mut [u8], factor: f32, premultiplied: bool) {
    let scale = |v: u8| (v as f32 * factor + 0.5) as u8;
    for px in row.chunks_exact_mut(4) {
        px[3] = scale(px[3]);
        if premultiplied {
            px[0] = scale(px[0]);
            px[1] = scale(px[1]);
            px[2] = scale(px[2]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgra_roundtrip() {
        let bgra = [10u8, 20, 30, 40, 50, 60, 70, 80];
        let mut rgba = [0u8; 8];
        row_to_rgba(PixelFormat::Bgra, &bgra, &mut rgba);
        assert_eq!(rgba, [30, 20, 10, 40, 70, 60, 50, 80]);

        let mut back = [0u8; 8];
        row_from_rgba(PixelFormat::Bgra, &rgba, &mut back);
        assert_eq!(back, bgra);
    }

    #[test]
    fn test_argb_roundtrip() {
        let argb = [255u8, 1, 2, 3];
        let mut rgba = [0u8; 4];
        row_to_rgba(PixelFormat::Argb, &argb, &mut rgba);
        assert_eq!(rgba, [1, 2, 3, 255]);

        let mut back = [0u8; 4];
        row_from_rgba(PixelFormat::Argb, &rgba, &mut back);
        assert_eq!(back, argb);
    }

    #[test]
    fn test_rgb_gains_opaque_alpha() {
        let rgb = [1u8, 2, 3, 4, 5, 6];
        let mut rgba = [0u8; 8];
        row_to_rgba(PixelFormat::Rgb, &rgb, &mut rgba);
        assert_eq!(rgba, [1, 2, 3, 255, 4, 5, 6, 255]);

        let bgr = [1u8, 2, 3];
        let mut rgba = [0u8; 4];
        row_to_rgba(PixelFormat::Bgr, &bgr, &mut rgba);
        assert_eq!(rgba, [3, 2, 1, 255]);
    }

    #[test]
    fn test_premultiply() {
        let mut row = [200u8, 100, 50, 128, 9, 9, 9, 255, 77, 77, 77, 0];
        premultiply_row(&mut row);
        assert_eq!(&row[..4], &[100, 50, 25, 128]);
        assert_eq!(&row[4..8], &[9, 9, 9, 255]);
        assert_eq!(&row[8..], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_unpremultiply_inverts_premultiply_closely() {
        for a in [1u8, 17, 64, 128, 200, 254] {
            for c in [0u8, 31, 127, 200, 255] {
                let mut row = [c, c, c, a];
                premultiply_row(&mut row);
                unpremultiply_row(&mut row);
                // Quantization at low alpha loses precision.
                let tolerance = (255 / a as i32).max(1);
                assert!(
                    (row[0] as i32 - c as i32).abs() <= tolerance,
                    "c={} a={} got {}",
                    c,
                    a,
                    row[0]
                );
                assert_eq!(row[3], a);
            }
        }
    }

    #[test]
    fn test_scale_alpha_straight_keeps_color() {
        let mut row = [200u8, 100, 50, 200];
        scale_alpha_row(&mut row, 0.5, false);
        assert_eq!(row, [200, 100, 50, 100]);
    }

    #[test]
    fn test_scale_alpha_premultiplied_scales_color() {
        let mut row = [100u8, 50, 24, 200];
        scale_alpha_row(&mut row, 0.5, true);
        assert_eq!(row, [50, 25, 12, 100]);
    }

    #[test]
    fn test_scale_alpha_identity_and_zero() {
        let original = [12u8, 34, 56, 78];
        let mut row = original;
        scale_alpha_row(&mut row, 1.0, true);
        assert_eq!(row, original);

        scale_alpha_row(&mut row, 0.0, false);
        assert_eq!(row[3], 0);
    }
}
