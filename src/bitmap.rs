//! Bridge between platform bitmaps and [`RawPixelBuffer`].
//!
//! webpkit never owns a bitmap type. Callers implement [`PlatformBitmap`] for
//! their toolkit's image object (a `CGImage` wrapper, a GPU staging texture,
//! a windowing-library surface) and the bridge handles channel order, stride
//! and alpha premultiplication in both directions.
//!
//! `imgref::ImgVec` over the `rgb` pixel types implements the trait out of the
//! box, with straight (non-premultiplied) alpha.

use crate::convert;
use crate::error::{Error, Result};
use crate::types::{Pixel, PixelFormat, RawPixelBuffer};
use alloc::vec::Vec;
use imgref::ImgVec;
use whereat::*;

/// Read-only view of a bitmap's pixel store.
#[derive(Debug, Clone, Copy)]
pub struct BitmapPixels<'a> {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row stride in bytes.
    pub stride: usize,
    /// Native channel layout.
    pub format: PixelFormat,
    /// Whether color channels are pre-scaled by alpha.
    pub premultiplied: bool,
    /// Pixel bytes, at least `stride * (height - 1) + width * bpp` long.
    pub data: &'a [u8],
}

/// Pixel layout a bitmap type uses for newly constructed instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Storage {
    /// Channel layout.
    pub format: PixelFormat,
    /// Whether the bitmap stores premultiplied color.
    pub premultiplied: bool,
}

/// Pixels handed to [`PlatformBitmap::from_pixels`], already in the target's
/// [`Storage`] layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedPixels {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row stride in bytes (always `width * bpp`).
    pub stride: usize,
    /// Channel layout, equal to the target's `STORAGE.format`.
    pub format: PixelFormat,
    /// Equal to the target's `STORAGE.premultiplied`.
    pub premultiplied: bool,
    /// `stride * height` bytes.
    pub data: Vec<u8>,
}

/// A toolkit image object webpkit can read pixels from and build anew.
///
/// # Example
///
/// ```rust
/// use webpkit::{BitmapPixels, OwnedPixels, PixelFormat, PlatformBitmap, Storage};
///
/// /// A premultiplied BGRA surface, like a Quartz bitmap context.
/// struct Surface {
///     width: u32,
///     height: u32,
///     bytes: Vec<u8>,
/// }
///
/// impl PlatformBitmap for Surface {
///     const STORAGE: Storage = Storage {
///         format: PixelFormat::Bgra,
///         premultiplied: true,
///     };
///
///     fn pixels(&self) -> Option<BitmapPixels<'_>> {
///         Some(BitmapPixels {
///             width: self.width,
///             height: self.height,
///             stride: self.width as usize * 4,
///             format: PixelFormat::Bgra,
///             premultiplied: true,
///             data: &self.bytes,
///         })
///     }
///
///     fn from_pixels(pixels: OwnedPixels) -> webpkit::Result<Self> {
///         Ok(Surface {
///             width: pixels.width,
///             height: pixels.height,
///             bytes: pixels.data,
///         })
///     }
/// }
///
/// let surface = Surface { width: 1, height: 1, bytes: vec![0, 0, 128, 128] };
/// let raw = webpkit::extract(&surface)?;
/// assert_eq!(raw.data(), &[128, 0, 0, 128]);
/// # Ok::<(), whereat::At<webpkit::Error>>(())
/// ```
pub trait PlatformBitmap: Sized {
    /// Layout used by [`PlatformBitmap::from_pixels`].
    const STORAGE: Storage;

    /// Borrow the pixel store, or `None` if it cannot be read.
    fn pixels(&self) -> Option<BitmapPixels<'_>>;

    /// Build a bitmap from pixels laid out per [`PlatformBitmap::STORAGE`].
    fn from_pixels(pixels: OwnedPixels) -> Result<Self>;
}

/// Read a bitmap's pixels into an RGBA [`RawPixelBuffer`].
///
/// The result is tightly packed (stride = width × 4) and keeps the bitmap's
/// premultiplication flag. 3-byte layouts gain an opaque alpha channel.
pub fn extract<B: PlatformBitmap>(bitmap: &B) -> Result<RawPixelBuffer> {
    let pixels = bitmap.pixels().ok_or_else(|| {
        at!(Error::InvalidInput(
            "bitmap pixel store is not readable".into()
        ))
    })?;

    let BitmapPixels {
        width,
        height,
        stride,
        format,
        premultiplied,
        data,
    } = pixels;

    if width == 0 || height == 0 {
        return Err(at!(Error::InvalidInput(alloc::format!(
            "bitmap has zero area ({}x{})",
            width,
            height
        ))));
    }
    let bpp = format.bytes_per_pixel().ok_or_else(|| {
        at!(Error::InvalidInput(
            "unsupported native pixel format".into()
        ))
    })?;
    check_strided(data.len(), stride, width as usize, height as usize, bpp)?;

    let w = width as usize;
    let out_stride = w * RawPixelBuffer::BYTES_PER_PIXEL;
    let mut out = alloc::vec![0u8; out_stride * height as usize];
    for (y, dst) in out.chunks_exact_mut(out_stride).enumerate() {
        convert::row_to_rgba(format, &data[y * stride..][..w * bpp], dst);
    }

    log::trace!(
        "extracted {}x{} {:?} bitmap (premultiplied: {})",
        width,
        height,
        format,
        premultiplied
    );
    RawPixelBuffer::new(width, height, out_stride, premultiplied, out)
}

/// Build a new bitmap of type `B` from a [`RawPixelBuffer`].
///
/// Pixels are converted to `B::STORAGE`: channels are reordered and alpha is
/// premultiplied or un-premultiplied so the bitmap shows the same image the
/// buffer describes. A buffer always has non-zero dimensions, so the only
/// failures are an unusable `B::STORAGE` format or `B::from_pixels` itself.
pub fn rebuild<B: PlatformBitmap>(buffer: RawPixelBuffer) -> Result<B> {
    let storage = B::STORAGE;
    let bpp = storage.format.bytes_per_pixel().ok_or_else(|| {
        at!(Error::InvalidInput(
            "target bitmap declares an unsupported storage format".into()
        ))
    })?;

    let width = buffer.width();
    let height = buffer.height();
    let w = width as usize;
    let out_stride = w * bpp;
    let mut out = alloc::vec![0u8; out_stride * height as usize];

    let premultiply = !buffer.is_premultiplied() && storage.premultiplied;
    let unpremultiply = buffer.is_premultiplied() && !storage.premultiplied;

    let mut scratch = alloc::vec![0u8; w * RawPixelBuffer::BYTES_PER_PIXEL];
    for (src, dst) in buffer.rows().zip(out.chunks_exact_mut(out_stride)) {
        if premultiply || unpremultiply {
            scratch.copy_from_slice(src);
            if premultiply {
                convert::premultiply_row(&mut scratch);
            } else {
                convert::unpremultiply_row(&mut scratch);
            }
            convert::row_from_rgba(storage.format, &scratch, dst);
        } else {
            convert::row_from_rgba(storage.format, src, dst);
        }
    }

    log::trace!(
        "rebuilt {}x{} bitmap as {:?} (premultiplied: {})",
        width,
        height,
        storage.format,
        storage.premultiplied
    );
    B::from_pixels(OwnedPixels {
        width,
        height,
        stride: out_stride,
        format: storage.format,
        premultiplied: storage.premultiplied,
        data: out,
    })
}

/// Return a copy of `bitmap` with every alpha value multiplied by `factor`.
///
/// `factor` is clamped to `0.0..=1.0`. For premultiplied stores the color
/// channels are scaled too, so the un-premultiplied color does not shift.
///
/// # Errors
///
/// [`Error::InvalidInput`] for a NaN factor, or for a factor below `1.0`
/// when `B::STORAGE` has no alpha channel to hold the result. A factor of
/// `1.0` or more is a plain copy for every layout.
pub fn apply_alpha<B: PlatformBitmap>(bitmap: &B, factor: f32) -> Result<B> {
    if factor.is_nan() {
        return Err(at!(Error::InvalidInput("alpha factor is NaN".into())));
    }
    let factor = factor.clamp(0.0, 1.0);
    if factor < 1.0 && !B::STORAGE.format.has_alpha() {
        return Err(at!(Error::InvalidInput(alloc::format!(
            "{:?} storage has no alpha channel to scale",
            B::STORAGE.format
        ))));
    }

    let buffer = extract(bitmap)?;
    let (width, height, stride, premultiplied) = (
        buffer.width(),
        buffer.height(),
        buffer.stride(),
        buffer.is_premultiplied(),
    );
    let mut data = buffer.into_data();
    if factor < 1.0 {
        for row in data.chunks_exact_mut(stride) {
            convert::scale_alpha_row(row, factor, premultiplied);
        }
    }

    rebuild(RawPixelBuffer::new(
        width,
        height,
        stride,
        premultiplied,
        data,
    )?)
}

fn check_strided(len: usize, stride: usize, width: usize, height: usize, bpp: usize) -> Result<()> {
    let row_bytes = width.saturating_mul(bpp);
    if row_bytes > stride {
        return Err(at!(Error::InvalidInput(alloc::format!(
            "bitmap stride too small: got {}, minimum {}",
            stride,
            row_bytes
        ))));
    }
    let required = (height - 1).saturating_mul(stride).saturating_add(row_bytes);
    if len < required {
        return Err(at!(Error::InvalidInput(alloc::format!(
            "bitmap pixel store too small: got {}, need {}",
            len,
            required
        ))));
    }
    Ok(())
}

impl<P: Pixel> PlatformBitmap for ImgVec<P> {
    const STORAGE: Storage = Storage {
        format: P::FORMAT,
        premultiplied: false,
    };

    fn pixels(&self) -> Option<BitmapPixels<'_>> {
        let bpp = core::mem::size_of::<P>();
        let buf = self.buf();
        // SAFETY: every Pixel type is a repr(C) struct of u8 channels
        let data =
            unsafe { core::slice::from_raw_parts(buf.as_ptr() as *const u8, buf.len() * bpp) };
        Some(BitmapPixels {
            width: u32::try_from(self.width()).ok()?,
            height: u32::try_from(self.height()).ok()?,
            stride: self.stride() * bpp,
            format: P::FORMAT,
            premultiplied: false,
            data,
        })
    }

    fn from_pixels(pixels: OwnedPixels) -> Result<Self> {
        let bpp = core::mem::size_of::<P>();
        if pixels.format != P::FORMAT || pixels.stride % bpp != 0 {
            return Err(at!(Error::InvalidInput(alloc::format!(
                "pixels in {:?} layout cannot back an image of {:?}",
                pixels.format,
                P::FORMAT
            ))));
        }
        if pixels.premultiplied != Self::STORAGE.premultiplied {
            return Err(at!(Error::InvalidInput(
                "premultiplied pixels cannot back a straight-alpha image".into()
            )));
        }
        if pixels.width == 0 || pixels.height == 0 {
            return Err(at!(Error::InvalidInput(alloc::format!(
                "bitmap has zero area ({}x{})",
                pixels.width,
                pixels.height
            ))));
        }
        check_strided(
            pixels.data.len(),
            pixels.stride,
            pixels.width as usize,
            pixels.height as usize,
            bpp,
        )?;

        let pixel_count = pixels.data.len() / bpp;
        let buf = unsafe {
            let mut vec: Vec<P> = Vec::with_capacity(pixel_count);
            core::ptr::copy_nonoverlapping(
                pixels.data.as_ptr(),
                vec.as_mut_ptr() as *mut u8,
                pixel_count * bpp,
            );
            vec.set_len(pixel_count);
            vec
        };

        Ok(ImgVec::new_stride(
            buf,
            pixels.width as usize,
            pixels.height as usize,
            pixels.stride / bpp,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rgb::alt::BGRA8;
    use rgb::{RGB8, RGBA8};

    #[test]
    fn test_extract_bgra_image() {
        let img = ImgVec::new(
            alloc::vec![BGRA8 {
                b: 1,
                g: 2,
                r: 3,
                a: 4
            }],
            1,
            1,
        );
        let raw = extract(&img).unwrap();
        assert_eq!(raw.data(), &[3, 2, 1, 4]);
        assert!(!raw.is_premultiplied());
    }

    #[test]
    fn test_extract_honours_padded_stride() {
        // 2x2 image with one pixel of padding per row.
        let buf = alloc::vec![
            RGB8::new(1, 1, 1),
            RGB8::new(2, 2, 2),
            RGB8::new(0, 0, 0),
            RGB8::new(3, 3, 3),
            RGB8::new(4, 4, 4),
        ];
        let img = ImgVec::new_stride(buf, 2, 2, 3);
        let raw = extract(&img).unwrap();
        assert_eq!(raw.stride(), 8);
        assert_eq!(
            raw.data(),
            &[1, 1, 1, 255, 2, 2, 2, 255, 3, 3, 3, 255, 4, 4, 4, 255]
        );
    }

    #[test]
    fn test_rebuild_rgb_drops_alpha() {
        let raw = RawPixelBuffer::from_rgba(1, 1, false, alloc::vec![9, 8, 7, 6]).unwrap();
        let img: ImgVec<RGB8> = rebuild(raw).unwrap();
        assert_eq!(img.buf()[0], RGB8::new(9, 8, 7));
    }

    #[test]
    fn test_rebuild_unpremultiplies_for_straight_target() {
        let raw = RawPixelBuffer::from_rgba(1, 1, true, alloc::vec![100, 50, 25, 128]).unwrap();
        let img: ImgVec<RGBA8> = rebuild(raw).unwrap();
        let px = img.buf()[0];
        assert_eq!(px.a, 128);
        assert!((px.r as i32 - 199).abs() <= 1);
        assert!((px.g as i32 - 100).abs() <= 1);
        assert!((px.b as i32 - 50).abs() <= 1);
    }

    #[test]
    fn test_apply_alpha_rejects_nan() {
        let img = ImgVec::new(alloc::vec![RGBA8::new(1, 2, 3, 4)], 1, 1);
        assert!(apply_alpha(&img, f32::NAN).is_err());
    }

    #[test]
    fn test_apply_alpha_clamps_factor() {
        let img = ImgVec::new(alloc::vec![RGBA8::new(1, 2, 3, 200)], 1, 1);
        let louder: ImgVec<RGBA8> = apply_alpha(&img, 3.0).unwrap();
        assert_eq!(louder.buf()[0], RGBA8::new(1, 2, 3, 200));
        let gone: ImgVec<RGBA8> = apply_alpha(&img, -1.0).unwrap();
        assert_eq!(gone.buf()[0].a, 0);
    }

    #[test]
    fn test_zero_area_image_is_invalid() {
        let img: ImgVec<RGBA8> = ImgVec::new(Vec::new(), 4, 0);
        let err = extract(&img).unwrap_err();
        assert!(matches!(err.error(), Error::InvalidInput(_)));
    }

    fn owned_rgba(width: u32, height: u32, stride: usize, len: usize) -> OwnedPixels {
        OwnedPixels {
            width,
            height,
            stride,
            format: PixelFormat::Rgba,
            premultiplied: false,
            data: alloc::vec![7u8; len],
        }
    }

    #[test]
    fn test_from_pixels_accepts_unpadded_last_row() {
        // Two rows of 2 pixels, 12-byte stride, last row without padding.
        let img = ImgVec::<RGBA8>::from_pixels(owned_rgba(2, 2, 12, 20)).unwrap();
        assert_eq!((img.width(), img.height(), img.stride()), (2, 2, 3));
    }

    #[test]
    fn test_from_pixels_rejects_short_store() {
        let err = ImgVec::<RGBA8>::from_pixels(owned_rgba(4, 4, 16, 16 * 3))
            .err()
            .expect("short store must fail");
        assert!(matches!(err.error(), Error::InvalidInput(_)));
    }

    #[test]
    fn test_from_pixels_rejects_narrow_stride() {
        let err = ImgVec::<RGBA8>::from_pixels(owned_rgba(4, 2, 8, 64))
            .err()
            .expect("stride below width must fail");
        assert!(matches!(err.error(), Error::InvalidInput(_)));
    }

    #[test]
    fn test_from_pixels_rejects_premultiplied() {
        let mut pixels = owned_rgba(1, 1, 4, 4);
        pixels.premultiplied = true;
        let err = ImgVec::<RGBA8>::from_pixels(pixels)
            .err()
            .expect("premultiplied pixels must fail");
        assert!(matches!(err.error(), Error::InvalidInput(_)));
    }

    #[test]
    fn test_from_pixels_rejects_zero_area() {
        let err = ImgVec::<RGBA8>::from_pixels(owned_rgba(4, 0, 16, 0))
            .err()
            .expect("zero area must fail");
        assert!(matches!(err.error(), Error::InvalidInput(_)));
    }

    #[test]
    fn test_apply_alpha_without_alpha_channel() {
        let img = ImgVec::new(alloc::vec![RGB8::new(10, 20, 30); 4], 2, 2);
        let err = apply_alpha(&img, 0.5).err().expect("rgb has no alpha");
        assert!(matches!(err.error(), Error::InvalidInput(_)));

        // Identity factor still copies.
        let same: ImgVec<RGB8> = apply_alpha(&img, 1.0).unwrap();
        assert_eq!(same.buf(), img.buf());
    }
}
