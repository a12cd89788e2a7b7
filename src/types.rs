//! Core types for pixel data and bitstream information.

use crate::error::{check_status, DecodingError, Error, Result};
use alloc::vec::Vec;
use rgb::alt::{BGR8, BGRA8};
use rgb::{RGB8, RGBA8};
use whereat::*;

/// Largest width or height libwebp accepts.
pub const MAX_DIMENSION: u32 = 16383;

/// Native channel layout of a bitmap's pixel store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum PixelFormat {
    /// RGBA - 4 bytes per pixel (red, green, blue, alpha)
    Rgba,
    /// BGRA - 4 bytes per pixel (blue, green, red, alpha) - Windows/GPU native
    Bgra,
    /// ARGB - 4 bytes per pixel (alpha, red, green, blue) - alpha-first Quartz layouts
    Argb,
    /// RGB - 3 bytes per pixel (red, green, blue)
    Rgb,
    /// BGR - 3 bytes per pixel (blue, green, red) - OpenCV native
    Bgr,
    /// A layout webpkit cannot read (indexed, 16-bit, float, CMYK, ...).
    Unsupported,
}

impl PixelFormat {
    /// Bytes per pixel for this format, `None` for [`PixelFormat::Unsupported`].
    #[must_use]
    pub const fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            PixelFormat::Rgba | PixelFormat::Bgra | PixelFormat::Argb => Some(4),
            PixelFormat::Rgb | PixelFormat::Bgr => Some(3),
            PixelFormat::Unsupported => None,
        }
    }

    /// Whether this format has an alpha channel.
    #[must_use]
    pub const fn has_alpha(self) -> bool {
        matches!(
            self,
            PixelFormat::Rgba | PixelFormat::Bgra | PixelFormat::Argb
        )
    }
}

/// Marker trait for `rgb` pixel types that can back an [`imgref::ImgVec`] bitmap.
pub trait Pixel: Copy + 'static + private::Sealed {
    /// The pixel format corresponding to this type.
    const FORMAT: PixelFormat;
}

impl Pixel for RGBA8 {
    const FORMAT: PixelFormat = PixelFormat::Rgba;
}

impl Pixel for BGRA8 {
    const FORMAT: PixelFormat = PixelFormat::Bgra;
}

impl Pixel for RGB8 {
    const FORMAT: PixelFormat = PixelFormat::Rgb;
}

impl Pixel for BGR8 {
    const FORMAT: PixelFormat = PixelFormat::Bgr;
}

mod private {
    use super::*;

    pub trait Sealed {}
    impl Sealed for RGBA8 {}
    impl Sealed for BGRA8 {}
    impl Sealed for RGB8 {}
    impl Sealed for BGR8 {}
}

/// Interleaved RGBA pixels as they travel between the bitmap bridge and the codec.
///
/// The layout is always RGBA, 4 bytes per pixel. Rows are `stride` bytes apart
/// and the buffer holds exactly `stride * height` bytes. A buffer is moved from
/// stage to stage and never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPixelBuffer {
    width: u32,
    height: u32,
    stride: usize,
    premultiplied: bool,
    data: Vec<u8>,
}

impl RawPixelBuffer {
    /// Bytes per pixel of the RGBA layout.
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Wrap an RGBA byte buffer, checking the dimension and stride invariants.
    pub fn new(
        width: u32,
        height: u32,
        stride: usize,
        premultiplied: bool,
        data: Vec<u8>,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(at!(Error::InvalidInput(alloc::format!(
                "width and height must be non-zero, got {}x{}",
                width,
                height
            ))));
        }
        let min_stride = (width as usize).saturating_mul(Self::BYTES_PER_PIXEL);
        if stride < min_stride {
            return Err(at!(Error::InvalidInput(alloc::format!(
                "stride too small: got {}, minimum {}",
                stride,
                min_stride
            ))));
        }
        let expected = stride.saturating_mul(height as usize);
        if data.len() != expected {
            return Err(at!(Error::InvalidInput(alloc::format!(
                "buffer length {} does not match stride {} × height {}",
                data.len(),
                stride,
                height
            ))));
        }
        Ok(Self {
            width,
            height,
            stride,
            premultiplied,
            data,
        })
    }

    /// Wrap a tightly packed RGBA buffer (stride = width × 4).
    pub fn from_rgba(width: u32, height: u32, premultiplied: bool, data: Vec<u8>) -> Result<Self> {
        let stride = (width as usize).saturating_mul(Self::BYTES_PER_PIXEL);
        Self::new(width, height, stride, premultiplied, data)
    }

    /// Image width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row stride in bytes.
    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Whether color channels are pre-scaled by alpha.
    #[must_use]
    pub fn is_premultiplied(&self) -> bool {
        self.premultiplied
    }

    /// The raw bytes, including any row padding.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Iterate over rows, each trimmed to `width * 4` bytes.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> + '_ {
        let row_len = self.width as usize * Self::BYTES_PER_PIXEL;
        self.data
            .chunks_exact(self.stride)
            .map(move |row| &row[..row_len])
    }

    /// Consume the buffer, returning its bytes.
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// Information about a WebP image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Whether the image has an alpha channel.
    pub has_alpha: bool,
    /// Whether the image is animated.
    pub has_animation: bool,
    /// Bitstream format (lossy or lossless).
    pub format: BitstreamFormat,
}

impl ImageInfo {
    /// Read the bitstream header without decoding pixels.
    pub fn from_webp(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(at!(Error::DecodeFailed(DecodingError::NotEnoughData)));
        }

        let mut features = core::mem::MaybeUninit::<libwebp_sys::WebPBitstreamFeatures>::uninit();
        let status = unsafe {
            libwebp_sys::WebPGetFeatures(data.as_ptr(), data.len(), features.as_mut_ptr())
        };

        check_status(status)?;
        // SAFETY: WebPGetFeatures filled the struct on VP8_STATUS_OK
        let features = unsafe { features.assume_init() };

        let format = match features.format {
            1 => BitstreamFormat::Lossy,
            2 => BitstreamFormat::Lossless,
            _ => BitstreamFormat::Undefined,
        };

        Ok(ImageInfo {
            width: features.width as u32,
            height: features.height as u32,
            has_alpha: features.has_alpha != 0,
            has_animation: features.has_animation != 0,
            format,
        })
    }
}

/// Bitstream format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum BitstreamFormat {
    /// Format not determined (mixed, or not reported).
    #[default]
    Undefined,
    /// Lossy compression (VP8).
    Lossy,
    /// Lossless compression (VP8L).
    Lossless,
}
