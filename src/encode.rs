//! WebP encoding.

use crate::bitmap::{self, PlatformBitmap};
use crate::config::EncodeConfig;
use crate::convert;
use crate::error::{EncodingError, Error, Result};
use crate::types::{RawPixelBuffer, MAX_DIMENSION};
use alloc::vec::Vec;
use whereat::*;

/// Encode an RGBA buffer to WebP.
///
/// Parameters are layered preset → quality → advanced overrides (see
/// [`EncodeConfig`]). Premultiplied buffers are converted to straight alpha
/// before they reach libwebp.
///
/// # Errors
///
/// - [`Error::InvalidInput`] if a side exceeds 16383 pixels.
/// - [`Error::EncodeFailed`] if libwebp rejects the parameters or fails.
///
/// # Example
///
/// ```rust
/// use webpkit::{EncodeConfig, RawPixelBuffer};
///
/// let rgba = vec![
///     255, 0, 0, 255,   0, 255, 0, 255,
///     0, 0, 255, 255,   255, 255, 255, 255,
/// ];
/// let buffer = RawPixelBuffer::from_rgba(2, 2, false, rgba)?;
/// let webp = webpkit::encode(buffer, &EncodeConfig::new().quality(85.0))?;
///
/// let decoded = webpkit::decode_from_bytes(&webp)?;
/// assert_eq!((decoded.width(), decoded.height()), (2, 2));
/// # Ok::<(), whereat::At<webpkit::Error>>(())
/// ```
pub fn encode(buffer: RawPixelBuffer, config: &EncodeConfig) -> Result<Vec<u8>> {
    validate_dimensions(buffer.width(), buffer.height())?;

    let webp_config = config.to_libwebp()?;

    let straight;
    let pixels: &[u8] = if buffer.is_premultiplied() {
        let row_len = buffer.width() as usize * RawPixelBuffer::BYTES_PER_PIXEL;
        let mut data = buffer.data().to_vec();
        for row in data.chunks_exact_mut(buffer.stride()) {
            convert::unpremultiply_row(&mut row[..row_len]);
        }
        straight = data;
        &straight
    } else {
        buffer.data()
    };

    let mut picture = Picture::new()?;
    picture.0.width = buffer.width() as i32;
    picture.0.height = buffer.height() as i32;
    picture.0.use_argb = 1;

    let import_ok = unsafe {
        libwebp_sys::WebPPictureImportRGBA(
            &mut picture.0,
            pixels.as_ptr(),
            buffer.stride() as i32,
        )
    };
    if import_ok == 0 {
        return Err(at!(Error::EncodeFailed(EncodingError::OutOfMemory)));
    }

    let mut writer = MemoryWriter::new();
    picture.0.writer = Some(libwebp_sys::WebPMemoryWrite);
    picture.0.custom_ptr = &mut writer.0 as *mut _ as *mut _;

    if unsafe { libwebp_sys::WebPEncode(&webp_config, &mut picture.0) } == 0 {
        let error = EncodingError::from(picture.0.error_code);
        log::debug!(
            "libwebp rejected {}x{} encode: {}",
            buffer.width(),
            buffer.height(),
            error
        );
        return Err(at!(Error::EncodeFailed(error)));
    }

    let webp = writer.to_vec();
    log::debug!(
        "encoded {}x{} ({:?}, q={}) to {} bytes",
        buffer.width(),
        buffer.height(),
        config.get_preset(),
        webp_config.quality,
        webp.len()
    );
    Ok(webp)
}

/// Extract a bitmap's pixels and encode them.
pub fn encode_bitmap<B: PlatformBitmap>(bitmap: &B, config: &EncodeConfig) -> Result<Vec<u8>> {
    encode(bitmap::extract(bitmap)?, config)
}

/// Owned `WebPPicture`, freed on drop.
struct Picture(libwebp_sys::WebPPicture);

impl Picture {
    fn new() -> Result<Self> {
        libwebp_sys::WebPPicture::new()
            .map(Picture)
            .map_err(|_| at!(Error::EncodeFailed(EncodingError::OutOfMemory)))
    }
}

impl Drop for Picture {
    fn drop(&mut self) {
        unsafe { libwebp_sys::WebPPictureFree(&mut self.0) };
    }
}

/// Growable output sink for `WebPEncode`, cleared on drop.
struct MemoryWriter(libwebp_sys::WebPMemoryWriter);

impl MemoryWriter {
    fn new() -> Self {
        let mut writer = core::mem::MaybeUninit::<libwebp_sys::WebPMemoryWriter>::uninit();
        unsafe { libwebp_sys::WebPMemoryWriterInit(writer.as_mut_ptr()) };
        MemoryWriter(unsafe { writer.assume_init() })
    }

    fn to_vec(&self) -> Vec<u8> {
        if self.0.mem.is_null() {
            return Vec::new();
        }
        unsafe { core::slice::from_raw_parts(self.0.mem, self.0.size) }.to_vec()
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        unsafe { libwebp_sys::WebPMemoryWriterClear(&mut self.0) };
    }
}

pub(crate) fn validate_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(at!(Error::InvalidInput(
            "width and height must be non-zero".into()
        )));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(at!(Error::InvalidInput(alloc::format!(
            "dimensions exceed maximum ({} x {})",
            MAX_DIMENSION,
            MAX_DIMENSION
        ))));
    }
    Ok(())
}
