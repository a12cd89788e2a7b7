//! WebP decoding.

use crate::bitmap::{self, PlatformBitmap};
use crate::config::DecoderConfig;
use crate::error::{check_status, DecodingError, Error, Result};
use crate::types::{ImageInfo, RawPixelBuffer};
use alloc::vec::Vec;
use whereat::*;

/// Decode WebP bytes to a straight-alpha RGBA buffer.
///
/// Dimensions come from the bitstream header. Animated files are rejected
/// with [`DecodingError::UnsupportedFeature`].
///
/// # Example
///
/// ```rust
/// let err = webpkit::decode_from_bytes(&[]).unwrap_err();
/// assert_eq!(err.error().kind(), webpkit::ErrorKind::DecodeFailure);
/// ```
pub fn decode_from_bytes(data: &[u8]) -> Result<RawPixelBuffer> {
    Decoder::new(data)?.decode()
}

/// Read a WebP file fully, then decode it like [`decode_from_bytes`].
///
/// # Errors
///
/// [`Error::Io`] if the file cannot be opened or read, otherwise the errors
/// of [`decode_from_bytes`].
#[cfg(feature = "std")]
pub fn decode_from_path(path: impl AsRef<std::path::Path>) -> Result<RawPixelBuffer> {
    decode_from_bytes(&read_file(path.as_ref())?)
}

/// Decode WebP bytes straight into a bitmap of type `B`.
///
/// The decoder emits premultiplied or straight alpha to match `B::STORAGE`,
/// so the bitmap bridge only has to reorder channels.
pub fn decode_bitmap<B: PlatformBitmap>(data: &[u8]) -> Result<B> {
    let config = DecoderConfig::new().premultiply(B::STORAGE.premultiplied);
    bitmap::rebuild(Decoder::new(data)?.config(config).decode()?)
}

/// Read a WebP file and decode it into a bitmap of type `B`.
#[cfg(feature = "std")]
pub fn decode_bitmap_from_path<B: PlatformBitmap>(
    path: impl AsRef<std::path::Path>,
) -> Result<B> {
    decode_bitmap(&read_file(path.as_ref())?)
}

#[cfg(feature = "std")]
fn read_file(path: &std::path::Path) -> Result<Vec<u8>> {
    let data = std::fs::read(path).map_err(|e| at!(Error::io(path, &e)))?;
    log::trace!("read {} bytes from {}", data.len(), path.display());
    Ok(data)
}

/// Header probe shared by the decode entry points.
fn probe(data: &[u8]) -> Result<ImageInfo> {
    let info = ImageInfo::from_webp(data)?;
    if info.has_animation {
        return Err(at!(Error::DecodeFailed(DecodingError::UnsupportedFeature)));
    }
    Ok(info)
}

/// WebP decoder with advanced options.
///
/// # Example
///
/// ```rust
/// use webpkit::{DecoderConfig, Decoder, EncodeConfig, RawPixelBuffer};
///
/// let buffer = RawPixelBuffer::from_rgba(4, 4, false, vec![128u8; 4 * 4 * 4])?;
/// let webp = webpkit::encode(buffer, &EncodeConfig::new())?;
///
/// let decoder = Decoder::new(&webp)?;
/// assert_eq!(decoder.info().width, 4);
/// let pixels = decoder.config(DecoderConfig::new().premultiply(true)).decode()?;
/// assert!(pixels.is_premultiplied());
/// # Ok::<(), whereat::At<webpkit::Error>>(())
/// ```
pub struct Decoder<'a> {
    data: &'a [u8],
    info: ImageInfo,
    config: DecoderConfig,
}

impl<'a> Decoder<'a> {
    /// Create a new decoder for the given WebP data.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let info = probe(data)?;
        Ok(Self {
            data,
            info,
            config: DecoderConfig::default(),
        })
    }

    /// Get image information.
    pub fn info(&self) -> &ImageInfo {
        &self.info
    }

    /// Set decoder configuration.
    #[must_use]
    pub fn config(mut self, config: DecoderConfig) -> Self {
        self.config = config;
        self
    }

    /// Decode to an RGBA buffer.
    pub fn decode(self) -> Result<RawPixelBuffer> {
        decode_with(self.data, &self.info, &self.config)
    }
}

/// Run `WebPDecode` with `config`. Every libwebp status goes through
/// [`check_status`], so truncated input reports
/// [`DecodingError::NotEnoughData`].
fn decode_with(data: &[u8], info: &ImageInfo, config: &DecoderConfig) -> Result<RawPixelBuffer> {
    let mut dec_config = libwebp_sys::WebPDecoderConfig::new()
        .map_err(|_| at!(Error::DecodeFailed(DecodingError::InvalidParam)))?;

    let status =
        unsafe { libwebp_sys::WebPGetFeatures(data.as_ptr(), data.len(), &mut dec_config.input) };
    check_status(status)?;

    dec_config.output.colorspace = if config.premultiply {
        libwebp_sys::WEBP_CSP_MODE::MODE_rgbA
    } else {
        libwebp_sys::WEBP_CSP_MODE::MODE_RGBA
    };
    dec_config.options.bypass_filtering = config.bypass_filtering as i32;
    dec_config.options.no_fancy_upsampling = config.no_fancy_upsampling as i32;
    dec_config.options.use_threads = config.use_threads as i32;
    dec_config.options.flip = config.flip as i32;

    let status = unsafe { libwebp_sys::WebPDecode(data.as_ptr(), data.len(), &mut dec_config) };
    check_status(status)?;

    let width = dec_config.output.width as u32;
    let height = dec_config.output.height as u32;
    let pixels = unsafe {
        let base = dec_config.output.u.RGBA.rgba;
        // Negative when `flip` is set.
        let stride = dec_config.output.u.RGBA.stride as isize;
        if base.is_null() {
            libwebp_sys::WebPFreeDecBuffer(&mut dec_config.output);
            return Err(at!(Error::DecodeFailed(DecodingError::OutOfMemory)));
        }
        let row_len = width as usize * RawPixelBuffer::BYTES_PER_PIXEL;
        let mut vec = Vec::with_capacity(row_len * height as usize);
        for y in 0..height as isize {
            let row = core::slice::from_raw_parts(base.offset(y * stride), row_len);
            vec.extend_from_slice(row);
        }
        libwebp_sys::WebPFreeDecBuffer(&mut dec_config.output);
        vec
    };

    log::debug!(
        "decoded {:?} {}x{} webp ({} bytes in, premultiplied: {}, threads: {})",
        info.format,
        width,
        height,
        data.len(),
        config.premultiply,
        config.use_threads
    );
    RawPixelBuffer::from_rgba(width, height, config.premultiply, pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_is_decode_failure() {
        let err = decode_from_bytes(&[]).unwrap_err();
        assert_eq!(
            err.error(),
            &Error::DecodeFailed(DecodingError::NotEnoughData)
        );
    }

    #[test]
    fn test_garbage_is_decode_failure() {
        let err = decode_from_bytes(b"RIFF\x10\x00\x00\x00WEBPVP8 garbage!").unwrap_err();
        assert!(matches!(err.error(), Error::DecodeFailed(_)));
    }

    fn sample_webp() -> Vec<u8> {
        let mut rgba = Vec::with_capacity(32 * 32 * 4);
        for y in 0..32u8 {
            for x in 0..32u8 {
                rgba.extend_from_slice(&[x * 8, y * 8, x ^ y, 255]);
            }
        }
        let buffer = RawPixelBuffer::from_rgba(32, 32, false, rgba).unwrap();
        crate::encode::encode(buffer, &crate::config::EncodeConfig::new()).unwrap()
    }

    /// RIFF container holding only a VP8X chunk with the animation flag set.
    fn animated_header(width: u32, height: u32) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"RIFF");
        data.extend_from_slice(&22u32.to_le_bytes());
        data.extend_from_slice(b"WEBPVP8X");
        data.extend_from_slice(&10u32.to_le_bytes());
        data.extend_from_slice(&[0x02, 0, 0, 0]);
        data.extend_from_slice(&(width - 1).to_le_bytes()[..3]);
        data.extend_from_slice(&(height - 1).to_le_bytes()[..3]);
        data
    }

    #[test]
    fn test_truncated_input_is_not_enough_data() {
        let webp = sample_webp();
        let truncated = &webp[..webp.len() / 2];

        // The header still parses; the payload is short.
        assert!(ImageInfo::from_webp(truncated).is_ok());
        let err = decode_from_bytes(truncated).unwrap_err();
        assert_eq!(
            err.error(),
            &Error::DecodeFailed(DecodingError::NotEnoughData)
        );

        let err = Decoder::new(truncated)
            .unwrap()
            .config(DecoderConfig::new().premultiply(true))
            .decode()
            .unwrap_err();
        assert_eq!(
            err.error(),
            &Error::DecodeFailed(DecodingError::NotEnoughData)
        );
    }

    #[test]
    fn test_animated_input_is_unsupported() {
        let data = animated_header(3, 2);

        let info = ImageInfo::from_webp(&data).unwrap();
        assert!(info.has_animation);
        assert_eq!((info.width, info.height), (3, 2));

        let err = decode_from_bytes(&data).unwrap_err();
        assert_eq!(
            err.error(),
            &Error::DecodeFailed(DecodingError::UnsupportedFeature)
        );
        assert!(matches!(
            Decoder::new(&data).map(|_| ()).unwrap_err().error(),
            Error::DecodeFailed(DecodingError::UnsupportedFeature)
        ));
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_missing_file_is_io_failure() {
        let err = decode_from_path("/definitely/not/here.webp").unwrap_err();
        match err.error() {
            Error::Io { kind, .. } => assert_eq!(*kind, std::io::ErrorKind::NotFound),
            other => panic!("expected Io, got {:?}", other),
        }
    }
}
