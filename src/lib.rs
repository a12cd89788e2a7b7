//! # webpkit
//!
//! Conversion between in-memory bitmaps and WebP, built on libwebp.
//!
//! - A pixel bridge that moves bitmaps of any channel order, stride and
//!   alpha convention into a canonical RGBA buffer and back
//! - Encoding with presets, a quality knob and per-field advanced overrides
//! - Decoding from bytes or files
//! - Off-thread dispatch with exactly-once completion callbacks or futures
//!
//! ## Quick Start
//!
//! ```rust
//! use imgref::ImgVec;
//! use rgb::RGBA8;
//! use webpkit::{EncodeConfig, Preset};
//!
//! let img = ImgVec::new(vec![RGBA8::new(200, 40, 40, 255); 16 * 16], 16, 16);
//!
//! let config = EncodeConfig::with_preset(Preset::Photo, 85.0);
//! let webp = webpkit::encode_bitmap(&img, &config)?;
//!
//! let back: ImgVec<RGBA8> = webpkit::decode_bitmap(&webp)?;
//! assert_eq!((back.width(), back.height()), (16, 16));
//! # Ok::<(), whereat::At<webpkit::Error>>(())
//! ```
//!
//! ## Raw buffers
//!
//! ```rust
//! use webpkit::{AdvancedOptions, EncodeConfig, RawPixelBuffer};
//!
//! let rgba = vec![0u8, 128, 255, 255].repeat(4 * 4);
//! let buffer = RawPixelBuffer::from_rgba(4, 4, false, rgba.clone())?;
//!
//! let lossless = AdvancedOptions {
//!     lossless: Some(true),
//!     exact: Some(true),
//!     ..Default::default()
//! };
//! let webp = webpkit::encode(buffer, &EncodeConfig::new().advanced(lossless))?;
//! assert_eq!(webpkit::decode_from_bytes(&webp)?.data(), &rgba[..]);
//! # Ok::<(), whereat::At<webpkit::Error>>(())
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

whereat::define_at_crate_info!();

mod bitmap;
mod config;
mod convert;
mod decode;
mod encode;
mod error;
mod types;

#[cfg(feature = "async")]
mod dispatch;

// Re-exports
pub use bitmap::{apply_alpha, extract, rebuild, BitmapPixels, OwnedPixels, PlatformBitmap, Storage};
pub use config::{
    AdvancedOptions, AlphaFilter, DecoderConfig, EncodeConfig, ImageHint, Preset, DEFAULT_QUALITY,
};
pub use decode::{decode_bitmap, decode_from_bytes, Decoder};
pub use encode::{encode, encode_bitmap};
pub use error::{DecodingError, EncodingError, Error, ErrorKind, Result};
pub use types::{
    BitstreamFormat, ImageInfo, Pixel, PixelFormat, RawPixelBuffer, MAX_DIMENSION,
};

#[cfg(feature = "std")]
pub use decode::{decode_bitmap_from_path, decode_from_path};

#[cfg(feature = "async")]
pub use dispatch::{Completion, Dispatcher, Pending};

/// Library version information.
pub fn version() -> (u32, u32, u32) {
    let v = unsafe { libwebp_sys::WebPGetDecoderVersion() } as u32;
    ((v >> 16) & 0xff, (v >> 8) & 0xff, v & 0xff)
}
