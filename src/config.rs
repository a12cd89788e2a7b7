//! Encoder and decoder configuration types.
//!
//! Encoder parameters are built in three layers, always in this order:
//!
//! 1. the [`Preset`]'s libwebp defaults,
//! 2. the explicit [`EncodeConfig::quality`] / [`EncodeConfig::alpha_quality`],
//! 3. every `Some` field of [`AdvancedOptions`].
//!
//! A later layer wins for any field it sets.

use crate::error::{EncodingError, Error, Result};
use whereat::*;

/// Quality used when none is given.
pub const DEFAULT_QUALITY: f32 = 75.0;

/// Content-aware encoding presets.
///
/// These presets configure the encoder for different types of content,
/// optimizing the balance between file size and visual quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum Preset {
    /// Default preset, balanced for general use.
    #[default]
    Default = 0,
    /// Digital picture (portrait, indoor shot).
    /// Optimizes for smooth skin tones and indoor lighting.
    Picture = 1,
    /// Outdoor photograph with natural lighting.
    /// Best for landscapes, nature, and outdoor scenes.
    Photo = 2,
    /// Hand or line drawing with high-contrast details.
    /// Preserves sharp edges and fine lines.
    Drawing = 3,
    /// Small-sized colorful images like icons or sprites.
    /// Optimizes for small dimensions and sharp edges.
    Icon = 4,
    /// Text-heavy images.
    /// Preserves text readability and sharp character edges.
    Text = 5,
}

impl Preset {
    /// All presets, in libwebp order.
    pub const ALL: [Preset; 6] = [
        Preset::Default,
        Preset::Picture,
        Preset::Photo,
        Preset::Drawing,
        Preset::Icon,
        Preset::Text,
    ];

    /// Convert to libwebp preset value.
    pub(crate) fn to_libwebp(self) -> libwebp_sys::WebPPreset {
        match self {
            Preset::Default => libwebp_sys::WebPPreset::WEBP_PRESET_DEFAULT,
            Preset::Picture => libwebp_sys::WebPPreset::WEBP_PRESET_PICTURE,
            Preset::Photo => libwebp_sys::WebPPreset::WEBP_PRESET_PHOTO,
            Preset::Drawing => libwebp_sys::WebPPreset::WEBP_PRESET_DRAWING,
            Preset::Icon => libwebp_sys::WebPPreset::WEBP_PRESET_ICON,
            Preset::Text => libwebp_sys::WebPPreset::WEBP_PRESET_TEXT,
        }
    }
}

/// Image content hint for the lossless encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageHint {
    /// No hint.
    Default,
    /// Digital picture, like portrait or inner shot.
    Picture,
    /// Outdoor photograph with natural lighting.
    Photo,
    /// Discrete tone image (graph, map tile, ...).
    Graph,
}

impl ImageHint {
    fn to_libwebp(self) -> libwebp_sys::WebPImageHint {
        match self {
            ImageHint::Default => libwebp_sys::WebPImageHint::WEBP_HINT_DEFAULT,
            ImageHint::Picture => libwebp_sys::WebPImageHint::WEBP_HINT_PICTURE,
            ImageHint::Photo => libwebp_sys::WebPImageHint::WEBP_HINT_PHOTO,
            ImageHint::Graph => libwebp_sys::WebPImageHint::WEBP_HINT_GRAPH,
        }
    }
}

/// Predictive filtering applied to the alpha plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaFilter {
    /// No filtering.
    None = 0,
    /// Fast filter selection.
    Fast = 1,
    /// Try all filters, keep the best.
    Best = 2,
}

/// Typed overlay over libwebp's `WebPConfig`, applied after the preset and
/// the explicit quality settings.
///
/// Every field defaults to `None`, which leaves the value from the earlier
/// layers untouched. Integer fields are passed through unclamped; values
/// libwebp considers out of range make the encode fail with
/// [`EncodingError::InvalidConfiguration`]. `quality` and `alpha_quality`
/// are clamped to 0..=100 like their [`EncodeConfig`] counterparts.
///
/// ```rust
/// use webpkit::{AdvancedOptions, EncodeConfig, Preset};
///
/// let config = EncodeConfig::new()
///     .preset(Preset::Drawing)
///     .quality(80.0)
///     .advanced(AdvancedOptions {
///         method: Some(6),
///         use_sharp_yuv: Some(true),
///         ..AdvancedOptions::default()
///     });
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AdvancedOptions {
    /// Overrides [`EncodeConfig::quality`].
    pub quality: Option<f32>,
    /// Overrides [`EncodeConfig::alpha_quality`].
    pub alpha_quality: Option<u8>,
    /// Lossless encoding.
    pub lossless: Option<bool>,
    /// Quality/speed tradeoff (0 = fast, 6 = slower but better).
    pub method: Option<u8>,
    /// Hint for the lossless encoder.
    pub image_hint: Option<ImageHint>,
    /// Target output size in bytes (0 = disabled).
    pub target_size: Option<u32>,
    /// Target PSNR in dB (0.0 = disabled). Takes precedence over `target_size`.
    pub target_psnr: Option<f32>,
    /// Number of segments (1-4).
    pub segments: Option<u8>,
    /// Spatial noise shaping strength (0-100).
    pub sns_strength: Option<u8>,
    /// Loop filter strength (0-100).
    pub filter_strength: Option<u8>,
    /// Loop filter sharpness (0-7, 0 = sharpest).
    pub filter_sharpness: Option<u8>,
    /// Loop filter type (0 = simple, 1 = strong).
    pub filter_type: Option<u8>,
    /// Auto-adjust filter strength.
    pub autofilter: Option<bool>,
    /// Compress the alpha plane (lossless) instead of storing it raw.
    pub alpha_compression: Option<bool>,
    /// Predictive filtering for the alpha plane.
    pub alpha_filtering: Option<AlphaFilter>,
    /// Number of entropy analysis passes (1-10).
    pub pass: Option<u8>,
    /// Preprocessing filter (bit 0 = segment smoothing, bit 1 = pseudo-random dithering).
    pub preprocessing: Option<u8>,
    /// log2 of the number of token partitions (0-3).
    pub partitions: Option<u8>,
    /// Quality degradation allowed to fit the 512k first-partition limit (0-100).
    pub partition_limit: Option<u8>,
    /// Mimic JPEG output size for a given quality.
    pub emulate_jpeg_size: Option<bool>,
    /// Multi-threaded encoding level.
    pub thread_level: Option<u8>,
    /// Reduce memory usage at the cost of CPU.
    pub low_memory: Option<bool>,
    /// Near-lossless preprocessing (0 = max, 100 = off).
    pub near_lossless: Option<u8>,
    /// Preserve RGB values under fully transparent pixels.
    pub exact: Option<bool>,
    /// Delta palettization for lossless.
    pub use_delta_palette: Option<bool>,
    /// Sharp RGB to YUV conversion.
    pub use_sharp_yuv: Option<bool>,
}

impl AdvancedOptions {
    fn apply(&self, config: &mut libwebp_sys::WebPConfig) {
        fn set<T: Copy>(slot: &mut i32, value: Option<T>, f: impl Fn(T) -> i32) {
            if let Some(v) = value {
                *slot = f(v);
            }
        }
        let int = |v: u8| v as i32;
        let flag = |v: bool| v as i32;

        if let Some(q) = self.quality.and_then(clamp_percent) {
            config.quality = q;
        }
        set(&mut config.alpha_quality, self.alpha_quality, |v| {
            v.min(100) as i32
        });
        set(&mut config.lossless, self.lossless, flag);
        set(&mut config.method, self.method, int);
        if let Some(hint) = self.image_hint {
            config.image_hint = hint.to_libwebp();
        }
        set(&mut config.target_size, self.target_size, |v| {
            v.min(i32::MAX as u32) as i32
        });
        if let Some(psnr) = self.target_psnr {
            config.target_PSNR = psnr;
        }
        set(&mut config.segments, self.segments, int);
        set(&mut config.sns_strength, self.sns_strength, int);
        set(&mut config.filter_strength, self.filter_strength, int);
        set(&mut config.filter_sharpness, self.filter_sharpness, int);
        set(&mut config.filter_type, self.filter_type, int);
        set(&mut config.autofilter, self.autofilter, flag);
        set(&mut config.alpha_compression, self.alpha_compression, flag);
        set(&mut config.alpha_filtering, self.alpha_filtering, |v| v as i32);
        set(&mut config.pass, self.pass, int);
        set(&mut config.preprocessing, self.preprocessing, int);
        set(&mut config.partitions, self.partitions, int);
        set(&mut config.partition_limit, self.partition_limit, int);
        set(&mut config.emulate_jpeg_size, self.emulate_jpeg_size, flag);
        set(&mut config.thread_level, self.thread_level, int);
        set(&mut config.low_memory, self.low_memory, flag);
        set(&mut config.near_lossless, self.near_lossless, int);
        set(&mut config.exact, self.exact, flag);
        set(&mut config.use_delta_palette, self.use_delta_palette, flag);
        set(&mut config.use_sharp_yuv, self.use_sharp_yuv, flag);
    }
}

/// Clamp a 0-100 percentage. NaN has no meaningful clamp and yields `None`.
fn clamp_percent(value: f32) -> Option<f32> {
    if value.is_nan() {
        log::warn!("ignoring NaN quality value");
        return None;
    }
    if !(0.0..=100.0).contains(&value) {
        log::warn!("quality value {} clamped to 0..=100", value);
    }
    Some(value.clamp(0.0, 100.0))
}

/// WebP encoder configuration. Dimension-independent, reusable across images.
///
/// # Example
///
/// ```rust
/// use webpkit::{EncodeConfig, Preset, RawPixelBuffer};
///
/// let config = EncodeConfig::new()
///     .preset(Preset::Photo)
///     .quality(85.0)
///     .alpha_quality(90.0);
///
/// let buffer = RawPixelBuffer::from_rgba(4, 4, false, vec![255u8; 4 * 4 * 4])?;
/// let webp = webpkit::encode(buffer, &config)?;
/// assert!(!webp.is_empty());
/// # Ok::<(), whereat::At<webpkit::Error>>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodeConfig {
    pub(crate) quality: Option<f32>,
    pub(crate) alpha_quality: Option<f32>,
    pub(crate) preset: Preset,
    pub(crate) advanced: AdvancedOptions,
}

impl EncodeConfig {
    /// Default preset, libwebp's default quality (75) and alpha quality (100).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration with preset and quality.
    #[must_use]
    pub fn with_preset(preset: Preset, quality: f32) -> Self {
        Self::new().preset(preset).quality(quality)
    }

    /// Set encoding quality (0.0 = smallest, 100.0 = best).
    ///
    /// Out-of-range values are clamped. NaN is ignored.
    #[must_use]
    pub fn quality(mut self, quality: f32) -> Self {
        if let Some(q) = clamp_percent(quality) {
            self.quality = Some(q);
        }
        self
    }

    /// Set alpha plane quality (0.0-100.0). Rounded to the nearest integer.
    ///
    /// Out-of-range values are clamped. NaN is ignored.
    #[must_use]
    pub fn alpha_quality(mut self, quality: f32) -> Self {
        if let Some(q) = clamp_percent(quality) {
            self.alpha_quality = Some(q);
        }
        self
    }

    /// Set content-aware preset.
    #[must_use]
    pub fn preset(mut self, preset: Preset) -> Self {
        self.preset = preset;
        self
    }

    /// Set the advanced override layer.
    #[must_use]
    pub fn advanced(mut self, advanced: AdvancedOptions) -> Self {
        self.advanced = advanced;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.to_libwebp().map(|_| ())
    }

    /// Build the libwebp parameter set: preset, then quality, then overrides.
    pub(crate) fn to_libwebp(&self) -> Result<libwebp_sys::WebPConfig> {
        let mut config =
            libwebp_sys::WebPConfig::new_with_preset(self.preset.to_libwebp(), DEFAULT_QUALITY)
                .map_err(|_| at!(Error::EncodeFailed(EncodingError::InvalidConfiguration)))?;

        if let Some(quality) = self.quality {
            config.quality = quality;
        }
        if let Some(alpha_quality) = self.alpha_quality {
            config.alpha_quality = alpha_quality.round() as i32;
        }
        self.advanced.apply(&mut config);

        log::trace!(
            "encoder params: preset={:?} quality={} alpha_quality={} lossless={} method={}",
            self.preset,
            config.quality,
            config.alpha_quality,
            config.lossless,
            config.method
        );

        if unsafe { libwebp_sys::WebPValidateConfig(&config) } == 0 {
            return Err(at!(Error::EncodeFailed(
                EncodingError::InvalidConfiguration
            )));
        }

        Ok(config)
    }

    // === Accessors (read-only) ===

    /// The explicit quality, if one was set.
    #[must_use]
    pub fn get_quality(&self) -> Option<f32> {
        self.quality
    }

    /// The explicit alpha quality, if one was set.
    #[must_use]
    pub fn get_alpha_quality(&self) -> Option<f32> {
        self.alpha_quality
    }

    /// Get the preset.
    #[must_use]
    pub fn get_preset(&self) -> Preset {
        self.preset
    }

    /// Get the advanced override layer.
    #[must_use]
    pub fn get_advanced(&self) -> &AdvancedOptions {
        &self.advanced
    }
}

/// Decoder configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecoderConfig {
    pub(crate) premultiply: bool,
    pub(crate) bypass_filtering: bool,
    pub(crate) no_fancy_upsampling: bool,
    pub(crate) use_threads: bool,
    pub(crate) flip: bool,
}

impl DecoderConfig {
    /// Create a new decoder configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Output premultiplied RGBA instead of straight alpha.
    #[must_use]
    pub fn premultiply(mut self, enable: bool) -> Self {
        self.premultiply = enable;
        self
    }

    /// Bypass filtering for faster decoding.
    #[must_use]
    pub fn bypass_filtering(mut self, enable: bool) -> Self {
        self.bypass_filtering = enable;
        self
    }

    /// Disable fancy upsampling.
    #[must_use]
    pub fn no_fancy_upsampling(mut self, enable: bool) -> Self {
        self.no_fancy_upsampling = enable;
        self
    }

    /// Enable multi-threaded decoding.
    #[must_use]
    pub fn use_threads(mut self, enable: bool) -> Self {
        self.use_threads = enable;
        self
    }

    /// Flip output vertically.
    #[must_use]
    pub fn flip(mut self, enable: bool) -> Self {
        self.flip = enable;
        self
    }
}
