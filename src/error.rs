//! Error types for webpkit conversions.

use alloc::string::String;
use core::fmt;
use whereat::*;

/// Result type for webpkit operations.
///
/// Errors carry the location they were raised at via [`At`].
pub type Result<T> = core::result::Result<T, At<Error>>;

/// Error type for webpkit operations.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Caller-supplied data is malformed (zero dimensions, bad stride,
    /// short buffer, unreadable bitmap pixel store).
    InvalidInput(String),
    /// libwebp rejected the configuration or failed while encoding.
    EncodeFailed(EncodingError),
    /// The bitstream is malformed or uses an unsupported feature.
    DecodeFailed(DecodingError),
    /// A WebP file could not be opened or read.
    #[cfg(feature = "std")]
    Io {
        /// Kind reported by the operating system.
        kind: std::io::ErrorKind,
        /// Path and OS message.
        message: String,
    },
    /// A dispatched conversion panicked or was dropped before producing a result.
    Worker(String),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// See [`Error::InvalidInput`].
    InvalidInput,
    /// See [`Error::EncodeFailed`].
    EncodeFailure,
    /// See [`Error::DecodeFailed`].
    DecodeFailure,
    /// See [`Error::Io`].
    IoFailure,
    /// See [`Error::Worker`].
    Worker,
}

impl Error {
    /// The kind tag of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::EncodeFailed(_) => ErrorKind::EncodeFailure,
            Error::DecodeFailed(_) => ErrorKind::DecodeFailure,
            #[cfg(feature = "std")]
            Error::Io { .. } => ErrorKind::IoFailure,
            Error::Worker(_) => ErrorKind::Worker,
        }
    }

    #[cfg(feature = "std")]
    pub(crate) fn io(path: &std::path::Path, err: &std::io::Error) -> Self {
        Error::Io {
            kind: err.kind(),
            message: alloc::format!("{}: {}", path.display(), err),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            Error::EncodeFailed(e) => write!(f, "encode failed: {}", e),
            Error::DecodeFailed(e) => write!(f, "decode failed: {}", e),
            #[cfg(feature = "std")]
            Error::Io { message, .. } => write!(f, "I/O error: {}", message),
            Error::Worker(msg) => write!(f, "conversion worker failed: {}", msg),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Why `WebPEncode` failed, from `WebPPicture::error_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum EncodingError {
    /// Allocation failed while preparing the picture.
    OutOfMemory,
    /// Allocation failed while flushing the bitstream.
    BitstreamOutOfMemory,
    /// A required pointer was null.
    NullParameter,
    /// The parameter set failed `WebPValidateConfig`.
    InvalidConfiguration,
    /// Width or height is 0 or above 16383.
    BadDimension,
    /// The first partition exceeded 512k; raise `partitions` or lower quality.
    Partition0Overflow,
    /// A token partition exceeded 16M.
    PartitionOverflow,
    /// The output writer reported failure.
    BadWrite,
    /// Output would exceed 4G.
    FileTooBig,
    /// Aborted by a progress hook.
    UserAbort,
    /// libwebp reported no specific code.
    Unknown,
}

impl EncodingError {
    const fn as_str(self) -> &'static str {
        match self {
            EncodingError::OutOfMemory => "out of memory",
            EncodingError::BitstreamOutOfMemory => "out of memory writing bitstream",
            EncodingError::NullParameter => "null parameter",
            EncodingError::InvalidConfiguration => "invalid configuration",
            EncodingError::BadDimension => "bad picture dimensions",
            EncodingError::Partition0Overflow => "first partition over 512k",
            EncodingError::PartitionOverflow => "token partition over 16M",
            EncodingError::BadWrite => "output writer failed",
            EncodingError::FileTooBig => "output over 4G",
            EncodingError::UserAbort => "aborted",
            EncodingError::Unknown => "unspecified libwebp failure",
        }
    }
}

impl From<libwebp_sys::WebPEncodingError> for EncodingError {
    fn from(code: libwebp_sys::WebPEncodingError) -> Self {
        use libwebp_sys::WebPEncodingError as E;
        match code {
            E::VP8_ENC_ERROR_OUT_OF_MEMORY => EncodingError::OutOfMemory,
            E::VP8_ENC_ERROR_BITSTREAM_OUT_OF_MEMORY => EncodingError::BitstreamOutOfMemory,
            E::VP8_ENC_ERROR_NULL_PARAMETER => EncodingError::NullParameter,
            E::VP8_ENC_ERROR_INVALID_CONFIGURATION => EncodingError::InvalidConfiguration,
            E::VP8_ENC_ERROR_BAD_DIMENSION => EncodingError::BadDimension,
            E::VP8_ENC_ERROR_PARTITION0_OVERFLOW => EncodingError::Partition0Overflow,
            E::VP8_ENC_ERROR_PARTITION_OVERFLOW => EncodingError::PartitionOverflow,
            E::VP8_ENC_ERROR_BAD_WRITE => EncodingError::BadWrite,
            E::VP8_ENC_ERROR_FILE_TOO_BIG => EncodingError::FileTooBig,
            E::VP8_ENC_ERROR_USER_ABORT => EncodingError::UserAbort,
            _ => EncodingError::Unknown,
        }
    }
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why libwebp rejected a bitstream, from its `VP8StatusCode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodingError {
    /// Allocation failed.
    OutOfMemory,
    /// The decoder was called with bad arguments.
    InvalidParam,
    /// The data is not a valid WebP bitstream.
    BitstreamError,
    /// Valid WebP using a feature this build does not decode
    /// (animation, for example).
    UnsupportedFeature,
    /// Incremental decoding paused.
    Suspended,
    /// Aborted by a progress hook.
    UserAbort,
    /// The data ends before the header or image is complete.
    NotEnoughData,
}

impl DecodingError {
    const fn as_str(self) -> &'static str {
        match self {
            DecodingError::OutOfMemory => "out of memory",
            DecodingError::InvalidParam => "invalid parameter",
            DecodingError::BitstreamError => "malformed bitstream",
            DecodingError::UnsupportedFeature => "unsupported feature",
            DecodingError::Suspended => "suspended",
            DecodingError::UserAbort => "aborted",
            DecodingError::NotEnoughData => "truncated data",
        }
    }
}

impl From<libwebp_sys::VP8StatusCode> for DecodingError {
    fn from(status: libwebp_sys::VP8StatusCode) -> Self {
        use libwebp_sys::VP8StatusCode as S;
        match status {
            S::VP8_STATUS_OUT_OF_MEMORY => DecodingError::OutOfMemory,
            S::VP8_STATUS_INVALID_PARAM => DecodingError::InvalidParam,
            S::VP8_STATUS_BITSTREAM_ERROR => DecodingError::BitstreamError,
            S::VP8_STATUS_UNSUPPORTED_FEATURE => DecodingError::UnsupportedFeature,
            S::VP8_STATUS_SUSPENDED => DecodingError::Suspended,
            S::VP8_STATUS_USER_ABORT => DecodingError::UserAbort,
            _ => DecodingError::NotEnoughData,
        }
    }
}

impl fmt::Display for DecodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Ok(())` for `VP8_STATUS_OK`, otherwise [`Error::DecodeFailed`].
pub(crate) fn check_status(status: libwebp_sys::VP8StatusCode) -> Result<()> {
    if status == libwebp_sys::VP8StatusCode::VP8_STATUS_OK {
        Ok(())
    } else {
        Err(at!(Error::DecodeFailed(DecodingError::from(status))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            Error::InvalidInput("x".into()).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            Error::EncodeFailed(EncodingError::BadDimension).kind(),
            ErrorKind::EncodeFailure
        );
        assert_eq!(
            Error::DecodeFailed(DecodingError::BitstreamError).kind(),
            ErrorKind::DecodeFailure
        );
        assert_eq!(Error::Worker("boom".into()).kind(), ErrorKind::Worker);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_io_error_message_names_path() {
        let path = std::path::Path::new("/nowhere/image.webp");
        let err = std::io::Error::from(std::io::ErrorKind::NotFound);
        let e = Error::io(path, &err);
        assert_eq!(e.kind(), ErrorKind::IoFailure);
        assert!(e.to_string().contains("/nowhere/image.webp"));
    }

    #[test]
    fn test_libwebp_code_conversion() {
        use libwebp_sys::{VP8StatusCode as S, WebPEncodingError as E};
        assert_eq!(
            EncodingError::from(E::VP8_ENC_ERROR_INVALID_CONFIGURATION),
            EncodingError::InvalidConfiguration
        );
        assert_eq!(EncodingError::from(E::VP8_ENC_OK), EncodingError::Unknown);
        assert_eq!(
            DecodingError::from(S::VP8_STATUS_BITSTREAM_ERROR),
            DecodingError::BitstreamError
        );
        assert_eq!(
            DecodingError::from(S::VP8_STATUS_NOT_ENOUGH_DATA),
            DecodingError::NotEnoughData
        );
    }

    #[test]
    fn test_check_status() {
        assert!(check_status(libwebp_sys::VP8StatusCode::VP8_STATUS_OK).is_ok());
        let err = check_status(libwebp_sys::VP8StatusCode::VP8_STATUS_UNSUPPORTED_FEATURE)
            .unwrap_err();
        assert_eq!(
            err.error(),
            &Error::DecodeFailed(DecodingError::UnsupportedFeature)
        );
        assert_eq!(err.error().to_string(), "decode failed: unsupported feature");
    }
}
