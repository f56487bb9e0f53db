// src/error.rs
//
// Unified error handling for iiif-image
// Uses thiserror for simple, type-safe error handling
//
// Error Taxonomy:
// - ClientError: malformed or out-of-range request parameters (HTTP 400)
// - UnsupportedFormat: output format we cannot produce (HTTP 415)
// - SizeRestricted: size outside the restricted allow-list (HTTP 403)
// - SourceFormat: source bytes do not match their declared format
// - CodecError: decode/encode/ICC/raster failures
// - InternalBug: Library bugs (should not happen)

use std::borrow::Cow;
use thiserror::Error;

/// Error taxonomy used by the resource layer to choose a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCategory {
    /// Malformed or out-of-range request parameters
    ClientError,
    /// Output format not supported
    UnsupportedFormat,
    /// Requested size not in the allow-list
    SizeRestricted,
    /// Declared source format does not match the actual bytes
    SourceFormat,
    /// Format/encoding/raster issues
    CodecError,
    /// Library bugs (should not happen)
    InternalBug,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::ClientError => "ClientError",
            ErrorCategory::UnsupportedFormat => "UnsupportedFormat",
            ErrorCategory::SizeRestricted => "SizeRestricted",
            ErrorCategory::SourceFormat => "SourceFormat",
            ErrorCategory::CodecError => "CodecError",
            ErrorCategory::InternalBug => "InternalBug",
        }
    }

    /// HTTP status the resource layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCategory::ClientError => 400,
            ErrorCategory::SizeRestricted => 403,
            ErrorCategory::UnsupportedFormat => 415,
            ErrorCategory::SourceFormat
            | ErrorCategory::CodecError
            | ErrorCategory::InternalBug => 500,
        }
    }
}

/// iiif-image error types
///
/// Every variant names the parameter or stage involved and carries the
/// offending value, so the resource layer can build an actionable message.
#[derive(Debug, Error)]
pub enum IiifError {
    // Request parameter errors
    #[error("Invalid {name}: '{value}'. {reason}")]
    InvalidArgument {
        name: Cow<'static, str>,
        value: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    #[error("Unsupported quality: '{value}'. Valid values are: {valid}")]
    InvalidQuality {
        value: Cow<'static, str>,
        valid: Cow<'static, str>,
    },

    #[error("Crop region ({x},{y},{width},{height}) does not intersect the {img_width}x{img_height} image")]
    EmptyRegion {
        x: i64,
        y: i64,
        width: i64,
        height: i64,
        img_width: u64,
        img_height: u64,
    },

    #[error("Requested size {width}x{height} exceeds the {limit}")]
    SizeLimitExceeded {
        width: u64,
        height: u64,
        limit: Cow<'static, str>,
    },

    #[error("Upscaling is not allowed: requested {width}x{height} exceeds region {region_width}x{region_height}")]
    UpscalingNotAllowed {
        width: u64,
        height: u64,
        region_width: u64,
        region_height: u64,
    },

    #[error("Operation list is frozen; cannot {action}")]
    FrozenOperationList { action: Cow<'static, str> },

    #[error("Operation list already contains a {operation}")]
    DuplicateOperation { operation: Cow<'static, str> },

    // Format errors
    #[error("Unsupported output format: {format}")]
    UnsupportedFormat { format: Cow<'static, str> },

    #[error("Size {width}x{height} is not one of the sizes allowed for this image")]
    SizeRestricted { width: u64, height: u64 },

    #[error("Source declared as {declared} but its contents look like {detected}")]
    SourceFormatMismatch {
        declared: Cow<'static, str>,
        detected: Cow<'static, str>,
    },

    // Codec / raster errors
    #[error("Failed to read source '{path}': {source}")]
    SourceReadFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode image: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    #[error("Failed to encode as {format}: {message}")]
    EncodeFailed {
        format: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    #[error("ICC profile error: {message}")]
    IccProfile { message: Cow<'static, str> },

    #[error("Raster error in {stage}: {message}")]
    Raster {
        stage: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    #[error("Failed to write output: {source}")]
    OutputWriteFailed {
        #[source]
        source: std::io::Error,
    },

    #[error("Page index {index} out of range (image has {count} pages)")]
    PageOutOfRange { index: usize, count: usize },

    // Arithmetic
    #[error("Arithmetic error: {message}")]
    Arithmetic { message: Cow<'static, str> },

    // Internal Errors
    #[error("Internal error: {message}")]
    InternalPanic { message: Cow<'static, str> },
}

impl Clone for IiifError {
    fn clone(&self) -> Self {
        match self {
            Self::InvalidArgument {
                name,
                value,
                reason,
            } => Self::InvalidArgument {
                name: name.clone(),
                value: value.clone(),
                reason: reason.clone(),
            },
            Self::InvalidQuality { value, valid } => Self::InvalidQuality {
                value: value.clone(),
                valid: valid.clone(),
            },
            Self::EmptyRegion {
                x,
                y,
                width,
                height,
                img_width,
                img_height,
            } => Self::EmptyRegion {
                x: *x,
                y: *y,
                width: *width,
                height: *height,
                img_width: *img_width,
                img_height: *img_height,
            },
            Self::SizeLimitExceeded {
                width,
                height,
                limit,
            } => Self::SizeLimitExceeded {
                width: *width,
                height: *height,
                limit: limit.clone(),
            },
            Self::UpscalingNotAllowed {
                width,
                height,
                region_width,
                region_height,
            } => Self::UpscalingNotAllowed {
                width: *width,
                height: *height,
                region_width: *region_width,
                region_height: *region_height,
            },
            Self::FrozenOperationList { action } => Self::FrozenOperationList {
                action: action.clone(),
            },
            Self::DuplicateOperation { operation } => Self::DuplicateOperation {
                operation: operation.clone(),
            },
            Self::UnsupportedFormat { format } => Self::UnsupportedFormat {
                format: format.clone(),
            },
            Self::SizeRestricted { width, height } => Self::SizeRestricted {
                width: *width,
                height: *height,
            },
            Self::SourceFormatMismatch { declared, detected } => Self::SourceFormatMismatch {
                declared: declared.clone(),
                detected: detected.clone(),
            },
            Self::SourceReadFailed { path, source } => Self::SourceReadFailed {
                path: path.clone(),
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            Self::DecodeFailed { message } => Self::DecodeFailed {
                message: message.clone(),
            },
            Self::EncodeFailed { format, message } => Self::EncodeFailed {
                format: format.clone(),
                message: message.clone(),
            },
            Self::IccProfile { message } => Self::IccProfile {
                message: message.clone(),
            },
            Self::Raster { stage, message } => Self::Raster {
                stage: stage.clone(),
                message: message.clone(),
            },
            Self::OutputWriteFailed { source } => Self::OutputWriteFailed {
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            Self::PageOutOfRange { index, count } => Self::PageOutOfRange {
                index: *index,
                count: *count,
            },
            Self::Arithmetic { message } => Self::Arithmetic {
                message: message.clone(),
            },
            Self::InternalPanic { message } => Self::InternalPanic {
                message: message.clone(),
            },
        }
    }
}

// Constructor Helpers
impl IiifError {
    pub fn invalid_argument(
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_quality(
        value: impl Into<Cow<'static, str>>,
        valid: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidQuality {
            value: value.into(),
            valid: valid.into(),
        }
    }

    pub fn empty_region(rect: (i64, i64, i64, i64), image: (u64, u64)) -> Self {
        Self::EmptyRegion {
            x: rect.0,
            y: rect.1,
            width: rect.2,
            height: rect.3,
            img_width: image.0,
            img_height: image.1,
        }
    }

    pub fn size_limit_exceeded(
        width: u64,
        height: u64,
        limit: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::SizeLimitExceeded {
            width,
            height,
            limit: limit.into(),
        }
    }

    pub fn upscaling_not_allowed(requested: (u64, u64), region: (u64, u64)) -> Self {
        Self::UpscalingNotAllowed {
            width: requested.0,
            height: requested.1,
            region_width: region.0,
            region_height: region.1,
        }
    }

    pub fn frozen_operation_list(action: impl Into<Cow<'static, str>>) -> Self {
        Self::FrozenOperationList {
            action: action.into(),
        }
    }

    pub fn duplicate_operation(operation: impl Into<Cow<'static, str>>) -> Self {
        Self::DuplicateOperation {
            operation: operation.into(),
        }
    }

    pub fn unsupported_format(format: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn size_restricted(width: u64, height: u64) -> Self {
        Self::SizeRestricted { width, height }
    }

    pub fn source_format_mismatch(
        declared: impl Into<Cow<'static, str>>,
        detected: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::SourceFormatMismatch {
            declared: declared.into(),
            detected: detected.into(),
        }
    }

    pub fn source_read_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::SourceReadFailed {
            path: path.into(),
            source,
        }
    }

    pub fn decode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn encode_failed(
        format: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn icc_profile(message: impl Into<Cow<'static, str>>) -> Self {
        Self::IccProfile {
            message: message.into(),
        }
    }

    pub fn raster(
        stage: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::Raster {
            stage: stage.into(),
            message: message.into(),
        }
    }

    pub fn output_write_failed(source: std::io::Error) -> Self {
        Self::OutputWriteFailed { source }
    }

    pub fn page_out_of_range(index: usize, count: usize) -> Self {
        Self::PageOutOfRange { index, count }
    }

    pub fn arithmetic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Arithmetic {
            message: message.into(),
        }
    }

    pub fn internal_panic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InternalPanic {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable by the client changing its request.
    ///
    /// Raster inputs are deterministic, so codec and internal failures are
    /// never worth retrying.
    pub fn is_recoverable(&self) -> bool {
        match self.category() {
            ErrorCategory::ClientError
            | ErrorCategory::UnsupportedFormat
            | ErrorCategory::SizeRestricted => true,
            ErrorCategory::SourceFormat
            | ErrorCategory::CodecError
            | ErrorCategory::InternalBug => false,
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidArgument { .. }
            | Self::InvalidQuality { .. }
            | Self::EmptyRegion { .. }
            | Self::SizeLimitExceeded { .. }
            | Self::UpscalingNotAllowed { .. }
            | Self::PageOutOfRange { .. } => ErrorCategory::ClientError,

            Self::UnsupportedFormat { .. } => ErrorCategory::UnsupportedFormat,

            Self::SizeRestricted { .. } => ErrorCategory::SizeRestricted,

            Self::SourceFormatMismatch { .. } => ErrorCategory::SourceFormat,

            Self::SourceReadFailed { .. }
            | Self::DecodeFailed { .. }
            | Self::EncodeFailed { .. }
            | Self::IccProfile { .. }
            | Self::Raster { .. }
            | Self::OutputWriteFailed { .. } => ErrorCategory::CodecError,

            Self::FrozenOperationList { .. }
            | Self::DuplicateOperation { .. }
            | Self::Arithmetic { .. }
            | Self::InternalPanic { .. } => ErrorCategory::InternalBug,
        }
    }

    pub fn http_status(&self) -> u16 {
        self.category().http_status()
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, IiifError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_value() {
        let err = IiifError::invalid_argument("region", "1,2,x,4", "width must be a number");
        assert!(err.to_string().contains("1,2,x,4"));
        assert!(err.to_string().contains("region"));
    }

    #[test]
    fn test_quality_error_lists_valid_values() {
        let err = IiifError::invalid_quality("sepia", "bitonal, color, default, gray");
        let msg = err.to_string();
        assert!(msg.contains("sepia"));
        assert!(msg.contains("bitonal, color, default, gray"));
    }

    #[test]
    fn test_error_recoverable() {
        assert!(IiifError::invalid_argument("size", "0,", "zero").is_recoverable());
        assert!(IiifError::unsupported_format("bmp").is_recoverable());
        assert!(IiifError::size_restricted(10, 10).is_recoverable());
        assert!(!IiifError::decode_failed("test").is_recoverable());
        assert!(!IiifError::source_format_mismatch("jpg", "png").is_recoverable());
        assert!(!IiifError::internal_panic("test").is_recoverable());
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(IiifError::invalid_argument("a", "b", "c").http_status(), 400);
        assert_eq!(IiifError::invalid_quality("x", "y").http_status(), 400);
        assert_eq!(IiifError::unsupported_format("bmp").http_status(), 415);
        assert_eq!(IiifError::size_restricted(1, 1).http_status(), 403);
        assert_eq!(IiifError::encode_failed("jpg", "x").http_status(), 500);
        assert_eq!(IiifError::icc_profile("corrupt").http_status(), 500);
    }

    #[test]
    fn test_error_category_client_error() {
        assert_eq!(
            IiifError::empty_region((10, 10, 5, 5), (4, 4)).category(),
            ErrorCategory::ClientError
        );
        assert_eq!(
            IiifError::upscaling_not_allowed((200, 200), (100, 100)).category(),
            ErrorCategory::ClientError
        );
        assert_eq!(
            IiifError::size_limit_exceeded(10, 10, "max pixels").category(),
            ErrorCategory::ClientError
        );
    }

    #[test]
    fn test_error_category_internal_bug() {
        assert_eq!(
            IiifError::arithmetic("denominator is zero").category(),
            ErrorCategory::InternalBug
        );
        assert_eq!(
            IiifError::frozen_operation_list("add").category(),
            ErrorCategory::InternalBug
        );
    }

    #[test]
    fn test_clone_preserves_io_kind() {
        let err = IiifError::source_read_failed(
            "/tmp/x.jpg",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        match err.clone() {
            IiifError::SourceReadFailed { path, source } => {
                assert_eq!(path, "/tmp/x.jpg");
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected clone: {other:?}"),
        }
    }

    #[test]
    fn test_category_as_str() {
        assert_eq!(ErrorCategory::ClientError.as_str(), "ClientError");
        assert_eq!(ErrorCategory::InternalBug.as_str(), "InternalBug");
    }
}
