//! Error Type Definition Module
//!
//! This module defines the closed set of errors that can escape the import
//! pipeline. Every failure inside a sub-step is either absorbed locally (and
//! logged) or folded into one of the three variants of [ImportError].
//!
//! The `Display` text of each variant is the message meant for the user;
//! diagnostic detail travels in the `reason` field of
//! [ImportError::ExtractionFailed] and is only ever logged.

use thiserror::Error;

/// Types of errors that can occur while importing a document
///
/// This enumeration is intentionally closed. Callers are expected to show
/// the `Display` text as a single human-readable message and leave any
/// existing library state untouched.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Unsupported file type error
    ///
    /// The format could be resolved neither from the detected content type
    /// hint nor from the file extension.
    #[error("Unsupported file type. Import a PDF or EPUB file.")]
    UnsupportedFileType,

    /// Extraction failure error
    ///
    /// The archive or its structural metadata could not be located or parsed,
    /// e.g. a missing `META-INF/container.xml` or a missing `rootfile` declaration.
    #[error("Could not read this EPUB file. It may be corrupted or DRM-protected.")]
    ExtractionFailed { reason: String },

    /// No readable text error
    ///
    /// The pipeline completed but produced an empty word stream, which is
    /// typical for image-only scanned documents.
    #[error("Could not extract text from this document. It may be image-only.")]
    NoReadableText,
}

impl ImportError {
    /// Creates an [ImportError::ExtractionFailed] with the given diagnostic reason
    pub fn extraction_failed(reason: impl Into<String>) -> Self {
        ImportError::ExtractionFailed {
            reason: reason.into(),
        }
    }

    /// Returns the message suitable for presenting to the user
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// Returns the diagnostic reason, if the variant carries one
    pub fn reason(&self) -> Option<&str> {
        match self {
            ImportError::ExtractionFailed { reason } => Some(reason),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(value: std::io::Error) -> Self {
        ImportError::extraction_failed(format!("IO error: {value}"))
    }
}

#[cfg(test)]
impl PartialEq for ImportError {
    fn eq(&self, other: &Self) -> bool {
        core::mem::discriminant(self) == core::mem::discriminant(other)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ImportError;

    #[test]
    fn test_user_messages() {
        assert_eq!(
            ImportError::UnsupportedFileType.user_message(),
            "Unsupported file type. Import a PDF or EPUB file."
        );
        assert_eq!(
            ImportError::extraction_failed("missing rootfile").user_message(),
            "Could not read this EPUB file. It may be corrupted or DRM-protected."
        );
        assert_eq!(
            ImportError::NoReadableText.user_message(),
            "Could not extract text from this document. It may be image-only."
        );
    }

    /// The diagnostic reason must never leak into the displayed message
    #[test]
    fn test_reason_is_not_displayed() {
        let err = ImportError::extraction_failed("Non-canonical file: rootfile");
        assert_eq!(err.reason(), Some("Non-canonical file: rootfile"));
        assert!(!err.to_string().contains("rootfile"));
        assert_eq!(ImportError::NoReadableText.reason(), None);
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = ImportError::from(io);
        assert_eq!(err, ImportError::extraction_failed(""));
        assert!(err.reason().unwrap().contains("gone"));
    }
}
