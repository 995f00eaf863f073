use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while inspecting or capturing a document.
#[derive(Debug, Error)]
pub enum SnapError {
    #[error("file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("page {page} does not exist; document has {page_count} pages")]
    OutOfRange { page: u32, page_count: u32 },

    #[error("page {page}: {source}")]
    Render {
        page: u32,
        #[source]
        source: RenderError,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("page {page}: image encoding failed: {message}")]
    Encode { page: u32, message: String },

    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SnapError {
    /// Structural errors abort the whole invocation; the rest are scoped to
    /// a single page of a batch.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SnapError::InputNotFound(_)
                | SnapError::MalformedDocument(_)
                | SnapError::InvalidArgument(_)
        )
    }

    /// The page an isolated failure belongs to.
    pub fn page(&self) -> Option<u32> {
        match self {
            SnapError::OutOfRange { page, .. }
            | SnapError::Render { page, .. }
            | SnapError::Encode { page, .. } => Some(*page),
            _ => None,
        }
    }
}

/// Content on an otherwise valid page could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("render error: {message}")]
pub struct RenderError {
    pub message: String,
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<lopdf::Error> for RenderError {
    fn from(err: lopdf::Error) -> Self {
        RenderError::new(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_page_or_path() {
        let err = SnapError::OutOfRange {
            page: 7,
            page_count: 3,
        };
        assert_eq!(
            err.to_string(),
            "page 7 does not exist; document has 3 pages"
        );
        assert_eq!(err.page(), Some(7));
        assert!(!err.is_fatal());

        let err = SnapError::InputNotFound(PathBuf::from("missing.pdf"));
        assert_eq!(err.to_string(), "file not found: missing.pdf");
        assert!(err.is_fatal());

        let err = SnapError::Render {
            page: 2,
            source: RenderError::new("unknown xobject /Im9"),
        };
        assert_eq!(err.to_string(), "page 2: render error: unknown xobject /Im9");
    }
}
