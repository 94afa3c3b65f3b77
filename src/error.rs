//! Raw failure types raised while loading a bundle.

/// Failure reported by a viewer for one load attempt.
///
/// The display strings carry the signatures the classifier keys on, so keep
/// the `Network error` and `SyntaxError` prefixes intact when editing them.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoadError {
    #[error("Network error fetching {url}: {reason}")]
    Network { url: String, reason: String },
    #[error("SyntaxError: {0}")]
    Syntax(String),
    #[error("failed to load image {src}")]
    Image { src: String },
    #[error("failed to read {path}: {reason}")]
    Io { path: String, reason: String },
    #[error("viewer unavailable: {0}")]
    Unsupported(String),
    #[error("{0}")]
    Other(String),
}

impl LoadError {
    /// Source of the image element that failed, if this error came from one.
    pub fn image_target(&self) -> Option<&str> {
        match self {
            LoadError::Image { src } => Some(src),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("reference {0} was revoked before validation")]
    Revoked(String),
    #[error("validator could not start: {0}")]
    Spawn(#[from] std::io::Error),
}
