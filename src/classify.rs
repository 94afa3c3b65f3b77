//! Maps load failures to user-facing messages.

use crate::error::LoadError;
use std::fmt;

const NETWORK_SIGNATURES: &[&str] = &["Network error", "ProgressEvent"];
const SYNTAX_SIGNATURES: &[&str] = &["SyntaxError", "Unexpected token"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    NetworkUnavailable,
    MalformedContent { detail: String },
    MissingTexture { file: String },
    Unknown { detail: String },
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::NetworkUnavailable => f.write_str(
                "Unable to retrieve this file. Check the log output and your network connection.",
            ),
            ErrorCategory::MalformedContent { detail } => write!(
                f,
                "Unable to parse file content. Verify that this file is valid. Error: \"{}\"",
                detail
            ),
            ErrorCategory::MissingTexture { file } => write!(f, "Missing texture: {}", file),
            ErrorCategory::Unknown { detail } => f.write_str(detail),
        }
    }
}

/// Classify a load failure. Signatures are checked in priority order:
/// network, then syntax, then image target, then anything else.
pub fn classify(error: &LoadError) -> ErrorCategory {
    let message = error.to_string();
    if NETWORK_SIGNATURES
        .iter()
        .any(|signature| message.contains(signature))
    {
        return ErrorCategory::NetworkUnavailable;
    }
    if SYNTAX_SIGNATURES
        .iter()
        .any(|signature| message.contains(signature))
    {
        return ErrorCategory::MalformedContent { detail: message };
    }
    if let Some(src) = error.image_target() {
        let file = src.rsplit('/').next().unwrap_or(src).to_string();
        return ErrorCategory::MissingTexture { file };
    }
    ErrorCategory::Unknown { detail: message }
}
