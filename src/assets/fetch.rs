//! Blocking remote fetches. Only call these off the event-loop thread.

use super::decode_uri;
use crate::defaults::MAX_FETCH_BYTES;
use crate::error::LoadError;
use std::io::Read;
use std::path::Path;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{url}: HTTP status {status}")]
    Status { url: String, status: u16 },
    #[error("{url}: {reason}")]
    Transport { url: String, reason: String },
    #[error("{url}: failed reading body: {source}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{url}: larger than {limit} bytes")]
    TooLarge { url: String, limit: u64 },
    #[error("{url}: invalid reference: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("{path}: {source}")]
    Local {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<FetchError> for LoadError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Status { url, status } => LoadError::Network {
                url,
                reason: format!("HTTP status {}", status),
            },
            FetchError::Transport { url, reason } => LoadError::Network { url, reason },
            FetchError::Body { url, source } => LoadError::Network {
                url,
                reason: source.to_string(),
            },
            FetchError::TooLarge { url, limit } => {
                LoadError::Other(format!("{} is larger than {} bytes", url, limit))
            }
            FetchError::InvalidUrl { url, source } => LoadError::Network {
                url,
                reason: source.to_string(),
            },
            FetchError::Local { path, source } => LoadError::Io {
                path,
                reason: source.to_string(),
            },
        }
    }
}

fn fetch_bytes(url: &str) -> Result<Vec<u8>, FetchError> {
    log::debug!("Fetching {}", url);
    let response = ureq::get(url).call().map_err(|err| match err {
        ureq::Error::Status(status, _) => FetchError::Status {
            url: url.to_string(),
            status,
        },
        ureq::Error::Transport(transport) => FetchError::Transport {
            url: url.to_string(),
            reason: transport.to_string(),
        },
    })?;

    read_capped(response.into_reader(), url, MAX_FETCH_BYTES)
}

/// Read at most `limit` bytes. One byte more means the source is too large.
fn read_capped(reader: impl Read, url: &str, limit: u64) -> Result<Vec<u8>, FetchError> {
    let mut bytes = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })?;
    if bytes.len() as u64 > limit {
        return Err(FetchError::TooLarge {
            url: url.to_string(),
            limit,
        });
    }
    Ok(bytes)
}

/// Fetch over HTTP, or read from disk when the upload host is a local
/// directory.
pub fn fetch_or_read(reference: &str) -> Result<Vec<u8>, FetchError> {
    if is_remote(reference) {
        return fetch_bytes(reference);
    }
    log::debug!("Reading {}", reference);
    let file = std::fs::File::open(reference).map_err(|source| FetchError::Local {
        path: reference.to_string(),
        source,
    })?;
    read_capped(file, reference, MAX_FETCH_BYTES).map_err(|err| match err {
        FetchError::Body { url, source } => FetchError::Local { path: url, source },
        other => other,
    })
}

/// Resolve a descriptor's resource `uri` against the descriptor's location.
///
/// Remote bases follow URL reference resolution, so root-relative and `..`
/// references work. Local bases join onto the descriptor's directory.
pub fn join_url(base: &str, relative: &str) -> Result<String, FetchError> {
    if !is_remote(base) {
        let directory = Path::new(base).parent().unwrap_or(Path::new(""));
        return Ok(directory
            .join(decode_uri(relative))
            .to_string_lossy()
            .into_owned());
    }
    let invalid = |source| FetchError::InvalidUrl {
        url: base.to_string(),
        source,
    };
    let joined = Url::parse(base).map_err(invalid)?.join(relative).map_err(invalid)?;
    Ok(joined.into())
}

pub fn is_remote(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}
