//! Built-in constants and their environment overrides.

/// Host that `?file=` names are resolved against.
pub const UPLOAD_HOST: &str = "https://storage.googleapis.com/dropview-uploads";

/// Environment variable overriding [`UPLOAD_HOST`].
pub const UPLOAD_HOST_ENV: &str = "DROPVIEW_UPLOAD_HOST";

pub const WINDOW_TITLE: &str = "dropview";
pub const WINDOW_SIZE: (u32, u32) = (1280, 720);

/// Upper bound for a single fetched or read model file.
pub const MAX_FETCH_BYTES: u64 = 512 * 1024 * 1024;

pub fn upload_host() -> String {
    match std::env::var(UPLOAD_HOST_ENV) {
        Ok(host) if !host.trim().is_empty() => host.trim().to_string(),
        _ => UPLOAD_HOST.to_string(),
    }
}
