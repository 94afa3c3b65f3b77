//! Launch options parsed from a location href such as
//! `dropview://open?file=statue_jane-doe.glb&kiosk=1`.

use crate::assets::decode_uri;
use crate::defaults;

/// Immutable launch configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    kiosk: bool,
    model_source: String,
    preset: String,
    camera_position: Option<Vec<f64>>,
}

impl Configuration {
    pub fn kiosk(&self) -> bool {
        self.kiosk
    }

    /// Remote model to load at startup; empty when none was given.
    pub fn model_source(&self) -> &str {
        &self.model_source
    }

    pub fn preset(&self) -> &str {
        &self.preset
    }

    pub fn camera_position(&self) -> Option<&[f64]> {
        self.camera_position.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaunchOptions {
    pub config: Configuration,
    /// Creator name derived from the `file` parameter, shown next to the view.
    pub annotation: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AnnotationError {
    #[error("file name '{0}' has no extension")]
    NoExtension(String),
    #[error("file name '{0}' has no creator segment")]
    EmptyName(String),
}

pub fn parse(location_href: &str) -> LaunchOptions {
    parse_with_host(location_href, &defaults::upload_host())
}

pub fn parse_with_host(location_href: &str, upload_host: &str) -> LaunchOptions {
    let params = Params::from_href(location_href);

    let mut annotation = None;
    let model_source = match params.value("file").filter(|file| !file.is_empty()) {
        Some(file) => {
            match creator_name(file) {
                Ok(name) => annotation = Some(name),
                Err(err) => log::warn!("Skipping creator annotation: {}", err),
            }
            format!("{}/{}", upload_host.trim_end_matches('/'), file)
        }
        None => params.value("model").unwrap_or_default().to_string(),
    };

    let kiosk = params.value("kiosk").is_some_and(is_truthy);
    let camera_position = params
        .value("cameraPosition")
        .filter(|value| !value.is_empty())
        .map(|value| value.split(',').map(parse_number).collect());

    let config = Configuration {
        kiosk,
        model_source,
        preset: params.value("preset").unwrap_or_default().to_string(),
        camera_position,
    };
    log::debug!("Launch configuration: {:?}", config);
    LaunchOptions { config, annotation }
}

/// `statue_jane-doe.glb` -> `jane doe`.
pub fn creator_name(file: &str) -> Result<String, AnnotationError> {
    let name = file.rsplit('/').next().unwrap_or(file);
    let (stem, _extension) = name
        .rsplit_once('.')
        .ok_or_else(|| AnnotationError::NoExtension(name.to_string()))?;
    let creator = stem.split('_').last().unwrap_or_default().replace('-', " ");
    let creator = creator.trim();
    if creator.is_empty() {
        return Err(AnnotationError::EmptyName(name.to_string()));
    }
    Ok(creator.to_string())
}

fn is_truthy(value: &str) -> bool {
    !(value.is_empty() || value == "0" || value.eq_ignore_ascii_case("false"))
}

/// Lenient numeric parse: blank is zero, garbage is NaN.
fn parse_number(token: &str) -> f64 {
    let token = token.trim();
    if token.is_empty() {
        return 0.0;
    }
    token.parse().unwrap_or(f64::NAN)
}

struct Params {
    pairs: Vec<(String, String)>,
}

impl Params {
    /// Query parameters first, then fragment parameters, so a query value
    /// shadows a fragment value with the same key.
    fn from_href(href: &str) -> Self {
        let (before_fragment, fragment) = match href.split_once('#') {
            Some((head, fragment)) => (head, fragment),
            None => (href, ""),
        };
        let query = before_fragment
            .split_once('?')
            .map(|(_, query)| query)
            .unwrap_or("");
        let fragment = fragment.strip_prefix('?').unwrap_or(fragment);

        let mut pairs = Vec::new();
        for part in query.split('&').chain(fragment.split('&')) {
            if part.is_empty() {
                continue;
            }
            let (key, value) = part.split_once('=').unwrap_or((part, ""));
            pairs.push((decode_component(key), decode_component(value)));
        }
        Self { pairs }
    }

    fn value(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, value)| value.as_str())
    }
}

fn decode_component(raw: &str) -> String {
    decode_uri(&raw.replace('+', " "))
}
