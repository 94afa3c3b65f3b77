//! Post-load structural report over the dropped bundle.

use crate::assets::fetch::fetch_or_read;
use crate::assets::{is_root_descriptor, resource_key, FileBlob, Fileset};
use crate::error::ValidationError;
use crate::scene::document::{self, GltfDocument, ParsedDocument};
use crate::scene::SceneHandle;
use crate::scope::{BlobRegistry, OBJECT_URL_PREFIX};
use crate::session::Validator;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub asset: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub infos: Vec<String>,
}

impl ValidationReport {
    pub fn summary(&self) -> String {
        format!(
            "{}: {} errors, {} warnings, {} infos",
            self.asset,
            self.errors.len(),
            self.warnings.len(),
            self.infos.len()
        )
    }
}

enum Source {
    Blob(FileBlob),
    Remote(String),
}

/// Builds a [`ValidationReport`] on a worker thread and logs it. The latest
/// report is kept for diagnostics.
pub struct ReportValidator {
    registry: Rc<BlobRegistry>,
    latest: Arc<Mutex<Option<ValidationReport>>>,
}

impl ReportValidator {
    pub fn new(registry: Rc<BlobRegistry>) -> Self {
        Self {
            registry,
            latest: Arc::new(Mutex::new(None)),
        }
    }

    pub fn latest_report(&self) -> Arc<Mutex<Option<ValidationReport>>> {
        Arc::clone(&self.latest)
    }
}

impl Validator for ReportValidator {
    fn validate(
        &mut self,
        reference: &str,
        base_path: &str,
        fileset: Option<&Fileset>,
        scene: &SceneHandle,
    ) -> Result<(), ValidationError> {
        // Resolve the reference now; it is revoked right after this returns.
        let source = if reference.starts_with(OBJECT_URL_PREFIX) {
            let blob = self
                .registry
                .resolve(reference)
                .ok_or_else(|| ValidationError::Revoked(reference.to_string()))?;
            Source::Blob(blob)
        } else {
            Source::Remote(reference.to_string())
        };

        let asset = scene.name.clone();
        let base_path = base_path.to_string();
        let fileset = fileset.cloned();
        let latest = Arc::clone(&self.latest);
        thread::Builder::new()
            .name("validator".to_string())
            .spawn(move || {
                let bytes = match &source {
                    Source::Blob(blob) => blob.read().map_err(|err| err.to_string()),
                    Source::Remote(url) => fetch_or_read(url).map_err(|err| err.to_string()),
                };
                let report = match bytes {
                    Ok(bytes) => build_report(&asset, &bytes, &base_path, fileset.as_ref()),
                    Err(reason) => ValidationReport {
                        asset: asset.clone(),
                        errors: vec![format!("Unable to read asset: {}", reason)],
                        ..ValidationReport::default()
                    },
                };
                log_report(&report);
                if let Ok(mut slot) = latest.lock() {
                    *slot = Some(report);
                }
            })?;
        Ok(())
    }
}

fn log_report(report: &ValidationReport) {
    if report.errors.is_empty() {
        log::info!("Validation {}", report.summary());
    } else {
        log::warn!("Validation {}", report.summary());
    }
    for message in &report.errors {
        log::warn!("  error: {}", message);
    }
    for message in &report.warnings {
        log::info!("  warning: {}", message);
    }
    for message in &report.infos {
        log::debug!("  info: {}", message);
    }
}

pub fn build_report(
    asset: &str,
    bytes: &[u8],
    base_path: &str,
    fileset: Option<&Fileset>,
) -> ValidationReport {
    let mut report = ValidationReport {
        asset: asset.to_string(),
        ..ValidationReport::default()
    };
    let parsed = match document::parse(bytes) {
        Ok(parsed) => parsed,
        Err(err) => {
            report.errors.push(err.to_string());
            return report;
        }
    };
    check_document(&parsed.document, &mut report);
    check_embedded_buffers(&parsed, &mut report);
    if let Some(fileset) = fileset {
        check_fileset(&parsed.document, base_path, fileset, &mut report);
    }
    report
}

fn check_document(document: &GltfDocument, report: &mut ValidationReport) {
    if document.asset.version != "2.0" {
        report.errors.push(format!(
            "Unsupported asset version '{}'",
            document.asset.version
        ));
    }
    if let Some(min_version) = &document.asset.min_version {
        if min_version.as_str() > document.asset.version.as_str() {
            report.errors.push(format!(
                "minVersion {} is greater than version {}",
                min_version, document.asset.version
            ));
        }
    }
    match &document.asset.generator {
        Some(generator) => report.infos.push(format!("Generator: {}", generator)),
        None => report.infos.push("Asset has no generator".to_string()),
    }
    if document.nodes.is_empty() {
        report.warnings.push("Asset has no nodes".to_string());
    }
    for (index, node) in document.nodes.iter().enumerate() {
        if let Some(mesh) = node.mesh {
            if mesh >= document.meshes.len() {
                report
                    .errors
                    .push(format!("Node {} references missing mesh {}", index, mesh));
            }
        }
    }
    for (index, image) in document.images.iter().enumerate() {
        if image.uri.is_none() && image.buffer_view.is_none() {
            report
                .errors
                .push(format!("Image {} has neither uri nor bufferView", index));
        }
        if image.buffer_view.is_some() && image.mime_type.is_none() {
            report
                .errors
                .push(format!("Image {} uses a bufferView without mimeType", index));
        }
    }
}

/// Buffers without a uri live in the GLB BIN chunk.
fn check_embedded_buffers(parsed: &ParsedDocument, report: &mut ValidationReport) {
    for (index, buffer) in parsed.document.buffers.iter().enumerate() {
        if buffer.uri.is_some() {
            continue;
        }
        match parsed.binary_chunk_len {
            None => report.errors.push(format!(
                "Buffer {} has no uri and the asset has no BIN chunk",
                index
            )),
            Some(len) if len < buffer.byte_length => report.errors.push(format!(
                "Buffer {} declares {} bytes but the BIN chunk holds {}",
                index, buffer.byte_length, len
            )),
            Some(_) => {}
        }
    }
}

fn check_fileset(
    document: &GltfDocument,
    base_path: &str,
    fileset: &Fileset,
    report: &mut ValidationReport,
) {
    let referenced: Vec<String> = document
        .external_resources()
        .iter()
        .map(|resource| resource_key(base_path, &resource.uri))
        .collect();
    for path in &referenced {
        if fileset.get(path).is_none() {
            report
                .errors
                .push(format!("Resource {} was not supplied", path));
        }
    }
    for path in fileset.paths() {
        if !is_root_descriptor(path) && !referenced.iter().any(|candidate| candidate == path) {
            report
                .warnings
                .push(format!("File {} is not referenced by the asset", path));
        }
    }
}
