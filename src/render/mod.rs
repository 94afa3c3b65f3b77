//! Headless scene loader: fetches and inspects a bundle off the event loop
//! and reports a [`SceneHandle`] summary back through a settlement sink.

pub mod camera;

use crate::assets::fetch::{fetch_or_read, join_url};
use crate::assets::{file_name, resource_key, FileBlob, Fileset};
use crate::error::LoadError;
use crate::options::Configuration;
use crate::scene::document::{self, ExternalResource, GltfDocument, ResourceKind};
use crate::scene::SceneHandle;
use crate::scope::{BlobRegistry, OBJECT_URL_PREFIX};
use crate::session::{LoadId, LoadRequest, Settlement, Viewer};
use camera::{camera_override, CameraFraming, CameraPreset};
use image::ImageFormat;
use sha2::{Digest, Sha256};
use std::rc::Rc;
use std::sync::Arc;
use std::thread;

/// Where finished loads are posted; must be callable from worker threads.
pub type SettlementSink = Arc<dyn Fn(Settlement) + Send + Sync>;

const DECODABLE_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Texture decoders a load relies on.
const REQUIRED_DECODERS: &[ImageFormat] = &[ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::WebP];

pub struct SceneLoader {
    registry: Rc<BlobRegistry>,
    sink: SettlementSink,
    preset: CameraPreset,
    camera_position: Option<[f32; 3]>,
    last_load: Option<LoadId>,
}

impl SceneLoader {
    /// Fails with [`LoadError::Unsupported`] when this build cannot decode
    /// the texture formats a load relies on.
    pub fn new(
        registry: Rc<BlobRegistry>,
        sink: SettlementSink,
        config: &Configuration,
    ) -> Result<Self, LoadError> {
        require_decoders(REQUIRED_DECODERS)?;
        Ok(Self {
            registry,
            sink,
            preset: CameraPreset::from_name(config.preset()),
            camera_position: camera_override(config.camera_position()),
            last_load: None,
        })
    }

    fn deliver(&self, id: LoadId, result: Result<SceneHandle, LoadError>) {
        (self.sink)(Settlement { id, result });
    }
}

impl Viewer for SceneLoader {
    fn load(&mut self, request: LoadRequest<'_>) {
        let id = request.id;
        let root = if request.reference.starts_with(OBJECT_URL_PREFIX) {
            match self.registry.resolve(request.reference) {
                Some(blob) => RootSource::Blob(blob),
                None => {
                    self.deliver(
                        id,
                        Err(LoadError::Other(format!(
                            "object reference {} is no longer valid",
                            request.reference
                        ))),
                    );
                    return;
                }
            }
        } else {
            RootSource::Remote(request.reference.to_string())
        };

        let job = LoadJob {
            root,
            base_path: request.base_path.to_string(),
            fileset: request.fileset.cloned(),
            preset: self.preset,
            camera_position: self.camera_position,
        };
        self.last_load = Some(id);

        let sink = Arc::clone(&self.sink);
        let spawned = thread::Builder::new()
            .name(format!("load-{}", id))
            .spawn(move || {
                let result = job.run();
                if let Err(err) = &result {
                    log::debug!("Load #{} failed on worker: {}", id, err);
                }
                sink(Settlement { id, result });
            });
        if let Err(err) = spawned {
            self.deliver(
                id,
                Err(LoadError::Other(format!(
                    "failed to start loader thread: {}",
                    err
                ))),
            );
        }
    }

    fn clear(&mut self) {
        if let Some(id) = self.last_load.take() {
            log::debug!("Clearing view of load #{}", id);
        }
    }
}

enum RootSource {
    Blob(FileBlob),
    Remote(String),
}

struct LoadJob {
    root: RootSource,
    base_path: String,
    fileset: Option<Fileset>,
    preset: CameraPreset,
    camera_position: Option<[f32; 3]>,
}

impl LoadJob {
    fn run(self) -> Result<SceneHandle, LoadError> {
        let bytes = self.read_root()?;
        let parsed = document::parse(&bytes)?;
        self.check_resources(&parsed.document)?;

        let (center, extent) = parsed
            .document
            .bounds()
            .unwrap_or(([0.0; 3], [0.0; 3]));
        let framing =
            CameraFraming::from_bounds(center, extent, self.preset, self.camera_position);
        let GltfDocument {
            asset,
            nodes,
            meshes,
            images,
            ..
        } = parsed.document;

        Ok(SceneHandle {
            name: self.display_name(),
            generator: asset.generator,
            node_count: nodes.len(),
            mesh_count: meshes.len(),
            image_count: images.len(),
            center,
            extent,
            camera_position: framing.position,
            digest: format!("{:x}", Sha256::digest(&bytes)),
        })
    }

    fn display_name(&self) -> String {
        match &self.root {
            RootSource::Blob(FileBlob::Path(path)) => path
                .file_name()
                .and_then(|value| value.to_str())
                .unwrap_or("scene")
                .to_string(),
            #[cfg(test)]
            RootSource::Blob(FileBlob::Bytes(_)) => "scene".to_string(),
            RootSource::Remote(url) => {
                file_name(url.split(['?', '#']).next().unwrap_or(url)).to_string()
            }
        }
    }

    fn read_root(&self) -> Result<Vec<u8>, LoadError> {
        match &self.root {
            RootSource::Blob(blob) => blob.read().map_err(|err| LoadError::Io {
                path: blob.describe(),
                reason: err.to_string(),
            }),
            RootSource::Remote(url) => Ok(fetch_or_read(url)?),
        }
    }

    fn check_resources(&self, document: &GltfDocument) -> Result<(), LoadError> {
        for resource in document.external_resources() {
            let bytes = self.read_resource(&resource)?;
            if resource.kind == ResourceKind::Image && is_decodable(&resource.uri) {
                if let Err(err) = image::load_from_memory(&bytes) {
                    log::warn!("Texture {} failed to decode: {}", resource.uri, err);
                    return Err(LoadError::Image {
                        src: self.resource_location(&resource)?,
                    });
                }
            }
        }
        Ok(())
    }

    fn resource_location(&self, resource: &ExternalResource) -> Result<String, LoadError> {
        match &self.root {
            RootSource::Remote(url) => Ok(join_url(url, &resource.uri)?),
            RootSource::Blob(_) => Ok(resource_key(&self.base_path, &resource.uri)),
        }
    }

    fn read_resource(&self, resource: &ExternalResource) -> Result<Vec<u8>, LoadError> {
        let location = self.resource_location(resource)?;
        let missing = |reason: String| match resource.kind {
            ResourceKind::Image => {
                log::warn!("Texture {} unavailable: {}", location, reason);
                LoadError::Image {
                    src: location.clone(),
                }
            }
            ResourceKind::Buffer => LoadError::Io {
                path: location.clone(),
                reason,
            },
        };

        match &self.root {
            RootSource::Remote(_) => {
                fetch_or_read(&location).map_err(|err| match resource.kind {
                    ResourceKind::Image => missing(err.to_string()),
                    ResourceKind::Buffer => err.into(),
                })
            }
            RootSource::Blob(_) => {
                let blob = self
                    .fileset
                    .as_ref()
                    .and_then(|fileset| fileset.get(&location))
                    .ok_or_else(|| missing("not in dropped files".to_string()))?;
                blob.read().map_err(|err| missing(err.to_string()))
            }
        }
    }
}

fn is_decodable(uri: &str) -> bool {
    uri.rsplit_once('.')
        .map(|(_, extension)| {
            DECODABLE_IMAGE_EXTENSIONS
                .iter()
                .any(|candidate| extension.eq_ignore_ascii_case(candidate))
        })
        .unwrap_or(false)
}

fn require_decoders(formats: &[ImageFormat]) -> Result<(), LoadError> {
    let missing: Vec<String> = formats
        .iter()
        .filter(|format| !format.reading_enabled())
        .map(|format| format!("{:?}", format))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    log::error!("Texture decoders missing from this build: {}", missing.join(", "));
    Err(LoadError::Unsupported(format!("no {} decoder", missing.join("/"))))
}
