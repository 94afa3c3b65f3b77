pub mod fetch;

use std::collections::HashMap;
use std::path::PathBuf;

const ROOT_DESCRIPTOR_EXTENSIONS: &[&str] = &[".gltf", ".glb"];

/// Opaque handle to one file of a bundle.
#[derive(Debug, Clone, PartialEq)]
pub enum FileBlob {
    Path(PathBuf),
    #[cfg(test)]
    Bytes(std::sync::Arc<[u8]>),
}

impl FileBlob {
    pub fn read(&self) -> std::io::Result<Vec<u8>> {
        match self {
            FileBlob::Path(path) => std::fs::read(path),
            #[cfg(test)]
            FileBlob::Bytes(bytes) => Ok(bytes.to_vec()),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            FileBlob::Path(path) => path.display().to_string(),
            #[cfg(test)]
            FileBlob::Bytes(bytes) => format!("<{} bytes in memory>", bytes.len()),
        }
    }
}

/// Relative path -> blob, in the order the files were supplied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fileset {
    entries: Vec<(String, FileBlob)>,
    index: HashMap<String, usize>,
}

impl Fileset {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Insert a file. Re-inserting an existing path replaces the blob in place.
    pub fn insert(&mut self, path: impl Into<String>, blob: FileBlob) {
        let path = path.into();
        match self.index.get(&path) {
            Some(&slot) => self.entries[slot].1 = blob,
            None => {
                self.index.insert(path.clone(), self.entries.len());
                self.entries.push((path, blob));
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<&FileBlob> {
        self.index.get(path).map(|&slot| &self.entries[slot].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileBlob)> {
        self.entries.iter().map(|(path, blob)| (path.as_str(), blob))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(path, _)| path.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<P: Into<String>> FromIterator<(P, FileBlob)> for Fileset {
    fn from_iter<I: IntoIterator<Item = (P, FileBlob)>>(iter: I) -> Self {
        let mut fileset = Fileset::new();
        for (path, blob) in iter {
            fileset.insert(path, blob);
        }
        fileset
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RootReference {
    Remote(String),
    Local(FileBlob),
}

/// A bundle ready to hand to the session manager. Consumed by one load.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBundle {
    pub root: RootReference,
    pub root_name: String,
    pub base_path: String,
    pub fileset: Option<Fileset>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("No .gltf or .glb asset found.")]
    NoRootAssetFound,
}

pub fn is_root_descriptor(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    ROOT_DESCRIPTOR_EXTENSIONS
        .iter()
        .any(|extension| lower.ends_with(extension))
}

pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Pick the root descriptor of a fileset. When several entries match, the
/// last one in fileset order wins.
pub fn resolve(fileset: &Fileset) -> Result<ResolvedBundle, ResolveError> {
    let (path, blob) = fileset
        .iter()
        .filter(|(path, _)| is_root_descriptor(file_name(path)))
        .last()
        .ok_or(ResolveError::NoRootAssetFound)?;
    let name = file_name(path);
    let base_path = path[..path.len() - name.len()].to_string();
    log::debug!(
        "Resolved root '{}' (base '{}') from {} files",
        name,
        base_path,
        fileset.len()
    );
    Ok(ResolvedBundle {
        root: RootReference::Local(blob.clone()),
        root_name: name.to_string(),
        base_path,
        fileset: Some(fileset.clone()),
    })
}

pub fn resolve_from_reference(url: &str) -> ResolvedBundle {
    let root_name = file_name(url.split(['?', '#']).next().unwrap_or(url)).to_string();
    ResolvedBundle {
        root: RootReference::Remote(url.to_string()),
        root_name,
        base_path: String::new(),
        fileset: None,
    }
}

/// Fileset key a descriptor's resource `uri` refers to, relative to the
/// descriptor's `base_path`.
pub fn resource_key(base_path: &str, uri: &str) -> String {
    normalize_path(&format!("{}{}", base_path, decode_uri(uri)))
}

/// Collapse `.` and `..` segments of a `/`-separated relative path.
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Percent-decode a URI component. Malformed escapes are kept verbatim.
pub fn decode_uri(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' && index + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[index + 1..index + 3])
                .ok()
                .and_then(|text| u8::from_str_radix(text, 16).ok());
            if let Some(byte) = hex {
                decoded.push(byte);
                index += 3;
                continue;
            }
        }
        decoded.push(bytes[index]);
        index += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

#[cfg(test)]
mod tests {
    use super::{
        decode_uri, normalize_path, resolve, resolve_from_reference, resource_key, FileBlob,
        Fileset, ResolveError, RootReference,
    };
    use std::path::PathBuf;
    use std::sync::Arc;

    fn blob(name: &str) -> FileBlob {
        FileBlob::Path(PathBuf::from(format!("/tmp/drop/{}", name)))
    }

    #[test]
    fn last_matching_entry_wins() {
        let fileset: Fileset = vec![
            ("car/body.gltf", blob("body.gltf")),
            ("car/body.bin", blob("body.bin")),
            ("car/wheels/Wheel.GLB", blob("Wheel.GLB")),
            ("car/textures/paint.png", blob("paint.png")),
        ]
        .into_iter()
        .collect();

        let bundle = resolve(&fileset).unwrap();
        assert_eq!(bundle.root, RootReference::Local(blob("Wheel.GLB")));
        assert_eq!(bundle.root_name, "Wheel.GLB");
        assert_eq!(bundle.base_path, "car/wheels/");
        assert_eq!(bundle.fileset.as_ref().map(Fileset::len), Some(4));
    }

    #[test]
    fn root_at_top_level_has_empty_base_path() {
        let fileset: Fileset = vec![("Duck.gltf", blob("Duck.gltf"))].into_iter().collect();
        let bundle = resolve(&fileset).unwrap();
        assert_eq!(bundle.base_path, "");
    }

    #[test]
    fn base_path_strips_only_the_trailing_name() {
        let fileset: Fileset = vec![("scene.gltf/scene.gltf", blob("scene.gltf"))]
            .into_iter()
            .collect();
        let bundle = resolve(&fileset).unwrap();
        assert_eq!(bundle.base_path, "scene.gltf/");
    }

    #[test]
    fn fileset_without_descriptor_fails() {
        let fileset: Fileset = vec![
            ("model.obj", blob("model.obj")),
            ("model.gltf.bak", blob("model.gltf.bak")),
        ]
        .into_iter()
        .collect();
        assert_eq!(resolve(&fileset), Err(ResolveError::NoRootAssetFound));
        assert_eq!(
            ResolveError::NoRootAssetFound.to_string(),
            "No .gltf or .glb asset found."
        );
    }

    #[test]
    fn reinserting_a_path_replaces_in_place() {
        let mut fileset = Fileset::new();
        fileset.insert("a.gltf", blob("first"));
        fileset.insert("b.png", blob("b.png"));
        fileset.insert("a.gltf", FileBlob::Bytes(Arc::from(&b"{}"[..])));
        assert_eq!(fileset.len(), 2);
        assert_eq!(fileset.paths().collect::<Vec<_>>(), vec!["a.gltf", "b.png"]);
        assert_eq!(fileset.get("a.gltf").unwrap().read().unwrap(), b"{}".to_vec());
        assert_eq!(fileset.get("b.png"), Some(&blob("b.png")));
        assert_eq!(fileset.get("c.png"), None);
    }

    #[test]
    fn large_drop_keeps_order_and_lookups() {
        let fileset: Fileset = (0..5000)
            .map(|n| (format!("tiles/{:04}.png", n), blob("tile.png")))
            .chain(std::iter::once(("tiles/0042.png".to_string(), blob("retake.png"))))
            .collect();
        assert_eq!(fileset.len(), 5000);
        assert_eq!(fileset.paths().next(), Some("tiles/0000.png"));
        assert_eq!(fileset.paths().last(), Some("tiles/4999.png"));
        assert_eq!(fileset.get("tiles/0042.png"), Some(&blob("retake.png")));
    }

    #[test]
    fn remote_reference_is_wrapped_directly() {
        let bundle = resolve_from_reference("https://cdn.example.com/models/Fox.glb?v=2");
        assert_eq!(
            bundle.root,
            RootReference::Remote("https://cdn.example.com/models/Fox.glb?v=2".to_string())
        );
        assert_eq!(bundle.root_name, "Fox.glb");
        assert_eq!(bundle.base_path, "");
        assert!(bundle.fileset.is_none());
    }

    #[test]
    fn decode_uri_handles_escapes() {
        assert_eq!(decode_uri("my%20texture.png"), "my texture.png");
        assert_eq!(decode_uri("100%"), "100%");
        assert_eq!(decode_uri("%zz.png"), "%zz.png");
        assert_eq!(decode_uri("caf%C3%A9.bin"), "café.bin");
    }

    #[test]
    fn normalize_path_collapses_dots() {
        assert_eq!(normalize_path("a/b/../c/./d.png"), "a/c/d.png");
        assert_eq!(normalize_path("../x.bin"), "x.bin");
    }

    #[test]
    fn resource_key_matches_dropped_paths() {
        assert_eq!(resource_key("", "./Box0.bin"), "Box0.bin");
        assert_eq!(resource_key("box/", "textures/Box%20Color.png"), "box/textures/Box Color.png");
        assert_eq!(resource_key("car/wheels/", "../paint.png"), "car/paint.png");
    }
}
