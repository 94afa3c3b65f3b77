//! Minimal reader for glTF 2.0 descriptors (JSON or GLB container).

use crate::error::LoadError;
use std::collections::HashMap;

const GLB_MAGIC: u32 = 0x4654_6C67;
const GLB_CHUNK_JSON: u32 = 0x4E4F_534A;
const GLB_CHUNK_BIN: u32 = 0x004E_4942;
const GLB_HEADER_LEN: usize = 12;
const GLB_CHUNK_HEADER_LEN: usize = 8;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("GLB container truncated at byte {0}")]
    Truncated(usize),
    #[error("unsupported GLB version {0}")]
    UnsupportedVersion(u32),
    #[error("GLB container has no JSON chunk")]
    MissingJsonChunk,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
    pub version: String,
    #[serde(default)]
    pub generator: Option<String>,
    #[serde(default)]
    pub min_version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct Node {
    #[serde(default)]
    pub mesh: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct Primitive {
    #[serde(default)]
    pub attributes: HashMap<String, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct Mesh {
    #[serde(default)]
    pub primitives: Vec<Primitive>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct Accessor {
    #[serde(default)]
    pub min: Option<Vec<f32>>,
    #[serde(default)]
    pub max: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Buffer {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub byte_length: usize,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub buffer_view: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct GltfDocument {
    pub asset: AssetInfo,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub meshes: Vec<Mesh>,
    #[serde(default)]
    pub accessors: Vec<Accessor>,
    #[serde(default)]
    pub buffers: Vec<Buffer>,
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Buffer,
    Image,
}

/// A resource the descriptor references by URI (data URIs excluded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalResource {
    pub kind: ResourceKind,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub document: GltfDocument,
    pub binary_chunk_len: Option<usize>,
}

impl GltfDocument {
    pub fn external_resources(&self) -> Vec<ExternalResource> {
        let buffers = self
            .buffers
            .iter()
            .filter_map(|buffer| buffer.uri.as_deref())
            .map(|uri| (ResourceKind::Buffer, uri));
        let images = self
            .images
            .iter()
            .filter_map(|image| image.uri.as_deref())
            .map(|uri| (ResourceKind::Image, uri));
        buffers
            .chain(images)
            .filter(|(_, uri)| !uri.starts_with("data:"))
            .map(|(kind, uri)| ExternalResource {
                kind,
                uri: uri.to_string(),
            })
            .collect()
    }

    /// Union of all POSITION accessor bounds as (center, half extent).
    /// Node transforms are not applied.
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let mut min = [f32::INFINITY; 3];
        let mut max = [f32::NEG_INFINITY; 3];
        let mut found = false;
        for primitive in self.meshes.iter().flat_map(|mesh| mesh.primitives.iter()) {
            let Some(accessor) = primitive
                .attributes
                .get("POSITION")
                .and_then(|index| self.accessors.get(*index))
            else {
                continue;
            };
            let (Some(lo), Some(hi)) = (accessor.min.as_deref(), accessor.max.as_deref()) else {
                continue;
            };
            if lo.len() < 3 || hi.len() < 3 {
                continue;
            }
            for axis in 0..3 {
                min[axis] = min[axis].min(lo[axis]);
                max[axis] = max[axis].max(hi[axis]);
            }
            found = true;
        }
        if !found {
            return None;
        }
        let center = [
            (min[0] + max[0]) * 0.5,
            (min[1] + max[1]) * 0.5,
            (min[2] + max[2]) * 0.5,
        ];
        let extent = [
            (max[0] - min[0]) * 0.5,
            (max[1] - min[1]) * 0.5,
            (max[2] - min[2]) * 0.5,
        ];
        Some((center, extent))
    }
}

/// Parse a descriptor, detecting the GLB container by its magic number.
pub fn parse(bytes: &[u8]) -> Result<ParsedDocument, LoadError> {
    if read_u32(bytes, 0) == Some(GLB_MAGIC) {
        let (json, binary_chunk_len) =
            split_glb(bytes).map_err(|err| LoadError::Syntax(format!("invalid GLB: {}", err)))?;
        let document = parse_json(json)?;
        return Ok(ParsedDocument {
            document,
            binary_chunk_len,
        });
    }
    Ok(ParsedDocument {
        document: parse_json(bytes)?,
        binary_chunk_len: None,
    })
}

fn parse_json(bytes: &[u8]) -> Result<GltfDocument, LoadError> {
    serde_json::from_slice(bytes).map_err(|err| match err.classify() {
        serde_json::error::Category::Syntax | serde_json::error::Category::Eof => {
            LoadError::Syntax(format!("Unexpected token in JSON: {}", err))
        }
        serde_json::error::Category::Data | serde_json::error::Category::Io => {
            LoadError::Other(format!("invalid glTF document: {}", err))
        }
    })
}

fn split_glb(bytes: &[u8]) -> Result<(&[u8], Option<usize>), DocumentError> {
    let version = read_u32(bytes, 4).ok_or(DocumentError::Truncated(bytes.len()))?;
    if version != 2 {
        return Err(DocumentError::UnsupportedVersion(version));
    }
    let total = read_u32(bytes, 8).ok_or(DocumentError::Truncated(bytes.len()))? as usize;
    let total = total.min(bytes.len());

    let mut offset = GLB_HEADER_LEN;
    let mut json = None;
    let mut binary_chunk_len = None;
    while offset + GLB_CHUNK_HEADER_LEN <= total {
        let length = read_u32(bytes, offset).ok_or(DocumentError::Truncated(offset))? as usize;
        let kind = read_u32(bytes, offset + 4).ok_or(DocumentError::Truncated(offset))?;
        let start = offset + GLB_CHUNK_HEADER_LEN;
        let end = start
            .checked_add(length)
            .filter(|end| *end <= total)
            .ok_or(DocumentError::Truncated(start))?;
        match kind {
            GLB_CHUNK_JSON if json.is_none() => json = Some(&bytes[start..end]),
            GLB_CHUNK_BIN => binary_chunk_len = Some(length),
            _ => log::debug!("Skipping GLB chunk 0x{:08x}", kind),
        }
        offset = end;
    }
    let json = json.ok_or(DocumentError::MissingJsonChunk)?;
    Ok((json, binary_chunk_len))
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let slice = bytes.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}
