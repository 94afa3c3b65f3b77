pub mod document;

/// Summary of a scene a viewer finished loading.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneHandle {
    pub name: String,
    pub generator: Option<String>,
    pub node_count: usize,
    pub mesh_count: usize,
    pub image_count: usize,
    pub center: [f32; 3],
    pub extent: [f32; 3],
    pub camera_position: [f32; 3],
    /// SHA-256 of the root descriptor bytes, lowercase hex.
    pub digest: String,
}

impl SceneHandle {
    pub fn label(&self) -> String {
        format!(
            "{} ({} meshes, {} nodes)",
            self.name, self.mesh_count, self.node_count
        )
    }
}
