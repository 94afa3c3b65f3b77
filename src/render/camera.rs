use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraPreset {
    #[default]
    Default,
    /// Front-on framing used for the glTF asset generator sample set.
    AssetGenerator,
}

impl CameraPreset {
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("assetgenerator") {
            CameraPreset::AssetGenerator
        } else {
            CameraPreset::Default
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFraming {
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub near: f32,
    pub far: f32,
}

impl CameraFraming {
    /// Frame a bounding box given as center and half extent. An explicit
    /// position overrides the preset and looks at the origin.
    pub fn from_bounds(
        center: [f32; 3],
        extent: [f32; 3],
        preset: CameraPreset,
        position: Option<[f32; 3]>,
    ) -> Self {
        let center = Vec3::from_array(center);
        let size = (Vec3::from_array(extent) * 2.0).length();
        let size = if size > 1e-6 { size } else { 1.0 };

        let (position, target) = match position {
            Some(position) => (Vec3::from_array(position), Vec3::ZERO),
            None => {
                let offset = match preset {
                    CameraPreset::Default => Vec3::new(size / 2.0, size / 5.0, size / 2.0),
                    CameraPreset::AssetGenerator => Vec3::new(0.0, 0.0, size),
                };
                (center + offset, center)
            }
        };

        Self {
            position: position.to_array(),
            target: target.to_array(),
            near: size / 100.0,
            far: size * 100.0,
        }
    }
}

/// Accept a launch camera position only when it is exactly three finite numbers.
pub fn camera_override(values: Option<&[f64]>) -> Option<[f32; 3]> {
    let values = values?;
    match values {
        [x, y, z] if values.iter().all(|value| value.is_finite()) => {
            Some([*x as f32, *y as f32, *z as f32])
        }
        _ => {
            log::warn!("Ignoring camera position {:?}; expected three numbers", values);
            None
        }
    }
}
