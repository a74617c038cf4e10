use std::{
    f32::consts::PI,
    fs,
    path::{Path, PathBuf},
};

use glam::{UVec2, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::{
    render::{OutputEncoding, ShadowFilter, ToneMapping},
    Result,
};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub assets: AssetConfig,
    pub viewport: ViewportConfig,
    pub camera: CameraConfig,
    pub renderer: RendererConfig,
    pub light: LightConfig,
    pub materials: MaterialConfig,
    pub flag: FlagConfig,
    pub model: ModelConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing sections fall back to defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Loads `path` when given, otherwise returns the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_path(path),
            None => Ok(Self::default()),
        }
    }
}

/// Locations of every external asset the demo consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub model: PathBuf,
    pub environment_map: CubeFaces,
    pub flag_texture: PathBuf,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            model: PathBuf::from("static/models/vespa/scene.gltf"),
            environment_map: CubeFaces::in_directory("static/textures/environmentMaps/3", "jpg"),
            flag_texture: PathBuf::from("static/textures/Flags/PH_Flag.png"),
        }
    }
}

/// The six faces of a cube map, named by the axis they face.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CubeFaces {
    pub px: PathBuf,
    pub nx: PathBuf,
    pub py: PathBuf,
    pub ny: PathBuf,
    pub pz: PathBuf,
    pub nz: PathBuf,
}

impl CubeFaces {
    /// Builds the conventional `px.<ext>` … `nz.<ext>` layout inside `dir`.
    pub fn in_directory(dir: impl AsRef<Path>, extension: &str) -> Self {
        let dir = dir.as_ref();
        let face = |name: &str| dir.join(format!("{name}.{extension}"));
        Self {
            px: face("px"),
            nx: face("nx"),
            py: face("py"),
            ny: face("ny"),
            pz: face("pz"),
            nz: face("nz"),
        }
    }

    /// Faces in the order the cube texture expects them.
    pub fn paths(&self) -> [PathBuf; 6] {
        [
            self.px.clone(),
            self.nx.clone(),
            self.py.clone(),
            self.ny.clone(),
            self.pz.clone(),
            self.nz.clone(),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub width: u32,
    pub height: u32,
    pub device_pixel_ratio: f32,
    /// Upper bound applied to the device pixel ratio.
    pub max_pixel_ratio: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            device_pixel_ratio: 1.0,
            max_pixel_ratio: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub enable_damping: bool,
    pub damping_factor: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 75.0,
            near: 0.1,
            far: 100.0,
            position: Vec3::new(0.0, 1.0, 6.0),
            enable_damping: true,
            damping_factor: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub antialias: bool,
    pub physically_correct_lights: bool,
    pub output_encoding: OutputEncoding,
    pub tone_mapping: ToneMapping,
    pub tone_mapping_exposure: f32,
    pub shadows_enabled: bool,
    pub shadow_filter: ShadowFilter,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            antialias: true,
            physically_correct_lights: true,
            output_encoding: OutputEncoding::Srgb,
            tone_mapping: ToneMapping::AcesFilmic,
            tone_mapping_exposure: 1.0,
            shadows_enabled: true,
            shadow_filter: ShadowFilter::PcfSoft,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub color: String,
    pub intensity: f32,
    pub position: Vec3,
    pub cast_shadow: bool,
    pub shadow_far: f32,
    pub shadow_map_size: UVec2,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            color: "#ffffff".to_string(),
            intensity: 3.0,
            position: Vec3::new(0.25, 3.0, -2.25),
            cast_shadow: true,
            shadow_far: 15.0,
            shadow_map_size: UVec2::splat(1024),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialConfig {
    /// Environment intensity applied when the model is first normalized.
    pub env_map_intensity: f32,
    /// Starting value of the `envMapIntensity` control. Later
    /// normalizations use the control's value.
    pub control_env_map_intensity: f32,
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            env_map_intensity: 2.5,
            control_env_map_intensity: 1.0,
        }
    }
}

/// The shader-driven waving plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagConfig {
    pub width: f32,
    pub height: f32,
    pub width_segments: u32,
    pub height_segments: u32,
    pub scale: Vec3,
    pub frequency: Vec2,
    pub color: String,
}

impl Default for FlagConfig {
    fn default() -> Self {
        Self {
            width: 1.0,
            height: 1.0,
            width_segments: 32,
            height_segments: 32,
            scale: Vec3::new(5.0, 3.0, 3.0),
            frequency: Vec2::new(5.0, 5.0),
            color: "#8D6F64".to_string(),
        }
    }
}

/// Placement applied to the loaded model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub scale: Vec3,
    pub position: Vec3,
    pub rotation_y: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            scale: Vec3::splat(9.0),
            position: Vec3::new(6.0, -3.0, -3.0),
            rotation_y: PI * 1.5,
        }
    }
}
