mod tone_mapping;

use std::sync::{Arc, Mutex, MutexGuard};

use glam::{UVec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::{
    camera::PerspectiveCamera, config::RendererConfig, scene::SceneGraph, shader::U_TIME, Result,
    SceneError,
};

pub use tone_mapping::ToneMapping;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputEncoding {
    Linear,
    Srgb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShadowFilter {
    Basic,
    Pcf,
    PcfSoft,
    Vsm,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RendererSettings {
    pub antialias: bool,
    pub physically_correct_lights: bool,
    pub output_encoding: OutputEncoding,
    pub tone_mapping: ToneMapping,
    pub tone_mapping_exposure: f32,
    pub shadows_enabled: bool,
    pub shadow_filter: ShadowFilter,
}

impl From<&RendererConfig> for RendererSettings {
    fn from(config: &RendererConfig) -> Self {
        Self {
            antialias: config.antialias,
            physically_correct_lights: config.physically_correct_lights,
            output_encoding: config.output_encoding,
            tone_mapping: config.tone_mapping,
            tone_mapping_exposure: config.tone_mapping_exposure,
            shadows_enabled: config.shadows_enabled,
            shadow_filter: config.shadow_filter,
        }
    }
}

/// Everything a backend needs to draw one frame.
pub struct FrameInput<'a> {
    pub index: u64,
    pub scene: &'a SceneGraph,
    pub camera: &'a PerspectiveCamera,
    pub settings: &'a RendererSettings,
    pub drawing_buffer: UVec2,
    /// Materials whose refresh flag was consumed for this frame.
    pub materials_refreshed: usize,
}

/// Drawing surface behind the [`Renderer`] façade.
pub trait RenderBackend {
    /// Reallocates the output buffer. Sizes are in physical pixels.
    fn resize(&mut self, drawing_buffer: UVec2) -> Result<()>;

    fn render(&mut self, frame: &FrameInput<'_>) -> Result<()>;
}

/// Holds output settings and forwards sizing and drawing to a backend.
pub struct Renderer {
    settings: RendererSettings,
    backend: Box<dyn RenderBackend>,
    size: UVec2,
    pixel_ratio: f32,
    frames: u64,
}

impl Renderer {
    pub fn new(settings: RendererSettings, backend: Box<dyn RenderBackend>) -> Self {
        Self {
            settings,
            backend,
            size: UVec2::ONE,
            pixel_ratio: 1.0,
            frames: 0,
        }
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut RendererSettings {
        &mut self.settings
    }

    /// Logical size of the output, before the pixel ratio is applied.
    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    pub fn drawing_buffer_size(&self) -> UVec2 {
        (self.size.as_vec2() * self.pixel_ratio).floor().as_uvec2().max(UVec2::ONE)
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    pub fn set_size(&mut self, width: u32, height: u32) -> Result<()> {
        self.resize(width, height, self.pixel_ratio)
    }

    pub fn set_pixel_ratio(&mut self, pixel_ratio: f32) -> Result<()> {
        self.resize(self.size.x, self.size.y, pixel_ratio)
    }

    /// Applies a logical size and pixel ratio with a single backend
    /// reallocation. Both are left unchanged when the backend refuses.
    pub fn resize(&mut self, width: u32, height: u32, pixel_ratio: f32) -> Result<()> {
        let previous = (self.size, self.pixel_ratio);
        self.size = UVec2::new(width, height);
        self.pixel_ratio = pixel_ratio;
        if let Err(err) = self.backend.resize(self.drawing_buffer_size()) {
            (self.size, self.pixel_ratio) = previous;
            return Err(err);
        }
        Ok(())
    }

    /// Draws `scene` from `camera`. Pending material refreshes are consumed
    /// even when the backend rejects the frame.
    pub fn render(&mut self, scene: &mut SceneGraph, camera: &PerspectiveCamera) -> Result<()> {
        let mut materials_refreshed = 0;
        scene.traverse_mut(|node| {
            if let Some(mesh) = node.as_mesh_mut() {
                if mesh.material.take_refresh() {
                    materials_refreshed += 1;
                }
            }
        });

        let frame = FrameInput {
            index: self.frames,
            scene: &*scene,
            camera,
            settings: &self.settings,
            drawing_buffer: self.drawing_buffer_size(),
            materials_refreshed,
        };
        self.frames += 1;
        self.backend.render(&frame)
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("settings", &self.settings)
            .field("size", &self.size)
            .field("pixel_ratio", &self.pixel_ratio)
            .field("frames", &self.frames)
            .finish()
    }
}

/// What the headless backend saw for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameRecord {
    pub index: u64,
    /// `uTime` of the first shader material in the scene.
    pub shader_time: Option<f32>,
    pub tone_mapping: ToneMapping,
    pub exposure: f32,
    /// Display value of a unit-white pixel under the active curve.
    pub white_point: [f32; 3],
    pub meshes: usize,
    /// Meshes whose origin lies in front of the camera.
    pub visible_meshes: usize,
    pub materials_refreshed: usize,
    pub drawing_buffer: [u32; 2],
    pub camera_position: [f32; 3],
}

/// Shared, clonable view over the frames a [`HeadlessBackend`] recorded.
#[derive(Clone, Default)]
pub struct FrameLog {
    records: Arc<Mutex<Vec<FrameRecord>>>,
}

impl FrameLog {
    pub fn records(&self) -> Result<Vec<FrameRecord>> {
        Ok(self.lock()?.clone())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn last(&self) -> Result<Option<FrameRecord>> {
        Ok(self.lock()?.last().cloned())
    }

    pub fn to_json(&self) -> Result<String> {
        let records = self.lock()?;
        Ok(serde_json::to_string_pretty(&*records)?)
    }

    fn push(&self, record: FrameRecord) -> Result<()> {
        self.lock()?.push(record);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<FrameRecord>>> {
        self.records
            .lock()
            .map_err(|_| SceneError::msg("frame log has been poisoned"))
    }
}

impl std::fmt::Debug for FrameLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLog").finish()
    }
}

/// Backend that draws nothing and records a [`FrameRecord`] per frame.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    log: FrameLog,
    drawing_buffer: UVec2,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> FrameLog {
        self.log.clone()
    }
}

impl RenderBackend for HeadlessBackend {
    fn resize(&mut self, drawing_buffer: UVec2) -> Result<()> {
        if drawing_buffer.min_element() == 0 {
            return Err(SceneError::Render(format!(
                "cannot allocate a {}x{} output",
                drawing_buffer.x, drawing_buffer.y
            )));
        }
        tracing::debug!(width = drawing_buffer.x, height = drawing_buffer.y, "resized output");
        self.drawing_buffer = drawing_buffer;
        Ok(())
    }

    fn render(&mut self, frame: &FrameInput<'_>) -> Result<()> {
        let mut shader_time = None;
        let mut meshes = 0;
        let mut visible_meshes = 0;
        let eye = frame.camera.position;
        let view = frame.camera.view_matrix();

        frame.scene.traverse(|id, _, node| {
            if node.as_mesh().is_none() {
                return;
            }
            meshes += 1;
            if shader_time.is_none() {
                shader_time = node.shader().and_then(|shader| shader.uniforms.float(U_TIME));
            }
            let origin = frame
                .scene
                .world_matrix(id)
                .map(|world| world.transform_point3(Vec3::ZERO))
                .unwrap_or(Vec3::ZERO);
            // View space looks down -Z.
            if view.transform_point3(origin).z <= 0.0 {
                visible_meshes += 1;
            }
        });

        let settings = frame.settings;
        let white_point = settings
            .tone_mapping
            .apply(Vec3::ONE, settings.tone_mapping_exposure);

        self.log.push(FrameRecord {
            index: frame.index,
            shader_time,
            tone_mapping: settings.tone_mapping,
            exposure: settings.tone_mapping_exposure,
            white_point: white_point.to_array(),
            meshes,
            visible_meshes,
            materials_refreshed: frame.materials_refreshed,
            drawing_buffer: self.drawing_buffer.to_array(),
            camera_position: eye.to_array(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn renderer() -> (Renderer, FrameLog) {
        let backend = HeadlessBackend::new();
        let log = backend.log();
        let settings = RendererSettings::from(&AppConfig::default().renderer);
        (Renderer::new(settings, Box::new(backend)), log)
    }

    #[test]
    fn drawing_buffer_scales_with_pixel_ratio() {
        let (mut renderer, _) = renderer();
        renderer.set_size(800, 600).unwrap();
        renderer.set_pixel_ratio(1.5).unwrap();

        assert_eq!(renderer.size(), UVec2::new(800, 600));
        assert_eq!(renderer.drawing_buffer_size(), UVec2::new(1200, 900));
    }

    /// Refuses buffers larger than `max` on either side.
    struct CappedBackend {
        max: u32,
    }

    impl RenderBackend for CappedBackend {
        fn resize(&mut self, drawing_buffer: UVec2) -> Result<()> {
            if drawing_buffer.max_element() > self.max {
                return Err(SceneError::Render("output too large".into()));
            }
            Ok(())
        }

        fn render(&mut self, _: &FrameInput<'_>) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn rejected_resize_keeps_previous_size() {
        let settings = RendererSettings::from(&AppConfig::default().renderer);
        let mut renderer = Renderer::new(settings, Box::new(CappedBackend { max: 4096 }));
        renderer.resize(1000, 500, 2.0).unwrap();

        assert!(renderer.resize(3000, 500, 2.0).is_err());
        assert!(renderer.set_pixel_ratio(8.0).is_err());
        assert_eq!(renderer.size(), UVec2::new(1000, 500));
        assert_eq!(renderer.pixel_ratio(), 2.0);
        assert_eq!(renderer.drawing_buffer_size(), UVec2::new(2000, 1000));
    }

    #[test]
    fn counts_meshes_in_front_of_the_camera() {
        use crate::scene::{Geometry, Material, Mesh, Node, NodeKind, StandardMaterial, Transform};

        let (mut renderer, log) = renderer();
        let mut scene = SceneGraph::new();
        for (name, z) in [("ahead", -5.0), ("behind", 5.0)] {
            let mesh = Mesh {
                geometry: Geometry::external(3),
                material: Material::Standard(StandardMaterial::default()),
            };
            scene.add_to_root(Node::new(name, NodeKind::Mesh(mesh)).with_transform(Transform {
                position: Vec3::new(0.0, 0.0, z),
                ..Transform::IDENTITY
            }));
        }
        let camera = PerspectiveCamera::new(75.0, 1.0, 0.1, 100.0);

        renderer.render(&mut scene, &camera).unwrap();
        let record = log.last().unwrap().unwrap();
        assert_eq!(record.meshes, 2);
        assert_eq!(record.visible_meshes, 1);
    }

    #[test]
    fn records_one_entry_per_frame() {
        let (mut renderer, log) = renderer();
        let mut scene = SceneGraph::new();
        let camera = PerspectiveCamera::new(75.0, 1.0, 0.1, 100.0);

        renderer.render(&mut scene, &camera).unwrap();
        renderer.settings_mut().tone_mapping = ToneMapping::Reinhard;
        renderer.render(&mut scene, &camera).unwrap();

        let records = log.records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tone_mapping, ToneMapping::AcesFilmic);
        assert_eq!(records[1].tone_mapping, ToneMapping::Reinhard);
        assert_eq!(records[1].index, 1);
        assert_eq!(renderer.frames_rendered(), 2);
        assert!(log.to_json().unwrap().contains("Reinhard"));
    }
}
