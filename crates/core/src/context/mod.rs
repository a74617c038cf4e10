//! The application context: every long-lived object of the demo, built once by
//! [`AppContext::assemble`] and handed to the frame loop.

use std::{f64::consts::PI, time::Duration};

use glam::Vec2;
use rand::Rng;

use crate::{
    assets::{AssetLoader, ColorSpace, LoadTicket, LoadedModel, ModelAsset, TextureHandle},
    camera::{OrbitControls, PerspectiveCamera},
    config::AppConfig,
    controls::{Axis, ChangeHook, Control, ControlPanel, ParamTarget},
    render::{RenderBackend, Renderer, RendererSettings, ToneMapping},
    scene::{
        normalize_materials, random_attribute, Color, DirectionalLight, Geometry, Material, Mesh,
        Node, NodeId, NodeKind, SceneGraph, ShadowSettings, Transform,
    },
    shader::{ShaderMaterial, A_RANDOM, U_FREQUENCY, U_TIME},
    timeline::Action,
    viewport::{ResizeEvent, Viewport},
    Result, SceneError,
};

/// Name of the control bound to the model's `rotation.y`.
pub const MODEL_ROTATION_CONTROL: &str = "rotation";
pub const ENV_INTENSITY_CONTROL: &str = "envMapIntensity";
pub const TONE_MAPPING_CONTROL: &str = "toneMapping";

/// Values that live only in the debug panel.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugValues {
    pub env_map_intensity: f32,
}

/// Ids of the objects the demo refers to after assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneHandles {
    /// Set once the model load completes.
    pub model: Option<NodeId>,
    pub light: NodeId,
    pub flag: NodeId,
    pub camera: NodeId,
    pub environment: TextureHandle,
    pub flag_texture: TextureHandle,
    model_ticket: LoadTicket,
}

#[derive(Debug)]
pub struct AppContext {
    pub config: AppConfig,
    pub scene: SceneGraph,
    pub camera: PerspectiveCamera,
    pub controls: OrbitControls,
    pub renderer: Renderer,
    pub viewport: Viewport,
    pub panel: ControlPanel,
    pub debug: DebugValues,
    pub handles: SceneHandles,
    pub assets: AssetLoader,
}

impl AppContext {
    /// Builds the scene and starts every asset load.
    pub fn assemble(config: AppConfig, backend: Box<dyn RenderBackend>) -> Result<Self> {
        Self::assemble_with_rng(config, backend, &mut rand::thread_rng())
    }

    /// Same as [`AppContext::assemble`] with the per-vertex randomness drawn from `rng`.
    pub fn assemble_with_rng<R: Rng>(
        config: AppConfig,
        backend: Box<dyn RenderBackend>,
        rng: &mut R,
    ) -> Result<Self> {
        let mut scene = SceneGraph::new();
        let mut assets = AssetLoader::new();
        let mut panel = ControlPanel::new();

        let flag_texture = assets.load_texture(&config.assets.flag_texture);
        let model_ticket = assets.load_model(&config.assets.model);

        // Background and environment point at the cube texture before its
        // faces arrive; meshes pick it up when the model is normalized.
        let environment = assets.load_cube_texture(config.assets.environment_map.paths());
        assets.set_color_space(environment, ColorSpace::Srgb);
        scene.background = Some(environment);
        scene.environment = Some(environment);

        let debug = DebugValues {
            env_map_intensity: config.materials.control_env_map_intensity,
        };
        panel.add(
            Control::slider(ENV_INTENSITY_CONTROL, ParamTarget::EnvMapIntensity, 0.0, 10.0, 0.001)
                .on_change(ChangeHook::RefreshMaterials),
        );

        let light = add_light(&mut scene, &config)?;
        panel.add(Control::slider("lightIntensity", ParamTarget::LightIntensity(light), 0.0, 10.0, 0.001));
        for (name, axis) in [("lightX", Axis::X), ("lightY", Axis::Y), ("lightZ", Axis::Z)] {
            panel.add(Control::slider(name, ParamTarget::LightPosition(light, axis), -5.0, 5.0, 0.001));
        }

        let flag = add_flag(&mut scene, &config, flag_texture, rng)?;
        for (name, axis) in [("frequencyX", Axis::X), ("frequencyY", Axis::Y)] {
            let target = ParamTarget::UniformVec2 {
                node: flag,
                uniform: U_FREQUENCY,
                axis,
            };
            panel.add(Control::slider(name, target, 0.0, 20.0, 0.01));
        }

        let viewport = Viewport::from_config(&config.viewport)?;
        let camera = PerspectiveCamera::from_config(&config.camera, viewport.aspect());
        let camera_node = scene.add_to_root(Node::new("camera", NodeKind::Camera).with_transform(Transform {
            position: camera.position,
            ..Transform::IDENTITY
        }));
        let controls = OrbitControls::from_config(&config.camera);

        let mut renderer = Renderer::new(RendererSettings::from(&config.renderer), backend);
        renderer.resize(viewport.width(), viewport.height(), viewport.pixel_ratio())?;
        panel.add(Control::choice(
            TONE_MAPPING_CONTROL,
            ParamTarget::ToneMapping,
            ToneMapping::ALL.map(|mode| (mode.label(), mode.code() as f64)),
        ));
        panel.add(Control::slider(
            "toneMappingExposure",
            ParamTarget::ToneMappingExposure,
            0.0,
            10.0,
            0.001,
        ));

        tracing::info!(
            nodes = scene.len(),
            controls = panel.len(),
            width = viewport.width(),
            height = viewport.height(),
            "scene assembled"
        );

        Ok(Self {
            config,
            scene,
            camera,
            controls,
            renderer,
            viewport,
            panel,
            debug,
            handles: SceneHandles {
                model: None,
                light,
                flag,
                camera: camera_node,
                environment,
                flag_texture,
                model_ticket,
            },
            assets,
        })
    }

    /// Applies finished loads without blocking. Returns the number of models placed.
    pub fn process_loads(&mut self) -> usize {
        let finished = self.assets.poll();
        self.finish_models(finished)
    }

    /// Blocks until outstanding loads finish or `timeout` passes.
    pub fn wait_for_assets(&mut self, timeout: Duration) -> usize {
        let finished = self.assets.wait(timeout);
        self.finish_models(finished)
    }

    fn finish_models(&mut self, finished: Vec<LoadedModel>) -> usize {
        let mut placed = 0;
        for loaded in finished {
            if loaded.ticket != self.handles.model_ticket {
                continue;
            }
            match loaded.result {
                Ok(model) => {
                    self.place_model(model);
                    placed += 1;
                }
                Err(err) => {
                    tracing::warn!(path = %loaded.path.display(), %err, "model not placed");
                }
            }
        }
        placed
    }

    /// Load continuation: position the model, bind its rotation control and
    /// normalize materials, in that order. The first normalization uses the
    /// configured placement intensity, not the control's value.
    fn place_model(&mut self, model: ModelAsset) -> NodeId {
        let placement = &self.config.model;
        let root = self.scene.add_to_root(Node::group(model.name.clone()).with_transform(Transform {
            position: placement.position,
            rotation: glam::Vec3::new(0.0, placement.rotation_y, 0.0),
            scale: placement.scale,
        }));

        let mut ids = Vec::with_capacity(model.nodes.len());
        for node in model.nodes {
            let parent = node.parent.and_then(|index| ids.get(index).copied()).unwrap_or(root);
            let id = self
                .scene
                .add(parent, Node::new(node.name, node.kind).with_transform(node.transform));
            ids.push(id);
        }

        self.handles.model = Some(root);
        self.panel.add(Control::slider(
            MODEL_ROTATION_CONTROL,
            ParamTarget::NodeRotationY(root),
            -PI,
            PI,
            0.001,
        ));
        let environment = self.scene.environment;
        let intensity = self.config.materials.env_map_intensity;
        let touched = normalize_materials(&mut self.scene, environment, intensity);
        tracing::info!(model = %model.name, nodes = ids.len(), touched, "model placed");
        root
    }

    /// Material normalization with the current environment and intensity.
    pub fn refresh_materials(&mut self) -> usize {
        let environment = self.scene.environment;
        normalize_materials(&mut self.scene, environment, self.debug.env_map_intensity)
    }

    /// Writes `value` through a control and runs its change hook. Returns the
    /// value actually stored after snapping and clamping.
    pub fn set_control(&mut self, name: &str, value: f64) -> Result<f64> {
        let control = self
            .panel
            .get(name)
            .ok_or_else(|| SceneError::UnknownControl(name.to_string()))?;
        let value = control.kind.sanitize(name, value)?;
        let target = control.target.clone();
        let hook = control.on_change;

        self.write_target(&target, value)?;
        if let Some(ChangeHook::RefreshMaterials) = hook {
            self.refresh_materials();
        }
        tracing::debug!(control = name, value, "control changed");
        Ok(value)
    }

    /// Selects a dropdown option by its label.
    pub fn select_option(&mut self, name: &str, label: &str) -> Result<f64> {
        let control = self
            .panel
            .get(name)
            .ok_or_else(|| SceneError::UnknownControl(name.to_string()))?;
        let value = control
            .kind
            .option(label)
            .ok_or_else(|| SceneError::msg(format!("control `{name}` has no option `{label}`")))?;
        self.set_control(name, value)
    }

    /// Reads the live value behind a control.
    pub fn control_value(&self, name: &str) -> Result<f64> {
        let control = self
            .panel
            .get(name)
            .ok_or_else(|| SceneError::UnknownControl(name.to_string()))?;
        self.read_target(&control.target)
    }

    fn write_target(&mut self, target: &ParamTarget, value: f64) -> Result<()> {
        let value32 = value as f32;
        match target {
            ParamTarget::NodeRotationY(node) => self.node_mut(*node)?.transform.rotation.y = value32,
            ParamTarget::EnvMapIntensity => self.debug.env_map_intensity = value32,
            ParamTarget::LightIntensity(node) => self.light_mut(*node)?.intensity = value32,
            ParamTarget::LightPosition(node, axis) => {
                *axis_mut(&mut self.node_mut(*node)?.transform.position, *axis) = value32
            }
            ParamTarget::UniformVec2 { node, uniform, axis } => {
                let cell = self
                    .node_mut(*node)?
                    .shader_mut()
                    .and_then(|shader| shader.uniforms.vec2_mut(uniform))
                    .ok_or_else(|| SceneError::msg(format!("node has no vec2 uniform `{uniform}`")))?;
                match axis {
                    Axis::X => cell.x = value32,
                    Axis::Y | Axis::Z => cell.y = value32,
                }
            }
            ParamTarget::ToneMapping => {
                let mode = ToneMapping::from_code(value as u32)
                    .ok_or_else(|| SceneError::msg(format!("{value} is not a tone mapping code")))?;
                self.renderer.settings_mut().tone_mapping = mode;
            }
            ParamTarget::ToneMappingExposure => self.renderer.settings_mut().tone_mapping_exposure = value32,
        }
        Ok(())
    }

    fn read_target(&self, target: &ParamTarget) -> Result<f64> {
        let value = match target {
            ParamTarget::NodeRotationY(node) => self.node(*node)?.transform.rotation.y,
            ParamTarget::EnvMapIntensity => self.debug.env_map_intensity,
            ParamTarget::LightIntensity(node) => self
                .node(*node)?
                .as_light()
                .map(|light| light.intensity)
                .ok_or_else(|| SceneError::msg("node is not a light"))?,
            ParamTarget::LightPosition(node, axis) => {
                let position = self.node(*node)?.transform.position;
                match axis {
                    Axis::X => position.x,
                    Axis::Y => position.y,
                    Axis::Z => position.z,
                }
            }
            ParamTarget::UniformVec2 { node, uniform, axis } => {
                let cell = self
                    .node(*node)?
                    .shader()
                    .and_then(|shader| shader.uniforms.vec2(uniform))
                    .ok_or_else(|| SceneError::msg(format!("node has no vec2 uniform `{uniform}`")))?;
                match axis {
                    Axis::X => cell.x,
                    Axis::Y | Axis::Z => cell.y,
                }
            }
            ParamTarget::ToneMapping => return Ok(self.renderer.settings().tone_mapping.code() as f64),
            ParamTarget::ToneMappingExposure => self.renderer.settings().tone_mapping_exposure,
        };
        Ok(value as f64)
    }

    /// Resize handler: viewport, camera projection, then renderer output.
    /// Nothing changes unless the viewport and the renderer both accept the
    /// new size.
    pub fn resize(&mut self, event: ResizeEvent) -> Result<()> {
        let mut viewport = self.viewport;
        viewport.apply(event)?;
        self.renderer
            .resize(viewport.width(), viewport.height(), viewport.pixel_ratio())?;

        self.viewport = viewport;
        self.camera.aspect = viewport.aspect();
        self.camera.update_projection_matrix();
        tracing::debug!(
            width = self.viewport.width(),
            height = self.viewport.height(),
            pixel_ratio = self.viewport.pixel_ratio(),
            "viewport resized"
        );
        Ok(())
    }

    pub fn apply_action(&mut self, action: &Action) -> Result<()> {
        match action {
            Action::Control(update) => self.set_control(&update.target, update.value).map(|_| ()),
            Action::Orbit { dx, dy } => {
                self.controls.rotate(*dx, *dy, self.viewport.height() as f32);
                Ok(())
            }
            Action::Dolly { factor } => {
                self.controls.dolly(*factor);
                Ok(())
            }
            Action::Resize(event) => self.resize(*event),
        }
    }

    pub fn shader_time(&self) -> Option<f32> {
        self.scene
            .get(self.handles.flag)
            .and_then(Node::shader)
            .and_then(|shader| shader.uniforms.float(U_TIME))
    }

    pub fn set_shader_time(&mut self, seconds: f32) {
        let written = self
            .scene
            .get_mut(self.handles.flag)
            .and_then(Node::shader_mut)
            .map(|shader| shader.uniforms.set_float(U_TIME, seconds))
            .unwrap_or(false);
        if !written {
            tracing::warn!("flag material has no time uniform");
        }
    }

    /// Steps the orbit controls and mirrors the camera into its scene node.
    pub fn update_controls(&mut self) -> bool {
        let moved = self.controls.update(&mut self.camera);
        if let Some(node) = self.scene.get_mut(self.handles.camera) {
            node.transform.position = self.camera.position;
        }
        moved
    }

    pub fn render(&mut self) -> Result<()> {
        self.renderer.render(&mut self.scene, &self.camera)
    }

    fn node(&self, id: NodeId) -> Result<&Node> {
        self.scene
            .get(id)
            .ok_or_else(|| SceneError::msg(format!("node {} does not exist", id.index())))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.scene
            .get_mut(id)
            .ok_or_else(|| SceneError::msg(format!("node {} does not exist", id.index())))
    }

    fn light_mut(&mut self, id: NodeId) -> Result<&mut DirectionalLight> {
        self.node_mut(id)?
            .as_light_mut()
            .ok_or_else(|| SceneError::msg("node is not a light"))
    }
}

fn axis_mut(vector: &mut glam::Vec3, axis: Axis) -> &mut f32 {
    match axis {
        Axis::X => &mut vector.x,
        Axis::Y => &mut vector.y,
        Axis::Z => &mut vector.z,
    }
}

fn add_light(scene: &mut SceneGraph, config: &AppConfig) -> Result<NodeId> {
    let light = &config.light;
    let mut node = Node::new(
        "directional-light",
        NodeKind::DirectionalLight(DirectionalLight {
            color: Color::from_hex(&light.color)?,
            intensity: light.intensity,
            shadow: ShadowSettings {
                far: light.shadow_far,
                map_size: light.shadow_map_size,
            },
        }),
    )
    .with_transform(Transform {
        position: light.position,
        ..Transform::IDENTITY
    });
    node.cast_shadow = light.cast_shadow;
    Ok(scene.add_to_root(node))
}

fn add_flag<R: Rng>(
    scene: &mut SceneGraph,
    config: &AppConfig,
    texture: TextureHandle,
    rng: &mut R,
) -> Result<NodeId> {
    let flag = &config.flag;
    let mut geometry =
        Geometry::plane(flag.width, flag.height, flag.width_segments, flag.height_segments)?;
    let random = random_attribute(geometry.vertex_count(), rng);
    geometry.set_attribute(A_RANDOM, random)?;

    let material = ShaderMaterial::flag(
        Vec2::new(flag.frequency.x, flag.frequency.y),
        Color::from_hex(&flag.color)?,
        texture,
    );
    let node = Node::new(
        "flag",
        NodeKind::Mesh(Mesh {
            geometry,
            material: Material::RawShader(material),
        }),
    )
    .with_transform(Transform {
        scale: flag.scale,
        ..Transform::IDENTITY
    });
    Ok(scene.add_to_root(node))
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::render::HeadlessBackend;

    fn context() -> AppContext {
        let mut config = AppConfig::default();
        config.assets.model = "missing/scene.gltf".into();
        AppContext::assemble_with_rng(config, Box::new(HeadlessBackend::new()), &mut StdRng::seed_from_u64(3))
            .unwrap()
    }

    #[test]
    fn assembles_fixed_objects_before_model() {
        let ctx = context();

        assert!(ctx.handles.model.is_none());
        assert!(ctx.panel.get(MODEL_ROTATION_CONTROL).is_none());
        assert_eq!(ctx.scene.background, Some(ctx.handles.environment));
        assert_eq!(ctx.scene.environment, Some(ctx.handles.environment));
        assert_eq!(ctx.shader_time(), Some(0.0));
        assert_eq!(ctx.control_value(ENV_INTENSITY_CONTROL).unwrap(), 1.0);

        let flag = ctx.scene.get(ctx.handles.flag).unwrap();
        let random = flag.as_mesh().unwrap().geometry.attribute(A_RANDOM).unwrap();
        assert_eq!(random.len(), 33 * 33);
        assert!(random.iter().all(|value| (0.0..1.0).contains(value)));

        let light = ctx.scene.get(ctx.handles.light).unwrap();
        assert!(light.cast_shadow);
        assert_eq!(light.as_light().unwrap().shadow.far, 15.0);
    }

    #[test]
    fn oversized_flag_fails_assembly() {
        let mut config = AppConfig::default();
        config.flag.width_segments = u32::MAX;
        let result =
            AppContext::assemble_with_rng(config, Box::new(HeadlessBackend::new()), &mut StdRng::seed_from_u64(3));
        assert!(result.is_err());
    }

    #[test]
    fn controls_write_through() {
        let mut ctx = context();

        ctx.set_control("lightX", 1.25).unwrap();
        ctx.set_control("lightIntensity", 7.0).unwrap();
        ctx.set_control("frequencyY", 12.5).unwrap();
        ctx.set_control("toneMappingExposure", 2.0).unwrap();

        let light = ctx.scene.get(ctx.handles.light).unwrap();
        assert_eq!(light.transform.position.x, 1.25);
        assert_eq!(light.as_light().unwrap().intensity, 7.0);
        assert_eq!(ctx.control_value("frequencyY").unwrap(), 12.5);
        assert_eq!(ctx.control_value("frequencyX").unwrap(), 5.0);
        assert_eq!(ctx.renderer.settings().tone_mapping_exposure, 2.0);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let mut ctx = context();
        assert_eq!(ctx.set_control("lightY", 99.0).unwrap(), 5.0);
        assert!(matches!(
            ctx.set_control("unknown", 1.0),
            Err(SceneError::UnknownControl(_))
        ));
    }

    #[test]
    fn tone_mapping_follows_selection() {
        let mut ctx = context();
        for mode in ToneMapping::ALL {
            ctx.select_option(TONE_MAPPING_CONTROL, mode.label()).unwrap();
            assert_eq!(ctx.renderer.settings().tone_mapping, mode);
        }
        assert!(ctx.set_control(TONE_MAPPING_CONTROL, 7.0).is_err());
        assert_eq!(ctx.renderer.settings().tone_mapping, ToneMapping::AcesFilmic);
    }

    #[test]
    fn resize_updates_camera_and_renderer() {
        let mut ctx = context();
        ctx.resize(ResizeEvent {
            width: 1000,
            height: 400,
            device_pixel_ratio: 3.0,
        })
        .unwrap();

        assert!((ctx.camera.aspect - 2.5).abs() < 1e-6);
        assert_eq!(ctx.viewport.pixel_ratio(), 2.0);
        assert_eq!(ctx.renderer.pixel_ratio(), 2.0);
        assert_eq!(ctx.renderer.drawing_buffer_size(), glam::UVec2::new(2000, 800));
    }

    /// Accepts nothing wider or taller than 4096 physical pixels.
    struct CappedBackend;

    impl RenderBackend for CappedBackend {
        fn resize(&mut self, drawing_buffer: glam::UVec2) -> Result<()> {
            if drawing_buffer.max_element() > 4096 {
                return Err(SceneError::Render("output too large".into()));
            }
            Ok(())
        }

        fn render(&mut self, _: &crate::render::FrameInput<'_>) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn rejected_resize_leaves_viewport_and_camera_in_sync() {
        let mut config = AppConfig::default();
        config.assets.model = "missing/scene.gltf".into();
        let mut ctx =
            AppContext::assemble_with_rng(config, Box::new(CappedBackend), &mut StdRng::seed_from_u64(3))
                .unwrap();
        ctx.resize(ResizeEvent {
            width: 1000,
            height: 500,
            device_pixel_ratio: 2.0,
        })
        .unwrap();
        let projection = ctx.camera.projection_matrix();

        let err = ctx.resize(ResizeEvent {
            width: 3000,
            height: 500,
            device_pixel_ratio: 2.0,
        });
        assert!(matches!(err, Err(SceneError::Render(_))));

        assert_eq!((ctx.viewport.width(), ctx.viewport.height()), (1000, 500));
        assert_eq!(ctx.viewport.pixel_ratio(), 2.0);
        assert!((ctx.camera.aspect - 2.0).abs() < 1e-6);
        assert_eq!(ctx.camera.projection_matrix(), projection);
        assert_eq!(ctx.renderer.size(), glam::UVec2::new(1000, 500));
        assert_eq!(ctx.renderer.pixel_ratio(), 2.0);
    }

    #[test]
    fn failed_model_load_leaves_scene_untouched() {
        let mut ctx = context();
        let nodes = ctx.scene.len();

        assert_eq!(ctx.wait_for_assets(Duration::from_secs(5)), 0);
        assert_eq!(ctx.scene.len(), nodes);
        assert!(ctx.handles.model.is_none());
    }
}
