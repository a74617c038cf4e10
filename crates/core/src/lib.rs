//! Core library for the realistic-render scene demo.
//!
//! The crate builds a small fixed scene (a loaded model, an environment cube
//! map, a directional light and a shader-driven flag), exposes its tunable
//! values through a debug panel, and drives a per-refresh update and redraw
//! loop. Drawing itself sits behind [`RenderBackend`]; [`HeadlessBackend`]
//! records what each frame would show.

pub mod assets;
pub mod camera;
pub mod config;
pub mod context;
pub mod controls;
pub mod error;
pub mod frame;
pub mod render;
pub mod scene;
pub mod shader;
pub mod timeline;
pub mod viewport;

pub use assets::{AssetLoader, ModelAsset, TextureHandle, TextureState};
pub use camera::{OrbitControls, PerspectiveCamera};
pub use config::AppConfig;
pub use context::AppContext;
pub use controls::{Control, ControlPanel, ParameterUpdate};
pub use error::{Result, SceneError};
pub use frame::{FrameLoop, FramePacer, FrameStats, RunSummary};
pub use render::{FrameLog, FrameRecord, HeadlessBackend, RenderBackend, Renderer, ToneMapping};
pub use scene::{Material, NodeId, SceneGraph};
pub use timeline::{Action, Clock, MonotonicClock, Preset, ScheduledEvent, Scheduler, SimulatedClock};
pub use viewport::{ResizeEvent, Viewport};
