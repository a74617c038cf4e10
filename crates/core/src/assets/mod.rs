//! Background asset loading.
//!
//! Every request is answered immediately with a handle or ticket and resolved
//! later on a worker thread. Completions travel back over a channel and are
//! only applied when the owner drains them with [`AssetLoader::poll`], so all
//! scene mutation stays on the thread that owns the loader.

mod model;

use std::{
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender},
    thread,
    time::{Duration, Instant},
};

use serde::Serialize;

use crate::{Result, SceneError};

pub use model::{load_model, parse_model, ModelAsset, ModelNode};

/// Opaque reference to a texture owned by the [`AssetLoader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TextureHandle(u32);

impl TextureHandle {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn id(self) -> u32 {
        self.0
    }
}

/// Identifies one outstanding model request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadTicket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextureKind {
    Flat,
    Cube,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColorSpace {
    Linear,
    Srgb,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TextureState {
    Pending,
    Ready { width: u32, height: u32 },
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct TextureEntry {
    pub kind: TextureKind,
    pub sources: Vec<PathBuf>,
    pub color_space: ColorSpace,
    pub state: TextureState,
}

impl TextureEntry {
    pub fn is_ready(&self) -> bool {
        matches!(self.state, TextureState::Ready { .. })
    }
}

/// A model request that has finished, successfully or not.
#[derive(Debug)]
pub struct LoadedModel {
    pub ticket: LoadTicket,
    pub path: PathBuf,
    pub result: Result<ModelAsset>,
}

enum Completion {
    Model(LoadedModel),
    Texture {
        handle: TextureHandle,
        result: Result<(u32, u32)>,
    },
}

pub struct AssetLoader {
    textures: Vec<TextureEntry>,
    sender: Sender<Completion>,
    receiver: Receiver<Completion>,
    in_flight: usize,
    next_ticket: u64,
}

impl AssetLoader {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            textures: Vec::new(),
            sender,
            receiver,
            in_flight: 0,
            next_ticket: 0,
        }
    }

    /// Starts reading a glTF model.
    pub fn load_model(&mut self, path: impl Into<PathBuf>) -> LoadTicket {
        let path = path.into();
        let ticket = LoadTicket(self.next_ticket);
        self.next_ticket += 1;

        tracing::info!(path = %path.display(), "loading model");
        let job_path = path.clone();
        self.spawn("model", move || {
            Completion::Model(LoadedModel {
                ticket,
                result: load_model(&job_path),
                path: job_path,
            })
        });
        ticket
    }

    /// Starts probing a flat texture. The handle is usable right away.
    pub fn load_texture(&mut self, path: impl Into<PathBuf>) -> TextureHandle {
        let path = path.into();
        let handle = self.register(TextureKind::Flat, vec![path.clone()]);

        self.spawn("texture", move || Completion::Texture {
            handle,
            result: read_dimensions(&path),
        });
        handle
    }

    /// Starts probing six cube faces. All faces must share one square size.
    pub fn load_cube_texture(&mut self, faces: [PathBuf; 6]) -> TextureHandle {
        let handle = self.register(TextureKind::Cube, faces.to_vec());

        self.spawn("cube-texture", move || Completion::Texture {
            handle,
            result: read_cube_dimensions(&faces),
        });
        handle
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&TextureEntry> {
        self.textures.get(handle.0 as usize)
    }

    pub fn set_color_space(&mut self, handle: TextureHandle, color_space: ColorSpace) {
        if let Some(entry) = self.textures.get_mut(handle.0 as usize) {
            entry.color_space = color_space;
        }
    }

    pub fn textures(&self) -> impl Iterator<Item = (TextureHandle, &TextureEntry)> {
        self.textures
            .iter()
            .enumerate()
            .map(|(index, entry)| (TextureHandle(index as u32), entry))
    }

    /// Number of requests that have not been drained yet.
    pub fn pending(&self) -> usize {
        self.in_flight
    }

    /// Drains finished requests without blocking. Texture results are folded
    /// into their entries; finished models are handed back to the caller.
    pub fn poll(&mut self) -> Vec<LoadedModel> {
        let mut models = Vec::new();
        while let Ok(completion) = self.receiver.try_recv() {
            if let Some(model) = self.complete(completion) {
                models.push(model);
            }
        }
        models
    }

    /// Blocks until every outstanding request is drained or `timeout` passes.
    pub fn wait(&mut self, timeout: Duration) -> Vec<LoadedModel> {
        let deadline = Instant::now() + timeout;
        let mut models = Vec::new();
        while self.in_flight > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(completion) => {
                    if let Some(model) = self.complete(completion) {
                        models.push(model);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    tracing::warn!(pending = self.in_flight, "timed out waiting for assets");
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        models
    }

    fn register(&mut self, kind: TextureKind, sources: Vec<PathBuf>) -> TextureHandle {
        let handle = TextureHandle(self.textures.len() as u32);
        self.textures.push(TextureEntry {
            kind,
            sources,
            color_space: ColorSpace::Linear,
            state: TextureState::Pending,
        });
        handle
    }

    fn spawn<F>(&mut self, label: &str, job: F)
    where
        F: FnOnce() -> Completion + Send + 'static,
    {
        self.in_flight += 1;
        let sender = self.sender.clone();
        let spawned = thread::Builder::new()
            .name(format!("asset-{label}"))
            .spawn(move || {
                // The receiver only disappears when the loader is dropped.
                let _ = sender.send(job());
            });

        if let Err(err) = spawned {
            tracing::warn!(%err, label, "could not start loader thread");
            self.in_flight -= 1;
        }
    }

    fn complete(&mut self, completion: Completion) -> Option<LoadedModel> {
        self.in_flight = self.in_flight.saturating_sub(1);
        match completion {
            Completion::Model(model) => Some(model),
            Completion::Texture { handle, result } => {
                let Some(entry) = self.textures.get_mut(handle.0 as usize) else {
                    return None;
                };
                entry.state = match result {
                    Ok((width, height)) => {
                        tracing::debug!(texture = handle.0, width, height, "texture ready");
                        TextureState::Ready { width, height }
                    }
                    Err(err) => {
                        tracing::warn!(texture = handle.0, %err, "texture failed to load");
                        TextureState::Failed(err.to_string())
                    }
                };
                None
            }
        }
    }
}

impl Default for AssetLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AssetLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetLoader")
            .field("textures", &self.textures.len())
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

fn read_dimensions(path: &Path) -> Result<(u32, u32)> {
    image::image_dimensions(path).map_err(|err| SceneError::asset(path, err.to_string()))
}

fn read_cube_dimensions(faces: &[PathBuf; 6]) -> Result<(u32, u32)> {
    let mut size = None;
    for face in faces {
        let (width, height) = read_dimensions(face)?;
        if width != height {
            return Err(SceneError::asset(face, format!("cube face is {width}x{height}, not square")));
        }
        match size {
            None => size = Some((width, height)),
            Some(expected) if expected != (width, height) => {
                return Err(SceneError::asset(
                    face,
                    format!("cube face is {width}x{height}, expected {}x{}", expected.0, expected.1),
                ));
            }
            Some(_) => {}
        }
    }
    size.ok_or_else(|| SceneError::msg("cube texture has no faces"))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn fixture_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("scene-demo-assets-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_png(path: &Path, width: u32, height: u32) {
        image::RgbImage::new(width, height).save(path).unwrap();
    }

    #[test]
    fn texture_handles_are_pending_until_polled() {
        let dir = fixture_dir("flat");
        let path = dir.join("flag.png");
        write_png(&path, 4, 2);

        let mut loader = AssetLoader::new();
        let handle = loader.load_texture(&path);
        assert_eq!(loader.texture(handle).unwrap().state, TextureState::Pending);
        assert!(!loader.texture(handle).unwrap().is_ready());

        loader.wait(Duration::from_secs(5));
        assert!(loader.texture(handle).unwrap().is_ready());
        assert_eq!(loader.pending(), 0);
        assert_eq!(
            loader.texture(handle).unwrap().state,
            TextureState::Ready { width: 4, height: 2 }
        );
    }

    #[test]
    fn cube_faces_must_match() {
        let dir = fixture_dir("cube");
        let mut faces = Vec::new();
        for (index, name) in ["px", "nx", "py", "ny", "pz", "nz"].iter().enumerate() {
            let path = dir.join(format!("{name}.png"));
            let size = if index == 5 { 4 } else { 8 };
            write_png(&path, size, size);
            faces.push(path);
        }
        let faces: [PathBuf; 6] = faces.try_into().unwrap();

        let mut loader = AssetLoader::new();
        let handle = loader.load_cube_texture(faces);
        loader.wait(Duration::from_secs(5));

        let entry = loader.texture(handle).unwrap();
        assert_eq!(entry.kind, TextureKind::Cube);
        assert!(matches!(&entry.state, TextureState::Failed(reason) if reason.contains("nz.png")));
    }

    #[test]
    fn missing_model_is_reported_not_raised() {
        let mut loader = AssetLoader::new();
        let ticket = loader.load_model("does/not/exist.gltf");

        let models = loader.wait(Duration::from_secs(5));
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].ticket, ticket);
        assert!(models[0].result.is_err());
    }
}
