use std::path::PathBuf;

/// Result alias that carries the custom [`SceneError`] type.
pub type Result<T> = std::result::Result<T, SceneError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// Free-form failure that does not warrant its own variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Malformed configuration, preset or model JSON.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// A glTF document failed to parse or validate.
    #[error("{0}")]
    Gltf(#[from] gltf::Error),
    /// An image header could not be read.
    #[error("{0}")]
    Image(#[from] image::ImageError),
    /// An asset was found but could not be turned into a usable resource.
    #[error("failed to load `{}`: {reason}", .path.display())]
    AssetLoad { path: PathBuf, reason: String },
    /// The file extension does not match any supported loader.
    #[error("unsupported asset format for `{}`", .0.display())]
    UnsupportedFormat(PathBuf),
    /// A debug-panel write named a control that is not registered.
    #[error("no control named `{0}` is registered")]
    UnknownControl(String),
    /// A choice control received a value that is not one of its options.
    #[error("`{value}` is not an option of control `{control}`")]
    InvalidChoice { control: String, value: f64 },
    /// The host reported a surface with no area.
    #[error("viewport must be non-empty, got {width}x{height}")]
    EmptyViewport { width: u32, height: u32 },
    /// The render backend rejected a frame.
    #[error("render failed: {0}")]
    Render(String),
}

impl SceneError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Creates an [`SceneError::AssetLoad`] for `path`.
    pub fn asset<P: Into<PathBuf>, R: Into<String>>(path: P, reason: R) -> Self {
        Self::AssetLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<&str> for SceneError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for SceneError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
