use std::fmt;

// ── RenderError ───────────────────────────────────────────────────────────────

/// Failures surfaced by the GPU-facing half of the crate.
///
/// Only [`RenderError::Shader`] is fatal: without a working pipeline no
/// viewport can produce a frame.  Target errors leave the previously allocated
/// canvas texture in place so the embedding UI can keep showing it.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// The tile shader failed to compile or link.
    Shader(String),
    /// Requested render target exceeds the device's 2D texture limit.
    TargetTooLarge { width: u32, height: u32, max: u32 },
    /// The backend could not allocate a render target.
    TargetAllocation(String),
    /// Vertex or index data of a batch exceeds the device's buffer size limit.
    BatchTooLarge { bytes: u64, max: u64 },
    /// A sprite sheet exceeds the device's 2D texture limit or is empty.
    TextureTooLarge { width: u32, height: u32, max: u32 },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Shader(msg) => write!(f, "unable to create shader: {msg}"),
            RenderError::TargetTooLarge { width, height, max } => {
                write!(f, "canvas target {width}x{height} exceeds device limit {max}")
            }
            RenderError::TargetAllocation(msg) => write!(f, "unable to allocate canvas target: {msg}"),
            RenderError::BatchTooLarge { bytes, max } => {
                write!(f, "batch of {bytes} bytes exceeds device buffer limit {max}")
            }
            RenderError::TextureTooLarge { width, height, max } => {
                write!(f, "texture {width}x{height} is outside device limit 1..={max}")
            }
        }
    }
}

impl std::error::Error for RenderError {}

// ── LoadError ─────────────────────────────────────────────────────────────────

/// Failures while reading a JSON document (map snapshot, viewer config) from disk.
#[derive(Debug)]
pub enum LoadError {
    Io(std::io::Error),
    Json(serde_json::Error),
    /// Well-formed JSON whose values cannot be used.
    Invalid(String),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "read failed: {e}"),
            LoadError::Json(e) => write!(f, "malformed json: {e}"),
            LoadError::Invalid(msg) => write!(f, "invalid value: {msg}"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Io(e) => Some(e),
            LoadError::Json(e) => Some(e),
            LoadError::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        LoadError::Io(e)
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(e: serde_json::Error) -> Self {
        LoadError::Json(e)
    }
}
