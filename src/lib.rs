pub mod canvas;
pub mod color;
pub mod deferred;
pub mod error;
pub mod gpu;
pub mod map;
pub mod renderer;
pub mod sprites;
pub mod viewer;

pub use canvas::Canvas;
pub use color::Color;
pub use deferred::DisposalQueue;
pub use error::{LoadError, RenderError};
pub use gpu::{Gpu, PipelineCache, TextureId};
pub use renderer::bucket::{Bucket, Placeholder};
pub use renderer::view::ViewState;
pub use renderer::{DrawStats, Renderer};

/// Edge length in pixels of one map tile, and of the placeholder quad.
pub const DEFAULT_TILE_SIZE: u32 = 32;
