pub mod backbuffer;
pub mod clipper;
pub mod color;
pub mod error;
pub mod geometry;
pub mod math;
pub mod mesh;
pub mod rasterizer;
pub mod renderer;
pub mod screenshot;
pub mod shader;
pub mod stats;
pub mod task_system;
pub mod texture;
pub mod tile;

pub use backbuffer::{ColorBuffer, DepthBuffer, FrameBuffer, GBuffer, GBufferTexel, DEPTH_FAR, NO_SURFACE};
pub use color::Color;
pub use error::{MeshError, TextureError};
pub use mesh::Mesh;
pub use renderer::{Frame, RenderTargets, Renderer, RendererSettings};
pub use stats::FrameStats;
pub use task_system::TaskSystem;
pub use texture::Texture;
