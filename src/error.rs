use std::io;

use thiserror::Error;

/// Reasons a mesh is rejected before it ever reaches the pipeline.
#[derive(Error, Debug)]
pub enum MeshError {
    #[error("index count {0} is not a multiple of 3")]
    IndexCount(usize),
    #[error("index {index} references vertex outside 0..{vertex_count}")]
    IndexOutOfRange { index: u16, vertex_count: usize },
    #[error("attribute arrays disagree: {positions} positions, {normals} normals, {tex_coords} texture coordinates")]
    AttributeMismatch {
        positions: usize,
        normals: usize,
        tex_coords: usize,
    },
    #[error("mesh has {vertex_count} vertices, the geometry stage supports at most {max}")]
    TooManyVertices { vertex_count: usize, max: usize },
}

/// Reasons a texture file could not be loaded.
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("failed to read texture: {0}")]
    Io(#[from] io::Error),
    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),
    #[error("unsupported pixel format: {bit_count} bits, masks r={r_mask:#010x} g={g_mask:#010x} b={b_mask:#010x} a={a_mask:#010x}")]
    UnsupportedFormat {
        bit_count: u32,
        r_mask: u32,
        g_mask: u32,
        b_mask: u32,
        a_mask: u32,
    },
    #[error("texture size {width}x{height} is not a power of two up to 16384")]
    BadDimensions { width: u32, height: u32 },
    #[error("texel array holds {actual} texels, expected {expected}")]
    TexelCount { expected: usize, actual: usize },
}

pub type TextureResult<T> = Result<T, TextureError>;
