//! Shared error taxonomy.
//!
//! Each component owns its own variant set but all of them are built
//! from the same five buckets the spec names: bad I/O, bad format,
//! capacity exceeded, not found, and range errors. Load-time errors are
//! propagated with `?`; nothing in the render path itself returns a
//! `Result` (see [`crate::render::pipeline`]).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WadError {
    #[error("flash I/O error")]
    Io,
    #[error("bad WAD magic (expected IWAD or PWAD)")]
    BadMagic,
    #[error("lump directory exceeds MAX_NUMLUMPS ({0} > {1})")]
    TooManyLumps(usize, usize),
    #[error("lump directory entry {0} out of bounds")]
    DirectoryOutOfBounds(usize),
    #[error("lump not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum MapError {
    #[error(transparent)]
    Wad(#[from] WadError),
    #[error("map marker not found: {0}")]
    MarkerNotFound(String),
    #[error("required map lump missing: {0}")]
    MissingLump(&'static str),
    #[error("lump {0} size {1} is not a multiple of record size {2}")]
    Truncated(&'static str, usize, usize),
    #[error("index out of range in {what}: {index} >= {bound}")]
    RangeError {
        what: &'static str,
        index: usize,
        bound: usize,
    },
}

#[derive(Debug, Error)]
pub enum TextureError {
    #[error(transparent)]
    Wad(#[from] WadError),
    #[error("too many textures ({0} > {1})")]
    TooManyTextures(usize, usize),
    #[error("texture {texture} references unknown patch index {patch}")]
    BadPatchReference { texture: String, patch: i16 },
    #[error("composite column {col} out of range (width {width})")]
    CompositeOverflow { col: usize, width: usize },
    #[error("flat lump {0} has wrong size {1} (expected 4096)")]
    BadFlatSize(String, usize),
    #[error("no PLAYPAL lump")]
    NoPalette,
    #[error("no COLORMAP lump")]
    NoColormap,
    #[error("texture not found: {0}")]
    NotFound(String),
}

/// Internal render-path faults. These never leave the crate as a
/// `Result` — `render::pipeline::Frame::render` catches them and turns
/// them into a `panic!` per the spec's "process-level abort with
/// message" contract, keeping the public `render` call infallible.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("drawseg pool exhausted (cap {0})")]
    DrawSegsFull(usize),
    #[error("visplane pool exhausted (cap {0})")]
    VisplanesFull(usize),
    #[error("vissprite pool exhausted (cap {0})")]
    VisSpritesFull(usize),
    #[error("openings pool exhausted (cap {0})")]
    OpeningsFull(usize),
    #[error("solidsegs pool exhausted (cap {0})")]
    SolidSegsFull(usize),
    #[error("column index {0} out of range [0, {1})")]
    RangeError(i32, usize),
}
