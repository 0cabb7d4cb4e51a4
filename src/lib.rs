//! Software 3D renderer core for a flash-resident DOOM engine port.
//!
//! The crate is organized the way the renderer's own data flows:
//! [`flash`] is the transport boundary down to external memory,
//! [`wad`] resolves it into a lump directory, [`map`] and [`texture`]
//! parse level geometry and graphics out of that directory, [`view`]
//! builds the per-frame projection tables, and [`render`] is the
//! pipeline that turns all of it into a framebuffer.

pub mod error;
pub mod fixed;
pub mod flash;
pub mod map;
pub mod render;
pub mod texture;
pub mod view;
pub mod wad;
