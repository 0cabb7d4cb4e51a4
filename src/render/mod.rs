//! Software rendering pipeline (§4): BSP traversal and occlusion,
//! per-seg wall rasterization, floor/ceiling visplanes, and thing
//! (sprite) projection and depth-sorted drawing, tied together by
//! [`pipeline::render_frame`].

mod bsp;
mod columns;
mod context;
mod pipeline;
mod planes;
mod segs;
mod things;

pub use context::{
    ColormapSource, DrawContext, DrawSeg, Frame, PlaneKey, SpanContext, Silhouette, VisPlane,
    VisSprite, MAX_DRAWSEGS, MAX_OPENINGS, MAX_SOLIDSEGS, MAX_VISPLANES, MAX_VISSPRITES,
    PLANE_UNSET,
};
pub use pipeline::render_frame;

pub use bsp::{angle_to_x, point_to_angle};
pub use columns::{
    draw_column, draw_column_low_detail, draw_fuzz_column, draw_masked_column, draw_span,
    draw_sprite_column, draw_translated_column, FuzzState, FUZZOFFSET,
};
pub use segs::add_line;
pub use planes::draw_planes;
pub use things::{add_sprites, draw_masked};
