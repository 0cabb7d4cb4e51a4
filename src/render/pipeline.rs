//! Frame entry point (§4.10): BSP walk, wall/sprite collection, plane
//! and masked-midtexture drawing, then the depth-sorted sprite pass.
//! [`render_frame`] is the only infallible boundary in the render
//! path — everything beneath it threads [`RenderError`] through `?`,
//! and this is where a pool-exhaustion fault becomes the process-level
//! abort §7 calls for, rather than a `Result` the caller has to check.

use std::cell::RefCell;

use super::bsp::walk_bsp;
use super::columns::draw_masked_column;
use super::context::{DrawContext, Frame};
use super::segs::{self, ScaleRamp, colormap_for_scale};
use super::{planes, things};
use crate::error::RenderError;
use crate::fixed::Fixed;
use crate::map::{Level, LinedefFlags, SubsectorId};
use crate::texture::TextureStore;
use crate::view::{ViewFrustum, ViewState};

pub fn render_frame(level: &Level, frustum: &ViewFrustum, view: &ViewState, textures: &TextureStore, frame: &mut Frame) {
    frame.begin_frame();

    // walk_bsp needs `frame` behind a RefCell: its own occlusion checks
    // only ever take a shared borrow, but the per-subsector visit
    // below needs a mutable one to emit drawsegs/solid-seg spans as it
    // goes, so later occlusion checks in the same walk see them.
    let owned = std::mem::replace(frame, Frame::new(1, 1));
    let cell = RefCell::new(owned);
    let walk_result = collect_subsectors(level, frustum, view, textures, &cell);
    *frame = cell.into_inner();

    let result = walk_result.and_then(|()| finish_frame(level, frustum, view, textures, frame));
    if let Err(e) = result {
        panic!("render pipeline exhausted a fixed-capacity pool: {e}");
    }
}

fn collect_subsectors(
    level: &Level,
    frustum: &ViewFrustum,
    view: &ViewState,
    textures: &TextureStore,
    frame: &RefCell<Frame>,
) -> Result<(), RenderError> {
    let mut fault: Option<RenderError> = None;

    let mut visit = |ss: SubsectorId| {
        if fault.is_some() {
            return;
        }
        if let Err(e) = visit_subsector(level, frustum, view, textures, frame, ss) {
            fault = Some(e);
        }
    };
    walk_bsp(level, view.x, view.y, view.angle, frustum, frame, &mut visit);

    match fault {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn visit_subsector(
    level: &Level,
    frustum: &ViewFrustum,
    view: &ViewState,
    textures: &TextureStore,
    frame: &RefCell<Frame>,
    ss: SubsectorId,
) -> Result<(), RenderError> {
    let sub = &level.subsectors[ss as usize];
    for i in 0..sub.seg_count {
        let seg_idx = sub.first_seg + i;
        let mut f = frame.borrow_mut();
        segs::add_line(level, frustum, view, &mut f, textures, seg_idx)?;
    }
    let mut f = frame.borrow_mut();
    things::add_sprites(level, frustum, view, &mut f, textures, ss)
}

fn finish_frame(
    level: &Level,
    frustum: &ViewFrustum,
    view: &ViewState,
    textures: &TextureStore,
    frame: &mut Frame,
) -> Result<(), RenderError> {
    planes::draw_planes(frame, frustum, view, textures)?;
    draw_masked_midtextures(level, frustum, view, frame, textures)?;
    things::draw_masked(frame, textures);
    Ok(())
}

/// Draws every two-sided seg's mid-texture (fences, grates, bars)
/// recorded on a [`super::context::DrawSeg`] during `segs::add_line`.
/// Reuses that seg's own scale ramp/colormap-by-scale math (same as
/// `segs::draw_pass`'s wall columns) and clips to the *final*
/// ceilingclip/floorclip snapshot the drawseg recorded, so a mid
/// texture never draws past whatever solid geometry ended up bounding
/// its opening. The per-column texture U coordinate is the same
/// linear interpolation `draw_pass` already uses rather than an exact
/// perspective divide — consistent with, not a regression from, the
/// rest of the wall renderer.
fn draw_masked_midtextures(
    level: &Level,
    frustum: &ViewFrustum,
    view: &ViewState,
    frame: &mut Frame,
    textures: &TextureStore,
) -> Result<(), RenderError> {
    let centery = Fixed::from_int(frustum.centery);

    for i in 0..frame.drawsegs.len() {
        let ds = frame.drawsegs[i];
        let Some(mid_tex) = ds.mid_tex else { continue };
        let Some(tex) = textures.texture_by_num(mid_tex) else { continue };
        let tex_height = Fixed::from_int(tex.height as i32);
        let texmask = textures.texture_width_mask(mid_tex);

        let seg = level.segs[ds.seg_ref as usize];
        let front = level.front_sector(&seg);
        let Some(back) = level.back_sector(&seg) else { continue };
        let sidedef = level.front_sidedef(&seg);
        let linedef = &level.linedefs[seg.linedef as usize];

        let v1 = level.vertexes[seg.v1 as usize];
        let v2 = level.vertexes[seg.v2 as usize];
        let seg_len = Fixed::from_f64(
            ((v2.x - v1.x).to_f64().powi(2) + (v2.y - v1.y).to_f64().powi(2)).sqrt(),
        );

        let opening_top = front.ceil_h.get().min(back.ceil_h.get());
        let opening_bottom = front.floor_h.get().max(back.floor_h.get());
        let light_level = front.light_level.get();

        let pegged_bottom = linedef.flags.contains(LinedefFlags::DONT_PEG_BOTTOM);
        let anchor = if pegged_bottom { opening_bottom + tex_height } else { opening_top };
        let row0_world = anchor - view.z + sidedef.tex_offset_y;

        let ramp = ScaleRamp { x1: ds.x1, scale1: ds.scale1, step: ds.scale_step };

        for x in ds.x1..=ds.x2 {
            let scale = ramp.at(x);
            let iscale = Fixed::ONE.div(scale);
            let top_y = (centery - (opening_top - view.z).mul(scale)).floor();
            let bottom_y = (centery - (opening_bottom - view.z).mul(scale)).floor();

            let col_idx = (x - ds.x1) as usize;
            let clip_top = ds
                .sprtopclip_base
                .map(|base| frame.openings[base + col_idx])
                .unwrap_or(-1);
            let clip_bottom = ds
                .sprbottomclip_base
                .map(|base| frame.openings[base + col_idx])
                .unwrap_or(frame.height - 1);

            let yl = top_y.max(clip_top + 1);
            let yh = bottom_y.min(clip_bottom);
            if yl > yh {
                continue;
            }

            let frac = if ds.x2 > ds.x1 { (x - ds.x1) as f64 / (ds.x2 - ds.x1) as f64 } else { 0.0 };
            let u = (sidedef.tex_offset_x + seg.offset + Fixed::from_f64(frac) * seg_len).floor();
            let col = (u & (texmask as i32)) as usize;
            let source = textures
                .get_cached_column(mid_tex, col)
                .map_err(|_| RenderError::RangeError(col as i32, textures.num_textures()))?;
            let texturemid = row0_world - centery.mul(iscale);
            let cm_table = colormap_for_scale(frustum, light_level, view.extralight, scale);
            let colormap = textures.colormap.table(cm_table);

            let dc = DrawContext { x, yl, yh, iscale, texturemid, source, colormap };
            draw_masked_column(&mut frame.framebuffer, frame.width, &dc);
        }
    }
    Ok(())
}
