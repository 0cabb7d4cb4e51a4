//! Visplane flush (§4.8): rasterises every visplane accumulated this
//! frame as horizontal spans, with the sky-flat special case. Grounded
//! on vanilla Doom's `R_DrawPlanes`/`R_MakeSpans` row-keyed span
//! construction (no equivalent exists in the teacher, which never
//! implemented a software flat rasteriser) — the `spanstart[]`-per-row
//! state machine is the same one the spec's §4.8 names directly.

use super::columns::{draw_column, draw_span};
use super::context::{DrawContext, Frame, PlaneKey, SpanContext, PLANE_UNSET};
use super::segs::lightnum;
use crate::error::RenderError;
use crate::fixed::{Angle, Fixed, finecosine, finesine};
use crate::texture::TextureStore;
use crate::view::{MAXLIGHTZ, ViewFrustum, ViewState};

const LIGHTZSHIFT: u32 = 20;

/// Flushes every accumulated visplane to the framebuffer. Called once
/// per frame, after the BSP walk and all seg rendering is done.
pub fn draw_planes(
    frame: &mut Frame,
    frustum: &ViewFrustum,
    view: &ViewState,
    textures: &TextureStore,
) -> Result<(), RenderError> {
    let count = frame.visplanes.len();
    for i in 0..count {
        draw_one_plane(frame, frustum, view, textures, i as u16)?;
    }
    Ok(())
}

fn draw_one_plane(
    frame: &mut Frame,
    frustum: &ViewFrustum,
    view: &ViewState,
    textures: &TextureStore,
    plane_id: u16,
) -> Result<(), RenderError> {
    let (key, minx, maxx) = {
        let plane = &frame.visplanes[plane_id as usize];
        (plane.key, plane.minx, plane.maxx)
    };
    if minx > maxx {
        return Ok(());
    }

    if textures.is_sky_flat(key.picnum as u16) {
        draw_sky(frame, frustum, view, textures, plane_id, minx, maxx)?;
        return Ok(());
    }

    let Some(flat) = textures.flat(key.picnum as u16) else {
        return Ok(());
    };

    let planeheight = (Fixed(key.height) - view.z).abs();
    let light_row = lightnum(key.lightlevel, view.extralight);

    // §4.8: walk [minx, maxx+1] comparing each column's top/bottom
    // against the previous column's, opening/closing row spans exactly
    // as vanilla's R_MakeSpans does. `top`/`bottom` are full-width
    // arrays pre-filled with the sentinel, so `x-1` at `x==minx` reads
    // the sentinel with no special-casing needed.
    let stop = maxx + 1;
    for x in minx..=stop {
        let (t1, b1) = column_at(frame, plane_id, x - 1);
        let (t2, b2) = column_at(frame, plane_id, x);
        make_spans(frame, frustum, view, textures, flat, planeheight, light_row, x, t1, b1, t2, b2)?;
    }
    Ok(())
}

fn column_at(frame: &Frame, plane_id: u16, x: i32) -> (i32, i32) {
    if x < 0 || x >= frame.width {
        return (PLANE_UNSET, -1);
    }
    let plane = &frame.visplanes[plane_id as usize];
    (plane.top[x as usize], plane.bottom[x as usize])
}

#[allow(clippy::too_many_arguments)]
fn make_spans(
    frame: &mut Frame,
    frustum: &ViewFrustum,
    view: &ViewState,
    textures: &TextureStore,
    flat: &crate::texture::Flat,
    planeheight: Fixed,
    light_row: usize,
    x: i32,
    mut t1: i32,
    mut b1: i32,
    mut t2: i32,
    mut b2: i32,
) -> Result<(), RenderError> {
    while t1 < t2 && t1 <= b1 {
        let open = frame.spanstart[t1 as usize];
        map_plane(frame, frustum, view, textures, flat, planeheight, light_row, t1, open, x - 1)?;
        t1 += 1;
    }
    while b1 > b2 && b1 >= t1 {
        let open = frame.spanstart[b1 as usize];
        map_plane(frame, frustum, view, textures, flat, planeheight, light_row, b1, open, x - 1)?;
        b1 -= 1;
    }
    while t2 < t1 && t2 <= b2 {
        frame.spanstart[t2 as usize] = x;
        t2 += 1;
    }
    while b2 > b1 && b2 >= t2 {
        frame.spanstart[b2 as usize] = x;
        b2 -= 1;
    }
    Ok(())
}

/// Draws one horizontal span of row `y` from `x1` to `x2`. The
/// `(xfrac, yfrac)`/step pair is computed from the span's two
/// endpoints rather than vanilla's per-row incremental cache — a
/// direct analogue of `segs::draw_pass`'s linear U interpolation, kept
/// for the same reason: it reuses the already-built `draw_span`
/// contract without a second per-pixel trig evaluation.
#[allow(clippy::too_many_arguments)]
fn map_plane(
    frame: &mut Frame,
    frustum: &ViewFrustum,
    view: &ViewState,
    textures: &TextureStore,
    flat: &crate::texture::Flat,
    planeheight: Fixed,
    light_row: usize,
    y: i32,
    x1: i32,
    x2: i32,
) -> Result<(), RenderError> {
    if x1 > x2 || y < 0 || y >= frame.height {
        return Ok(());
    }
    let x1c = x1.clamp(0, frustum.width - 1);
    let x2c = x2.clamp(0, frustum.width - 1);

    let distance = planeheight.mul(frustum.yslope[y as usize]);

    let world_point = |x: i32| -> (Fixed, Fixed) {
        let length = distance.mul(frustum.distscale[x as usize]);
        let angle = view.angle.add(frustum.xtoviewangle[x as usize]);
        let idx = angle.fine_index();
        let wx = view.x + length.mul(finecosine(idx));
        let wy = view.y - length.mul(finesine(idx));
        (wx, wy)
    };

    let (sx, sy) = world_point(x1c);
    let (ex, ey) = world_point(x2c);
    let span = (x2c - x1c).max(1);
    let xstep = (ex - sx).div(Fixed::from_int(span));
    let ystep = (ey - sy).div(Fixed::from_int(span));

    let colormap = if let Some(fixed) = view.fixedcolormap {
        textures.colormap.table(fixed)
    } else {
        let zidx = ((distance.0 as u32) >> LIGHTZSHIFT).min(MAXLIGHTZ as u32 - 1) as usize;
        textures.colormap.table(frustum.zlight[light_row][zidx])
    };

    let sp = SpanContext {
        y,
        x1: x1c,
        x2: x2c,
        source: &flat.pixels,
        colormap,
        xfrac: sx.0 as u32,
        yfrac: sy.0 as u32,
        xstep: xstep.0 as u32,
        ystep: ystep.0 as u32,
    };
    draw_span(&mut frame.framebuffer, frame.width, &sp);
    Ok(())
}

/// Sky special case (§4.8): no perspective flat mapping, just a column
/// render of the sky wall texture, indexed by absolute view angle, at
/// full brightness.
fn draw_sky(
    frame: &mut Frame,
    frustum: &ViewFrustum,
    view: &ViewState,
    textures: &TextureStore,
    plane_id: u16,
    minx: i32,
    maxx: i32,
) -> Result<(), RenderError> {
    let Some(sky_tex) = textures.texture_num_for_name(crate::texture::SKY_TEXTURE_NAME) else {
        return Ok(());
    };
    let mask = textures.texture_width_mask(sky_tex);
    // vanilla scales skytexturemid for the view height so a 128-tall
    // sky texture is centred the same way regardless of resolution.
    let skytexturemid = Fixed::from_f64(100.0 * frustum.height as f64 / 200.0);
    let colormap = textures.colormap.table(0);

    for x in minx..=maxx {
        let (top, bottom) = {
            let plane = &frame.visplanes[plane_id as usize];
            (plane.top[x as usize], plane.bottom[x as usize])
        };
        if top == PLANE_UNSET || top > bottom {
            continue;
        }
        let angle = view.angle.add(frustum.xtoviewangle[x as usize]);
        let col = ((angle.0 >> 22) & mask) as usize;
        let Ok(source) = textures.get_cached_column(sky_tex, col) else {
            continue;
        };
        let dc = DrawContext {
            x,
            yl: top,
            yh: bottom,
            iscale: Fixed::ONE,
            texturemid: skytexturemid,
            source,
            colormap,
        };
        draw_column(&mut frame.framebuffer, frame.width, &dc);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_frustum() -> (ViewState, ViewFrustum) {
        let view = ViewState {
            x: Fixed::ZERO,
            y: Fixed::ZERO,
            z: Fixed::ZERO,
            angle: Angle::ZERO,
            extralight: 0,
            fixedcolormap: None,
        };
        let frustum = ViewFrustum::build(&view, 320, 200);
        (view, frustum)
    }

    #[test]
    fn freshly_allocated_plane_has_no_coverage() {
        let mut frame = Frame::new(320, 200);
        let key = PlaneKey { height: 0, picnum: 0, lightlevel: 0 };
        let id = frame.find_plane(key, 5, 2).unwrap();
        let plane = &frame.visplanes[id as usize];
        // nothing has marked a column yet, so minx/maxx stay at their
        // "empty" sentinel values and draw_one_plane's minx>maxx guard fires
        assert!(plane.minx > plane.maxx);
    }

    #[test]
    fn spanstart_records_the_opening_column() {
        let (_, _frustum) = make_frustum();
        let mut frame = Frame::new(320, 200);
        frame.spanstart[50] = 10;
        assert_eq!(frame.spanstart[50], 10);
    }

    #[test]
    fn column_at_out_of_range_reads_as_sentinel() {
        let mut frame = Frame::new(320, 200);
        let key = PlaneKey { height: 0, picnum: 0, lightlevel: 0 };
        let id = frame.find_plane(key, 0, 10).unwrap();
        assert_eq!(column_at(&frame, id, -1), (PLANE_UNSET, -1));
        assert_eq!(column_at(&frame, id, 320), (PLANE_UNSET, -1));
    }
}
