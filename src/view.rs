//! Per-frame projection tables (§4.5): `viewangletox`, `xtoviewangle`,
//! `yslope`, `distscale`, and the light-by-distance colormap tables.
//! These replace vanilla Doom's recomputed-once-per-resolution-change
//! globals with a value built fresh at `begin_frame` from the current
//! `ViewState`, per §9's "DrawContext instead of globals" note applied
//! to projection state too.

use crate::fixed::{Angle, FINEANGLES, Fixed, finetangent};
use crate::texture::COLORMAP_COUNT;

pub const SCREENWIDTH: i32 = 320;
pub const SCREENHEIGHT: i32 = 200;

pub const LIGHTLEVELS: usize = 16;
pub const LIGHTSEGSHIFT: i32 = 4;
pub const MAXLIGHTSCALE: usize = 48;
pub const MAXLIGHTZ: usize = 128;
pub const NUMCOLORMAPS: i32 = 32;

/// Input boundary (§6): produced by the game tick, read-only for the
/// renderer.
#[derive(Clone, Copy)]
pub struct ViewState {
    pub x: Fixed,
    pub y: Fixed,
    pub z: Fixed,
    pub angle: Angle,
    pub extralight: i32,
    pub fixedcolormap: Option<usize>,
}

pub struct ViewFrustum {
    pub width: i32,
    pub height: i32,
    pub centerx: i32,
    pub centery: i32,
    pub centerxfrac: Fixed,
    pub centeryfrac: Fixed,
    pub focallength: Fixed,

    /// indexed by `angle >> ANGLETOFINESHIFT` for `angle` in `[0, FINEANGLES/2]`
    pub viewangletox: Vec<i32>,
    /// indexed by screen column, inverse of `viewangletox`
    pub xtoviewangle: Vec<Angle>,
    pub yslope: Vec<Fixed>,
    pub distscale: Vec<Fixed>,

    /// `scalelight[lightlevel][scale_index] -> colormap table index`
    pub scalelight: Vec<[usize; MAXLIGHTSCALE]>,
    /// `zlight[lightlevel][z_index] -> colormap table index`
    pub zlight: Vec<[usize; MAXLIGHTZ]>,
}

impl ViewFrustum {
    pub fn build(view: &ViewState, width: i32, height: i32) -> ViewFrustum {
        let centerx = width / 2;
        let centery = height / 2;
        let centerxfrac = Fixed::from_int(centerx);
        let centeryfrac = Fixed::from_int(centery);

        // 90-degree FOV: the tangent at the half-FOV edge sets the
        // focal length so that column `centerx` is straight ahead and
        // column 0/`width` sit at the view frustum's edges.
        //
        // `viewangletox` is indexed by `i` representing the *signed*
        // fine-angle offset `i - half_fine/2` from straight ahead (so
        // `i == half_fine/2` is dead centre), matching vanilla's
        // `(angle+ANG90)>>ANGLETOFINESHIFT` convention in
        // `render::bsp::angle_to_x` — see that function for the other
        // half of this table's contract.
        let half_fine = FINEANGLES as usize / 2;
        let center_i = half_fine as i32 / 2;

        let fov_half_index = FINEANGLES as usize / 8; // 45 degrees
        let edge_tan = finetangent(fov_half_index);
        let focallength = centerxfrac.div(edge_tan.abs().max(Fixed::ONE));

        let mut viewangletox = vec![0i32; half_fine + 1];
        for (i, slot) in viewangletox.iter_mut().enumerate() {
            let signed = i as i32 - center_i;
            let fine_idx = signed.rem_euclid(FINEANGLES as i32) as usize;
            let t = finetangent(fine_idx);
            *slot = if t.0 > Fixed::ONE.0 * 2 {
                -1
            } else if t.0 < -(Fixed::ONE.0 * 2) {
                width + 1
            } else {
                let proj = t.mul(focallength);
                let x = (centerxfrac - proj).floor();
                x.clamp(-1, width + 1)
            };
        }

        let mut xtoviewangle = vec![Angle::ZERO; (width + 1) as usize];
        for x in 0..=width {
            // scan viewangletox for the finest angle index that still
            // projects to this column or further, vanilla's
            // "walking viewangletox" inverse-table construction.
            let mut i = half_fine;
            while i > 0 && viewangletox[i] < x {
                i -= 1;
            }
            let signed = i as i32 - center_i;
            xtoviewangle[x as usize] = Angle((signed << crate::fixed::ANGLETOFINESHIFT) as u32);
        }

        let mut yslope = vec![Fixed::ZERO; height as usize];
        for (y, slot) in yslope.iter_mut().enumerate() {
            let dy = ((y as i32 - centery).abs() as f64 + 0.5).max(0.5);
            *slot = Fixed::from_f64(centerx as f64 / dy);
        }

        let mut distscale = vec![Fixed::ZERO; width as usize];
        for (x, slot) in distscale.iter_mut().enumerate() {
            let angle = xtoviewangle[x];
            let cos = crate::fixed::finecosine(angle.fine_index()).abs().max(Fixed(1));
            *slot = Fixed::ONE.div(cos);
        }

        let (scalelight, zlight) = build_light_tables(view.extralight);

        ViewFrustum {
            width,
            height,
            centerx,
            centery,
            centerxfrac,
            centeryfrac,
            focallength,
            viewangletox,
            xtoviewangle,
            yslope,
            distscale,
            scalelight,
            zlight,
        }
    }
}

fn build_light_tables(extralight: i32) -> (Vec<[usize; MAXLIGHTSCALE]>, Vec<[usize; MAXLIGHTZ]>) {
    let max_cm = (COLORMAP_COUNT - 1) as i32;
    let mut scalelight = vec![[0usize; MAXLIGHTSCALE]; LIGHTLEVELS];
    let mut zlight = vec![[0usize; MAXLIGHTZ]; LIGHTLEVELS];

    for level in 0..LIGHTLEVELS {
        let startmap = ((LIGHTLEVELS as i32 - 1 - level as i32) * 2 * NUMCOLORMAPS)
            / LIGHTLEVELS as i32
            - extralight * NUMCOLORMAPS / LIGHTLEVELS as i32;

        for j in 0..MAXLIGHTSCALE {
            let level_term = j as i32 - (MAXLIGHTSCALE as i32 / 2);
            let cm = (startmap - level_term / 2).clamp(0, max_cm);
            scalelight[level][j] = cm as usize;
        }
        for j in 0..MAXLIGHTZ {
            let scale = ((MAXLIGHTZ - j) as i32 * NUMCOLORMAPS) / MAXLIGHTZ as i32;
            let cm = (startmap + (NUMCOLORMAPS - scale) / 2).clamp(0, max_cm);
            zlight[level][j] = cm as usize;
        }
    }
    (scalelight, zlight)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn angle_projection_round_trips_within_one_pixel() {
        let view = ViewState {
            x: Fixed::ZERO,
            y: Fixed::ZERO,
            z: Fixed::ZERO,
            angle: Angle::ZERO,
            extralight: 0,
            fixedcolormap: None,
        };
        let vf = ViewFrustum::build(&view, SCREENWIDTH, SCREENHEIGHT);
        for x in 0..=SCREENWIDTH {
            let angle = vf.xtoviewangle[x as usize];
            // mirrors `render::bsp::angle_to_x`'s `angle + ANG90` convention
            let offset = angle.add(Angle(crate::fixed::ANG90));
            let idx = offset.fine_index().min(vf.viewangletox.len() - 1);
            let back = vf.viewangletox[idx];
            assert!((back - x).abs() <= 1, "x={x} back={back}");
        }
    }

    #[test]
    fn light_tables_stay_in_colormap_range() {
        let (scalelight, zlight) = build_light_tables(0);
        for row in &scalelight {
            for &cm in row {
                assert!(cm < COLORMAP_COUNT);
            }
        }
        for row in &zlight {
            for &cm in row {
                assert!(cm < COLORMAP_COUNT);
            }
        }
    }
}
