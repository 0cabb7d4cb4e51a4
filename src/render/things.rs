//! Thing projection, depth-sort, and masked draw (§4.9). Grounded on
//! vanilla Doom's `R_ProjectSprite`/`R_AddSprites`/`R_SortVisSprites`/
//! `R_DrawSprite`/`R_DrawVisSprite` in `r_things.c`.
//!
//! `MapThing` carries only `{x, y, angle, doom_type, flags}` (no
//! `sprite`/`state`/`frame` fields — full mobjinfo/state-machine data
//! isn't part of this renderer's scope). [`THING_SPRITES`] is a small,
//! deliberately reduced `doom_type -> sprite name` table covering the
//! common renderable things, enough to exercise sprite projection end
//! to end without porting the ~140-entry vanilla `mobjinfo` array or
//! any AI/animation logic. A thing's height is taken from its
//! containing sector's floor, since nothing in this crate's input
//! tracks a simulated Z independent of the floor.
//!
//! `ThingFlags` has no MF_SHADOW bit (spectre translucency), so
//! [`ColormapSource::Shadow`](super::context::ColormapSource::Shadow)
//! is never produced by [`project_sprite`] — spectres (doom_type 58)
//! render as solid `SARG` sprites rather than fuzzy ones. The fuzz
//! column drawer itself (`draw_fuzz_column`) is implemented and tested
//! but currently only reachable from its own unit test.

use super::bsp::point_to_angle;
use super::columns::draw_sprite_column;
use super::context::{ColormapSource, DrawContext, Frame, Silhouette, VisSprite};
use super::segs::lightnum;
use crate::error::RenderError;
use crate::fixed::{ANG45, Fixed, finecosine, finesine};
use crate::map::{Level, MapThing, SectorId, SubsectorId};
use crate::texture::{SpriteId, TextureStore};
use crate::view::{MAXLIGHTSCALE, ViewFrustum, ViewState};

const LIGHTSCALESHIFT: u32 = 12;
const MINZ: Fixed = Fixed(4 << 16);

/// `(doom_type, sprite name, full-bright)`. Not a mobjinfo port — see
/// the module doc comment.
const THING_SPRITES: &[(u16, &str, bool)] = &[
    (3004, "POSS", false), // zombieman
    (9, "SPOS", false),    // shotgun guy
    (3001, "TROO", false), // imp
    (3002, "SARG", false), // demon
    (58, "SARG", false),   // spectre (no MF_SHADOW data to drive the fuzz colormap; renders solid)
    (3006, "SKUL", false), // lost soul
    (3005, "HEAD", false), // cacodemon
    (3003, "BOSS", false), // baron of hell
    (2035, "BAR1", false), // explosive barrel
    (2028, "COLU", true),  // floor lamp
];

fn sprite_for_doom_type(doom_type: u16) -> Option<(&'static str, bool)> {
    THING_SPRITES
        .iter()
        .find(|&&(t, _, _)| t == doom_type)
        .map(|&(_, name, bright)| (name, bright))
}

/// §4.9: collects every thing in the subsector's sector into vissprites,
/// once per sector per frame (mirrors vanilla's per-sector `validcount`
/// gate in `R_AddSprites`).
pub fn add_sprites(
    level: &Level,
    frustum: &ViewFrustum,
    view: &ViewState,
    frame: &mut Frame,
    textures: &TextureStore,
    ss: SubsectorId,
) -> Result<(), RenderError> {
    let sector_id: SectorId = level.subsectors[ss as usize].sector;
    let sector = &level.sectors[sector_id as usize];
    if sector.validcount.get() == frame.validcount {
        return Ok(());
    }
    sector.validcount.set(frame.validcount);

    let light_row = lightnum(sector.light_level.get(), view.extralight);
    let z = sector.floor_h.get();

    for &thing_id in &sector.things {
        let thing = &level.things[thing_id as usize];
        project_sprite(frustum, view, frame, textures, thing, z, light_row)?;
    }
    Ok(())
}

fn project_sprite(
    frustum: &ViewFrustum,
    view: &ViewState,
    frame: &mut Frame,
    textures: &TextureStore,
    thing: &MapThing,
    thing_z: Fixed,
    light_row: usize,
) -> Result<(), RenderError> {
    let Some((sprite_name, fullbright)) = sprite_for_doom_type(thing.doom_type) else {
        return Ok(());
    };
    let Some(sprite_id): Option<SpriteId> = textures.sprites.sprite_num_for_name(sprite_name) else {
        return Ok(());
    };

    let viewcos = finecosine(view.angle.fine_index());
    let viewsin = finesine(view.angle.fine_index());

    let tr_x = thing.x - view.x;
    let tr_y = thing.y - view.y;

    // §4.9's two-stage transform: depth first (reject behind the near
    // plane), then lateral offset (reject outside the FOV cone).
    let gxt = tr_x.mul(viewcos);
    let gyt = -tr_y.mul(viewsin);
    let tz = gxt - gyt;
    if tz.0 < MINZ.0 {
        return Ok(());
    }
    let xscale = frustum.centerxfrac.div(tz);

    let gxt2 = -tr_x.mul(viewsin);
    let gyt2 = tr_y.mul(viewcos);
    let tx = -(gyt2 + gxt2);
    if tx.abs().0 > (tz.0 << 2) {
        return Ok(());
    }

    let Some(frame_def) = textures.sprites.frame(sprite_id, 0) else {
        return Ok(());
    };
    let rotation = if frame_def.rotate {
        let ang = point_to_angle(view.x, view.y, thing.x, thing.y);
        let delta = ang.sub(thing.angle).0.wrapping_add((ANG45 / 2).wrapping_mul(9));
        (delta >> 29) as usize & 7
    } else {
        0
    };
    let patch_id = frame_def.lump[rotation];
    if patch_id < 0 {
        return Ok(());
    }
    let flipped = frame_def.flip & (1 << rotation) != 0;
    let patch = textures.sprites.patch(patch_id as u16);

    let left_offset = Fixed::from_int(patch.left_offset as i32);
    let width = Fixed::from_int(patch.width as i32);
    let top_offset = Fixed::from_int(patch.top_offset as i32);

    let mut tx = tx - left_offset;
    let x1 = (frustum.centerxfrac + tx.mul(xscale)).floor().clamp(-1, frustum.width + 1);
    tx += width;
    let x2 = ((frustum.centerxfrac + tx.mul(xscale)).floor() - 1).clamp(-1, frustum.width + 1);

    if x1 > x2 || x2 < 0 || x1 >= frustum.width {
        return Ok(());
    }
    let x1c = x1.clamp(0, frustum.width - 1);
    let x2c = x2.clamp(0, frustum.width - 1);

    let gzt = thing_z + top_offset;
    let texturemid_world = gzt - view.z;

    let iscale = Fixed::ONE.div(xscale);
    let (startfrac, xiscale) = if flipped {
        (width - Fixed(1), -iscale)
    } else {
        (Fixed::ZERO, iscale)
    };

    let colormap = if let Some(fixed) = view.fixedcolormap {
        ColormapSource::Fixed(fixed)
    } else if fullbright {
        ColormapSource::FullBright
    } else {
        let idx = (xscale.0 as u32 >> LIGHTSCALESHIFT).min(MAXLIGHTSCALE as u32 - 1) as usize;
        ColormapSource::Lit(frustum.scalelight[light_row][idx])
    };

    frame.alloc_vissprite(VisSprite {
        x1: x1c,
        x2: x2c,
        scale: xscale,
        xiscale,
        startfrac,
        texturemid: texturemid_world,
        patch: patch_id as u16,
        colormap,
    })
}

/// Sorts vissprite indices by descending scale (nearer objects first).
/// Vanilla builds this via an insertion pass followed by a bubble pass
/// over a linked list; a single stable sort converges to the identical
/// final ordering without the linked-list bookkeeping.
pub fn sorted_vissprite_order(frame: &Frame) -> Vec<u16> {
    let mut order: Vec<u16> = (0..frame.vissprites.len() as u16).collect();
    order.sort_by(|&a, &b| {
        frame.vissprites[b as usize]
            .scale
            .0
            .cmp(&frame.vissprites[a as usize].scale.0)
    });
    order
}

/// §4.9: draws every collected vissprite, each clipped against the
/// wall silhouettes recorded in `frame.drawsegs`.
pub fn draw_masked(frame: &mut Frame, textures: &TextureStore) {
    let order = sorted_vissprite_order(frame);
    for idx in order {
        draw_sprite(frame, textures, idx);
    }
}

fn draw_sprite(frame: &mut Frame, textures: &TextureStore, idx: u16) {
    let vis = frame.vissprites[idx as usize];
    let width = (vis.x2 - vis.x1 + 1) as usize;
    let mut clipbot = vec![-2i32; width];
    let mut cliptop = vec![-2i32; width];

    // walk drawsegs back to front, clipping the sprite's column range
    // against whatever wall silhouette is in front of it (§4.9's
    // R_DrawSprite algorithm; simplified to compare purely by scale
    // rather than vanilla's exact point-on-seg-side test, and to apply
    // a drawseg's full recorded silhouette rather than masking it down
    // by the sprite's own z-extent first).
    for ds in frame.drawsegs.iter().rev() {
        if ds.x1 > vis.x2 || ds.x2 < vis.x1 {
            continue;
        }
        if ds.silhouette == Silhouette::NONE {
            continue;
        }
        let far_scale = ds.scale1.max(ds.scale2);
        if far_scale < vis.scale {
            continue; // this wall is behind the sprite, nothing to clip
        }
        let r1 = ds.x1.max(vis.x1);
        let r2 = ds.x2.min(vis.x2);
        for x in r1..=r2 {
            let col_idx = (x - vis.x1) as usize;
            let opening_idx = (x - ds.x1) as usize;
            if clipbot[col_idx] == -2 && ds.silhouette.contains(Silhouette::BOTTOM) {
                if let Some(base) = ds.sprbottomclip_base {
                    clipbot[col_idx] = frame.openings[base + opening_idx];
                }
            }
            if cliptop[col_idx] == -2 && ds.silhouette.contains(Silhouette::TOP) {
                if let Some(base) = ds.sprtopclip_base {
                    cliptop[col_idx] = frame.openings[base + opening_idx];
                }
            }
        }
    }
    for i in 0..width {
        if clipbot[i] == -2 {
            clipbot[i] = frame.height - 1;
        }
        if cliptop[i] == -2 {
            cliptop[i] = -1;
        }
    }

    draw_vis_sprite(frame, textures, &vis, &clipbot, &cliptop);
}

fn draw_vis_sprite(frame: &mut Frame, textures: &TextureStore, vis: &VisSprite, clipbot: &[i32], cliptop: &[i32]) {
    let patch = textures.sprites.patch(vis.patch);
    let colormap = match vis.colormap {
        ColormapSource::Lit(i) | ColormapSource::Fixed(i) => textures.colormap.table(i),
        ColormapSource::FullBright => textures.colormap.table(0),
        ColormapSource::Shadow => textures.colormap.table(crate::texture::FUZZ_COLORMAP),
    };

    let iscale = Fixed(vis.xiscale.0.abs());
    let centeryfrac = Fixed::from_int(frame.height / 2);
    // screen row where the patch's own row 0 lands, vanilla's
    // `sprtopscreen = centeryfrac - FixedMul(texturemid, scale)`,
    // converted to this crate's "texturemid anchored at screen row 0"
    // column-drawer convention.
    let y0 = (centeryfrac - vis.texturemid.mul(vis.scale)).floor();
    let texturemid = Fixed::from_int(-y0).mul(iscale);

    let mut frac = vis.startfrac;
    for x in vis.x1..=vis.x2 {
        let idx = (x - vis.x1) as usize;
        let col = frac.floor().clamp(0, patch.width as i32 - 1) as usize;

        let yl = (cliptop[idx] + 1).max(0);
        let yh = clipbot[idx].min(frame.height - 1);
        if yl <= yh {
            if let Some(source) = patch.column(col) {
                let dc = DrawContext {
                    x,
                    yl,
                    yh,
                    iscale,
                    texturemid,
                    source,
                    colormap,
                };
                draw_sprite_column(&mut frame.framebuffer, frame.width, &dc);
            }
        }
        frac += vis.xiscale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_doom_type_has_no_sprite_mapping() {
        assert!(sprite_for_doom_type(99999).is_none());
    }

    #[test]
    fn known_doom_type_resolves_to_its_sprite_name() {
        assert_eq!(sprite_for_doom_type(3004), Some(("POSS", false)));
    }

    #[test]
    fn sort_order_is_descending_by_scale() {
        let mut frame = Frame::new(320, 200);
        let mk = |scale: i32| VisSprite {
            x1: 0,
            x2: 0,
            scale: Fixed(scale),
            xiscale: Fixed::ONE,
            startfrac: Fixed::ZERO,
            texturemid: Fixed::ZERO,
            patch: 0,
            colormap: ColormapSource::Lit(0),
        };
        frame.alloc_vissprite(mk(100)).unwrap();
        frame.alloc_vissprite(mk(300)).unwrap();
        frame.alloc_vissprite(mk(200)).unwrap();
        let order = sorted_vissprite_order(&frame);
        let scales: Vec<i32> = order.iter().map(|&i| frame.vissprites[i as usize].scale.0).collect();
        assert_eq!(scales, vec![300, 200, 100]);
    }
}
