//! Per-frame scratch pools and the `DrawContext`/`SpanContext` values
//! that replace vanilla Doom's `dc_*`/`ds_*` globals (§9). Every pool
//! here is fixed-capacity and reset at `begin_frame`; overflow is
//! reported through [`crate::error::RenderError`] rather than growing,
//! per §5's memory budget table.

use crate::error::RenderError;
use crate::fixed::Fixed;
use crate::texture::TextureId;
use bitflags::bitflags;

pub const MAX_DRAWSEGS: usize = 128;
pub const MAX_VISPLANES: usize = 48;
pub const MAX_VISSPRITES: usize = 128;
pub const MAX_OPENINGS: usize = (crate::view::SCREENWIDTH as usize) * 16;
pub const MAX_SOLIDSEGS: usize = 32;

bitflags! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct Silhouette: u8 {
        const NONE   = 0x00;
        const BOTTOM = 0x01;
        const TOP    = 0x02;
        const SOLID  = 0x03;
    }
}

#[derive(Clone, Copy)]
pub struct DrawSeg {
    pub seg_ref: u16,
    pub x1: i32,
    pub x2: i32,
    pub scale1: Fixed,
    pub scale2: Fixed,
    pub scale_step: Fixed,
    pub silhouette: Silhouette,
    pub bsilheight: Fixed,
    pub tsilheight: Fixed,
    /// offsets into the shared `openings` pool; `sprtopclip(x) =
    /// openings[sprtopclip_base + (x - x1)]`.
    pub sprtopclip_base: Option<usize>,
    pub sprbottomclip_base: Option<usize>,
    pub maskedtexturecol_base: Option<usize>,
    pub mid_tex: Option<TextureId>,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaneKey {
    pub height: i32,
    pub picnum: i32,
    pub lightlevel: i16,
}

pub struct VisPlane {
    pub key: PlaneKey,
    pub minx: i32,
    pub maxx: i32,
    /// `top[x] == i32::MAX` marks a column not yet covered (§3's
    /// `top[x]==0xFF` sentinel, widened since our columns are `i32`).
    pub top: Vec<i32>,
    pub bottom: Vec<i32>,
}

pub const PLANE_UNSET: i32 = i32::MAX;

impl VisPlane {
    fn new(key: PlaneKey, width: usize) -> VisPlane {
        VisPlane {
            key,
            minx: width as i32,
            maxx: -1,
            top: vec![PLANE_UNSET; width],
            bottom: vec![-1; width],
        }
    }
}

#[derive(Clone, Copy)]
pub struct VisSprite {
    pub x1: i32,
    pub x2: i32,
    pub scale: Fixed,
    pub xiscale: Fixed,
    pub startfrac: Fixed,
    pub texturemid: Fixed,
    pub patch: TextureId,
    pub colormap: ColormapSource,
}

/// §9's sum type for a vissprite's colour source.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ColormapSource {
    Lit(usize),
    FullBright,
    Fixed(usize),
    Shadow,
}

pub struct DrawContext<'a> {
    pub x: i32,
    pub yl: i32,
    pub yh: i32,
    pub iscale: Fixed,
    pub texturemid: Fixed,
    pub source: &'a [u8],
    pub colormap: &'a [u8; 256],
}

pub struct SpanContext<'a> {
    pub y: i32,
    pub x1: i32,
    pub x2: i32,
    pub source: &'a [u8; 4096],
    pub colormap: &'a [u8; 256],
    pub xfrac: u32,
    pub yfrac: u32,
    pub xstep: u32,
    pub ystep: u32,
}

pub struct Frame {
    pub width: i32,
    pub height: i32,
    pub framebuffer: Vec<u8>,

    pub solidsegs: Vec<(i32, i32)>,
    pub drawsegs: Vec<DrawSeg>,
    pub visplanes: Vec<VisPlane>,
    pub vissprites: Vec<VisSprite>,
    pub openings: Vec<i32>,

    pub ceilingclip: Vec<i32>,
    pub floorclip: Vec<i32>,

    /// `spanstart[y]` — the column a not-yet-closed span on row `y`
    /// opened at, §4.8's "spanstart[] keyed by row" state.
    pub spanstart: Vec<i32>,

    /// Bumped once per frame; a sector's own `validcount` cell matching
    /// this value means its sprites were already collected this frame
    /// (§4.9's per-sector gate, mirrors the linedef/sector `validcount`
    /// bookkeeping vanilla uses all over the renderer).
    pub validcount: u32,
}

impl Frame {
    pub fn new(width: i32, height: i32) -> Frame {
        let mut frame = Frame {
            width,
            height,
            framebuffer: vec![0; (width * height) as usize],
            solidsegs: Vec::with_capacity(MAX_SOLIDSEGS),
            drawsegs: Vec::with_capacity(MAX_DRAWSEGS),
            visplanes: Vec::with_capacity(MAX_VISPLANES),
            vissprites: Vec::with_capacity(MAX_VISSPRITES),
            openings: Vec::with_capacity(MAX_OPENINGS),
            ceilingclip: vec![-1; width as usize],
            floorclip: vec![height - 1; width as usize],
            spanstart: vec![0; height as usize],
            validcount: 0,
        };
        frame.begin_frame();
        frame
    }

    /// Resets every per-frame pool. After this call, every column `x`
    /// satisfies `floorclip[x] = height-1 ∧ ceilingclip[x] = -1` (§3's
    /// `R_ClearPlanes` invariant, `viewheight-1` instead of
    /// `viewheight` since our clip arrays are inclusive-last-row).
    pub fn begin_frame(&mut self) {
        self.validcount = self.validcount.wrapping_add(1);
        self.solidsegs.clear();
        self.solidsegs.push((-1, -1));
        self.solidsegs.push((self.width, self.width));
        self.drawsegs.clear();
        self.visplanes.clear();
        self.vissprites.clear();
        self.openings.clear();
        for c in self.ceilingclip.iter_mut() {
            *c = -1;
        }
        for c in self.floorclip.iter_mut() {
            *c = self.height - 1;
        }
    }

    pub fn alloc_drawseg(&mut self, seg: DrawSeg) -> Result<u16, RenderError> {
        if self.drawsegs.len() >= MAX_DRAWSEGS {
            return Err(RenderError::DrawSegsFull(MAX_DRAWSEGS));
        }
        self.drawsegs.push(seg);
        Ok((self.drawsegs.len() - 1) as u16)
    }

    pub fn push_opening(&mut self, v: i32) -> Result<usize, RenderError> {
        if self.openings.len() >= MAX_OPENINGS {
            return Err(RenderError::OpeningsFull(MAX_OPENINGS));
        }
        self.openings.push(v);
        Ok(self.openings.len() - 1)
    }

    pub fn alloc_vissprite(&mut self, spr: VisSprite) -> Result<(), RenderError> {
        if self.vissprites.len() >= MAX_VISSPRITES {
            return Err(RenderError::VisSpritesFull(MAX_VISSPRITES));
        }
        self.vissprites.push(spr);
        Ok(())
    }

    /// Finds an existing visplane matching `key` whose covered columns
    /// don't overlap `[minx,maxx]`, or allocates a new one — §4.7 step 6
    /// / §8's "visplane fork" test.
    pub fn find_plane(&mut self, key: PlaneKey, minx: i32, maxx: i32) -> Result<u16, RenderError> {
        for (i, plane) in self.visplanes.iter().enumerate() {
            if plane.key != key {
                continue;
            }
            let overlap_lo = minx.max(plane.minx).max(0);
            let overlap_hi = maxx.min(plane.maxx).min(self.width - 1);
            let mut clean = true;
            let mut x = overlap_lo;
            while x <= overlap_hi {
                if plane.top[x as usize] != PLANE_UNSET {
                    clean = false;
                    break;
                }
                x += 1;
            }
            if clean {
                return Ok(i as u16);
            }
        }
        if self.visplanes.len() >= MAX_VISPLANES {
            return Err(RenderError::VisplanesFull(MAX_VISPLANES));
        }
        self.visplanes.push(VisPlane::new(key, self.width as usize));
        Ok((self.visplanes.len() - 1) as u16)
    }

    pub fn plane_mut(&mut self, id: u16) -> &mut VisPlane {
        &mut self.visplanes[id as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_frame_establishes_clear_planes_invariant() {
        let mut frame = Frame::new(320, 200);
        frame.ceilingclip[10] = 50;
        frame.floorclip[10] = 20;
        frame.begin_frame();
        assert!(frame.ceilingclip.iter().all(|&c| c == -1));
        assert!(frame.floorclip.iter().all(|&c| c == 199));
    }

    #[test]
    fn visplane_fork_on_overlapping_coverage() {
        let mut frame = Frame::new(320, 200);
        let key = PlaneKey {
            height: 0,
            picnum: 1,
            lightlevel: 0,
        };
        let p1 = frame.find_plane(key, 0, 10).unwrap();
        frame.plane_mut(p1).top[5] = 3; // mark column 5 as covered
        let p2 = frame.find_plane(key, 0, 10).unwrap();
        assert_ne!(p1, p2, "overlapping coverage must fork a new visplane");
    }

    #[test]
    fn visplane_merges_when_disjoint() {
        let mut frame = Frame::new(320, 200);
        let key = PlaneKey {
            height: 0,
            picnum: 1,
            lightlevel: 0,
        };
        let p1 = frame.find_plane(key, 0, 10).unwrap();
        frame.plane_mut(p1).top[5] = 3;
        let p2 = frame.find_plane(key, 20, 30).unwrap();
        assert_eq!(p1, p2, "disjoint coverage should reuse the same visplane");
    }
}
