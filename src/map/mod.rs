//! Parses the twelve standard map lumps into an in-memory arena:
//! parallel `Vec`s of records cross-referenced by `u16` index rather
//! than pointers (§9 design note). Grounded on the teacher's
//! `wad/level.rs` for the exact on-disk record sizes/fields and its
//! `once_cell::Lazy<Regex>` level-marker detection, and on
//! `world/bsp.rs` for the subsector-bit child-link convention.

mod raw;

pub use raw::NEED_LUMPS;

use crate::error::MapError;
use crate::fixed::{Angle, Fixed};
use crate::flash::{FlashReader, FlashTransport};
use crate::wad::LumpStore;
use bitflags::bitflags;
use once_cell::sync::Lazy;
use regex::Regex;

pub type VertexId = u16;
pub type LineId = u16;
pub type SideId = u16;
pub type SectorId = u16;
pub type SubsectorId = u16;
pub type SegId = u16;
pub type NodeId = u16;
pub type ThingId = u16;

pub const NO_SIDE: u16 = 0xFFFF;
pub const SUBSECTOR_BIT: u16 = 0x8000;
pub const CHILD_MASK: u16 = 0x7FFF;

bitflags! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct LinedefFlags: u16 {
        const BLOCKING       = 0x0001;
        const BLOCK_MONSTERS = 0x0002;
        const TWO_SIDED      = 0x0004;
        const DONT_PEG_TOP   = 0x0008;
        const DONT_PEG_BOTTOM= 0x0010;
        const SECRET         = 0x0020;
        const SOUND_BLOCK    = 0x0040;
        const DONT_DRAW      = 0x0080;
        const MAPPED         = 0x0100;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct ThingFlags: u16 {
        const EASY      = 0x0001;
        const NORMAL    = 0x0002;
        const HARD      = 0x0004;
        const AMBUSH    = 0x0008;
        const NOT_SINGLE= 0x0010;
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Vertex {
    pub x: Fixed,
    pub y: Fixed,
}

#[derive(Clone, Debug)]
pub struct Linedef {
    pub v1: VertexId,
    pub v2: VertexId,
    pub flags: LinedefFlags,
    pub special: u16,
    pub tag: u16,
    pub side0: SideId,
    pub side1: SideId, // NO_SIDE if one-sided
    /// Frame-local cached flag byte (§9: "the linedef flags byte is
    /// cached on the RAM Line shadow so a column loop doesn't read it
    /// repeatedly"); `validcount` marks whether this line has been
    /// processed this frame (used by the BSP walker for mapped-line
    /// bookkeeping).
    pub validcount: std::cell::Cell<u32>,
}

impl Linedef {
    pub fn two_sided(&self) -> bool {
        self.side1 != NO_SIDE
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Sidedef {
    pub tex_offset_x: Fixed,
    pub tex_offset_y: Fixed,
    pub top_tex: i16,
    pub bottom_tex: i16,
    pub mid_tex: i16,
    pub sector: SectorId,
    pub(crate) top_tex_name: [u8; 8],
    pub(crate) bottom_tex_name: [u8; 8],
    pub(crate) mid_tex_name: [u8; 8],
}

#[derive(Clone, Debug)]
pub struct Sector {
    pub floor_h: std::cell::Cell<Fixed>,
    pub ceil_h: std::cell::Cell<Fixed>,
    pub floor_flat: u16,
    pub ceil_flat: u16,
    pub light_level: std::cell::Cell<i16>,
    pub special: u16,
    pub tag: u16,
    pub lines: Vec<LineId>,
    pub things: Vec<ThingId>,
    pub validcount: std::cell::Cell<u32>,
    pub(crate) floor_flat_name: [u8; 8],
    pub(crate) ceil_flat_name: [u8; 8],
}

#[derive(Clone, Copy, Debug)]
pub struct Subsector {
    pub sector: SectorId,
    pub first_seg: SegId,
    pub seg_count: u16,
}

#[derive(Clone, Copy, Debug)]
pub struct Seg {
    pub v1: VertexId,
    pub v2: VertexId,
    pub angle: Angle,
    pub offset: Fixed,
    pub linedef: LineId,
    pub side: u8,
}

#[derive(Clone, Copy, Debug)]
pub struct Node {
    pub x: Fixed,
    pub y: Fixed,
    pub dx: Fixed,
    pub dy: Fixed,
    /// `bbox[side][BOXTOP/BOTTOM/LEFT/RIGHT]`
    pub bbox: [[Fixed; 4]; 2],
    pub children: [u16; 2],
}

pub const BOXTOP: usize = 0;
pub const BOXBOTTOM: usize = 1;
pub const BOXLEFT: usize = 2;
pub const BOXRIGHT: usize = 3;

impl Node {
    /// 0 = front of the partition line, 1 = back.
    pub fn point_side(&self, x: Fixed, y: Fixed) -> i32 {
        let dx = x - self.x;
        let dy = y - self.y;
        let left = self.dy.mul(dx);
        let right = dy.mul(self.dx);
        if right < left {
            0
        } else {
            1
        }
    }

    pub fn child_is_subsector(child: u16) -> bool {
        child & SUBSECTOR_BIT != 0
    }

    pub fn child_index(child: u16) -> u16 {
        child & CHILD_MASK
    }
}

#[derive(Clone, Copy, Debug)]
pub struct MapThing {
    pub x: Fixed,
    pub y: Fixed,
    pub angle: Angle,
    pub doom_type: u16,
    pub flags: ThingFlags,
}

pub struct Level {
    pub vertexes: Vec<Vertex>,
    pub linedefs: Vec<Linedef>,
    pub sidedefs: Vec<Sidedef>,
    pub sectors: Vec<Sector>,
    pub subsectors: Vec<Subsector>,
    pub segs: Vec<Seg>,
    pub nodes: Vec<Node>,
    pub things: Vec<MapThing>,
}

impl Level {
    pub fn bsp_root(&self) -> u16 {
        (self.nodes.len() - 1) as u16
    }

    pub fn locate_subsector(&self, x: Fixed, y: Fixed) -> SubsectorId {
        if self.nodes.is_empty() {
            return 0;
        }
        let mut node_idx = self.bsp_root();
        loop {
            let node = &self.nodes[node_idx as usize];
            let side = node.point_side(x, y);
            let child = node.children[side as usize];
            if Node::child_is_subsector(child) {
                return Node::child_index(child);
            }
            node_idx = Node::child_index(child);
        }
    }

    pub fn sector_of(&self, ss: SubsectorId) -> &Sector {
        &self.sectors[self.subsectors[ss as usize].sector as usize]
    }

    pub fn segs_of(&self, ss: SubsectorId) -> &[Seg] {
        let sub = &self.subsectors[ss as usize];
        let first = sub.first_seg as usize;
        &self.segs[first..first + sub.seg_count as usize]
    }

    pub fn front_sector(&self, seg: &Seg) -> &Sector {
        let line = &self.linedefs[seg.linedef as usize];
        let side_id = if seg.side == 0 { line.side0 } else { line.side1 };
        &self.sectors[self.sidedefs[side_id as usize].sector as usize]
    }

    pub fn back_sector(&self, seg: &Seg) -> Option<&Sector> {
        let line = &self.linedefs[seg.linedef as usize];
        let back_side = if seg.side == 0 { line.side1 } else { line.side0 };
        if back_side == NO_SIDE {
            None
        } else {
            Some(&self.sectors[self.sidedefs[back_side as usize].sector as usize])
        }
    }

    pub fn front_sidedef(&self, seg: &Seg) -> &Sidedef {
        let line = &self.linedefs[seg.linedef as usize];
        let side_id = if seg.side == 0 { line.side0 } else { line.side1 };
        &self.sidedefs[side_id as usize]
    }

    /// Resolves every sidedef texture name and sector flat name against
    /// `textures`, filling in the numeric IDs the raw parse left as
    /// placeholders. `-1`/flat `0` mean "no texture"/"unresolved",
    /// matching vanilla's `"-"` convention for sidedefs; unknown flat
    /// names fall back to flat 0 rather than failing the whole level.
    pub fn resolve_textures(&mut self, textures: &crate::texture::TextureStore) {
        for side in &mut self.sidedefs {
            side.top_tex = resolve_tex(textures, &side.top_tex_name);
            side.bottom_tex = resolve_tex(textures, &side.bottom_tex_name);
            side.mid_tex = resolve_tex(textures, &side.mid_tex_name);
        }
        for sector in &mut self.sectors {
            sector.floor_flat = resolve_flat(textures, &sector.floor_flat_name);
            sector.ceil_flat = resolve_flat(textures, &sector.ceil_flat_name);
        }
    }
}

fn resolve_tex(textures: &crate::texture::TextureStore, raw: &[u8; 8]) -> i16 {
    let name = crate::wad::lump_name(raw);
    if name == "-" || name.is_empty() {
        return -1;
    }
    match textures.texture_num_for_name(name) {
        Some(id) => id as i16,
        None => {
            log::warn!("sidedef references unknown texture {name:?}");
            -1
        }
    }
}

fn resolve_flat(textures: &crate::texture::TextureStore, raw: &[u8; 8]) -> u16 {
    let name = crate::wad::lump_name(raw);
    match textures.flat_num_for_name(name) {
        Some(id) => id,
        None => {
            log::warn!("sector references unknown flat {name:?}");
            0
        }
    }
}

/// Matches `MAP01`..`MAP39` or `E1M1`..`E4M9`, same pattern the teacher
/// uses to find level markers in the directory.
pub static LEVEL_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(E[1-4]M[1-9]|MAP[0-3][0-9])$").unwrap());

pub fn level_indices(store: &LumpStore) -> Vec<usize> {
    (0..store.num_lumps())
        .filter(|&i| store.lump_size(i) == 0 && LEVEL_MARKER.is_match(store.lump_name(i)))
        .collect()
}

/// Parses one level's worth of map lumps starting at the marker lump.
pub fn load_level<T: FlashTransport>(
    store: &LumpStore,
    reader: &mut FlashReader<T>,
    marker_idx: usize,
) -> Result<Level, MapError> {
    raw::load_level(store, reader, marker_idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_marker_regex_matches_vanilla_names() {
        assert!(LEVEL_MARKER.is_match("E1M1"));
        assert!(LEVEL_MARKER.is_match("MAP01"));
        assert!(!LEVEL_MARKER.is_match("MAP40"));
        assert!(!LEVEL_MARKER.is_match("THINGS"));
    }

    #[test]
    fn node_point_side_matches_cross_product_sign() {
        let node = Node {
            x: Fixed::from_int(0),
            y: Fixed::from_int(0),
            dx: Fixed::from_int(10),
            dy: Fixed::from_int(0),
            bbox: [[Fixed::ZERO; 4]; 2],
            children: [0, 0],
        };
        // a point above a horizontal partition line is on side 0 (front)
        assert_eq!(node.point_side(Fixed::from_int(5), Fixed::from_int(5)), 1);
        assert_eq!(node.point_side(Fixed::from_int(5), Fixed::from_int(-5)), 0);
    }
}
