//! Sprite lump parsing (`S_START`..`S_END`) and the per-rotation
//! flip-bit packing. Grounded on vanilla Doom's
//! `R_InstallSpriteLump`/`R_InitSpriteDefs` naming convention: a lump
//! name is a 4-character sprite name, a frame letter, a rotation digit
//! (`0` = used for all eight angles, `1`-`8` = one specific angle), and
//! an optional second frame+rotation suffix marking a horizontally
//! mirrored reuse of the same patch.

use super::patch::{Patch, decode_patch};
use super::TRANSPARENT;
use crate::flash::{FlashReader, FlashTransport};
use crate::wad::LumpStore;
use std::collections::HashMap;

pub type SpriteId = u16;
pub type PatchId = u16;

/// Vanilla caps this at 29 (`'A'..='Z'` plus three extras); frame
/// letters at or past this are a malformed lump name.
pub const MAX_SPRITEFRAMES: usize = 29;

#[derive(Clone, Copy)]
pub struct SpriteFrame {
    pub rotate: bool,
    /// `-1` where no patch has been installed for that rotation.
    pub lump: [i16; 8],
    /// bit `r` set means rotation `r`'s patch should be drawn mirrored.
    pub flip: u8,
}

impl SpriteFrame {
    fn blank() -> SpriteFrame {
        SpriteFrame {
            rotate: false,
            lump: [-1; 8],
            flip: 0,
        }
    }
}

pub struct SpriteDef {
    pub frames: Vec<SpriteFrame>,
}

/// A sprite patch decoded into a padded column-major buffer, the same
/// shape as a composited wall [`super::Texture`], so the column
/// drawers only need bounds instead of post-chain offsets.
pub struct SpritePatch {
    pub width: u16,
    pub height: u16,
    pub left_offset: i16,
    pub top_offset: i16,
    pixels: Vec<u8>,
}

impl SpritePatch {
    pub fn column(&self, col: usize) -> Option<&[u8]> {
        if col >= self.width as usize {
            return None;
        }
        let h = self.height as usize;
        Some(&self.pixels[col * h..col * h + h])
    }
}

pub struct SpriteStore {
    by_name: HashMap<String, SpriteId>,
    sprites: Vec<SpriteDef>,
    patches: Vec<SpritePatch>,
}

impl SpriteStore {
    pub fn sprite_num_for_name(&self, name: &str) -> Option<SpriteId> {
        self.by_name.get(&name.to_ascii_uppercase()).copied()
    }

    pub fn frame(&self, sprite: SpriteId, frame: usize) -> Option<&SpriteFrame> {
        self.sprites.get(sprite as usize)?.frames.get(frame)
    }

    pub fn patch(&self, id: PatchId) -> &SpritePatch {
        &self.patches[id as usize]
    }
}

fn decode_to_padded(patch: &Patch) -> SpritePatch {
    let w = patch.width as usize;
    let h = patch.height as usize;
    let mut pixels = vec![TRANSPARENT; w * h];
    for (col, posts) in patch.columns.iter().enumerate() {
        for post in posts {
            let y0 = post.top_offset as usize;
            for (i, &px) in post.pixels.iter().enumerate() {
                let y = y0 + i;
                if y < h {
                    pixels[col * h + y] = px;
                }
            }
        }
    }
    SpritePatch {
        width: patch.width,
        height: patch.height,
        left_offset: patch.left_offset,
        top_offset: patch.top_offset,
        pixels,
    }
}

fn install_frame(def: &mut SpriteDef, frame: usize, rotation: u8, patch_id: i16, flipped: bool) {
    while def.frames.len() <= frame {
        def.frames.push(SpriteFrame::blank());
    }
    let f = &mut def.frames[frame];
    if rotation == 0 {
        if f.lump[0] == -1 {
            f.lump = [patch_id; 8];
            f.rotate = false;
        }
    } else if (1..=8).contains(&rotation) {
        let r = (rotation - 1) as usize;
        f.rotate = true;
        f.lump[r] = patch_id;
        if flipped {
            f.flip |= 1 << r;
        }
    }
}

pub fn load_sprites<T: FlashTransport>(store: &LumpStore, reader: &mut FlashReader<T>) -> SpriteStore {
    let Some(start) = store.find("S_START") else {
        return SpriteStore {
            by_name: HashMap::new(),
            sprites: Vec::new(),
            patches: Vec::new(),
        };
    };
    let end = store.find("S_END").unwrap_or(store.num_lumps());

    let mut by_name: HashMap<String, SpriteId> = HashMap::new();
    let mut sprites: Vec<SpriteDef> = Vec::new();
    let mut patches: Vec<SpritePatch> = Vec::new();
    let mut patch_cache: HashMap<usize, PatchId> = HashMap::new();

    for i in (start + 1)..end {
        if store.lump_size(i) == 0 {
            continue; // S1_START/S1_END-style sub-markers
        }
        let name = store.lump_name(i).to_ascii_uppercase();
        let bytes = name.as_bytes();
        if bytes.len() < 6 || !bytes[5].is_ascii_digit() {
            log::warn!("sprite lump {name:?} doesn't match the SSSSFR[FR] pattern");
            continue;
        }
        let sprname = &name[0..4];
        let frame1 = bytes[4].wrapping_sub(b'A') as usize;
        let rot1 = bytes[5] - b'0';
        if frame1 >= MAX_SPRITEFRAMES {
            log::warn!("sprite lump {name:?} has an out-of-range frame letter");
            continue;
        }

        let sprite_idx = *by_name.entry(sprname.to_string()).or_insert_with(|| {
            sprites.push(SpriteDef { frames: Vec::new() });
            (sprites.len() - 1) as SpriteId
        });
        let patch_id = *patch_cache.entry(i).or_insert_with(|| {
            let raw = decode_patch::<T>(store, reader, i);
            patches.push(decode_to_padded(&raw));
            (patches.len() - 1) as PatchId
        });
        install_frame(&mut sprites[sprite_idx as usize], frame1, rot1 as i16 as u8, patch_id as i16, false);

        if bytes.len() >= 8 && bytes[6].is_ascii_alphabetic() && bytes[7].is_ascii_digit() {
            let frame2 = bytes[6].wrapping_sub(b'A') as usize;
            let rot2 = bytes[7] - b'0';
            if frame2 < MAX_SPRITEFRAMES {
                install_frame(&mut sprites[sprite_idx as usize], frame2, rot2, patch_id as i16, true);
            }
        }
    }

    SpriteStore {
        by_name,
        sprites,
        patches,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_store() -> SpriteStore {
        SpriteStore {
            by_name: HashMap::new(),
            sprites: vec![SpriteDef { frames: Vec::new() }],
            patches: Vec::new(),
        }
    }

    #[test]
    fn rotation_zero_fills_all_eight_slots() {
        let mut store = blank_store();
        install_frame(&mut store.sprites[0], 0, 0, 7, false);
        let f = &store.sprites[0].frames[0];
        assert!(!f.rotate);
        assert_eq!(f.lump, [7; 8]);
    }

    #[test]
    fn flipped_rotation_sets_its_flip_bit_only() {
        let mut store = blank_store();
        install_frame(&mut store.sprites[0], 0, 3, 1, false);
        install_frame(&mut store.sprites[0], 0, 6, 1, true);
        let f = &store.sprites[0].frames[0];
        assert!(f.rotate);
        assert_eq!(f.lump[2], 1);
        assert_eq!(f.lump[5], 1);
        assert_eq!(f.flip, 1 << 5);
    }
}
