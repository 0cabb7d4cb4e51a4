//! Multi-patch wall texture composition (§4.3). Grounded on the
//! teacher's `build_wall_texture`/`compose_texture`/`blit_patch`, with
//! the transparent marker corrected from the teacher's `0` (32-bit ARGB
//! scheme) to the spec's palette index `251`.

pub use super::patch::Patch;
use super::patch::decode_patch;
use super::{TRANSPARENT, TextureId, read_u32_at};
use crate::error::TextureError;
use crate::flash::{FlashReader, FlashTransport};
use crate::wad::{LumpStore, lump_name};
use std::collections::HashMap;

/// A composited wall texture: column-major byte array, column `c`
/// occupying `pixels[c*height .. c*height+height]` (§3).
pub struct Texture {
    pub width: u16,
    pub height: u16,
    pixels: Vec<u8>,
}

impl Texture {
    pub fn column(&self, col: usize) -> Option<&[u8]> {
        if col >= self.width as usize {
            return None;
        }
        let h = self.height as usize;
        Some(&self.pixels[col * h..col * h + h])
    }

    fn column_mut(&mut self, col: usize) -> &mut [u8] {
        let h = self.height as usize;
        &mut self.pixels[col * h..col * h + h]
    }
}

struct RawPatchPlacement {
    ox: i16,
    oy: i16,
    patch_index: i16,
}

struct RawTextureDef {
    name: String,
    width: i16,
    height: i16,
    patches: Vec<RawPatchPlacement>,
}

fn parse_texture_lump_defs(bytes: &[u8]) -> Vec<RawTextureDef> {
    let count = read_u32_at(bytes, 0) as usize;
    let mut defs = Vec::with_capacity(count);
    for i in 0..count {
        let offset = read_u32_at(bytes, 4 + i * 4) as usize;
        let mut name = [0u8; 8];
        name.copy_from_slice(&bytes[offset..offset + 8]);
        let masked_off = offset + 8;
        let width = i16::from_le_bytes([bytes[masked_off + 4], bytes[masked_off + 5]]);
        let height = i16::from_le_bytes([bytes[masked_off + 6], bytes[masked_off + 7]]);
        let patch_count =
            i16::from_le_bytes([bytes[masked_off + 12], bytes[masked_off + 13]]);
        let mut patches = Vec::with_capacity(patch_count.max(0) as usize);
        let patches_base = masked_off + 14;
        for p in 0..patch_count as usize {
            let pb = patches_base + p * 10;
            let ox = i16::from_le_bytes([bytes[pb], bytes[pb + 1]]);
            let oy = i16::from_le_bytes([bytes[pb + 2], bytes[pb + 3]]);
            let patch_index = i16::from_le_bytes([bytes[pb + 4], bytes[pb + 5]]);
            patches.push(RawPatchPlacement {
                ox,
                oy,
                patch_index,
            });
        }
        defs.push(RawTextureDef {
            name: lump_name(&name).to_ascii_uppercase(),
            width,
            height,
            patches,
        });
    }
    defs
}

pub fn load_texture_lump<T: FlashTransport>(
    store: &LumpStore,
    reader: &mut FlashReader<T>,
    tex_lump_idx: usize,
    patch_names: &[String],
    textures: &mut Vec<Texture>,
    by_name: &mut HashMap<String, TextureId>,
) -> Result<(), TextureError> {
    let bytes = store.lump_data(tex_lump_idx).to_vec();
    let defs = parse_texture_lump_defs(&bytes);

    // Cache decoded patches by patch-lump index so a patch reused across
    // many textures (very common — border/trim patches) is only ever
    // read off flash once.
    let mut patch_cache: HashMap<usize, Patch> = HashMap::new();

    for def in defs {
        let mut tex = Texture {
            width: def.width.max(0) as u16,
            height: def.height.max(0) as u16,
            pixels: vec![TRANSPARENT; def.width.max(0) as usize * def.height.max(0) as usize],
        };

        for placement in &def.patches {
            let Some(pname) = patch_names.get(placement.patch_index.max(0) as usize) else {
                return Err(TextureError::BadPatchReference {
                    texture: def.name.clone(),
                    patch: placement.patch_index,
                });
            };
            let Some(lump_idx) = store.find(pname) else {
                continue; // optional patch not present in this WAD set
            };
            if !patch_cache.contains_key(&lump_idx) {
                let patch = decode_patch::<T>(store, reader, lump_idx);
                patch_cache.insert(lump_idx, patch);
            }
            let patch = &patch_cache[&lump_idx];
            blit_patch(&mut tex, patch, placement.ox, placement.oy);
        }

        by_name.insert(def.name.clone(), textures.len() as TextureId);
        textures.push(tex);
    }
    Ok(())
}

/// Copies a patch's post chains into the composite at `(ox, oy)`,
/// clamped to the destination's bounds. Later placements overwrite
/// earlier ones wherever their post chains actually cover a pixel;
/// columns untouched by any post remain `TRANSPARENT`.
fn blit_patch(tex: &mut Texture, patch: &Patch, ox: i16, oy: i16) {
    let dst_w = tex.width as i32;
    let dst_h = tex.height as i32;

    let x_start = ox.max(0) as i32;
    let x_end = (ox as i32 + patch.width as i32).min(dst_w);

    for dst_x in x_start..x_end {
        let patch_col = (dst_x - ox as i32) as usize;
        let Some(posts) = patch.columns.get(patch_col) else {
            continue;
        };
        let column = tex.column_mut(dst_x as usize);
        for post in posts {
            let dst_y0 = oy as i32 + post.top_offset as i32;
            for (i, &pixel) in post.pixels.iter().enumerate() {
                let y = dst_y0 + i as i32;
                if y >= 0 && y < dst_h {
                    column[y as usize] = pixel;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::patch::Post;
    use super::*;

    fn single_column_patch(height: u16, posts: Vec<Post>) -> Patch {
        Patch {
            width: 1,
            height,
            left_offset: 0,
            top_offset: 0,
            columns: vec![posts],
        }
    }

    #[test]
    fn single_patch_texture_matches_patch_bytes_elsewhere_transparent() {
        let mut tex = Texture {
            width: 1,
            height: 8,
            pixels: vec![TRANSPARENT; 8],
        };
        let patch = single_column_patch(
            8,
            vec![Post {
                top_offset: 2,
                pixels: vec![10, 20, 30],
            }],
        );
        blit_patch(&mut tex, &patch, 0, 0);
        let col = tex.column(0).unwrap();
        assert_eq!(col[0], TRANSPARENT);
        assert_eq!(col[1], TRANSPARENT);
        assert_eq!(col[2], 10);
        assert_eq!(col[3], 20);
        assert_eq!(col[4], 30);
        assert_eq!(col[5], TRANSPARENT);
    }

    #[test]
    fn later_patch_overwrites_only_covered_pixels() {
        let mut tex = Texture {
            width: 1,
            height: 8,
            pixels: vec![TRANSPARENT; 8],
        };
        let patch_a = single_column_patch(
            8,
            vec![Post {
                top_offset: 0,
                pixels: vec![1, 1, 1, 1],
            }],
        );
        blit_patch(&mut tex, &patch_a, 0, 0);

        let patch_b = single_column_patch(
            8,
            vec![Post {
                top_offset: 1,
                pixels: vec![9, 9],
            }],
        );
        blit_patch(&mut tex, &patch_b, 0, 0);

        let col = tex.column(0).unwrap();
        assert_eq!(col, &[1, 9, 9, 1, TRANSPARENT, TRANSPARENT, TRANSPARENT, TRANSPARENT]);
    }
}
