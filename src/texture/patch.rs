//! PNAMES and patch (post-chain) decoding. Grounded on the teacher's
//! `decode_all_patches`/`decode_patch` in `wad/loader.rs`.

use crate::flash::{FlashReader, FlashTransport};
use crate::wad::{lump_name, LumpStore};

pub struct Post {
    pub top_offset: u8,
    pub pixels: Vec<u8>,
}

pub struct Patch {
    pub width: u16,
    pub height: u16,
    pub left_offset: i16,
    pub top_offset: i16,
    /// one post chain per column
    pub columns: Vec<Vec<Post>>,
}

pub fn load_pnames<T: FlashTransport>(
    store: &LumpStore,
    reader: &mut FlashReader<T>,
    idx: usize,
) -> Vec<String> {
    let info = store.lump_info(idx);
    if info.size < 4 {
        return Vec::new();
    }
    let count = reader.read_u32(info.offset) as usize;
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let base = info.offset + 4 + (i * 8) as u32;
        let raw = reader.read_range(base, 8);
        let mut name = [0u8; 8];
        name.copy_from_slice(&raw);
        out.push(lump_name(&name).to_ascii_uppercase());
    }
    out
}

/// Decodes a patch lump's post chains. A post chain is
/// `{top_offset:u8, length:u8, unused:u8, pixels[length], unused:u8}`
/// repeated until `top_offset == 0xFF`.
pub fn decode_patch<T: FlashTransport>(
    store: &LumpStore,
    reader: &mut FlashReader<T>,
    lump_idx: usize,
) -> Patch {
    let info = store.lump_info(lump_idx);
    let base = info.offset;
    let width = reader.read_u16(base);
    let height = reader.read_u16(base + 2);
    let left_offset = reader.read_i16(base + 4);
    let top_offset = reader.read_i16(base + 6);

    let mut columns = Vec::with_capacity(width as usize);
    for col in 0..width as u32 {
        let col_ofs = reader.read_u32(base + 8 + col * 4);
        let mut posts = Vec::new();
        let mut cursor = base + col_ofs;
        loop {
            let top = reader.read_u8(cursor);
            if top == 0xFF {
                break;
            }
            let length = reader.read_u8(cursor + 1) as usize;
            let data_start = cursor + 3;
            let pixels = reader.read_range(data_start, length as u32);
            posts.push(Post {
                top_offset: top,
                pixels,
            });
            cursor = data_start + length as u32 + 1;
        }
        columns.push(posts);
    }

    Patch {
        width,
        height,
        left_offset,
        top_offset,
        columns,
    }
}
