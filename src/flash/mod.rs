//! Word-aligned reads from a slow external memory, plus the small
//! fixed-capacity cache that keeps hot records from re-hitting it.
//!
//! Grounded on `x_spi.h`'s `X_spi_read(address, *data, word_count)` and
//! `x_cache.c`'s hash+LRU cache. The real SPI/QSPI driver is an
//! external collaborator out of scope for this crate; [`SliceFlash`] is
//! the only concrete [`FlashTransport`] shipped here, backing
//! everything onto an in-memory byte slice so the rest of the renderer
//! can be built and tested without hardware.

mod cache;

pub use cache::FlashCache;

use byteorder::{ByteOrder, LittleEndian};

/// One primitive: word-aligned block reads from a flat byte-addressed
/// external memory. Ordering is program order; the transport is
/// assumed reliable (§4.1 — transient errors are retried below this
/// layer, out of scope here).
pub trait FlashTransport {
    /// Reads `out.len()` 32-bit little-endian words starting at
    /// `word_addr` (a *word* index, not a byte offset).
    fn read_words(&self, word_addr: u32, out: &mut [u32]);

    fn byte_len(&self) -> usize;
}

/// In-memory stand-in for the flash chip: the mapped WAD image (or any
/// other flash-resident region) as a plain byte buffer.
pub struct SliceFlash {
    bytes: Vec<u8>,
}

impl SliceFlash {
    pub fn new(bytes: Vec<u8>) -> SliceFlash {
        SliceFlash { bytes }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl FlashTransport for SliceFlash {
    fn read_words(&self, word_addr: u32, out: &mut [u32]) {
        let byte_off = word_addr as usize * 4;
        for (i, slot) in out.iter_mut().enumerate() {
            let off = byte_off + i * 4;
            *slot = if off + 4 <= self.bytes.len() {
                LittleEndian::read_u32(&self.bytes[off..off + 4])
            } else {
                0
            };
        }
    }

    fn byte_len(&self) -> usize {
        self.bytes.len()
    }
}

/// Batches whole-word transport reads into arbitrary byte ranges.
/// Callers needing sub-word fields read one or two words into a local
/// buffer and extract the field in CPU, exactly as §4.1 specifies —
/// never issue a transport read smaller than a word.
pub struct FlashReader<T: FlashTransport> {
    transport: T,
    cache: FlashCache,
}

impl<T: FlashTransport> FlashReader<T> {
    pub fn new(transport: T) -> FlashReader<T> {
        FlashReader {
            transport,
            cache: FlashCache::new(1 << 20),
        }
    }

    pub fn with_cache_capacity(transport: T, cache_bytes: usize) -> FlashReader<T> {
        FlashReader {
            transport,
            cache: FlashCache::new(cache_bytes),
        }
    }

    pub fn byte_len(&self) -> usize {
        self.transport.byte_len()
    }

    /// Reads `len` bytes starting at byte offset `addr`, through the
    /// cache. Batches the whole range into one transport call on a
    /// miss rather than reading word-by-word.
    pub fn read_range(&mut self, addr: u32, len: u32) -> Vec<u8> {
        if let Some(hit) = self.cache.get(addr, len) {
            return hit;
        }

        let first_word = addr / 4;
        let last_byte = addr + len;
        let last_word = (last_byte + 3) / 4;
        let word_count = (last_word - first_word).max(1) as usize;

        let mut words = vec![0u32; word_count];
        self.transport.read_words(first_word, &mut words);

        let mut raw = vec![0u8; word_count * 4];
        for (i, w) in words.iter().enumerate() {
            LittleEndian::write_u32(&mut raw[i * 4..i * 4 + 4], *w);
        }

        let skip = (addr - first_word * 4) as usize;
        let data = raw[skip..skip + len as usize].to_vec();
        self.cache.put(addr, len, data.clone());
        data
    }

    pub fn read_u8(&mut self, addr: u32) -> u8 {
        self.read_range(addr, 1)[0]
    }

    pub fn read_u16(&mut self, addr: u32) -> u16 {
        LittleEndian::read_u16(&self.read_range(addr, 2))
    }

    pub fn read_i16(&mut self, addr: u32) -> i16 {
        self.read_u16(addr) as i16
    }

    pub fn read_u32(&mut self, addr: u32) -> u32 {
        LittleEndian::read_u32(&self.read_range(addr, 4))
    }

    pub fn read_i32(&mut self, addr: u32) -> i32 {
        self.read_u32(addr) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SliceFlash {
        let mut bytes = vec![0u8; 64];
        LittleEndian::write_u32(&mut bytes[0..4], 0xDEAD_BEEF);
        LittleEndian::write_u16(&mut bytes[10..12], 0x1234);
        SliceFlash::new(bytes)
    }

    #[test]
    fn reads_unaligned_ranges() {
        let mut r = FlashReader::new(sample());
        assert_eq!(r.read_u32(0), 0xDEAD_BEEF);
        assert_eq!(r.read_u16(10), 0x1234);
    }

    #[test]
    fn cache_hits_return_same_bytes() {
        let mut r = FlashReader::new(sample());
        let a = r.read_range(0, 4);
        let b = r.read_range(0, 4);
        assert_eq!(a, b);
    }
}
