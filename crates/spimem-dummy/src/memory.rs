//! Sparse backing store for emulated arrays
//!
//! Untouched storage reads as the erased value and costs no memory, so
//! large SPI-NAND parts can be emulated cheaply.

use std::collections::BTreeMap;

const BLOCK: usize = 4096;

/// Byte-addressable memory of a fixed size, stored in 4 KiB blocks
#[derive(Debug, Clone)]
pub struct SparseMemory {
    size: usize,
    fill: u8,
    blocks: BTreeMap<usize, Box<[u8]>>,
}

impl SparseMemory {
    /// Create a memory of `size` bytes that reads as `fill`
    pub fn new(size: usize, fill: u8) -> Self {
        Self {
            size,
            fill,
            blocks: BTreeMap::new(),
        }
    }

    /// Total size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    fn block_mut(&mut self, index: usize) -> &mut [u8] {
        let fill = self.fill;
        self.blocks
            .entry(index)
            .or_insert_with(|| vec![fill; BLOCK].into_boxed_slice())
    }

    /// Read bytes starting at `addr`, wrapping at the end of the array
    pub fn read(&self, addr: usize, buf: &mut [u8]) {
        for (i, b) in buf.iter_mut().enumerate() {
            let at = (addr + i) % self.size;
            *b = match self.blocks.get(&(at / BLOCK)) {
                Some(block) => block[at % BLOCK],
                None => self.fill,
            };
        }
    }

    /// Replace bytes starting at `addr`
    pub fn write(&mut self, addr: usize, data: &[u8]) {
        for (i, &b) in data.iter().enumerate() {
            let at = (addr + i) % self.size;
            self.block_mut(at / BLOCK)[at % BLOCK] = b;
        }
    }

    /// Flash-style program: bits can only go from 1 to 0
    pub fn program(&mut self, addr: usize, data: &[u8]) {
        for (i, &b) in data.iter().enumerate() {
            let at = (addr + i) % self.size;
            self.block_mut(at / BLOCK)[at % BLOCK] &= b;
        }
    }

    /// Set `[addr, addr + len)` to `value`
    pub fn fill(&mut self, addr: usize, len: usize, value: u8) {
        let end = (addr + len).min(self.size);
        let mut at = addr;
        while at < end {
            let index = at / BLOCK;
            let offset = at % BLOCK;
            let n = (BLOCK - offset).min(end - at);
            if n == BLOCK && value == self.fill {
                self.blocks.remove(&index);
            } else {
                self.block_mut(index)[offset..offset + n].fill(value);
            }
            at += n;
        }
    }

    /// Materialize the whole array
    pub fn to_image(&self) -> Vec<u8> {
        let mut image = vec![self.fill; self.size];
        for (&index, block) in &self.blocks {
            let start = index * BLOCK;
            let n = BLOCK.min(self.size - start);
            image[start..start + n].copy_from_slice(&block[..n]);
        }
        image
    }

    /// Load an image at offset 0 (truncated to the array size)
    pub fn load_image(&mut self, image: &[u8]) {
        let n = image.len().min(self.size);
        self.blocks.clear();
        for (index, chunk) in image[..n].chunks(BLOCK).enumerate() {
            if chunk.iter().any(|&b| b != self.fill) {
                self.write(index * BLOCK, chunk);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untouched_reads_fill() {
        let mem = SparseMemory::new(1 << 20, 0xFF);
        let mut buf = [0u8; 16];
        mem.read(0x8000, &mut buf);
        assert!(buf.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_program_only_clears_bits() {
        let mut mem = SparseMemory::new(8192, 0xFF);
        mem.program(10, &[0xF0]);
        mem.program(10, &[0x0F]);
        let mut buf = [0u8; 1];
        mem.read(10, &mut buf);
        assert_eq!(buf[0], 0x00);
    }

    #[test]
    fn test_fill_across_blocks_and_image() {
        let mut mem = SparseMemory::new(3 * BLOCK, 0xFF);
        mem.fill(BLOCK - 2, 4, 0x00);
        let image = mem.to_image();
        assert_eq!(&image[BLOCK - 3..BLOCK + 3], &[0xFF, 0, 0, 0, 0, 0xFF]);

        mem.fill(0, 3 * BLOCK, 0xFF);
        assert!(mem.blocks.is_empty());

        mem.load_image(&image);
        assert_eq!(mem.to_image(), image);
    }
}
