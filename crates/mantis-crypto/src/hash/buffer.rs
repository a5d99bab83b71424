//! Block buffering and Merkle-Damgård padding shared by MD5, SHA-1 and SHA-2.

use zeroize::Zeroize;

#[derive(Clone)]
pub(crate) struct BlockBuffer<const B: usize> {
    buf: [u8; B],
    len: usize,
    /// Total bytes absorbed.
    total: u128,
}

impl<const B: usize> BlockBuffer<B> {
    pub(crate) fn new() -> Self {
        Self {
            buf: [0u8; B],
            len: 0,
            total: 0,
        }
    }

    /// Absorb `data`, calling `compress` for every full block.
    pub(crate) fn update(&mut self, mut data: &[u8], mut compress: impl FnMut(&[u8])) {
        self.total += data.len() as u128;
        if self.len > 0 {
            let take = (B - self.len).min(data.len());
            self.buf[self.len..self.len + take].copy_from_slice(&data[..take]);
            self.len += take;
            data = &data[take..];
            if self.len < B {
                return;
            }
            compress(&self.buf);
            self.len = 0;
        }
        let mut blocks = data.chunks_exact(B);
        for block in &mut blocks {
            compress(block);
        }
        let rest = blocks.remainder();
        self.buf[..rest.len()].copy_from_slice(rest);
        self.len = rest.len();
    }

    /// Append `0x80`, zero fill and the message bit length encoded in
    /// `len_size` bytes, then compress the final block(s).
    pub(crate) fn finalize(&mut self, len_size: usize, big_endian: bool, mut compress: impl FnMut(&[u8])) {
        let bit_len = self.total.wrapping_mul(8);
        let len_bytes = if big_endian {
            bit_len.to_be_bytes()
        } else {
            bit_len.to_le_bytes()
        };
        let len_field = if big_endian {
            &len_bytes[16 - len_size..]
        } else {
            &len_bytes[..len_size]
        };

        self.buf[self.len] = 0x80;
        self.buf[self.len + 1..].fill(0);
        if self.len + 1 > B - len_size {
            compress(&self.buf);
            self.buf.fill(0);
        }
        self.buf[B - len_size..].copy_from_slice(len_field);
        compress(&self.buf);
        self.buf.zeroize();
        self.len = 0;
    }

    pub(crate) fn reset(&mut self) {
        self.buf.zeroize();
        self.len = 0;
        self.total = 0;
    }
}

impl<const B: usize> Drop for BlockBuffer<B> {
    fn drop(&mut self) {
        self.buf.zeroize();
    }
}
