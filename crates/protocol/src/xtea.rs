//! XTEA block cipher used for every message after the first

use crate::error::{ProtocolError, Result};

pub const XTEA_BLOCK_BYTES: usize = 8;
const XTEA_DELTA: u32 = 0x9E37_79B9;
const XTEA_ROUNDS: u32 = 32;

/// Session key exchanged inside the RSA block of the first message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct XteaKey {
    key: [u32; 4],
}

impl XteaKey {
    pub const fn new(key: [u32; 4]) -> Self {
        Self { key }
    }

    pub fn words(&self) -> [u32; 4] {
        self.key
    }

    pub fn encrypt_in_place(&self, data: &mut [u8]) -> Result<()> {
        if data.len() % XTEA_BLOCK_BYTES != 0 {
            return Err(ProtocolError::BlockAlignment(data.len()));
        }
        for chunk in data.chunks_exact_mut(XTEA_BLOCK_BYTES) {
            let (mut v0, mut v1) = read_block(chunk);
            let mut sum = 0u32;
            for _ in 0..XTEA_ROUNDS {
                v0 = v0.wrapping_add(
                    ((v1 << 4) ^ (v1 >> 5))
                        .wrapping_add(v1)
                        ^ sum.wrapping_add(self.key[(sum & 3) as usize]),
                );
                sum = sum.wrapping_add(XTEA_DELTA);
                v1 = v1.wrapping_add(
                    ((v0 << 4) ^ (v0 >> 5))
                        .wrapping_add(v0)
                        ^ sum.wrapping_add(self.key[((sum >> 11) & 3) as usize]),
                );
            }
            write_block(chunk, v0, v1);
        }
        Ok(())
    }

    pub fn decrypt_in_place(&self, data: &mut [u8]) -> Result<()> {
        if data.len() % XTEA_BLOCK_BYTES != 0 {
            return Err(ProtocolError::BlockAlignment(data.len()));
        }
        for chunk in data.chunks_exact_mut(XTEA_BLOCK_BYTES) {
            let (mut v0, mut v1) = read_block(chunk);
            let mut sum = XTEA_DELTA.wrapping_mul(XTEA_ROUNDS);
            for _ in 0..XTEA_ROUNDS {
                v1 = v1.wrapping_sub(
                    ((v0 << 4) ^ (v0 >> 5))
                        .wrapping_add(v0)
                        ^ sum.wrapping_add(self.key[((sum >> 11) & 3) as usize]),
                );
                sum = sum.wrapping_sub(XTEA_DELTA);
                v0 = v0.wrapping_sub(
                    ((v1 << 4) ^ (v1 >> 5))
                        .wrapping_add(v1)
                        ^ sum.wrapping_add(self.key[(sum & 3) as usize]),
                );
            }
            write_block(chunk, v0, v1);
        }
        Ok(())
    }
}

fn read_block(chunk: &[u8]) -> (u32, u32) {
    (
        u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
        u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]),
    )
}

fn write_block(chunk: &mut [u8], v0: u32, v1: u32) {
    chunk[..4].copy_from_slice(&v0.to_le_bytes());
    chunk[4..].copy_from_slice(&v1.to_le_bytes());
}
