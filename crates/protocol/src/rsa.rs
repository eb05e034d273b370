//! RSA decryption of the first-message key block
//!
//! The client encrypts a 128-byte block with the server's public key. Only
//! raw (unpadded) RSA is used; a valid block decrypts to a leading zero byte.

use crate::error::{ProtocolError, Result};
use num_bigint::BigUint;

/// Size of the encrypted block in the first message
pub const RSA_BLOCK_SIZE: usize = 128;

/// Decrypts one RSA block in place
pub trait RsaDecryptor: Send + Sync {
    fn decrypt_block(&self, block: &mut [u8]) -> Result<()>;
}

/// Private key: modulus and private exponent
#[derive(Debug, Clone)]
pub struct RsaKey {
    modulus: BigUint,
    private_exponent: BigUint,
}

impl RsaKey {
    pub fn new(modulus: BigUint, private_exponent: BigUint) -> Self {
        Self {
            modulus,
            private_exponent,
        }
    }

    /// Build a key from base-10 strings as they appear in the config file
    pub fn from_decimal(modulus: &str, private_exponent: &str) -> Result<Self> {
        let parse = |label: &str, value: &str| {
            BigUint::parse_bytes(value.trim().as_bytes(), 10)
                .ok_or_else(|| ProtocolError::RsaKey(format!("{label} is not a decimal number")))
        };
        let modulus = parse("modulus", modulus)?;
        let private_exponent = parse("private exponent", private_exponent)?;
        if modulus.bits() == 0 {
            return Err(ProtocolError::RsaKey("modulus is zero".into()));
        }
        Ok(Self::new(modulus, private_exponent))
    }
}

impl RsaDecryptor for RsaKey {
    fn decrypt_block(&self, block: &mut [u8]) -> Result<()> {
        let cipher = BigUint::from_bytes_be(block);
        if cipher >= self.modulus {
            return Err(ProtocolError::RsaDecrypt);
        }
        let plain = cipher.modpow(&self.private_exponent, &self.modulus).to_bytes_be();
        if plain.len() > block.len() {
            return Err(ProtocolError::RsaDecrypt);
        }
        let pad = block.len() - plain.len();
        block[..pad].fill(0);
        block[pad..].copy_from_slice(&plain);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // p = 61, q = 53, e = 17
    fn toy_key() -> RsaKey {
        RsaKey::from_decimal("3233", "2753").unwrap()
    }

    #[test]
    fn test_decrypt_toy_block() {
        let mut block = [0u8; RSA_BLOCK_SIZE];
        // 65^17 mod 3233 = 2790
        block[126] = 0x0A;
        block[127] = 0xE6;
        toy_key().decrypt_block(&mut block).unwrap();
        assert_eq!(block[127], 65);
        assert!(block[..127].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_cipher_above_modulus_fails() {
        let mut block = [0xFFu8; RSA_BLOCK_SIZE];
        assert_eq!(toy_key().decrypt_block(&mut block), Err(ProtocolError::RsaDecrypt));
    }

    #[test]
    fn test_rejects_non_decimal_key() {
        assert!(RsaKey::from_decimal("abc", "1").is_err());
        assert!(RsaKey::from_decimal("0", "1").is_err());
    }
}
