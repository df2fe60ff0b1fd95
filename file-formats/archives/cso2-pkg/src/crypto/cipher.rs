//! Block cipher dispatch

use crate::{PkgError, Result};
use aes::cipher::{
    BlockCipher, BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit,
    KeyIvInit, block_padding::NoPadding, generic_array::GenericArray,
};
use blowfish::Blowfish;
use des::Des;
use std::fmt;

/// IV used when the caller does not supply one
pub const ZERO_IV: [u8; 16] = [0; 16];

/// Cipher selected by a manifest or wrapper header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Cipher {
    /// DES, applied block by block
    Des = 1,
    /// AES in CBC mode, key size taken from the key
    Aes = 2,
    /// Blowfish, applied block by block
    Blowfish = 3,
    /// AES-128 in CBC mode keyed by the first 16 key bytes
    Rijndael = 4,
}

impl TryFrom<u8> for Cipher {
    type Error = PkgError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Cipher::Des),
            2 => Ok(Cipher::Aes),
            3 => Ok(Cipher::Blowfish),
            4 => Ok(Cipher::Rijndael),
            other => Err(PkgError::UnsupportedCipher(other)),
        }
    }
}

impl fmt::Display for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Cipher::Des => "DES",
            Cipher::Aes => "AES",
            Cipher::Blowfish => "Blowfish",
            Cipher::Rijndael => "Rijndael",
        })
    }
}

impl Cipher {
    /// Wire id of this cipher
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Cipher block size in bytes
    pub fn block_size(self) -> usize {
        match self {
            Cipher::Des | Cipher::Blowfish => 8,
            Cipher::Aes | Cipher::Rijndael => 16,
        }
    }

    /// Decrypt in place with a zero IV
    pub fn decrypt(self, data: &mut [u8], key: &[u8]) -> Result<()> {
        self.decrypt_with_iv(data, key, &ZERO_IV)
    }

    /// Decrypt in place
    ///
    /// Only whole blocks are processed. A trailing partial block is left as
    /// is. The IV is ignored by the block-by-block ciphers.
    pub fn decrypt_with_iv(self, data: &mut [u8], key: &[u8], iv: &[u8; 16]) -> Result<()> {
        let blocks = self.whole_blocks(data)?;
        match self {
            Cipher::Des => ecb_decrypt(&des_cipher(key)?, blocks),
            Cipher::Blowfish => ecb_decrypt(&blowfish_cipher(key)?, blocks),
            Cipher::Aes => match key.len() {
                16 => cbc_decrypt::<aes::Aes128>(blocks, key, iv)?,
                24 => cbc_decrypt::<aes::Aes192>(blocks, key, iv)?,
                32 => cbc_decrypt::<aes::Aes256>(blocks, key, iv)?,
                n => return Err(PkgError::cipher(format!("invalid AES key length {n}"))),
            },
            Cipher::Rijndael => cbc_decrypt::<aes::Aes128>(blocks, rijndael_key(key)?, iv)?,
        }
        Ok(())
    }

    /// Encrypt in place with a zero IV
    ///
    /// The inverse of [`Cipher::decrypt`], used to produce test fixtures and
    /// re-encrypted files.
    pub fn encrypt(self, data: &mut [u8], key: &[u8]) -> Result<()> {
        let iv = &ZERO_IV;
        let blocks = self.whole_blocks(data)?;
        match self {
            Cipher::Des => ecb_encrypt(&des_cipher(key)?, blocks),
            Cipher::Blowfish => ecb_encrypt(&blowfish_cipher(key)?, blocks),
            Cipher::Aes => match key.len() {
                16 => cbc_encrypt::<aes::Aes128>(blocks, key, iv)?,
                24 => cbc_encrypt::<aes::Aes192>(blocks, key, iv)?,
                32 => cbc_encrypt::<aes::Aes256>(blocks, key, iv)?,
                n => return Err(PkgError::cipher(format!("invalid AES key length {n}"))),
            },
            Cipher::Rijndael => cbc_encrypt::<aes::Aes128>(blocks, rijndael_key(key)?, iv)?,
        }
        Ok(())
    }

    fn whole_blocks(self, data: &mut [u8]) -> Result<&mut [u8]> {
        if data.is_empty() {
            return Err(PkgError::EmptyBuffer);
        }
        let whole = data.len() - data.len() % self.block_size();
        if whole != data.len() {
            log::trace!(
                "{self}: leaving {} trailing bytes untouched",
                data.len() - whole
            );
        }
        Ok(&mut data[..whole])
    }
}

fn des_cipher(key: &[u8]) -> Result<Des> {
    let key = key
        .get(..8)
        .ok_or_else(|| PkgError::cipher(format!("DES key too short: {} bytes", key.len())))?;
    Des::new_from_slice(key).map_err(|_| PkgError::cipher("invalid DES key"))
}

fn blowfish_cipher(key: &[u8]) -> Result<Blowfish> {
    Blowfish::new_from_slice(key)
        .map_err(|_| PkgError::cipher(format!("invalid Blowfish key length {}", key.len())))
}

fn rijndael_key(key: &[u8]) -> Result<&[u8]> {
    key.get(..16)
        .ok_or_else(|| PkgError::cipher(format!("Rijndael key too short: {} bytes", key.len())))
}

fn ecb_decrypt<C: BlockDecrypt>(cipher: &C, data: &mut [u8]) {
    for block in data.chunks_exact_mut(C::block_size()) {
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }
}

fn ecb_encrypt<C: BlockEncrypt>(cipher: &C, data: &mut [u8]) {
    for block in data.chunks_exact_mut(C::block_size()) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }
}

fn cbc_decrypt<C>(data: &mut [u8], key: &[u8], iv: &[u8]) -> Result<()>
where
    C: BlockCipher + BlockDecryptMut,
    cbc::Decryptor<C>: KeyIvInit,
{
    cbc::Decryptor::<C>::new_from_slices(key, iv)
        .map_err(|_| PkgError::cipher("invalid key or IV length"))?
        .decrypt_padded_mut::<NoPadding>(data)
        .map_err(|e| PkgError::cipher(format!("CBC decryption failed: {e:?}")))?;
    Ok(())
}

fn cbc_encrypt<C>(data: &mut [u8], key: &[u8], iv: &[u8]) -> Result<()>
where
    C: BlockCipher + BlockEncryptMut,
    cbc::Encryptor<C>: KeyIvInit,
{
    let len = data.len();
    cbc::Encryptor::<C>::new_from_slices(key, iv)
        .map_err(|_| PkgError::cipher("invalid key or IV length"))?
        .encrypt_padded_mut::<NoPadding>(data, len)
        .map_err(|e| PkgError::cipher(format!("CBC encryption failed: {e:?}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const KEY: [u8; 16] = *b"0123456789abcdef";

    fn plain(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + 3) as u8).collect()
    }

    #[test]
    fn test_cipher_ids() {
        for id in 1..=4u8 {
            assert_eq!(Cipher::try_from(id).unwrap().id(), id);
        }
        assert!(matches!(
            Cipher::try_from(0),
            Err(PkgError::UnsupportedCipher(0))
        ));
        assert!(matches!(
            Cipher::try_from(5),
            Err(PkgError::UnsupportedCipher(5))
        ));
    }

    #[test]
    fn test_round_trips() {
        for cipher in [Cipher::Des, Cipher::Aes, Cipher::Blowfish, Cipher::Rijndael] {
            let original = plain(48);
            let mut data = original.clone();
            cipher.encrypt(&mut data, &KEY).unwrap();
            assert_ne!(data, original, "{cipher} left data unchanged");
            cipher.decrypt(&mut data, &KEY).unwrap();
            assert_eq!(data, original, "{cipher} round trip");
        }
    }

    #[test]
    fn test_rijndael_uses_first_sixteen_key_bytes() {
        let long_key = b"0123456789abcdef0123456789abcdef";
        let mut a = plain(32);
        let mut b = a.clone();
        Cipher::Rijndael.encrypt(&mut a, long_key).unwrap();
        Cipher::Aes.encrypt(&mut b, &KEY).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_aes_is_cbc_with_zero_iv() {
        let mut data = vec![0u8; 32];
        Cipher::Aes.encrypt(&mut data, &KEY).unwrap();
        // identical plaintext blocks must not give identical ciphertext
        assert_ne!(data[..16], data[16..]);
    }

    #[test]
    fn test_block_ciphers_do_not_chain() {
        for cipher in [Cipher::Des, Cipher::Blowfish] {
            let mut data = vec![0u8; 16];
            cipher.encrypt(&mut data, &KEY).unwrap();
            assert_eq!(data[..8], data[8..], "{cipher}");
        }
    }

    #[test]
    fn test_partial_block_left_untouched() {
        let original = plain(21);
        let mut data = original.clone();
        Cipher::Aes.encrypt(&mut data, &KEY).unwrap();
        assert_eq!(data[16..], original[16..]);
        Cipher::Aes.decrypt(&mut data, &KEY).unwrap();
        assert_eq!(data, original);
    }

    #[test]
    fn test_empty_buffer_is_an_error() {
        assert!(matches!(
            Cipher::Aes.decrypt(&mut [], &KEY),
            Err(PkgError::EmptyBuffer)
        ));
    }

    #[test]
    fn test_bad_key_lengths() {
        let mut data = plain(16);
        assert!(matches!(
            Cipher::Aes.decrypt(&mut data, &KEY[..10]),
            Err(PkgError::Cipher(_))
        ));
        assert!(matches!(
            Cipher::Des.decrypt(&mut data, &KEY[..4]),
            Err(PkgError::Cipher(_))
        ));
        assert!(matches!(
            Cipher::Rijndael.decrypt(&mut data, &KEY[..8]),
            Err(PkgError::Cipher(_))
        ));
    }

    #[test]
    fn test_explicit_iv_differs_from_zero_iv() {
        let mut a = plain(32);
        let mut b = a.clone();
        Cipher::Aes.encrypt(&mut a, &KEY).unwrap();
        b.copy_from_slice(&a);
        Cipher::Aes.decrypt(&mut a, &KEY).unwrap();
        Cipher::Aes.decrypt_with_iv(&mut b, &KEY, &[1; 16]).unwrap();
        assert_ne!(a[..16], b[..16]);
        assert_eq!(a[16..], b[16..]);
    }
}
