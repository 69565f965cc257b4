//! ChaCha20-Poly1305 sealing of ciphertext words (RFC 8439).
//!
//! The in-process confidential-compute provider keeps every encrypted value
//! sealed under its network key. Each sealed word is bound to the handle that
//! names it: the nonce is derived from the handle, and the handle's type tag
//! is authenticated as associated data, so a sealed word cannot be replayed
//! under another handle or reinterpreted as another type.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};

use crate::{blake3, CryptoError, Result};

/// Nonce size for ChaCha20-Poly1305 (96 bits = 12 bytes).
pub const NONCE_SIZE: usize = 12;

/// Key size for ChaCha20-Poly1305 (256 bits = 32 bytes).
pub const KEY_SIZE: usize = 32;

/// Authentication tag size (128 bits = 16 bytes).
pub const TAG_SIZE: usize = 16;

/// Derive the sealing nonce for a ciphertext handle.
///
/// `nonce = BLAKE3::derive_key("Aether v1 ciphertext-nonce", handle)[..12]`
pub fn handle_nonce(handle: &[u8; 32]) -> [u8; NONCE_SIZE] {
    let digest = blake3::derive_key(blake3::contexts::CIPHERTEXT_NONCE, handle);
    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&digest[..NONCE_SIZE]);
    nonce
}

/// Encrypt data with ChaCha20-Poly1305.
///
/// Returns the ciphertext with the 16-byte authentication tag appended.
pub fn encrypt(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .encrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| CryptoError::AeadDecryption)
}

/// Decrypt data with ChaCha20-Poly1305.
///
/// Fails if the tag does not authenticate `ciphertext` and `aad`.
pub fn decrypt(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| CryptoError::AeadDecryption)
}

/// Seal a 32-byte plaintext word under `key`, bound to `handle`.
pub fn seal_word(
    key: &[u8; KEY_SIZE],
    handle: &[u8; 32],
    word: &[u8; 32],
    type_tag: u8,
) -> Result<Vec<u8>> {
    encrypt(key, &handle_nonce(handle), word, &[type_tag])
}

/// Open a sealed word previously produced by [`seal_word`].
pub fn open_word(
    key: &[u8; KEY_SIZE],
    handle: &[u8; 32],
    sealed: &[u8],
    type_tag: u8,
) -> Result<[u8; 32]> {
    let plaintext = decrypt(key, &handle_nonce(handle), sealed, &[type_tag])?;
    let word: [u8; 32] = plaintext
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidKeyLength {
            expected: 32,
            actual: plaintext.len(),
        })?;
    Ok(word)
}
