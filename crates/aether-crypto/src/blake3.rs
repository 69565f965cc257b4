//! Domain-separated BLAKE3 hashing for the Aether ledger.
//!
//! Every derived value in the ledger (ciphertext handles, ticket seed
//! commitments, loot rolls, allocation asset ids, decryption grant digests)
//! goes through [`derive_key`] or [`keyed_hash`] with a registered context
//! string, so values derived for one purpose can never collide with another.
//!
//! ## Modes
//!
//! - [`hash`] — Pure hashing: address derivation
//! - [`derive_key`] — Key derivation: handles, commitments, asset ids
//! - [`keyed_hash`] — Keyed PRF: loot rolls under a ticket nonce

/// Context strings for [`derive_key`]. Each purpose gets its own.
pub mod contexts {
    pub const CIPHERTEXT_HANDLE: &str = "Aether v1 ciphertext-handle";
    pub const CIPHERTEXT_NONCE: &str = "Aether v1 ciphertext-nonce";
    pub const DECRYPTION_GRANT: &str = "Aether v1 decryption-grant";
    pub const TICKET_SEED: &str = "Aether v1 ticket-seed";
    pub const LOOT_ASSET_ID: &str = "Aether v1 loot-asset-id";
    pub const CONTRACT_ADDRESS: &str = "Aether v1 contract-address";

    pub const ALL_CONTEXTS: &[&str] = &[
        CIPHERTEXT_HANDLE,
        CIPHERTEXT_NONCE,
        DECRYPTION_GRANT,
        TICKET_SEED,
        LOOT_ASSET_ID,
        CONTRACT_ADDRESS,
    ];
}

/// Plain BLAKE3 digest.
pub fn hash(data: &[u8]) -> [u8; 32] {
    ::blake3::hash(data).into()
}

/// BLAKE3 in derive-key mode. `context` should be one of [`contexts`].
pub fn derive_key(context: &str, material: &[u8]) -> [u8; 32] {
    ::blake3::derive_key(context, material)
}

/// BLAKE3 keyed mode, used as a PRF over ticket commitments.
pub fn keyed_hash(key: &[u8; 32], input: &[u8]) -> [u8; 32] {
    ::blake3::keyed_hash(key, input).into()
}

/// Concatenate fields, each prefixed with its length as a little-endian
/// `u32`, so field boundaries survive hashing.
pub fn encode_multi_field(fields: &[&[u8]]) -> Vec<u8> {
    fields.iter().fold(Vec::new(), |mut out, field| {
        out.extend_from_slice(&(field.len() as u32).to_le_bytes());
        out.extend_from_slice(field);
        out
    })
}

/// Read the first eight bytes of a digest as a little-endian `u64`.
pub fn digest_to_u64(digest: &[u8; 32]) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(word)
}
