// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Encrypted response envelopes.
//!
//! ## Wire Format
//!
//! ```text
//! base64( [salt: 8] || nonce: 12 || ciphertext || tag: 16 )
//! ```
//!
//! - **Derived mode** (canonical): a fresh salt per call, the AES-256 key is
//!   PBKDF2-HMAC-SHA256(key material, salt).
//! - **Direct mode** (deprecated): no salt, the key material is zero-padded
//!   or truncated to 32 bytes and used as the AES key as-is.
//!
//! The envelope carries no version marker, so both sides must agree on the
//! mode out of band. It is configured, never guessed from the input length.

use std::num::NonZeroU32;
use std::str::FromStr;

use base64ct::{Base64, Encoding};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use serde::Serialize;

/// Salt length in derived mode.
pub const SALT_LEN: usize = 8;

/// AES-256 key length.
pub const KEY_LEN: usize = 32;

/// AES-GCM authentication tag length.
pub const TAG_LEN: usize = 16;

const DEFAULT_ITERATIONS: NonZeroU32 = match NonZeroU32::new(4096) {
    Some(n) => n,
    None => unreachable!(),
};

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("system randomness unavailable")]
    Random,

    #[error("invalid AEAD key")]
    Key,

    #[error("sealing failed")]
    Seal,

    #[error("envelope is not valid base64")]
    Encoding,

    #[error("envelope is truncated ({0} bytes)")]
    Truncated(usize),

    #[error("envelope failed authentication")]
    Decrypt,

    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// How the AEAD key is obtained from the caller's key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvelopeMode {
    /// PBKDF2 with a per-envelope salt.
    #[default]
    Derived,
    /// Key material used directly. Deprecated, kept for old clients.
    Direct,
}

impl FromStr for EnvelopeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "derived" => Ok(EnvelopeMode::Derived),
            "direct" => Ok(EnvelopeMode::Direct),
            other => Err(format!("unknown envelope mode '{other}' (expected 'derived' or 'direct')")),
        }
    }
}

/// Stateless envelope encoder/decoder.
#[derive(Clone)]
pub struct EnvelopeCodec {
    mode: EnvelopeMode,
    iterations: NonZeroU32,
    rng: SystemRandom,
}

impl std::fmt::Debug for EnvelopeCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeCodec")
            .field("mode", &self.mode)
            .field("iterations", &self.iterations)
            .finish()
    }
}

impl EnvelopeCodec {
    /// `iterations` of zero falls back to the default of 4096.
    pub fn new(mode: EnvelopeMode, iterations: u32) -> Self {
        Self {
            mode,
            iterations: NonZeroU32::new(iterations).unwrap_or(DEFAULT_ITERATIONS),
            rng: SystemRandom::new(),
        }
    }

    pub fn mode(&self) -> EnvelopeMode {
        self.mode
    }

    /// Serialize `value` to JSON and seal it.
    pub fn seal_json<T: Serialize>(&self, value: &T, key_material: &[u8]) -> Result<String, EnvelopeError> {
        let plaintext = serde_json::to_vec(value)?;
        self.seal(&plaintext, key_material)
    }

    /// Encrypt `plaintext` into a base64 envelope.
    pub fn seal(&self, plaintext: &[u8], key_material: &[u8]) -> Result<String, EnvelopeError> {
        let mut out = Vec::with_capacity(SALT_LEN + NONCE_LEN + plaintext.len() + TAG_LEN);

        let key = match self.mode {
            EnvelopeMode::Derived => {
                let mut salt = [0u8; SALT_LEN];
                self.rng.fill(&mut salt).map_err(|_| EnvelopeError::Random)?;
                out.extend_from_slice(&salt);
                self.derive_key(key_material, &salt)
            }
            EnvelopeMode::Direct => direct_key(key_material),
        };

        let mut nonce = [0u8; NONCE_LEN];
        self.rng.fill(&mut nonce).map_err(|_| EnvelopeError::Random)?;
        out.extend_from_slice(&nonce);

        let mut in_out = plaintext.to_vec();
        aead_key(&key)?
            .seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut in_out)
            .map_err(|_| EnvelopeError::Seal)?;
        out.extend_from_slice(&in_out);

        Ok(Base64::encode_string(&out))
    }

    /// Decrypt a base64 envelope. Any malformation or tag failure is an error.
    pub fn open(&self, envelope: &str, key_material: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
        let raw = Base64::decode_vec(envelope.trim()).map_err(|_| EnvelopeError::Encoding)?;

        let salt_len = match self.mode {
            EnvelopeMode::Derived => SALT_LEN,
            EnvelopeMode::Direct => 0,
        };
        if raw.len() < salt_len + NONCE_LEN + TAG_LEN {
            return Err(EnvelopeError::Truncated(raw.len()));
        }

        let (salt, rest) = raw.split_at(salt_len);
        let (nonce, sealed) = rest.split_at(NONCE_LEN);

        let key = match self.mode {
            EnvelopeMode::Derived => self.derive_key(key_material, salt),
            EnvelopeMode::Direct => direct_key(key_material),
        };
        let nonce = Nonce::try_assume_unique_for_key(nonce).map_err(|_| EnvelopeError::Decrypt)?;

        let mut in_out = sealed.to_vec();
        let plaintext = aead_key(&key)?
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| EnvelopeError::Decrypt)?;
        Ok(plaintext.to_vec())
    }

    fn derive_key(&self, key_material: &[u8], salt: &[u8]) -> [u8; KEY_LEN] {
        let mut key = [0u8; KEY_LEN];
        pbkdf2::derive(pbkdf2::PBKDF2_HMAC_SHA256, self.iterations, salt, key_material, &mut key);
        key
    }
}

/// Zero-pad or truncate key material to exactly 32 bytes.
fn direct_key(key_material: &[u8]) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    let n = key_material.len().min(KEY_LEN);
    key[..n].copy_from_slice(&key_material[..n]);
    key
}

fn aead_key(key: &[u8; KEY_LEN]) -> Result<LessSafeKey, EnvelopeError> {
    let unbound = UnboundKey::new(&AES_256_GCM, key).map_err(|_| EnvelopeError::Key)?;
    Ok(LessSafeKey::new(unbound))
}
