// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ed25519 signing and verification over canonical strings, plus the
//! PEM ⇄ raw-base64 key conversions devices are provisioned with.

use anyhow::{anyhow, Context};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Decode base64 in either alphabet. Wire tokens use the URL-safe unpadded
/// form (`=` and `+` collide with legacy value heuristics); provisioning
/// material may arrive standard-encoded.
fn b64_decode_flex(input: &str) -> Option<Vec<u8>> {
    let trimmed = input.trim();
    URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD.decode(trimmed))
        .ok()
}

/// The server's long-lived signing identity. Signs outgoing commands,
/// firmware release records, and download tokens.
pub struct ServerSigner {
    key: SigningKey,
}

impl ServerSigner {
    /// Load from a PKCS#8 PEM string.
    pub fn from_pem(pem: &str) -> anyhow::Result<Self> {
        let key = SigningKey::from_pkcs8_pem(pem)
            .map_err(|e| anyhow!("failed to parse server key PEM: {e}"))?;
        Ok(Self { key })
    }

    /// Load from a base64-encoded raw 32-byte seed.
    pub fn from_seed_b64(b64: &str) -> anyhow::Result<Self> {
        let bytes =
            b64_decode_flex(b64).context("server key seed is not valid base64")?;
        let seed: [u8; 32] =
            bytes.try_into().map_err(|_| anyhow!("server key seed must be 32 bytes"))?;
        Ok(Self { key: SigningKey::from_bytes(&seed) })
    }

    /// Generate an ephemeral key (dev mode, tests).
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::rng().fill_bytes(&mut seed);
        Self { key: SigningKey::from_bytes(&seed) }
    }

    /// Sign a canonical string; returns the URL-safe base64 signature.
    pub fn sign_b64(&self, message: &str) -> String {
        URL_SAFE_NO_PAD.encode(self.key.sign(message.as_bytes()).to_bytes())
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    /// Raw public key, base64 — the form exported for device configuration.
    pub fn public_raw_b64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.key.verifying_key().to_bytes())
    }

    /// Verify a signature made by this server key.
    pub fn verify_own_b64(&self, message: &str, sig_b64: &str) -> bool {
        verify_with_key(&self.key.verifying_key(), message, sig_b64)
    }
}

impl std::fmt::Debug for ServerSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerSigner").field("public", &self.public_raw_b64()).finish()
    }
}

/// Verify `sig_b64` over `message` against a device's PEM public key.
pub fn verify_pem_b64(public_pem: &str, message: &str, sig_b64: &str) -> bool {
    let Ok(key) = VerifyingKey::from_public_key_pem(public_pem) else {
        return false;
    };
    verify_with_key(&key, message, sig_b64)
}

fn verify_with_key(key: &VerifyingKey, message: &str, sig_b64: &str) -> bool {
    let Some(bytes) = b64_decode_flex(sig_b64) else {
        return false;
    };
    let Ok(sig) = Signature::from_slice(&bytes) else {
        return false;
    };
    key.verify(message.as_bytes(), &sig).is_ok()
}

/// Convert a raw-32-byte base64 public key to SPKI PEM for storage.
pub fn public_pem_from_raw_b64(b64: &str) -> anyhow::Result<String> {
    let bytes = b64_decode_flex(b64).context("public key is not valid base64")?;
    let raw: [u8; 32] =
        bytes.try_into().map_err(|_| anyhow!("public key must be 32 bytes"))?;
    let key = VerifyingKey::from_bytes(&raw).context("not a valid Ed25519 public key")?;
    key.to_public_key_pem(LineEnding::LF).context("failed to render public key PEM")
}

/// Convert a stored SPKI PEM public key back to its raw-base64 form.
pub fn raw_b64_from_public_pem(pem: &str) -> anyhow::Result<String> {
    let key = VerifyingKey::from_public_key_pem(pem)
        .map_err(|e| anyhow!("failed to parse public key PEM: {e}"))?;
    Ok(URL_SAFE_NO_PAD.encode(key.to_bytes()))
}

/// Accept a device public key in either form, normalizing to PEM.
pub fn normalize_public_key(input: &str) -> anyhow::Result<String> {
    if input.contains("BEGIN PUBLIC KEY") {
        // Validate before storing.
        VerifyingKey::from_public_key_pem(input)
            .map_err(|e| anyhow!("failed to parse public key PEM: {e}"))?;
        Ok(input.to_owned())
    } else {
        public_pem_from_raw_b64(input)
    }
}

/// SHA-256 hex digest; used for nonce and token hashing.
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

#[cfg(test)]
#[path = "crypto_tests.rs"]
mod tests;
