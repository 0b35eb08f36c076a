//! Cryptographic helpers.
//!
//! - BLAKE3 for Merkle nodes and store commitments
//! - SHA-256 for transaction hashes and address derivation
//! - Ed25519 for transaction signatures

use crate::types::{Address, Hash};

/// Length of an ed25519 public key in bytes.
pub const PUBKEY_LEN: usize = 32;

/// Length of an ed25519 signature in bytes.
pub const SIGNATURE_LEN: usize = 64;

/// Compute the BLAKE3 hash of the input data.
pub fn hash_blake3(data: &[u8]) -> Hash {
    *blake3::hash(data).as_bytes()
}

/// Compute the SHA-256 hash of the input data.
pub fn hash_sha256(data: &[u8]) -> Hash {
    use sha2::Digest;
    sha2::Sha256::digest(data).into()
}

/// Hash of raw transaction bytes, used in logs and events.
pub fn tx_hash(raw_tx: &[u8]) -> Hash {
    hash_sha256(raw_tx)
}

/// Derive an account address: the first 20 bytes of SHA-256(public key).
pub fn address_from_pubkey(public_key: &[u8; PUBKEY_LEN]) -> Address {
    let digest = hash_sha256(public_key);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&digest[..20]);
    addr
}

/// Verify an Ed25519 signature. Deterministic; returns `false` for a
/// malformed public key instead of failing.
pub fn verify_ed25519(
    message: &[u8],
    signature: &[u8; SIGNATURE_LEN],
    public_key: &[u8; PUBKEY_LEN],
) -> bool {
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    let Ok(verifying_key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let sig = Signature::from_bytes(signature);
    verifying_key.verify(message, &sig).is_ok()
}

/// Sign a message with an Ed25519 private key.
pub fn sign_ed25519(
    message: &[u8],
    secret_key: &ed25519_dalek::SigningKey,
) -> [u8; SIGNATURE_LEN] {
    use ed25519_dalek::Signer;
    secret_key.sign(message).to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate_keypair() -> (ed25519_dalek::VerifyingKey, ed25519_dalek::SigningKey) {
        let signing_key = ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng);
        (signing_key.verifying_key(), signing_key)
    }

    #[test]
    fn test_blake3_deterministic() {
        let h1 = hash_blake3(b"hello basalt");
        assert_eq!(h1, hash_blake3(b"hello basalt"));
        assert_ne!(h1, hash_blake3(b"hello basalt!"));
    }

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256("") = e3b0c442...7852b855
        let h = hash_sha256(b"");
        assert_eq!(h[0], 0xe3);
        assert_eq!(h[1], 0xb0);
        assert_eq!(h[31], 0x55);
    }

    #[test]
    fn test_address_from_pubkey() {
        let (vk, _sk) = generate_keypair();
        let addr = address_from_pubkey(vk.as_bytes());
        assert_eq!(addr[..], hash_sha256(vk.as_bytes())[..20]);
    }

    #[test]
    fn test_ed25519_sign_verify_roundtrip() {
        let (verifying_key, signing_key) = generate_keypair();
        let message = b"basalt sign doc";
        let signature = sign_ed25519(message, &signing_key);
        assert!(verify_ed25519(message, &signature, verifying_key.as_bytes()));
        assert!(!verify_ed25519(b"other", &signature, verifying_key.as_bytes()));
    }

    #[test]
    fn test_ed25519_reject_wrong_key() {
        let (_vk1, signing_key) = generate_keypair();
        let (vk2, _sk2) = generate_keypair();
        let signature = sign_ed25519(b"msg", &signing_key);
        assert!(!verify_ed25519(b"msg", &signature, vk2.as_bytes()));
    }

    #[test]
    fn test_ed25519_reject_garbage_key() {
        assert!(!verify_ed25519(b"test", &[0u8; 64], &[0xff; 32]));
    }
}
