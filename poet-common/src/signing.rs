//! ECDSA-over-secp256k1 facade used for the PoET and seal keys. Public keys
//! travel in their canonical hex (compressed SEC1) form; signatures travel
//! base64-encoded. Signing is deterministic (RFC 6979 nonces), which is
//! relied upon by `create_wait_timer`'s seal-key draw and by the
//! active-timer signature comparison in `create_wait_certificate`.

use base64::Engine;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

const BASE64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// Generate a fresh secp256k1 private key from the system CSPRNG.
pub fn generate_privkey() -> SecretKey {
    let mut rng = rand::rngs::OsRng;
    SecretKey::new(&mut rng)
}

/// Derive the hex-encoded compressed public key for a private key.
pub fn generate_pubkey(privkey: &SecretKey) -> String {
    let secp = Secp256k1::signing_only();
    let pubkey = PublicKey::from_secret_key(&secp, privkey);
    hex::encode(pubkey.serialize())
}

/// Hex-encode a private key, for sealing it alongside its public key.
pub fn privkey_to_hex(privkey: &SecretKey) -> String {
    hex::encode(privkey.secret_bytes())
}

/// Restore a private key from its hex encoding.
pub fn privkey_from_hex(hex_str: &str) -> Option<SecretKey> {
    let bytes = hex::decode(hex_str).ok()?;
    SecretKey::from_slice(&bytes).ok()
}

/// Sign a message, returning a base64-encoded compact (64-byte) signature.
pub fn sign(msg: &[u8], privkey: &SecretKey) -> String {
    let secp = Secp256k1::signing_only();
    let digest = Sha256::digest(msg);
    let message = Message::from_digest_slice(&digest).expect("SHA-256 digest is 32 bytes");
    let signature = secp.sign_ecdsa(&message, privkey);
    BASE64.encode(signature.serialize_compact())
}

/// Verify a base64-encoded compact signature against a hex-encoded public
/// key. Never panics; any malformed input is simply not a valid signature.
pub fn verify(msg: &[u8], signature: &str, pubkey: &str) -> bool {
    let Ok(sig_bytes) = BASE64.decode(signature) else {
        return false;
    };
    let Ok(signature) = Signature::from_compact(&sig_bytes) else {
        return false;
    };
    let Ok(pubkey_bytes) = hex::decode(pubkey) else {
        return false;
    };
    let Ok(pubkey) = PublicKey::from_slice(&pubkey_bytes) else {
        return false;
    };
    let digest = Sha256::digest(msg);
    let Ok(message) = Message::from_digest_slice(&digest) else {
        return false;
    };
    let secp = Secp256k1::verification_only();
    secp.verify_ecdsa(&message, &signature, &pubkey).is_ok()
}
