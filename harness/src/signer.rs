//! Deterministic Ed25519 message signing.
//!
//! The node under test authenticates transactions by verifying the Ed25519
//! signature of the `message` field against the `sender` address, so the
//! harness must produce byte-exact, deterministic signatures.

use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};

use crate::error::SigningError;

/// Byte length of an Ed25519 seed.
pub const SEED_LEN: usize = 32;
/// Byte length of the seed || public-key keypair form.
pub const KEYPAIR_LEN: usize = 64;

/// Signs the UTF-8 bytes of `message` and returns the signature as 128
/// lowercase hex characters.
///
/// Two private key encodings are accepted, both hex:
/// - 32 bytes: a bare Ed25519 seed.
/// - 64 bytes: the seed followed by the public key, the form the node's own
///   key material uses. The trailing half must match the key derived from
///   the seed.
///
/// Ed25519 signing is deterministic, so identical inputs always produce an
/// identical signature.
pub fn sign(private_key_hex: &str, message: &str) -> Result<String, SigningError> {
    let key = decode_signing_key(private_key_hex)?;
    let signature = key.sign(message.as_bytes());
    Ok(hex::encode(signature.to_bytes()))
}

/// Verifies a hex signature over the UTF-8 bytes of `message` against a
/// 32-byte hex public key. Returns `Ok(false)` for a well-formed but invalid
/// signature; decoding failures are errors.
pub fn verify(
    public_key_hex: &str,
    message: &str,
    signature_hex: &str,
) -> Result<bool, SigningError> {
    let key = decode_verifying_key(public_key_hex)?;

    let sig_bytes = hex::decode(signature_hex).map_err(|err| {
        SigningError::InvalidSignatureMaterial(format!("signature is not valid hex: {err}"))
    })?;
    let sig_bytes: [u8; KEYPAIR_LEN] = sig_bytes.try_into().map_err(|bytes: Vec<u8>| {
        SigningError::InvalidSignatureMaterial(format!(
            "expected a {KEYPAIR_LEN}-byte signature, got {} bytes",
            bytes.len()
        ))
    })?;
    let signature = Signature::from_bytes(&sig_bytes);

    Ok(key.verify(message.as_bytes(), &signature).is_ok())
}

/// Returns the hex public key corresponding to a private key in either
/// accepted encoding.
pub fn derive_public_key(private_key_hex: &str) -> Result<String, SigningError> {
    let key = decode_signing_key(private_key_hex)?;
    Ok(hex::encode(key.verifying_key().as_bytes()))
}

/// Generates a fresh keypair, returned as `(private, public)` hex strings.
/// The private key is in the 64-byte seed || public-key form.
pub fn generate_keypair() -> (String, String) {
    let key = SigningKey::generate(&mut rand::thread_rng());
    (
        hex::encode(key.to_keypair_bytes()),
        hex::encode(key.verifying_key().as_bytes()),
    )
}

fn decode_signing_key(private_key_hex: &str) -> Result<SigningKey, SigningError> {
    let bytes = hex::decode(private_key_hex).map_err(|err| {
        SigningError::InvalidKeyEncoding(format!("private key is not valid hex: {err}"))
    })?;

    match bytes.len() {
        SEED_LEN => {
            let mut seed = [0u8; SEED_LEN];
            seed.copy_from_slice(&bytes);
            Ok(SigningKey::from_bytes(&seed))
        }
        KEYPAIR_LEN => {
            let mut pair = [0u8; KEYPAIR_LEN];
            pair.copy_from_slice(&bytes);
            SigningKey::from_keypair_bytes(&pair).map_err(|err| {
                SigningError::InvalidKeyEncoding(format!(
                    "keypair public half does not match its seed: {err}"
                ))
            })
        }
        n => Err(SigningError::InvalidKeyEncoding(format!(
            "expected a {SEED_LEN}-byte seed or {KEYPAIR_LEN}-byte keypair, got {n} bytes"
        ))),
    }
}

fn decode_verifying_key(public_key_hex: &str) -> Result<VerifyingKey, SigningError> {
    let bytes = hex::decode(public_key_hex).map_err(|err| {
        SigningError::InvalidSignatureMaterial(format!("public key is not valid hex: {err}"))
    })?;
    let bytes: [u8; SEED_LEN] = bytes.try_into().map_err(|bytes: Vec<u8>| {
        SigningError::InvalidSignatureMaterial(format!(
            "expected a {SEED_LEN}-byte public key, got {} bytes",
            bytes.len()
        ))
    })?;
    VerifyingKey::from_bytes(&bytes).map_err(|err| {
        SigningError::InvalidSignatureMaterial(format!("public key is not a valid point: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EXAMPLE_SENDER, EXAMPLE_SIGNING_KEY};

    #[test]
    fn signing_is_deterministic() {
        let first = sign(EXAMPLE_SIGNING_KEY, "hello ledger").unwrap();
        let second = sign(EXAMPLE_SIGNING_KEY, "hello ledger").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 128);
    }

    #[test]
    fn signature_verifies_against_derived_public_key() {
        let (private, public) = generate_keypair();
        let signature = sign(&private, "a message").unwrap();
        assert_eq!(derive_public_key(&private).unwrap(), public);
        assert!(verify(&public, "a message", &signature).unwrap());
    }

    #[test]
    fn seed_and_keypair_forms_produce_the_same_signature() {
        let seed = &EXAMPLE_SIGNING_KEY[..SEED_LEN * 2];
        assert_eq!(
            sign(seed, "same message").unwrap(),
            sign(EXAMPLE_SIGNING_KEY, "same message").unwrap()
        );
    }

    #[test]
    fn fixture_key_matches_fixture_sender() {
        assert_eq!(derive_public_key(EXAMPLE_SIGNING_KEY).unwrap(), EXAMPLE_SENDER);
    }

    #[test]
    fn altered_message_fails_verification() {
        let signature = sign(EXAMPLE_SIGNING_KEY, "original").unwrap();
        assert!(verify(EXAMPLE_SENDER, "original", &signature).unwrap());
        assert!(!verify(EXAMPLE_SENDER, "originaL", &signature).unwrap());
    }

    #[test]
    fn altered_signature_fails_verification() {
        let signature = sign(EXAMPLE_SIGNING_KEY, "original").unwrap();
        let flipped = if signature.starts_with('0') {
            format!("1{}", &signature[1..])
        } else {
            format!("0{}", &signature[1..])
        };
        assert!(!verify(EXAMPLE_SENDER, "original", &flipped).unwrap());
    }

    #[test]
    fn rejects_non_hex_key() {
        let err = sign("zz", "m").unwrap_err();
        assert!(matches!(err, SigningError::InvalidKeyEncoding(_)));
    }

    #[test]
    fn rejects_wrong_length_key() {
        let err = sign("deadbeef", "m").unwrap_err();
        assert!(matches!(err, SigningError::InvalidKeyEncoding(_)));
    }

    #[test]
    fn rejects_mismatched_keypair_halves() {
        // Valid seed, but the public half belongs to a different key.
        let (other_private, _) = generate_keypair();
        let mismatched = format!(
            "{}{}",
            &EXAMPLE_SIGNING_KEY[..SEED_LEN * 2],
            &other_private[SEED_LEN * 2..]
        );
        let err = sign(&mismatched, "m").unwrap_err();
        assert!(matches!(err, SigningError::InvalidKeyEncoding(_)));
    }
}
