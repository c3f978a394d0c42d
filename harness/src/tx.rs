//! Transaction construction and the node's wire format.

use serde::{Deserialize, Serialize};

use crate::error::SigningError;
use crate::signer;

/// Hex character length of a node address (a 32-byte public key).
pub const ADDRESS_LEN: usize = 64;

/// A signed transaction in the exact JSON shape the node accepts on
/// `POST /transactions/new`.
///
/// Immutable once built: the signature covers the UTF-8 bytes of `message`
/// and the node verifies it against `sender`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender address (hex public key).
    pub sender: String,
    /// Receiver address (hex public key).
    pub receiver: String,
    /// Free-form message payload.
    pub message: String,
    /// Hex Ed25519 signature over `message`.
    pub signature: String,
    /// Whether this transaction is a "like" of another post.
    pub is_like: bool,
    /// Post targeted by a like; empty for plain transactions.
    pub target_post_id: String,
}

/// Builds submittable transactions for a fixed sender / receiver / key.
///
/// Pure apart from signing, which is itself deterministic; no network or
/// process side effects.
#[derive(Debug, Clone)]
pub struct TransactionFactory {
    sender: String,
    receiver: String,
    signing_key: String,
}

impl TransactionFactory {
    /// Creates a factory. The signing key must be the private counterpart of
    /// `sender`, since the node verifies signatures against the sender
    /// address.
    pub fn new(sender: impl Into<String>, receiver: impl Into<String>, signing_key: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            signing_key: signing_key.into(),
        }
    }

    /// Builds and signs a transaction carrying `message`.
    ///
    /// A signing failure aborts the build; no transaction with an
    /// unverifiable signature is ever produced.
    pub fn build(
        &self,
        message: &str,
        is_like: bool,
        target_post_id: &str,
    ) -> Result<Transaction, SigningError> {
        let signature = signer::sign(&self.signing_key, message)?;
        Ok(Transaction {
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
            message: message.to_string(),
            signature,
            is_like,
            target_post_id: target_post_id.to_string(),
        })
    }
}

/// Whether `address` is a well-formed node address: exactly 64 hex
/// characters. The node rejects anything else before validating signatures.
pub fn is_valid_address(address: &str) -> bool {
    address.len() == ADDRESS_LEN && address.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EXAMPLE_RECEIVER, EXAMPLE_SENDER, EXAMPLE_SIGNING_KEY};

    fn factory() -> TransactionFactory {
        TransactionFactory::new(EXAMPLE_SENDER, EXAMPLE_RECEIVER, EXAMPLE_SIGNING_KEY)
    }

    #[test]
    fn built_transaction_verifies_against_sender() {
        let tx = factory().build("post body", false, "").unwrap();
        assert!(signer::verify(&tx.sender, &tx.message, &tx.signature).unwrap());
    }

    #[test]
    fn wire_format_uses_node_field_names() {
        let tx = factory().build("m", true, "post-7").unwrap();
        let value = serde_json::to_value(&tx).unwrap();
        let object = value.as_object().unwrap();

        let mut keys: Vec<_> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            ["is_like", "message", "receiver", "sender", "signature", "target_post_id"]
        );
        assert_eq!(object["is_like"], serde_json::json!(true));
        assert_eq!(object["target_post_id"], serde_json::json!("post-7"));
    }

    #[test]
    fn bad_signing_key_aborts_the_build() {
        let factory = TransactionFactory::new(EXAMPLE_SENDER, EXAMPLE_RECEIVER, "not-hex");
        assert!(factory.build("m", false, "").is_err());
    }

    #[test]
    fn address_validation() {
        assert!(is_valid_address(EXAMPLE_SENDER));
        assert!(!is_valid_address("abc"));
        assert!(!is_valid_address(&"g".repeat(ADDRESS_LEN)));
    }
}
