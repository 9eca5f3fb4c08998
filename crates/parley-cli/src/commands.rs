//! Command implementations
//!
//! Each command returns the text to print so it can be tested directly.

use anyhow::{bail, Context};
use parley_crypto::{sha256_hex, AuthorityKey, AuthorityKeypair, RefundVerifier, SignedRefund};
use parley_types::{Amount, RefundMessage};
use serde_json::json;

pub fn keygen() -> anyhow::Result<String> {
    let keypair = AuthorityKeypair::generate();
    let output = json!({
        "public_key": keypair.public_key().to_hex(),
        "seed_hex": keypair.seed_hex(),
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

pub fn sign_refund(
    seed_hex: &str,
    receiver: &str,
    amount: &str,
    conversation: &str,
) -> anyhow::Result<String> {
    if receiver.is_empty() || conversation.is_empty() {
        bail!("receiver and conversation must not be empty");
    }
    let keypair = AuthorityKeypair::from_seed_hex(seed_hex).context("invalid authority seed")?;
    let amount = Amount::parse_decimal(amount).context("invalid refund amount")?;

    let signed = keypair.sign_refund(&RefundMessage::new(receiver, amount, conversation));
    Ok(serde_json::to_string(&signed)?)
}

pub fn verify_refund(public_key: &str, signed: &str) -> anyhow::Result<String> {
    let key = AuthorityKey::from_hex(public_key).context("invalid authority public key")?;
    let signed: SignedRefund =
        serde_json::from_str(signed.trim()).context("signed refund is not valid JSON")?;

    let digest = RefundVerifier::new(key)
        .authenticate(&signed.refund_message, &signed.signature)
        .context("signature does not verify")?;
    let message =
        RefundMessage::parse(&signed.refund_message).context("refund message is malformed")?;

    let output = json!({
        "valid": true,
        "digest": hex::encode(digest),
        "refund": message,
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

pub fn digest(message: &str) -> String {
    sha256_hex(message.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = "0707070707070707070707070707070707070707070707070707070707070707";

    fn public_key() -> String {
        AuthorityKeypair::from_seed_hex(SEED)
            .unwrap()
            .public_key()
            .to_hex()
    }

    #[test]
    fn test_sign_then_verify() {
        let signed = sign_refund(SEED, "alice", "200000000", "c1").unwrap();
        let parsed: SignedRefund = serde_json::from_str(&signed).unwrap();
        assert_eq!(
            parsed.refund_message,
            r#"{"receiver_id":"alice","refund_amount":"200000000","conversation_id":"c1"}"#
        );
        assert_eq!(parsed.signature.len(), 64);

        let report = verify_refund(&public_key(), &signed).unwrap();
        assert!(report.contains("\"valid\": true"));
    }

    #[test]
    fn test_verify_rejects_other_key() {
        let signed = sign_refund(SEED, "alice", "1", "c1").unwrap();
        let other = AuthorityKeypair::generate().public_key().to_hex();
        assert!(verify_refund(&other, &signed).is_err());
    }

    #[test]
    fn test_sign_rejects_bad_input() {
        assert!(sign_refund(SEED, "alice", "-5", "c1").is_err());
        assert!(sign_refund(SEED, "", "5", "c1").is_err());
        assert!(sign_refund("abcd", "alice", "5", "c1").is_err());
    }

    #[test]
    fn test_digest_matches_signed_bytes() {
        let signed: SignedRefund =
            serde_json::from_str(&sign_refund(SEED, "alice", "1", "c1").unwrap()).unwrap();
        let report = verify_refund(&public_key(), &serde_json::to_string(&signed).unwrap()).unwrap();
        assert!(report.contains(&digest(&signed.refund_message)));
    }

    #[test]
    fn test_keygen_outputs_usable_seed() {
        let output: serde_json::Value = serde_json::from_str(&keygen().unwrap()).unwrap();
        let seed = output["seed_hex"].as_str().unwrap();
        assert!(sign_refund(seed, "alice", "1", "c1").is_ok());
    }
}
