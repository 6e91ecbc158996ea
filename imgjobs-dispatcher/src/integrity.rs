//! Payload integrity checks for submitted jobs.

use base64::Engine as _;
use md5::{Digest, Md5};
use serde::Deserialize;
use thiserror::Error;

/// Inbound submission body: an encoded payload plus its client-side checksum.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionEnvelope {
    /// Encoding of `content`; only "base64" is accepted.
    pub encoding: String,
    /// Hex MD5 digest of the decoded payload, as computed by the client.
    pub md5: String,
    pub content: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),
    #[error("payload is not valid {encoding}: {reason}")]
    DecodeFailure { encoding: String, reason: String },
    #[error("checksum mismatch: computed {computed}, submitted {submitted}")]
    ChecksumMismatch { computed: String, submitted: String },
}

/// Decode the submitted payload and check its MD5 digest against the
/// client-supplied value. Fails when the digests differ; returns the decoded
/// bytes so callers do not decode a second time.
pub fn verify(envelope: &SubmissionEnvelope) -> Result<Vec<u8>, IntegrityError> {
    let decoded = decode_payload(&envelope.encoding, &envelope.content)?;

    let computed = hex::encode(Md5::digest(&decoded));
    if computed != envelope.md5 {
        return Err(IntegrityError::ChecksumMismatch {
            computed,
            submitted: envelope.md5.clone(),
        });
    }
    Ok(decoded)
}

fn decode_payload(encoding: &str, content: &str) -> Result<Vec<u8>, IntegrityError> {
    match encoding {
        "base64" => base64::engine::general_purpose::STANDARD
            .decode(content)
            .map_err(|e| IntegrityError::DecodeFailure {
                encoding: encoding.to_string(),
                reason: e.to_string(),
            }),
        other => Err(IntegrityError::UnsupportedEncoding(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(encoding: &str, md5: &str, content: &str) -> SubmissionEnvelope {
        SubmissionEnvelope {
            encoding: encoding.into(),
            md5: md5.into(),
            content: content.into(),
        }
    }

    #[test]
    fn matching_digest_accepted() {
        // "MQo=" decodes to "1\n"
        let env = envelope("base64", "b026324c6904b2a9cb4b88d6d61c81d1", "MQo=");
        let decoded = verify(&env).expect("digest matches");
        assert_eq!(decoded, b"1\n");

        let env = envelope("base64", "2fc57d6f63a9ee7e2f21a26fa522e3b6", "MjIK");
        assert_eq!(verify(&env).expect("digest matches"), b"22\n");
    }

    #[test]
    fn mismatched_digest_rejected() {
        let env = envelope("base64", "2fc57d6f63a9ee7e2f21a26fa522e3b6", "MQo=");
        match verify(&env).unwrap_err() {
            IntegrityError::ChecksumMismatch {
                computed,
                submitted,
            } => {
                assert_eq!(computed, "b026324c6904b2a9cb4b88d6d61c81d1");
                assert_eq!(submitted, "2fc57d6f63a9ee7e2f21a26fa522e3b6");
            }
            other => panic!("expected checksum mismatch, got {other:?}"),
        }
    }

    #[test]
    fn same_pair_always_yields_same_verdict() {
        let good = envelope("base64", "b026324c6904b2a9cb4b88d6d61c81d1", "MQo=");
        let bad = envelope("base64", "ffffffffffffffffffffffffffffffff", "MQo=");
        for _ in 0..3 {
            assert!(verify(&good).is_ok());
            assert!(verify(&bad).is_err());
        }
    }

    #[test]
    fn unsupported_encoding_rejected() {
        let env = envelope("hex", "b026324c6904b2a9cb4b88d6d61c81d1", "310a");
        assert_eq!(
            verify(&env).unwrap_err(),
            IntegrityError::UnsupportedEncoding("hex".into())
        );
    }

    #[test]
    fn malformed_base64_rejected() {
        let env = envelope("base64", "b026324c6904b2a9cb4b88d6d61c81d1", "not//base64!!");
        assert!(matches!(
            verify(&env).unwrap_err(),
            IntegrityError::DecodeFailure { .. }
        ));
    }

    #[test]
    fn digest_comparison_is_exact() {
        // Uppercase hex is not normalized; the comparison is byte-for-byte.
        let env = envelope("base64", "B026324C6904B2A9CB4B88D6D61C81D1", "MQo=");
        assert!(matches!(
            verify(&env).unwrap_err(),
            IntegrityError::ChecksumMismatch { .. }
        ));
    }
}
