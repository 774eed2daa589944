//! Keyed integrity stamps over ordered field tuples.

use derive_more::{Display, Error};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::instrument;

type HmacSha256 = Hmac<Sha256>;

/// Server-only signing secret, never transmitted to clients.
///
/// Rotating the secret invalidates every outstanding stateless link and
/// every issued capability token.
#[derive(Clone)]
pub struct SigningSecret(Vec<u8>);

impl SigningSecret {
    /// Wraps raw secret material.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError`] if the material is shorter than 16 bytes.
    pub fn new(material: impl Into<Vec<u8>>) -> Result<Self, SecretError> {
        let material = material.into();
        if material.len() < 16 {
            return Err(SecretError::new(format!(
                "secret must be at least 16 bytes, got {}",
                material.len()
            )));
        }
        Ok(Self(material))
    }

    fn bytes(&self) -> &[u8] {
        &self.0
    }
}

// Keep the key out of logs.
impl std::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SigningSecret").field(&"<redacted>").finish()
    }
}

/// Signing secret rejected at construction.
#[derive(Debug, Clone, Display, Error)]
#[display("Secret error: {} at {}:{}", message, file, line)]
pub struct SecretError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl SecretError {
    /// Creates a new secret error with caller location tracking.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

/// Computes and verifies keyed digests over ordered field tuples.
///
/// Each stamper is bound to a domain label mixed into the MAC ahead of
/// the fields, so digests from one domain (game-state stamps) never
/// verify in another (capability tokens).
#[derive(Debug, Clone)]
pub struct Stamper {
    secret: SigningSecret,
    domain: &'static str,
}

impl Stamper {
    /// Creates a stamper bound to a domain label.
    pub fn new(secret: SigningSecret, domain: &'static str) -> Self {
        Self { secret, domain }
    }

    fn mac(&self, fields: &[&str]) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(self.secret.bytes())
            .expect("HMAC accepts keys of any length");
        // Length-prefix every chunk: field order and boundaries are part
        // of the digest, so swapping or splitting fields changes it.
        for chunk in std::iter::once(self.domain).chain(fields.iter().copied()) {
            mac.update(&(chunk.len() as u64).to_be_bytes());
            mac.update(chunk.as_bytes());
        }
        mac
    }

    /// Computes the hex digest over the fields in the given order.
    #[instrument(skip_all, fields(domain = self.domain, fields = fields.len()))]
    pub fn stamp(&self, fields: &[&str]) -> String {
        hex::encode(self.mac(fields).finalize().into_bytes())
    }

    /// Verifies a hex digest against the fields in the given order.
    ///
    /// Runs in time independent of where the first mismatching byte
    /// occurs (`Mac::verify_slice` is constant-time).
    #[instrument(skip_all, fields(domain = self.domain))]
    pub fn verify(&self, digest: &str, fields: &[&str]) -> bool {
        let Ok(expected) = hex::decode(digest) else {
            return false;
        };
        self.mac(fields).verify_slice(&expected).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamper(domain: &'static str) -> Stamper {
        let secret = SigningSecret::new(*b"0123456789abcdef0123456789abcdef").unwrap();
        Stamper::new(secret, domain)
    }

    #[test]
    fn stamp_is_deterministic() {
        let s = stamper("state");
        let a = s.stamp(&["game", "position"]);
        let b = s.stamp(&["game", "position"]);
        assert_eq!(a, b);
        assert!(s.verify(&a, &["game", "position"]));
    }

    #[test]
    fn stamp_rejects_reordered_fields() {
        let s = stamper("state");
        let digest = s.stamp(&["aa", "bb"]);
        assert!(!s.verify(&digest, &["bb", "aa"]));
    }

    #[test]
    fn stamp_rejects_shifted_field_boundaries() {
        let s = stamper("state");
        let digest = s.stamp(&["ab", "c"]);
        assert!(!s.verify(&digest, &["a", "bc"]));
    }

    #[test]
    fn single_character_flip_fails_verification() {
        let s = stamper("state");
        let digest = s.stamp(&["game-id", "position"]);

        // Flip one character of a stamped field.
        assert!(!s.verify(&digest, &["game-id", "pOsition"]));

        // Flip one character of the digest itself.
        let mut altered = digest.clone().into_bytes();
        altered[0] = if altered[0] == b'0' { b'1' } else { b'0' };
        let altered = String::from_utf8(altered).unwrap();
        assert!(!s.verify(&altered, &["game-id", "position"]));
    }

    #[test]
    fn domains_are_not_interchangeable() {
        let state = stamper("state");
        let capability = stamper("capability");
        let digest = state.stamp(&["game", "white"]);
        assert!(!capability.verify(&digest, &["game", "white"]));
    }

    #[test]
    fn non_hex_digest_fails_closed() {
        let s = stamper("state");
        assert!(!s.verify("not hex!", &["field"]));
    }

    #[test]
    fn short_secret_is_rejected() {
        assert!(SigningSecret::new(*b"too-short").is_err());
    }

    #[test]
    fn secret_debug_is_redacted() {
        let secret = SigningSecret::new(*b"0123456789abcdef").unwrap();
        assert!(!format!("{secret:?}").contains("0123"));
    }
}
