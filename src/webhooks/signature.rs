//! GitHub webhook signature verification using HMAC-SHA256.
//!
//! GitHub signs webhook payloads using HMAC-SHA256 with a shared secret.
//! The signature is provided in the `X-Hub-Signature-256` header as `sha256=<hex>`.
//! Invalid signatures are rejected before the payload is parsed.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// The shared secret configured on the GitHub webhook.
#[derive(Clone, PartialEq, Eq)]
pub struct WebhookSecret(Vec<u8>);

impl fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WebhookSecret(..)")
    }
}

impl From<String> for WebhookSecret {
    fn from(secret: String) -> Self {
        WebhookSecret(secret.into_bytes())
    }
}

impl From<&[u8]> for WebhookSecret {
    fn from(secret: &[u8]) -> Self {
        WebhookSecret(secret.to_vec())
    }
}

impl WebhookSecret {
    fn mac(&self, payload: &[u8]) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(&self.0).expect("HMAC can take key of any size");
        mac.update(payload);
        mac
    }

    /// Computes the `X-Hub-Signature-256` header value for `payload`.
    ///
    /// ```
    /// use auto_merge::webhooks::WebhookSecret;
    ///
    /// let secret = WebhookSecret::from("It's a Secret to Everybody".to_string());
    /// assert_eq!(
    ///     secret.sign(b"Hello, World!"),
    ///     "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17"
    /// );
    /// ```
    pub fn sign(&self, payload: &[u8]) -> String {
        format!("sha256={}", hex::encode(self.mac(payload).finalize().into_bytes()))
    }

    /// Verifies an `X-Hub-Signature-256` header against `payload`.
    ///
    /// Malformed headers (missing `sha256=` prefix, invalid hex) fail
    /// verification. The comparison is constant-time.
    pub fn verify(&self, payload: &[u8], signature_header: &str) -> bool {
        let Some(signature) = parse_signature_header(signature_header) else {
            return false;
        };
        self.mac(payload).verify_slice(&signature).is_ok()
    }
}

/// Decodes the hex digest of a `sha256=<hex>` header.
fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    hex::decode(header.strip_prefix("sha256=")?).ok()
}
