//! HMAC-SHA256 token signing with an app's key and secret

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signer bound to one app's credentials
///
/// Signatures are lowercase hex HMAC-SHA256 digests. Auth strings sent by
/// clients have the form `"{key}:{signature}"`.
#[derive(Clone)]
pub struct Token {
    key: String,
    secret: String,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl Token {
    #[must_use]
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    fn mac(&self) -> HmacSha256 {
        <HmacSha256 as Mac>::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts any key length")
    }

    /// Hex signature of `input`
    #[must_use]
    pub fn sign(&self, input: &str) -> String {
        let mut mac = self.mac();
        mac.update(input.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time check of a hex signature
    #[must_use]
    pub fn verify(&self, input: &str, signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        let mut mac = self.mac();
        mac.update(input.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }

    /// `"{key}:{signature}"` for `input`
    #[must_use]
    pub fn auth_string(&self, input: &str) -> String {
        format!("{}:{}", self.key, self.sign(input))
    }

    /// Check an `auth` value of the form `"{key}:{signature}"`
    #[must_use]
    pub fn verify_auth_string(&self, input: &str, auth: &str) -> bool {
        match auth.split_once(':') {
            Some((key, signature)) => key == self.key && self.verify(input, signature),
            None => false,
        }
    }
}
