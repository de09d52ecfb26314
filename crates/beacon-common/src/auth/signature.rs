//! REST request signatures
//!
//! The string to sign is `"{METHOD}\n{path}\n{params}"` where `params` are the
//! query parameters sorted by key and joined as `k=v` pairs with `&`.
//! `auth_signature` never takes part in the signature, `auth_key` always does,
//! and `body_md5` is computed from the body whenever one is present.

use std::collections::{BTreeMap, HashMap};

use md5::{Digest, Md5};

use super::Token;

const EXCLUDED_PARAMS: [&str; 4] = ["auth_signature", "appId", "appKey", "channelName"];

/// Lowercase hex MD5 of a request body
#[must_use]
pub fn body_md5(body: &[u8]) -> String {
    hex::encode(Md5::digest(body))
}

/// Build the canonical string to sign
#[must_use]
pub fn string_to_sign(method: &str, path: &str, params: &BTreeMap<String, String>) -> String {
    let query = params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}\n{path}\n{query}", method.to_uppercase())
}

fn signed_params(
    token: &Token,
    query: &HashMap<String, String>,
    body: &[u8],
) -> BTreeMap<String, String> {
    let mut params: BTreeMap<String, String> = query
        .iter()
        .filter(|(key, _)| !EXCLUDED_PARAMS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    params.insert("auth_key".to_string(), token.key().to_string());
    if !body.is_empty() {
        params.insert("body_md5".to_string(), body_md5(body));
    }
    params
}

/// Signature a client should send for this request
#[must_use]
pub fn sign_request(
    token: &Token,
    method: &str,
    path: &str,
    query: &HashMap<String, String>,
    body: &[u8],
) -> String {
    let params = signed_params(token, query, body);
    token.sign(&string_to_sign(method, path, &params))
}

/// Check the `auth_signature` query parameter of a request
#[must_use]
pub fn verify_request(
    token: &Token,
    method: &str,
    path: &str,
    query: &HashMap<String, String>,
    body: &[u8],
) -> bool {
    let Some(signature) = query.get("auth_signature") else {
        return false;
    };
    let params = signed_params(token, query, body);
    token.verify(&string_to_sign(method, path, &params), signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_string_to_sign_sorts_params() {
        let mut params = BTreeMap::new();
        params.insert("b".to_string(), "2".to_string());
        params.insert("a".to_string(), "1".to_string());
        assert_eq!(
            string_to_sign("post", "/apps/1/events", &params),
            "POST\n/apps/1/events\na=1&b=2"
        );
    }

    #[test]
    fn test_body_md5() {
        assert_eq!(body_md5(b""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_sign_and_verify_request() {
        let token = Token::new("app-key", "app-secret");
        let body = br#"{"name":"greet","channel":"test","data":"{}"}"#;
        let mut params = query(&[("auth_timestamp", "1700000000"), ("auth_version", "1.0")]);

        let signature = sign_request(&token, "POST", "/apps/app-id/events", &params, body);
        params.insert("auth_signature".to_string(), signature);

        assert!(verify_request(&token, "POST", "/apps/app-id/events", &params, body));
        assert!(!verify_request(&token, "POST", "/apps/app-id/events", &params, b"{}"));
        assert!(!verify_request(&token, "GET", "/apps/app-id/events", &params, body));
    }

    #[test]
    fn test_verify_requires_signature() {
        let token = Token::new("app-key", "app-secret");
        assert!(!verify_request(&token, "POST", "/apps/1/events", &HashMap::new(), b""));
    }

    #[test]
    fn test_client_supplied_auth_key_is_overridden() {
        let token = Token::new("app-key", "app-secret");
        let honest = sign_request(&token, "POST", "/p", &query(&[]), b"");
        let spoofed = sign_request(&token, "POST", "/p", &query(&[("auth_key", "evil")]), b"");
        assert_eq!(honest, spoofed);
    }
}
