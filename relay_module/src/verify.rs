use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;

const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Verify a webhook subscription request.
/// Returns the challenge token if verification succeeds.
pub fn verify_subscription(
    expected_token: &str,
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
) -> Result<String, &'static str> {
    if mode != Some("subscribe") {
        return Err("invalid_mode");
    }

    let provided_token = token.ok_or("missing_token")?;
    if provided_token != expected_token {
        return Err("token_mismatch");
    }

    challenge.map(|c| c.to_string()).ok_or("missing_challenge")
}

/// Check `X-Hub-Signature-256` against the app secret. Without a secret
/// every request is accepted.
pub fn verify_signature(
    app_secret: Option<&str>,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), &'static str> {
    let Some(secret) = app_secret.filter(|value| !value.trim().is_empty()) else {
        return Ok(());
    };
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or("missing_signature")?;
    let digest = signature
        .strip_prefix("sha256=")
        .ok_or("invalid_signature")?;
    let expected = hex::decode(digest).map_err(|_| "invalid_signature")?;

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| "bad_secret")?;
    mac.update(body);
    mac.verify_slice(&expected).map_err(|_| "invalid_signature")
}
