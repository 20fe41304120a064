//! Request signing for the private GMO Coin API

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::GatewayError;

type HmacSha256 = Hmac<Sha256>;

fn hmac_hex(secret: &str, message: &str) -> Result<String, GatewayError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| GatewayError::Authentication(format!("Failed to create HMAC: {}", e)))?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Hex HMAC-SHA256 over `timestamp + METHOD + path + body`
///
/// `timestamp` is in milliseconds; `path` excludes the host and the
/// `/private` prefix, and `body` is empty for GET requests.
pub fn sign_request(
    secret: &str,
    timestamp: i64,
    method: &str,
    path: &str,
    body: &str,
) -> Result<String, GatewayError> {
    let message = format!("{}{}{}{}", timestamp, method.to_uppercase(), path, body);
    hmac_hex(secret, &message)
}

#[derive(Debug, Clone)]
pub struct AuthHeaders {
    pub api_key: String,
    pub timestamp: i64,
    pub signature: String,
}

impl AuthHeaders {
    /// Sign a request stamped with the current time
    pub fn generate(
        api_key: &str,
        secret: &str,
        method: &str,
        path: &str,
        body: &str,
    ) -> Result<Self, GatewayError> {
        if api_key.is_empty() || secret.is_empty() {
            return Err(GatewayError::Authentication(
                "API key and secret are required for private endpoints".to_string(),
            ));
        }
        let timestamp = chrono::Utc::now().timestamp_millis();
        let signature = sign_request(secret, timestamp, method, path, body)?;
        Ok(Self {
            api_key: api_key.to_string(),
            timestamp,
            signature,
        })
    }

    pub fn apply_to_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("API-KEY", &self.api_key)
            .header("API-TIMESTAMP", self.timestamp.to_string())
            .header("API-SIGN", &self.signature)
    }
}
