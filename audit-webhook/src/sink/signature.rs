//! AWS Signature Version 4 request signing.
//!
//! Only what the CloudWatch Logs JSON protocol needs: `POST /` with an empty
//! query string and a fixed set of signed headers.
//! Reference: https://docs.aws.amazon.com/IAM/latest/UserGuide/reference_sigv-create-signed-request.html

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// JSON protocol content type used by CloudWatch Logs.
pub const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Static AWS credentials.
#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Where and what is being signed.
pub struct SigningParams<'a> {
    pub credentials: &'a Credentials,
    pub region: &'a str,
    pub service: &'a str,
    /// Value of the `Host` header, including a non-default port
    pub host: &'a str,
    /// Value of the `X-Amz-Target` header
    pub target: &'a str,
}

/// Headers to attach to a signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub amz_date: String,
    pub authorization: String,
}

/// Sign a `POST /` request carrying `body`.
pub fn sign_request(params: &SigningParams<'_>, body: &[u8], now: DateTime<Utc>) -> SignedHeaders {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();
    let scope = format!("{}/{}/{}/aws4_request", date, params.region, params.service);

    let (canonical, signed_headers) = canonical_request(params, &amz_date, body);

    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        hex::encode(Sha256::digest(canonical.as_bytes()))
    );

    let key = derive_signing_key(
        &params.credentials.secret_access_key,
        &date,
        params.region,
        params.service,
    );
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

    SignedHeaders {
        authorization: format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, params.credentials.access_key_id, scope, signed_headers, signature
        ),
        amz_date,
    }
}

/// Build the canonical request and the matching `SignedHeaders` list.
fn canonical_request(params: &SigningParams<'_>, amz_date: &str, body: &[u8]) -> (String, String) {
    // Sorted by lowercase header name
    let mut headers = vec![
        ("content-type", CONTENT_TYPE),
        ("host", params.host),
        ("x-amz-date", amz_date),
    ];
    if let Some(token) = params.credentials.session_token.as_deref() {
        headers.push(("x-amz-security-token", token));
    }
    headers.push(("x-amz-target", params.target));

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value.trim()))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";");

    let canonical = format!(
        "POST\n/\n\n{}\n{}\n{}",
        canonical_headers,
        signed_headers,
        hex::encode(Sha256::digest(body))
    );

    (canonical, signed_headers)
}

/// Derive the per-day, per-region, per-service signing key.
fn derive_signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
