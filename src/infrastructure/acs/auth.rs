//! HMAC-SHA256 request signing for the Communication Services REST API

use crate::domain::shared::{DomainError, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Headers attached to every signed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    /// `x-ms-date`
    pub date: String,
    /// `x-ms-content-sha256`
    pub content_hash: String,
    /// `Authorization`
    pub authorization: String,
}

#[derive(Clone)]
pub struct HmacSigner {
    key: Vec<u8>,
}

impl HmacSigner {
    pub fn new(key: &[u8]) -> Self {
        Self { key: key.to_vec() }
    }

    /// Base64 SHA-256 of the request body
    pub fn content_hash(body: &[u8]) -> String {
        STANDARD.encode(Sha256::digest(body))
    }

    /// RFC 1123 date as the service expects it
    pub fn format_date(now: DateTime<Utc>) -> String {
        now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
    }

    pub fn sign(
        &self,
        method: &str,
        url: &Url,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<SignedHeaders> {
        let host = authority(url)?;
        let path_and_query = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };

        let date = Self::format_date(now);
        let content_hash = Self::content_hash(body);
        let string_to_sign = format!(
            "{}\n{}\n{};{};{}",
            method.to_ascii_uppercase(),
            path_and_query,
            date,
            host,
            content_hash
        );

        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| DomainError::Configuration(format!("invalid access key: {}", e)))?;
        mac.update(string_to_sign.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        Ok(SignedHeaders {
            date,
            content_hash,
            authorization: format!(
                "HMAC-SHA256 SignedHeaders=x-ms-date;host;x-ms-content-sha256&Signature={}",
                signature
            ),
        })
    }
}

impl std::fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSigner").finish_non_exhaustive()
    }
}

fn authority(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| DomainError::Internal(format!("request URL '{}' has no host", url)))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}
