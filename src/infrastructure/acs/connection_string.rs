//! Communication Services connection string
//!
//! `endpoint=https://<resource>.communication.azure.com/;accesskey=<base64>`

use crate::domain::shared::{DomainError, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Url;

#[derive(Debug, Clone)]
pub struct ConnectionString {
    endpoint: Url,
    access_key: Vec<u8>,
}

impl ConnectionString {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut endpoint = None;
        let mut access_key = None;

        for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = part.split_once('=').ok_or_else(|| {
                DomainError::Configuration("malformed connection string segment".to_string())
            })?;
            match name.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(value.trim().to_string()),
                "accesskey" => access_key = Some(value.trim().to_string()),
                _ => {}
            }
        }

        let endpoint = endpoint
            .filter(|e| !e.is_empty())
            .ok_or_else(|| DomainError::Configuration("connection string has no endpoint".to_string()))?;
        let access_key = access_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| DomainError::Configuration("connection string has no accesskey".to_string()))?;

        let endpoint = Url::parse(&endpoint).map_err(|e| {
            DomainError::Configuration(format!("invalid endpoint '{}': {}", endpoint, e))
        })?;
        if endpoint.host_str().is_none() {
            return Err(DomainError::Configuration(format!(
                "endpoint '{}' has no host",
                endpoint
            )));
        }

        let access_key = STANDARD
            .decode(access_key.as_bytes())
            .map_err(|e| DomainError::Configuration(format!("accesskey is not base64: {}", e)))?;

        Ok(Self {
            endpoint,
            access_key,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn access_key(&self) -> &[u8] {
        &self.access_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let cs = ConnectionString::parse(
            "endpoint=https://contoso.communication.azure.com/;accesskey=c2VjcmV0",
        )
        .unwrap();
        assert_eq!(cs.endpoint().host_str(), Some("contoso.communication.azure.com"));
        assert_eq!(cs.access_key(), b"secret");
    }

    #[test]
    fn test_parse_is_case_insensitive_and_tolerates_trailing_semicolon() {
        let cs = ConnectionString::parse(
            "Endpoint=https://contoso.communication.azure.com/;AccessKey=c2VjcmV0;",
        )
        .unwrap();
        assert_eq!(cs.access_key(), b"secret");
    }

    #[test]
    fn test_missing_parts() {
        assert!(ConnectionString::parse("").is_err());
        assert!(ConnectionString::parse("endpoint=https://x.example.com/").is_err());
        assert!(ConnectionString::parse("accesskey=c2VjcmV0").is_err());
    }

    #[test]
    fn test_bad_key() {
        let err = ConnectionString::parse("endpoint=https://x.example.com/;accesskey=***")
            .unwrap_err();
        assert!(matches!(err, DomainError::Configuration(_)));
    }
}
