//! Caller authentication against the configured allow-list.
//!
//! # Check Order
//! ```text
//! table empty           → accept (pass-through record)
//! secretKey empty       → Authentication
//! secretKey unknown     → Authentication
//! language mismatch     → Authorization (skipped for "*")
//! ip mismatch           → Authorization (skipped for "*")
//! ```
//!
//! Identity is checked before attributes, so a wrong key is always reported
//! as a key failure even when language and IP are wrong too.

use std::collections::HashMap;

use crate::codec::envelope::WILDCARD;
use crate::codec::{ClientRecord, Credentials};
use crate::server::error::RequestError;

#[derive(Debug, Clone, Default)]
pub struct ClientTable {
    records: HashMap<String, ClientRecord>,
}

impl ClientTable {
    /// Later records with the same key replace earlier ones.
    pub fn new(records: impl IntoIterator<Item = ClientRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|record| (record.secret_key.clone(), record))
                .collect(),
        }
    }

    /// No records configured: every caller is accepted.
    pub fn is_open(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn authenticate(&self, credentials: &Credentials) -> Result<ClientRecord, RequestError> {
        if self.is_open() {
            return Ok(credentials.clone());
        }

        if credentials.secret_key.is_empty() {
            return Err(RequestError::Authentication(format!(
                "Authentication failed: client at ip={} did not provide a secretKey",
                credentials.ip
            )));
        }

        let record = self.records.get(&credentials.secret_key).ok_or_else(|| {
            RequestError::Authentication(format!(
                "Authentication failed: client at ip={} provided an invalid secretKey",
                credentials.ip
            ))
        })?;

        if record.language != WILDCARD && record.language != credentials.language {
            return Err(RequestError::Authorization(format!(
                "Invalid language: '{}' not allowed for ip={}, expected '{}'",
                credentials.language, credentials.ip, record.language
            )));
        }

        if record.ip != WILDCARD && record.ip != credentials.ip {
            return Err(RequestError::Authorization(format!(
                "Invalid IP address: expected '{}', but received '{}'",
                record.ip, credentials.ip
            )));
        }

        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str, ip: &str, language: &str) -> ClientRecord {
        ClientRecord {
            secret_key: key.into(),
            ip: ip.into(),
            language: language.into(),
            roles: Some(vec!["reader".into()]),
        }
    }

    fn creds(key: &str, ip: &str, language: &str) -> Credentials {
        Credentials {
            secret_key: key.into(),
            ip: ip.into(),
            language: language.into(),
            roles: None,
        }
    }

    #[test]
    fn open_mode_passes_credentials_through() {
        let table = ClientTable::default();
        let caller = creds("", "10.0.0.1", "rust");
        assert_eq!(table.authenticate(&caller).unwrap(), caller);
    }

    #[test]
    fn missing_key() {
        let table = ClientTable::new([record("k1", "*", "*")]);
        let err = table.authenticate(&creds("", "10.0.0.1", "rust")).unwrap_err();
        assert!(matches!(err, RequestError::Authentication(_)));
        assert!(err.to_string().contains("did not provide a secretKey"));
    }

    #[test]
    fn wrong_key_wins_over_wrong_ip_and_language() {
        let table = ClientTable::new([record("k1", "10.0.0.1", "nodejs")]);
        let err = table.authenticate(&creds("wrong", "10.9.9.9", "rust")).unwrap_err();
        assert!(matches!(err, RequestError::Authentication(_)));
        assert!(err.to_string().contains("invalid secretKey"));
    }

    #[test]
    fn language_is_checked_before_ip() {
        let table = ClientTable::new([record("k1", "10.0.0.1", "nodejs")]);
        let err = table.authenticate(&creds("k1", "10.9.9.9", "rust")).unwrap_err();
        assert!(matches!(err, RequestError::Authorization(_)));
        assert!(err.to_string().contains("Invalid language"));

        let err = table.authenticate(&creds("k1", "10.9.9.9", "nodejs")).unwrap_err();
        assert!(err.to_string().contains("Invalid IP address"));
    }

    #[test]
    fn wildcards_accept_any_value() {
        let table = ClientTable::new([record("k1", "*", "*")]);
        let matched = table.authenticate(&creds("k1", "1.2.3.4", "go")).unwrap();
        assert_eq!(matched.roles, Some(vec!["reader".to_string()]));
    }
}
