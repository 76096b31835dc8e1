//! TLS material for dialing cluster components.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tonic::transport::{Certificate, ClientTlsConfig, Identity};

use super::validation::{ConfigError, invalid, read_file};

/// PEM files used to dial targets over TLS.
///
/// The CA is required; the client certificate and key are optional but must
/// be given together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// CA certificate used to verify targets.
    pub ca_path: PathBuf,

    /// Client certificate for mutual TLS.
    #[serde(default)]
    pub cert_path: Option<PathBuf>,

    /// Client private key for mutual TLS.
    #[serde(default)]
    pub key_path: Option<PathBuf>,

    /// Override for the server name checked against target certificates.
    #[serde(default)]
    pub server_name: Option<String>,
}

impl SecurityConfig {
    pub fn new(ca_path: impl Into<PathBuf>) -> Self {
        Self {
            ca_path: ca_path.into(),
            ..Self::default()
        }
    }

    /// Add a client identity for mutual TLS.
    pub fn with_identity(mut self, cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        self.cert_path = Some(cert_path.into());
        self.key_path = Some(key_path.into());
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ca_path.as_os_str().is_empty() {
            return Err(invalid("security", "ca_path must not be empty"));
        }
        match (&self.cert_path, &self.key_path) {
            (Some(_), None) => Err(invalid("security", "cert_path is set but key_path is missing")),
            (None, Some(_)) => Err(invalid("security", "key_path is set but cert_path is missing")),
            _ => Ok(()),
        }
    }

    /// Read the PEM files and build the client TLS config.
    ///
    /// # Errors
    /// Returns `ConfigError::IoError` if a file cannot be read, or
    /// `ConfigError::ValidationError` if the combination is incomplete.
    pub fn load_tls(&self) -> Result<ClientTlsConfig, ConfigError> {
        self.validate()?;

        let ca = read_file(&self.ca_path)?;
        let mut tls = ClientTlsConfig::new().ca_certificate(Certificate::from_pem(ca));

        if let (Some(cert_path), Some(key_path)) = (&self.cert_path, &self.key_path) {
            let cert = read_file(cert_path)?;
            let key = read_file(key_path)?;
            tls = tls.identity(Identity::from_pem(cert, key));
        }
        if let Some(name) = &self.server_name {
            tls = tls.domain_name(name.clone());
        }

        tracing::debug!(
            ca = %self.ca_path.display(),
            mutual = self.cert_path.is_some(),
            "Loaded TLS config"
        );
        Ok(tls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn pem_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "-----BEGIN CERTIFICATE-----").unwrap();
        writeln!(file, "MIIBszCCAVmgAwIBAgIUQ2FuYXJ5").unwrap();
        writeln!(file, "-----END CERTIFICATE-----").unwrap();
        file
    }

    #[test]
    fn test_cert_without_key_rejected() {
        let mut config = SecurityConfig::new("/etc/tls/ca.pem");
        config.cert_path = Some("/etc/tls/client.pem".into());

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("key_path is missing"));
    }

    #[test]
    fn test_key_without_cert_rejected() {
        let mut config = SecurityConfig::new("/etc/tls/ca.pem");
        config.key_path = Some("/etc/tls/client-key.pem".into());

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cert_path is missing"));
    }

    #[test]
    fn test_empty_ca_rejected() {
        let config = SecurityConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_tls_reads_files() {
        let ca = pem_file();
        let cert = pem_file();
        let key = pem_file();

        let config = SecurityConfig::new(ca.path()).with_identity(cert.path(), key.path());
        assert!(config.load_tls().is_ok());
    }

    #[test]
    fn test_load_tls_missing_file() {
        let config = SecurityConfig::new("/nonexistent/mockngm/ca.pem");

        let err = config.load_tls().unwrap_err();
        assert!(matches!(err, ConfigError::IoError { .. }));
        assert!(err.to_string().contains("/nonexistent/mockngm/ca.pem"));
    }
}
