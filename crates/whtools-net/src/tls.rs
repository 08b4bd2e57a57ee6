//! Trust configuration shared by the CAS client and the session.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::CertificateDer;
use rustls::pki_types::pem::PemObject;
use rustls::{ClientConfig, RootCertStore};
use tokio_tungstenite::Connector;
use tracing::debug;

use whtools_core::error::ConnectError;

/// Which certificates the client trusts.
///
/// Without a trust bundle the bundled web PKI roots are used. A trust bundle
/// is a PEM file of CA or self-signed server certificates; every certificate
/// in it is trusted as a root, which is how self-signed warehouse
/// deployments are reached.
#[derive(Clone, Default)]
pub struct TlsSettings {
    bundle: Option<Arc<Vec<CertificateDer<'static>>>>,
}

impl TlsSettings {
    /// Trust the bundled web PKI roots only.
    pub fn system_default() -> Self {
        Self::default()
    }

    /// Trust the certificates in a PEM file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or holds no certificates.
    pub fn from_trust_bundle(path: impl AsRef<Path>) -> Result<Self, ConnectError> {
        let path = path.as_ref();
        let pem = std::fs::read(path).map_err(|e| ConnectError::Tls {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        let settings = Self::from_pem(&pem)?;
        debug!(path = %path.display(), "Loaded trust bundle");
        Ok(settings)
    }

    /// Trust the certificates in PEM text.
    pub fn from_pem(pem: &[u8]) -> Result<Self, ConnectError> {
        let certs = CertificateDer::pem_slice_iter(pem)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConnectError::Tls {
                message: format!("failed to parse certificates: {}", e),
            })?;

        if certs.is_empty() {
            return Err(ConnectError::Tls {
                message: "no certificates found in trust bundle".to_string(),
            });
        }

        Ok(Self {
            bundle: Some(Arc::new(certs)),
        })
    }

    /// True when a custom trust bundle is configured.
    pub fn has_custom_trust(&self) -> bool {
        self.bundle.is_some()
    }

    /// Add the bundle's certificates to an HTTP client builder.
    pub(crate) fn apply_to_http(
        &self,
        mut builder: reqwest::ClientBuilder,
    ) -> Result<reqwest::ClientBuilder, reqwest::Error> {
        if let Some(bundle) = &self.bundle {
            for cert in bundle.iter() {
                let cert = reqwest::Certificate::from_der(cert.as_ref())?;
                builder = builder.add_root_certificate(cert);
            }
        }
        Ok(builder)
    }

    /// The connector for `wss://` sessions; `None` uses the defaults.
    pub(crate) fn websocket_connector(&self) -> Result<Option<Connector>, ConnectError> {
        let Some(bundle) = &self.bundle else {
            return Ok(None);
        };

        let mut roots = RootCertStore::empty();
        for cert in bundle.iter() {
            roots.add(cert.clone()).map_err(|e| ConnectError::Tls {
                message: format!("failed to add certificate: {}", e),
            })?;
        }

        let config = ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .map_err(|e| ConnectError::Tls {
            message: e.to_string(),
        })?
        .with_root_certificates(roots)
        .with_no_client_auth();

        Ok(Some(Connector::Rustls(Arc::new(config))))
    }
}

impl fmt::Debug for TlsSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsSettings")
            .field(
                "trust_bundle",
                &self.bundle.as_ref().map(|certs| certs.len()),
            )
            .finish()
    }
}
