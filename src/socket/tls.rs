use crate::base::neterror::NetError;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

/// Client TLS configuration for `https` targets.
///
/// Every backend speaks HTTP/1.1 only, so ALPN advertises `http/1.1` alone.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub alpn_protos: Vec<Vec<u8>>,
    /// Trust anchors beyond the bundled Mozilla roots (e.g. a test CA).
    pub extra_roots: Vec<rustls::pki_types::CertificateDer<'static>>,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            alpn_protos: vec![b"http/1.1".to_vec()],
            extra_roots: Vec::new(),
        }
    }
}

impl TlsConfig {
    fn root_store(&self) -> Result<RootCertStore, NetError> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        for cert in &self.extra_roots {
            roots
                .add(cert.clone())
                .map_err(|_| NetError::SslProtocolError)?;
        }
        Ok(roots)
    }

    /// Build the rustls client config (ring provider, TLS 1.2 and 1.3).
    pub fn client_config(&self) -> Result<Arc<ClientConfig>, NetError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let mut config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|_| NetError::SslProtocolError)?
            .with_root_certificates(self.root_store()?)
            .with_no_client_auth();
        config.alpn_protocols = self.alpn_protos.clone();
        Ok(Arc::new(config))
    }

    /// Run the TLS handshake over a connected TCP stream.
    pub async fn connect(
        &self,
        host: &str,
        stream: TcpStream,
    ) -> Result<TlsStream<TcpStream>, NetError> {
        let server_name =
            ServerName::try_from(host.to_string()).map_err(|_| NetError::InvalidUrl)?;
        let connector = TlsConnector::from(self.client_config()?);
        connector.connect(server_name, stream).await.map_err(|e| {
            tracing::debug!(host, error = %e, "TLS handshake failed");
            NetError::SslProtocolError
        })
    }
}
