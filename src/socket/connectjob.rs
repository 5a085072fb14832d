use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::socket::client::SocketType;
use crate::socket::tls::TlsConfig;
use std::io;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use url::Url;

/// Manages the connection process: DNS -> TCP -> TLS.
#[derive(Debug, Clone)]
pub struct ConnectJob {
    tls: TlsConfig,
    timeout: Duration,
}

impl Default for ConnectJob {
    fn default() -> Self {
        Self::new(TlsConfig::default(), Duration::from_secs(30))
    }
}

impl ConnectJob {
    pub fn new(tls: TlsConfig, timeout: Duration) -> Self {
        Self { tls, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Open a socket to the origin of `url`. The whole sequence is bounded
    /// by the job timeout.
    pub async fn connect(&self, url: &Url) -> Result<SocketType, NetError> {
        let host = url.host_str().ok_or(NetError::InvalidUrl)?;
        let port = url.port_or_known_default().ok_or(NetError::InvalidUrl)?;

        match timeout(self.timeout, self.connect_inner(url, host, port)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(host, port, "connect timed out");
                Err(NetError::ConnectionTimedOut)
            }
        }
    }

    async fn connect_inner(&self, url: &Url, host: &str, port: u16) -> Result<SocketType, NetError> {
        // IPv6 literals come back bracketed from host_str.
        let bare_host = host.trim_start_matches('[').trim_end_matches(']');

        let addrs: Vec<_> = tokio::net::lookup_host((bare_host, port))
            .await
            .dns_context(host)?
            .collect();
        if addrs.is_empty() {
            return Err(NetError::NameNotResolved);
        }

        let mut last_err = None;
        let mut stream = None;
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) => {
                    tracing::debug!(%addr, error = %e, "TCP connect attempt failed");
                    last_err = Some(e);
                }
            }
        }
        let stream = match stream {
            Some(s) => s,
            None => {
                let err = last_err
                    .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no address"));
                return Err(err).connection_context(host, port);
            }
        };
        let _ = stream.set_nodelay(true);

        if url.scheme() == "https" {
            let tls = self.tls.connect(bare_host, stream).await?;
            tracing::debug!(host, port, "TLS connection established");
            Ok(SocketType::Tls(Box::new(tls)))
        } else {
            tracing::debug!(host, port, "TCP connection established");
            Ok(SocketType::Tcp(stream))
        }
    }
}
