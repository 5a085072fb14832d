//! https against a local server whose certificate is only trusted through
//! `TlsConfig::extra_roots`.

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use std::sync::Arc;
use swordnet::socket::tls::TlsConfig;
use swordnet::{Backend, HttpLayer, Transport};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

const CERT: &[u8] = include_bytes!("fixtures/localhost.cert.der");
const KEY: &[u8] = include_bytes!("fixtures/localhost.key.der");

fn acceptor() -> TlsAcceptor {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(
            vec![CertificateDer::from(CERT.to_vec())],
            PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(KEY.to_vec())),
        )
        .unwrap();
    TlsAcceptor::from(Arc::new(config))
}

/// Answer every TLS connection with a small `200`. Failed handshakes are
/// skipped.
async fn serve_tls() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let acceptor = acceptor();
    tokio::spawn(async move {
        loop {
            let Ok((sock, _)) = listener.accept().await else {
                return;
            };
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                let Ok(mut tls) = acceptor.accept(sock).await else {
                    return;
                };
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match tls.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let _ = tls
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 6\r\nConnection: close\r\n\r\nsecure")
                    .await;
                let _ = tls.shutdown().await;
            });
        }
    });
    port
}

fn trusting_local_cert() -> TlsConfig {
    TlsConfig {
        extra_roots: vec![CertificateDer::from(CERT.to_vec())],
        ..TlsConfig::default()
    }
}

#[tokio::test]
async fn test_extra_root_trusted_by_every_backend() {
    let port = serve_tls().await;
    let url = format!("https://localhost:{}/sd-uri", port);

    for backend in [Backend::Cached, Backend::Opener, Backend::Transfer] {
        let mut transport = Transport::builder()
            .backend(backend)
            .tls(trusting_local_cert())
            .build()
            .unwrap();
        let (resp, content) = transport.request(&url, "GET", None, None).await.unwrap();
        assert_eq!(resp.status_u16(), 200, "{backend:?}");
        assert_eq!(&content.unwrap()[..], b"secure", "{backend:?}");
    }
}

#[tokio::test]
async fn test_unknown_certificate_rejected() {
    let port = serve_tls().await;
    let url = format!("https://localhost:{}/sd-uri", port);

    for backend in [Backend::Cached, Backend::Opener, Backend::Transfer] {
        let mut transport = Transport::builder().backend(backend).build().unwrap();
        let result = transport.request(&url, "GET", None, None).await;
        assert!(result.is_err(), "{backend:?}");
    }
}
