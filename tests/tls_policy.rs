use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};

use httpexec::{Client, ClientConfig, HttpExecError, RequestSpec, TransportError};
use rcgen::{CertificateParams, KeyPair, SanType};
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_rustls::TlsAcceptor;

/// HTTPS server on 127.0.0.1 with a freshly generated self-signed certificate.
async fn spawn_self_signed_server() -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let key_pair = KeyPair::generate().expect("must generate key pair");
    let mut params = CertificateParams::new(Vec::<String>::new()).expect("must create params");
    params.subject_alt_names = vec![SanType::IpAddress(IpAddr::V4(Ipv4Addr::LOCALHOST))];
    let cert = params.self_signed(&key_pair).expect("must self-sign");

    let config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .expect("must support default protocol versions")
    .with_no_client_auth()
    .with_single_cert(
        vec![cert.der().clone()],
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der())),
    )
    .expect("must accept certificate");
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind test listener");
    let address = listener.local_addr().expect("must have local addr");

    let task = tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                // Rejected handshakes end here.
                let Ok(mut tls) = acceptor.accept(stream).await else {
                    return;
                };
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|window| window == b"\r\n\r\n") {
                    match tls.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(read) => head.extend_from_slice(&buf[..read]),
                    }
                }
                let reply = "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok";
                if tls.write_all(reply.as_bytes()).await.is_ok() {
                    tls.shutdown().await.ok();
                }
            });
        }
    });

    (address, task)
}

#[tokio::test]
async fn self_signed_certificate_is_rejected_when_verifying() {
    let (address, task) = spawn_self_signed_server().await;
    let client = Client::with_defaults().expect("client builds");

    let err = client
        .execute(&RequestSpec::new("GET", format!("https://{address}/")))
        .await
        .expect_err("certificate is not trusted");

    assert!(
        matches!(err, HttpExecError::Transport(TransportError::Request(_))),
        "expected transport error, got {err:?}"
    );
    task.abort();
}

#[tokio::test]
async fn self_signed_certificate_is_accepted_without_verification() {
    let (address, task) = spawn_self_signed_server().await;
    let client = Client::new(ClientConfig::default().insecure()).expect("client builds");

    let result = client
        .execute(&RequestSpec::new("GET", format!("https://{address}/")))
        .await
        .expect("verification is off");

    assert_eq!(result.status_code, 200);
    assert_eq!(result.body, "ok");
    task.abort();
}
