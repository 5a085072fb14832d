//! Opener backend: error statuses come back as responses.

mod common;

use bytes::Bytes;
use common::{read_request, response, serve};
use swordnet::{Backend, HttpLayer, NetError, Transport};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

fn opener() -> Transport {
    Transport::builder().backend(Backend::Opener).build().unwrap()
}

#[tokio::test]
async fn test_delete_not_found_is_a_response() {
    let (base, mut rx) = serve(vec![response(
        "404 Not Found",
        &[("Content-Type", "text/plain")],
        "no such entry",
    )])
    .await;

    let (resp, content) = opener()
        .request(&format!("{}/edit/42", base), "DELETE", None, None)
        .await
        .unwrap();

    assert_eq!(resp.backend(), Backend::Opener);
    assert_eq!(resp.status_u16(), 404);
    assert_eq!(&resp["status"], "404");
    assert_eq!(resp.reason(), Some("Not Found"));
    assert_eq!(resp.content_type(), Some("text/plain"));
    assert_eq!(content.unwrap(), Bytes::from_static(b"no such entry"));

    let seen = rx.recv().await.unwrap();
    assert_eq!(seen.request_line(), "DELETE /edit/42 HTTP/1.1");
}

#[tokio::test]
async fn test_truncated_error_body_gives_no_content() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        read_request(&mut sock).await;
        sock.write_all(b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 100\r\n\r\nabc")
            .await
            .unwrap();
        // Dropping the socket cuts the body short.
    });

    let (resp, content) = opener()
        .request(&format!("http://{}/edit/1", addr), "DELETE", None, None)
        .await
        .unwrap();
    assert_eq!(resp.status_u16(), 500);
    assert_eq!(resp.reason(), Some("Internal Server Error"));
    assert!(content.is_none());
}

#[tokio::test]
async fn test_server_reason_phrase_kept() {
    let (base, _rx) = serve(vec![response("412 Checksum Mismatch", &[], "")]).await;
    let (resp, _content) = opener().request(&base, "GET", None, None).await.unwrap();
    assert_eq!(resp.status_u16(), 412);
    assert_eq!(resp.reason(), Some("Checksum Mismatch"));
}

#[tokio::test]
async fn test_post_body_delivered() {
    let (base, mut rx) = serve(vec![response(
        "201 Created",
        &[("Location", "http://localhost/edit/7")],
        "",
    )])
    .await;

    let (resp, content) = opener()
        .request(
            &format!("{}/col", base),
            "POST",
            None,
            Some(Bytes::from_static(b"<entry>hi</entry>")),
        )
        .await
        .unwrap();
    assert_eq!(resp.status_u16(), 201);
    assert_eq!(resp.location(), Some("http://localhost/edit/7"));
    assert_eq!(content.unwrap().len(), 0);

    let seen = rx.recv().await.unwrap();
    assert_eq!(seen.request_line(), "POST /col HTTP/1.1");
    assert_eq!(seen.body, b"<entry>hi</entry>");
}

#[tokio::test]
async fn test_latest_credentials_win() {
    let (base, mut rx) = serve(vec![response("200 OK", &[], "ok")]).await;

    let mut transport = opener();
    transport.add_credentials("first", "one");
    transport.add_credentials("sword", "sword");
    transport.request(&base, "GET", None, None).await.unwrap();

    let seen = rx.recv().await.unwrap();
    assert_eq!(seen.header("authorization").as_deref(), Some("Basic c3dvcmQ6c3dvcmQ="));
}

#[tokio::test]
async fn test_redirect_followed_for_get() {
    let (target, mut target_rx) = serve(vec![response("200 OK", &[], "landed")]).await;
    let (base, _rx) = serve(vec![response(
        "302 Found",
        &[("Location", &format!("{}/final", target))],
        "",
    )])
    .await;

    let (resp, content) = opener().request(&base, "GET", None, None).await.unwrap();
    assert_eq!(resp.status_u16(), 200);
    assert_eq!(content.unwrap(), Bytes::from_static(b"landed"));
    let seen = target_rx.recv().await.unwrap();
    assert_eq!(seen.request_line(), "GET /final HTTP/1.1");
}

#[tokio::test]
async fn test_redirect_not_followed_for_post() {
    let (base, _rx) = serve(vec![response(
        "303 See Other",
        &[("Location", "http://127.0.0.1:9/elsewhere")],
        "",
    )])
    .await;

    let (resp, _content) = opener()
        .request(&base, "POST", None, Some(Bytes::from_static(b"x")))
        .await
        .unwrap();
    assert_eq!(resp.status_u16(), 303);
    assert_eq!(resp.location(), Some("http://127.0.0.1:9/elsewhere"));
}

#[tokio::test]
async fn test_body_on_get_rejected() {
    let err = opener()
        .request("http://127.0.0.1:9/", "GET", None, Some(Bytes::from_static(b"x")))
        .await
        .unwrap_err();
    assert!(matches!(err, NetError::RequestBodyMismatch { .. }));
}
