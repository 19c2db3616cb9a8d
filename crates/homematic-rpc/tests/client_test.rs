// Integration tests for `HttpRpcClient` and `ScriptClient` using wiremock.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use pretty_assertions::assert_eq;
use url::Url;
use wiremock::matchers::{body_string, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use homematic_rpc::{
    Error, Fault, HttpRpcClient, NameLookup, Response, RpcClient, ScriptClient, TransportConfig,
    Value,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, HttpRpcClient) {
    let server = MockServer::start().await;
    let url = Url::parse(&server.uri()).unwrap();
    let client = HttpRpcClient::new(url, &TransportConfig::default()).unwrap();
    (server, client)
}

fn xml_response(response: &Response) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(response.to_xml(), "text/xml")
}

// ── RPC client ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_call_posts_method_call_and_returns_params() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(header("content-type", "text/xml"))
        .and(body_string_contains("<methodName>getValue</methodName>"))
        .and(body_string_contains("<string>LEQ0000001:1</string>"))
        .respond_with(xml_response(&Response::success(vec![Value::Double(0.5)])))
        .expect(1)
        .mount(&server)
        .await;

    let result = client
        .call("getValue", vec!["LEQ0000001:1".into(), "LEVEL".into()])
        .await
        .unwrap();

    assert_eq!(result, vec![Value::Double(0.5)]);
}

#[tokio::test]
async fn test_call_without_params_sends_no_params_block() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(body_string(
            r#"<?xml version="1.0"?><methodCall><methodName>listDevices</methodName></methodCall>"#,
        ))
        .respond_with(xml_response(&Response::success(vec![Value::Array(vec![])])))
        .mount(&server)
        .await;

    let result = client.call("listDevices", vec![]).await.unwrap();
    assert_eq!(result, vec![Value::Array(vec![])]);
}

#[tokio::test]
async fn test_non_finite_double_is_rejected_before_sending() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .respond_with(xml_response(&Response::success(vec![])))
        .expect(0)
        .mount(&server)
        .await;

    let err = client
        .call("setValue", vec!["LEQ0000001:1".into(), "LEVEL".into(), Value::Double(f64::NAN)])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedValue(_)), "{err}");
}

#[tokio::test]
async fn test_fault_becomes_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .respond_with(xml_response(&Response::fault(Fault::new(
            -2,
            "Unknown instance",
        ))))
        .mount(&server)
        .await;

    let err = client.call("init", vec![]).await.unwrap_err();
    match err {
        Error::Fault { code, message } => {
            assert_eq!(code, -2);
            assert_eq!(message, "Unknown instance");
        }
        other => panic!("expected fault, got {other:?}"),
    }
}

#[tokio::test]
async fn test_http_error_status() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client.call("init", vec![]).await.unwrap_err();
    assert!(matches!(err, Error::HttpStatus { status: 500, .. }));
}

#[tokio::test]
async fn test_garbage_body_is_protocol_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>hi</body></html>"))
        .mount(&server)
        .await;

    let err = client.call("init", vec![]).await.unwrap_err();
    assert!(err.is_protocol(), "unexpected error {err:?}");
}

#[tokio::test]
async fn test_timeout_is_transient() {
    let server = MockServer::start().await;
    let client = HttpRpcClient::new(
        Url::parse(&server.uri()).unwrap(),
        &TransportConfig::with_timeout(Duration::from_millis(100)),
    )
    .unwrap();

    Mock::given(method("POST"))
        .respond_with(
            xml_response(&Response::success(vec![])).set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = client.call("init", vec![]).await.unwrap_err();
    assert!(err.is_transient(), "unexpected error {err:?}");
}

#[tokio::test]
async fn test_local_ip_matches_loopback_endpoint() {
    let (_server, client) = setup().await;
    let ip = client.local_ip().await.unwrap();
    assert!(ip.is_loopback());
}

// ── Script client ───────────────────────────────────────────────────

#[tokio::test]
async fn test_script_run_posts_script_to_a_exe() {
    let server = MockServer::start().await;
    let base = Url::parse(&format!("{}/", server.uri())).unwrap();
    let client = ScriptClient::new(&base, &TransportConfig::default()).unwrap();

    Mock::given(method("POST"))
        .and(path("/a.exe"))
        .and(body_string("testScript"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<xml><a>aaa</a><b>bbb</b></xml>"))
        .mount(&server)
        .await;

    let result = client.run("testScript").await.unwrap();
    assert_eq!(result.get("a"), Some("aaa"));
    assert_eq!(result.get("b"), Some("bbb"));
}

#[tokio::test]
async fn test_device_names_parses_output_variable() {
    let server = MockServer::start().await;
    let base = Url::parse(&format!("{}/", server.uri())).unwrap();
    let client = ScriptClient::new(&base, &TransportConfig::default()).unwrap();

    let mut body = b"<xml><exec>/a.exe</exec><output>LEQ0000001=Light\nLEQ0000001:1=K".to_vec();
    body.push(0xFC);
    body.extend_from_slice(b"che\n</output></xml>");

    Mock::given(method("POST"))
        .and(path("/a.exe"))
        .and(body_string_contains("root.Devices()"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(&server)
        .await;

    let names = client.device_names().await.unwrap();
    assert_eq!(names.len(), 2);
    assert_eq!(names["LEQ0000001"], "Light");
    assert_eq!(names["LEQ0000001:1"], "Küche");
}
