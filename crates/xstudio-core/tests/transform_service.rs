use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use xstudio_core::transform::{
    EngineKind, HttpTransformService, ServiceErrorKind, TransformRequest, TransformService,
    XsltVersion,
};

fn request() -> TransformRequest {
    TransformRequest {
        seq: 7,
        xml: "<Invoice/>".into(),
        xslt: "<xsl:stylesheet/>".into(),
        version: XsltVersion::V2_0,
    }
}

fn service(server: &MockServer) -> HttpTransformService {
    HttpTransformService::new(format!("{}/", server.uri()), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_transform_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/transform"))
        .and(body_json(json!({
            "xml": "<Invoice/>",
            "xslt": "<xsl:stylesheet/>",
            "version": "2.0",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "html": "<h1>ok</h1>",
            "engine": "saxon",
            "log": ["[INFO] Transformation completed."],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = service(&server).transform(&request()).await.unwrap();
    assert!(result.ok);
    assert_eq!(result.html, "<h1>ok</h1>");
    assert_eq!(result.engine, Some(EngineKind::Saxon));
    assert_eq!(result.log.len(), 1);
}

#[tokio::test]
async fn test_error_status_is_failure_with_log() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/transform"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": true,
            "log": ["[ERROR] [SRC:xslt L:4 C:None] XTSE0010: unknown element"],
        })))
        .mount(&server)
        .await;

    let result = service(&server).transform(&request()).await.unwrap();
    assert!(!result.ok);
    assert_eq!(result.engine, Some(EngineKind::Error));
    assert_eq!(result.log[0], "[ERROR] [SRC:xslt L:4 C:None] XTSE0010: unknown element");
}

#[tokio::test]
async fn test_success_without_engine_reports_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/transform"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "html": "<p>plain</p>",
        })))
        .mount(&server)
        .await;

    let result = service(&server).transform(&request()).await.unwrap();
    assert!(result.ok);
    assert_eq!(result.engine, None);
    assert!(result.log.is_empty());
}

#[tokio::test]
async fn test_non_json_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/transform"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad gateway</html>"))
        .mount(&server)
        .await;

    let err = service(&server).transform(&request()).await.unwrap_err();
    assert_eq!(err.kind, ServiceErrorKind::Decode);
    assert!(err.message.starts_with("HTTP 502"));
    assert_eq!(err.details.as_deref(), Some("<html>Bad gateway</html>"));
}

#[tokio::test]
async fn test_unreachable_service_is_connect_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let service =
        HttpTransformService::new(format!("http://127.0.0.1:{port}"), Duration::from_secs(5))
            .unwrap();
    let err = service.transform(&request()).await.unwrap_err();
    assert_eq!(err.kind, ServiceErrorKind::Connect);
}

#[tokio::test]
async fn test_fetch_sample() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sample/saxon"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "xml": "<Invoice/>",
            "xslt": "<xsl:stylesheet version=\"3.0\"/>",
        })))
        .mount(&server)
        .await;

    let bundle = service(&server).fetch_sample().await.unwrap();
    assert!(bundle.ok);
    assert_eq!(bundle.xml, "<Invoice/>");
    assert!(bundle.message.is_none());
}

#[tokio::test]
async fn test_fetch_sample_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sample/saxon"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "ok": true,
            "message": "Saxon sample files not found on server.",
        })))
        .mount(&server)
        .await;

    let bundle = service(&server).fetch_sample().await.unwrap();
    assert!(!bundle.ok);
    assert_eq!(
        bundle.message.as_deref(),
        Some("Saxon sample files not found on server.")
    );
}
