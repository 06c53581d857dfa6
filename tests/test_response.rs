use caching_proxy::http::response::{Response, ResponseBuilder, StatusCode};
use caching_proxy::http::writer::{ResponseWriter, serialize_response};

#[test]
fn test_status_code_as_u16() {
    assert_eq!(StatusCode::BadRequest.as_u16(), 400);
    assert_eq!(StatusCode::BadGateway.as_u16(), 502);
    assert_eq!(StatusCode::GatewayTimeout.as_u16(), 504);
}

#[test]
fn test_status_code_reason_phrase() {
    assert_eq!(StatusCode::BadRequest.reason_phrase(), "Bad Request");
    assert_eq!(StatusCode::BadGateway.reason_phrase(), "Bad Gateway");
    assert_eq!(StatusCode::GatewayTimeout.reason_phrase(), "Gateway Timeout");
}

#[test]
fn test_response_builder_auto_content_length() {
    let body = b"This is the body".to_vec();
    let response = ResponseBuilder::new(StatusCode::BadRequest)
        .body(body.clone())
        .build();

    assert_eq!(response.header("Content-Length"), Some("16"));
}

#[test]
fn test_response_builder_preserves_custom_content_length() {
    let response = ResponseBuilder::new(StatusCode::BadRequest)
        .header("Content-Length", "999")
        .body(b"test".to_vec())
        .build();

    // Should keep the custom value
    assert_eq!(response.header("Content-Length"), Some("999"));
    assert_eq!(response.headers.len(), 1);
}

#[test]
fn test_response_builder_replaces_header() {
    let response = ResponseBuilder::new(StatusCode::BadGateway)
        .header("Content-Type", "text/plain")
        .header("content-type", "text/html")
        .build();

    assert_eq!(response.headers.len(), 2); // 1 custom + 1 auto (Content-Length)
    assert_eq!(response.header("Content-Type"), Some("text/html"));
}

#[test]
fn test_error_page_shape() {
    let response = Response::error_page(
        StatusCode::BadRequest,
        "URI has no scheme separator",
        "The proxy could not understand the request",
    );
    let body = String::from_utf8(response.body.clone()).unwrap();

    assert_eq!(response.status, StatusCode::BadRequest);
    assert_eq!(response.header("Content-Type"), Some("text/html"));
    assert_eq!(
        response.header("Content-Length"),
        Some(response.body.len().to_string().as_str())
    );
    assert!(body.starts_with("<html>"));
    assert!(body.contains("400: Bad Request"));
    assert!(body.contains("The proxy could not understand the request: URI has no scheme separator"));
}

#[test]
fn test_error_page_escapes_cause() {
    let response = Response::error_page(StatusCode::BadGateway, "<script>", "oops");
    let body = String::from_utf8(response.body).unwrap();

    assert!(body.contains("&lt;script&gt;"));
    assert!(!body.contains("<script>"));
}

#[test]
fn test_serialize_response_layout() {
    let response = ResponseBuilder::new(StatusCode::GatewayTimeout)
        .header("Content-Type", "text/html")
        .body(b"late".to_vec())
        .build();

    let bytes = serialize_response(&response);

    assert_eq!(
        bytes,
        b"HTTP/1.0 504 Gateway Timeout\r\nContent-Type: text/html\r\nContent-Length: 4\r\n\r\nlate".to_vec()
    );
}

#[tokio::test]
async fn test_response_writer_writes_everything() {
    let response = Response::error_page(StatusCode::BadGateway, "origin.test:80", "unreachable");
    let mut sink: Vec<u8> = Vec::new();

    ResponseWriter::new(&response)
        .write_to_stream(&mut sink)
        .await
        .unwrap();

    assert_eq!(sink, serialize_response(&response));
}
