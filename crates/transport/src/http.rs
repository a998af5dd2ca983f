//! reqwest-backed transport
//!
//! Joins the configured base URL with each request path, encodes the body,
//! and returns the response verbatim (status, headers, bytes).

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::{Body, Request, Response, Transport};

/// Sends requests to the remote service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            timeout,
        }
    }

    /// Absolute URL for a request path.
    pub fn url_for(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }
}

impl Transport for HttpTransport {
    fn send<'a>(
        &'a self,
        request: &'a Request,
    ) -> Pin<Box<dyn Future<Output = Result<Response>> + Send + 'a>> {
        Box::pin(async move {
            let url = self.url_for(&request.path);

            let mut builder = self
                .client
                .request(request.method.clone(), &url)
                .headers(request.headers.clone())
                .timeout(self.timeout);
            builder = match &request.body {
                Body::Empty => builder,
                Body::Json(value) => builder.json(value),
                Body::Form(fields) => builder.form(fields),
            };

            let response = builder.send().await.map_err(|e| classify(&request.path, e))?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response
                .bytes()
                .await
                .map_err(|e| classify(&request.path, e))?;

            debug!(method = %request.method, path = %request.path, %status, "response received");
            Ok(Response {
                status,
                headers,
                body,
            })
        })
    }
}

fn classify(path: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(format!("{path}: {e}"))
    } else if e.is_builder() {
        Error::InvalidRequest(format!("{path}: {e}"))
    } else {
        Error::Http(format!("{path}: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Method, StatusCode, header};
    use axum::body::Body as AxumBody;
    use reqwest::header::HeaderValue;
    use tokio::net::TcpListener;

    /// Start a local server that echoes method, path, headers and body as JSON.
    /// `/denied` answers 401 and `/slow` sleeps before answering.
    async fn start_echo_server() -> (String, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let url = format!("http://{addr}/api/v1");

        let handle = tokio::spawn(async move {
            let app = axum::Router::new()
                .route(
                    "/api/v1/denied",
                    axum::routing::get(|| async {
                        (axum::http::StatusCode::UNAUTHORIZED, "Could not validate credentials")
                    }),
                )
                .route(
                    "/api/v1/slow",
                    axum::routing::get(|| async {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        "late"
                    }),
                )
                .fallback(|request: axum::http::Request<AxumBody>| async move {
                    let mut headers_map = serde_json::Map::new();
                    for (name, value) in request.headers() {
                        headers_map.insert(
                            name.to_string(),
                            serde_json::Value::String(value.to_str().unwrap_or("").to_string()),
                        );
                    }
                    let method = request.method().to_string();
                    let path = request.uri().path().to_string();
                    let body_bytes = axum::body::to_bytes(request.into_body(), 1024 * 1024)
                        .await
                        .unwrap();
                    axum::Json(serde_json::json!({
                        "method": method,
                        "path": path,
                        "headers": headers_map,
                        "body": String::from_utf8_lossy(&body_bytes),
                    }))
                });
            axum::serve(listener, app).await.unwrap();
        });

        (url, handle)
    }

    fn transport(base_url: &str) -> HttpTransport {
        HttpTransport::new(reqwest::Client::new(), base_url, Duration::from_secs(5))
    }

    #[test]
    fn url_for_joins_base_and_path() {
        let t = transport("http://localhost:8000/api/v1/");
        assert_eq!(t.url_for("/books"), "http://localhost:8000/api/v1/books");
        assert_eq!(t.url_for("books/3"), "http://localhost:8000/api/v1/books/3");
    }

    #[tokio::test]
    async fn forwards_headers_and_path() {
        let (url, _server) = start_echo_server().await;
        let request = Request::get("/books/7").with_header(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer at_test"),
        );

        let response = transport(&url).send(&request).await.unwrap();

        assert_eq!(response.status, StatusCode::OK);
        let echoed: serde_json::Value = response.json().unwrap();
        assert_eq!(echoed["method"], "GET");
        assert_eq!(echoed["path"], "/api/v1/books/7");
        assert_eq!(echoed["headers"]["authorization"], "Bearer at_test");
    }

    #[tokio::test]
    async fn form_body_is_url_encoded() {
        let (url, _server) = start_echo_server().await;
        let request = Request::auth_endpoint(
            Method::POST,
            "/auth/login",
            Body::Form(vec![
                ("username".into(), "reader@example.com".into()),
                ("password".into(), "pw".into()),
            ]),
        );

        let response = transport(&url).send(&request).await.unwrap();
        let echoed: serde_json::Value = response.json().unwrap();

        assert_eq!(
            echoed["headers"]["content-type"],
            "application/x-www-form-urlencoded"
        );
        assert_eq!(echoed["body"], "username=reader%40example.com&password=pw");
    }

    #[tokio::test]
    async fn json_body_is_serialized() {
        let (url, _server) = start_echo_server().await;
        let request = Request::post_json("/auth/refresh", serde_json::json!({"refresh_token": "r1"}));

        let response = transport(&url).send(&request).await.unwrap();
        let echoed: serde_json::Value = response.json().unwrap();

        assert_eq!(echoed["headers"]["content-type"], "application/json");
        let sent: serde_json::Value =
            serde_json::from_str(echoed["body"].as_str().unwrap()).unwrap();
        assert_eq!(sent["refresh_token"], "r1");
    }

    #[tokio::test]
    async fn error_status_is_returned_as_response() {
        let (url, _server) = start_echo_server().await;

        let response = transport(&url).send(&Request::get("/denied")).await.unwrap();

        assert!(response.is_unauthorized());
        assert_eq!(response.text(), "Could not validate credentials");
    }

    #[tokio::test]
    async fn slow_upstream_maps_to_timeout() {
        let (url, _server) = start_echo_server().await;
        let t = HttpTransport::new(reqwest::Client::new(), url, Duration::from_millis(50));

        let err = t.send(&Request::get("/slow")).await.unwrap_err();

        assert!(matches!(err, Error::Timeout(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn connection_refused_is_http_error() {
        // Bind then drop to get a port with nothing listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = transport(&format!("http://{addr}"))
            .send(&Request::get("/books"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Http(_)), "got: {err:?}");
    }
}
