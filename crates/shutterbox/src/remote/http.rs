//! S3-style HTTP object store client.
//!
//! Objects live at `{endpoint}/{bucket}/{key}` (path-style addressing).
//! `GET` answers 200 with the bytes or 404 for a missing key; `PUT` stores
//! the request body with the given `Content-Type` and an `x-amz-acl`
//! canned ACL. Downloads larger than the configured object limit are
//! refused while streaming.

use async_trait::async_trait;
use bytes::Bytes;
use cas::ContentHash;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode};
use shutterconf::RemoteTarget;
use tracing::{debug, info};

use super::{RemoteError, RemoteStore, Visibility};

const ACL_HEADER: &str = "x-amz-acl";

pub struct HttpObjectStore {
    http_client: Client,
    endpoint: String,
    bucket: String,
    auth_token: Option<String>,
    max_object_bytes: Option<usize>,
}

impl HttpObjectStore {
    pub fn new(target: &RemoteTarget) -> Result<Self, RemoteError> {
        let http_client = Client::builder()
            .timeout(target.timeout)
            .build()
            .map_err(RemoteError::from_reqwest)?;

        Ok(Self {
            http_client,
            endpoint: target.endpoint.clone(),
            bucket: target.bucket.clone(),
            auth_token: target.auth_token.clone(),
            max_object_bytes: None,
        })
    }

    /// Refuse objects bigger than `limit`; nothing larger can have been uploaded.
    pub fn with_max_object_bytes(mut self, limit: usize) -> Self {
        self.max_object_bytes = Some(limit);
        self
    }

    fn object_url(&self, key: &ContentHash) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint,
            urlencoding::encode(&self.bucket),
            key
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        }
    }
}

fn oversized(status: StatusCode, size: u64, limit: usize) -> RemoteError {
    RemoteError::Request(
        status.as_u16(),
        format!("object of {size} bytes exceeds limit of {limit} bytes"),
    )
}

#[async_trait]
impl RemoteStore for HttpObjectStore {
    async fn get(&self, key: &ContentHash) -> Result<Option<Vec<u8>>, RemoteError> {
        let url = self.object_url(key);
        debug!(key = %key, url = %url, "Fetching object from remote store");

        let mut response = self
            .authorize(self.http_client.get(&url))
            .send()
            .await
            .map_err(RemoteError::from_reqwest)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(key = %key, "Remote store has no such object");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::from_status(status.as_u16(), &body));
        }

        let Some(limit) = self.max_object_bytes else {
            let bytes = response.bytes().await.map_err(RemoteError::from_reqwest)?;
            info!(key = %key, size = bytes.len(), "Fetched object from remote store");
            return Ok(Some(bytes.to_vec()));
        };

        if let Some(declared) = response.content_length() {
            if declared > limit as u64 {
                return Err(oversized(status, declared, limit));
            }
        }

        let mut data = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(RemoteError::from_reqwest)? {
            if data.len() + chunk.len() > limit {
                return Err(oversized(status, (data.len() + chunk.len()) as u64, limit));
            }
            data.extend_from_slice(&chunk);
        }

        info!(key = %key, size = data.len(), "Fetched object from remote store");
        Ok(Some(data))
    }

    async fn put(
        &self,
        key: &ContentHash,
        data: Bytes,
        content_type: &str,
        visibility: Visibility,
    ) -> Result<(), RemoteError> {
        let url = self.object_url(key);
        let size = data.len();
        debug!(key = %key, size, content_type, acl = visibility.as_acl(), "Uploading object to remote store");

        let response = self
            .authorize(self.http_client.put(&url))
            .header(CONTENT_TYPE, content_type)
            .header(ACL_HEADER, visibility.as_acl())
            .body(data)
            .send()
            .await
            .map_err(RemoteError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::from_status(status.as_u16(), &body));
        }

        info!(key = %key, size, "Uploaded object to remote store");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.endpoint, self.bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn target(server: &MockServer, auth_token: Option<&str>) -> RemoteTarget {
        RemoteTarget {
            endpoint: server.uri(),
            bucket: "images".to_string(),
            auth_token: auth_token.map(str::to_string),
            public_read: true,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_get_returns_bytes() {
        let server = MockServer::start().await;
        let key = ContentHash::from_data(b"pixels");

        Mock::given(method("GET"))
            .and(path(format!("/images/{key}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"pixels".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let store = HttpObjectStore::new(&target(&server, None)).unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(b"pixels".to_vec()));
    }

    #[tokio::test]
    async fn test_get_within_limit() {
        let server = MockServer::start().await;
        let key = ContentHash::from_data(b"small");
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"small".to_vec()))
            .mount(&server)
            .await;

        let store = HttpObjectStore::new(&target(&server, None))
            .unwrap()
            .with_max_object_bytes(5);
        assert_eq!(store.get(&key).await.unwrap(), Some(b"small".to_vec()));
    }

    #[tokio::test]
    async fn test_get_rejects_oversized_object() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 4096]))
            .mount(&server)
            .await;

        let store = HttpObjectStore::new(&target(&server, None))
            .unwrap()
            .with_max_object_bytes(1024);
        let err = store
            .get(&ContentHash::from_data(b"huge"))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Request(200, ref msg) if msg.contains("exceeds")));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = HttpObjectStore::new(&target(&server, None)).unwrap();
        let key = ContentHash::from_data(b"absent");
        assert_eq!(store.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("slow down"))
            .mount(&server)
            .await;

        let store = HttpObjectStore::new(&target(&server, None)).unwrap();
        let err = store
            .get(&ContentHash::from_data(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Server(503, body) if body == "slow down"));
    }

    #[tokio::test]
    async fn test_put_sends_headers_and_body() {
        let server = MockServer::start().await;
        let key = ContentHash::from_data(b"jpeg bytes");

        Mock::given(method("PUT"))
            .and(path(format!("/images/{key}")))
            .and(header("content-type", "image/jpeg"))
            .and(header("x-amz-acl", "private"))
            .and(header("authorization", "Bearer sekrit"))
            .and(body_bytes(b"jpeg bytes".to_vec()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = HttpObjectStore::new(&target(&server, Some("sekrit"))).unwrap();
        store
            .put(
                &key,
                Bytes::from_static(b"jpeg bytes"),
                "image/jpeg",
                Visibility::Private,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_put_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403).set_body_string("AccessDenied"))
            .mount(&server)
            .await;

        let store = HttpObjectStore::new(&target(&server, None)).unwrap();
        let err = store
            .put(
                &ContentHash::from_data(b"x"),
                Bytes::from_static(b"x"),
                "image/png",
                Visibility::PublicRead,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Forbidden(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let unreachable = RemoteTarget {
            endpoint: "http://127.0.0.1:1".to_string(),
            bucket: "images".to_string(),
            auth_token: None,
            public_read: true,
            timeout: Duration::from_secs(2),
        };
        let store = HttpObjectStore::new(&unreachable).unwrap();
        let err = store
            .get(&ContentHash::from_data(b"x"))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
