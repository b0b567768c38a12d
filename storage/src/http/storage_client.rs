use std::sync::Arc;

use reqwest::header::LOCATION;
use reqwest::Response;
use reqwest_middleware::{ClientWithMiddleware as Client, RequestBuilder};
use token_source::TokenSource;

use crate::http::channels::stop::StopChannelRequest;
use crate::http::notifications::delete::DeleteNotificationRequest;
use crate::http::notifications::get::GetNotificationRequest;
use crate::http::notifications::insert::InsertNotificationRequest;
use crate::http::notifications::Notification;
use crate::http::object_access_controls::insert::InsertObjectAccessControlRequest;
use crate::http::object_access_controls::ObjectAccessControl;
use crate::http::objects::delete::DeleteObjectRequest;
use crate::http::objects::download::Range;
use crate::http::objects::get::GetObjectRequest;
use crate::http::objects::patch::PatchObjectRequest;
use crate::http::objects::rewrite::{RewriteObjectRequest, RewriteObjectResponse};
use crate::http::objects::upload::UploadObjectRequest;
use crate::http::objects::Object;
use crate::http::resumable_upload_client::ResumableUploadClient;
use crate::http::{
    channels, check_response_status, notifications, object_access_controls, objects, Error,
};

pub const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/cloud-platform",
    "https://www.googleapis.com/auth/devstorage.full_control",
];

/// The request-dispatch primitive shared by every handle.
#[derive(Clone)]
pub struct StorageClient {
    ts: Option<Arc<dyn TokenSource>>,
    v1_endpoint: String,
    v1_upload_endpoint: String,
    http: Client,
}

impl StorageClient {
    pub(crate) fn new(ts: Option<Arc<dyn TokenSource>>, endpoint: &str, http: Client) -> Self {
        Self {
            ts,
            v1_endpoint: format!("{endpoint}/storage/v1"),
            v1_upload_endpoint: format!("{endpoint}/upload/storage/v1"),
            http,
        }
    }

    /// Gets the object metadata.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn get_object(&self, req: &GetObjectRequest) -> Result<Object, Error> {
        let builder = objects::get::build(self.v1_endpoint.as_str(), &self.http, req);
        self.send(builder).await
    }

    /// Deletes the object.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn delete_object(&self, req: &DeleteObjectRequest) -> Result<(), Error> {
        let builder = objects::delete::build(self.v1_endpoint.as_str(), &self.http, req);
        self.send_get_empty(builder).await
    }

    /// Patches the object metadata with `req.metadata`.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn patch_object(&self, req: &PatchObjectRequest) -> Result<Object, Error> {
        let body = req.metadata.clone().unwrap_or_default();
        self.patch_object_with(req, &body).await
    }

    pub(crate) async fn patch_object_with<T: serde::Serialize + ?Sized>(
        &self,
        req: &PatchObjectRequest,
        body: &T,
    ) -> Result<Object, Error> {
        let builder = objects::patch::build(self.v1_endpoint.as_str(), &self.http, req, body);
        self.send(builder).await
    }

    /// Adds an access-control entry to the object.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn insert_object_access_control(
        &self,
        req: &InsertObjectAccessControlRequest,
    ) -> Result<ObjectAccessControl, Error> {
        let builder = object_access_controls::insert::build(self.v1_endpoint.as_str(), &self.http, req);
        self.send(builder).await
    }

    /// Issues a single rewrite call. Large objects need several calls, see `rewrite_token`.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn rewrite_object(&self, req: &RewriteObjectRequest) -> Result<RewriteObjectResponse, Error> {
        let builder = objects::rewrite::build(self.v1_endpoint.as_str(), &self.http, req);
        self.send(builder).await
    }

    /// Starts a media download and returns the successful response so that the
    /// caller can read its headers and stream its body.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn download_object(&self, req: &GetObjectRequest, range: &Range) -> Result<Response, Error> {
        let builder = objects::download::build(self.v1_endpoint.as_str(), &self.http, req, range);
        let builder = self.with_headers(builder).await?;
        let response = builder.send().await?;
        check_response_status(response).await
    }

    /// Uploads the object data and metadata in a single multipart request.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn upload_object_multipart(
        &self,
        req: &UploadObjectRequest,
        metadata: &Object,
        data: Vec<u8>,
    ) -> Result<Object, Error> {
        let builder = objects::upload::build_multipart(self.v1_upload_endpoint.as_str(), &self.http, req, metadata, data)?;
        self.send(builder).await
    }

    /// Creates a resumable upload session.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn prepare_resumable_upload(
        &self,
        req: &UploadObjectRequest,
        metadata: &Object,
        origin: Option<&str>,
    ) -> Result<ResumableUploadClient, Error> {
        let builder =
            objects::upload::build_resumable_session(self.v1_upload_endpoint.as_str(), &self.http, req, metadata, origin);
        let builder = self.with_headers(builder).await?;
        let response = builder.send().await?;
        let response = check_response_status(response).await?;
        let session_url = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(Error::MissingLocation)?;
        tracing::debug!("resumable upload session created: {}", session_url);
        Ok(self.resumable_upload_client(session_url))
    }

    /// Attaches to an existing resumable upload session.
    pub fn resumable_upload_client(&self, session_url: &str) -> ResumableUploadClient {
        ResumableUploadClient::new(session_url.to_string(), self.http.clone())
    }

    /// Creates a notification subscription.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn insert_notification(&self, req: &InsertNotificationRequest) -> Result<Notification, Error> {
        let builder = notifications::insert::build(self.v1_endpoint.as_str(), &self.http, req);
        self.send(builder).await
    }

    /// Gets a notification subscription.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn get_notification(&self, req: &GetNotificationRequest) -> Result<Notification, Error> {
        let builder = notifications::get::build(self.v1_endpoint.as_str(), &self.http, req);
        self.send(builder).await
    }

    /// Deletes a notification subscription.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn delete_notification(&self, req: &DeleteNotificationRequest) -> Result<(), Error> {
        let builder = notifications::delete::build(self.v1_endpoint.as_str(), &self.http, req);
        self.send_get_empty(builder).await
    }

    /// Stops watching resources through a channel.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn stop_channel(&self, req: &StopChannelRequest) -> Result<(), Error> {
        let builder = channels::stop::build(self.v1_endpoint.as_str(), &self.http, req);
        self.send_get_empty(builder).await
    }

    async fn with_headers(&self, builder: RequestBuilder) -> Result<RequestBuilder, Error> {
        let builder = builder
            .header("X-Goog-Api-Client", "rust")
            .header(reqwest::header::USER_AGENT, "google-cloud-storage");
        let builder = match &self.ts {
            Some(ts) => {
                let token = ts.token().await.map_err(Error::TokenSource)?;
                builder.header(reqwest::header::AUTHORIZATION, token)
            }
            None => builder,
        };
        Ok(builder)
    }

    async fn send<T: for<'de> serde::Deserialize<'de>>(&self, builder: RequestBuilder) -> Result<T, Error> {
        let builder = self.with_headers(builder).await?;
        let response = builder.send().await?;
        let response = check_response_status(response).await?;
        Ok(response.json().await?)
    }

    async fn send_get_empty(&self, builder: RequestBuilder) -> Result<(), Error> {
        let builder = self.with_headers(builder).await?;
        let response = builder.send().await?;
        check_response_status(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use crate::http::channels::stop::StopChannelRequest;
    use crate::http::channels::WatchableChannel;
    use crate::http::objects::delete::DeleteObjectRequest;
    use crate::http::objects::get::GetObjectRequest;
    use crate::http::objects::upload::UploadObjectRequest;
    use crate::http::objects::{Encryption, Object};
    use crate::http::storage_client::StorageClient;
    use crate::http::testing::MockTransport;
    use crate::http::Error;

    #[ctor::ctor]
    fn init() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn client(mock: &MockTransport) -> StorageClient {
        StorageClient::new(None, "https://storage.example", mock.client())
    }

    #[tokio::test]
    async fn test_get_object() {
        let mock = MockTransport::new();
        mock.respond_json(200, json!({"name": "dir/file.txt", "bucket": "b", "generation": "5"}));
        let object = client(&mock)
            .get_object(&GetObjectRequest {
                bucket: "b".to_string(),
                object: "dir/file.txt".to_string(),
                generation: Some(5),
                user_project: Some("billing".to_string()),
                encryption: Some(Encryption::from_key(&[0u8; 32])),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(object.generation, 5);

        let request = &mock.requests()[0];
        assert_eq!(request.method, "GET");
        assert_eq!(request.url.path(), "/storage/v1/b/b/o/dir%2Ffile.txt");
        assert_eq!(request.query("generation").as_deref(), Some("5"));
        assert_eq!(request.query("userProject").as_deref(), Some("billing"));
        assert_eq!(request.header("x-goog-encryption-algorithm").as_deref(), Some("AES256"));
        assert_eq!(request.header("x-goog-api-client").as_deref(), Some("rust"));
        assert!(request.header("authorization").is_none());
    }

    #[tokio::test]
    async fn test_error_response() {
        let mock = MockTransport::new();
        mock.respond_json(404, json!({"error": {"code": 404, "message": "No such object: b/o"}}))
            .respond(502, "bad gateway");
        let client = client(&mock);
        let req = DeleteObjectRequest {
            bucket: "b".to_string(),
            object: "o".to_string(),
            ..Default::default()
        };
        let err = client.delete_object(&req).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "No such object: b/o");

        match client.delete_object(&req).await.unwrap_err() {
            Error::RawResponse(502, body) => assert_eq!(body, "bad gateway"),
            e => panic!("unexpected {e:?}"),
        }
    }

    #[tokio::test]
    async fn test_upload_object_multipart() {
        let mock = MockTransport::new();
        mock.respond_json(200, json!({"name": "o", "bucket": "b", "crc32c": "yZRlqg=="}));
        let req = UploadObjectRequest {
            bucket: "b".to_string(),
            name: "o".to_string(),
            if_generation_match: Some(3),
            ..Default::default()
        };
        let metadata = Object {
            name: "o".to_string(),
            ..Default::default()
        };
        let object = client(&mock)
            .upload_object_multipart(&req, &metadata, b"hello world".to_vec())
            .await
            .unwrap();
        assert_eq!(object.crc32c.as_deref(), Some("yZRlqg=="));

        let request = &mock.requests()[0];
        assert_eq!(request.url.path(), "/upload/storage/v1/b/b/o");
        assert_eq!(request.query("uploadType").as_deref(), Some("multipart"));
        assert_eq!(request.query("name").as_deref(), Some("o"));
        assert_eq!(request.query("ifGenerationMatch").as_deref(), Some("3"));
        assert!(request
            .header("content-type")
            .unwrap()
            .starts_with("multipart/related; boundary="));
    }

    #[tokio::test]
    async fn test_prepare_resumable_upload() {
        let mock = MockTransport::new();
        mock.respond_with_headers(200, &[("location", "https://upload.example/session/1")], "")
            .respond(200, "");
        let client = client(&mock);
        let req = UploadObjectRequest {
            bucket: "b".to_string(),
            name: "o".to_string(),
            ..Default::default()
        };
        let metadata = Object {
            content_type: Some("text/plain".to_string()),
            ..Default::default()
        };
        let session = client
            .prepare_resumable_upload(&req, &metadata, Some("https://app.example"))
            .await
            .unwrap();
        assert_eq!(session.url(), "https://upload.example/session/1");
        let request = &mock.requests()[0];
        assert_eq!(request.query("uploadType").as_deref(), Some("resumable"));
        assert_eq!(request.header("x-upload-content-type").as_deref(), Some("text/plain"));
        assert_eq!(request.header("origin").as_deref(), Some("https://app.example"));

        let err = client.prepare_resumable_upload(&req, &metadata, None).await.err().unwrap();
        assert!(matches!(err, Error::MissingLocation));
    }

    #[tokio::test]
    async fn test_stop_channel() {
        let mock = MockTransport::new();
        mock.respond(204, "");
        client(&mock)
            .stop_channel(&StopChannelRequest {
                channel: WatchableChannel {
                    id: "ch".to_string(),
                    resource_id: "res".to_string(),
                },
            })
            .await
            .unwrap();
        let request = &mock.requests()[0];
        assert_eq!(request.method, "POST");
        assert_eq!(request.url.path(), "/storage/v1/channels/stop");
        assert_eq!(request.json(), json!({"id": "ch", "resourceId": "res"}));
    }
}
