use once_cell::sync::Lazy;
use regex::Regex;

use crate::bucket::Bucket;
use crate::file::{Error, File, FileOptions};
use crate::http::object_access_controls::PredefinedObjectAcl;
use crate::http::objects::rewrite::RewriteObjectRequest;
use crate::http::objects::Object;

static GS_URL_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^gs://([a-z0-9_.-]+)/(.+)$").unwrap());
static CAMEL_CASE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-z])([A-Z])").unwrap());

pub const DEFAULT_MAX_REWRITE_CALLS: usize = 1000;

/// Where a copy lands.
#[derive(Clone)]
pub enum CopyDestination {
    /// An object name in the source bucket, or a `gs://bucket/name` URL.
    Name(String),
    /// The bucket, keeping the source name.
    Bucket(Bucket),
    File(File),
}

impl From<&str> for CopyDestination {
    fn from(value: &str) -> Self {
        CopyDestination::Name(value.to_string())
    }
}

impl From<String> for CopyDestination {
    fn from(value: String) -> Self {
        CopyDestination::Name(value)
    }
}

impl From<Bucket> for CopyDestination {
    fn from(value: Bucket) -> Self {
        CopyDestination::Bucket(value)
    }
}

impl From<&Bucket> for CopyDestination {
    fn from(value: &Bucket) -> Self {
        CopyDestination::Bucket(value.clone())
    }
}

impl From<File> for CopyDestination {
    fn from(value: File) -> Self {
        CopyDestination::File(value)
    }
}

impl From<&File> for CopyDestination {
    fn from(value: &File) -> Self {
        CopyDestination::File(value.clone())
    }
}

#[derive(Clone, Debug)]
pub struct CopyOptions {
    /// Metadata of the destination object.
    pub metadata: Option<Object>,
    /// Takes precedence over the KMS key of the destination handle.
    pub destination_kms_key_name: Option<String>,
    pub predefined_acl: Option<PredefinedObjectAcl>,
    pub user_project: Option<String>,
    /// Continues a rewrite started earlier.
    pub token: Option<String>,
    pub max_bytes_rewritten_per_call: Option<i64>,
    /// Upper bound of rewrite requests before giving up.
    pub max_rewrite_calls: usize,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            metadata: None,
            destination_kms_key_name: None,
            predefined_acl: None,
            user_project: None,
            token: None,
            max_bytes_rewritten_per_call: None,
            max_rewrite_calls: DEFAULT_MAX_REWRITE_CALLS,
        }
    }
}

impl File {
    /// Copies the object through the rewrite API and returns the destination handle
    /// carrying the metadata of the new object.
    ///
    /// Large or cross-location copies take several calls; each continuation reuses the
    /// returned rewrite token.
    pub async fn copy(&self, destination: impl Into<CopyDestination>, options: CopyOptions) -> Result<File, Error> {
        let mut target = self.copy_target(destination.into())?;
        // a customer-supplied key on the destination wins over any KMS key
        let kms_key_name = match target.encryption() {
            Some(_) => None,
            None => options
                .destination_kms_key_name
                .clone()
                .or_else(|| target.kms_key_name().map(|v| v.to_string())),
        };
        let mut req = RewriteObjectRequest {
            destination_bucket: target.bucket().name().to_string(),
            destination_object: target.name().to_string(),
            source_bucket: self.bucket().name().to_string(),
            source_object: self.name().to_string(),
            destination_kms_key_name: kms_key_name,
            destination_predefined_acl: options.predefined_acl,
            max_bytes_rewritten_per_call: options.max_bytes_rewritten_per_call,
            source_generation: self.generation(),
            rewrite_token: options.token.clone(),
            user_project: self.billing(&options.user_project),
            destination_metadata: options.metadata.clone(),
            source_encryption: self.encryption().cloned(),
            destination_encryption: target.encryption().cloned(),
            ..Default::default()
        };

        for _ in 0..options.max_rewrite_calls {
            let response = self.client().rewrite_object(&req).await?;
            match response.rewrite_token {
                Some(token) if !token.is_empty() => {
                    tracing::debug!(
                        "rewrite of {} in progress: {}/{} bytes",
                        self.name(),
                        response.total_bytes_rewritten,
                        response.object_size
                    );
                    req.rewrite_token = Some(token);
                }
                _ => {
                    target.metadata = response.resource.unwrap_or_default();
                    return Ok(target);
                }
            }
        }
        Err(Error::RewriteLimitExceeded(options.max_rewrite_calls))
    }

    fn copy_target(&self, destination: CopyDestination) -> Result<File, Error> {
        match destination {
            CopyDestination::Name(name) if name.is_empty() => Err(Error::InvalidDestination(name)),
            CopyDestination::Name(name) => match GS_URL_REGEX.captures(&name) {
                Some(captures) => Ok(self.client().bucket(&captures[1]).file(&captures[2])),
                None => Ok(self.bucket().file(name)),
            },
            CopyDestination::Bucket(bucket) => Ok(bucket.file(self.name())),
            CopyDestination::File(file) => Ok(file),
        }
    }

    /// Copies the object and deletes the source once the copy succeeded.
    ///
    /// The two steps are not atomic: a failed delete leaves both objects in place.
    pub async fn move_to(&self, destination: impl Into<CopyDestination>, options: CopyOptions) -> Result<File, Error> {
        let user_project = options.user_project.clone();
        let target = self.copy(destination, options).await?;
        if target.bucket().name() == self.bucket().name() && target.name() == self.name() {
            tracing::debug!("{} was moved onto itself, keeping it", self.name());
            return Ok(target);
        }
        self.delete(user_project).await?;
        Ok(target)
    }

    /// Rewrites the object in place with the customer-supplied key or KMS key of `options`.
    pub async fn rotate_encryption_key(&self, options: FileOptions) -> Result<File, Error> {
        let target = self.bucket().file_with(self.name(), options);
        self.copy(target, CopyOptions::default()).await
    }

    /// Rewrites the object in place with another storage class. Both `coldline` and
    /// `multi-regional` styles are accepted.
    pub async fn set_storage_class(&mut self, storage_class: &str, options: CopyOptions) -> Result<&Object, Error> {
        let mut metadata = options.metadata.clone().unwrap_or_default();
        metadata.storage_class = Some(normalize_storage_class(storage_class));
        let options = CopyOptions {
            metadata: Some(metadata),
            ..options
        };
        let target = self.copy(&*self, options).await?;
        self.metadata = target.metadata;
        Ok(&self.metadata)
    }
}

fn normalize_storage_class(storage_class: &str) -> String {
    let snake = storage_class.replace('-', "_");
    CAMEL_CASE_REGEX.replace_all(&snake, "${1}_${2}").to_uppercase()
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use crate::file::copy::{normalize_storage_class, CopyOptions};
    use crate::file::test::client;
    use crate::file::{Error, FileOptions};
    use crate::http::testing::MockTransport;

    fn in_progress(token: &str) -> serde_json::Value {
        json!({"totalBytesRewritten": "10", "objectSize": "30", "done": false, "rewriteToken": token})
    }

    fn done(bucket: &str, name: &str) -> serde_json::Value {
        json!({"totalBytesRewritten": "30", "objectSize": "30", "done": true,
            "resource": {"name": name, "bucket": bucket, "size": "30"}})
    }

    #[tokio::test]
    async fn test_copy_continues_with_token() {
        let mock = MockTransport::new();
        mock.respond_json(200, in_progress("t1"))
            .respond_json(200, in_progress("t2"))
            .respond_json(200, done("b2", "c.txt"));
        let file = client(&mock).bucket("b").file("a.txt");
        let copied = file
            .copy(
                "gs://b2/c.txt",
                CopyOptions {
                    user_project: Some("billing".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(copied.bucket().name(), "b2");
        assert_eq!(copied.name(), "c.txt");
        assert_eq!(copied.metadata.size, 30);

        let requests = mock.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].url.path(), "/storage/v1/b/b/o/a.txt/rewriteTo/b/b2/o/c.txt");
        assert_eq!(requests[0].query("rewriteToken"), None);
        assert_eq!(requests[1].query("rewriteToken").as_deref(), Some("t1"));
        assert_eq!(requests[2].query("rewriteToken").as_deref(), Some("t2"));
        assert!(requests.iter().all(|r| r.query("userProject").as_deref() == Some("billing")));
    }

    #[tokio::test]
    async fn test_copy_stops_at_call_limit() {
        let mock = MockTransport::new();
        mock.respond_json(200, in_progress("t1")).respond_json(200, in_progress("t2"));
        let file = client(&mock).bucket("b").file("a.txt");
        let err = file
            .copy(
                "c.txt",
                CopyOptions {
                    max_rewrite_calls: 2,
                    ..Default::default()
                },
            )
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::RewriteLimitExceeded(2)));
        assert_eq!(mock.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_copy_destinations() {
        let mock = MockTransport::new();
        mock.respond_json(200, done("other", "dir/a.txt"));
        let client = client(&mock);
        let file = client.bucket("b").file("dir/a.txt");
        let copied = file.copy(client.bucket("other"), CopyOptions::default()).await.unwrap();
        assert_eq!(copied.name(), "dir/a.txt");
        assert_eq!(
            mock.requests()[0].url.path(),
            "/storage/v1/b/b/o/dir%2Fa.txt/rewriteTo/b/other/o/dir%2Fa.txt"
        );

        let err = file.copy("", CopyOptions::default()).await.err().unwrap();
        assert!(matches!(err, Error::InvalidDestination(_)));
    }

    #[tokio::test]
    async fn test_copy_encryption() {
        let mock = MockTransport::new();
        mock.respond_json(200, done("b", "c.txt"));
        let bucket = client(&mock).bucket("b");
        let source = bucket.file_with(
            "a.txt",
            FileOptions {
                encryption_key: Some(vec![0u8; 32]),
                generation: Some(4),
                ..Default::default()
            },
        );
        let target = bucket.file_with(
            "c.txt",
            FileOptions {
                kms_key_name: Some("projects/p/locations/l/keyRings/r/cryptoKeys/k".to_string()),
                ..Default::default()
            },
        );
        source.copy(&target, CopyOptions::default()).await.unwrap();
        assert!(source.kms_key_name().is_none());

        let request = &mock.requests()[0];
        assert_eq!(request.query("sourceGeneration").as_deref(), Some("4"));
        assert_eq!(
            request.query("destinationKmsKeyName").as_deref(),
            Some("projects/p/locations/l/keyRings/r/cryptoKeys/k")
        );
        assert_eq!(
            request.header("x-goog-copy-source-encryption-key-sha256").as_deref(),
            Some("Zmh6rfhivXdsj8GLjp+OIAiXFIVu4jOzkCpZHQ1fKSU=")
        );
        assert_eq!(request.header("x-goog-encryption-key"), None);
    }

    #[tokio::test]
    async fn test_move() {
        let mock = MockTransport::new();
        mock.respond_json(403, json!({"error": {"code": 403, "message": "Forbidden"}}));
        let file = client(&mock).bucket("b").file("a.txt");
        let err = file.move_to("c.txt", CopyOptions::default()).await.err().unwrap();
        assert_eq!(err.status(), Some(403));
        assert_eq!(mock.requests().len(), 1);

        mock.respond_json(200, done("b", "c.txt")).respond(204, "");
        let moved = file.move_to("c.txt", CopyOptions::default()).await.unwrap();
        assert_eq!(moved.name(), "c.txt");
        let requests = mock.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[2].method, "DELETE");
        assert_eq!(requests[2].url.path(), "/storage/v1/b/b/o/a.txt");
    }

    #[tokio::test]
    async fn test_rotate_encryption_key() {
        let mock = MockTransport::new();
        mock.respond_json(200, done("b", "a.txt"));
        let file = client(&mock).bucket("b").file("a.txt");
        file.rotate_encryption_key(FileOptions {
            encryption_key: Some(vec![1u8; 32]),
            ..Default::default()
        })
        .await
        .unwrap();

        let request = &mock.requests()[0];
        assert_eq!(request.url.path(), "/storage/v1/b/b/o/a.txt/rewriteTo/b/b/o/a.txt");
        assert!(request.header("x-goog-encryption-key").is_some());
        assert_eq!(request.header("x-goog-copy-source-encryption-key"), None);
    }

    #[tokio::test]
    async fn test_set_storage_class() {
        let mock = MockTransport::new();
        mock.respond_json(200, json!({"done": true, "resource": {"name": "a.txt", "storageClass": "COLDLINE"}}));
        let mut file = client(&mock).bucket("b").file("a.txt");
        let metadata = file.set_storage_class("coldline", CopyOptions::default()).await.unwrap();
        assert_eq!(metadata.storage_class.as_deref(), Some("COLDLINE"));
        assert_eq!(mock.requests()[0].json(), json!({"storageClass": "COLDLINE"}));
    }

    #[test]
    fn test_normalize_storage_class() {
        assert_eq!(normalize_storage_class("nearline"), "NEARLINE");
        assert_eq!(normalize_storage_class("multi-regional"), "MULTI_REGIONAL");
        assert_eq!(normalize_storage_class("coldLine"), "COLD_LINE");
        assert_eq!(normalize_storage_class("STANDARD"), "STANDARD");
    }
}
