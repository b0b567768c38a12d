use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use futures_util::{Stream, StreamExt};
use once_cell::sync::Lazy;
use tokio::sync::Mutex;

use crate::checksum::{self, Digest, Hasher, Validation, Verdict};
use crate::file::{Error, File};
use crate::http::object_access_controls::PredefinedObjectAcl;
use crate::http::objects::delete::DeleteObjectRequest;
use crate::http::objects::upload::UploadObjectRequest;
use crate::http::objects::Object;
use crate::http::resumable_upload_client::{ChunkSize, ResumableUploadClient, UploadStatus, CHUNK_ALIGNMENT};

/// Chunk size of resumable uploads when none is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 32 * CHUNK_ALIGNMENT;

const SESSION_FILE: &str = "resumable-uploads.json";

/// Serializes updates of session files within the process.
static SESSION_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Gzip {
    Always,
    /// Compress when the content type is known to be compressible.
    Auto,
    #[default]
    Never,
}

/// Options of an upload.
#[derive(Clone, Debug, Default)]
pub struct WriteOptions {
    /// Object metadata sent with the data.
    pub metadata: Object,
    /// Overrides `metadata.content_type`; `"auto"` guesses it from the object name.
    pub content_type: Option<String>,
    pub gzip: Gzip,
    pub validation: Validation,
    /// `Some(false)` forces a single request upload, `Some(true)` requires a resumable one.
    pub resumable: Option<bool>,
    pub predefined_acl: Option<PredefinedObjectAcl>,
    /// Shorthand for the `private` predefined ACL.
    pub private: bool,
    /// Shorthand for the `publicRead` predefined ACL.
    pub public: bool,
    pub user_project: Option<String>,
    /// Position of the first byte of the data within the object, when continuing a session.
    pub offset: Option<u64>,
    /// An existing resumable session to continue.
    pub uri: Option<String>,
    /// File persisting the sessions of unfinished uploads.
    pub config_path: Option<PathBuf>,
    /// Size of resumable chunks, a multiple of 256 KiB.
    pub chunk_size: Option<usize>,
    /// Origin allowed to use the session from a browser.
    pub origin: Option<String>,
}

impl WriteOptions {
    fn predefined_acl(&self) -> Option<PredefinedObjectAcl> {
        if self.predefined_acl.is_some() {
            self.predefined_acl
        } else if self.private {
            Some(PredefinedObjectAcl::Private)
        } else if self.public {
            Some(PredefinedObjectAcl::PublicRead)
        } else {
            None
        }
    }

    fn chunk_size(&self) -> Result<usize, Error> {
        match self.chunk_size {
            None => Ok(DEFAULT_CHUNK_SIZE),
            Some(size) if size > 0 && size % CHUNK_ALIGNMENT == 0 => Ok(size),
            Some(size) => Err(Error::InvalidChunkSize(size)),
        }
    }
}

impl File {
    /// Uploads an in-memory buffer.
    pub async fn save(&mut self, data: impl Into<Bytes>, options: WriteOptions) -> Result<&Object, Error> {
        let data = data.into();
        self.upload_stream(futures_util::stream::once(async move { Ok(data) }), options)
            .await
    }

    /// Uploads a byte stream, choosing between a single request and a resumable
    /// session, and validates the stored object against the hash of the sent bytes.
    ///
    /// When the stored object does not match, it is deleted before the error is returned.
    pub async fn upload_stream<S>(&mut self, stream: S, options: WriteOptions) -> Result<&Object, Error>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send,
    {
        let chunk_size = options.chunk_size()?;
        let metadata = self.upload_metadata(&options);
        let gzip = metadata.content_encoding.as_deref() == Some("gzip");
        let mut encoder = Encoder::new(gzip, options.validation);

        let object = match options.resumable {
            Some(false) => self.simple_upload(stream, &mut encoder, &metadata, &options).await?,
            resumable => {
                let store = SessionStore::new(options.config_path.as_deref());
                if store.is_writable().await {
                    self.resumable_upload(stream, &mut encoder, &metadata, &options, &store, chunk_size)
                        .await?
                } else if resumable == Some(true) {
                    return Err(Error::ResumableUploadUnavailable(store.dir().display().to_string()));
                } else {
                    tracing::debug!("{} is not writable, falling back to simple upload", store.dir().display());
                    self.simple_upload(stream, &mut encoder, &metadata, &options).await?
                }
            }
        };

        let digest = encoder.digest();
        self.metadata = object;
        if options.offset.unwrap_or(0) > 0 {
            tracing::debug!("skip validation of upload started at offset {:?}", options.offset);
            return Ok(&self.metadata);
        }
        match checksum::verify(options.validation, &digest, &self.metadata) {
            Verdict::Valid => Ok(&self.metadata),
            verdict => Err(self.discard_upload(verdict, &options).await),
        }
    }

    /// Creates a resumable session for this object without sending any data and
    /// returns its URI.
    pub async fn create_resumable_upload(&self, options: WriteOptions) -> Result<String, Error> {
        let metadata = self.upload_metadata(&options);
        let session = self
            .client()
            .prepare_resumable_upload(&self.upload_request(&options), &metadata, options.origin.as_deref())
            .await?;
        Ok(session.url().to_string())
    }

    fn upload_request(&self, options: &WriteOptions) -> UploadObjectRequest {
        UploadObjectRequest {
            bucket: self.bucket().name().to_string(),
            name: self.name().to_string(),
            if_generation_match: self.generation(),
            kms_key_name: self.kms_key_name().map(|v| v.to_string()),
            predefined_acl: options.predefined_acl(),
            user_project: self.billing(&options.user_project),
            encryption: self.encryption().cloned(),
            ..Default::default()
        }
    }

    fn upload_metadata(&self, options: &WriteOptions) -> Object {
        let mut metadata = options.metadata.clone();
        match options.content_type.as_deref() {
            Some("auto") => {
                metadata.content_type = mime_guess::from_path(self.name()).first().map(|m| m.to_string());
            }
            Some(content_type) => metadata.content_type = Some(content_type.to_string()),
            None => {}
        }
        let gzip = match options.gzip {
            Gzip::Always => true,
            Gzip::Auto => metadata.content_type.as_deref().map(is_compressible).unwrap_or(false),
            Gzip::Never => false,
        };
        if gzip {
            metadata.content_encoding = Some("gzip".to_string());
        }
        metadata
    }

    async fn simple_upload<S>(
        &self,
        stream: S,
        encoder: &mut Encoder,
        metadata: &Object,
        options: &WriteOptions,
    ) -> Result<Object, Error>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send,
    {
        futures_util::pin_mut!(stream);
        let mut body = Vec::new();
        while let Some(chunk) = stream.next().await {
            encoder.push(&chunk?, &mut body)?;
        }
        encoder.finish(&mut body)?;
        tracing::trace!("simple upload of {} bytes to {}", body.len(), self.name());
        let object = self
            .client()
            .upload_object_multipart(&self.upload_request(options), metadata, body)
            .await?;
        Ok(object)
    }


    async fn resumable_upload<S>(
        &self,
        stream: S,
        encoder: &mut Encoder,
        metadata: &Object,
        options: &WriteOptions,
        store: &SessionStore,
        chunk_size: usize,
    ) -> Result<Object, Error>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send,
    {
        let key = format!("{}/{}", self.bucket().name(), self.name());
        let offset = options.offset.unwrap_or(0);
        let (session, progress) = self.open_session(&key, metadata, options, store).await?;

        let mut uploader = ChunkUploader {
            session: &session,
            buffer: Vec::new(),
            sent: offset,
            skip: 0,
            chunk_size,
            stalled: 0,
            done: None,
        };
        match progress {
            Progress::Persisted(persisted) => {
                uploader.sent = offset.max(persisted);
                uploader.skip = persisted.saturating_sub(offset);
            }
            Progress::Complete(object) => uploader.done = Some(object),
        }

        futures_util::pin_mut!(stream);
        while let Some(chunk) = stream.next().await {
            encoder.push(&chunk?, &mut uploader.buffer)?;
            uploader.flush().await?;
        }
        encoder.finish(&mut uploader.buffer)?;
        let object = uploader.finish().await?;
        store.remove(&key).await?;
        Ok(object)
    }

    /// Continues the explicit or persisted session of this object, or creates a new one.
    async fn open_session(
        &self,
        key: &str,
        metadata: &Object,
        options: &WriteOptions,
        store: &SessionStore,
    ) -> Result<(ResumableUploadClient, Progress), Error> {
        let uri = match &options.uri {
            Some(uri) => Some(uri.clone()),
            None => store.get(key).await,
        };
        if let Some(uri) = uri {
            let session = self.client().resumable_upload_client(&uri);
            match session.status(None).await {
                Ok(UploadStatus::ResumeIncomplete(end)) => {
                    let persisted = end.map(|v| v + 1).unwrap_or(0);
                    tracing::debug!("resuming upload of {} at byte {}", key, persisted);
                    return Ok((session, Progress::Persisted(persisted)));
                }
                Ok(UploadStatus::Ok(object)) => return Ok((session, Progress::Complete(object))),
                Err(e) if options.uri.is_none() && matches!(e.status(), Some(404) | Some(410)) => {
                    tracing::debug!("persisted session of {} expired", key);
                    store.remove(key).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
        let session = self
            .client()
            .prepare_resumable_upload(&self.upload_request(options), metadata, options.origin.as_deref())
            .await?;
        store.set(key, session.url()).await?;
        Ok((session, Progress::Persisted(0)))
    }

    /// Deletes an object whose stored hash disagrees with the sent data and
    /// describes the failure.
    async fn discard_upload(&self, verdict: Verdict, options: &WriteOptions) -> Error {
        let generation = Some(self.metadata.generation).filter(|v| *v != 0);
        let req = DeleteObjectRequest {
            bucket: self.bucket().name().to_string(),
            object: self.name().to_string(),
            generation: generation.or(self.generation()),
            user_project: self.billing(&options.user_project),
            ..Default::default()
        };
        tracing::debug!("uploaded data of {} does not match, deleting it", self.name());
        match self.client().delete_object(&req).await {
            Err(e) => Error::FileNoUploadDelete(e),
            Ok(()) if verdict == Verdict::Md5NotAvailable => Error::Md5NotAvailable,
            Ok(()) => Error::FileNoUpload,
        }
    }
}

/// State of a resumable session when the upload starts.
enum Progress {
    /// Number of bytes the server already holds.
    Persisted(u64),
    Complete(Object),
}

/// Consecutive chunk requests without progress before a session is abandoned.
const MAX_STALLED_REQUESTS: usize = 5;

/// Splits the encoded data into aligned chunks of a resumable session.
struct ChunkUploader<'a> {
    session: &'a ResumableUploadClient,
    buffer: Vec<u8>,
    /// Object offset of the first byte of `buffer`.
    sent: u64,
    /// Bytes at the head of the data the server already holds.
    skip: u64,
    chunk_size: usize,
    /// Requests in a row the server persisted nothing of.
    stalled: usize,
    done: Option<Object>,
}

impl ChunkUploader<'_> {
    /// Sends every full chunk but the last, which is held back until it is known
    /// whether more data follows.
    async fn flush(&mut self) -> Result<(), Error> {
        if self.skip > 0 {
            let n = self.skip.min(self.buffer.len() as u64) as usize;
            self.buffer.drain(..n);
            self.skip -= n as u64;
        }
        if self.done.is_some() {
            self.buffer.clear();
            return Ok(());
        }
        while self.buffer.len() > self.chunk_size {
            let rest = self.buffer.split_off(self.chunk_size);
            let chunk = std::mem::replace(&mut self.buffer, rest);
            let range = ChunkSize::new(self.sent, self.sent + chunk.len() as u64 - 1, None);
            let status = self.session.upload_multiple_chunk(chunk.clone(), &range).await?;
            self.accept(status, chunk)?;
        }
        Ok(())
    }

    /// Sends the remaining bytes with the object size until the server finalizes the upload.
    async fn finish(&mut self) -> Result<Object, Error> {
        self.flush().await?;
        let total = self.sent + self.buffer.len() as u64;
        loop {
            if let Some(object) = self.done.take() {
                return Ok(object);
            }
            let range = if self.buffer.is_empty() {
                ChunkSize::empty(Some(total))
            } else {
                ChunkSize::new(self.sent, total - 1, Some(total))
            };
            let chunk = std::mem::take(&mut self.buffer);
            let status = self.session.upload_multiple_chunk(chunk.clone(), &range).await?;
            self.accept(status, chunk)?;
        }
    }

    /// Advances past the persisted part of `chunk` and re-queues the rest.
    fn accept(&mut self, status: UploadStatus, mut chunk: Vec<u8>) -> Result<(), Error> {
        let upper = self.sent + chunk.len() as u64;
        match status {
            UploadStatus::Ok(object) => {
                self.sent = upper;
                self.done = Some(object);
            }
            UploadStatus::ResumeIncomplete(end) => {
                let persisted = end.map(|v| v + 1).unwrap_or(self.sent).clamp(self.sent, upper);
                if persisted > self.sent {
                    self.stalled = 0;
                } else {
                    self.stalled += 1;
                    if self.stalled >= MAX_STALLED_REQUESTS {
                        return Err(Error::UploadStalled(self.sent));
                    }
                }
                if persisted < upper {
                    let mut rest = chunk.split_off((persisted - self.sent) as usize);
                    rest.append(&mut self.buffer);
                    self.buffer = rest;
                }
                self.sent = persisted;
            }
        }
        Ok(())
    }
}

/// Gzip compression followed by hashing of the compressed bytes.
struct Encoder {
    gzip: Option<GzEncoder<Vec<u8>>>,
    hasher: Option<Hasher>,
    digest: Digest,
}

impl Encoder {
    fn new(gzip: bool, validation: Validation) -> Self {
        Self {
            gzip: gzip.then(|| GzEncoder::new(Vec::new(), Compression::default())),
            hasher: Some(Hasher::new(validation)),
            digest: Digest::default(),
        }
    }

    fn push(&mut self, data: &[u8], out: &mut Vec<u8>) -> Result<(), Error> {
        let encoded = match self.gzip.as_mut() {
            Some(gzip) => {
                gzip.write_all(data)?;
                std::mem::take(gzip.get_mut())
            }
            None => data.to_vec(),
        };
        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(&encoded);
        }
        out.extend_from_slice(&encoded);
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<u8>) -> Result<(), Error> {
        if let Some(gzip) = self.gzip.take() {
            let rest = gzip.finish()?;
            if let Some(hasher) = self.hasher.as_mut() {
                hasher.update(&rest);
            }
            out.extend_from_slice(&rest);
        }
        if let Some(hasher) = self.hasher.take() {
            self.digest = hasher.finish();
        }
        Ok(())
    }

    fn digest(&self) -> Digest {
        self.digest.clone()
    }
}

/// Session URIs of unfinished resumable uploads, keyed by `bucket/object`.
struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    fn new(config_path: Option<&Path>) -> Self {
        let path = match config_path {
            Some(path) => path.to_path_buf(),
            None => dirs::config_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("gcloud-storage-file")
                .join(SESSION_FILE),
        };
        Self { path }
    }

    fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    async fn is_writable(&self) -> bool {
        let dir = self.dir();
        if tokio::fs::create_dir_all(dir).await.is_err() {
            return false;
        }
        let probe = dir.join(format!(".{}.probe", std::process::id()));
        match tokio::fs::write(&probe, b"").await {
            Ok(()) => {
                let _ = tokio::fs::remove_file(&probe).await;
                true
            }
            Err(_) => false,
        }
    }

    async fn load(&self) -> HashMap<String, String> {
        match tokio::fs::read(&self.path).await {
            Ok(data) => serde_json::from_slice(&data).unwrap_or_default(),
            Err(_) => HashMap::new(),
        }
    }

    /// Replaces the file through a rename so readers never see a partial write.
    async fn store(&self, sessions: &HashMap<String, String>) -> Result<(), Error> {
        let tmp = self.path.with_extension(format!("{}.tmp", std::process::id()));
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(sessions)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Applies `f` to the persisted sessions, writing them back when it reports a change.
    async fn update(&self, f: impl FnOnce(&mut HashMap<String, String>) -> bool) -> Result<(), Error> {
        let _guard = SESSION_LOCK.lock().await;
        let mut sessions = self.load().await;
        if f(&mut sessions) {
            self.store(&sessions).await?;
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Option<String> {
        self.load().await.remove(key)
    }

    async fn set(&self, key: &str, uri: &str) -> Result<(), Error> {
        self.update(|sessions| {
            sessions.insert(key.to_string(), uri.to_string());
            true
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        self.update(|sessions| sessions.remove(key).is_some()).await
    }
}

fn is_compressible(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    essence.starts_with("text/")
        || essence.ends_with("+json")
        || essence.ends_with("+xml")
        || matches!(
            essence.as_str(),
            "application/json" | "application/javascript" | "application/x-javascript" | "application/xml"
        )
}
