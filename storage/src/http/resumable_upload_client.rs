use std::fmt;

use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE};
use reqwest::{Body, Response};
use reqwest_middleware::ClientWithMiddleware as Client;

use crate::http::{check_response_status, objects::Object, Error};

/// Granularity required by the resumable protocol for every non-final chunk.
pub const CHUNK_ALIGNMENT: usize = 256 * 1024;

#[derive(PartialEq, Debug)]
pub enum UploadStatus {
    Ok(Object),
    /// The server holds `0..=n` bytes, or nothing when `None`.
    ResumeIncomplete(Option<u64>),
}

/// The `Content-Range` of one chunk of a resumable upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkSize {
    first_byte: u64,
    last_byte: u64,
    total_object_size: Option<u64>,
    empty: bool,
}

impl fmt::Display for ChunkSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.empty {
            write!(f, "bytes */")?;
        } else {
            write!(f, "bytes {}-{}/", self.first_byte, self.last_byte)?;
        }

        match self.total_object_size {
            Some(total_object_size) => write!(f, "{total_object_size}"),
            None => write!(f, "*"),
        }
    }
}

impl ChunkSize {
    pub fn new(first_byte: u64, last_byte: u64, total_object_size: Option<u64>) -> ChunkSize {
        Self {
            first_byte,
            last_byte,
            total_object_size,
            empty: false,
        }
    }

    /// A zero length range, used to query or finalize a session.
    pub fn empty(total_object_size: Option<u64>) -> ChunkSize {
        Self {
            first_byte: 0,
            last_byte: 0,
            total_object_size,
            empty: true,
        }
    }

    pub fn size(&self) -> u64 {
        if self.empty {
            0
        } else {
            self.last_byte - self.first_byte + 1
        }
    }
}

#[derive(Clone)]
pub struct ResumableUploadClient {
    session_url: String,
    http: Client,
}

impl ResumableUploadClient {
    pub fn url(&self) -> &str {
        self.session_url.as_str()
    }

    pub fn new(session_url: String, http: Client) -> Self {
        Self { session_url, http }
    }

    /// https://cloud.google.com/storage/docs/performing-resumable-uploads#chunked-upload
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn upload_multiple_chunk<T: Into<Body>>(&self, data: T, size: &ChunkSize) -> Result<UploadStatus, Error> {
        let response = self
            .http
            .put(&self.session_url)
            .header(CONTENT_RANGE, size.to_string())
            .header(CONTENT_LENGTH, size.size())
            .body(data)
            .send()
            .await?;
        Self::map_resume_response(response).await
    }

    /// https://cloud.google.com/storage/docs/performing-resumable-uploads#status-check
    pub async fn status(&self, object_size: Option<u64>) -> Result<UploadStatus, Error> {
        self.upload_multiple_chunk(Vec::new(), &ChunkSize::empty(object_size))
            .await
    }

    async fn map_resume_response(response: Response) -> Result<UploadStatus, Error> {
        if response.status() == 308 {
            let persisted = response
                .headers()
                .get("Range")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_range_end);
            Ok(UploadStatus::ResumeIncomplete(persisted))
        } else {
            let response = check_response_status(response).await?;
            Ok(UploadStatus::Ok(response.json::<Object>().await?))
        }
    }
}

/// Parses `bytes=0-N` into `N`.
fn parse_range_end(value: &str) -> Option<u64> {
    value.strip_prefix("bytes=")?.split('-').nth(1)?.parse().ok()
}
