use crate::http;
use crate::sign::SigningError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] http::Error),

    #[error("The downloaded data did not match the data from the server. To be sure the content is the same, you should download the file again.")]
    ContentDownloadMismatch,

    #[error("MD5 verification was specified, but is not available for the requested object. MD5 is not available for composite objects.")]
    Md5NotAvailable,

    #[error("The uploaded data did not match the data from the server. As a precaution, the file has been deleted. To be sure the content is the same, you should try uploading the file again.")]
    FileNoUpload,

    #[error("The uploaded data did not match the data from the server. As a precaution, we attempted to delete the file, but it was not successful. To be sure the content is the same, you should try removing the file manually, then uploading the file again.\n\nThe delete attempt failed with this message:\n\n  {0}")]
    FileNoUploadDelete(#[source] http::Error),

    #[error("A resumable upload could not be performed. The directory, {0}, is not writable. You may try another upload, this time setting `resumable` to `false`.")]
    ResumableUploadUnavailable(String),

    #[error("rewrite of the object did not complete within {0} calls")]
    RewriteLimitExceeded(usize),

    #[error("An expiration time is not available.")]
    ExpirationTimeNotAvailable,

    #[error("Destination file should have a name: {0}")]
    InvalidDestination(String),

    #[error("resumable upload made no progress at byte {0}, the session is kept for a later retry")]
    UploadStalled(u64),

    #[error("chunk size must be a non-zero multiple of 256 KiB: {0}")]
    InvalidChunkSize(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Signing(#[from] SigningError),
}

impl Error {
    /// The stable code of integrity failures, as used by every Cloud Storage client.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Error::ContentDownloadMismatch => Some("CONTENT_DOWNLOAD_MISMATCH"),
            Error::Md5NotAvailable => Some("MD5_NOT_AVAILABLE"),
            Error::FileNoUpload => Some("FILE_NO_UPLOAD"),
            Error::FileNoUploadDelete(_) => Some("FILE_NO_UPLOAD_DELETE"),
            _ => None,
        }
    }

    /// The HTTP status of a failed request, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http(e) => e.status(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use crate::file::Error;
    use crate::http;

    #[test]
    fn test_code() {
        assert_eq!(Error::ContentDownloadMismatch.code(), Some("CONTENT_DOWNLOAD_MISMATCH"));
        assert_eq!(Error::Md5NotAvailable.code(), Some("MD5_NOT_AVAILABLE"));
        assert_eq!(Error::FileNoUpload.code(), Some("FILE_NO_UPLOAD"));
        let err = Error::FileNoUploadDelete(http::Error::RawResponse(403, "forbidden".to_string()));
        assert_eq!(err.code(), Some("FILE_NO_UPLOAD_DELETE"));
        assert!(err.to_string().ends_with("failed with this message:\n\n  request failed: status=403 detail=forbidden"));
        assert_eq!(Error::ExpirationTimeNotAvailable.code(), None);
    }
}
