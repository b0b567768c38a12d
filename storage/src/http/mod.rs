use std::fmt::Display;
use std::str::FromStr;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Response;
use serde::{de, Deserialize, Deserializer};
use serde_json::Value;

pub mod channels;
pub mod error;
pub mod notifications;
pub mod object_access_controls;
pub mod objects;
pub mod resumable_upload_client;
pub mod service_account_client;
pub mod storage_client;

#[cfg(test)]
pub(crate) mod testing;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An error returned from the Google Cloud Storage service.
    #[error(transparent)]
    Response(#[from] error::ErrorResponse),

    /// An error from the underlying HTTP client.
    #[error(transparent)]
    HttpClient(#[from] reqwest::Error),

    /// An error from one of the middleware used.
    #[error(transparent)]
    HttpMiddleware(anyhow::Error),

    /// An error from a token source.
    #[error("token source failed: {0}")]
    TokenSource(Box<dyn std::error::Error + Send + Sync>),

    /// The upload endpoint did not hand out a resumable session.
    #[error("no session location returned for resumable upload")]
    MissingLocation,

    /// The system random source failed.
    #[error("no entropy available to build a multipart boundary")]
    Entropy,

    /// A request body could not be encoded.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// A non-JSON error body, kept verbatim.
    #[error("request failed: status={0} detail={1}")]
    RawResponse(u16, String),
}

impl Error {
    /// The HTTP status code of the failed request, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Response(e) => Some(e.code),
            Error::HttpClient(e) => e.status().map(|s| s.as_u16()),
            Error::RawResponse(code, _) => Some(*code),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// The resource already exists, e.g. it was created concurrently.
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }
}

impl From<reqwest_middleware::Error> for Error {
    fn from(error: reqwest_middleware::Error) -> Self {
        match error {
            reqwest_middleware::Error::Middleware(err) => Error::HttpMiddleware(err),
            reqwest_middleware::Error::Reqwest(err) => Error::HttpClient(err),
        }
    }
}

/// Checks whether an HTTP response is successful and returns it, or returns an error.
pub(crate) async fn check_response_status(response: Response) -> Result<Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    // try to extract a response error, falling back to the raw body if it can not be parsed.
    let text = response.text().await?;
    Err(match serde_json::from_str::<error::ErrorWrapper>(&text) {
        Ok(wrapper) => Error::Response(wrapper.error),
        Err(_) => Error::RawResponse(status.as_u16(), text),
    })
}

pub(crate) trait Escape {
    fn escape(&self) -> String;
}

impl Escape for String {
    fn escape(&self) -> String {
        self.as_str().escape()
    }
}

impl Escape for str {
    fn escape(&self) -> String {
        utf8_percent_encode(self, ENCODE_SET).to_string()
    }
}

const ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'*').remove(b'-').remove(b'.').remove(b'_');

pub(crate) fn from_str_option<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: FromStr,
    T::Err: Display,
    D: Deserializer<'de>,
{
    let s: Result<Value, _> = Deserialize::deserialize(deserializer);
    match s {
        Ok(Value::String(s)) => T::from_str(&s).map_err(de::Error::custom).map(Some),
        Ok(Value::Number(num)) => T::from_str(&num.to_string()).map_err(de::Error::custom).map(Some),
        Ok(Value::Null) => Ok(None),
        Ok(_) => Err(de::Error::custom("Incorrect type")),
        Err(_) => Ok(None),
    }
}

pub fn from_str<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: FromStr,
    T::Err: Display,
    D: de::Deserializer<'de>,
{
    let s: Value = Deserialize::deserialize(deserializer)?;
    match s {
        Value::String(s) => T::from_str(&s).map_err(de::Error::custom),
        Value::Number(num) => T::from_str(&num.to_string()).map_err(de::Error::custom),
        _ => Err(de::Error::custom("Incorrect type")),
    }
}

pub fn is_i64_zero(num: &i64) -> bool {
    *num == 0
}

#[cfg(test)]
mod test {
    use serde::Deserialize;

    use crate::http::{Error, Escape};

    #[derive(Deserialize)]
    struct Counted {
        #[serde(default, deserialize_with = "crate::http::from_str")]
        size: i64,
        #[serde(default, deserialize_with = "crate::http::from_str_option")]
        generation: Option<i64>,
    }

    #[test]
    fn test_escape() {
        assert_eq!("folder%2Ffile%20name.txt", "folder/file name.txt".escape());
        assert_eq!("a-b_c.d*", "a-b_c.d*".to_string().escape());
    }

    #[test]
    fn test_int64_as_string() {
        let v: Counted = serde_json::from_str(r#"{"size":"1024","generation":"17"}"#).unwrap();
        assert_eq!(v.size, 1024);
        assert_eq!(v.generation, Some(17));

        let v: Counted = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(v.size, 0);
        assert_eq!(v.generation, None);
    }

    #[test]
    fn test_status_classes() {
        let conflict = Error::RawResponse(409, "conflict".to_string());
        assert!(conflict.is_conflict());
        assert!(!conflict.is_not_found());
        let missing = Error::RawResponse(404, "missing".to_string());
        assert!(missing.is_not_found());
        assert!(!missing.is_conflict());
        assert!(!Error::MissingLocation.is_conflict());
    }
}
