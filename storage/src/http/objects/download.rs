use reqwest::header::{ACCEPT_ENCODING, RANGE};
use reqwest_middleware::{ClientWithMiddleware as Client, RequestBuilder};

use crate::http::objects::get::GetObjectRequest;
use crate::http::Escape;

/// Byte range of a media download.
///
/// * `Range(Some(0), Some(1999))` → `bytes=0-1999` (first 2000 bytes)
/// * `Range(None, Some(2000))` → `bytes=-2000` (last 2000 bytes)
/// * `Range(Some(2000), None)` → `bytes=2000-` (from byte 2000 to end of file)
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Range(pub Option<u64>, pub Option<u64>);

impl Range {
    /// Whether only part of the object is requested.
    pub fn is_partial(&self) -> bool {
        self.0.is_some() || self.1.is_some()
    }

    fn header_value(&self) -> Option<String> {
        match (self.0, self.1) {
            (Some(from), Some(to)) => Some(format!("bytes={from}-{to}")),
            (Some(from), None) => Some(format!("bytes={from}-")),
            (None, Some(reverse_from)) => Some(format!("bytes=-{reverse_from}")),
            (None, None) => None,
        }
    }
}

pub(crate) fn build(base_url: &str, client: &Client, req: &GetObjectRequest, range: &Range) -> RequestBuilder {
    let url = format!("{}/b/{}/o/{}?alt=media", base_url, req.bucket.escape(), req.object.escape());
    let mut builder = client.get(url).query(&req).header(ACCEPT_ENCODING, "gzip");
    if let Some(value) = range.header_value() {
        builder = builder.header(RANGE, value);
    }
    if let Some(e) = &req.encryption {
        e.with_headers(builder)
    } else {
        builder
    }
}
