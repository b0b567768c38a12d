use std::io::Write;
use std::path::Path;

use bytes::Bytes;
use flate2::write::GzDecoder;
use futures_util::{Stream, StreamExt, TryStreamExt};
use reqwest::header::CONTENT_ENCODING;
use tokio::io::AsyncWriteExt;

use crate::checksum::{self, Hasher, Validation, Verdict};
use crate::file::{Error, File};
use crate::http;
use crate::http::objects::download::Range;
use crate::http::objects::Object;

/// Options of a media download.
#[derive(Clone, Debug, Default)]
pub struct ReadOptions {
    /// Byte range to read. Any range disables validation.
    pub range: Range,
    pub validation: Validation,
    pub user_project: Option<String>,
}

/// An item of a validated read: object data, or the metadata it was checked against.
enum ReadItem {
    Data(Bytes),
    Metadata(Object),
}

impl File {
    /// Streams the object data.
    ///
    /// The bytes are hashed as received and, once the body is complete, compared with
    /// the hashes reported by fresh object metadata. A mismatch surfaces as the last
    /// item of the stream. Gzip encoded objects are decompressed on the fly.
    pub async fn create_read_stream(
        &self,
        options: ReadOptions,
    ) -> Result<impl Stream<Item = Result<Bytes, Error>> + Send + 'static, Error> {
        let items = self.read_items(options).await?;
        Ok(items.try_filter_map(|item| async move {
            Ok(match item {
                ReadItem::Data(chunk) => Some(chunk),
                ReadItem::Metadata(_) => None,
            })
        }))
    }

    async fn read_items(
        &self,
        options: ReadOptions,
    ) -> Result<impl Stream<Item = Result<ReadItem, Error>> + Send + 'static, Error> {
        let validation = if options.range.is_partial() {
            if options.validation != Validation::Disabled {
                tracing::debug!("skip validation of ranged read {:?}", options.range);
            }
            Validation::Disabled
        } else {
            options.validation
        };
        let req = self.get_request(&options.user_project);
        let client = self.client().clone();
        let response = client.download_object(&req, &options.range).await?;
        let gzipped = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("gzip"))
            .unwrap_or(false);

        Ok(async_stream::try_stream! {
            let mut hasher = Hasher::new(validation);
            let mut decoder = gzipped.then(|| GzDecoder::new(Vec::new()));
            let mut body = response.bytes_stream();
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(http::Error::from)?;
                hasher.update(&chunk);
                match decoder.as_mut() {
                    Some(decoder) => {
                        decoder.write_all(&chunk)?;
                        let inflated = std::mem::take(decoder.get_mut());
                        if !inflated.is_empty() {
                            yield ReadItem::Data(Bytes::from(inflated));
                        }
                    }
                    None => {
                        yield ReadItem::Data(chunk);
                    }
                }
            }
            if let Some(decoder) = decoder {
                let rest = decoder.finish()?;
                if !rest.is_empty() {
                    yield ReadItem::Data(Bytes::from(rest));
                }
            }
            if validation != Validation::Disabled {
                let remote = client.get_object(&req).await?;
                let verdict = checksum::verify(validation, &hasher.finish(), &remote);
                yield ReadItem::Metadata(remote);
                let verified = match verdict {
                    Verdict::Valid => Ok(()),
                    Verdict::Mismatch => Err(Error::ContentDownloadMismatch),
                    Verdict::Md5NotAvailable => Err(Error::Md5NotAvailable),
                };
                verified?;
            }
        })
    }

    /// Downloads the object data into memory. A validated download refreshes `metadata`.
    pub async fn download(&mut self, options: ReadOptions) -> Result<Bytes, Error> {
        let items = self.read_items(options).await?;
        futures_util::pin_mut!(items);
        let mut data = Vec::new();
        while let Some(item) = items.next().await {
            match item? {
                ReadItem::Data(chunk) => data.extend_from_slice(&chunk),
                ReadItem::Metadata(object) => self.metadata = object,
            }
        }
        Ok(Bytes::from(data))
    }

    /// Downloads the object data into a local file. The partially written file is
    /// removed when the download fails.
    pub async fn download_to(&mut self, path: impl AsRef<Path>, options: ReadOptions) -> Result<(), Error> {
        let path = path.as_ref();
        let result = self.write_to(path, options).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(path).await;
        }
        result
    }

    async fn write_to(&mut self, path: &Path, options: ReadOptions) -> Result<(), Error> {
        let items = self.read_items(options).await?;
        futures_util::pin_mut!(items);
        let mut file = tokio::fs::File::create(path).await?;
        while let Some(item) = items.next().await {
            match item? {
                ReadItem::Data(chunk) => file.write_all(&chunk).await?,
                ReadItem::Metadata(object) => self.metadata = object,
            }
        }
        file.flush().await?;
        Ok(())
    }
}
