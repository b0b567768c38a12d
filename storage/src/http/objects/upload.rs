use base64::prelude::*;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest_middleware::{ClientWithMiddleware as Client, RequestBuilder};
use ring::error::Unspecified;
use ring::rand::{SecureRandom, SystemRandom};

use crate::http::object_access_controls::{PredefinedObjectAcl, Projection};
use crate::http::objects::{Encryption, Object};
use crate::http::{Error, Escape};

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UploadObjectRequest {
    /// Required. Name of the bucket in which to store the new object.
    #[serde(skip_serializing)]
    pub bucket: String,
    /// Name of the object.
    pub name: String,
    /// Makes the operation conditional on whether the object's current generation
    /// matches the given value. Setting to 0 makes the operation succeed only if
    /// there are no live versions of the object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_generation_match: Option<i64>,
    /// Makes the operation conditional on whether the object's current
    /// metageneration matches the given value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_metageneration_match: Option<i64>,
    /// Resource name of the Cloud KMS key that will be used to encrypt the object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kms_key_name: Option<String>,
    /// Apply a predefined set of access controls to this object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predefined_acl: Option<PredefinedObjectAcl>,
    /// Set of properties to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<Projection>,
    /// The project to be billed for this request. Required for Requester Pays buckets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_project: Option<String>,
    /// Customer-supplied encryption key for the new object.
    #[serde(skip_serializing)]
    pub encryption: Option<Encryption>,
}

/// https://cloud.google.com/storage/docs/uploading-objects#uploading-an-object
pub(crate) fn build_multipart(
    base_url: &str,
    client: &Client,
    req: &UploadObjectRequest,
    metadata: &Object,
    data: Vec<u8>,
) -> Result<RequestBuilder, Error> {
    let url = format!("{}/b/{}/o?uploadType=multipart", base_url, req.bucket.escape());
    let boundary = boundary()?;
    let body = multipart_related_body(&boundary, metadata, data)?;
    let builder = client
        .post(url)
        .query(&req)
        .header(CONTENT_TYPE, format!("multipart/related; boundary={boundary}"))
        .header(CONTENT_LENGTH, body.len())
        .body(body);
    Ok(if let Some(e) = &req.encryption {
        e.with_headers(builder)
    } else {
        builder
    })
}

/// https://cloud.google.com/storage/docs/performing-resumable-uploads#initiate-session
pub(crate) fn build_resumable_session(
    base_url: &str,
    client: &Client,
    req: &UploadObjectRequest,
    metadata: &Object,
    origin: Option<&str>,
) -> RequestBuilder {
    let url = format!("{}/b/{}/o?uploadType=resumable", base_url, req.bucket.escape());
    let mut builder = client.post(url).query(&req).json(metadata);
    if let Some(content_type) = &metadata.content_type {
        builder = builder.header("X-Upload-Content-Type", content_type);
    }
    if let Some(origin) = origin {
        builder = builder.header("Origin", origin);
    }
    if let Some(e) = &req.encryption {
        e.with_headers(builder)
    } else {
        builder
    }
}

fn boundary() -> Result<String, Error> {
    boundary_with(|seed| SystemRandom::new().fill(seed))
}

fn boundary_with(fill: impl FnOnce(&mut [u8]) -> Result<(), Unspecified>) -> Result<String, Error> {
    let mut seed = [0u8; 18];
    fill(&mut seed).map_err(|_| Error::Entropy)?;
    Ok(format!("gcloud_storage_{}", BASE64_URL_SAFE_NO_PAD.encode(seed)))
}

fn multipart_related_body(boundary: &str, metadata: &Object, data: Vec<u8>) -> Result<Vec<u8>, serde_json::Error> {
    let content_type = metadata
        .content_type
        .as_deref()
        .unwrap_or("application/octet-stream");
    let mut body = Vec::with_capacity(data.len() + 512);
    body.extend_from_slice(format!("--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n").as_bytes());
    body.extend_from_slice(&serde_json::to_vec(metadata)?);
    body.extend_from_slice(format!("\r\n--{boundary}\r\nContent-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(&data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    Ok(body)
}
