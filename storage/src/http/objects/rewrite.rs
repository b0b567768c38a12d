use reqwest_middleware::{ClientWithMiddleware as Client, RequestBuilder};

use crate::http::object_access_controls::{PredefinedObjectAcl, Projection};
use crate::http::objects::{Encryption, Object};
use crate::http::Escape;

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RewriteObjectRequest {
    /// Name of the bucket in which to store the new object.
    #[serde(skip_serializing)]
    pub destination_bucket: String,
    /// Name of the new object.
    #[serde(skip_serializing)]
    pub destination_object: String,
    /// Name of the bucket in which to find the source object.
    #[serde(skip_serializing)]
    pub source_bucket: String,
    /// Name of the source object.
    #[serde(skip_serializing)]
    pub source_object: String,
    /// Makes the operation conditional on whether the destination object's current generation
    /// matches the given value. Setting to 0 makes the operation succeed only if
    /// there are no live versions of the object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_generation_match: Option<i64>,
    /// Makes the operation conditional on whether the source object's current
    /// metageneration matches the given value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_source_metageneration_match: Option<i64>,
    /// Resource name of the Cloud KMS key that will be used to encrypt the object.
    /// If the parameter is not specified, the request uses the destination bucket's default encryption key,
    /// if any, or the Google-managed encryption key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_kms_key_name: Option<String>,
    /// Apply a predefined set of access controls to the destination object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_predefined_acl: Option<PredefinedObjectAcl>,
    /// The maximum number of bytes that will be rewritten per rewrite request.
    /// If specified the value must be an integral multiple of 1 MiB (1048576),
    /// and must not change across rewrite calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bytes_rewritten_per_call: Option<i64>,
    /// Set of properties to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<Projection>,
    /// If present, selects a specific revision of the source object (as opposed to the latest version, the default).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_generation: Option<i64>,
    /// Include this field (from the previous rewrite response) on each rewrite request
    /// after the first one, until the rewrite response 'done' flag is true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewrite_token: Option<String>,
    /// The project to be billed for this request. Required for Requester Pays buckets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_project: Option<String>,
    /// Destination object metadata.
    #[serde(skip_serializing)]
    pub destination_metadata: Option<Object>,
    /// Source encryption setting
    #[serde(skip_serializing)]
    pub source_encryption: Option<Encryption>,
    /// Destination encryption setting
    #[serde(skip_serializing)]
    pub destination_encryption: Option<Encryption>,
}

/// A rewrite response.
#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RewriteObjectResponse {
    /// The total bytes written so far, which can be used to provide a waiting user
    /// with a progress indicator. This property is always present in the response.
    #[serde(default, deserialize_with = "crate::http::from_str")]
    pub total_bytes_rewritten: i64,
    /// The total size of the object being copied in bytes. This property is always
    /// present in the response.
    #[serde(default, deserialize_with = "crate::http::from_str")]
    pub object_size: i64,
    /// `true` if the copy is finished; otherwise, `false` if
    /// the copy is in progress. This property is always present in the response.
    #[serde(default)]
    pub done: bool,
    /// A token to use in subsequent requests to continue copying data. This token
    /// is present in the response only when there is more data to copy.
    pub rewrite_token: Option<String>,
    /// A resource containing the metadata for the copied-to object. This property
    /// is present in the response only when copying completes.
    pub resource: Option<Object>,
}

pub(crate) fn build(base_url: &str, client: &Client, req: &RewriteObjectRequest) -> RequestBuilder {
    let url = format!(
        "{}/b/{}/o/{}/rewriteTo/b/{}/o/{}",
        base_url,
        req.source_bucket.escape(),
        req.source_object.escape(),
        req.destination_bucket.escape(),
        req.destination_object.escape()
    );
    let body = req.destination_metadata.clone().unwrap_or_default();
    let mut builder = client.post(url).query(&req).json(&body);
    if let Some(e) = &req.destination_encryption {
        builder = e.with_headers(builder)
    }
    if let Some(e) = &req.source_encryption {
        e.with_copy_source_headers(builder)
    } else {
        builder
    }
}
