use std::sync::Arc;

use async_trait::async_trait;
use base64::prelude::*;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use pkcs8::SecretDocument;
use ring::{rand, signature};
use serde_json::{json, Value};
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use url::Url;

use crate::http;
use crate::http::service_account_client::ServiceAccountClient;

const STORAGE_DOWNLOAD_BASE_URL: &str = "https://storage.googleapis.com";

/// Characters kept as-is by `encodeURIComponent`; the v2 signature covers the encoded name.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(thiserror::Error, Debug)]
pub enum SigningError {
    #[error("An expiration date cannot be in the past.")]
    ExpirationInPast,
    #[error("invalid private key: {0}")]
    InvalidKey(String),
    #[error("signing failed: {0}")]
    Sign(String),
    #[error(transparent)]
    SignBlob(#[from] http::Error),
    #[error(transparent)]
    InvalidUrl(#[from] url::ParseError),
    #[error(transparent)]
    Format(#[from] time::error::Format),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("no signer is configured")]
    NoSigner,
}

/// How the client signs URLs and policies.
#[derive(Clone)]
pub enum SignBy {
    /// PEM encoded PKCS#8 private key of the service account.
    PrivateKey(String),
    /// IAM credentials `signBlob` as the service account.
    SignBytes,
    Custom(Arc<dyn Signer>),
}

/// Produces RSA-SHA256 signatures on behalf of a service account.
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign(&self, blob: &[u8]) -> Result<Vec<u8>, SigningError>;

    /// The service account the signatures belong to, used as `GoogleAccessId`.
    fn client_email(&self) -> &str;
}

/// Signs locally with a service account private key.
pub struct PrivateKeySigner {
    client_email: String,
    key_pair: signature::RsaKeyPair,
}

impl PrivateKeySigner {
    /// Parses a PEM encoded PKCS#8 key, as found in the `private_key` field of a credentials file.
    pub fn from_pem(client_email: impl Into<String>, pem: &str) -> Result<Self, SigningError> {
        let (label, doc) = SecretDocument::from_pem(pem).map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        if label != "PRIVATE KEY" {
            return Err(SigningError::InvalidKey(format!("unexpected label {label}")));
        }
        let key_pair =
            signature::RsaKeyPair::from_pkcs8(doc.as_bytes()).map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        Ok(Self {
            client_email: client_email.into(),
            key_pair,
        })
    }
}

#[async_trait]
impl Signer for PrivateKeySigner {
    async fn sign(&self, blob: &[u8]) -> Result<Vec<u8>, SigningError> {
        let mut signed = vec![0; self.key_pair.public().modulus_len()];
        self.key_pair
            .sign(&signature::RSA_PKCS1_SHA256, &rand::SystemRandom::new(), blob, &mut signed)
            .map_err(|e| SigningError::Sign(e.to_string()))?;
        Ok(signed)
    }

    fn client_email(&self) -> &str {
        &self.client_email
    }
}

/// Delegates signing to the IAM credentials `signBlob` API.
pub struct IamSigner {
    client_email: String,
    client: ServiceAccountClient,
}

impl IamSigner {
    pub fn new(client_email: impl Into<String>, client: ServiceAccountClient) -> Self {
        Self {
            client_email: client_email.into(),
            client,
        }
    }
}

#[async_trait]
impl Signer for IamSigner {
    async fn sign(&self, blob: &[u8]) -> Result<Vec<u8>, SigningError> {
        let name = format!("projects/-/serviceAccounts/{}", self.client_email);
        Ok(self.client.sign_blob(&name, blob).await?)
    }

    fn client_email(&self) -> &str {
        &self.client_email
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum SignedUrlAction {
    #[default]
    Read,
    Write,
    Delete,
    /// Starts a resumable upload session.
    Resumable,
}

impl SignedUrlAction {
    pub fn method(&self) -> &'static str {
        match self {
            SignedUrlAction::Read => "GET",
            SignedUrlAction::Write => "PUT",
            SignedUrlAction::Delete => "DELETE",
            SignedUrlAction::Resumable => "POST",
        }
    }
}

/// Options of a v2 signed URL.
#[derive(Clone, Debug)]
pub struct SignedUrlConfig {
    pub action: SignedUrlAction,
    pub expires: OffsetDateTime,
    /// Base64 MD5 the client must send as `Content-MD5`.
    pub content_md5: Option<String>,
    /// Content type the client must send.
    pub content_type: Option<String>,
    /// Headers the client must send, signed in the given order.
    pub extension_headers: Vec<(String, String)>,
    /// File name offered to the browser, as `attachment; filename="..."`.
    pub prompt_save_as: Option<String>,
    /// Raw `response-content-disposition`; takes precedence over `prompt_save_as`.
    pub response_disposition: Option<String>,
    pub response_type: Option<String>,
    /// Custom domain serving the bucket, e.g. `https://cdn.example.com`.
    pub cname: Option<String>,
}

impl Default for SignedUrlConfig {
    fn default() -> Self {
        Self {
            action: SignedUrlAction::Read,
            expires: OffsetDateTime::now_utc() + time::Duration::minutes(10),
            content_md5: None,
            content_type: None,
            extension_headers: vec![],
            prompt_save_as: None,
            response_disposition: None,
            response_type: None,
            cname: None,
        }
    }
}

/// Conditions of a signed POST policy document.
#[derive(Clone, Debug)]
pub struct SignedPolicyConfig {
    pub expires: OffsetDateTime,
    /// `["eq", field, value]` conditions.
    pub equals: Vec<(String, String)>,
    /// `["starts-with", field, prefix]` conditions.
    pub starts_with: Vec<(String, String)>,
    pub acl: Option<String>,
    pub success_redirect: Option<String>,
    pub success_status: Option<String>,
    /// Inclusive `(min, max)` size of the upload in bytes.
    pub content_length_range: Option<(u64, u64)>,
}

impl Default for SignedPolicyConfig {
    fn default() -> Self {
        Self {
            expires: OffsetDateTime::now_utc() + time::Duration::minutes(10),
            equals: vec![],
            starts_with: vec![],
            acl: None,
            success_redirect: None,
            success_status: None,
            content_length_range: None,
        }
    }
}

/// A signed policy document for HTML form uploads.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SignedPolicy {
    /// The JSON document.
    pub string: String,
    /// The base64 encoded document, sent as the `policy` form field.
    pub base64: String,
    /// The base64 signature of `base64`.
    pub signature: String,
}

#[derive(serde::Serialize)]
struct PolicyDocument {
    expiration: String,
    conditions: Vec<Value>,
}

pub(crate) fn check_expiration(expires: OffsetDateTime, now: OffsetDateTime) -> Result<(), SigningError> {
    if expires < now {
        return Err(SigningError::ExpirationInPast);
    }
    Ok(())
}

/// Rejects expirations before `now`; returns the expiration in whole seconds.
fn expires_in_seconds(expires: OffsetDateTime, now: OffsetDateTime) -> Result<i64, SigningError> {
    check_expiration(expires, now)?;
    let millis = (expires.unix_timestamp_nanos() / 1_000_000) as i64;
    Ok((millis + 500).div_euclid(1000))
}

pub(crate) async fn signed_url(
    signer: &dyn Signer,
    bucket: &str,
    name: &str,
    generation: Option<i64>,
    config: &SignedUrlConfig,
    now: OffsetDateTime,
) -> Result<String, SigningError> {
    let expires = expires_in_seconds(config.expires, now)?;
    let encoded_name = utf8_percent_encode(name, COMPONENT).to_string();

    let mut extension_headers = config.extension_headers.clone();
    if config.action == SignedUrlAction::Resumable {
        match extension_headers.iter_mut().find(|(k, _)| k == "x-goog-resumable") {
            Some(header) => header.1 = "start".to_string(),
            None => extension_headers.push(("x-goog-resumable".to_string(), "start".to_string())),
        }
    }
    let extension_headers: String = extension_headers.iter().map(|(k, v)| format!("{k}:{v}\n")).collect();

    let blob = format!(
        "{}\n{}\n{}\n{}\n{}/{}/{}",
        config.action.method(),
        config.content_md5.as_deref().unwrap_or_default(),
        config.content_type.as_deref().unwrap_or_default(),
        expires,
        extension_headers,
        bucket,
        encoded_name
    );
    tracing::trace!("signed url blob={:?}", blob);
    let signature = BASE64_STANDARD.encode(signer.sign(blob.as_bytes()).await?);

    let mut query = vec![
        ("GoogleAccessId", signer.client_email().to_string()),
        ("Expires", expires.to_string()),
        ("Signature", signature),
    ];
    if let Some(response_type) = &config.response_type {
        query.push(("response-content-type", response_type.clone()));
    }
    let disposition = match (&config.response_disposition, &config.prompt_save_as) {
        (Some(disposition), _) => Some(disposition.clone()),
        (None, Some(save_as)) => Some(format!("attachment; filename=\"{save_as}\"")),
        (None, None) => None,
    };
    if let Some(disposition) = disposition {
        query.push(("response-content-disposition", disposition));
    }
    if let Some(generation) = generation {
        query.push(("generation", generation.to_string()));
    }
    let query = query
        .iter()
        .map(|(k, v)| format!("{}={}", k, utf8_percent_encode(v, COMPONENT)))
        .collect::<Vec<_>>()
        .join("&");

    let base = Url::parse(config.cname.as_deref().unwrap_or(STORAGE_DOWNLOAD_BASE_URL))?;
    let host = base.host_str().unwrap_or_default();
    let path = match &config.cname {
        Some(_) => encoded_name,
        None => format!("{bucket}/{encoded_name}"),
    };
    Ok(format!("{}://{}/{}?{}", base.scheme(), host, path, query))
}

pub(crate) fn policy_document(
    bucket: &str,
    name: &str,
    config: &SignedPolicyConfig,
    now: OffsetDateTime,
) -> Result<String, SigningError> {
    check_expiration(config.expires, now)?;
    let mut conditions = vec![json!(["eq", "$key", name]), json!({ "bucket": bucket })];
    for (field, value) in &config.equals {
        conditions.push(json!(["eq", field, value]));
    }
    for (field, prefix) in &config.starts_with {
        conditions.push(json!(["starts-with", field, prefix]));
    }
    if let Some(acl) = &config.acl {
        conditions.push(json!({ "acl": acl }));
    }
    if let Some(redirect) = &config.success_redirect {
        conditions.push(json!({ "success_action_redirect": redirect }));
    }
    if let Some(status) = &config.success_status {
        conditions.push(json!({ "success_action_status": status }));
    }
    if let Some((min, max)) = config.content_length_range {
        conditions.push(json!(["content-length-range", min, max]));
    }
    let expiration = config
        .expires
        .to_offset(UtcOffset::UTC)
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
        ))?;
    Ok(serde_json::to_string(&PolicyDocument { expiration, conditions })?)
}

pub(crate) async fn signed_policy(
    signer: &dyn Signer,
    bucket: &str,
    name: &str,
    config: &SignedPolicyConfig,
    now: OffsetDateTime,
) -> Result<SignedPolicy, SigningError> {
    let string = policy_document(bucket, name, config, now)?;
    let base64 = BASE64_STANDARD.encode(&string);
    let signature = BASE64_STANDARD.encode(signer.sign(base64.as_bytes()).await?);
    Ok(SignedPolicy {
        string,
        base64,
        signature,
    })
}
