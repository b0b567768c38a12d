use std::collections::HashMap;

use base64::prelude::*;
use reqwest_middleware::RequestBuilder;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::http::object_access_controls::ObjectAccessControl;

pub mod delete;
pub mod download;
pub mod get;
pub mod patch;
pub mod rewrite;
pub mod upload;

/// An object.
#[derive(Clone, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Object {
    /// The link to this object.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub self_link: String,
    /// The media link to this object.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub media_link: String,
    /// Content-Encoding of the object data, matching
    /// \[<https://tools.ietf.org/html/rfc7231#section-3.1.2.2\][RFC> 7231 §3.1.2.2]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    /// Content-Disposition of the object data, matching
    /// \[<https://tools.ietf.org/html/rfc6266\][RFC> 6266].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_disposition: Option<String>,
    /// Cache-Control directive for the object data.
    /// If omitted, and the object is accessible to all anonymous users, the
    /// default will be `public, max-age=3600`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    /// Access controls on the object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acl: Option<Vec<ObjectAccessControl>>,
    /// Content-Language of the object data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_language: Option<String>,
    /// The version of the metadata for this object at this generation.
    #[serde(default, skip_serializing_if = "crate::http::is_i64_zero")]
    #[serde(deserialize_with = "crate::http::from_str")]
    pub metageneration: i64,
    /// The deletion time of the object. Will be returned if and only if this
    /// version of the object has been deleted.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub time_deleted: Option<OffsetDateTime>,
    /// Content-Type of the object data.
    /// If an object is stored without a Content-Type, it is served as
    /// `application/octet-stream`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Content-Length of the object data in bytes.
    #[serde(default, skip_serializing_if = "crate::http::is_i64_zero")]
    #[serde(deserialize_with = "crate::http::from_str")]
    pub size: i64,
    /// The creation time of the object.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub time_created: Option<OffsetDateTime>,
    /// CRC32c checksum, base64 encoded in big-endian byte order. This is a server
    /// determined value; any value sent by the client is ignored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crc32c: Option<String>,
    /// MD5 hash of the data, base64 encoded. Not present for composite objects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5_hash: Option<String>,
    /// HTTP 1.1 Entity tag for the object.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub etag: String,
    /// The modification time of the object metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated: Option<OffsetDateTime>,
    /// Storage class of the object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
    /// Cloud KMS Key used to encrypt this object, if the object is encrypted by
    /// such a key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kms_key_name: Option<String>,
    /// The time at which the object's storage class was last changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub time_storage_class_updated: Option<OffsetDateTime>,
    /// Whether an object is under temporary hold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporary_hold: Option<bool>,
    /// A server-determined value that specifies the earliest time that the
    /// object's retention period expires.
    /// Not provided for objects with an active event-based hold.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub retention_expiration_time: Option<OffsetDateTime>,
    /// User-provided metadata, in key/value pairs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
    /// Whether an object is under event-based hold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_based_hold: Option<bool>,
    /// The name of the object.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// The ID of the object, including the bucket name, object name, and
    /// generation number.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// The name of the bucket containing this object.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bucket: String,
    /// The content generation of this object. Used for object versioning.
    #[serde(default, skip_serializing_if = "crate::http::is_i64_zero")]
    #[serde(deserialize_with = "crate::http::from_str")]
    pub generation: i64,
    /// The owner of the object. This will always be the uploader of the object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<Owner>,
    /// Metadata of customer-supplied encryption key, if the object is encrypted by
    /// such a key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_encryption: Option<CustomerEncryption>,
    /// A user-specified timestamp set on an object.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub custom_time: Option<OffsetDateTime>,
}

/// Describes the customer-specified mechanism used to store the data at rest.
#[derive(Clone, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CustomerEncryption {
    /// The encryption algorithm.
    pub encryption_algorithm: String,
    /// SHA256 hash value of the encryption key.
    pub key_sha256: String,
}

/// The owner of a specific resource.
#[derive(Clone, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    /// The entity, in the form `user-`*userId*.
    #[serde(default)]
    pub entity: String,
    /// The ID for the entity.
    pub entity_id: Option<String>,
}

/// Customer-supplied encryption key (CSEK) headers.
#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Encryption {
    /// Encryption algorithm used with Customer-Supplied Encryption Keys feature.
    pub encryption_algorithm: String,
    /// Encryption key used with Customer-Supplied Encryption Keys feature, base64 encoded.
    pub encryption_key: String,
    /// SHA256 hash of encryption key used with Customer-Supplied Encryption Keys
    /// feature, base64 encoded.
    pub encryption_key_sha256: String,
}

impl Encryption {
    /// Derives the header values from a raw AES-256 key.
    pub fn from_key(key: &[u8]) -> Self {
        Self {
            encryption_algorithm: "AES256".to_string(),
            encryption_key: BASE64_STANDARD.encode(key),
            encryption_key_sha256: BASE64_STANDARD.encode(Sha256::digest(key)),
        }
    }

    pub(crate) fn with_headers(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("X-Goog-Encryption-Algorithm", &self.encryption_algorithm)
            .header("X-Goog-Encryption-Key", &self.encryption_key)
            .header("X-Goog-Encryption-Key-Sha256", &self.encryption_key_sha256)
    }

    pub(crate) fn with_copy_source_headers(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("X-Goog-Copy-Source-Encryption-Algorithm", &self.encryption_algorithm)
            .header("X-Goog-Copy-Source-Encryption-Key", &self.encryption_key)
            .header("X-Goog-Copy-Source-Encryption-Key-Sha256", &self.encryption_key_sha256)
    }
}

#[cfg(test)]
mod test {
    use crate::http::objects::{Encryption, Object};

    #[test]
    fn test_encryption_from_key() {
        let e = Encryption::from_key(&[0u8; 32]);
        assert_eq!(e.encryption_algorithm, "AES256");
        assert_eq!(e.encryption_key, "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=");
        assert_eq!(e.encryption_key_sha256, "Zmh6rfhivXdsj8GLjp+OIAiXFIVu4jOzkCpZHQ1fKSU=");
    }

    #[test]
    fn test_object_json() {
        let object: Object = serde_json::from_str(
            r#"{
                "kind": "storage#object",
                "name": "file.txt",
                "bucket": "bucket",
                "generation": "1700000000000000",
                "metageneration": "1",
                "size": "11",
                "crc32c": "yZRlqg==",
                "md5Hash": "XrY7u+Ae7tCTyyK7j1rNww==",
                "retentionExpirationTime": "2030-01-01T00:00:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(object.generation, 1700000000000000);
        assert_eq!(object.size, 11);
        assert_eq!(object.crc32c.as_deref(), Some("yZRlqg=="));
        assert!(object.retention_expiration_time.is_some());

        // server-assigned fields are not echoed back in request bodies
        let body = serde_json::to_value(Object {
            content_type: Some("text/plain".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"contentType": "text/plain"}));
    }
}
