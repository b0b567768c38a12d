use time::OffsetDateTime;

use crate::bucket::Bucket;
use crate::client::Client;
use crate::http::object_access_controls::insert::{
    InsertObjectAccessControlRequest, ObjectAccessControlCreationConfig,
};
use crate::http::object_access_controls::{ObjectACLRole, ObjectAccessControl, PredefinedObjectAcl};
use crate::http::objects::delete::DeleteObjectRequest;
use crate::http::objects::get::GetObjectRequest;
use crate::http::objects::patch::PatchObjectRequest;
use crate::http::objects::{Encryption, Object};
use crate::sign::{self, SignedPolicy, SignedPolicyConfig, SignedUrlConfig, SigningError};

pub mod copy;
pub mod download;
pub mod error;
pub mod upload;

pub use error::Error;

/// Options applied to every request made through a `File`.
#[derive(Clone, Debug, Default)]
pub struct FileOptions {
    /// Pins the handle to one generation of the object.
    pub generation: Option<i64>,
    /// Raw AES-256 customer-supplied encryption key.
    pub encryption_key: Option<Vec<u8>>,
    /// Cloud KMS key used to encrypt newly written data.
    pub kms_key_name: Option<String>,
    /// Overrides the bucket's billing project.
    pub user_project: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct MakePrivateOptions {
    /// Only the owner keeps access (`private`), instead of the project team too (`projectPrivate`).
    pub strict: bool,
    pub user_project: Option<String>,
}

/// A handle to an object in a bucket.
#[derive(Clone)]
pub struct File {
    bucket: Bucket,
    name: String,
    generation: Option<i64>,
    encryption: Option<Encryption>,
    kms_key_name: Option<String>,
    user_project: Option<String>,
    /// Metadata returned by the most recent call that fetched it.
    pub metadata: Object,
}

impl File {
    pub(crate) fn new(bucket: Bucket, name: String, options: FileOptions) -> Self {
        let name = name.strip_prefix('/').map(|v| v.to_string()).unwrap_or(name);
        let user_project = options
            .user_project
            .or_else(|| bucket.user_project().map(|v| v.to_string()));
        Self {
            bucket,
            name,
            generation: options.generation,
            encryption: options.encryption_key.as_deref().map(Encryption::from_key),
            kms_key_name: options.kms_key_name,
            user_project,
            metadata: Object::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bucket(&self) -> &Bucket {
        &self.bucket
    }

    pub fn generation(&self) -> Option<i64> {
        self.generation
    }

    pub fn kms_key_name(&self) -> Option<&str> {
        self.kms_key_name.as_deref()
    }

    pub fn user_project(&self) -> Option<&str> {
        self.user_project.as_deref()
    }

    pub fn encryption(&self) -> Option<&Encryption> {
        self.encryption.as_ref()
    }

    /// Uses `key` as the customer-supplied encryption key of subsequent requests.
    pub fn set_encryption_key(&mut self, key: &[u8]) -> &mut Self {
        self.encryption = Some(Encryption::from_key(key));
        self
    }

    pub fn set_user_project(&mut self, user_project: impl Into<String>) -> &mut Self {
        self.user_project = Some(user_project.into());
        self
    }

    pub fn set_kms_key_name(&mut self, kms_key_name: impl Into<String>) -> &mut Self {
        self.kms_key_name = Some(kms_key_name.into());
        self
    }

    pub(crate) fn client(&self) -> &Client {
        self.bucket.client()
    }

    /// The explicit billing project if any, else the handle's.
    pub(crate) fn billing(&self, user_project: &Option<String>) -> Option<String> {
        user_project.clone().or_else(|| self.user_project.clone())
    }

    pub(crate) fn get_request(&self, user_project: &Option<String>) -> GetObjectRequest {
        GetObjectRequest {
            bucket: self.bucket.name().to_string(),
            object: self.name.clone(),
            generation: self.generation,
            user_project: self.billing(user_project),
            encryption: self.encryption.clone(),
            ..Default::default()
        }
    }

    pub(crate) fn delete_request(&self, user_project: &Option<String>) -> DeleteObjectRequest {
        DeleteObjectRequest {
            bucket: self.bucket.name().to_string(),
            object: self.name.clone(),
            generation: self.generation,
            user_project: self.billing(user_project),
            ..Default::default()
        }
    }

    fn patch_request(&self, user_project: &Option<String>) -> PatchObjectRequest {
        PatchObjectRequest {
            bucket: self.bucket.name().to_string(),
            object: self.name.clone(),
            generation: self.generation,
            user_project: self.billing(user_project),
            encryption: self.encryption.clone(),
            ..Default::default()
        }
    }

    /// Fetches the object metadata and caches it in `metadata`.
    pub async fn get_metadata(&mut self, user_project: Option<String>) -> Result<&Object, Error> {
        let req = self.get_request(&user_project);
        self.metadata = self.client().get_object(&req).await?;
        Ok(&self.metadata)
    }

    /// Fetches the metadata and returns the refreshed handle.
    pub async fn get(mut self, user_project: Option<String>) -> Result<File, Error> {
        self.get_metadata(user_project).await?;
        Ok(self)
    }

    pub async fn exists(&self, user_project: Option<String>) -> Result<bool, Error> {
        match self.client().get_object(&self.get_request(&user_project)).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Patches the given fields of the object metadata.
    pub async fn set_metadata(&mut self, metadata: Object, user_project: Option<String>) -> Result<&Object, Error> {
        let req = PatchObjectRequest {
            metadata: Some(metadata),
            ..self.patch_request(&user_project)
        };
        self.metadata = self.client().patch_object(&req).await?;
        Ok(&self.metadata)
    }

    pub async fn delete(&self, user_project: Option<String>) -> Result<(), Error> {
        let req = self.delete_request(&user_project);
        Ok(self.client().delete_object(&req).await?)
    }

    /// The time the retention period of the object expires.
    pub async fn get_expiration_date(&mut self) -> Result<OffsetDateTime, Error> {
        self.get_metadata(None)
            .await?
            .retention_expiration_time
            .ok_or(Error::ExpirationTimeNotAvailable)
    }

    /// Drops every ACL entry and applies the `private` or `projectPrivate` predefined ACL.
    pub async fn make_private(&mut self, options: MakePrivateOptions) -> Result<&Object, Error> {
        let predefined_acl = if options.strict {
            PredefinedObjectAcl::Private
        } else {
            PredefinedObjectAcl::ProjectPrivate
        };
        let req = PatchObjectRequest {
            predefined_acl: Some(predefined_acl),
            ..self.patch_request(&options.user_project)
        };
        let body = serde_json::json!({ "acl": null });
        self.metadata = self.client().patch_object_with(&req, &body).await?;
        Ok(&self.metadata)
    }

    /// Grants `READER` to `allUsers`.
    pub async fn make_public(&self) -> Result<ObjectAccessControl, Error> {
        let req = InsertObjectAccessControlRequest {
            bucket: self.bucket.name().to_string(),
            object: self.name.clone(),
            generation: self.generation,
            user_project: self.user_project.clone(),
            acl: ObjectAccessControlCreationConfig {
                entity: "allUsers".to_string(),
                role: ObjectACLRole::READER,
            },
        };
        Ok(self.client().insert_object_access_control(&req).await?)
    }

    /// A v2 signed URL granting `config.action` on this object until `config.expires`.
    pub async fn get_signed_url(&self, config: &SignedUrlConfig) -> Result<String, Error> {
        let now = OffsetDateTime::now_utc();
        sign::check_expiration(config.expires, now)?;
        let signer = self.client().signer().ok_or(SigningError::NoSigner)?;
        let url = sign::signed_url(
            signer.as_ref(),
            self.bucket.name(),
            &self.name,
            self.generation,
            config,
            now,
        )
        .await?;
        Ok(url)
    }

    /// A signed policy document allowing an HTML form to upload this object.
    pub async fn get_signed_policy(&self, config: &SignedPolicyConfig) -> Result<SignedPolicy, Error> {
        let now = OffsetDateTime::now_utc();
        sign::check_expiration(config.expires, now)?;
        let signer = self.client().signer().ok_or(SigningError::NoSigner)?;
        let policy = sign::signed_policy(
            signer.as_ref(),
            self.bucket.name(),
            &self.name,
            config,
            now,
        )
        .await?;
        Ok(policy)
    }
}
