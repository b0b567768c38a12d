use std::collections::HashMap;

use crate::bucket::Bucket;
use crate::http;
use crate::http::notifications::delete::DeleteNotificationRequest;
use crate::http::notifications::get::GetNotificationRequest;
use crate::http::notifications::insert::{InsertNotificationRequest, NotificationCreationConfig};
use crate::http::notifications::{EventType, PayloadFormat};

pub use crate::http::notifications::Notification as NotificationMetadata;

const PUBSUB_PREFIX: &str = "//pubsub.googleapis.com/";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] http::Error),
    #[error("a project id is required to qualify the topic {0}")]
    MissingProjectId(String),
}

impl Error {
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http(e) => e.status(),
            Error::MissingProjectId(_) => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CreateNotificationOptions {
    pub event_types: Option<Vec<EventType>>,
    pub custom_attributes: HashMap<String, String>,
    pub object_name_prefix: Option<String>,
    /// Defaults to `JSON_API_V1`.
    pub payload_format: Option<PayloadFormat>,
    pub user_project: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct GetNotificationOptions {
    pub user_project: Option<String>,
    /// Creates the configuration with this topic when it does not exist.
    pub auto_create: Option<AutoCreate>,
}

#[derive(Clone, Debug, Default)]
pub struct AutoCreate {
    pub topic: String,
    pub options: CreateNotificationOptions,
}

/// A Pub/Sub notification configuration of a bucket.
#[derive(Clone)]
pub struct Notification {
    bucket: Bucket,
    id: String,
    pub metadata: NotificationMetadata,
}

impl Notification {
    pub(crate) fn new(bucket: Bucket, id: String) -> Self {
        Self {
            bucket,
            id,
            metadata: NotificationMetadata::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bucket(&self) -> &Bucket {
        &self.bucket
    }

    fn user_project(&self, user_project: &Option<String>) -> Option<String> {
        user_project
            .clone()
            .or_else(|| self.bucket.user_project().map(|v| v.to_string()))
    }

    /// Creates the configuration and adopts the id assigned by the server.
    pub async fn create(&mut self, topic: &str, options: CreateNotificationOptions) -> Result<(), Error> {
        let topic = self.qualify_topic(topic)?;
        let req = InsertNotificationRequest {
            bucket: self.bucket.name().to_string(),
            user_project: self.user_project(&options.user_project),
            notification: NotificationCreationConfig {
                topic,
                event_types: options.event_types,
                custom_attributes: options.custom_attributes,
                object_name_prefix: options.object_name_prefix,
                payload_format: options.payload_format.unwrap_or_default(),
            },
        };
        self.metadata = self.bucket.client().insert_notification(&req).await?;
        self.id = self.metadata.id.clone();
        tracing::debug!("created notification {} on {}", self.id, self.bucket.name());
        Ok(())
    }

    /// Expands `my-topic` and `projects/p/topics/my-topic` into the full Pub/Sub resource name.
    fn qualify_topic(&self, topic: &str) -> Result<String, Error> {
        if topic.starts_with(PUBSUB_PREFIX) {
            return Ok(topic.to_string());
        }
        if topic.starts_with("projects/") {
            return Ok(format!("{PUBSUB_PREFIX}{topic}"));
        }
        match self.bucket.client().project_id() {
            Some(project) => Ok(format!("{PUBSUB_PREFIX}projects/{project}/topics/{topic}")),
            None => Err(Error::MissingProjectId(topic.to_string())),
        }
    }

    pub async fn get_metadata(&mut self, user_project: Option<String>) -> Result<&NotificationMetadata, Error> {
        let req = GetNotificationRequest {
            bucket: self.bucket.name().to_string(),
            notification: self.id.clone(),
            user_project: self.user_project(&user_project),
        };
        self.metadata = self.bucket.client().get_notification(&req).await?;
        Ok(&self.metadata)
    }

    /// Fetches the configuration, creating it first when `auto_create` is set and it does not exist.
    pub async fn get(&mut self, options: GetNotificationOptions) -> Result<&NotificationMetadata, Error> {
        let fetched = self.get_metadata(options.user_project.clone()).await.map(|_| ());
        match (fetched, options.auto_create) {
            (Ok(()), _) => {}
            (Err(Error::Http(e)), Some(auto_create)) if e.is_not_found() => {
                let mut create_options = auto_create.options;
                if create_options.user_project.is_none() {
                    create_options.user_project = options.user_project.clone();
                }
                match self.create(&auto_create.topic, create_options).await {
                    Ok(()) => {}
                    // created concurrently by someone else
                    Err(Error::Http(e)) if e.is_conflict() => {
                        tracing::debug!("notification {} already exists, fetching it", self.id);
                        self.get_metadata(options.user_project).await?;
                    }
                    Err(e) => return Err(e),
                }
            }
            (Err(e), _) => return Err(e),
        }
        Ok(&self.metadata)
    }

    pub async fn exists(&self) -> Result<bool, Error> {
        let req = GetNotificationRequest {
            bucket: self.bucket.name().to_string(),
            notification: self.id.clone(),
            user_project: self.user_project(&None),
        };
        match self.bucket.client().get_notification(&req).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, user_project: Option<String>) -> Result<(), Error> {
        let req = DeleteNotificationRequest {
            bucket: self.bucket.name().to_string(),
            notification: self.id.clone(),
            user_project: self.user_project(&user_project),
        };
        Ok(self.bucket.client().delete_notification(&req).await?)
    }
}
