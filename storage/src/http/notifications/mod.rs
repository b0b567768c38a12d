use std::collections::HashMap;

pub mod delete;
pub mod get;
pub mod insert;

/// A subscription to receive Google PubSub notifications.
#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// The Cloud PubSub topic to which this subscription publishes. Formatted as:
    /// '//pubsub.googleapis.com/projects/{project-identifier}/topics/{my-topic}'
    pub topic: String,
    /// If present, only send notifications about listed event types. If empty,
    /// sent notifications for all event types.
    pub event_types: Option<Vec<EventType>>,
    /// An optional list of additional attributes to attach to each Cloud PubSub
    /// message published for this notification subscription.
    pub custom_attributes: Option<HashMap<String, String>>,
    /// HTTP 1.1 \[<https://tools.ietf.org/html/rfc7232#section-2.3\][Entity> tag]
    /// for this subscription notification.
    #[serde(default)]
    pub etag: String,
    /// If present, only apply this notification configuration to object names that
    /// begin with this prefix.
    pub object_name_prefix: Option<String>,
    /// The desired content of the Payload.
    #[serde(default)]
    pub payload_format: PayloadFormat,
    /// The ID of the notification.
    #[serde(default)]
    pub id: String,
    /// The canonical URL of this notification.
    pub self_link: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize, Debug)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Sent when a new object (or a new generation of an existing object) is successfully created in the bucket.
    ObjectFinalize,
    /// Sent when the metadata of an existing object changes.
    ObjectMetadataUpdate,
    /// Sent when an object has been permanently deleted.
    ObjectDelete,
    /// Only sent when a bucket has enabled object versioning.
    ObjectArchive,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize, Debug, Default)]
pub enum PayloadFormat {
    #[default]
    #[serde(rename = "JSON_API_V1")]
    JsonApiV1,
    #[serde(rename = "NONE")]
    None,
}
