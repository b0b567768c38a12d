use crate::client::Client;
use crate::file::{File, FileOptions};
use crate::notification::{self, CreateNotificationOptions, Notification};

/// A handle to a bucket: the parent of its `File` and `Notification` handles.
#[derive(Clone)]
pub struct Bucket {
    client: Client,
    name: String,
    user_project: Option<String>,
}

impl Bucket {
    pub(crate) fn new(client: Client, name: String) -> Self {
        let user_project = client.user_project().map(|v| v.to_string());
        Self {
            client,
            name,
            user_project,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The project billed for requests, inherited by files and notifications created afterwards.
    pub fn user_project(&self) -> Option<&str> {
        self.user_project.as_deref()
    }

    pub fn set_user_project(&mut self, user_project: impl Into<String>) {
        self.user_project = Some(user_project.into());
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// A handle to the object `name`; a leading `/` is ignored.
    pub fn file(&self, name: impl Into<String>) -> File {
        self.file_with(name, FileOptions::default())
    }

    pub fn file_with(&self, name: impl Into<String>, options: FileOptions) -> File {
        File::new(self.clone(), name.into(), options)
    }

    /// A handle to the existing notification configuration `id`.
    pub fn notification(&self, id: impl Into<String>) -> Notification {
        Notification::new(self.clone(), id.into())
    }

    /// Creates a notification configuration publishing to `topic`.
    pub async fn create_notification(
        &self,
        topic: &str,
        options: CreateNotificationOptions,
    ) -> Result<Notification, notification::Error> {
        let mut notification = Notification::new(self.clone(), String::new());
        notification.create(topic, options).await?;
        Ok(notification)
    }
}
