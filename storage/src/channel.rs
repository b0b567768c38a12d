use crate::client::Client;
use crate::http::channels::stop::StopChannelRequest;
use crate::http::channels::WatchableChannel;
use crate::http::Error;

/// A push notification channel opened by an earlier watch request.
#[derive(Clone)]
pub struct Channel {
    client: Client,
    channel: WatchableChannel,
}

impl Channel {
    pub(crate) fn new(client: Client, id: String, resource_id: String) -> Self {
        Self {
            client,
            channel: WatchableChannel { id, resource_id },
        }
    }

    pub fn id(&self) -> &str {
        &self.channel.id
    }

    pub fn resource_id(&self) -> &str {
        &self.channel.resource_id
    }

    /// Stops receiving notifications on this channel.
    pub async fn stop(&self) -> Result<(), Error> {
        tracing::debug!("stopping channel {}", self.channel.id);
        self.client
            .stop_channel(&StopChannelRequest {
                channel: self.channel.clone(),
            })
            .await
    }
}
