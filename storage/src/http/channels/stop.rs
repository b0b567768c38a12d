use reqwest_middleware::{ClientWithMiddleware as Client, RequestBuilder};

use crate::http::channels::WatchableChannel;

/// Request message for StopChannel.
#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct StopChannelRequest {
    /// The channel to be stopped.
    pub channel: WatchableChannel,
}

pub(crate) fn build(base_url: &str, client: &Client, req: &StopChannelRequest) -> RequestBuilder {
    let url = format!("{}/channels/stop", base_url);
    client.post(url).json(&req.channel)
}
