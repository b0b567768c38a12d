use std::sync::Arc;

use base64::prelude::*;
use reqwest_middleware::ClientWithMiddleware as Client;
use token_source::TokenSource;

use crate::http::{check_response_status, Error};

#[derive(serde::Serialize)]
struct SignBlobRequest {
    payload: String,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignBlobResponse {
    signed_blob: String,
}

/// Client of the IAM credentials API, used to sign without a local private key.
#[derive(Clone)]
pub struct ServiceAccountClient {
    ts: Option<Arc<dyn TokenSource>>,
    v1_endpoint: String,
    http: Client,
}

impl ServiceAccountClient {
    pub(crate) fn new(ts: Option<Arc<dyn TokenSource>>, endpoint: &str, http: Client) -> Self {
        Self {
            ts,
            v1_endpoint: format!("{endpoint}/v1"),
            http,
        }
    }

    /// Signs `data` with the system-managed key of the service account `name`,
    /// given as `projects/-/serviceAccounts/{email}`.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn sign_blob(&self, name: &str, data: &[u8]) -> Result<Vec<u8>, Error> {
        let url = format!("{}/{}:signBlob", self.v1_endpoint, name);
        let request = SignBlobRequest {
            payload: BASE64_STANDARD.encode(data),
        };
        let mut builder = self
            .http
            .post(url)
            .json(&request)
            .header("X-Goog-Api-Client", "rust")
            .header(reqwest::header::USER_AGENT, "google-cloud-storage");
        if let Some(ts) = &self.ts {
            let token = ts.token().await.map_err(Error::TokenSource)?;
            builder = builder.header(reqwest::header::AUTHORIZATION, token);
        }
        let response = builder.send().await?;
        let response = check_response_status(response).await?;
        let body = response.json::<SignBlobResponse>().await?;
        BASE64_STANDARD
            .decode(body.signed_blob)
            .map_err(|e| Error::RawResponse(200, format!("invalid signedBlob: {e}")))
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use crate::http::service_account_client::ServiceAccountClient;
    use crate::http::testing::MockTransport;

    #[tokio::test]
    async fn test_sign_blob() {
        let mock = MockTransport::new();
        mock.respond_json(200, json!({"keyId": "k", "signedBlob": "c2lnbmVk"}));
        let client = ServiceAccountClient::new(None, "https://iam.example", mock.client());
        let signed = client
            .sign_blob("projects/-/serviceAccounts/sa@p.iam.gserviceaccount.com", b"blob")
            .await
            .unwrap();
        assert_eq!(signed, b"signed");

        let request = &mock.requests()[0];
        assert_eq!(
            request.url.as_str(),
            "https://iam.example/v1/projects/-/serviceAccounts/sa@p.iam.gserviceaccount.com:signBlob"
        );
        assert_eq!(request.json(), json!({"payload": "YmxvYg=="}));
    }

    #[tokio::test]
    async fn test_sign_blob_error() {
        let mock = MockTransport::new();
        mock.respond_json(403, json!({"error": {"code": 403, "message": "denied", "errors": []}}));
        let client = ServiceAccountClient::new(None, "https://iam.example", mock.client());
        let err = client.sign_blob("projects/-/serviceAccounts/x", b"blob").await.unwrap_err();
        assert_eq!(err.status(), Some(403));
    }
}
