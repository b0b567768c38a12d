use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use std::sync::Arc;

use token_source::{NoopTokenSourceProvider, TokenSourceProvider};

use crate::bucket::Bucket;
use crate::channel::Channel;
use crate::http::service_account_client::ServiceAccountClient;
use crate::http::storage_client::StorageClient;
use crate::sign::{IamSigner, PrivateKeySigner, SignBy, Signer};

pub struct ClientConfig {
    /// Transport shared by every handle; retry or tracing middleware is attached here.
    pub http: Option<reqwest_middleware::ClientWithMiddleware>,
    pub storage_endpoint: String,
    pub service_account_endpoint: String,
    pub token_source_provider: Option<Box<dyn TokenSourceProvider>>,
    /// Service account signing URLs and policies.
    pub default_google_access_id: Option<String>,
    pub default_sign_by: Option<SignBy>,
    pub project_id: Option<String>,
    /// Project billed for requests against Requester Pays buckets.
    pub user_project: Option<String>,
}

impl Debug for ClientConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("storage_endpoint", &self.storage_endpoint)
            .field("service_account_endpoint", &self.service_account_endpoint)
            .field("default_google_access_id", &self.default_google_access_id)
            .field("project_id", &self.project_id)
            .field("user_project", &self.user_project)
            .finish()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            http: None,
            storage_endpoint: "https://storage.googleapis.com".to_string(),
            service_account_endpoint: "https://iamcredentials.googleapis.com".to_string(),
            token_source_provider: Some(Box::new(NoopTokenSourceProvider {})),
            default_google_access_id: None,
            default_sign_by: None,
            project_id: None,
            user_project: None,
        }
    }
}

impl ClientConfig {
    pub fn anonymous(mut self) -> Self {
        self.token_source_provider = None;
        self
    }

    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.default_google_access_id = Some(signer.client_email().to_string());
        self.default_sign_by = Some(SignBy::Custom(signer));
        self
    }

    pub fn with_user_project(mut self, user_project: impl Into<String>) -> Self {
        self.user_project = Some(user_project.into());
        self
    }
}

#[cfg(feature = "auth")]
pub use google_cloud_auth;

#[cfg(feature = "auth")]
impl ClientConfig {
    pub async fn with_auth(self) -> Result<Self, google_cloud_auth::error::Error> {
        let ts = google_cloud_auth::token::DefaultTokenSourceProvider::new(Self::auth_config()).await?;
        Ok(self.with_token_source(ts).await)
    }

    pub async fn with_credentials(
        self,
        credentials: google_cloud_auth::credentials::CredentialsFile,
    ) -> Result<Self, google_cloud_auth::error::Error> {
        let ts = google_cloud_auth::token::DefaultTokenSourceProvider::new_with_credentials(
            Self::auth_config(),
            Box::new(credentials),
        )
        .await?;
        Ok(self.with_token_source(ts).await)
    }

    async fn with_token_source(mut self, ts: google_cloud_auth::token::DefaultTokenSourceProvider) -> Self {
        match &ts.source_credentials {
            // Credential file is used.
            Some(cred) => {
                self.project_id = ts.project_id.clone();
                if let Some(pk) = &cred.private_key {
                    self.default_sign_by = Some(SignBy::PrivateKey(pk.clone()));
                }
                self.default_google_access_id = cred.client_email.clone();
            }
            // On Google Cloud
            None => {
                self.project_id = Some(google_cloud_metadata::project_id().await);
                self.default_sign_by = Some(SignBy::SignBytes);
                self.default_google_access_id = google_cloud_metadata::email("default").await.ok();
            }
        }
        self.token_source_provider = Some(Box::new(ts));
        self
    }

    fn auth_config() -> google_cloud_auth::project::Config<'static> {
        google_cloud_auth::project::Config::default().with_scopes(&crate::http::storage_client::SCOPES)
    }
}

/// The parent of every `Bucket` and `Channel` handle.
#[derive(Clone)]
pub struct Client {
    storage_client: StorageClient,
    service_account_client: ServiceAccountClient,
    signer: Option<Arc<dyn Signer>>,
    project_id: Option<String>,
    user_project: Option<String>,
}

impl Deref for Client {
    type Target = StorageClient;

    fn deref(&self) -> &Self::Target {
        &self.storage_client
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl Client {
    /// New client
    pub fn new(config: ClientConfig) -> Self {
        let ts = match config.token_source_provider {
            Some(tsp) => Some(tsp.token_source()),
            None => {
                tracing::trace!("Use anonymous access due to lack of token");
                None
            }
        };
        let http = config
            .http
            .unwrap_or_else(|| reqwest_middleware::ClientBuilder::new(reqwest::Client::default()).build());

        let service_account_client =
            ServiceAccountClient::new(ts.clone(), config.service_account_endpoint.as_str(), http.clone());
        let storage_client = StorageClient::new(ts, config.storage_endpoint.as_str(), http);
        let signer = match (config.default_sign_by, config.default_google_access_id) {
            (Some(SignBy::Custom(signer)), _) => Some(signer),
            (Some(SignBy::PrivateKey(pem)), Some(email)) => match PrivateKeySigner::from_pem(email, &pem) {
                Ok(signer) => Some(Arc::new(signer) as Arc<dyn Signer>),
                Err(e) => {
                    tracing::warn!("private key can not be used for signing: {e}");
                    None
                }
            },
            (Some(SignBy::SignBytes), Some(email)) => {
                Some(Arc::new(IamSigner::new(email, service_account_client.clone())) as Arc<dyn Signer>)
            }
            _ => None,
        };

        Self {
            storage_client,
            service_account_client,
            signer,
            project_id: config.project_id,
            user_project: config.user_project,
        }
    }

    /// A handle to the bucket `name`.
    pub fn bucket(&self, name: impl Into<String>) -> Bucket {
        Bucket::new(self.clone(), name.into())
    }

    /// A handle to an existing notification channel.
    pub fn channel(&self, id: impl Into<String>, resource_id: impl Into<String>) -> Channel {
        Channel::new(self.clone(), id.into(), resource_id.into())
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    pub fn user_project(&self) -> Option<&str> {
        self.user_project.as_deref()
    }

    pub fn signer(&self) -> Option<&Arc<dyn Signer>> {
        self.signer.as_ref()
    }

    pub fn service_account_client(&self) -> &ServiceAccountClient {
        &self.service_account_client
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crate::client::{Client, ClientConfig};
    use crate::http::testing::MockTransport;
    use crate::sign::test::EchoSigner;
    use crate::sign::SignBy;

    #[test]
    fn test_config() {
        let config = ClientConfig::default()
            .anonymous()
            .with_signer(Arc::new(EchoSigner::default()))
            .with_user_project("billing");
        assert!(config.token_source_provider.is_none());
        let client = Client::new(config);
        assert_eq!(client.user_project(), Some("billing"));
        assert_eq!(client.signer().unwrap().client_email(), "sa@p.iam.gserviceaccount.com");
        assert!(client.project_id().is_none());
    }

    #[test]
    fn test_handles() {
        let mock = MockTransport::new();
        let client = Client::new(ClientConfig {
            http: Some(mock.client()),
            user_project: Some("billing".to_string()),
            ..ClientConfig::default().anonymous()
        });
        let bucket = client.bucket("b");
        assert_eq!(bucket.name(), "b");
        assert_eq!(bucket.user_project(), Some("billing"));
        let channel = client.channel("id", "resource");
        assert_eq!(channel.id(), "id");
        assert_eq!(channel.resource_id(), "resource");
    }

    #[test]
    fn test_sign_by() {
        let client = Client::new(ClientConfig {
            default_google_access_id: Some("sa@p.iam.gserviceaccount.com".to_string()),
            default_sign_by: Some(SignBy::PrivateKey(include_str!("../testdata/rsa_test_key.pem").to_string())),
            ..ClientConfig::default().anonymous()
        });
        assert_eq!(client.signer().unwrap().client_email(), "sa@p.iam.gserviceaccount.com");

        let client = Client::new(ClientConfig {
            default_google_access_id: Some("sa@p.iam.gserviceaccount.com".to_string()),
            default_sign_by: Some(SignBy::PrivateKey("not a key".to_string())),
            ..ClientConfig::default().anonymous()
        });
        assert!(client.signer().is_none());

        let client = Client::new(ClientConfig {
            default_google_access_id: None,
            default_sign_by: Some(SignBy::SignBytes),
            ..ClientConfig::default().anonymous()
        });
        assert!(client.signer().is_none());
    }
}
