#![allow(clippy::result_large_err)]
//! # gcloud-storage-file
//!
//! File, Channel and Notification handles for Google Cloud Storage.
//!
//! * [About Cloud Storage](https://cloud.google.com/storage/)
//! * [JSON API Documentation](https://cloud.google.com/storage/docs/json_api/v1)
//!
//! ## Quick Start
//!
//! ### Authentication
//!
//! The function `with_auth()` will try and read the credentials from a file specified in the environment variable `GOOGLE_APPLICATION_CREDENTIALS`, `GOOGLE_APPLICATION_CREDENTIALS_JSON` or
//! from a metadata server. It also installs the signer used for signed URLs and policies.
//!
//! ```
//! use gcloud_storage_file::client::{ClientConfig, Client};
//!
//! async fn run() {
//!     let config = ClientConfig::default().with_auth().await.unwrap();
//!     let client = Client::new(config);
//! }
//! ```
//!
//! ### Anonymous Access
//!
//! ```
//! use gcloud_storage_file::client::{ClientConfig, Client};
//!
//! async fn run() {
//!     let client = Client::new(ClientConfig::default().anonymous());
//! }
//! ```
//!
//! ### Usage
//!
//! ```
//! use gcloud_storage_file::client::Client;
//! use gcloud_storage_file::file::download::ReadOptions;
//! use gcloud_storage_file::file::upload::WriteOptions;
//! use gcloud_storage_file::file::copy::CopyOptions;
//! use gcloud_storage_file::sign::{SignedUrlAction, SignedUrlConfig};
//!
//! async fn run(client: Client) -> Result<(), gcloud_storage_file::file::Error> {
//!     let mut file = client.bucket("bucket").file("dir/object.txt");
//!
//!     // Upload. The stored object is checked against the CRC32c of the sent bytes.
//!     file.save("hello world", WriteOptions::default()).await?;
//!
//!     // Download with validation.
//!     let data = file.download(ReadOptions::default()).await?;
//!
//!     // Copy, then move.
//!     let copied = file.copy("gs://other-bucket/object.txt", CopyOptions::default()).await?;
//!     copied.move_to("archive/object.txt", CopyOptions::default()).await?;
//!
//!     // Signed URL
//!     let url = file.get_signed_url(&SignedUrlConfig {
//!         action: SignedUrlAction::Read,
//!         ..Default::default()
//!     }).await?;
//!     Ok(())
//! }
//! ```
pub mod bucket;
pub mod channel;
pub mod checksum;
pub mod client;
pub mod file;
pub mod http;
pub mod notification;
pub mod sign;
