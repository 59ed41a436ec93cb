//! Object store plumbing: client configuration, listing, presigned URLs.

pub mod list;
pub mod presigned;

use aws_config::Region;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::Client;
use serde::{Deserialize, Serialize};

pub type StoreResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Connection settings for one bucket on an S3-compatible store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Custom endpoint for R2/MinIO style stores; `None` targets AWS proper.
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
}

/// Create an S3 client for the configured store.
pub async fn create_client(config: &StoreConfig) -> StoreResult<Client> {
    let credentials = Credentials::new(
        &config.access_key_id,
        &config.secret_access_key,
        None,
        None,
        "notesync-provider",
    );

    let mut builder = S3ConfigBuilder::new()
        .credentials_provider(credentials)
        .region(Region::new(config.region.clone()))
        .force_path_style(config.force_path_style);

    if let Some(endpoint_url) = &config.endpoint_url {
        builder = builder.endpoint_url(endpoint_url);
    }

    Ok(Client::from_conf(builder.build()))
}
