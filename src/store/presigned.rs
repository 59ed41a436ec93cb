//! Presigned URL generation for the transfer workers.

use std::time::Duration;

use aws_sdk_s3::presigning::PresigningConfig;

use super::{create_client, StoreConfig, StoreResult};

/// Generate a presigned URL for fetching an object (GET).
pub async fn download_url(
    config: &StoreConfig,
    key: &str,
    expires_in_secs: u64,
) -> StoreResult<String> {
    let client = create_client(config).await?;

    let presigning_config = PresigningConfig::builder()
        .expires_in(Duration::from_secs(expires_in_secs))
        .build()?;

    let presigned_request = client
        .get_object()
        .bucket(&config.bucket)
        .key(key)
        .presigned(presigning_config)
        .await?;

    Ok(presigned_request.uri().to_string())
}

/// Generate a presigned URL for uploading an object (PUT).
pub async fn upload_url(
    config: &StoreConfig,
    key: &str,
    expires_in_secs: u64,
) -> StoreResult<String> {
    let client = create_client(config).await?;

    let presigning_config = PresigningConfig::builder()
        .expires_in(Duration::from_secs(expires_in_secs))
        .build()?;

    let presigned_request = client
        .put_object()
        .bucket(&config.bucket)
        .key(key)
        .presigned(presigning_config)
        .await?;

    Ok(presigned_request.uri().to_string())
}
