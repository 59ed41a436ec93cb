//! Listing and bucket bootstrap.

use log::info;
use serde::Serialize;

use super::{create_client, StoreConfig, StoreResult};

/// One remote object, as presented on the download-selection screen.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectSummary {
    pub key: String,
    pub size: i64,
    pub last_modified: String,
}

/// List every object under `prefix`, following continuation tokens.
pub async fn list_objects(
    config: &StoreConfig,
    prefix: Option<&str>,
) -> StoreResult<Vec<ObjectSummary>> {
    let client = create_client(config).await?;
    let mut all_objects: Vec<ObjectSummary> = Vec::new();
    let mut continuation_token: Option<String> = None;

    loop {
        let mut request = client
            .list_objects_v2()
            .bucket(&config.bucket)
            .max_keys(1000);

        if let Some(p) = prefix {
            request = request.prefix(p);
        }
        if let Some(token) = &continuation_token {
            request = request.continuation_token(token);
        }

        let response = request.send().await?;

        let page = response.contents().iter().filter_map(|obj| {
            let key = obj.key()?.to_string();
            // Skip directory markers
            if key.ends_with('/') {
                return None;
            }
            Some(ObjectSummary {
                key,
                size: obj.size().unwrap_or(0),
                last_modified: obj
                    .last_modified()
                    .map(|dt| dt.to_string())
                    .unwrap_or_default(),
            })
        });
        all_objects.extend(page);

        if response.is_truncated().unwrap_or(false) {
            continuation_token = response.next_continuation_token().map(|s| s.to_string());
        } else {
            break;
        }
    }

    Ok(all_objects)
}

/// Create the bucket if it does not exist yet. Safe to call on every startup.
pub async fn ensure_bucket(config: &StoreConfig) -> StoreResult<()> {
    let client = create_client(config).await?;

    if client
        .head_bucket()
        .bucket(&config.bucket)
        .send()
        .await
        .is_ok()
    {
        return Ok(());
    }

    info!("bucket {} not found, creating it", config.bucket);
    client.create_bucket().bucket(&config.bucket).send().await?;
    Ok(())
}
