use crate::config::AppConfig;
use crate::services::storage::{MemoryObjectStore, ObjectStore, S3ObjectStore};
use aws_sdk_s3::config::Region;
use std::sync::Arc;
use tracing::info;

/// Build the object store selected by `STORAGE_BACKEND`.
pub async fn setup_storage(config: &AppConfig) -> Arc<dyn ObjectStore> {
    if config.storage_backend == "memory" {
        info!("🗂️  Storage: in-memory (bucket: {})", config.s3_bucket);
        return Arc::new(MemoryObjectStore::new(config.s3_bucket.clone()));
    }

    info!(
        "☁️  S3 Storage: {} (bucket: {})",
        config
            .s3_endpoint
            .as_deref()
            .unwrap_or("AWS default endpoints"),
        config.s3_bucket
    );

    let mut loader = aws_config::from_env().region(Region::new(config.aws_region.clone()));

    if let Some(endpoint) = &config.s3_endpoint {
        loader = loader.endpoint_url(endpoint);
    }

    if let (Some(access_key), Some(secret_key)) =
        (&config.aws_access_key_id, &config.aws_secret_access_key)
    {
        loader = loader.credentials_provider(aws_sdk_s3::config::Credentials::new(
            access_key, secret_key, None, None, "static",
        ));
    }

    let aws_config = loader.load().await;

    // Custom endpoints (MinIO) need path-style addressing.
    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(config.s3_endpoint.is_some())
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);
    Arc::new(S3ObjectStore::new(
        s3_client,
        config.s3_bucket.clone(),
        &config.aws_region,
        config.s3_endpoint.as_deref(),
    ))
}
