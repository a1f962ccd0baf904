use std::env;

/// Application configuration for the upload gateway.
///
/// Every option has a development-friendly default so the server runs with no
/// environment at all.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Storage backend: "s3" or "memory" (default: "s3")
    pub storage_backend: String,

    /// AWS region for the object store (default: "us-east-1")
    pub aws_region: String,

    /// Bucket receiving uploaded documents (default: "sudoself-docs")
    pub s3_bucket: String,

    /// Custom S3 endpoint, e.g. a local MinIO. Path-style addressing is
    /// forced when set.
    pub s3_endpoint: Option<String>,

    /// Static credentials; when absent the SDK's default provider chain is
    /// used.
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,

    /// Intake endpoint of the ingestion service
    /// (default: "http://localhost:3001/api/ingest")
    pub ingestion_url: String,

    /// Maximum accepted upload size in bytes (default: 20 MB)
    pub max_file_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_backend: "s3".to_string(),
            aws_region: "us-east-1".to_string(),
            s3_bucket: "sudoself-docs".to_string(),
            s3_endpoint: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            ingestion_url: "http://localhost:3001/api/ingest".to_string(),
            max_file_size: 20 * 1024 * 1024, // 20 MB
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            storage_backend: env::var("STORAGE_BACKEND").unwrap_or(default.storage_backend),

            aws_region: env::var("AWS_REGION").unwrap_or(default.aws_region),

            s3_bucket: env::var("S3_BUCKET_NAME").unwrap_or(default.s3_bucket),

            s3_endpoint: env::var("S3_ENDPOINT").ok(),

            aws_access_key_id: env::var("AWS_ACCESS_KEY_ID").ok(),
            aws_secret_access_key: env::var("AWS_SECRET_ACCESS_KEY").ok(),

            ingestion_url: env::var("INGESTION_API_URL").unwrap_or(default.ingestion_url),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),
        }
    }

    /// Create config for development (in-memory storage, no credentials)
    pub fn development() -> Self {
        Self {
            storage_backend: "memory".to_string(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.storage_backend, "s3");
        assert_eq!(config.aws_region, "us-east-1");
        assert_eq!(config.s3_bucket, "sudoself-docs");
        assert_eq!(config.ingestion_url, "http://localhost:3001/api/ingest");
        assert_eq!(config.max_file_size, 20 * 1024 * 1024);
        assert!(config.s3_endpoint.is_none());
    }

    #[test]
    fn test_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.storage_backend, "memory");
        assert_eq!(config.s3_bucket, "sudoself-docs");
    }
}
