use crate::services::storage::StoredObject;
use crate::utils::keys::document_id;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

/// Intake request sent to the ingestion service for a newly stored document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngestionNotification {
    pub document_id: String,
    pub s3_key: String,
    pub s3_bucket: String,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
}

impl IngestionNotification {
    pub fn for_object(stored: &StoredObject, file_name: &str) -> Self {
        Self {
            document_id: document_id(&stored.key).to_string(),
            s3_key: stored.key.clone(),
            s3_bucket: stored.bucket.clone(),
            filename: file_name.to_string(),
            content_type: stored.content_type.clone(),
            size: stored.size,
        }
    }
}

/// Notifies the external ingestion service of new documents.
#[async_trait::async_trait]
pub trait IngestionNotifier: Send + Sync {
    async fn notify(&self, notification: &IngestionNotification) -> Result<()>;
}

/// HTTP notifier posting to the ingestion service's intake endpoint.
pub struct HttpIngestionNotifier {
    endpoint: String,
    http: reqwest::Client,
}

impl HttpIngestionNotifier {
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl IngestionNotifier for HttpIngestionNotifier {
    async fn notify(&self, notification: &IngestionNotification) -> Result<()> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(notification)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "ingestion service returned {}",
                response.status()
            ));
        }

        Ok(())
    }
}

/// Fire the ingestion trigger for a freshly stored object, at most once.
///
/// A failed trigger is logged and dropped: the object already exists durably
/// in storage, so ingestion can be re-triggered out of band by scanning the
/// bucket. Callers must never gate their own success on this.
pub async fn trigger_ingestion(
    notifier: &dyn IngestionNotifier,
    stored: &StoredObject,
    file_name: &str,
) {
    let notification = IngestionNotification::for_object(stored, file_name);

    match notifier.notify(&notification).await {
        Ok(()) => {
            tracing::info!(
                "📨 Ingestion triggered for document {}",
                notification.document_id
            );
        }
        Err(e) => {
            tracing::warn!(
                "Failed to trigger ingestion for {} (object stored, reprocess later): {:#}",
                stored.key,
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_object() -> StoredObject {
        StoredObject {
            key: "uploads/q4_report-1700000000000.pdf".to_string(),
            location: "memory://sudoself-docs/uploads/q4_report-1700000000000.pdf".to_string(),
            bucket: "sudoself-docs".to_string(),
            size: 1234,
            content_type: "application/pdf".to_string(),
        }
    }

    #[test]
    fn test_notification_from_stored_object() {
        let n = IngestionNotification::for_object(&sample_object(), "Q4 Report.pdf");
        assert_eq!(n.document_id, "q4_report-1700000000000.pdf");
        assert_eq!(n.s3_key, "uploads/q4_report-1700000000000.pdf");
        assert_eq!(n.s3_bucket, "sudoself-docs");
        assert_eq!(n.filename, "Q4 Report.pdf");
        assert_eq!(n.content_type, "application/pdf");
        assert_eq!(n.size, 1234);
    }

    #[test]
    fn test_notification_wire_field_names() {
        let n = IngestionNotification::for_object(&sample_object(), "Q4 Report.pdf");
        let json = serde_json::to_value(&n).unwrap();

        assert_eq!(json["documentId"], "q4_report-1700000000000.pdf");
        assert_eq!(json["s3Key"], "uploads/q4_report-1700000000000.pdf");
        assert_eq!(json["s3Bucket"], "sudoself-docs");
        assert_eq!(json["filename"], "Q4 Report.pdf");
        assert_eq!(json["contentType"], "application/pdf");
        assert_eq!(json["size"], 1234);
    }
}
