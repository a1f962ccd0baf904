//! Batch upload client for the gateway.
//!
//! Owns a pending set of files and drives each through its own
//! `Queued → Uploading → Succeeded | Failed` lifecycle. One file's failure
//! never aborts its siblings. Per-file state is written only by the transfer
//! routine that owns the client, so there are no shared progress maps to
//! race on if the batch is ever parallelized.

use crate::utils::keys::derive_storage_key;
use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Client-local file identifier: `{file_name}-{enqueue_millis}`.
pub type FileId = String;

/// Fixed step of the synthetic progress estimate, in percent per tick.
const PROGRESS_STEP: u8 = 7;

/// The estimate holds here until the gateway acknowledges the transfer; 100
/// is reserved for confirmed completion.
const PROGRESS_CAP: u8 = 95;

const PROGRESS_TICK: Duration = Duration::from_millis(200);

/// Document MIME types accepted by default (PDF, Office, plain text).
pub const ALLOWED_DOCUMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "text/plain",
];

/// The gateway's view of a stored document, as returned on success.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StoredDocument {
    pub key: String,
    pub location: String,
    pub bucket: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadState {
    Queued,
    Uploading { progress: u8 },
    Succeeded { document: StoredDocument },
    Failed { message: String },
}

/// Events delivered on the subscription channel.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    Progress { id: FileId, percent: u8 },
    Succeeded { id: FileId, document: StoredDocument },
    Failed { id: FileId, message: String },
    /// Emitted after a batch in which at least one file succeeded.
    BatchCompleted { documents: Vec<StoredDocument> },
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("File too large: {size} bytes exceeds maximum {max} bytes")]
    FileTooLarge { size: usize, max: usize },

    #[error("Unsupported content type: {0}")]
    UnsupportedType(String),

    #[error("Unknown file: {0}")]
    UnknownFile(FileId),
}

/// Pre-transfer acceptance policy; violations are rejected at enqueue time,
/// before any network or storage work.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_size_bytes: usize,
    pub allowed_types: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_size_bytes: 20 * 1024 * 1024, // 20 MB
            allowed_types: ALLOWED_DOCUMENT_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl UploadPolicy {
    fn check(&self, content_type: &str, size: usize) -> Result<(), ClientError> {
        if size > self.max_size_bytes {
            return Err(ClientError::FileTooLarge {
                size,
                max: self.max_size_bytes,
            });
        }

        let normalized = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_lowercase();
        if !self.allowed_types.iter().any(|t| t == &normalized) {
            return Err(ClientError::UnsupportedType(content_type.to_string()));
        }

        Ok(())
    }
}

pub struct QueuedFile {
    pub id: FileId,
    pub file_name: String,
    pub content_type: String,
    data: Bytes,
    state: UploadState,
}

impl QueuedFile {
    pub fn state(&self) -> &UploadState {
        &self.state
    }
}

#[derive(Deserialize)]
struct GatewaySuccess {
    key: String,
    location: String,
    bucket: String,
}

#[derive(Deserialize)]
struct GatewayFailure {
    error: String,
    message: Option<String>,
}

pub struct UploadClient {
    upload_url: String,
    http: reqwest::Client,
    policy: UploadPolicy,
    files: Vec<QueuedFile>,
    events: Option<mpsc::UnboundedSender<UploadEvent>>,
}

impl UploadClient {
    /// `upload_url` is the gateway's full upload endpoint, e.g.
    /// `http://127.0.0.1:3000/api/upload`.
    pub fn new(upload_url: impl Into<String>) -> Self {
        Self::with_policy(upload_url, UploadPolicy::default())
    }

    pub fn with_policy(upload_url: impl Into<String>, policy: UploadPolicy) -> Self {
        Self {
            upload_url: upload_url.into(),
            http: reqwest::Client::new(),
            policy,
            files: Vec::new(),
            events: None,
        }
    }

    /// Subscribe to per-file progress/terminal events and batch completions.
    /// Replaces any previous subscription.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<UploadEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    /// Add a file to the pending set. Policy violations (size, content type)
    /// are rejected here, before any transfer begins.
    pub fn enqueue(
        &mut self,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: Bytes,
    ) -> Result<FileId, ClientError> {
        let file_name = file_name.into();
        let content_type = content_type.into();

        self.policy.check(&content_type, data.len())?;

        // The same name enqueued twice within one millisecond would collide;
        // nudge the stamp until the id is unique within this client.
        let mut stamp = Utc::now().timestamp_millis();
        let mut id: FileId = format!("{}-{}", file_name, stamp);
        while self.files.iter().any(|f| f.id == id) {
            stamp += 1;
            id = format!("{}-{}", file_name, stamp);
        }

        self.files.push(QueuedFile {
            id: id.clone(),
            file_name,
            content_type,
            data,
            state: UploadState::Queued,
        });

        Ok(id)
    }

    /// Drop a queued or failed file together with its state. No-op for files
    /// that are in flight or already completed. Returns whether a file was
    /// removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.files.len();
        self.files.retain(|f| {
            f.id != id || matches!(f.state, UploadState::Uploading { .. } | UploadState::Succeeded { .. })
        });
        self.files.len() != before
    }

    pub fn pending(&self) -> &[QueuedFile] {
        &self.files
    }

    pub fn state_of(&self, id: &str) -> Option<&UploadState> {
        self.files.iter().find(|f| f.id == id).map(|f| f.state())
    }

    /// Upload a single pending file, then finalize it as a one-file batch.
    pub async fn upload(&mut self, id: &str) -> Result<Vec<StoredDocument>, ClientError> {
        let index = self
            .files
            .iter()
            .position(|f| f.id == id)
            .ok_or_else(|| ClientError::UnknownFile(id.to_string()))?;

        let mut documents = Vec::new();
        if let Some(doc) = self.transfer(index).await {
            documents.push(doc);
        }
        self.finish_batch(&documents);

        Ok(documents)
    }

    /// Upload every queued (or previously failed) file, one at a time.
    ///
    /// Sequential by design: it bounds concurrent load on the gateway and
    /// keeps per-file isolation trivially intact. Returns the documents that
    /// were stored; failed files stay in the pending set for retry.
    pub async fn upload_all(&mut self) -> Vec<StoredDocument> {
        let ids: Vec<FileId> = self
            .files
            .iter()
            .filter(|f| {
                matches!(f.state, UploadState::Queued | UploadState::Failed { .. })
            })
            .map(|f| f.id.clone())
            .collect();

        let mut documents = Vec::new();
        for id in ids {
            // Re-resolve and re-check at transfer time: a file may only enter
            // Uploading from Queued or Failed, never from a later state.
            let index = self.files.iter().position(|f| {
                f.id == id && matches!(f.state, UploadState::Queued | UploadState::Failed { .. })
            });
            if let Some(index) = index {
                if let Some(doc) = self.transfer(index).await {
                    documents.push(doc);
                }
            }
        }

        self.finish_batch(&documents);
        documents
    }

    /// Drive one file through `Uploading` to a terminal state.
    async fn transfer(&mut self, index: usize) -> Option<StoredDocument> {
        let (id, file_name, content_type, data) = {
            let file = &self.files[index];
            (
                file.id.clone(),
                file.file_name.clone(),
                file.content_type.clone(),
                file.data.clone(),
            )
        };

        self.files[index].state = UploadState::Uploading { progress: 0 };

        // Same derivation the gateway would apply; sending it explicitly lets
        // the caller display the key before the response lands.
        let key = derive_storage_key(&file_name, Utc::now().timestamp_millis());

        let part = match reqwest::multipart::Part::bytes(data.to_vec())
            .file_name(file_name.clone())
            .mime_str(&content_type)
        {
            Ok(part) => part,
            Err(e) => {
                return self.settle_failed(index, format!("invalid content type: {}", e));
            }
        };
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("key", key);

        let request = self.http.post(self.upload_url.as_str()).multipart(form).send();
        tokio::pin!(request);

        // Synthetic progress: the transfer gives no byte-level feedback, so
        // estimate monotonically up to the cap while the request is pending.
        // The interval lives inside this future and dies with it.
        let mut interval = tokio::time::interval(PROGRESS_TICK);
        let mut percent: u8 = 0;

        let outcome = loop {
            tokio::select! {
                _ = interval.tick() => {
                    percent = percent.saturating_add(PROGRESS_STEP).min(PROGRESS_CAP);
                    self.files[index].state = UploadState::Uploading { progress: percent };
                    self.emit(UploadEvent::Progress {
                        id: id.clone(),
                        percent,
                    });
                }
                res = &mut request => break res,
            }
        };

        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                return self.settle_failed(index, format!("transfer failed: {}", e));
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let message = match response.json::<GatewayFailure>().await {
                Ok(failure) => failure.message.unwrap_or(failure.error),
                Err(_) => format!("gateway returned {}", status),
            };
            return self.settle_failed(index, message);
        }

        let success = match response.json::<GatewaySuccess>().await {
            Ok(success) => success,
            Err(e) => {
                return self.settle_failed(index, format!("malformed gateway response: {}", e));
            }
        };

        let document = StoredDocument {
            key: success.key,
            location: success.location,
            bucket: success.bucket,
        };

        // 100 only now, with the gateway's acknowledgment in hand.
        self.files[index].state = UploadState::Uploading { progress: 100 };
        self.emit(UploadEvent::Progress {
            id: id.clone(),
            percent: 100,
        });

        self.files[index].state = UploadState::Succeeded {
            document: document.clone(),
        };
        self.emit(UploadEvent::Succeeded {
            id,
            document: document.clone(),
        });

        Some(document)
    }

    fn settle_failed(&mut self, index: usize, message: String) -> Option<StoredDocument> {
        let id = self.files[index].id.clone();
        tracing::warn!("Upload of {} failed: {}", id, message);

        self.files[index].state = UploadState::Failed {
            message: message.clone(),
        };
        self.emit(UploadEvent::Failed { id, message });

        None
    }

    /// Batch epilogue: surface the stored documents (if any) and drop the
    /// succeeded files from the pending set. Failed files stay for retry.
    fn finish_batch(&mut self, documents: &[StoredDocument]) {
        if documents.is_empty() {
            return;
        }

        self.emit(UploadEvent::BatchCompleted {
            documents: documents.to_vec(),
        });
        self.files
            .retain(|f| !matches!(f.state, UploadState::Succeeded { .. }));
    }

    fn emit(&self, event: UploadEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_policy() -> UploadPolicy {
        UploadPolicy {
            max_size_bytes: 16,
            allowed_types: vec!["text/plain".to_string()],
        }
    }

    #[test]
    fn test_enqueue_rejects_oversized_file() {
        let mut client = UploadClient::with_policy("http://localhost:0/api/upload", small_policy());

        let err = client
            .enqueue("big.txt", "text/plain", Bytes::from(vec![0u8; 17]))
            .unwrap_err();
        assert!(matches!(err, ClientError::FileTooLarge { size: 17, max: 16 }));
        assert!(client.pending().is_empty());
    }

    #[test]
    fn test_enqueue_rejects_disallowed_type() {
        let mut client = UploadClient::with_policy("http://localhost:0/api/upload", small_policy());

        let err = client
            .enqueue("app.exe", "application/x-msdownload", Bytes::from_static(b"MZ"))
            .unwrap_err();
        assert!(matches!(err, ClientError::UnsupportedType(_)));
    }

    #[test]
    fn test_enqueue_normalizes_content_type_parameters() {
        let mut client = UploadClient::with_policy("http://localhost:0/api/upload", small_policy());

        let id = client
            .enqueue("notes.txt", "text/plain; charset=utf-8", Bytes::from_static(b"hi"))
            .unwrap();
        assert_eq!(client.state_of(&id), Some(&UploadState::Queued));
    }

    #[test]
    fn test_remove_drops_queued_file_and_state() {
        let mut client = UploadClient::new("http://localhost:0/api/upload");

        let id = client
            .enqueue("notes.txt", "text/plain", Bytes::from_static(b"hi"))
            .unwrap();
        assert_eq!(client.pending().len(), 1);

        assert!(client.remove(&id));
        assert!(client.pending().is_empty());
        assert_eq!(client.state_of(&id), None);

        // removing twice is a no-op
        assert!(!client.remove(&id));
    }

    #[test]
    fn test_enqueue_assigns_unique_ids_to_same_named_files() {
        let mut client = UploadClient::new("http://localhost:0/api/upload");

        // Back-to-back enqueues land in the same millisecond.
        let id_a = client
            .enqueue("report.txt", "text/plain", Bytes::from_static(b"first"))
            .unwrap();
        let id_b = client
            .enqueue("report.txt", "text/plain", Bytes::from_static(b"second"))
            .unwrap();

        assert_ne!(id_a, id_b);
        assert_eq!(client.pending().len(), 2);
        assert_eq!(client.state_of(&id_a), Some(&UploadState::Queued));
        assert_eq!(client.state_of(&id_b), Some(&UploadState::Queued));
    }

    #[test]
    fn test_default_policy_accepts_documents() {
        let policy = UploadPolicy::default();
        assert!(policy.check("application/pdf", 1024).is_ok());
        assert!(policy.check("text/plain", 20 * 1024 * 1024).is_ok());
        assert!(policy.check("text/plain", 20 * 1024 * 1024 + 1).is_err());
        assert!(policy.check("video/mp4", 1024).is_err());
    }
}
