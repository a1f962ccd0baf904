pub mod ingestion;
pub mod storage;
