/// Sanitizes the base name of an uploaded file for use in a storage key.
///
/// Every character outside `[A-Za-z0-9]` is replaced 1:1 with `_`; ASCII
/// letters are folded to lowercase. The result only ever contains
/// `[a-z0-9_]`.
pub fn sanitize_base_name(base: &str) -> String {
    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Splits a file name into (base, extension) at the last dot.
///
/// The extension is kept verbatim (case preserved). A name without a dot has
/// no extension.
pub fn split_extension(file_name: &str) -> (&str, Option<&str>) {
    match file_name.rfind('.') {
        Some(idx) => (&file_name[..idx], Some(&file_name[idx + 1..])),
        None => (file_name, None),
    }
}

/// Derives the canonical storage key for an upload:
/// `uploads/{sanitized-base}-{epoch-millis}.{extension}`.
///
/// Deterministic for a fixed `(file_name, timestamp_millis)` pair. Collisions
/// are only possible for identical names uploaded within the same
/// millisecond, which the gateway deliberately does not guard against.
pub fn derive_storage_key(file_name: &str, timestamp_millis: i64) -> String {
    let (base, extension) = split_extension(file_name);
    let base = sanitize_base_name(base);

    match extension {
        Some(ext) if !ext.is_empty() => format!("uploads/{}-{}.{}", base, timestamp_millis, ext),
        _ => format!("uploads/{}-{}", base, timestamp_millis),
    }
}

/// The document id handed to the ingestion service: the last path segment of
/// the storage key.
pub fn document_id(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_one_to_one() {
        assert_eq!(sanitize_base_name("Q4 Report (final)"), "q4_report__final_");
        assert_eq!(sanitize_base_name("hello-world"), "hello_world");
        assert_eq!(sanitize_base_name("already_fine_123"), "already_fine_123");
        assert_eq!(sanitize_base_name("über"), "_ber");
    }

    #[test]
    fn test_sanitize_output_alphabet() {
        let inputs = ["Q4 Report (final)", "weird~!@#name", "ファイル名", "MiXeD.CaSe"];
        for input in inputs {
            let out = sanitize_base_name(input);
            assert_eq!(out.chars().count(), input.chars().count());
            assert!(
                out.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'),
                "unexpected character in {:?}",
                out
            );
        }
    }

    #[test]
    fn test_derive_key_reference_example() {
        let key = derive_storage_key("Q4 Report (final).PDF", 1_700_000_000_000);
        assert_eq!(key, "uploads/q4_report__final_-1700000000000.PDF");
    }

    #[test]
    fn test_derive_key_is_deterministic() {
        let a = derive_storage_key("report.pdf", 1_700_000_000_000);
        let b = derive_storage_key("report.pdf", 1_700_000_000_000);
        assert_eq!(a, b);

        let c = derive_storage_key("report.pdf", 1_700_000_000_001);
        assert_ne!(a, c);
    }

    #[test]
    fn test_derive_key_without_extension() {
        let key = derive_storage_key("README", 42);
        assert_eq!(key, "uploads/readme-42");
    }

    #[test]
    fn test_derive_key_keeps_only_last_extension() {
        let key = derive_storage_key("archive.tar.gz", 42);
        assert_eq!(key, "uploads/archive_tar-42.gz");
    }

    #[test]
    fn test_document_id_is_last_segment() {
        assert_eq!(document_id("uploads/report-123.pdf"), "report-123.pdf");
        assert_eq!(document_id("bare-key"), "bare-key");
    }
}
