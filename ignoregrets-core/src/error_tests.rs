/*!
Tests for error handling and error types.
*/

#[cfg(test)]
mod tests {
    use crate::error::IgnoregretsError;
    use std::io;

    #[test]
    fn test_error_display() {
        let error = IgnoregretsError::validation("retention must be greater than 0");
        assert_eq!(
            error.to_string(),
            "Validation error: retention must be greater than 0"
        );

        let error = IgnoregretsError::storage("snapshots directory missing");
        assert_eq!(error.to_string(), "Storage error: snapshots directory missing");

        assert_eq!(
            IgnoregretsError::NothingToSnapshot.to_string(),
            "No files to snapshot"
        );
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error = IgnoregretsError::from(io_error);

        match error {
            IgnoregretsError::Io(_) => {}
            _ => panic!("Expected Io error variant"),
        }
    }

    #[test]
    fn test_error_from_json_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = IgnoregretsError::from(json_error);

        match error {
            IgnoregretsError::Json(_) => {}
            _ => panic!("Expected Json error variant"),
        }
    }

    #[test]
    fn test_index_out_of_range_names_offending_value() {
        let error = IgnoregretsError::SnapshotIndexOutOfRange {
            commit: "abc123".to_string(),
            index: 7,
            available: 2,
        };
        let message = error.to_string();
        assert!(message.contains("abc123"));
        assert!(message.contains('7'));
        assert!(message.contains('2'));
    }

    #[test]
    fn test_commit_mismatch_message() {
        let error = IgnoregretsError::CommitMismatch {
            expected: "abc123".to_string(),
            actual: "def456".to_string(),
        };

        assert!(error.to_string().contains("abc123"));
        assert!(error.to_string().contains("def456"));
        assert!(error.is_data_error());
    }

    #[test]
    fn test_data_error_classification() {
        assert!(IgnoregretsError::ManifestMissing("x.tar.gz".to_string()).is_data_error());
        assert!(IgnoregretsError::ManifestDecode("bad".to_string()).is_data_error());
        assert!(!IgnoregretsError::NothingToSnapshot.is_data_error());
        assert!(!IgnoregretsError::validation("x").is_data_error());
    }

    #[test]
    fn test_archive_error_keeps_source() {
        use std::error::Error;

        let error = IgnoregretsError::archive(
            "failed to read tar header",
            io::Error::new(io::ErrorKind::UnexpectedEof, "truncated"),
        );
        assert!(error.to_string().contains("failed to read tar header"));
        assert!(error.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<IgnoregretsError>();
        assert_sync::<IgnoregretsError>();
    }
}
