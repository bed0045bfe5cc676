/*!
Tests for manifest serialization, compatibility and validation edge cases.
*/

#[cfg(test)]
mod tests {
    use crate::checksum::digest_bytes;
    use crate::config::Settings;
    use crate::manifest::{Manifest, MANIFEST_FORMAT_VERSION};
    use crate::IgnoregretsError;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_manifest_serialization_roundtrip() {
        let settings = Settings {
            exclude: vec!["*.log".to_string()],
            include: vec![".env".to_string()],
            ..Settings::default()
        };
        let mut manifest = Manifest::new("abc123", 1, settings);
        manifest.record_file("build/out.txt", digest_bytes(b"x"));
        manifest.record_file(".env", digest_bytes(b"y"));

        let json = manifest.to_json().unwrap();
        let decoded = Manifest::from_json(&json).unwrap();

        assert_eq!(decoded, manifest);
        assert_eq!(decoded.file_count(), 2);
        assert_eq!(decoded.effective_config.exclude, vec!["*.log"]);
    }

    #[test]
    fn test_timestamp_is_whole_seconds() {
        let with_nanos = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
            + chrono::Duration::milliseconds(750);
        let manifest = Manifest::new("abc123", 0, Settings::default()).with_timestamp(with_nanos);

        assert_eq!(
            manifest.timestamp,
            Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
        );
    }

    #[test]
    fn test_missing_format_version_defaults() {
        let json = r#"{
            "commit": "abc123",
            "timestamp": "2024-03-09T14:05:07Z",
            "index": 0,
            "files": {".env": "00"},
            "config": {"retention": 5, "snapshot_on": ["commit"], "restore_on": ["checkout"],
                       "hooks_enabled": false, "exclude": [], "include": []}
        }"#;

        let manifest = Manifest::from_json(json.as_bytes()).unwrap();
        assert_eq!(manifest.format_version, MANIFEST_FORMAT_VERSION);
        assert_eq!(manifest.effective_config.retention_count, 5);
    }

    #[test]
    fn test_newer_format_version_is_rejected() {
        let mut manifest = Manifest::new("abc123", 0, Settings::default());
        manifest.format_version = MANIFEST_FORMAT_VERSION + 1;
        assert!(!manifest.is_compatible());

        let json = serde_json::to_vec(&manifest).unwrap();
        assert!(matches!(
            Manifest::from_json(&json),
            Err(IgnoregretsError::ManifestDecode(_))
        ));
    }

    #[test]
    fn test_empty_commit_is_invalid() {
        let manifest = Manifest::new("", 0, Settings::default());
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_missing_required_field() {
        let json = r#"{"timestamp": "2024-03-09T14:05:07Z", "index": 0, "files": {}}"#;
        assert!(Manifest::from_json(json.as_bytes()).is_err());
    }
}
