fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};
    use std::fs;
    use std::path::PathBuf;

    use chunkyard_protocol::{ChunkAck, SessionState, UploadStatusResponse};
    use chunkyard_transfer::UploadSession;

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (key order independent).
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));
        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  fixture: {fixture}\n  rust:    {reserialized}"
        );
        parsed
    }

    // --- HTTP bodies ---

    #[test]
    fn fixture_upload_status_response() {
        let status: UploadStatusResponse = roundtrip_test("upload_status_response.json");
        assert_eq!(status.uploaded_chunks, vec![0, 2]);
        assert_eq!(status.state, Some(SessionState::Receiving));
        assert_eq!(status.missing_chunks(4), vec![1, 3]);
    }

    #[test]
    fn fixture_upload_status_empty() {
        let status: UploadStatusResponse = roundtrip_test("upload_status_empty.json");
        assert_eq!(status, UploadStatusResponse::empty());
    }

    #[test]
    fn minimal_status_body_is_accepted() {
        // Clients that only know `uploadedChunks` still parse and produce it.
        let status: UploadStatusResponse =
            serde_json::from_str(r#"{"uploadedChunks":[3,1]}"#).unwrap();
        assert_eq!(status.uploaded_chunks, vec![3, 1]);
        assert_eq!(status.state, None);
    }

    #[test]
    fn fixture_chunk_ack_completed() {
        let ack: ChunkAck = roundtrip_test("chunk_ack_completed.json");
        assert!(ack.completed);
        assert_eq!(ack.file.as_deref(), Some("x.bin"));
    }

    #[test]
    fn fixture_chunk_ack_stored() {
        let ack: ChunkAck = roundtrip_test("chunk_ack_stored.json");
        assert!(!ack.completed);
        assert_eq!(ack.file, None);
    }

    // --- Persisted status record ---

    #[test]
    fn fixture_status_record() {
        let fixture = load_fixture("status_record.json");
        let record: BTreeMap<String, UploadSession> = serde_json::from_value(fixture)
            .unwrap_or_else(|e| panic!("failed to deserialize status_record.json: {e}"));

        let pending = &record["a7f3c2"];
        assert_eq!(pending.filename, "holiday.mp4");
        assert_eq!(pending.declared_size, 10_485_760);
        assert_eq!(pending.received_chunks, BTreeSet::from([0, 1, 3]));
        assert_eq!(pending.state, SessionState::Receiving);
        assert!(!pending.is_complete(pending.total_chunks));
        assert_eq!(pending.completed_at, None);

        let done = &record["u1"];
        assert_eq!(done.state, SessionState::Completed);
        assert_eq!(done.output_name.as_deref(), Some("x-1.bin"));
        assert!(done.is_complete(2));
        assert_eq!(done.to_status().uploaded_chunks, vec![0, 1]);

        // Re-encoding must read back to the same sessions.
        let encoded = serde_json::to_string(&record).unwrap();
        let decoded: BTreeMap<String, UploadSession> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn record_without_state_defaults_to_receiving() {
        let json = r#"{
            "id": "old",
            "filename": "f.bin",
            "fileSize": 1,
            "totalChunks": 1,
            "uploadedChunks": [],
            "createdAt": "2026-01-01T00:00:00Z",
            "updatedAt": "2026-01-01T00:00:00Z"
        }"#;
        let session: UploadSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.state, SessionState::Receiving);
        assert_eq!(session.output_name, None);
    }
}
