//! JSON application store tests

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::json;
use tokio_test::{assert_err, assert_ok};

use gakwaya_panel::errors::StoreError;
use gakwaya_panel::filesys::file::File;
use gakwaya_panel::models::application::ApplicationRecord;
use gakwaya_panel::storage::applications::{ApplicationStore, JsonApplicationStore};

fn document_path(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("db").join("applications.json")
}

fn store_in(dir: &tempfile::TempDir) -> JsonApplicationStore {
    JsonApplicationStore::new(File::new(document_path(dir)))
}

fn seed(dir: &tempfile::TempDir, records: &[ApplicationRecord]) {
    let path = document_path(dir);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let doc = json!({ "applications": records });
    std::fs::write(path, serde_json::to_vec_pretty(&doc).unwrap()).unwrap();
}

#[tokio::test]
async fn test_missing_document_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    assert!(store.get(1).await.unwrap().is_none());
    assert!(!dir.path().join("db").exists());
}

#[tokio::test]
async fn test_get_reads_seeded_records() {
    let dir = tempfile::tempdir().unwrap();
    let mut record = ApplicationRecord::new(3, "api");
    record.git_url = Some("https://example/api.git".to_string());
    record.env = BTreeMap::from([("PORT".to_string(), "3000".to_string())]);
    seed(&dir, &[record.clone(), ApplicationRecord::new(4, "worker")]);

    let store = store_in(&dir);
    assert_eq!(store.get(3).await.unwrap(), Some(record));
    assert!(store.get(5).await.unwrap().is_none());
}

#[tokio::test]
async fn test_minimal_record_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = document_path(&dir);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, r#"{"applications":[{"id":9,"name":"bare"}]}"#).unwrap();

    let record = store_in(&dir).get(9).await.unwrap().unwrap();
    assert_eq!(record, ApplicationRecord::new(9, "bare"));
}

#[tokio::test]
async fn test_record_deployment_persists() {
    let dir = tempfile::tempdir().unwrap();
    seed(
        &dir,
        &[
            ApplicationRecord::new(3, "api"),
            ApplicationRecord::new(4, "worker"),
        ],
    );
    let store = store_in(&dir);

    assert_ok!(store.record_deployment(3, "3:1700000000", "abc123").await);

    // a fresh instance reads what the first one wrote
    let reopened = store_in(&dir);
    let record = reopened.get(3).await.unwrap().unwrap();
    assert_eq!(record.image, "3:1700000000");
    assert_eq!(record.container_id.as_deref(), Some("abc123"));

    let untouched = reopened.get(4).await.unwrap().unwrap();
    assert_eq!(untouched, ApplicationRecord::new(4, "worker"));
}

#[tokio::test]
async fn test_record_deployment_unknown_application() {
    let dir = tempfile::tempdir().unwrap();
    seed(&dir, &[ApplicationRecord::new(3, "api")]);
    let store = store_in(&dir);

    let err = assert_err!(store.record_deployment(9, "9:1", "abc").await);
    assert!(matches!(err, StoreError::NotFound(9)));
    assert_eq!(
        store.get(3).await.unwrap(),
        Some(ApplicationRecord::new(3, "api"))
    );
}

#[tokio::test]
async fn test_corrupt_document_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = document_path(&dir);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"{ not json").unwrap();

    assert!(store_in(&dir).get(1).await.is_err());
}
