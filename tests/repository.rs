use std::io::Read;

use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use redbox_publish::config::{RepositoryConfig, RepositoryVersion};
use redbox_publish::error::PublishError;
use redbox_publish::repository::{self, RecordRepository};

fn config(base_url: &str, version: RepositoryVersion) -> RepositoryConfig {
    RepositoryConfig {
        version,
        base_url: format!("{base_url}/api/"),
        api_key: Some("secret".to_string()),
    }
}

/// Runs a blocking repository call off the test runtime.
async fn with_repository<T, F>(server: &MockServer, version: RepositoryVersion, call: F) -> T
where
    T: Send + 'static,
    F: FnOnce(&dyn RecordRepository) -> T + Send + 'static,
{
    let config = config(&server.uri(), version);
    tokio::task::spawn_blocking(move || {
        let repository = repository::connect(&config).unwrap();
        call(&*repository)
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn portal_fetches_record_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/records/metadata/X"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "title": "Soil samples",
            "dataRecord": {"oid": "D"},
            "dataLocations": [{"type": "attachment", "name": "a.txt", "fileId": "f1"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let record = with_repository(&server, RepositoryVersion::Redbox2, |repo| {
        repo.get_record("X")
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(record.oid, "X");
    assert_eq!(record.title.as_deref(), Some("Soil samples"));
    assert_eq!(record.data_record_oid().unwrap(), "D");
    assert_eq!(record.attachments().count(), 1);
}

#[tokio::test]
async fn missing_record_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/records/metadata/nope"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let record = with_repository(&server, RepositoryVersion::Redbox2, |repo| {
        repo.get_record("nope")
    })
    .await
    .unwrap();

    assert!(record.is_none());
}

#[tokio::test]
async fn empty_or_null_body_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/records/metadata/empty"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/records/metadata/null"))
        .respond_with(ResponseTemplate::new(200).set_body_string("null"))
        .mount(&server)
        .await;

    let (empty, null) = with_repository(&server, RepositoryVersion::Redbox2, |repo| {
        (repo.get_record("empty"), repo.get_record("null"))
    })
    .await;

    assert!(empty.unwrap().is_none());
    assert!(null.unwrap().is_none());
}

#[tokio::test]
async fn portal_streams_datastream_by_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/records/datastreams/D"))
        .and(query_param("datastreamId", "f1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let body = with_repository(&server, RepositoryVersion::Redbox2, |repo| {
        let mut stream = repo.read_datastream("D", "f1").unwrap().unwrap();
        let mut body = Vec::new();
        stream.read_to_end(&mut body).unwrap();
        body
    })
    .await;

    assert_eq!(body, b"hello");
}

#[tokio::test]
async fn missing_datastream_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/records/datastreams/D"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let absent = with_repository(&server, RepositoryVersion::Redbox2, |repo| {
        repo.read_datastream("D", "gone").map(|stream| stream.is_none())
    })
    .await;

    assert_matches!(absent, Ok(true));
}

#[tokio::test]
async fn server_error_is_reported_with_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/records/metadata/X"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = with_repository(&server, RepositoryVersion::Redbox2, |repo| {
        repo.get_record("X")
    })
    .await
    .unwrap_err();

    assert_matches!(
        err,
        PublishError::RepositoryStatus { status: 500, ref message } if message == "boom"
    );
}

#[tokio::test]
async fn non_object_record_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/records/metadata/X"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["not", "a", "record"])))
        .mount(&server)
        .await;

    let err = with_repository(&server, RepositoryVersion::Redbox2, |repo| {
        repo.get_record("X")
    })
    .await
    .unwrap_err();

    assert_matches!(err, PublishError::RecordDecode(_));
}

#[tokio::test]
async fn legacy_variant_uses_redbox1_routes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/recordmetadata/X"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "dataRecord": {"oid": "D"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/datastream/D"))
        .and(query_param("datastreamId", "f1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"legacy".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let (record, body) = with_repository(&server, RepositoryVersion::Redbox1, |repo| {
        let record = repo.get_record("X").unwrap().unwrap();
        let mut stream = repo.read_datastream("D", "f1").unwrap().unwrap();
        let mut body = String::new();
        stream.read_to_string(&mut body).unwrap();
        (record, body)
    })
    .await;

    assert_eq!(record.data_record_oid().unwrap(), "D");
    assert_eq!(body, "legacy");
}
