//! Publisher behavior against a mocked telemetry service.
//!
//! These tests validate the dependency-ordered write path:
//! - existence checks by natural key, per tenant
//! - create-under-default-then-share for secondary tenants
//! - per-entity failure isolation
//! - the advisory existing-sample cross-check
//! - attachment upload and batch confirmation

use chrono::{DateTime, Utc};
use labsync_core::metrics::{counters, RecordingMetrics};
use labsync_core::model::{FieldSpec, FieldType, ImportCheck, IngestRecord, SensorType, Tenant};
use labsync_core::publish::Publisher;
use labsync_core::transform::TransformOutput;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn default_tenant() -> Tenant {
    Tenant {
        api_key: "default-key".to_string(),
        organization: "main".to_string(),
    }
}

fn client_tenant() -> Tenant {
    Tenant {
        api_key: "client-key".to_string(),
        organization: "client".to_string(),
    }
}

fn sensor_type(tenant: &Tenant) -> SensorType {
    let mut schema = BTreeMap::new();
    schema.insert(
        "PH".to_string(),
        FieldSpec {
            label: "pH".to_string(),
            field_type: FieldType::Double,
            metric: "parsum".to_string(),
        },
    );
    schema.insert(
        "file".to_string(),
        FieldSpec {
            label: "File".to_string(),
            field_type: FieldType::String,
            metric: "parsum".to_string(),
        },
    );
    SensorType {
        id: "210".to_string(),
        name: "Kasgrond".to_string(),
        tenant: tenant.clone(),
        schema,
    }
}

fn import_check(tenant: &Tenant) -> ImportCheck {
    ImportCheck {
        id: "K1 - 210".to_string(),
        name: "Kasgrond Check".to_string(),
        sensor_type_id: "210".to_string(),
        tenant: tenant.clone(),
    }
}

fn timestamp() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-08-06T10:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn record(tenant: &Tenant, order_id: &str, attachment: Option<Vec<u8>>) -> IngestRecord {
    IngestRecord {
        import_check_id: "K1 - 210".to_string(),
        order_id: order_id.to_string(),
        tenant: tenant.clone(),
        data: BTreeMap::from([
            ("PH".to_string(), json!(6)),
            ("order_id".to_string(), json!(order_id)),
        ]),
        attachment,
        timestamp: timestamp(),
    }
}

fn publisher(server: &MockServer, metrics: Arc<RecordingMetrics>) -> Publisher {
    Publisher::new(
        server.uri(),
        Duration::from_secs(5),
        default_tenant(),
        metrics,
    )
}

#[tokio::test]
async fn test_existing_entities_and_remote_records_cause_no_writes() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sensor-type/organization/main"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"typeId": "t-1", "radioId": "210"}])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/import-check/organization/main"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"checkId": "c-1", "sourceId": "K1 - 210"}])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stats/check/c-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"samples": [{"data": {"order_id": "o-1"}}]})),
        )
        .mount(&server)
        .await;
    // Nothing may be created or ingested on an idempotent re-run.
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let tenant = default_tenant();
    let bundle = TransformOutput {
        sensor_types: vec![sensor_type(&tenant)],
        import_checks: vec![import_check(&tenant)],
        ingest_records: vec![record(&tenant, "o-1", None)],
        touched: ["o-1".to_string()].into(),
    };

    let metrics = Arc::new(RecordingMetrics::default());
    let mut publisher = publisher(&server, Arc::clone(&metrics));
    let confirmed = publisher.publish(bundle).await.unwrap();

    assert!(confirmed.is_empty());
    assert_eq!(metrics.get(counters::INGEST_SKIPPED), 1);
    assert_eq!(metrics.get(counters::INGEST_ACCEPTED), 0);
}

#[tokio::test]
async fn test_creates_under_default_tenant_and_shares() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sensor-type/organization/client"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sensor-type/organization/main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/sensor-type/organization/main"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"typeId": "t-1", "radioId": "210"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/share-sensor-type/sensor-type/t-1/organization/client"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let bundle = TransformOutput {
        sensor_types: vec![sensor_type(&client_tenant())],
        ..Default::default()
    };

    let metrics = Arc::new(RecordingMetrics::default());
    let mut publisher = publisher(&server, Arc::clone(&metrics));
    publisher.publish(bundle).await.unwrap();

    assert_eq!(metrics.get(counters::SENSOR_TYPE_CREATED), 1);
    assert_eq!(metrics.get(counters::SENSOR_TYPE_SHARED), 1);
    assert_eq!(metrics.get(counters::SENSOR_TYPE_FAILED), 0);
}

#[tokio::test]
async fn test_shares_sensor_type_already_owned_by_default_tenant() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sensor-type/organization/client"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sensor-type/organization/main"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"typeId": "t-9", "radioId": "210"}])),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/sensor-type/organization/main"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/share-sensor-type/sensor-type/t-9/organization/client"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let bundle = TransformOutput {
        sensor_types: vec![sensor_type(&client_tenant())],
        ..Default::default()
    };

    let metrics = Arc::new(RecordingMetrics::default());
    let mut publisher = publisher(&server, Arc::clone(&metrics));
    publisher.publish(bundle).await.unwrap();

    assert_eq!(metrics.get(counters::SENSOR_TYPE_CREATED), 0);
    assert_eq!(metrics.get(counters::SENSOR_TYPE_SHARED), 1);
}

#[tokio::test]
async fn test_failed_sensor_type_cascades_without_aborting_the_run() {
    let server = MockServer::start().await;

    let tenant = client_tenant();
    Mock::given(method("GET"))
        .and(path("/sensor-type/organization/client"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sensor-type/organization/main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    // The create itself fails; everything referencing the type follows.
    Mock::given(method("POST"))
        .and(path("/sensor-type/organization/main"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/import-check/organization/client"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/import-check/organization/client"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let bundle = TransformOutput {
        sensor_types: vec![sensor_type(&tenant)],
        import_checks: vec![import_check(&tenant)],
        ingest_records: vec![record(&tenant, "o-1", None)],
        touched: ["o-1".to_string()].into(),
    };

    let metrics = Arc::new(RecordingMetrics::default());
    let mut publisher = publisher(&server, Arc::clone(&metrics));
    let confirmed = publisher.publish(bundle).await.unwrap();

    assert!(confirmed.is_empty());
    assert_eq!(metrics.get(counters::SENSOR_TYPE_FAILED), 1);
    assert_eq!(metrics.get(counters::IMPORT_CHECK_FAILED), 1);
    assert_eq!(metrics.get(counters::INGEST_SKIPPED), 1);
}

#[tokio::test]
async fn test_ingest_uploads_attachment_and_confirms() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/import-check/organization/main"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"checkId": "c-1", "sourceId": "K1 - 210"}])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stats/check/c-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"samples": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/data-upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"uploadId": "u-1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"acceptedEventCount": 1, "failedEventCount": 0})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let tenant = default_tenant();
    let bundle = TransformOutput {
        ingest_records: vec![record(&tenant, "o-1", Some(b"%PDF-stub".to_vec()))],
        touched: ["o-1".to_string()].into(),
        ..Default::default()
    };

    let metrics = Arc::new(RecordingMetrics::default());
    let mut publisher = publisher(&server, Arc::clone(&metrics));
    let confirmed = publisher.publish(bundle).await.unwrap();

    assert_eq!(confirmed, vec!["o-1".to_string()]);
    assert_eq!(metrics.get(counters::INGEST_ACCEPTED), 1);

    // The submitted event must carry the upload handle, the check id and
    // the sample timestamp.
    let requests = server.received_requests().await.unwrap();
    let ingest = requests
        .iter()
        .find(|r| r.url.path() == "/ingest")
        .unwrap();
    let events: serde_json::Value = serde_json::from_slice(&ingest.body).unwrap();
    assert_eq!(events[0]["checkId"], json!("c-1"));
    assert_eq!(events[0]["data"]["file"], json!("u-1"));
    assert_eq!(events[0]["data"]["PH"], json!(6));
    assert_eq!(events[0]["timestamp"], json!("2026-08-06T10:00:00Z"));
    assert_eq!(events[0]["status"], json!("ok"));
}

#[tokio::test]
async fn test_failed_events_in_batch_are_not_confirmed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/import-check/organization/main"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"checkId": "c-1", "sourceId": "K1 - 210"}])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stats/check/c-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"samples": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"acceptedEventCount": 0, "failedEventCount": 1})),
        )
        .mount(&server)
        .await;

    let tenant = default_tenant();
    let bundle = TransformOutput {
        ingest_records: vec![record(&tenant, "o-1", None)],
        touched: ["o-1".to_string()].into(),
        ..Default::default()
    };

    let metrics = Arc::new(RecordingMetrics::default());
    let mut publisher = publisher(&server, Arc::clone(&metrics));
    let confirmed = publisher.publish(bundle).await.unwrap();

    assert!(confirmed.is_empty());
    assert_eq!(metrics.get(counters::INGEST_FAILED), 1);
}

#[tokio::test]
async fn test_cross_check_failure_does_not_block_ingestion() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/import-check/organization/main"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"checkId": "c-1", "sourceId": "K1 - 210"}])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stats/check/c-1"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"acceptedEventCount": 1, "failedEventCount": 0})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let tenant = default_tenant();
    let bundle = TransformOutput {
        ingest_records: vec![record(&tenant, "o-1", None)],
        touched: ["o-1".to_string()].into(),
        ..Default::default()
    };

    let metrics = Arc::new(RecordingMetrics::default());
    let mut publisher = publisher(&server, Arc::clone(&metrics));
    let confirmed = publisher.publish(bundle).await.unwrap();

    assert_eq!(confirmed, vec!["o-1".to_string()]);
}

#[tokio::test]
async fn test_upload_failure_aborts_only_that_record() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/import-check/organization/main"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"checkId": "c-1", "sourceId": "K1 - 210"}])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stats/check/c-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"samples": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/data-upload"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    // Only the record without the doomed upload reaches ingestion.
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"acceptedEventCount": 1, "failedEventCount": 0})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let tenant = default_tenant();
    let bundle = TransformOutput {
        ingest_records: vec![
            record(&tenant, "o-1", Some(b"%PDF-stub".to_vec())),
            record(&tenant, "o-2", None),
        ],
        touched: ["o-1".to_string(), "o-2".to_string()].into(),
        ..Default::default()
    };

    let metrics = Arc::new(RecordingMetrics::default());
    let mut publisher = publisher(&server, Arc::clone(&metrics));
    let confirmed = publisher.publish(bundle).await.unwrap();

    assert_eq!(confirmed, vec!["o-2".to_string()]);
    assert_eq!(metrics.get(counters::INGEST_FAILED), 1);
    assert_eq!(metrics.get(counters::INGEST_ACCEPTED), 1);
}
