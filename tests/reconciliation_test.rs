// End-to-end reconciliation passes: real HTTP clients against mockito servers,
// real SQLite store in a temp directory.

use mockito::{Matcher, Mock, Server, ServerGuard};
use sensorwatch::bootstrap;
use sensorwatch::config::Config;
use sensorwatch::store::{SensorStateStore, SqliteStateStore};
use sensorwatch::Error;
use tempfile::TempDir;

// ── Helpers ───────────────────────────────────────────────────────────────────

struct Fixture {
    server: ServerGuard,
    _dir: TempDir,
    db_path: String,
    config: Config,
}

async fn fixture(metrics_enabled: bool) -> Fixture {
    let server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("state.db").to_string_lossy().into_owned();

    let toml = format!(
        r#"
        [directory]
        base_url = "{url}/api/v3"
        api_key = "test-key"

        [store]
        path = "{db}"

        [notify]
        url = "{url}/1/messages.json"
        token = "app-token"
        user = "user-key"

        [metrics]
        enabled = {metrics}
        url = "{url}"
        token = "influx-token"
        org = "plant-ops"
        bucket = "sensors"
        "#,
        url = server.url(),
        db = db_path.replace('\\', "\\\\"),
        metrics = metrics_enabled,
    );
    let config: Config = toml::from_str(&toml).unwrap();
    config.validate().unwrap();

    Fixture {
        server,
        _dir: dir,
        db_path,
        config,
    }
}

async fn mock_structures(server: &mut ServerGuard) -> Mock {
    server
        .mock("GET", "/api/v3/structures")
        .match_header("authorization", "Bearer test-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"id": "S1", "name": "Plant 1"}]"#)
        .create_async()
        .await
}

async fn mock_plant_sensors(server: &mut ServerGuard, online: bool) -> Mock {
    server
        .mock("GET", "/api/v3/structures/S1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(format!(
            r#"{{"sensors": [{{"eui": "AA11BB22", "online": {}, "userConfig": {{"name": "Temp1"}}}}]}}"#,
            online
        ))
        .create_async()
        .await
}

// ── Tests ─────────────────────────────────────────────────────────────────────

/// Plant 1 / Temp1 stored offline, polled online: record flips, one message,
/// one metric point.
#[tokio::test]
async fn test_transition_scenario_end_to_end() {
    let mut f = fixture(true).await;
    let _structures = mock_structures(&mut f.server).await;
    let _sensors = mock_plant_sensors(&mut f.server, true).await;

    let notify = f
        .server
        .mock("POST", "/1/messages.json")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("token".into(), "app-token".into()),
            Matcher::UrlEncoded("user".into(), "user-key".into()),
            Matcher::UrlEncoded(
                "message".into(),
                "Sensor 'Temp1' (AA11BB22) in 'Plant 1' is now online.".into(),
            ),
        ]))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let metrics = f
        .server
        .mock("POST", "/api/v2/write")
        .match_query(Matcher::Any)
        .match_header("authorization", "Token influx-token")
        .match_body(Matcher::Regex(
            r"^sensor_status,eui=AA11BB22,structure_id=S1,structure_name=Plant\\ 1 is_online=true \d+$"
                .to_string(),
        ))
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    // Prior state: offline
    let store = SqliteStateStore::new(&f.db_path).unwrap();
    store.upsert("AA11BB22", false, "Temp1", "Plant 1", true).unwrap();
    let prior = store.get("AA11BB22").unwrap().unwrap();

    let engine = bootstrap::build_engine(&f.config).unwrap();
    let summary = engine.run().await.unwrap();

    assert_eq!(summary.transitioned, 1);
    assert_eq!(summary.notifications_sent, 1);
    assert!(summary.is_clean());
    notify.assert_async().await;
    metrics.assert_async().await;

    let record = store.get("AA11BB22").unwrap().unwrap();
    assert!(record.is_online);
    assert!(record.last_status_change > prior.last_status_change);
    assert_eq!(record.last_status_change, record.last_updated);
}

/// Unknown sensor: record created, nothing sent to the push channel.
#[tokio::test]
async fn test_first_sighting_is_silent() {
    let mut f = fixture(false).await;
    let _structures = mock_structures(&mut f.server).await;
    let _sensors = mock_plant_sensors(&mut f.server, true).await;
    let notify = f
        .server
        .mock("POST", "/1/messages.json")
        .expect(0)
        .create_async()
        .await;

    let engine = bootstrap::build_engine(&f.config).unwrap();
    let summary = engine.run().await.unwrap();

    assert_eq!(summary.created, 1);
    notify.assert_async().await;

    let store = SqliteStateStore::new(&f.db_path).unwrap();
    let record = store.get("AA11BB22").unwrap().unwrap();
    assert!(record.is_online);
    assert_eq!(record.sensor_name, "Temp1");
    assert_eq!(record.structure_name, "Plant 1");
}

/// Push service failing does not stop the state flip or the metric write.
#[tokio::test]
async fn test_notification_outage_still_persists_and_samples() {
    let mut f = fixture(true).await;
    let _structures = mock_structures(&mut f.server).await;
    let _sensors = mock_plant_sensors(&mut f.server, false).await;
    let _notify = f
        .server
        .mock("POST", "/1/messages.json")
        .with_status(500)
        .create_async()
        .await;
    let metrics = f
        .server
        .mock("POST", "/api/v2/write")
        .match_query(Matcher::Any)
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let store = SqliteStateStore::new(&f.db_path).unwrap();
    store.upsert("AA11BB22", true, "Temp1", "Plant 1", true).unwrap();

    let engine = bootstrap::build_engine(&f.config).unwrap();
    let summary = engine.run().await.unwrap();

    assert_eq!(summary.notify_failures, 1);
    assert!(summary.status_line().contains("1 notify"));
    metrics.assert_async().await;
    assert!(!store.get("AA11BB22").unwrap().unwrap().is_online);
}

/// Directory down: the pass fails and the store is untouched.
#[tokio::test]
async fn test_directory_outage_fails_pass() {
    let mut f = fixture(false).await;
    let _structures = f
        .server
        .mock("GET", "/api/v3/structures")
        .with_status(503)
        .create_async()
        .await;

    let engine = bootstrap::build_engine(&f.config).unwrap();
    let err = engine.run().await.unwrap_err();

    assert!(matches!(err, Error::DirectoryUnavailable(_)));
    let store = SqliteStateStore::new(&f.db_path).unwrap();
    assert!(store.list_all().unwrap().is_empty());
}

/// Digest reads what the pass stored and posts it as HTML.
#[tokio::test]
async fn test_digest_after_pass() {
    let mut f = fixture(false).await;
    let _structures = mock_structures(&mut f.server).await;
    let _sensors = mock_plant_sensors(&mut f.server, false).await;

    let engine = bootstrap::build_engine(&f.config).unwrap();
    engine.run().await.unwrap();

    let digest = f
        .server
        .mock("POST", "/1/messages.json")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("html".into(), "1".into()),
            Matcher::Regex("Temp1".to_string()),
        ]))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let reporter = bootstrap::build_digest(&f.config).unwrap();
    let summary = reporter.run().await.unwrap();

    assert_eq!(summary.offline, 1);
    assert_eq!(summary.structures, 1);
    digest.assert_async().await;
}
