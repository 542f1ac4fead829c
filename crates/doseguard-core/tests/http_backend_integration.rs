//! HTTP backend client against a mocked server.

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{record, session, FixedCapture, RecordingPlatform};
use doseguard_core::storage::{ApiConfig, NotificationsConfig};
use doseguard_core::sync::AcknowledgeRequest;
use doseguard_core::{
    CoreError, Database, Dose, DoseBackend, DoseEngine, DoseStatus, EvidenceRef, HttpBackend,
    TransportError,
};
use mockito::Matcher;
use serde_json::json;
use tokio::net::TcpListener;

fn backend_for(server: &mockito::ServerGuard) -> HttpBackend {
    HttpBackend::new(&ApiConfig {
        base_url: server.url(),
        timeout_secs: 5,
    })
    .unwrap()
}

/// Accepts connections and never answers them.
async fn silent_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn fetch_returns_raw_records() {
    let mut server = mockito::Server::new_async().await;
    let body = json!([
        { "id": 1, "nombre_medicamento": "Paracetamol", "hora_programada": "2030-01-01T08:00:00Z" },
        { "id": 2, "nombre_medicamento": "Ibuprofeno", "hora_programada": "not-a-date" }
    ]);
    let mock = server
        .mock("GET", "/alarmas/12345678901")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await;

    let records = backend_for(&server).fetch_doses(&session()).await.unwrap();

    mock.assert_async().await;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["nombre_medicamento"], "Paracetamol");
}

#[tokio::test]
async fn fetch_maps_error_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/alarmas/12345678901")
        .with_status(503)
        .with_body("maintenance")
        .create_async()
        .await;

    let err = backend_for(&server).fetch_doses(&session()).await.unwrap_err();

    assert!(matches!(
        err,
        TransportError::Status { status: 503, ref body } if body == "maintenance"
    ));
}

#[tokio::test]
async fn fetch_rejects_non_array_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/alarmas/12345678901")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"no alarms"}"#)
        .create_async()
        .await;

    let err = backend_for(&server).fetch_doses(&session()).await.unwrap_err();
    assert!(matches!(err, TransportError::Decode(_)));
}

#[tokio::test]
async fn acknowledge_posts_multipart_and_returns_status() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/alarmas/apagar")
        .match_header(
            "content-type",
            Matcher::Regex("^multipart/form-data; boundary=.+".into()),
        )
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#"name="imagen"; filename="alarma_42_1700000000000.jpg""#.into()),
            Matcher::Regex("Content-Type: image/jpeg".into()),
            Matcher::Regex(r#"name="id"\r\n\r\n42"#.into()),
            Matcher::Regex(r#"name="usuario_nss"\r\n\r\n12345678901"#.into()),
        ]))
        .with_status(200)
        .create_async()
        .await;

    let status = backend_for(&server)
        .acknowledge(AcknowledgeRequest {
            dose_id: 42,
            nss: "12345678901".into(),
            file_name: "alarma_42_1700000000000.jpg".into(),
            image: b"jpeg-bytes".to_vec(),
        })
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn acknowledge_passes_through_rejection_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/alarmas/apagar")
        .with_status(400)
        .create_async()
        .await;

    let status = backend_for(&server)
        .acknowledge(AcknowledgeRequest {
            dose_id: 1,
            nss: "1".into(),
            file_name: "alarma_1_0.jpg".into(),
            image: vec![0xFF, 0xD8],
        })
        .await
        .unwrap();
    assert_eq!(status, 400);
}

#[tokio::test]
async fn register_token_posts_json() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/registrar-token")
        .match_body(Matcher::Json(json!({
            "nss": "12345678901",
            "token_expo": "ExponentPushToken[xyz]"
        })))
        .with_status(201)
        .create_async()
        .await;

    backend_for(&server)
        .register_token(&session(), "ExponentPushToken[xyz]")
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let backend = HttpBackend::new(&ApiConfig {
        base_url: "http://127.0.0.1:9".into(),
        timeout_secs: 2,
    })
    .unwrap();

    let err = backend.fetch_doses(&session()).await.unwrap_err();
    assert!(matches!(
        err,
        TransportError::Network(_) | TransportError::Timeout
    ));
}

#[tokio::test]
async fn silent_backend_times_out() {
    let backend = HttpBackend::new(&ApiConfig {
        base_url: silent_server().await,
        timeout_secs: 1,
    })
    .unwrap();

    let err = backend.fetch_doses(&session()).await.unwrap_err();
    assert!(matches!(err, TransportError::Timeout), "got {err:?}");
}

#[tokio::test]
async fn refresh_timeout_leaves_cached_doses_untouched() {
    let backend = HttpBackend::new(&ApiConfig {
        base_url: silent_server().await,
        timeout_secs: 1,
    })
    .unwrap();
    let platform = Arc::new(RecordingPlatform::default());
    let engine = DoseEngine::with_backend(
        Arc::new(backend),
        Arc::new(Database::open_in_memory().unwrap()),
        NotificationsConfig::default(),
        platform.clone(),
        Arc::new(FixedCapture::returning(Ok(EvidenceRef::new("unused.jpg")))),
    )
    .unwrap();
    let cached = vec![Dose::new(3, "Enalapril", Utc::now() + Duration::hours(1))];
    engine.store().replace_all(cached.clone()).unwrap();

    let err = engine.refresh(&session()).await.unwrap_err();

    assert!(matches!(err, CoreError::Transport(TransportError::Timeout)), "got {err:?}");
    assert_eq!(engine.list(), cached);
    assert_eq!(platform.live_count(), 0);
}

#[tokio::test]
async fn engine_round_trip_over_http() {
    let mut server = mockito::Server::new_async().await;
    let due = Utc::now() - Duration::minutes(3);
    server
        .mock("GET", "/alarmas/12345678901")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!([record(11, "Levotiroxina", due)]).to_string())
        .create_async()
        .await;
    let ack = server
        .mock("POST", "/alarmas/apagar")
        .match_body(Matcher::Regex(r#"name="id"\r\n\r\n11"#.into()))
        .with_status(200)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let photo = dir.path().join("proof.jpg");
    std::fs::write(&photo, b"jpeg").unwrap();

    let platform = Arc::new(RecordingPlatform::default());
    let engine = DoseEngine::with_backend(
        Arc::new(backend_for(&server)),
        Arc::new(Database::open_in_memory().unwrap()),
        NotificationsConfig::default(),
        platform.clone(),
        Arc::new(FixedCapture::returning(Ok(EvidenceRef::new(photo)))),
    )
    .unwrap();

    engine.refresh(&session()).await.unwrap();
    assert_eq!(engine.store().get(11).unwrap().status, DoseStatus::Fired);
    assert_eq!(platform.live_for(11).len(), 1);

    engine.submit_proof(&session(), 11).await.unwrap();

    ack.assert_async().await;
    assert!(engine.list().is_empty());
    assert_eq!(platform.live_count(), 0);
}
