use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

use sensorflow::{
    ingest_router, parse_accounts, AppState, Authenticator, FrequencyControl, Generator,
    IngestionSink, MemoryStorage, QueryEngine, SensorReading, SyntheticReadings, WsConnector,
};

/// Ingest service on an ephemeral port, backed by memory storage.
async fn spawn_ingest(storage: MemoryStorage) -> Result<String> {
    // ---
    let storage = Arc::new(storage);
    let accounts = parse_accounts("admin:admin123:admin,user:user123:user")
        .map_err(anyhow::Error::msg)?;
    let app = ingest_router(AppState {
        engine: QueryEngine::new(storage.clone()),
        sink: IngestionSink::new(storage),
        auth: Arc::new(Authenticator::new("integration-secret", 1, accounts)),
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("127.0.0.1:{}", addr.port()))
}

async fn token(client: &Client, base: &str, username: &str, password: &str) -> Result<String> {
    let body: Value = client
        .post(format!("{base}/api/auth/login"))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await?
        .json()
        .await?;
    Ok(body["token"].as_str().unwrap_or_default().to_string())
}

#[tokio::test]
async fn generator_stream_is_fully_acknowledged_and_queryable() -> Result<()> {
    // ---
    let storage = MemoryStorage::new();
    let host = spawn_ingest(storage.clone()).await?;

    let mut generator = Generator::new(
        WsConnector::new(format!("ws://{host}/ingest/stream")),
        FrequencyControl::new(10),
        SyntheticReadings::new("temperature"),
    );
    let cancel = CancellationToken::new();
    let run_cancel = cancel.clone();
    let running = tokio::spawn(async move { generator.run(&run_cancel).await });

    tokio::time::sleep(Duration::from_millis(300)).await;
    cancel.cancel();
    let ack = assert_ok!(running.await?);

    // Every generated reading is valid, so everything sent was persisted
    assert!(ack.accepted_count > 0, "nothing was ingested");
    assert_eq!(ack.accepted_count, storage.len().await as u64);

    let base = format!("http://{host}");
    let client = Client::new();
    let user = token(&client, &base, "user", "user123").await?;

    let page: Value = client
        .get(format!("{base}/api/readings?page=1&page_size=500"))
        .bearer_auth(&user)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(page["total_items"].as_u64(), Some(ack.accepted_count));
    assert_eq!(page["page_size"], 100);

    let data: Vec<SensorReading> = serde_json::from_value(page["data"].clone())?;
    for pair in data.windows(2) {
        assert!(pair[0].timestamp >= pair[1].timestamp);
    }
    assert!(data.iter().all(|row| row.sensor_type == "temperature"));

    Ok(())
}

#[tokio::test]
async fn stream_without_done_persists_but_is_not_acknowledged() -> Result<()> {
    // ---
    use futures_util::SinkExt;
    use tokio_tungstenite::tungstenite::Message;

    let storage = MemoryStorage::new();
    let host = spawn_ingest(storage.clone()).await?;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{host}/ingest/stream")).await?;
    let frame = json!({
        "type": "reading",
        "value": 1.5,
        "sensor_type": "pressure",
        "id1": "C",
        "id2": 12,
        "timestamp": "2024-05-01T10:00:00.000000000Z",
    });
    ws.send(Message::text(frame.to_string())).await?;
    ws.send(Message::text("{not json")).await?;
    ws.close(None).await?;
    drop(ws);

    // Give the sink a moment to drain the socket
    for _ in 0..50 {
        if storage.len().await == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(storage.len().await, 1);
    Ok(())
}

#[tokio::test]
async fn query_api_enforces_roles_and_filters() -> Result<()> {
    // ---
    let host = spawn_ingest(MemoryStorage::new()).await?;
    let base = format!("http://{host}");
    let client = Client::new();

    let health: Value = client.get(format!("{base}/health")).send().await?.json().await?;
    assert_eq!(health["status"], "healthy");

    let unauthenticated = client.get(format!("{base}/api/readings")).send().await?;
    assert_eq!(unauthenticated.status(), StatusCode::UNAUTHORIZED);

    let admin = token(&client, &base, "admin", "admin123").await?;
    let user = token(&client, &base, "user", "user123").await?;

    for (id1, id2) in [("A", 1), ("A", 2), ("B", 1)] {
        let created = client
            .post(format!("{base}/api/readings"))
            .bearer_auth(&admin)
            .json(&json!({ "value": 3.0, "id1": id1, "id2": id2, "sensor_type": "temperature" }))
            .send()
            .await?;
        assert_eq!(created.status(), StatusCode::CREATED);
    }

    let forbidden = client
        .delete(format!("{base}/api/readings?id1=A"))
        .bearer_auth(&user)
        .send()
        .await?;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let filtered: Value = client
        .get(format!("{base}/api/readings?id1=A&id2=2"))
        .bearer_auth(&user)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(filtered["total_items"], 1);

    let out_of_range = client
        .get(format!("{base}/api/readings?id2=1000"))
        .bearer_auth(&user)
        .send()
        .await?;
    assert_eq!(out_of_range.status(), StatusCode::BAD_REQUEST);

    let empty_delete = client
        .delete(format!("{base}/api/readings"))
        .bearer_auth(&admin)
        .send()
        .await?;
    assert_eq!(empty_delete.status(), StatusCode::BAD_REQUEST);

    let deleted: Value = client
        .delete(format!("{base}/api/readings?id1=A"))
        .bearer_auth(&admin)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(deleted["count"], 2);

    Ok(())
}

#[tokio::test]
async fn reading_without_timestamp_is_stamped_and_acknowledged() -> Result<()> {
    // ---
    use futures_util::{SinkExt, StreamExt};
    use sensorflow::{Predicate, Storage};
    use tokio_tungstenite::tungstenite::Message;

    let storage = MemoryStorage::new();
    let host = spawn_ingest(storage.clone()).await?;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{host}/ingest/stream")).await?;
    let before = chrono::Utc::now();
    let frame = json!({ "type": "reading", "value": 7.0, "sensor_type": "t", "id1": "D", "id2": 4 });
    ws.send(Message::text(frame.to_string())).await?;
    ws.send(Message::text(json!({ "type": "done" }).to_string())).await?;

    let mut accepted = None;
    while let Some(message) = ws.next().await {
        if let Message::Text(text) = message? {
            let ack: Value = serde_json::from_str(text.as_str())?;
            accepted = ack["accepted_count"].as_u64();
            break;
        }
    }
    let after = chrono::Utc::now();

    assert_eq!(accepted, Some(1));
    let rows = storage.scan(&Predicate::all(), 10, 0).await?;
    assert_eq!(rows.len(), 1);
    assert!(rows[0].timestamp >= before && rows[0].timestamp <= after);
    Ok(())
}
