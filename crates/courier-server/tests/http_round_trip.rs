use std::sync::Arc;
use std::time::Duration;

use courier_broker::{Broker, BrokerConfig};
use courier_server::{start, ServerConfig, ServerHandle};
use serde_json::{json, Value};

async fn spawn(max_hold: Duration) -> (ServerHandle, String) {
    let broker = Arc::new(Broker::new(BrokerConfig {
        max_hold,
        ..Default::default()
    }));
    let config = ServerConfig {
        port: 0,
        ..Default::default()
    };
    let handle = start(config, broker).await.unwrap();
    let url = format!("http://{}/bayeux", handle.addr());
    (handle, url)
}

async fn post(client: &reqwest::Client, url: &str, batch: Value) -> Vec<Value> {
    let resp = client.post(url).json(&batch).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

async fn handshake(client: &reqwest::Client, url: &str) -> String {
    let replies = post(client, url, json!([{"channel": "/meta/handshake", "id": "hs"}])).await;
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0]["successful"], true);
    replies[0]["clientId"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn handshake_subscribe_publish_connect() {
    let (handle, url) = spawn(Duration::ZERO).await;
    let client = reqwest::Client::new();

    let alice = handshake(&client, &url).await;
    let bob = handshake(&client, &url).await;
    assert_ne!(alice, bob);

    let replies = post(
        &client,
        &url,
        json!([{"channel": "/meta/subscribe", "clientId": alice, "subscription": "/chat", "id": "2"}]),
    )
    .await;
    assert_eq!(replies[0]["channel"], "/meta/subscribe");
    assert_eq!(replies[0]["subscription"], "/chat");
    assert_eq!(replies[0]["successful"], true);
    assert_eq!(replies[0]["id"], "2");

    let replies = post(
        &client,
        &url,
        json!([{"channel": "/chat", "clientId": bob, "data": {"text": "hi"}, "id": "3"}]),
    )
    .await;
    assert_eq!(replies[0]["channel"], "/chat");
    assert_eq!(replies[0]["successful"], true);

    let replies = post(&client, &url, json!([{"channel": "/meta/connect", "clientId": alice}])).await;
    assert_eq!(replies[0]["channel"], "/chat");
    assert_eq!(replies[0]["data"]["text"], "hi");

    // Nothing left: an empty connect reply.
    let replies = post(&client, &url, json!([{"channel": "/meta/connect", "clientId": alice}])).await;
    assert_eq!(replies[0]["channel"], "/meta/connect");
    assert_eq!(replies[0]["clientId"], alice);
    assert!(replies[0]["advice"].is_object());

    handle.shutdown().await;
}

#[tokio::test]
async fn batch_replies_keep_request_order() {
    let (handle, url) = spawn(Duration::ZERO).await;
    let client = reqwest::Client::new();
    let id = handshake(&client, &url).await;

    let replies = post(
        &client,
        &url,
        json!([
            {"channel": "/meta/subscribe", "clientId": id, "subscription": "/a", "id": "1"},
            {"channel": "/meta/subscribe", "id": "2"},
            {"channel": "/a", "clientId": id, "id": "3"},
            {"channel": "/meta/disconnect", "clientId": id, "id": "4"},
        ]),
    )
    .await;

    let ids: Vec<&str> = replies.iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids, ["1", "2", "3", "4"]);
    assert_eq!(replies[1]["successful"], false);
    assert_eq!(replies[1]["error"], "Missing clientId");
    assert_eq!(replies[3]["successful"], true);

    handle.shutdown().await;
}

#[tokio::test]
async fn unknown_client_is_rejected() {
    let (handle, url) = spawn(Duration::ZERO).await;
    let client = reqwest::Client::new();

    let replies = post(
        &client,
        &url,
        json!([{"channel": "/meta/connect", "clientId": "nobody", "id": "9"}]),
    )
    .await;
    assert_eq!(replies[0]["successful"], false);
    assert_eq!(replies[0]["error"], "Unknown ClientID");
    assert_eq!(replies[0]["id"], "9");

    handle.shutdown().await;
}

#[tokio::test]
async fn parked_connect_wakes_on_publish() {
    let (handle, url) = spawn(Duration::from_secs(5)).await;
    let client = reqwest::Client::new();

    let listener = handshake(&client, &url).await;
    let sender = handshake(&client, &url).await;
    post(
        &client,
        &url,
        json!([{"channel": "/meta/subscribe", "clientId": listener, "subscription": "/news"}]),
    )
    .await;

    let poll = {
        let client = client.clone();
        let url = url.clone();
        let listener = listener.clone();
        tokio::spawn(async move {
            post(&client, &url, json!([{"channel": "/meta/connect", "clientId": listener}])).await
        })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    post(
        &client,
        &url,
        json!([{"channel": "/news", "clientId": sender, "data": {"headline": "up"}}]),
    )
    .await;

    let replies = tokio::time::timeout(Duration::from_secs(2), poll)
        .await
        .expect("parked connect was not woken")
        .unwrap();
    assert_eq!(replies[0]["channel"], "/news");
    assert_eq!(replies[0]["data"]["headline"], "up");

    handle.shutdown().await;
}

#[tokio::test]
async fn rejects_malformed_bodies() {
    let (handle, url) = spawn(Duration::ZERO).await;
    let client = reqwest::Client::new();

    let resp = client.post(&url).body("{ nope").send().await.unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(&url)
        .json(&json!({"channel": "/meta/handshake"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client.get(&url).send().await.unwrap();
    assert_eq!(resp.status(), 405);

    handle.shutdown().await;
}

#[tokio::test]
async fn empty_batch_yields_empty_array() {
    let (handle, url) = spawn(Duration::ZERO).await;
    let client = reqwest::Client::new();
    assert!(post(&client, &url, json!([])).await.is_empty());
    handle.shutdown().await;
}

#[tokio::test]
async fn health_counts_sessions_and_channels() {
    let (handle, url) = spawn(Duration::ZERO).await;
    let client = reqwest::Client::new();
    let id = handshake(&client, &url).await;
    post(
        &client,
        &url,
        json!([{"channel": "/meta/subscribe", "clientId": id, "subscription": "/x"}]),
    )
    .await;

    let health: Value = client
        .get(format!("http://{}/health", handle.addr()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["sessions"], 1);
    assert_eq!(health["channels"], 1);

    handle.shutdown().await;
}
