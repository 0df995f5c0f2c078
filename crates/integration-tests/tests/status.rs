mod harness;

use harness::config::ConfigBuilder;
use harness::server::TestServer;

#[tokio::test]
async fn status_reports_healthy_dependencies() {
    let server = TestServer::builder(ConfigBuilder::new().build())
        .with_probes(true, true)
        .start()
        .await
        .unwrap();

    let resp = server.client().get(server.url("/status")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers().contains_key("x-request-id"));

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["environment"], "test");
    assert_eq!(body["checks"]["database"], "ok");
    assert_eq!(body["checks"]["redis"], "ok");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn status_is_503_when_cache_is_down() {
    let server = TestServer::builder(ConfigBuilder::new().build())
        .with_probes(true, false)
        .start()
        .await
        .unwrap();

    let resp = server.client().get(server.url("/status")).send().await.unwrap();
    assert_eq!(resp.status(), 503);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["database"], "ok");
    assert_eq!(body["checks"]["redis"], "fail");
}

#[tokio::test]
async fn status_is_503_when_database_is_down() {
    let server = TestServer::builder(ConfigBuilder::new().build())
        .with_probes(false, true)
        .start()
        .await
        .unwrap();

    let resp = server.client().get(server.url("/status")).send().await.unwrap();
    assert_eq!(resp.status(), 503);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["checks"]["database"], "fail");
    assert_eq!(body["checks"]["redis"], "ok");
}

#[tokio::test]
async fn status_is_public_without_auth() {
    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();

    let resp = server
        .client()
        .get(server.url("/status"))
        .bearer_auth("garbage")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}
