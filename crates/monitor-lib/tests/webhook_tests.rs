//! Webhook delivery against a mock HTTP server

use mockito::{Matcher, Server};
use monitor_lib::{
    error::DeliveryError,
    models::{ContainerStat, ContainerUsage},
    sink::WebhookPublisher,
};
use std::time::Duration;

fn stats() -> Vec<ContainerStat> {
    vec![
        ContainerStat {
            container_name: "web".to_string(),
            stats: ContainerUsage {
                memory_usage: 52_428_800,
                cpu_usage: 3.5,
            },
        },
        ContainerStat {
            container_name: "db".to_string(),
            stats: ContainerUsage {
                memory_usage: 209_715_200,
                cpu_usage: 0.0,
            },
        },
    ]
}

#[tokio::test]
async fn test_publish_posts_json_array() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/hook")
        .match_header("content-type", "application/json")
        .match_body(Matcher::JsonString(
            r#"[
                {"containerName":"web","stats":{"memoryUsage":52428800,"cpuUsage":3.5}},
                {"containerName":"db","stats":{"memoryUsage":209715200,"cpuUsage":0.0}}
            ]"#
            .to_string(),
        ))
        .with_status(200)
        .create_async()
        .await;

    let publisher =
        WebhookPublisher::new(&format!("{}/hook", server.url()), Duration::from_secs(5)).unwrap();

    publisher.publish(&stats()).await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_publish_empty_list() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/hook")
        .match_body("[]")
        .with_status(204)
        .create_async()
        .await;

    let publisher =
        WebhookPublisher::new(&format!("{}/hook", server.url()), Duration::from_secs(5)).unwrap();

    publisher.publish(&[]).await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_publish_non_success_status() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/hook")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;

    let publisher =
        WebhookPublisher::new(&format!("{}/hook", server.url()), Duration::from_secs(5)).unwrap();

    let result = publisher.publish(&stats()).await;

    assert!(matches!(
        result,
        Err(DeliveryError::Status { status: 500, .. })
    ));
    // Exactly one attempt, no retry
    mock.assert_async().await;
}

#[tokio::test]
async fn test_publish_unreachable_endpoint() {
    // Port 9 (discard) on localhost is not expected to accept HTTP
    let publisher =
        WebhookPublisher::new("http://127.0.0.1:9/hook", Duration::from_secs(2)).unwrap();

    let result = publisher.publish(&stats()).await;

    assert!(matches!(result, Err(DeliveryError::Transport { .. })));
}

#[tokio::test]
async fn test_publish_times_out_on_silent_endpoint() {
    // Accepts connections and holds them open without ever answering
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let publisher =
        WebhookPublisher::new(&format!("http://{}/hook", addr), Duration::from_millis(300))
            .unwrap();

    let start = std::time::Instant::now();
    let result = publisher.publish(&stats()).await;
    let elapsed = start.elapsed();

    assert!(matches!(result, Err(DeliveryError::Transport { .. })));
    assert!(elapsed >= Duration::from_millis(250), "returned after {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(5), "returned after {:?}", elapsed);
}
