//! # Node End-to-End Tests
//!
//! A whole node on ephemeral ports, driven the way a deployment is: settings
//! and reactions over HTTP, viewers over WebSocket.

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use futures::StreamExt;
    use reqwest::StatusCode;
    use serde_json::{json, Value};
    use std::io::Write;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;
    use tokio::net::TcpStream;
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::{self, Message};
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    use node_runtime::{EmoteStreamNode, NodeConfig, RunningNode, SupervisorExit};
    use shared_bus::TopicBus;

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn start_node(config: NodeConfig) -> RunningNode {
        let config = NodeConfig {
            relay_port: 0,
            settings_port: 0,
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            retry_delay: Duration::from_millis(10),
            ..config
        };
        let running = EmoteStreamNode::new(config).unwrap().start().await.unwrap();

        // Aggregator and relay subscribed.
        timeout(Duration::from_secs(2), async {
            while running.bus().subscriber_count() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("services did not subscribe");
        running
    }

    fn settings_url(node: &RunningNode, path: &str) -> String {
        format!("http://{}{}", node.settings_addr(), path)
    }

    async fn viewer(node: &RunningNode) -> Client {
        let url = format!("ws://{}/ws", node.relay_addr());
        let (mut client, _) = connect_async(url).await.unwrap();
        let welcome = next_json(&mut client).await.unwrap();
        assert_eq!(welcome["type"], "welcome");
        client
    }

    async fn next_json(client: &mut Client) -> Option<Value> {
        loop {
            let message = timeout(Duration::from_secs(2), client.next())
                .await
                .expect("no frame within 2s");
            match message {
                Some(Ok(Message::Text(text))) => {
                    return Some(serde_json::from_str(text.as_str()).unwrap())
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
                Some(Ok(_)) => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_settings_api_over_http() {
        let node = start_node(NodeConfig::default()).await;
        let http = reqwest::Client::new();

        let health: Value = http
            .get(settings_url(&node, "/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health, json!({"status": "healthy"}));

        let rejected = http
            .put(settings_url(&node, "/settings/threshold"))
            .json(&json!({"threshold": 1.2}))
            .send()
            .await
            .unwrap();
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
        let body: Value = rejected.json().await.unwrap();
        assert_eq!(body["error"], "Invalid threshold value");

        let current: Value = http
            .get(settings_url(&node, "/settings"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(current["threshold"], 0.5);
        assert_eq!(current["interval"], 100);

        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_reactions_over_http_reach_viewer() {
        let node = start_node(NodeConfig::default()).await;
        let http = reqwest::Client::new();

        let response = http
            .put(settings_url(&node, "/settings/interval"))
            .json(&json!({"interval": 4}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(node.settings().snapshot().interval, 4);

        let mut client = viewer(&node).await;

        for emote in ["👍", "👍", "👍", "😢"] {
            let response = http
                .post(settings_url(&node, "/emotes"))
                .json(&json!({"emote": emote, "timestamp": "2024-03-01T12:00:10Z"}))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::ACCEPTED);
        }

        let frame = next_json(&mut client).await.unwrap();
        assert_eq!(frame["type"], "emote");
        assert_eq!(frame["emote"], "👍");
        assert_eq!(frame["timestamp"], "2024-03-01T12:00");
        assert_eq!(frame["count"], 3);
        assert_eq!(frame["totalEmotes"], 4);

        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_viewers() {
        let node = start_node(NodeConfig::default()).await;
        let mut client = viewer(&node).await;

        let exits = node.shutdown().await;
        assert!(exits.iter().all(|(_, exit)| *exit == SupervisorExit::Shutdown));
        assert!(next_json(&mut client).await.is_none());
    }

    #[tokio::test]
    async fn test_intake_and_viewers_refused_once_shutdown_begins() {
        let node = start_node(NodeConfig::default()).await;
        let http = reqwest::Client::new();
        let mut client = viewer(&node).await;
        let published = node.bus().messages_published();

        node.begin_shutdown();

        let response = http
            .post(settings_url(&node, "/emotes"))
            .json(&json!({"emote": "👍", "timestamp": "2024-03-01T12:00:10Z"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(node.bus().messages_published(), published);

        match connect_async(format!("ws://{}/ws", node.relay_addr())).await {
            Err(tungstenite::Error::Http(response)) => assert_eq!(response.status(), 503),
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("viewer accepted during shutdown"),
        }
        assert_eq!(node.registry().len(), 1);

        let exits = node.shutdown().await;
        assert!(exits.iter().all(|(_, exit)| *exit == SupervisorExit::Shutdown));
        assert!(next_json(&mut client).await.is_none());
    }

    #[tokio::test]
    async fn test_video_file_streams_to_viewer() {
        let mut video = tempfile::NamedTempFile::new().unwrap();
        video.write_all(b"not really an mp4").unwrap();
        video.flush().unwrap();

        let node = start_node(NodeConfig {
            video_path: Some(video.path().to_path_buf()),
            ..Default::default()
        })
        .await;
        let mut client = viewer(&node).await;

        let frame = loop {
            let frame = next_json(&mut client).await.unwrap();
            if frame["type"] == "video" {
                break frame;
            }
        };
        let bytes = STANDARD.decode(frame["chunk"].as_str().unwrap()).unwrap();
        assert_eq!(bytes, b"not really an mp4");
        assert_eq!(frame["index"], 0);

        node.shutdown().await;
    }
}
