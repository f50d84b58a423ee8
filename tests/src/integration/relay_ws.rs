//! # Relay WebSocket Tests
//!
//! Real WebSocket clients (tokio-tungstenite) against the relay router served
//! on an ephemeral port: welcome frame, fan-out, inbound frame handling and
//! server-side close, refusing viewers during shutdown.

#[cfg(test)]
mod tests {
    use futures::{SinkExt, StreamExt};
    use serde_json::Value;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::watch;
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::{self, Message};
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    use es_02_broadcast_relay::{ConnectionRegistry, RelayConfig, RelayService};
    use shared_bus::InMemoryTopicBus;
    use shared_types::{parse_timestamp, MediaChunk, SignificantMoment, TimeWindow};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn start_relay() -> (Arc<RelayService>, SocketAddr, watch::Sender<bool>) {
        let service = Arc::new(
            RelayService::new(
                Arc::new(InMemoryTopicBus::new()),
                Arc::new(ConnectionRegistry::new()),
                RelayConfig::default().with_server_name("server_a"),
            )
            .unwrap(),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown, rx) = watch::channel(false);
        let router = service.router(rx);
        tokio::spawn(async move { axum::serve(listener, router).await });
        (service, addr, shutdown)
    }

    async fn connect(addr: SocketAddr) -> Client {
        let (client, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
        client
    }

    /// Next text frame as JSON; `None` once the server closed.
    async fn next_json(client: &mut Client) -> Option<Value> {
        loop {
            let message = timeout(Duration::from_secs(2), client.next())
                .await
                .expect("no frame within 2s");
            match message {
                Some(Ok(Message::Text(text))) => {
                    return Some(serde_json::from_str(text.as_str()).unwrap())
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
                Some(Ok(other)) => panic!("unexpected frame {:?}", other),
            }
        }
    }

    async fn wait_for_connections(service: &RelayService, n: usize) {
        timeout(Duration::from_secs(2), async {
            while service.registry().len() != n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("registry did not settle");
    }

    fn moment() -> SignificantMoment {
        SignificantMoment {
            window: TimeWindow::containing(parse_timestamp("2024-03-01T12:00:10Z").unwrap()),
            emote: "❤️".into(),
            count: 3,
            total_in_window: 4,
        }
    }

    #[tokio::test]
    async fn test_welcome_is_first_frame() {
        let (service, addr, _shutdown) = start_relay().await;
        let mut client = connect(addr).await;

        let welcome = next_json(&mut client).await.unwrap();
        assert_eq!(welcome["type"], "welcome");
        assert_eq!(welcome["message"], "Connected to emote data server");
        assert_eq!(welcome["server"], "server_a");
        assert_eq!(service.registry().len(), 1);
    }

    #[tokio::test]
    async fn test_moment_fans_out_to_every_client() {
        let (service, addr, _shutdown) = start_relay().await;
        let mut a = connect(addr).await;
        let mut b = connect(addr).await;
        next_json(&mut a).await.unwrap();
        next_json(&mut b).await.unwrap();
        wait_for_connections(&service, 2).await;

        let report = service.relay().relay_moment(&moment()).unwrap();
        assert_eq!(report.delivered, 2);

        for client in [&mut a, &mut b] {
            let frame = next_json(client).await.unwrap();
            assert_eq!(frame["type"], "emote");
            assert_eq!(frame["emote"], "❤️");
            assert_eq!(frame["totalEmotes"], 4);
        }
    }

    #[tokio::test]
    async fn test_valid_inbound_is_only_logged() {
        let (service, addr, _shutdown) = start_relay().await;
        let mut client = connect(addr).await;
        next_json(&mut client).await.unwrap();

        client
            .send(Message::Text(r#"{"emote":"👍"}"#.to_string().into()))
            .await
            .unwrap();
        // Still registered and still receiving.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(service.registry().len(), 1);

        service
            .relay()
            .relay_chunk(&MediaChunk::new(5, b"hi".to_vec()))
            .unwrap();
        let frame = next_json(&mut client).await.unwrap();
        assert_eq!(frame["type"], "video");
        assert_eq!(frame["index"], 5);
        assert_eq!(frame["chunk"], "aGk=");
    }

    #[tokio::test]
    async fn test_malformed_inbound_drops_only_that_client() {
        let (service, addr, _shutdown) = start_relay().await;
        let mut bad = connect(addr).await;
        let mut good = connect(addr).await;
        next_json(&mut bad).await.unwrap();
        next_json(&mut good).await.unwrap();
        wait_for_connections(&service, 2).await;

        bad.send(Message::Text("{not json".to_string().into())).await.unwrap();
        wait_for_connections(&service, 1).await;
        assert!(next_json(&mut bad).await.is_none());

        let report = service.relay().relay_moment(&moment()).unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(next_json(&mut good).await.unwrap()["type"], "emote");
    }

    #[tokio::test]
    async fn test_client_close_unregisters() {
        let (service, addr, _shutdown) = start_relay().await;
        let mut client = connect(addr).await;
        next_json(&mut client).await.unwrap();

        client.close(None).await.unwrap();
        wait_for_connections(&service, 0).await;
    }

    #[tokio::test]
    async fn test_close_all_closes_clients() {
        let (service, addr, _shutdown) = start_relay().await;
        let mut a = connect(addr).await;
        let mut b = connect(addr).await;
        next_json(&mut a).await.unwrap();
        next_json(&mut b).await.unwrap();
        wait_for_connections(&service, 2).await;

        assert_eq!(service.registry().close_all(), 2);
        assert!(next_json(&mut a).await.is_none());
        assert!(next_json(&mut b).await.is_none());
        assert!(service.registry().is_empty());
    }

    #[tokio::test]
    async fn test_new_viewers_refused_during_shutdown() {
        let (service, addr, shutdown) = start_relay().await;
        let mut existing = connect(addr).await;
        next_json(&mut existing).await.unwrap();
        wait_for_connections(&service, 1).await;

        shutdown.send(true).unwrap();
        match connect_async(format!("ws://{}/ws", addr)).await {
            Err(tungstenite::Error::Http(response)) => assert_eq!(response.status(), 503),
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("viewer accepted during shutdown"),
        }
        assert_eq!(service.registry().len(), 1);

        assert_eq!(service.registry().close_all(), 1);
        assert!(next_json(&mut existing).await.is_none());
    }
}
