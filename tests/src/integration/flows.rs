//! # Integration Test Flows
//!
//! The aggregator, the relay and the media source share one in-memory bus, the
//! way a node wires them. A viewer is a bare channel sink, so these flows
//! exercise everything except the WebSocket transport.
//!
//! ## Flows Tested:
//!
//! 1. **raw-emote-data → aggregator → aggregated-emote-data → relay → viewer**
//! 2. **media source → video-stream → relay → viewer**
//! 3. **settings changes take effect on the next flush**

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde_json::Value;
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::watch;
    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    use es_01_emote_aggregator::{EmoteAggregator, Settings, SettingsStore};
    use es_02_broadcast_relay::{
        ChannelSink, ConnectionRegistry, RelayConfig, RelayService, SinkReceiver,
    };
    use es_03_media_source::{MediaSource, MediaSourceConfig};
    use shared_bus::{BusMessage, InMemoryTopicBus, TopicBus, TopicFilter};
    use shared_types::{topics, AggregatedEmoteRecord, RawEmoteRecord};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    struct Pipeline {
        bus: Arc<InMemoryTopicBus>,
        settings: Arc<SettingsStore>,
        relay: Arc<RelayService>,
        shutdown: watch::Sender<bool>,
        tasks: Vec<JoinHandle<()>>,
    }

    impl Pipeline {
        /// Aggregator and relay running on one bus.
        async fn start(settings: Settings) -> Self {
            let bus = Arc::new(InMemoryTopicBus::new());
            let settings = Arc::new(SettingsStore::new(settings).unwrap());
            let relay = Arc::new(
                RelayService::new(
                    bus.clone(),
                    Arc::new(ConnectionRegistry::new()),
                    RelayConfig::default(),
                )
                .unwrap(),
            );
            let (shutdown, rx) = watch::channel(false);

            let mut aggregator = EmoteAggregator::new(bus.clone(), Arc::clone(&settings));
            let aggregator_rx = rx.clone();
            let relay_task = Arc::clone(&relay);
            let tasks = vec![
                tokio::spawn(async move {
                    aggregator.run(aggregator_rx).await.unwrap();
                }),
                tokio::spawn(async move {
                    relay_task.run(rx).await.unwrap();
                }),
            ];

            let pipeline = Self {
                bus,
                settings,
                relay,
                shutdown,
                tasks,
            };
            pipeline.wait_for_subscribers(2).await;
            pipeline
        }

        async fn wait_for_subscribers(&self, n: usize) {
            timeout(Duration::from_secs(2), async {
                while self.bus.subscriber_count() < n {
                    tokio::task::yield_now().await;
                }
            })
            .await
            .expect("services did not subscribe");
        }

        fn viewer(&self) -> SinkReceiver {
            let (sink, rx) = ChannelSink::channel(64);
            self.relay.registry().register(Arc::new(sink));
            rx
        }

        async fn react(&self, emote: &str, timestamp: &str) {
            let record = RawEmoteRecord {
                emote: emote.to_string(),
                timestamp: timestamp.to_string(),
            };
            self.bus
                .publish(BusMessage::new(
                    topics::RAW_EMOTE_DATA,
                    serde_json::to_vec(&record).unwrap(),
                ))
                .await
                .unwrap();
        }

        async fn stop(self) {
            self.shutdown.send(true).unwrap();
            for task in self.tasks {
                timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
            }
        }
    }

    fn settings(interval: usize, threshold: f64, allowed: &[&str]) -> Settings {
        Settings::new(
            interval,
            threshold,
            allowed.iter().map(|e| e.to_string()).collect(),
        )
        .unwrap()
    }

    async fn next_frame(viewer: &mut SinkReceiver) -> Value {
        let frame = timeout(Duration::from_secs(2), viewer.frames.recv())
            .await
            .expect("no frame within 2s")
            .expect("viewer channel closed");
        serde_json::from_str(&frame).unwrap()
    }

    // =============================================================================
    // INTEGRATION TESTS: REACTIONS → VIEWERS
    // =============================================================================

    #[tokio::test]
    async fn test_reactions_become_viewer_frames() {
        let pipeline = Pipeline::start(settings(4, 0.5, &["A", "B"])).await;
        let mut viewer = pipeline.viewer();

        for emote in ["A", "A", "A", "B"] {
            pipeline.react(emote, "2024-03-01T12:00:10Z").await;
        }

        let frame = next_frame(&mut viewer).await;
        assert_eq!(frame["type"], "emote");
        assert_eq!(frame["timestamp"], "2024-03-01T12:00");
        assert_eq!(frame["emote"], "A");
        assert_eq!(frame["count"], 3);
        assert_eq!(frame["totalEmotes"], 4);

        pipeline.stop().await;
    }

    #[tokio::test]
    async fn test_every_qualifying_window_is_relayed() {
        let pipeline = Pipeline::start(settings(4, 0.5, &["A", "B"])).await;
        let mut viewer = pipeline.viewer();

        pipeline.react("A", "2024-03-01T12:00:10Z").await;
        pipeline.react("A", "2024-03-01T12:00:50Z").await;
        pipeline.react("B", "2024-03-01T12:01:05Z").await;
        pipeline.react("B", "2024-03-01T12:01:06Z").await;

        let first = next_frame(&mut viewer).await;
        let second = next_frame(&mut viewer).await;
        assert_eq!(first["timestamp"], "2024-03-01T12:00");
        assert_eq!(first["emote"], "A");
        assert_eq!(second["timestamp"], "2024-03-01T12:01");
        assert_eq!(second["emote"], "B");

        pipeline.stop().await;
    }

    #[tokio::test]
    async fn test_disallowed_emotes_never_counted() {
        let pipeline = Pipeline::start(settings(2, 0.5, &["A"])).await;
        let mut moments = pipeline
            .bus
            .subscribe(TopicFilter::topics([topics::AGGREGATED_EMOTE_DATA]))
            .unwrap();

        pipeline.react("A", "2024-03-01T12:00:10Z").await;
        pipeline.react("B", "2024-03-01T12:00:11Z").await;
        pipeline.react("B", "2024-03-01T12:00:12Z").await;
        pipeline.react("A", "2024-03-01T12:00:13Z").await;

        let message = timeout(Duration::from_secs(2), moments.recv())
            .await
            .unwrap()
            .unwrap();
        let record = AggregatedEmoteRecord::from_slice(&message.payload).unwrap();
        assert_eq!(record.emote, "A");
        assert_eq!(record.count, 2);
        assert_eq!(record.total_emotes, 2);

        pipeline.stop().await;
    }

    #[tokio::test]
    async fn test_threshold_change_applies_to_next_flush() {
        let pipeline = Pipeline::start(settings(4, 0.5, &["A", "B"])).await;
        let mut viewer = pipeline.viewer();

        for emote in ["A", "A", "A", "B"] {
            pipeline.react(emote, "2024-03-01T12:00:10Z").await;
        }
        assert_eq!(next_frame(&mut viewer).await["emote"], "A");

        // 0.75 no longer beats the threshold.
        pipeline.settings.set_threshold(0.8).unwrap();
        for emote in ["B", "B", "B", "A"] {
            pipeline.react(emote, "2024-03-01T12:02:10Z").await;
        }
        for _ in 0..4 {
            pipeline.react("B", "2024-03-01T12:04:10Z").await;
        }

        let frame = next_frame(&mut viewer).await;
        assert_eq!(frame["emote"], "B");
        assert_eq!(frame["timestamp"], "2024-03-01T12:04");
        assert_eq!(frame["count"], 4);

        pipeline.stop().await;
    }

    // =============================================================================
    // INTEGRATION TESTS: MEDIA SOURCE → VIEWERS
    // =============================================================================

    #[tokio::test]
    async fn test_media_chunks_reach_viewer() {
        let pipeline = Pipeline::start(settings(4, 0.5, &["A"])).await;
        let mut viewer = pipeline.viewer();

        let mut video = tempfile::NamedTempFile::new().unwrap();
        video.write_all(b"0123456789").unwrap();
        video.flush().unwrap();

        let source = Arc::new(MediaSource::new(
            pipeline.bus.clone(),
            MediaSourceConfig::new(video.path())
                .with_chunk_size(6)
                .with_chunk_delay(Duration::from_millis(1)),
        ));
        let source_task = {
            let source = Arc::clone(&source);
            let rx = pipeline.shutdown.subscribe();
            tokio::spawn(async move { source.run(rx).await })
        };

        let mut seen = Vec::new();
        for _ in 0..3 {
            let frame = next_frame(&mut viewer).await;
            assert_eq!(frame["type"], "video");
            let bytes = STANDARD.decode(frame["chunk"].as_str().unwrap()).unwrap();
            seen.push((frame["index"].as_u64().unwrap(), bytes));
        }
        assert_eq!(
            seen,
            vec![
                (0, b"012345".to_vec()),
                (1, b"6789".to_vec()),
                (0, b"012345".to_vec()),
            ]
        );

        pipeline.stop().await;
        let result = timeout(Duration::from_secs(2), source_task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
