//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 配置 -> Dispatcher -> Sink 的端到端流程（file / http）
//! - 去重、鉴权与版本门控的跨 crate 行为

#[cfg(test)]
mod contract_tests {
    use contracts::{event_identity, EventMetric, PipelineConfig, DISPATCH_BATCH_SIZE};
    use serde_json::json;

    #[test]
    fn test_contracts_compile() {
        // 验证 contracts crate 可编译
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_event_payload_shape() {
        let metric = EventMetric::new("App", "Logged In")
            .unwrap()
            .with_properties(json!({ "Version": "1.0" }))
            .unwrap()
            .into_metric();

        assert_eq!(metric.identity(), event_identity("App", "Logged In"));
        assert_eq!(
            metric.payload(),
            &json!({
                "event_group": "App",
                "event_name": "Logged In",
                "event_property": { "Version": "1.0" }
            })
        );
    }

    #[test]
    fn test_default_config_snapshot() {
        let config = PipelineConfig::default();
        assert_eq!(config.dispatch.num_workers, 1);
        assert_eq!(config.dispatch.interval_ms, 5_000);
        assert_eq!(config.dispatch.batch_size, DISPATCH_BATCH_SIZE);
        assert!(config.server.version.is_none());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{PipelineConfig, StaticSession};
    use dispatcher::{create_dispatcher, enqueue_event, EnqueueOutcome, MetricsQueue, WorkerState};
    use serde_json::{json, Value};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;
    use tokio::time::{sleep, timeout};

    fn file_config(path: &Path) -> PipelineConfig {
        let toml = format!(
            r#"
[dispatch]
num_workers = 1
interval_ms = 10
batch_size = 10

[sink]
name = "events_file"
sink_type = "file"
params = {{ path = "{}" }}

[server]
version = "7.4.0"
"#,
            path.display()
        );
        ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap()
    }

    fn http_config(base_url: &str) -> PipelineConfig {
        let json = json!({
            "dispatch": { "num_workers": 1, "interval_ms": 10 },
            "sink": { "name": "collector", "sink_type": "http", "params": { "timeout_ms": "2000" } },
            "server": { "base_url": base_url, "version": "7.5.0" }
        });
        ConfigLoader::load_from_str(&json.to_string(), ConfigFormat::Json).unwrap()
    }

    /// Poll until `check` holds or two seconds pass
    async fn eventually(mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if check() {
                return true;
            }
            sleep(Duration::from_millis(10)).await;
        }
        check()
    }

    fn read_lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect()
    }

    /// Local collector answering every request with `status_line`
    ///
    /// Each request body is forwarded on the returned channel.
    async fn spawn_collector(status_line: &'static str) -> (String, mpsc::UnboundedReceiver<Value>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    if let Some(body) = handle_request(stream, status_line).await {
                        let _ = tx.send(body);
                    }
                });
            }
        });

        (format!("http://{addr}"), rx)
    }

    async fn handle_request(mut stream: TcpStream, status_line: &str) -> Option<Value> {
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];

        let (header_end, content_length) = loop {
            let n = stream.read(&mut buf).await.ok()?;
            if n == 0 {
                return None;
            }
            raw.extend_from_slice(&buf[..n]);
            if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&raw[..pos]).to_lowercase();
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                break (pos + 4, len);
            }
        };
        while raw.len() < header_end + content_length {
            let n = stream.read(&mut buf).await.ok()?;
            if n == 0 {
                return None;
            }
            raw.extend_from_slice(&buf[..n]);
        }

        let response = format!("{status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
        stream.write_all(response.as_bytes()).await.ok()?;
        serde_json::from_slice(&raw[header_end..header_end + content_length]).ok()
    }

    /// End-to-end: config -> file sink, with a "log once" event
    #[tokio::test]
    async fn test_e2e_file_sink_with_dedupe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics").join("events.jsonl");
        let config = file_config(&path);

        let queue = Arc::new(MetricsQueue::new());
        let mut dispatcher = create_dispatcher(
            &config,
            Arc::clone(&queue),
            Arc::new(StaticSession::new("tok")),
        )
        .unwrap();

        let outcomes = [
            enqueue_event(&queue, "App", "Launched", Value::Null, false).unwrap(),
            enqueue_event(&queue, "App", "Logged In", json!({ "n": 1 }), true).unwrap(),
            enqueue_event(&queue, "App", "Logged In", json!({ "n": 2 }), true).unwrap(),
            enqueue_event(&queue, "App", "Launched", Value::Null, false).unwrap(),
        ];
        assert_eq!(
            outcomes,
            [
                EnqueueOutcome::Queued,
                EnqueueOutcome::Queued,
                EnqueueOutcome::Deduplicated,
                EnqueueOutcome::Queued,
            ]
        );

        dispatcher.start(config.dispatch.num_workers);
        assert!(eventually(|| read_lines(&path).len() == 3).await);
        dispatcher.stop();

        let names: Vec<_> = read_lines(&path)
            .iter()
            .map(|v| v["event_name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["Launched", "Logged In", "Launched"]);
        assert!(queue.is_empty());
    }

    /// 25 queued metrics go out as batches of 10, 10, 5
    #[tokio::test]
    async fn test_e2e_http_sink_batches() {
        let (base_url, mut requests) = spawn_collector("HTTP/1.1 200 OK").await;
        let config = http_config(&base_url);

        let queue = Arc::new(MetricsQueue::new());
        for i in 0..25 {
            enqueue_event(&queue, "Load", &format!("Event {i}"), json!({}), false).unwrap();
        }

        let mut dispatcher = create_dispatcher(
            &config,
            Arc::clone(&queue),
            Arc::new(StaticSession::new("secret-token")),
        )
        .unwrap();
        dispatcher.start(1);

        let mut sizes = Vec::new();
        for _ in 0..3 {
            let body = timeout(Duration::from_secs(2), requests.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(body["auth_args"]["session_token"], "secret-token");
            sizes.push(body["metrics"].as_array().unwrap().len());
        }
        assert_eq!(sizes, [10, 10, 5]);

        assert!(eventually(|| dispatcher.total_metrics().delivered_count == 25).await);
        dispatcher.stop();
    }

    /// A rejecting endpoint loses batches but never stops the worker
    #[tokio::test]
    async fn test_e2e_failing_endpoint_keeps_worker_alive() {
        let (base_url, mut requests) = spawn_collector("HTTP/1.1 500 Internal Server Error").await;
        let config = http_config(&base_url);

        let queue = Arc::new(MetricsQueue::new());
        let mut dispatcher = create_dispatcher(
            &config,
            Arc::clone(&queue),
            Arc::new(StaticSession::new("tok")),
        )
        .unwrap();
        dispatcher.start(1);

        for round in 1..=2u64 {
            enqueue_event(&queue, "App", "Crash", json!({ "round": round }), false).unwrap();
            timeout(Duration::from_secs(2), requests.recv())
                .await
                .unwrap()
                .unwrap();
            assert!(eventually(|| dispatcher.total_metrics().lost_count == round).await);
        }

        assert_eq!(dispatcher.workers()[0].state(), WorkerState::Running);
        assert_eq!(dispatcher.total_metrics().delivered_count, 0);
        dispatcher.stop();
    }

    /// Without a session nothing starts and the queue keeps its metrics
    #[tokio::test]
    async fn test_e2e_anonymous_session_keeps_queue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let config = file_config(&path);

        let queue = Arc::new(MetricsQueue::new());
        enqueue_event(&queue, "App", "Launched", Value::Null, false).unwrap();

        let mut dispatcher = create_dispatcher(
            &config,
            Arc::clone(&queue),
            Arc::new(StaticSession::from_option(Some("   ".to_string()))),
        )
        .unwrap();
        dispatcher.start(1);
        assert!(!dispatcher.dispatching());

        sleep(Duration::from_millis(50)).await;
        assert_eq!(queue.len(), 1);
        assert!(read_lines(&path).is_empty());
    }

    /// An old server halts every worker before the first drain
    #[tokio::test]
    async fn test_e2e_old_server_halts_workers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let mut config = file_config(&path);
        config.server.version = Some("7.3.9".to_string());

        let queue = Arc::new(MetricsQueue::new());
        enqueue_event(&queue, "App", "Launched", Value::Null, false).unwrap();

        let mut dispatcher = create_dispatcher(
            &config,
            Arc::clone(&queue),
            Arc::new(StaticSession::new("tok")),
        )
        .unwrap();
        dispatcher.start(2);

        assert!(eventually(|| dispatcher.workers().iter().all(|w| w.is_finished())).await);
        assert!(dispatcher
            .workers()
            .iter()
            .all(|w| w.state() == WorkerState::Halted));
        assert_eq!(queue.len(), 1);
        dispatcher.stop();
    }

    /// The process-wide queue is shared, and its dedupe memory with it
    #[test]
    fn test_global_queue_is_shared() {
        let a = MetricsQueue::global();
        let b = MetricsQueue::global();
        assert!(Arc::ptr_eq(&a, &b));

        enqueue_event(&a, "Global", "Once", Value::Null, true).unwrap();
        assert_eq!(
            enqueue_event(&b, "Global", "Once", Value::Null, true).unwrap(),
            EnqueueOutcome::Deduplicated
        );
        a.drain(None);
    }
}
