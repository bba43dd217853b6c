use oplog_sync::Config;
use std::io::Write;
use std::time::Duration;
use sync_core::ReplicationMethod;

const FULL: &str = r#"
[source]
uri = "mongodb://localhost:27017/?replicaSet=rs0"
connect_timeout = "3s"

[sync]
batch_size = 250
checkpoint_interval = 100
update_buffer_size = 50
poll_interval = "250ms"
follow = true
max_retries = 3
retry_base_delay = "50ms"

[[collections]]
stream_id = "shop-orders"
database = "shop"
collection = "orders"
replication_method = "log_based"
projection = ["total", "status"]

[[collections]]
stream_id = "shop-customers"
database = "shop"
collection = "customers"
replication_method = "incremental"
replication_key = "updated_at"

[[collections]]
stream_id = "shop-audit"
database = "shop"
collection = "audit"
replication_method = "full_table"
selected = false
"#;

#[test]
fn test_full_config() {
    let config = Config::from_toml(FULL).unwrap();

    assert_eq!(
        config.source.uri.as_deref(),
        Some("mongodb://localhost:27017/?replicaSet=rs0")
    );
    assert_eq!(config.source.connect_timeout, Duration::from_secs(3));

    let strategy = config.sync.strategy_config();
    assert_eq!(strategy.batch_size, 250);
    assert_eq!(strategy.checkpoint_interval, 100);
    assert_eq!(strategy.update_buffer_size, 50);
    assert_eq!(strategy.log_batch_size, 1000);
    assert_eq!(strategy.poll_interval, Duration::from_millis(250));
    assert!(strategy.follow);
    assert_eq!(strategy.retry.max_retries, 3);
    assert_eq!(strategy.retry.base_delay, Duration::from_millis(50));

    assert_eq!(config.collections.len(), 3);
    let orders = &config.collections[0];
    assert_eq!(orders.namespace(), "shop.orders");
    assert_eq!(orders.replication_method, ReplicationMethod::LogBased);
    assert_eq!(
        orders.effective_projection(),
        Some(vec!["_id".to_string(), "total".to_string(), "status".to_string()])
    );
    assert!(orders.selected);
    assert_eq!(
        config.collections[1].replication_key.as_deref(),
        Some("updated_at")
    );
    assert!(!config.collections[2].selected);
}

#[test]
fn test_defaults() {
    let config = Config::from_toml(
        r#"
[[collections]]
stream_id = "a"
database = "db"
collection = "a"
"#,
    )
    .unwrap();

    assert_eq!(config.source.uri, None);
    assert_eq!(config.source.connect_timeout, Duration::from_secs(10));
    let strategy = config.sync.strategy_config();
    assert_eq!(strategy.batch_size, 1000);
    assert_eq!(strategy.update_buffer_size, 500);
    assert_eq!(strategy.poll_interval, Duration::from_millis(500));
    assert!(!strategy.follow);
    assert_eq!(
        config.collections[0].replication_method,
        ReplicationMethod::LogBased
    );
}

#[test]
fn test_plain_number_durations_are_seconds() {
    let config = Config::from_toml("[sync]\npoll_interval = 2\nretry_base_delay = \"1\"\n").unwrap();
    assert_eq!(config.sync.poll_interval, Duration::from_secs(2));
    assert_eq!(config.sync.retry_base_delay, Duration::from_secs(1));
}

#[test]
fn test_rejects_invalid_configs() {
    let cases = [
        ("[sync]\nbatch_size = 0\n", "batch_size"),
        ("[sync]\nupdate_buffer_size = 0\n", "update_buffer_size"),
        ("[sync]\npoll_interval = \"soon\"\n", "parse"),
        ("[sync]\nbatchsize = 10\n", "parse"),
        (
            "[[collections]]\nstream_id = \"a\"\ndatabase = \"d\"\ncollection = \"c\"\nreplication_method = \"incremental\"\n",
            "replication_key",
        ),
        (
            "[[collections]]\nstream_id = \"a\"\ndatabase = \"d\"\ncollection = \"c\"\n\n[[collections]]\nstream_id = \"a\"\ndatabase = \"d\"\ncollection = \"e\"\n",
            "Duplicate",
        ),
    ];

    for (content, expected) in cases {
        let err = Config::from_toml(content).unwrap_err();
        let message = format!("{err:#}");
        assert!(
            message.contains(expected),
            "expected {expected:?} in {message:?}"
        );
    }
}

#[test]
fn test_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(FULL.as_bytes()).unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.collections.len(), 3);

    let missing = Config::from_file("/nonexistent/oplog-sync.toml").unwrap_err();
    assert!(format!("{missing:#}").contains("Failed to read config file"));
}
