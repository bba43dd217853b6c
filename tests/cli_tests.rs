use checkpoint::{CheckpointStorage, DEFAULT_CHECKPOINT_DIR};
use clap::Parser;
use oplog_sync::{run_sync, Config, SyncArgs};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
struct TestCli {
    #[command(flatten)]
    args: SyncArgs,
}

fn parse(args: &[&str]) -> SyncArgs {
    TestCli::try_parse_from(std::iter::once("oplog-sync").chain(args.iter().copied()))
        .unwrap()
        .args
}

fn args(uri: Option<&str>) -> SyncArgs {
    SyncArgs {
        config: PathBuf::from("oplog-sync.toml"),
        uri: uri.map(str::to_string),
        checkpoint_dir: PathBuf::from(DEFAULT_CHECKPOINT_DIR),
        once: false,
        dry_run: false,
    }
}

#[test]
fn test_sync_args() {
    let args = parse(&[
        "--config",
        "sync.toml",
        "--uri",
        "mongodb://db:27017",
        "--checkpoint-dir",
        "/var/lib/oplog-sync",
        "--once",
    ]);

    assert_eq!(args.config, PathBuf::from("sync.toml"));
    assert_eq!(args.uri.as_deref(), Some("mongodb://db:27017"));
    assert!(args.once);
    assert!(!args.dry_run);
    assert_eq!(
        args.checkpoint_storage(),
        CheckpointStorage::Filesystem {
            dir: PathBuf::from("/var/lib/oplog-sync")
        }
    );
}

#[test]
fn test_config_is_required() {
    assert!(TestCli::try_parse_from(["oplog-sync", "--once"]).is_err());
}

#[test]
fn test_dry_run_keeps_checkpoints_in_memory() {
    let args = SyncArgs {
        dry_run: true,
        ..args(None)
    };
    assert_eq!(args.checkpoint_storage(), CheckpointStorage::Memory);
    assert!(!args.checkpoint_storage().is_durable());
}

#[test]
fn test_uri_flag_overrides_config() {
    let config = Config::from_toml("[source]\nuri = \"mongodb://from-config\"\n").unwrap();

    assert_eq!(
        args(Some("mongodb://from-flag")).resolve_uri(&config).unwrap(),
        "mongodb://from-flag"
    );
    assert_eq!(args(None).resolve_uri(&config).unwrap(), "mongodb://from-config");
    assert!(args(None).resolve_uri(&Config::default()).is_err());
}

#[test]
fn test_run_sync_reports_missing_config() {
    let args = SyncArgs {
        config: PathBuf::from("/nonexistent/oplog-sync.toml"),
        ..args(Some("mongodb://localhost:27017"))
    };

    let err = tokio_test::block_on(run_sync(args, CancellationToken::new())).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to read config file"));
}
