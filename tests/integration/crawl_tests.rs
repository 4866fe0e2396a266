//! Integration tests for the seed and main-sequence crawls
//!
//! The HTTP tests serve an autoindex-style provider tree from wiremock and
//! run the full pipeline against it. The scripted tests replace the engine
//! to exercise job handling and locking without a server.

mod support;

use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use sumi_harvest::model::{CrawlType, UNDATED_BUCKET};
use sumi_harvest::storage::{RunStatus, Storage};
use sumi_harvest::LockOutcome;
use support::{
    collection_entry, memory_storage, mount_provider_tree, pipeline, test_config,
    ScriptedEngineFactory,
};
use tempfile::TempDir;
use wiremock::MockServer;

#[tokio::test]
async fn test_seed_crawl_discovers_collections() {
    let server = MockServer::start().await;
    mount_provider_tree(&server).await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    let storage = memory_storage();
    let pipeline = pipeline(test_config(&format!("{}/pub/", base), dir.path()), storage.clone());

    assert_eq!(pipeline.run_seed("noaa").await, LockOutcome::Completed);

    let store = storage.lock().unwrap();
    let collections = store.get_collections("noaa").unwrap();
    assert_eq!(collections.len(), 2);

    let model = store.get_collection("noaa", "pub_modelA").unwrap().unwrap();
    assert_eq!(model.seed_url_template, format!("{}/pub/modelA/{{date}}/", base));
    assert_eq!(model.date_format.as_deref(), Some("%Y-%m-%d"));
    assert_eq!(model.last_known_date, NaiveDate::from_ymd_opt(2024, 1, 15));
    assert!(!model.mature);

    let grids = store.get_collection("noaa", "pub_static").unwrap().unwrap();
    assert_eq!(grids.seed_url_template, format!("{}/pub/static/", base));
    assert!(grids.date_format.is_none());

    let run = store.get_latest_run("noaa", CrawlType::Seed).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "test-hash");

    // Engine state is cleaned up after the pass
    assert!(!dir.path().join("noaa-seed").exists());
}

#[tokio::test]
async fn test_seed_crawl_preserves_operator_overrides() {
    let server = MockServer::start().await;
    mount_provider_tree(&server).await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();
    let storage = memory_storage();

    let first = pipeline(test_config(&format!("{}/pub/", base), dir.path()), storage.clone());
    assert_eq!(first.run_seed("noaa").await, LockOutcome::Completed);

    {
        let mut store = storage.lock().unwrap();
        let mut model = store.get_collection("noaa", "pub_modelA").unwrap().unwrap();
        model.ignore = true;
        model.parameter_lookups.insert("a".to_string(), "analysis".to_string());
        store.save_collections(&[model]).unwrap();
    }

    let second = pipeline(test_config(&format!("{}/pub/", base), dir.path()), storage.clone());
    assert_eq!(second.run_seed("noaa").await, LockOutcome::Completed);

    let model = storage
        .lock()
        .unwrap()
        .get_collection("noaa", "pub_modelA")
        .unwrap()
        .unwrap();
    assert!(model.ignore);
    assert_eq!(model.parameter_lookups["a"], "analysis");
    assert_eq!(model.date_format.as_deref(), Some("%Y-%m-%d"));
}

#[tokio::test]
async fn test_main_sequence_enqueues_target_links() {
    let server = MockServer::start().await;
    mount_provider_tree(&server).await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();
    let storage = memory_storage();
    let pipeline = pipeline(test_config(&format!("{}/pub/", base), dir.path()), storage.clone());

    assert_eq!(pipeline.run_seed("noaa").await, LockOutcome::Completed);
    assert_eq!(pipeline.run_main_sequence("noaa").await, LockOutcome::Completed);

    let store = storage.lock().unwrap();
    // Today's directory does not exist; the last known date and the undated
    // collection yield three files
    assert_eq!(store.count_links().unwrap(), 3);
    let link = store
        .get_link(&format!("{}/pub/modelA/2024-01-15/b.grb2", base))
        .unwrap()
        .unwrap();
    assert_eq!(link.collection_name, "pub_modelA");
    assert_eq!(link.bucket, "2024-01-15");
    assert!(!link.processed);
    let land = store
        .get_link(&format!("{}/pub/static/land.grb2", base))
        .unwrap()
        .unwrap();
    assert_eq!(land.bucket, UNDATED_BUCKET);
    assert!(store
        .get_link(&format!("{}/pub/modelA/2024-01-14/a.grb2", base))
        .unwrap()
        .is_none());

    assert!(!dir.path().join("noaa-main-sequence").exists());
}

#[tokio::test]
async fn test_main_sequence_without_collections_seeds() {
    let server = MockServer::start().await;
    mount_provider_tree(&server).await;
    let dir = TempDir::new().unwrap();
    let storage = memory_storage();
    let pipeline = pipeline(
        test_config(&format!("{}/pub/", server.uri()), dir.path()),
        storage.clone(),
    );

    assert_eq!(pipeline.run_main_sequence("noaa").await, LockOutcome::Completed);

    let store = storage.lock().unwrap();
    assert_eq!(store.get_collections("noaa").unwrap().len(), 2);
    assert_eq!(store.count_links().unwrap(), 0);
}

#[tokio::test]
async fn test_failed_job_does_not_stop_the_others() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config("https://h.org/", dir.path());
    let mut ignored = collection_entry("old", "https://h.org/old/");
    ignored.ignore = true;
    config.providers[0].collections = vec![
        collection_entry("gfs", "https://h.org/gfs/"),
        collection_entry("nam", "https://h.org/nam/"),
        ignored,
    ];

    let factory = ScriptedEngineFactory::new()
        .failing("https://h.org/gfs/")
        .page(
            "https://h.org/nam/",
            &[
                "https://h.org/nam/x.grb2",
                "https://h.org/nam/sub/",
                "https://h.org/nam/x.grb2",
                "https://h.org/nam/notes.txt",
            ],
        );
    let started = factory.started.clone();
    let resets = factory.resets.clone();

    let storage = memory_storage();
    let pipeline = pipeline(config, storage.clone()).with_engine_factory(Arc::new(factory));

    assert_eq!(pipeline.run_main_sequence("noaa").await, LockOutcome::Completed);

    assert_eq!(
        *started.lock().unwrap(),
        vec!["https://h.org/gfs/".to_string(), "https://h.org/nam/".to_string()]
    );
    assert_eq!(*resets.lock().unwrap(), 1);

    let store = storage.lock().unwrap();
    assert_eq!(store.count_links().unwrap(), 1);
    assert!(store.get_link("https://h.org/nam/x.grb2").unwrap().is_some());
}

#[tokio::test]
async fn test_concurrent_crawl_of_same_provider_is_busy() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config("https://h.org/", dir.path());
    config.providers[0].collections = vec![collection_entry("gfs", "https://h.org/gfs/")];

    let factory = ScriptedEngineFactory::new()
        .page("https://h.org/gfs/", &["https://h.org/gfs/a.grb2"])
        .pause(Duration::from_millis(50));
    let started = factory.started.clone();

    let storage = memory_storage();
    let pipeline = pipeline(config, storage.clone()).with_engine_factory(Arc::new(factory));

    let (first, second) = tokio::join!(
        pipeline.run_main_sequence("noaa"),
        pipeline.run_main_sequence("noaa")
    );
    assert_eq!(first, LockOutcome::Completed);
    assert_eq!(second, LockOutcome::Busy);
    assert_eq!(started.lock().unwrap().len(), 1);

    // The lock is released once the first invocation returns
    assert!(!pipeline.locks().is_held("noaa-main-sequence"));
    assert_eq!(pipeline.run_main_sequence("noaa").await, LockOutcome::Completed);
    assert_eq!(storage.lock().unwrap().count_links().unwrap(), 1);
}

#[tokio::test]
async fn test_bad_collection_pattern_aborts_before_crawling() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config("https://h.org/", dir.path());
    let mut broken = collection_entry("gfs", "https://h.org/gfs/");
    broken.search_key = Some("([".to_string());
    config.providers[0].collections = vec![broken];

    let factory = ScriptedEngineFactory::new();
    let started = factory.started.clone();
    let storage = memory_storage();
    let pipeline = pipeline(config, storage.clone()).with_engine_factory(Arc::new(factory));

    assert_eq!(pipeline.run_main_sequence("noaa").await, LockOutcome::Failed);
    assert!(started.lock().unwrap().is_empty());

    let store = storage.lock().unwrap();
    assert!(store.get_collections("noaa").unwrap().is_empty());
    let run = store
        .get_latest_run("noaa", CrawlType::MainSequence)
        .unwrap()
        .unwrap();
    assert_eq!(run.status, RunStatus::Failed);
}

#[tokio::test]
async fn test_fallback_seed_respects_running_seed_crawl() {
    let dir = TempDir::new().unwrap();
    let config = test_config("https://h.org/", dir.path());

    let factory = ScriptedEngineFactory::new().pause(Duration::from_millis(50));
    let started = factory.started.clone();
    let storage = memory_storage();
    let pipeline = pipeline(config, storage.clone()).with_engine_factory(Arc::new(factory));

    // The provider has no collections, so the main sequence wants to seed too
    let (seed, main) = tokio::join!(
        pipeline.run_seed("noaa"),
        pipeline.run_main_sequence("noaa")
    );
    assert_eq!(seed, LockOutcome::Completed);
    assert_eq!(main, LockOutcome::Completed);
    assert_eq!(*started.lock().unwrap(), vec!["https://h.org/".to_string()]);
    assert!(!pipeline.locks().is_held("noaa-seed"));

    // Once the seed lock is free the fallback runs its own pass
    assert_eq!(pipeline.run_main_sequence("noaa").await, LockOutcome::Completed);
    assert_eq!(started.lock().unwrap().len(), 2);
}
