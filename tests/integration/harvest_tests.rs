//! Integration tests for the harvest pass
//!
//! Links are queued directly and harvested through the pipeline with the
//! default header extractor against a wiremock server.

mod support;

use chrono::{Duration, Utc};
use std::sync::Arc;
use sumi_harvest::harvest::{BatchContext, MetadataParser, RawMetadata};
use sumi_harvest::model::{CrawlType, DatasetRecord, Link, LinkTemplate, UNDATED_BUCKET};
use sumi_harvest::pipeline::ALL_PROVIDERS;
use sumi_harvest::storage::{RunStatus, SharedStorage, Storage};
use sumi_harvest::{HarvestError, LockOutcome};
use support::{memory_storage, pipeline, test_config};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_files(server: &MockServer) {
    for (file, size) in [("/gfs/a.grb2", "100"), ("/gfs/c.grb2", "300")] {
        Mock::given(method("HEAD"))
            .and(path(file))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/octet-stream")
                    .insert_header("content-length", size),
            )
            .mount(server)
            .await;
    }
    Mock::given(method("HEAD"))
        .and(path("/gfs/b.grb2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(server)
        .await;
}

fn enqueue(storage: &SharedStorage, base: &str, files: &[&str]) -> Vec<Link> {
    let template = LinkTemplate::new("noaa", "gfs", None);
    let start = Utc::now() - Duration::minutes(10);
    let links: Vec<Link> = files
        .iter()
        .enumerate()
        .map(|(i, f)| template.link_at(&format!("{}/gfs/{}", base, f), start + Duration::seconds(i as i64)))
        .collect();
    storage.lock().unwrap().enqueue_links(&links).unwrap();
    links
}

struct FailingParser;

impl MetadataParser for FailingParser {
    fn parse(
        &self,
        context: &BatchContext,
        _batch: &[(Link, RawMetadata)],
    ) -> sumi_harvest::Result<Vec<DatasetRecord>> {
        Err(HarvestError::MetadataParse {
            provider: context.provider_name.clone(),
            collection: context.collection_name.clone(),
            message: "unsupported format".to_string(),
        })
    }
}

#[tokio::test]
async fn test_harvest_isolates_extraction_failures() {
    let server = MockServer::start().await;
    mount_files(&server).await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();
    let storage = memory_storage();
    let pipeline = pipeline(test_config(&base, dir.path()), storage.clone());

    let links = enqueue(&storage, &base, &["a.grb2", "b.grb2", "c.grb2"]);
    assert_eq!(pipeline.run_harvest().await, LockOutcome::Completed);

    let store = storage.lock().unwrap();
    assert_eq!(store.count_unprocessed_links().unwrap(), 0);
    assert_eq!(store.count_records().unwrap(), 2);

    let record = store.get_record(&links[2].url).unwrap().unwrap();
    assert_eq!(record.content_length, Some(300));
    assert_eq!(record.collection_name, "gfs");
    assert!(store.get_record(&links[1].url).unwrap().is_none());

    let previous = store.load_previous_run("noaa", "gfs", UNDATED_BUCKET).unwrap();
    assert_eq!(previous.len(), 2);
    assert!(!previous.contains(&links[1].url));

    let run = store
        .get_latest_run(ALL_PROVIDERS, CrawlType::Harvest)
        .unwrap()
        .unwrap();
    assert_eq!(run.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_second_harvest_reparses_nothing() {
    let server = MockServer::start().await;
    mount_files(&server).await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();
    let storage = memory_storage();
    let pipeline = pipeline(test_config(&base, dir.path()), storage.clone());

    enqueue(&storage, &base, &["a.grb2", "c.grb2"]);
    assert_eq!(pipeline.run_harvest().await, LockOutcome::Completed);
    let harvested_at = storage
        .lock()
        .unwrap()
        .get_record(&format!("{}/gfs/a.grb2", base))
        .unwrap()
        .unwrap()
        .harvested_at;

    // Rediscovered after the queue was purged
    storage
        .lock()
        .unwrap()
        .purge_links_created_before("noaa", Utc::now())
        .unwrap();
    enqueue(&storage, &base, &["a.grb2", "c.grb2"]);
    assert_eq!(pipeline.run_harvest().await, LockOutcome::Completed);

    let store = storage.lock().unwrap();
    assert_eq!(store.count_unprocessed_links().unwrap(), 0);
    let record = store
        .get_record(&format!("{}/gfs/a.grb2", base))
        .unwrap()
        .unwrap();
    assert_eq!(record.harvested_at, harvested_at);
}

#[tokio::test]
async fn test_parse_failure_still_consumes_links() {
    let server = MockServer::start().await;
    mount_files(&server).await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();
    let storage = memory_storage();
    let pipeline = pipeline(test_config(&base, dir.path()), storage.clone())
        .with_parser(Arc::new(FailingParser));

    enqueue(&storage, &base, &["a.grb2", "c.grb2"]);
    assert_eq!(pipeline.run_harvest().await, LockOutcome::Completed);

    let store = storage.lock().unwrap();
    assert_eq!(store.count_unprocessed_links().unwrap(), 0);
    assert_eq!(store.count_records().unwrap(), 0);
    assert!(store
        .load_previous_run("noaa", "gfs", UNDATED_BUCKET)
        .unwrap()
        .is_empty());
}
