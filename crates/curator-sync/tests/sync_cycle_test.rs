//! End-to-end sync cycles against an in-memory database and a mock cloud.

mod common;

use std::sync::Arc;

use common::{db_engine, SwitchProbe};
use curator_cloud::mock::{MockCloudService, MockFailure};
use curator_core::{CloudTagRelation, SyncStatus};
use curator_db::test_fixtures::TestDatabase;
use curator_sync::{
    CycleReport, EngineState, MissKey, SkipReason, SyncConfig, SyncEngine, TickOutcome,
};

async fn completed(engine: &SyncEngine) -> CycleReport {
    match engine.try_sync().await {
        TickOutcome::Completed(report) => report,
        other => panic!("expected a completed cycle, got {other:?}"),
    }
}

#[tokio::test]
async fn test_full_cycle_uploads_in_dependency_order() {
    let test_db = TestDatabase::new().await;
    let cloud = MockCloudService::new();
    let engine = db_engine(&test_db, &cloud, SyncConfig::default());

    let ws = test_db.workspace("/docs", "autotag").await;
    let dim = test_db.dimension("topic").await;
    let tag = test_db.tag(dim, "invoice").await;
    let file = test_db.analyzed_file(ws, "hash-1").await;
    let rel = test_db.relation(file, tag).await;

    let report = completed(&engine).await;
    assert_eq!(report.upload_calls, 3);
    assert_eq!(report.dimensions_uploaded, 1);
    assert_eq!(report.tags_uploaded, 1);
    assert_eq!(report.files_uploaded, 1);
    assert_eq!(report.relations_uploaded, 1);

    let payloads = cloud.batch_payloads();
    let cloud_dim = cloud.dimension_id("topic").expect("dimension created");
    let cloud_tag = cloud.tag_id(cloud_dim, "invoice").expect("tag created");

    // dimensions, then tags against the cloud dimension id, then files + relations
    assert_eq!(payloads[0].dimensions.as_ref().unwrap()[0].name, "topic");
    assert!(payloads[0].tags.is_none());
    assert_eq!(payloads[1].tags.as_ref().unwrap()[0].dimension_id, cloud_dim);
    assert_eq!(payloads[2].files.as_ref().unwrap()[0].file_hash, "hash-1");
    assert_eq!(
        payloads[2].tag_relations.as_ref().unwrap(),
        &vec![CloudTagRelation {
            file_hash: "hash-1".to_string(),
            tag_id: cloud_tag,
        }]
    );
    assert_ne!(cloud_tag.0, tag, "cloud ids must differ from local ids");

    assert_eq!(test_db.status_of("file_tags", tag).await, SyncStatus::Synced);
    assert_eq!(test_db.status_of("files", file).await, SyncStatus::Synced);
    assert_eq!(
        test_db.status_of("file_tag_relations", rel).await,
        SyncStatus::Synced
    );
    // dimension rows are only ever synced by a cloud round-trip
    assert_eq!(
        test_db.status_of("file_dimensions", dim).await,
        SyncStatus::Pending
    );
}

#[tokio::test]
async fn test_second_cycle_uploads_nothing() {
    let test_db = TestDatabase::new().await;
    let cloud = MockCloudService::new();
    let engine = db_engine(&test_db, &cloud, SyncConfig::default());

    let ws = test_db.workspace("/docs", "autotag").await;
    let dim = test_db.dimension("topic").await;
    let tag = test_db.tag(dim, "invoice").await;
    let file = test_db.analyzed_file(ws, "hash-1").await;
    test_db.relation(file, tag).await;
    test_db.dimension_expansion("people").await;

    let first = completed(&engine).await;
    assert!(!first.is_noop());
    let uploads = cloud.batch_payloads().len();

    let second = completed(&engine).await;
    assert!(second.is_noop());
    assert_eq!(cloud.batch_payloads().len(), uploads);
}

#[tokio::test]
async fn test_dimensions_deduplicated_by_name() {
    let test_db = TestDatabase::new().await;
    let cloud = MockCloudService::new();
    let engine = db_engine(&test_db, &cloud, SyncConfig::default());

    let topic = test_db.dimension("topic").await;
    let project = test_db.dimension("project").await;
    for i in 0..10 {
        let dim = if i % 2 == 0 { topic } else { project };
        test_db.tag(dim, &format!("tag-{i}")).await;
    }

    let report = completed(&engine).await;
    let payloads = cloud.batch_payloads();
    assert_eq!(payloads[0].dimensions.as_ref().unwrap().len(), 2);
    assert_eq!(payloads[1].tags.as_ref().unwrap().len(), 10);
    assert_eq!(report.tags_uploaded, 10);
}

#[tokio::test]
async fn test_unresolved_tag_skipped_and_left_pending() {
    let test_db = TestDatabase::new().await;
    let cloud = MockCloudService::new();
    cloud.swallow_dimension("ghost");
    let engine = db_engine(&test_db, &cloud, SyncConfig::default());

    let topic = test_db.dimension("topic").await;
    let ghost = test_db.dimension("ghost").await;
    let kept = test_db.tag(topic, "kept").await;
    let lost = test_db.tag(ghost, "lost").await;

    let report = completed(&engine).await;
    assert_eq!(report.tags_uploaded, 1);
    assert_eq!(report.tags_skipped, 1);

    let tags = cloud.batch_payloads()[1].tags.clone().unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].name, "kept");

    assert_eq!(test_db.status_of("file_tags", kept).await, SyncStatus::Synced);
    assert_eq!(test_db.status_of("file_tags", lost).await, SyncStatus::Pending);
}

#[tokio::test]
async fn test_repeated_miss_escalates() {
    let test_db = TestDatabase::new().await;
    let cloud = MockCloudService::new();
    cloud.swallow_dimension("ghost");
    let engine = db_engine(
        &test_db,
        &cloud,
        SyncConfig::default().with_miss_escalation_threshold(2),
    );

    let ghost = test_db.dimension("ghost").await;
    let lost = test_db.tag(ghost, "lost").await;

    let first = completed(&engine).await;
    assert!(first.escalated.is_empty());

    let second = completed(&engine).await;
    assert_eq!(second.escalated, vec![MissKey::Tag(lost)]);
    assert_eq!(test_db.status_of("file_tags", lost).await, SyncStatus::Pending);
}

#[tokio::test]
async fn test_deleted_row_leaves_escalation_list() {
    let test_db = TestDatabase::new().await;
    let cloud = MockCloudService::new();
    cloud.swallow_dimension("ghost");
    let engine = db_engine(
        &test_db,
        &cloud,
        SyncConfig::default().with_miss_escalation_threshold(1),
    );

    let ghost = test_db.dimension("ghost").await;
    let lost = test_db.tag(ghost, "lost").await;

    let first = completed(&engine).await;
    assert_eq!(first.escalated, vec![MissKey::Tag(lost)]);

    // The analysis pipeline drops the tag.
    test_db.delete("file_tags", lost).await;

    let second = completed(&engine).await;
    assert!(second.escalated.is_empty());
    assert_eq!(engine.executor().misses(MissKey::Tag(lost)).await, 0);
}

#[tokio::test]
async fn test_dropped_relation_retried_once_resolvable() {
    let test_db = TestDatabase::new().await;
    let cloud = MockCloudService::new();
    cloud.swallow_dimension("ghost");
    let engine = db_engine(&test_db, &cloud, SyncConfig::default());

    let ws = test_db.workspace("/docs", "autotag").await;
    let ghost = test_db.dimension("ghost").await;
    let tag = test_db.tag(ghost, "lost").await;
    let file = test_db.analyzed_file(ws, "hash-1").await;
    let rel = test_db.relation(file, tag).await;

    let first = completed(&engine).await;
    assert_eq!(first.files_uploaded, 1);
    assert_eq!(first.relations_skipped, 1);
    assert_eq!(test_db.status_of("files", file).await, SyncStatus::Synced);
    assert_eq!(
        test_db.status_of("file_tag_relations", rel).await,
        SyncStatus::Pending
    );
    assert_eq!(engine.executor().misses(MissKey::Relation(rel)).await, 1);

    // The cloud creates the dimension out of band.
    let cloud_dim = cloud.seed_dimension("ghost");

    let second = completed(&engine).await;
    assert_eq!(second.tags_uploaded, 1);
    assert_eq!(second.relations_uploaded, 1);
    assert_eq!(
        test_db.status_of("file_tag_relations", rel).await,
        SyncStatus::Synced
    );
    let cloud_tag = cloud.tag_id(cloud_dim, "lost").unwrap();
    assert!(cloud.relations().contains(&CloudTagRelation {
        file_hash: "hash-1".to_string(),
        tag_id: cloud_tag,
    }));
    assert_eq!(engine.executor().misses(MissKey::Relation(rel)).await, 0);
}

#[tokio::test]
async fn test_pan_dimension_expansion_suppressed() {
    let test_db = TestDatabase::new().await;
    let cloud = MockCloudService::new();
    let generic = test_db.dimension_with("generic", SyncStatus::Synced, None).await;
    let expansion = test_db.tag_expansion(generic, "misc").await;
    let engine = db_engine(
        &test_db,
        &cloud,
        SyncConfig::default().with_pan_dimension_ids([generic]),
    );

    let report = completed(&engine).await;
    assert_eq!(report.tag_expansions_suppressed, 1);
    assert_eq!(
        test_db.status_of("tag_expansions", expansion).await,
        SyncStatus::Synced
    );
    assert!(cloud.batch_payloads().is_empty());
}

#[tokio::test]
async fn test_tag_expansion_remapped_to_cloud_dimension() {
    let test_db = TestDatabase::new().await;
    let cloud = MockCloudService::new();
    let cloud_topic = cloud.seed_dimension("topic");
    let topic = test_db.dimension_with("topic", SyncStatus::Synced, None).await;
    let unknown = test_db.dimension_with("unknown", SyncStatus::Synced, None).await;
    test_db.tag_expansion(topic, "receipts").await;
    test_db.tag_expansion(unknown, "misc").await;
    test_db.dimension_expansion("people").await;
    let engine = db_engine(&test_db, &cloud, SyncConfig::default());

    let report = completed(&engine).await;
    assert_eq!(report.dimension_expansions_uploaded, 1);
    assert_eq!(report.tag_expansions_uploaded, 2);

    let payloads = cloud.batch_payloads();
    assert_eq!(payloads.len(), 1);
    let tags = payloads[0].tag_expansions.clone().unwrap();
    assert_eq!(tags[0].dimension_id, cloud_topic.0);
    assert_eq!(tags[1].dimension_id, unknown);
    assert_eq!(payloads[0].dimension_expansions.as_ref().unwrap()[0].name, "people");
}

#[tokio::test]
async fn test_cleanup_removes_round_tripped_proposals() {
    let test_db = TestDatabase::new().await;
    let cloud = MockCloudService::new();
    let engine = db_engine(&test_db, &cloud, SyncConfig::default());

    test_db.dimension_with("X", SyncStatus::Synced, None).await;
    let dim_expansion = test_db.dimension_expansion("X").await;
    let topic = test_db.dimension_with("topic", SyncStatus::Synced, None).await;
    test_db.tag_with(topic, "invoice", SyncStatus::Synced).await;
    let tag_expansion = test_db.tag_expansion(topic, "invoice").await;
    let open_expansion = test_db.dimension_expansion("Y").await;

    let report = completed(&engine).await;
    assert_eq!(report.dimension_expansions_deleted, 1);
    assert_eq!(report.tag_expansions_deleted, 1);
    assert!(!test_db.exists("dimension_expansions", dim_expansion).await);
    assert!(!test_db.exists("tag_expansions", tag_expansion).await);
    assert!(test_db.exists("dimension_expansions", open_expansion).await);
}

#[tokio::test]
async fn test_files_keyed_by_content_hash() {
    let test_db = TestDatabase::new().await;
    let cloud = MockCloudService::new();
    let engine = db_engine(&test_db, &cloud, SyncConfig::default());

    let ws = test_db.workspace("/docs", "autotag").await;
    let first = test_db.analyzed_file(ws, "same-hash").await;
    let second = test_db.analyzed_file(ws, "same-hash").await;

    let report = completed(&engine).await;
    assert_eq!(report.files_uploaded, 1);
    let files = cloud.batch_payloads()[0].files.clone().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].file_hash, "same-hash");
    assert_eq!(test_db.status_of("files", first).await, SyncStatus::Synced);
    assert_eq!(test_db.status_of("files", second).await, SyncStatus::Synced);
}

#[tokio::test]
async fn test_only_analyzed_files_of_sync_workspaces_upload() {
    let test_db = TestDatabase::new().await;
    let cloud = MockCloudService::new();
    let engine = db_engine(&test_db, &cloud, SyncConfig::default());

    let synced_ws = test_db.workspace("/docs", "autotag").await;
    let manual_ws = test_db.workspace("/manual", "manual").await;
    let eligible = test_db.analyzed_file(synced_ws, "a").await;
    let unanalyzed = test_db.file_with(synced_ws, "b", false).await;
    let other_ws = test_db.analyzed_file(manual_ws, "c").await;

    completed(&engine).await;
    assert_eq!(test_db.status_of("files", eligible).await, SyncStatus::Synced);
    assert_eq!(test_db.status_of("files", unanalyzed).await, SyncStatus::Pending);
    assert_eq!(test_db.status_of("files", other_ws).await, SyncStatus::Pending);
    assert_eq!(cloud.file_hashes().len(), 1);
}

#[tokio::test]
async fn test_failed_upload_changes_nothing() {
    let test_db = TestDatabase::new().await;
    let cloud = MockCloudService::new();
    let engine = db_engine(&test_db, &cloud, SyncConfig::default());

    let ws = test_db.workspace("/docs", "autotag").await;
    let dim = test_db.dimension("topic").await;
    let tag = test_db.tag(dim, "invoice").await;
    let file = test_db.analyzed_file(ws, "hash-1").await;

    cloud.fail_batches(MockFailure::Server);
    let outcome = engine.try_sync().await;
    assert!(matches!(
        outcome,
        TickOutcome::Failed {
            permission_denied: false,
            ..
        }
    ));
    assert_eq!(test_db.status_of("file_tags", tag).await, SyncStatus::Pending);
    assert_eq!(test_db.status_of("files", file).await, SyncStatus::Pending);
    assert!(!engine.backoff().is_active());

    cloud.clear_failures();
    completed(&engine).await;
    assert_eq!(test_db.status_of("files", file).await, SyncStatus::Synced);
}

#[tokio::test]
async fn test_file_upload_failure_keeps_committed_tags() {
    let test_db = TestDatabase::new().await;
    let cloud = MockCloudService::new();
    let engine = db_engine(&test_db, &cloud, SyncConfig::default());

    let ws = test_db.workspace("/docs", "autotag").await;
    let dim = test_db.dimension("topic").await;
    let tag = test_db.tag(dim, "invoice").await;
    let file = test_db.analyzed_file(ws, "hash-1").await;
    let rel = test_db.relation(file, tag).await;

    cloud.fail_file_batches(MockFailure::Server);
    assert!(matches!(
        engine.try_sync().await,
        TickOutcome::Failed {
            permission_denied: false,
            ..
        }
    ));
    // Tags committed before the failing phase stay synced.
    assert_eq!(test_db.status_of("file_tags", tag).await, SyncStatus::Synced);
    assert_eq!(test_db.status_of("files", file).await, SyncStatus::Pending);
    assert_eq!(
        test_db.status_of("file_tag_relations", rel).await,
        SyncStatus::Pending
    );
    assert!(cloud.file_hashes().is_empty());

    cloud.clear_failures();
    let report = completed(&engine).await;
    assert_eq!(report.files_uploaded, 1);
    assert_eq!(report.relations_uploaded, 1);
    assert_eq!(test_db.status_of("files", file).await, SyncStatus::Synced);
    assert_eq!(
        test_db.status_of("file_tag_relations", rel).await,
        SyncStatus::Synced
    );
}

#[tokio::test]
async fn test_permission_denied_engages_backoff() {
    let test_db = TestDatabase::new().await;
    let cloud = MockCloudService::new();
    let engine = db_engine(&test_db, &cloud, SyncConfig::default());

    let dim = test_db.dimension("topic").await;
    test_db.tag(dim, "invoice").await;

    cloud.fail_batches(MockFailure::PermissionDenied);
    assert!(matches!(
        engine.try_sync().await,
        TickOutcome::Failed {
            permission_denied: true,
            ..
        }
    ));

    let calls = cloud.call_count();
    assert!(matches!(
        engine.try_sync().await,
        TickOutcome::Skipped(SkipReason::Backoff { .. })
    ));
    assert_eq!(cloud.call_count(), calls);
}

#[tokio::test]
async fn test_malformed_json_column_aborts_cycle() {
    let test_db = TestDatabase::new().await;
    let cloud = MockCloudService::new();
    let engine = db_engine(&test_db, &cloud, SyncConfig::default());

    let dim = test_db
        .dimension_with("broken", SyncStatus::Pending, Some("{not json"))
        .await;
    let tag = test_db.tag(dim, "invoice").await;

    match engine.try_sync().await {
        TickOutcome::Failed {
            error,
            permission_denied,
            ..
        } => {
            assert!(!permission_denied);
            assert!(error.contains("trigger_conditions"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(cloud.batch_payloads().is_empty());
    assert_eq!(test_db.status_of("file_tags", tag).await, SyncStatus::Pending);
}

#[tokio::test]
async fn test_offline_probe_skips_cycle() {
    let test_db = TestDatabase::new().await;
    let cloud = MockCloudService::new();
    let engine = SyncEngine::new(
        Arc::new(test_db.db.sync.clone()),
        Arc::new(cloud.clone()),
        Arc::new(SwitchProbe::offline()),
        SyncConfig::default(),
    );

    assert_eq!(
        engine.try_sync().await,
        TickOutcome::Skipped(SkipReason::Offline)
    );
    assert_eq!(cloud.call_count(), 0);
}

#[tokio::test]
async fn test_status_reports_pending_counts() {
    let test_db = TestDatabase::new().await;
    let cloud = MockCloudService::new();
    let engine = db_engine(&test_db, &cloud, SyncConfig::default());

    let ws = test_db.workspace("/docs", "autotag").await;
    let dim = test_db.dimension("topic").await;
    let tag = test_db.tag(dim, "invoice").await;
    let file = test_db.analyzed_file(ws, "hash-1").await;
    test_db.relation(file, tag).await;

    let before = engine.status().await.unwrap();
    assert_eq!(before.state, EngineState::Idle);
    assert!(!before.cache_ready);
    assert_eq!(before.pending.files, 1);
    assert_eq!(before.pending.tags, 1);
    assert_eq!(before.pending.relations, 1);

    completed(&engine).await;

    let after = engine.status().await.unwrap();
    assert!(after.cache_ready);
    assert_eq!(after.pending.total(), 0);
}

#[tokio::test]
async fn test_language_passed_to_every_cloud_call() {
    let test_db = TestDatabase::new().await;
    let cloud = MockCloudService::new();
    let engine = db_engine(&test_db, &cloud, SyncConfig::default().with_language("en"));

    let dim = test_db.dimension("topic").await;
    test_db.tag(dim, "invoice").await;
    completed(&engine).await;

    use curator_cloud::mock::MockCall;
    for call in cloud.calls() {
        let language = match call {
            MockCall::FetchDimensions { language }
            | MockCall::FetchTags { language }
            | MockCall::BatchSync { language, .. } => language,
        };
        assert_eq!(language, "en");
    }
}
