//! Integration tests for the search orchestrator

mod helpers;

use helpers::{
    article, harness, harness_with_sink, open_request, policy_generator, policy_records,
    BrokenHarvester, CancellingHarvester, FailingGenerator, RefusingSink, StaticHarvester,
};
use scout_common::events::{ChannelMessage, ErrorCategory, StageStatus};
use scout_research::db::{candidates::load_candidates, init_memory_pool, sessions::load_session};
use scout_research::models::{ResearchRequest, SearchMode, SearchSession, SearchState, Stage};
use scout_research::services::SearchError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_full_run_completes_and_stores_candidates() {
    let harvester = Arc::new(StaticHarvester::new(policy_records()));
    let h = harness(Arc::new(policy_generator()), harvester.clone()).await;
    let mut events = h.bus.subscribe();

    let session = SearchSession::new(open_request("AI policy reporters"));
    let search_id = session.search_id;

    let finished = h
        .orchestrator
        .execute(session, CancellationToken::new())
        .await
        .expect("run should persist");

    assert_eq!(finished.state, SearchState::Completed);
    assert_eq!(finished.overall_progress, 100.0);
    assert!(finished.ended_at.is_some());
    for stage in Stage::ALL {
        assert_eq!(finished.stages[stage.id()].status, StageStatus::Completed);
    }
    assert!(harvester.calls() > 0);

    // Same records for every query collapse to four originals
    let stored = load_candidates(&h.db, search_id).await.unwrap();
    assert_eq!(stored.len(), 4);
    for pair in stored.windows(2) {
        assert!(pair[0].score() >= pair[1].score());
    }

    let persisted = load_session(&h.db, search_id).await.unwrap().unwrap();
    assert_eq!(persisted.state, SearchState::Completed);
    let stats = persisted.stats.expect("stats stored on completion");
    assert_eq!(stats["returned"], 4);
    assert_eq!(stats["batch"]["syndicatedFiltered"], 1);

    let mut completion = None;
    while let Ok(envelope) = events.try_recv() {
        assert_eq!(envelope.search_id, search_id);
        if let ChannelMessage::Completion(payload) = envelope.message {
            completion = Some(payload);
        }
    }
    let completion = completion.expect("completion published");
    assert_eq!(completion.results["candidates"].as_array().unwrap().len(), 4);
    assert!(!completion.results["queries"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_threshold_and_max_contacts_applied() {
    let h = harness(
        Arc::new(policy_generator()),
        Arc::new(StaticHarvester::new(policy_records())),
    )
    .await;

    let mut request = open_request("AI policy reporters");
    request.max_contacts = 2;
    let session = SearchSession::new(request);
    let search_id = session.search_id;

    h.orchestrator
        .execute(session, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(load_candidates(&h.db, search_id).await.unwrap().len(), 2);

    let mut strict = open_request("AI policy reporters");
    strict.score_threshold = 100.0;
    let session = SearchSession::new(strict);
    let strict_id = session.search_id;
    let finished = h
        .orchestrator
        .execute(session, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(finished.state, SearchState::Completed);
    assert!(load_candidates(&h.db, strict_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_before_start_skips_all_stages() {
    let h = harness(
        Arc::new(policy_generator()),
        Arc::new(StaticHarvester::new(policy_records())),
    )
    .await;
    let mut events = h.bus.subscribe();
    let token = CancellationToken::new();
    token.cancel();

    let finished = h
        .orchestrator
        .execute(SearchSession::new(open_request("AI policy reporters")), token)
        .await
        .unwrap();

    assert_eq!(finished.state, SearchState::Cancelled);
    assert!(finished
        .stages
        .values()
        .all(|s| s.status == StageStatus::Skipped));

    // Subscribers get a terminal frame flagged cancelled
    let mut terminal = None;
    while let Ok(envelope) = events.try_recv() {
        if let ChannelMessage::Completion(payload) = envelope.message {
            terminal = Some(payload);
        }
    }
    let terminal = terminal.expect("terminal frame published");
    assert!(terminal.cancelled);
    assert!(terminal.results["candidates"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_late_harvest_result_is_discarded() {
    let token = CancellationToken::new();
    let harvester = Arc::new(CancellingHarvester {
        token: token.clone(),
        records: policy_records(),
    });
    let h = harness(Arc::new(policy_generator()), harvester).await;

    let session = SearchSession::new(open_request("AI policy reporters"));
    let search_id = session.search_id;
    let finished = h.orchestrator.execute(session, token).await.unwrap();

    assert_eq!(finished.state, SearchState::Cancelled);
    assert_eq!(
        finished.stages[Stage::QueryGeneration.id()].status,
        StageStatus::Completed
    );
    assert_eq!(
        finished.stages[Stage::Analysis.id()].status,
        StageStatus::Skipped
    );
    assert!(load_candidates(&h.db, search_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_generator_exhaustion_fails_run_cleanly() {
    let h = harness(
        Arc::new(FailingGenerator::permanent()),
        Arc::new(StaticHarvester::new(policy_records())),
    )
    .await;
    let mut events = h.bus.subscribe();

    let finished = h
        .orchestrator
        .execute(
            SearchSession::new(open_request("AI policy reporters")),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(finished.state, SearchState::Failed);
    let error = finished.error.as_ref().expect("error recorded");
    assert_eq!(error.category, ErrorCategory::CollaboratorExhausted);
    assert!(error.retryable);
    assert_eq!(error.stage_id.as_deref(), Some("query_generation"));
    assert_eq!(
        finished.stages[Stage::QueryGeneration.id()].status,
        StageStatus::Failed
    );
    assert_eq!(
        finished.stages[Stage::Harvesting.id()].status,
        StageStatus::Skipped
    );

    let mut saw_error = false;
    while let Ok(envelope) = events.try_recv() {
        if matches!(envelope.message, ChannelMessage::Error(_)) {
            saw_error = true;
        }
    }
    assert!(saw_error);
}

#[tokio::test]
async fn test_all_harvests_failing_is_exhausted() {
    let h = harness(Arc::new(policy_generator()), Arc::new(BrokenHarvester)).await;

    let finished = h
        .orchestrator
        .execute(
            SearchSession::new(open_request("AI policy reporters")),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(finished.state, SearchState::Failed);
    let error = finished.error.unwrap();
    assert_eq!(error.category, ErrorCategory::CollaboratorExhausted);
    assert_eq!(error.stage_id.as_deref(), Some("harvesting"));
}

#[tokio::test]
async fn test_second_launch_for_same_id_is_rejected() {
    let h = harness(
        Arc::new(policy_generator()),
        Arc::new(StaticHarvester::new(policy_records())),
    )
    .await;
    let session = SearchSession::new(open_request("AI policy reporters"));
    let _guard = h
        .orchestrator
        .registry()
        .register(session.search_id)
        .unwrap();

    let err = h.orchestrator.launch(session).unwrap_err();
    assert!(matches!(err, SearchError::AlreadyRunning(_)));
}

#[tokio::test]
async fn test_launched_run_releases_registration() {
    let h = harness(
        Arc::new(policy_generator()),
        Arc::new(StaticHarvester::new(policy_records())),
    )
    .await;
    let session = SearchSession::new(open_request("AI policy reporters"));
    let search_id = session.search_id;

    let handle = h.orchestrator.launch(session).unwrap();
    let finished = handle.await.unwrap().unwrap();

    assert_eq!(finished.state, SearchState::Completed);
    assert!(!h.orchestrator.registry().is_active(search_id));
}

#[tokio::test]
async fn test_recall_mode_widens_budget_and_relaxes_threshold() {
    let h = harness(
        Arc::new(policy_generator()),
        Arc::new(StaticHarvester::new(policy_records())),
    )
    .await;

    let precision = h.orchestrator.plan(&ResearchRequest::new("AI policy reporters"));
    assert_eq!(precision.max_queries, 10);
    assert_eq!(precision.confidence_threshold, 0.5);
    assert_eq!(precision.score_threshold, 70.0);

    let mut request = ResearchRequest::new("AI policy reporters");
    request.mode = SearchMode::Recall;
    let recall = h.orchestrator.plan(&request);
    assert_eq!(recall.max_queries, 20);
    assert_eq!(recall.confidence_threshold, 0.3);
    assert_eq!(recall.score_threshold, 55.0);

    request.max_queries = Some(4);
    request.score_threshold = 5.0;
    let overridden = h.orchestrator.plan(&request);
    assert_eq!(overridden.max_queries, 4);
    assert_eq!(overridden.score_threshold, 0.0);
}

#[tokio::test]
async fn test_storage_failure_is_attributed_to_storage_stage() {
    let db = init_memory_pool().await.unwrap();
    let h = harness_with_sink(
        db,
        Arc::new(policy_generator()),
        Arc::new(StaticHarvester::new(policy_records())),
        Arc::new(RefusingSink),
    );

    let finished = h
        .orchestrator
        .execute(
            SearchSession::new(open_request("AI policy reporters")),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(finished.state, SearchState::Failed);
    let error = finished.error.as_ref().unwrap();
    assert_eq!(error.category, ErrorCategory::Internal);
    assert_eq!(error.stage_id.as_deref(), Some("storage"));
    assert_eq!(
        finished.stages[Stage::Storage.id()].status,
        StageStatus::Failed
    );
    assert_eq!(
        finished.stages[Stage::Ranking.id()].status,
        StageStatus::Completed
    );
    assert_eq!(
        finished.stages[Stage::QueryGeneration.id()].status,
        StageStatus::Completed
    );
}

#[tokio::test]
async fn test_freelancer_group_reported_once_per_run() {
    let records = vec![
        article("https://paper.com/tech/a", "By Jane Doe", "AI rules", 3),
        article("https://techdesk.io/technology/b", "By Jane Doe", "AI chips", 5),
    ];
    let h = harness(
        Arc::new(policy_generator()),
        Arc::new(StaticHarvester::new(records)),
    )
    .await;
    let mut events = h.bus.subscribe();

    let finished = h
        .orchestrator
        .execute(
            SearchSession::new(open_request("AI policy reporters")),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(finished.state, SearchState::Completed);
    assert_eq!(finished.stats.unwrap()["consolidationGroups"], 1);

    let mut completion = None;
    while let Ok(envelope) = events.try_recv() {
        if let ChannelMessage::Completion(payload) = envelope.message {
            completion = Some(payload);
        }
    }
    let completion = completion.expect("completion published");
    let groups = completion.results["groups"].as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["kind"], "freelancer_group");
    assert_eq!(completion.results["candidates"].as_array().unwrap().len(), 2);
}
