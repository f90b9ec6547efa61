//! Runs that pick up where an earlier run stopped

use crate::common::{highest, mount_chapters, mount_story, sink_chapters, story_url, Fixture};
use manga_tracker::state::SkipReason;
use manga_tracker::storage::{CrawlStateStore, JsonStateStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Five published chapters; chapter 6 is explicitly not found
async fn five_chapter_site() -> MockServer {
    let server = MockServer::start().await;
    mount_story(&server, "chainsaw-man", "Chainsaw Man").await;
    mount_chapters(&server, "chainsaw-man", 5).await;
    Mock::given(method("GET"))
        .and(path("/truyen/chainsaw-man/chapter-6"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    server
}

async fn assert_resumes_across_runs(
    fixture: &Fixture,
    open_store: impl Fn() -> Arc<dyn CrawlStateStore>,
) {
    let sink = fixture.file_sink();

    let first = fixture
        .coordinator(open_store(), sink.clone(), CancellationToken::new())
        .run()
        .await;
    assert_eq!(first.chapters_committed(), 3);
    assert_eq!(highest(open_store().as_ref(), "chainsaw-man").await, Some(3));

    let second = fixture
        .coordinator(open_store(), sink.clone(), CancellationToken::new())
        .run()
        .await;
    let outcome = second.outcome("chainsaw-man").unwrap();
    assert!(outcome.is_done());
    assert_eq!(outcome.chapters_committed, 2);
    assert_eq!(outcome.highest_completed, Some(5));
    assert_eq!(highest(open_store().as_ref(), "chainsaw-man").await, Some(5));
    assert_eq!(sink_chapters(&sink, "chainsaw-man"), vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_second_run_resumes_with_sqlite_state() {
    let server = five_chapter_site().await;
    let fixture = Fixture::new(&server, vec![story_url(&server, "chainsaw-man")]);

    assert_resumes_across_runs(&fixture, || fixture.sqlite_store()).await;

    let requests = server.received_requests().await.unwrap();
    for n in 1..=3 {
        let chapter = format!("/truyen/chainsaw-man/chapter-{}", n);
        let fetched = requests.iter().filter(|r| r.url.path() == chapter).count();
        assert_eq!(fetched, 1, "chapter {} fetched more than once", n);
    }
}

#[tokio::test]
async fn test_second_run_resumes_with_json_state() {
    let server = five_chapter_site().await;
    let fixture = Fixture::new(&server, vec![story_url(&server, "chainsaw-man")]);
    let state_path = fixture.dir.path().join("state.json");

    assert_resumes_across_runs(&fixture, || {
        Arc::new(JsonStateStore::new(state_path.clone())) as Arc<dyn CrawlStateStore>
    })
    .await;

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&state_path).unwrap()).unwrap();
    assert_eq!(
        saved["chainsaw-man"]["highest_completed_sequence_number"],
        5
    );
}

#[tokio::test]
async fn test_corrupt_progress_only_skips_that_story() {
    let server = MockServer::start().await;
    for slug in ["broken", "healthy"] {
        mount_story(&server, slug, slug).await;
        mount_chapters(&server, slug, 2).await;
    }
    Mock::given(method("GET"))
        .and(path("/truyen/broken/chapter-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let fixture = Fixture::new(
        &server,
        vec![story_url(&server, "broken"), story_url(&server, "healthy")],
    );
    let state_path = fixture.dir.path().join("state.json");
    std::fs::write(
        &state_path,
        r#"{
            "broken": {"highest_completed_sequence_number": "three", "last_attempted_at": "2024-01-01T00:00:00Z"},
            "healthy": {"highest_completed_sequence_number": 1, "last_attempted_at": "2024-01-01T00:00:00Z"}
        }"#,
    )
    .unwrap();
    let store: Arc<dyn CrawlStateStore> = Arc::new(JsonStateStore::new(state_path.clone()));

    let summary = fixture
        .coordinator(store.clone(), fixture.file_sink(), CancellationToken::new())
        .run()
        .await;

    assert_eq!(
        summary.stories_skipped(),
        vec![("broken", SkipReason::CorruptState)]
    );
    assert_eq!(summary.stories_done(), vec!["healthy"]);
    assert_eq!(highest(store.as_ref(), "healthy").await, Some(2));

    // The corrupt entry is left for an operator to inspect
    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&state_path).unwrap()).unwrap();
    assert_eq!(saved["broken"]["highest_completed_sequence_number"], "three");
}

#[tokio::test]
async fn test_up_to_date_story_only_requests_next_chapter() {
    let server = MockServer::start().await;
    mount_story(&server, "caught-up", "Caught Up").await;
    mount_chapters(&server, "caught-up", 2).await;

    let fixture = Fixture::new(&server, vec![story_url(&server, "caught-up")]);
    let store = fixture.sqlite_store();
    let sink = fixture.file_sink();

    fixture
        .coordinator(store.clone(), sink.clone(), CancellationToken::new())
        .run()
        .await;
    let before = store.get("caught-up").await.unwrap().unwrap();

    let again = fixture
        .coordinator(store.clone(), sink.clone(), CancellationToken::new())
        .run()
        .await;

    let outcome = again.outcome("caught-up").unwrap();
    assert!(outcome.is_done());
    assert_eq!(outcome.chapters_committed, 0);
    assert_eq!(outcome.highest_completed, Some(2));

    let after = store.get("caught-up").await.unwrap().unwrap();
    assert_eq!(after.highest_completed_sequence_number, 2);
    assert!(after.last_attempted_at >= before.last_attempted_at);
    assert_eq!(sink_chapters(&sink, "caught-up"), vec![1, 2]);
}
