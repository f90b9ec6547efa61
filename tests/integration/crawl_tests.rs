//! End-to-end crawl runs against a mock site
//!
//! Each test serves story and chapter pages from wiremock and drives a full
//! coordinator with the SQLite state store and the JSON file sink.

use crate::common::{
    highest, labelled_story_html, mount_chapters, mount_story, mount_story_advertising,
    mount_story_page, sink_chapters, story_url, Fixture,
};
use manga_tracker::config::ChapterBudget;
use manga_tracker::state::{SkipReason, StoryState};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_first_run_commits_chapter_budget() {
    let server = MockServer::start().await;
    mount_story(&server, "dandadan", "Dandadan").await;
    mount_chapters(&server, "dandadan", 5).await;

    let fixture = Fixture::new(&server, vec![story_url(&server, "dandadan")]);
    let store = fixture.sqlite_store();
    let sink = fixture.file_sink();
    let coordinator = fixture.coordinator(store.clone(), sink.clone(), CancellationToken::new());

    let summary = coordinator.run().await;

    assert!(!summary.cancelled);
    assert_eq!(summary.stories_done(), vec!["dandadan"]);
    assert_eq!(summary.chapters_committed(), 3);
    assert_eq!(highest(store.as_ref(), "dandadan").await, Some(3));
    assert_eq!(sink_chapters(&sink, "dandadan"), vec![1, 2, 3]);

    let stories = sink.load().unwrap();
    let story = &stories["dandadan"];
    assert_eq!(story.title.as_deref(), Some("Dandadan"));
    assert_eq!(story.author.as_deref(), Some("Someone"));
    assert_eq!(story.chapters[0].display_name, "Chapter 1");
    assert_eq!(
        story.chapters[0].images,
        vec![
            format!("{}/img/dandadan/1/1.jpg", server.uri()),
            format!("{}/img/dandadan/1/2.jpg", server.uri()),
        ]
    );
}

#[tokio::test]
async fn test_site_chapter_names_reach_the_sink() {
    let server = MockServer::start().await;
    mount_story_page(
        &server,
        "vo-luyen",
        labelled_story_html("Võ Luyện", "vo-luyen", &["Chương 1: Khởi đầu", "Chương 2: Trở về"]),
    )
    .await;
    mount_chapters(&server, "vo-luyen", 2).await;

    let fixture = Fixture::new(&server, vec![story_url(&server, "vo-luyen")]);
    let sink = fixture.file_sink();
    let coordinator = fixture.coordinator(fixture.sqlite_store(), sink.clone(), CancellationToken::new());

    let summary = coordinator.run().await;
    assert_eq!(summary.chapters_committed(), 2);

    let stories = sink.load().unwrap();
    let names: Vec<&str> = stories["vo-luyen"]
        .chapters
        .iter()
        .map(|c| c.display_name.as_str())
        .collect();
    assert_eq!(names, vec!["Chương 1: Khởi đầu", "Chương 2: Trở về"]);
}

#[tokio::test]
async fn test_failing_chapter_keeps_earlier_progress() {
    let server = MockServer::start().await;
    mount_story(&server, "frieren", "Frieren").await;
    mount_chapters(&server, "frieren", 1).await;
    Mock::given(method("GET"))
        .and(path("/truyen/frieren/chapter-2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/truyen/frieren/chapter-3"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(crate::common::chapter_html("frieren", 3)),
        )
        .mount(&server)
        .await;

    let fixture = Fixture::new(&server, vec![story_url(&server, "frieren")]);
    let store = fixture.sqlite_store();
    let sink = fixture.file_sink();
    let coordinator = fixture.coordinator(store.clone(), sink.clone(), CancellationToken::new());

    let summary = coordinator.run().await;

    let outcome = summary.outcome("frieren").unwrap();
    assert_eq!(outcome.state, StoryState::Skipped);
    assert_eq!(outcome.skip_reason, Some(SkipReason::FetchFailed));
    assert_eq!(outcome.chapters_committed, 1);
    assert_eq!(highest(store.as_ref(), "frieren").await, Some(1));
    assert_eq!(sink_chapters(&sink, "frieren"), vec![1]);
}

#[tokio::test]
async fn test_story_budget_is_respected() {
    let server = MockServer::start().await;
    for slug in ["a", "b"] {
        mount_story(&server, slug, slug).await;
        mount_chapters(&server, slug, 1).await;
    }
    Mock::given(method("GET"))
        .and(path("/truyen/c"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut fixture = Fixture::new(
        &server,
        vec![
            story_url(&server, "a"),
            story_url(&server, "b"),
            story_url(&server, "c"),
        ],
    );
    fixture.config.crawler.max_stories_per_run = 2;
    let store = fixture.sqlite_store();
    let coordinator = fixture.coordinator(store.clone(), fixture.file_sink(), CancellationToken::new());

    let summary = coordinator.run().await;

    assert_eq!(summary.stories_touched(), 2);
    assert_eq!(summary.stories_done(), vec!["a", "b"]);
    assert!(store.get("c").await.unwrap().is_none());
}

#[tokio::test]
async fn test_advertised_latest_chapter_caps_the_plan() {
    let server = MockServer::start().await;
    mount_story_advertising(&server, "blame", "Blame!", 2).await;
    mount_chapters(&server, "blame", 2).await;
    Mock::given(method("GET"))
        .and(path("/truyen/blame/chapter-3"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut fixture = Fixture::new(&server, vec![story_url(&server, "blame")]);
    fixture.config.crawler.max_chapters_per_story_per_run = ChapterBudget::Unbounded;
    let store = fixture.sqlite_store();
    let coordinator = fixture.coordinator(store.clone(), fixture.file_sink(), CancellationToken::new());

    let summary = coordinator.run().await;

    assert_eq!(summary.stories_done(), vec!["blame"]);
    assert_eq!(highest(store.as_ref(), "blame").await, Some(2));
}

#[tokio::test]
async fn test_chapter_without_images_ends_the_story() {
    let server = MockServer::start().await;
    mount_story(&server, "vinland", "Vinland Saga").await;
    mount_chapters(&server, "vinland", 1).await;
    Mock::given(method("GET"))
        .and(path("/truyen/vinland/chapter-2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><body><p>Truyện đang cập nhật</p></body></html>",
        ))
        .mount(&server)
        .await;

    let fixture = Fixture::new(&server, vec![story_url(&server, "vinland")]);
    let store = fixture.sqlite_store();
    let coordinator = fixture.coordinator(store.clone(), fixture.file_sink(), CancellationToken::new());

    let summary = coordinator.run().await;

    let outcome = summary.outcome("vinland").unwrap();
    assert!(outcome.is_done());
    assert_eq!(outcome.chapters_committed, 1);
    assert_eq!(highest(store.as_ref(), "vinland").await, Some(1));
}

#[tokio::test]
async fn test_missing_story_page_is_skipped_and_run_continues() {
    let server = MockServer::start().await;
    mount_story(&server, "present", "Present").await;
    mount_chapters(&server, "present", 1).await;

    let fixture = Fixture::new(
        &server,
        vec![story_url(&server, "missing"), story_url(&server, "present")],
    );
    let store = fixture.sqlite_store();
    let coordinator = fixture.coordinator(store.clone(), fixture.file_sink(), CancellationToken::new());

    let summary = coordinator.run().await;

    assert_eq!(
        summary.stories_skipped(),
        vec![("missing", SkipReason::DiscoveryFailed)]
    );
    assert_eq!(summary.stories_done(), vec!["present"]);
    assert!(store.get("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_stories_discovered_from_listing_page() {
    let server = MockServer::start().await;
    let listing = r#"<html><body>
        <div class="item"><a href="/truyen/one">One</a></div>
        <div class="item"><a href="/truyen/two?ref=home">Two</a></div>
    </body></html>"#;
    Mock::given(method("GET"))
        .and(path("/danh-sach"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing))
        .expect(1)
        .mount(&server)
        .await;
    for slug in ["one", "two"] {
        mount_story(&server, slug, slug).await;
        mount_chapters(&server, slug, 1).await;
    }

    let fixture = Fixture::new(&server, Vec::new());
    let store = fixture.sqlite_store();
    let coordinator = fixture.coordinator(store.clone(), fixture.file_sink(), CancellationToken::new());

    let summary = coordinator.run().await;

    assert_eq!(summary.stories_done(), vec!["one", "two"]);
    assert_eq!(highest(store.as_ref(), "two").await, Some(1));
}

#[tokio::test]
async fn test_zero_chapter_budget_fetches_no_chapters() {
    let server = MockServer::start().await;
    mount_story(&server, "idle", "Idle").await;
    Mock::given(method("GET"))
        .and(path("/truyen/idle/chapter-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut fixture = Fixture::new(&server, vec![story_url(&server, "idle")]);
    fixture.config.crawler.max_chapters_per_story_per_run = ChapterBudget::Limited(0);
    let store = fixture.sqlite_store();
    let coordinator = fixture.coordinator(store.clone(), fixture.file_sink(), CancellationToken::new());

    let summary = coordinator.run().await;

    assert_eq!(summary.stories_done(), vec!["idle"]);
    assert_eq!(summary.chapters_committed(), 0);
    assert!(store.get("idle").await.unwrap().is_none());
}

#[tokio::test]
async fn test_cancelled_before_start_does_nothing() {
    let server = MockServer::start().await;
    mount_story(&server, "never", "Never").await;
    mount_chapters(&server, "never", 3).await;

    let fixture = Fixture::new(&server, vec![story_url(&server, "never")]);
    let store = fixture.sqlite_store();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let coordinator = fixture.coordinator(store.clone(), fixture.file_sink(), cancel);

    let summary = coordinator.run().await;

    assert!(summary.cancelled);
    assert_eq!(summary.stories_touched(), 0);
    assert!(store.get("never").await.unwrap().is_none());
    assert!(!fixture.sink_path().exists());
}

#[tokio::test]
async fn test_cancel_during_fetch_keeps_committed_prefix() {
    let server = MockServer::start().await;
    mount_story(&server, "slow", "Slow").await;
    mount_chapters(&server, "slow", 1).await;
    Mock::given(method("GET"))
        .and(path("/truyen/slow/chapter-2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(crate::common::chapter_html("slow", 2))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let mut fixture = Fixture::new(
        &server,
        vec![story_url(&server, "slow"), story_url(&server, "after")],
    );
    fixture.config.crawler.request_timeout_ms = 30_000;
    let store = fixture.sqlite_store();
    let sink = fixture.file_sink();
    let cancel = CancellationToken::new();
    let coordinator = fixture.coordinator(store.clone(), sink.clone(), cancel.clone());

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        cancel.cancel();
    });

    let started = std::time::Instant::now();
    let summary = coordinator.run().await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(summary.cancelled);
    assert_eq!(summary.stories_touched(), 1);
    assert_eq!(
        summary.stories_skipped(),
        vec![("slow", SkipReason::Cancelled)]
    );
    assert_eq!(highest(store.as_ref(), "slow").await, Some(1));
    assert_eq!(sink_chapters(&sink, "slow"), vec![1]);
}

#[tokio::test]
async fn test_tracked_run_records_history_and_report() {
    let server = MockServer::start().await;
    mount_story(&server, "kaiju", "Kaiju No. 8").await;
    mount_chapters(&server, "kaiju", 2).await;

    let mut fixture = Fixture::new(&server, vec![story_url(&server, "kaiju")]);
    let report = fixture.dir.path().join("report.md");
    fixture.config.output.summary_path = Some(report.to_string_lossy().into_owned());
    let store = fixture.sqlite_store();
    let coordinator = fixture.coordinator(store.clone(), fixture.file_sink(), CancellationToken::new());

    let summary = coordinator.run_tracked("cafe").await.unwrap();
    assert_eq!(summary.chapters_committed(), 2);

    let run = store.latest_run().await.unwrap().unwrap();
    assert_eq!(run.config_hash, "cafe");
    assert_eq!(run.stories_done, 1);
    assert_eq!(run.chapters_committed, 2);
    assert!(run.finished_at.is_some());

    let markdown = std::fs::read_to_string(&report).unwrap();
    assert!(markdown.contains(&format!("- **Run ID**: {}", run.id)));
    assert!(markdown.contains("| kaiju | done | 2 | 2 |"));
}
