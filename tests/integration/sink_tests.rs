//! Crawl runs publishing to the story API

use crate::common::{highest, mount_chapters, mount_story, story_url, Fixture};
use manga_tracker::config::{ChapterBudget, SinkKind};
use manga_tracker::sink::open_sink;
use manga_tracker::state::SkipReason;
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_fixture(server: &MockServer, stories: Vec<String>, token_var: &str) -> Fixture {
    let mut fixture = Fixture::new(server, stories);
    fixture.config.sink.kind = SinkKind::Api;
    fixture.config.sink.path = None;
    fixture.config.sink.endpoint = Some(server.uri());
    fixture.config.sink.api_key_env = Some(token_var.to_string());
    fixture.config.crawler.max_chapters_per_story_per_run = ChapterBudget::Limited(2);
    fixture
}

#[tokio::test]
async fn test_run_publishes_new_story_and_chapters() {
    let server = MockServer::start().await;
    mount_story(&server, "sakamoto", "Sakamoto Days").await;
    mount_chapters(&server, "sakamoto", 2).await;

    // First check finds nothing; afterwards the story exists with chapter 1
    Mock::given(method("POST"))
        .and(path("/api/stories/check"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"exists": false})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/stories/check"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "exists": true,
            "storyId": 11,
            "chapters": ["Chapter 1"]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/stories/create"))
        .and(header("authorization", "Bearer sekrit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 11})))
        .expect(1)
        .mount(&server)
        .await;
    for n in 1..=2 {
        Mock::given(method("POST"))
            .and(path("/api/stories/add-chapter"))
            .and(body_json(json!({
                "storyId": 11,
                "chapter": format!("Chapter {}", n),
                "images": [
                    format!("{}/img/sakamoto/{}/1.jpg", server.uri(), n),
                    format!("{}/img/sakamoto/{}/2.jpg", server.uri(), n),
                ]
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
    }

    std::env::set_var("MANGA_TRACKER_TEST_TOKEN_PUBLISH", "sekrit");
    let fixture = api_fixture(
        &server,
        vec![story_url(&server, "sakamoto")],
        "MANGA_TRACKER_TEST_TOKEN_PUBLISH",
    );
    let sink = open_sink(&fixture.config.sink, Duration::from_secs(5)).unwrap();
    assert_eq!(sink.name(), "api");
    let store = fixture.sqlite_store();

    let summary = fixture
        .coordinator(store.clone(), sink, CancellationToken::new())
        .run()
        .await;

    assert_eq!(summary.stories_done(), vec!["sakamoto"]);
    assert_eq!(summary.chapters_committed(), 2);
    assert_eq!(highest(store.as_ref(), "sakamoto").await, Some(2));
}

#[tokio::test]
async fn test_rejecting_api_does_not_advance_progress() {
    let server = MockServer::start().await;
    mount_story(&server, "rejected", "Rejected").await;
    mount_chapters(&server, "rejected", 2).await;
    Mock::given(method("POST"))
        .and(path("/api/stories/check"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    std::env::set_var("MANGA_TRACKER_TEST_TOKEN_REJECT", "sekrit");
    let fixture = api_fixture(
        &server,
        vec![story_url(&server, "rejected")],
        "MANGA_TRACKER_TEST_TOKEN_REJECT",
    );
    let sink = open_sink(&fixture.config.sink, Duration::from_secs(5)).unwrap();
    let store = fixture.sqlite_store();

    let summary = fixture
        .coordinator(store.clone(), sink, CancellationToken::new())
        .run()
        .await;

    assert_eq!(
        summary.stories_skipped(),
        vec![("rejected", SkipReason::CommitFailed)]
    );
    assert_eq!(summary.chapters_committed(), 0);
    assert!(store.get("rejected").await.unwrap().is_none());
}

#[test]
fn test_api_sink_requires_token_variable() {
    let server_uri = "http://127.0.0.1:9";
    let mut config = manga_tracker::config::SinkConfig {
        kind: SinkKind::Api,
        path: None,
        endpoint: Some(server_uri.to_string()),
        api_key_env: Some("MANGA_TRACKER_TEST_TOKEN_NEVER_SET".to_string()),
    };
    assert!(open_sink(&config, Duration::from_secs(1)).is_err());

    config.api_key_env = None;
    assert!(open_sink(&config, Duration::from_secs(1)).is_ok());
}
