// Copyright 2026 threadgrab contributors
// SPDX-License-Identifier: Apache-2.0

//! Extraction job lifecycle against a scripted page.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use threadgrab::PostType;
use threadgrab_runtime::events::{EventReceiver, JobEvent, JobEventKind, ProbeKind};
use threadgrab_runtime::extraction::StrategyKind;
use threadgrab_runtime::renderer::{NavigationResult, RenderContext};
use threadgrab_runtime::{ExtractionConfig, ExtractionError, Extractor, JobStatus};
use tokio::time::Instant;

const ALICE: &str = "https://www.threads.net/@alice/post/AAA111";
const BOB: &str = "https://www.threads.net/@bob/post/BBB222";

type Responder = Box<dyn Fn(&str, u32) -> Vec<String> + Send + Sync>;
type HtmlResponder = Box<dyn Fn(&str) -> String + Send + Sync>;

#[derive(Default)]
struct PageLog {
    navigations: Mutex<Vec<String>>,
    evaluations: AtomicU32,
    stops: AtomicU32,
    closed: AtomicBool,
    /// Evaluation and stop calls in the order they happened.
    journal: Mutex<Vec<&'static str>>,
}

impl PageLog {
    fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }
    fn evaluations(&self) -> u32 {
        self.evaluations.load(Ordering::SeqCst)
    }
    fn stops(&self) -> u32 {
        self.stops.load(Ordering::SeqCst)
    }
    fn journal(&self) -> Vec<&'static str> {
        self.journal.lock().unwrap().clone()
    }
    fn record(&self, entry: &'static str) {
        self.journal.lock().unwrap().push(entry);
    }
}

/// In-memory page. `respond(current_url, n)` supplies the data blocks seen on
/// the n-th evaluation since the last navigation.
struct ScriptedPage {
    log: Arc<PageLog>,
    respond: Responder,
    html: HtmlResponder,
    current: Mutex<String>,
    since_nav: AtomicU32,
    fail_navigation: bool,
    stale_signal: bool,
    eval_delay: Duration,
}

impl ScriptedPage {
    fn new(respond: impl Fn(&str, u32) -> Vec<String> + Send + Sync + 'static) -> Self {
        Self {
            log: Arc::new(PageLog::default()),
            respond: Box::new(respond),
            html: Box::new(|_| String::new()),
            current: Mutex::new("about:blank".to_string()),
            since_nav: AtomicU32::new(0),
            fail_navigation: false,
            stale_signal: false,
            eval_delay: Duration::ZERO,
        }
    }
}

#[async_trait]
impl RenderContext for ScriptedPage {
    async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> Result<NavigationResult> {
        self.log.navigations.lock().unwrap().push(url.to_string());
        if self.fail_navigation && url != "about:blank" {
            bail!("net::ERR_NAME_NOT_RESOLVED");
        }
        let previous = std::mem::replace(&mut *self.current.lock().unwrap(), url.to_string());
        self.since_nav.store(0, Ordering::SeqCst);
        let reported = if self.stale_signal && url != "about:blank" {
            previous
        } else {
            url.to_string()
        };
        Ok(NavigationResult {
            requested_url: reported.clone(),
            final_url: reported,
            status: 200,
            load_time_ms: 1,
        })
    }

    async fn execute_js(&self, _script: &str) -> Result<serde_json::Value> {
        self.log.record("eval start");
        self.log.evaluations.fetch_add(1, Ordering::SeqCst);
        let n = self.since_nav.fetch_add(1, Ordering::SeqCst) + 1;
        let url = self.current.lock().unwrap().clone();
        if !self.eval_delay.is_zero() {
            tokio::time::sleep(self.eval_delay).await;
        }
        self.log.record("eval end");
        Ok(json!((self.respond)(&url, n)))
    }

    async fn get_html(&self) -> Result<String> {
        self.log.evaluations.fetch_add(1, Ordering::SeqCst);
        let url = self.current.lock().unwrap().clone();
        Ok((self.html)(&url))
    }

    async fn stop(&self) -> Result<()> {
        self.log.record("stop");
        self.log.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.log.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn config() -> ExtractionConfig {
    ExtractionConfig {
        poll_interval: Duration::from_millis(500),
        max_attempts: 5,
        overall_timeout: Duration::from_secs(12),
        navigation_timeout: Duration::from_secs(10),
        reset_before_navigate: true,
        strategy: StrategyKind::EmbeddedJson,
    }
}

fn post_block(user: &str, caption: &str) -> String {
    json!({
        "require": [["ScheduledServerJS", "handle", null, [{
            "thread_items": [{ "post": {
                "pk": "3141592653",
                "user": { "username": user, "profile_pic_url": "https://cdn/avatar.jpg" },
                "caption": { "text": caption },
                "video_versions": [{ "url": format!("https://cdn/{user}.mp4") }],
                "image_versions2": { "candidates": [{ "url": "https://cdn/thumb.jpg" }] },
                "video_duration": 4.5
            }}]
        }]]]
    })
    .to_string()
}

fn start(page: ScriptedPage, config: ExtractionConfig) -> (Extractor, Arc<PageLog>) {
    let log = Arc::clone(&page.log);
    (Extractor::new(Box::new(page), config), log)
}

fn drain(rx: &mut EventReceiver) -> Vec<JobEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test(start_paused = true)]
async fn test_found_on_third_tick() {
    let page = ScriptedPage::new(|_, n| {
        if n >= 3 {
            vec![post_block("alice", "sunset")]
        } else {
            vec![]
        }
    });
    let (extractor, log) = start(page, config());
    let mut rx = extractor.subscribe();

    let began = Instant::now();
    let post = extractor.submit(ALICE).await.unwrap();
    assert_eq!(began.elapsed(), Duration::from_millis(1500));

    assert_eq!(post.post_type, PostType::Video);
    assert_eq!(post.author.username.as_deref(), Some("alice"));
    assert_eq!(post.caption.as_deref(), Some("sunset"));
    assert_eq!(post.media.len(), 1);
    assert_eq!(post.media[0].source_url, "https://cdn/alice.mp4");
    assert_eq!(post.media[0].thumbnail_url.as_deref(), Some("https://cdn/thumb.jpg"));
    assert_eq!(post.media[0].duration_seconds, Some(4.5));

    assert_eq!(log.evaluations(), 3);
    assert_eq!(log.stops(), 1);
    assert_eq!(log.navigations(), vec!["about:blank".to_string(), ALICE.to_string()]);

    let kinds: Vec<_> = drain(&mut rx).into_iter().map(|e| e.kind).collect();
    assert!(kinds.contains(&JobEventKind::RenderSignalIgnored {
        url: "about:blank".to_string()
    }));
    assert!(kinds.contains(&JobEventKind::Probed {
        attempt: 3,
        outcome: ProbeKind::Found
    }));
    assert!(kinds.contains(&JobEventKind::StatusChanged {
        from: JobStatus::Polling,
        to: JobStatus::Succeeded
    }));
    assert_eq!(kinds.last(), Some(&JobEventKind::Delivered { ok: true }));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_counts_mismatches() {
    // Another author's post that happens to mention alice.
    let page = ScriptedPage::new(|_, _| vec![post_block("bob", "thanks alice")]);
    let (extractor, log) = start(page, config());

    match extractor.submit(ALICE).await {
        Err(ExtractionError::PollExhausted {
            target,
            attempts,
            mismatches,
        }) => {
            assert_eq!(target, "alice");
            assert_eq!(attempts, 5);
            assert_eq!(mismatches, 5);
        }
        other => panic!("expected PollExhausted, got {other:?}"),
    }
    assert_eq!(log.evaluations(), 5);
    assert_eq!(log.stops(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_beats_attempt_budget() {
    let page = ScriptedPage::new(|_, _| vec![]);
    let cfg = ExtractionConfig {
        max_attempts: 22,
        overall_timeout: Duration::from_millis(1750),
        ..config()
    };
    let (extractor, log) = start(page, cfg);

    let result = extractor.submit(ALICE).await;
    assert!(matches!(
        result,
        Err(ExtractionError::Timeout { after_ms: 1750 })
    ));
    assert_eq!(log.evaluations(), 3);
    assert_eq!(log.stops(), 1);

    // No ticks after the deadline.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(log.evaluations(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_new_submission_supersedes_live_job() {
    let page = ScriptedPage::new(|url, _| {
        if url.contains("/@bob/") {
            vec![post_block("bob", "second")]
        } else {
            vec![]
        }
    });
    let (extractor, log) = start(page, config());
    let mut rx = extractor.subscribe();

    let first_called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&first_called);
    let first = extractor
        .submit_with(
            ALICE,
            Box::new(move |_| flag.store(true, Ordering::SeqCst)),
        )
        .unwrap();
    let first_id = first.id().to_string();

    tokio::time::sleep(Duration::from_millis(1200)).await;
    let post = extractor.submit(BOB).await.unwrap();
    assert_eq!(post.author.username.as_deref(), Some("bob"));

    assert_eq!(first.wait().await, JobStatus::Cancelled);
    assert!(!first_called.load(Ordering::SeqCst));
    assert_eq!(log.stops(), 2);
    assert_eq!(
        log.navigations(),
        vec!["about:blank", ALICE, "about:blank", BOB]
    );

    let first_events: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter(|e| e.job_id == first_id)
        .map(|e| e.kind)
        .collect();
    assert!(first_events.contains(&JobEventKind::StatusChanged {
        from: JobStatus::Polling,
        to: JobStatus::Cancelled
    }));
    assert!(!first_events
        .iter()
        .any(|k| matches!(k, JobEventKind::Delivered { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_superseded_awaiter_sees_cancelled() {
    let page = ScriptedPage::new(|url, _| {
        if url.contains("/@bob/") {
            vec![post_block("bob", "second")]
        } else {
            vec![]
        }
    });
    let (extractor, _log) = start(page, config());
    let extractor = Arc::new(extractor);

    let waiting = {
        let extractor = Arc::clone(&extractor);
        tokio::spawn(async move { extractor.submit(ALICE).await })
    };
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(extractor.submit(BOB).await.is_ok());
    assert!(matches!(
        waiting.await.unwrap(),
        Err(ExtractionError::Cancelled)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_page_without_delivery() {
    let page = ScriptedPage::new(|_, _| vec![]);
    let (extractor, log) = start(page, config());

    let called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&called);
    let handle = extractor
        .submit_with(ALICE, Box::new(move |_| flag.store(true, Ordering::SeqCst)))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(800)).await;
    assert!(extractor.cancel());
    assert_eq!(handle.wait().await, JobStatus::Cancelled);
    assert!(!called.load(Ordering::SeqCst));
    assert_eq!(log.evaluations(), 1);
    assert_eq!(log.stops(), 1);
    assert!(!extractor.cancel());
}

#[tokio::test(start_paused = true)]
async fn test_navigation_failure_is_not_retried() {
    let mut page = ScriptedPage::new(|_, _| vec![post_block("alice", "x")]);
    page.fail_navigation = true;
    let (extractor, log) = start(page, config());

    match extractor.submit(ALICE).await {
        Err(ExtractionError::NavigationFailed { url, reason }) => {
            assert_eq!(url, ALICE);
            assert!(reason.contains("ERR_NAME_NOT_RESOLVED"));
        }
        other => panic!("expected NavigationFailed, got {other:?}"),
    }
    assert_eq!(log.evaluations(), 0);
    assert_eq!(log.stops(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stale_render_signal_fails_job() {
    let mut page = ScriptedPage::new(|_, _| vec![post_block("alice", "x")]);
    page.stale_signal = true;
    let cfg = ExtractionConfig {
        reset_before_navigate: false,
        ..config()
    };
    let (extractor, log) = start(page, cfg);
    let mut rx = extractor.subscribe();

    let err = extractor.submit(ALICE).await.unwrap_err();
    assert_eq!(err.kind(), "navigation_failed");
    assert_eq!(log.evaluations(), 0);
    assert_eq!(log.navigations(), vec![ALICE.to_string()]);
    assert!(drain(&mut rx).iter().any(|e| e.kind
        == JobEventKind::RenderSignalIgnored {
            url: "about:blank".to_string()
        }));
}

#[tokio::test(start_paused = true)]
async fn test_undecodable_post_is_malformed_input() {
    let page = ScriptedPage::new(|_, _| {
        vec![json!({ "thread_items": [{ "post": {
            "pk": 1,
            "user": { "username": "alice" },
            "caption": null,
            "video_versions": "not-a-list"
        }}]})
        .to_string()]
    });
    let (extractor, log) = start(page, config());

    let err = extractor.submit(ALICE).await.unwrap_err();
    assert!(matches!(err, ExtractionError::MalformedInput(_)));
    assert_eq!(log.evaluations(), 1);
    assert_eq!(log.stops(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_target_never_navigates() {
    let page = ScriptedPage::new(|_, _| vec![]);
    let (extractor, log) = start(page, config());

    let err = extractor.submit("https://example.com/@alice/post/1").await.unwrap_err();
    assert!(matches!(err, ExtractionError::InvalidTarget(_)));
    assert!(log.navigations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_page() {
    let page = ScriptedPage::new(|_, n| {
        if n >= 1 {
            vec![post_block("alice", "x")]
        } else {
            vec![]
        }
    });
    let (extractor, log) = start(page, config());

    assert!(extractor.submit(ALICE).await.is_ok());
    extractor.shutdown().await.unwrap();
    assert!(log.closed.load(Ordering::SeqCst));

    let err = extractor.submit(ALICE).await.unwrap_err();
    assert!(matches!(err, ExtractionError::NavigationFailed { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_waits_for_running_evaluation_before_stop() {
    let mut page = ScriptedPage::new(|_, _| vec![post_block("alice", "late")]);
    page.eval_delay = Duration::from_millis(300);
    let (extractor, log) = start(page, config());

    let called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&called);
    let handle = extractor
        .submit_with(ALICE, Box::new(move |_| flag.store(true, Ordering::SeqCst)))
        .unwrap();

    // First tick at 500ms; its evaluation runs until 800ms.
    tokio::time::sleep(Duration::from_millis(650)).await;
    assert!(extractor.cancel());
    assert_eq!(handle.wait().await, JobStatus::Cancelled);

    assert!(!called.load(Ordering::SeqCst));
    assert_eq!(log.journal(), vec!["eval start", "eval end", "stop"]);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_during_evaluation_discards_late_result() {
    let mut page = ScriptedPage::new(|_, _| vec![post_block("alice", "too late")]);
    page.eval_delay = Duration::from_millis(300);
    let cfg = ExtractionConfig {
        overall_timeout: Duration::from_millis(650),
        ..config()
    };
    let (extractor, log) = start(page, cfg);

    let began = Instant::now();
    let result = extractor.submit(ALICE).await;
    assert!(matches!(
        result,
        Err(ExtractionError::Timeout { after_ms: 650 })
    ));
    // Resolved once the running evaluation settled, not at the deadline.
    assert_eq!(began.elapsed(), Duration::from_millis(800));
    assert_eq!(log.journal(), vec!["eval start", "eval end", "stop"]);
    assert_eq!(log.evaluations(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_immediate_resubmission_cancels_idle_job() {
    let page = ScriptedPage::new(|url, _| {
        if url.contains("/@bob/") {
            vec![post_block("bob", "second")]
        } else {
            vec![]
        }
    });
    let (extractor, log) = start(page, config());
    let mut rx = extractor.subscribe();

    let first_called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&first_called);
    let first = extractor
        .submit_with(ALICE, Box::new(move |_| flag.store(true, Ordering::SeqCst)))
        .unwrap();
    let first_id = first.id().to_string();

    let post = extractor.submit(BOB).await.unwrap();
    assert_eq!(post.author.username.as_deref(), Some("bob"));

    assert_eq!(first.wait().await, JobStatus::Cancelled);
    assert!(!first_called.load(Ordering::SeqCst));
    assert_eq!(log.navigations(), vec!["about:blank", BOB]);
    assert_eq!(log.stops(), 1);

    let first_events: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter(|e| e.job_id == first_id)
        .map(|e| e.kind)
        .collect();
    assert!(first_events.contains(&JobEventKind::StatusChanged {
        from: JobStatus::Idle,
        to: JobStatus::Cancelled
    }));
    assert!(!first_events
        .iter()
        .any(|k| matches!(k, JobEventKind::Probed { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_rendered_dom_strategy_finds_video() {
    let mut page = ScriptedPage::new(|_, _| vec![]);
    page.html = Box::new(|url| {
        if url == ALICE {
            r#"<html><head><meta property="og:description" content="sunset"></head>
            <body><a href="/@alice">alice</a>
            <video src="https://cdn/rendered.mp4" poster="https://cdn/poster.jpg"></video>
            </body></html>"#
                .to_string()
        } else {
            String::new()
        }
    });
    let cfg = ExtractionConfig {
        strategy: StrategyKind::RenderedDom,
        ..config()
    };
    let (extractor, log) = start(page, cfg);

    let post = extractor.submit(ALICE).await.unwrap();
    assert_eq!(post.post_type, PostType::Video);
    assert_eq!(post.author.username.as_deref(), Some("alice"));
    assert_eq!(post.caption.as_deref(), Some("sunset"));
    assert_eq!(post.media.len(), 1);
    assert_eq!(post.media[0].source_url, "https://cdn/rendered.mp4");
    assert_eq!(post.media[0].thumbnail_url.as_deref(), Some("https://cdn/poster.jpg"));
    assert_eq!(log.evaluations(), 1);
    // The script-evaluation path is never used by this strategy.
    assert!(log.journal().iter().all(|entry| *entry == "stop"));
}

#[tokio::test(start_paused = true)]
async fn test_rendered_dom_other_author_exhausts_with_mismatches() {
    let mut page = ScriptedPage::new(|_, _| vec![]);
    page.html = Box::new(|_| {
        r#"<p>reply to alice</p><a href="/@bob">bob</a><video src="https://cdn/bob.mp4"></video>"#
            .to_string()
    });
    let cfg = ExtractionConfig {
        strategy: StrategyKind::RenderedDom,
        max_attempts: 3,
        ..config()
    };
    let (extractor, _log) = start(page, cfg);

    match extractor.submit(ALICE).await {
        Err(ExtractionError::PollExhausted { mismatches, .. }) => assert_eq!(mismatches, 3),
        other => panic!("expected PollExhausted, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_panicked_job_task_reports_failed() {
    let page = ScriptedPage::new(|_, _| vec![post_block("alice", "x")]);
    let (extractor, _log) = start(page, config());

    let handle = extractor
        .submit_with(ALICE, Box::new(|_| panic!("callback blew up")))
        .unwrap();
    assert_eq!(handle.wait().await, JobStatus::Failed);

    // The page was released before delivery, so the next job still runs.
    assert!(extractor.submit(ALICE).await.is_ok());
}
