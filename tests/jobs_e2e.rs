// tests/jobs_e2e.rs
//
// Job pipelines end to end through the JobRouter, with scripted capability
// stubs, a manual clock and a recording sleeper. No network, no real sleeps.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};

use social_autopilot::bootstrap;
use social_autopilot::capabilities::mock::{StubAction, StubDecision, StubFailure, StubScraper};
use social_autopilot::capabilities::PostRef;
use social_autopilot::clock::ManualClock;
use social_autopilot::config::AutopilotConfig;
use social_autopilot::jobs::Capabilities;
use social_autopilot::retry::RecordingSleeper;
use social_autopilot::store::MemoryStore;
use social_autopilot::{JobOutcome, JobRouter};

struct Harness {
    router: JobRouter,
    action: Arc<StubAction>,
    decision: Arc<StubDecision>,
    scraper: Arc<StubScraper>,
    clock: Arc<ManualClock>,
    sleeper: Arc<RecordingSleeper>,
}

fn harness_with(
    action: StubAction,
    decision: StubDecision,
    scraper: StubScraper,
    tweak: impl FnOnce(&mut AutopilotConfig),
) -> Harness {
    let mut cfg = AutopilotConfig::default();
    cfg.x.user_id = "me".into();
    cfg.topics.focus = vec!["AI Agents".into(), "Crypto".into()];
    tweak(&mut cfg);

    let action = Arc::new(action);
    let decision = Arc::new(decision);
    let scraper = Arc::new(scraper);
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 3, 1, 22, 0, 0).unwrap(),
    ));
    let sleeper = Arc::new(RecordingSleeper::new());

    let caps = Capabilities {
        action: action.clone(),
        decision: decision.clone(),
        scraper: scraper.clone(),
    };
    let router = bootstrap::assemble(
        &cfg,
        caps,
        Arc::new(MemoryStore::new()),
        clock.clone(),
        sleeper.clone(),
    )
    .expect("assemble router");

    Harness {
        router,
        action,
        decision,
        scraper,
        clock,
        sleeper,
    }
}

fn harness(action: StubAction) -> Harness {
    harness_with(
        action,
        StubDecision::canned(),
        StubScraper::returning(Vec::<String>::new()),
        |_| {},
    )
}

fn post_ref(id: &str, author_id: &str, text: &str) -> PostRef {
    PostRef {
        id: id.into(),
        text: text.into(),
        author_id: author_id.into(),
        author_handle: Some(format!("{author_id}_handle")),
    }
}

#[tokio::test]
async fn unknown_job_fails_without_touching_capabilities() {
    let h = harness(StubAction::new());
    let res = h.router.route("unknown-job").await;

    assert_eq!(res.outcome, JobOutcome::Failed);
    assert!(res.detail.contains("unknown job"), "{}", res.detail);
    assert!(h.action.calls().is_empty());
    assert!(h.decision.prompts().is_empty());
    assert!(h.scraper.urls().is_empty());
}

#[tokio::test]
async fn legacy_trigger_name_routes_to_canonical_job() {
    let h = harness(StubAction::new());
    let res = h.router.route("tweetEvery3Hours").await;
    assert_eq!(res.job, "periodic-post");
    assert_eq!(res.outcome, JobOutcome::Success);
}

#[tokio::test]
async fn scrape_and_post_skips_when_every_headline_was_used() {
    let h = harness_with(
        StubAction::new(),
        StubDecision::canned(),
        StubScraper::returning(["Headline A", "Headline B"]),
        |_| {},
    );

    let first = h.router.route("scrape-and-post").await;
    assert_eq!(first.outcome, JobOutcome::Success, "{}", first.detail);
    assert_eq!(h.action.calls_of("post").len(), 1);

    let second = h.router.route("scrape-and-post").await;
    assert_eq!(second.outcome, JobOutcome::Skipped);
    assert_eq!(second.detail, "no new content");
    assert_eq!(h.action.calls_of("post").len(), 1, "no post on skip");
    assert_eq!(h.decision.prompts().len(), 1, "no generation on skip");
}

#[tokio::test]
async fn scrape_and_post_only_feeds_new_headlines() {
    let h = harness_with(
        StubAction::new(),
        StubDecision::canned(),
        StubScraper::returning(["Headline A", "  headline a ", "Headline B"]),
        |c| c.scrape.max_headlines = 1,
    );

    let first = h.router.route("scrape-and-post").await;
    assert_eq!(first.outcome, JobOutcome::Success);
    assert!(h.decision.prompts()[0].contains("Headline A"));
    assert!(!h.decision.prompts()[0].contains("Headline B"));

    // A was used; B is still new.
    let second = h.router.route("scrape-and-post").await;
    assert_eq!(second.outcome, JobOutcome::Success);
    let prompt = h.decision.prompts().pop().unwrap();
    assert!(prompt.contains("Headline B"));
    assert!(!prompt.contains("Headline A"));
}

#[tokio::test]
async fn scrape_failure_is_a_failed_job() {
    let h = harness_with(
        StubAction::new(),
        StubDecision::canned(),
        StubScraper::failing(StubFailure::Failed("timeout".into())),
        |_| {},
    );
    let res = h.router.route("scrape-and-post").await;
    assert_eq!(res.outcome, JobOutcome::Failed);
    assert!(res.detail.contains("scrape failed"), "{}", res.detail);
    assert!(h.action.calls().is_empty());
}

#[tokio::test]
async fn periodic_post_respects_daily_quota_and_resets_after_a_day() {
    let h = harness_with(
        StubAction::new(),
        StubDecision::canned(),
        StubScraper::returning(Vec::<String>::new()),
        |c| c.quota.daily_post_limit = 2,
    );

    assert_eq!(h.router.route("periodic-post").await.outcome, JobOutcome::Success);
    assert_eq!(h.router.route("periodic-post").await.outcome, JobOutcome::Success);
    let third = h.router.route("periodic-post").await;
    assert_eq!(third.outcome, JobOutcome::Skipped);
    assert_eq!(third.detail, "quota exhausted");
    assert_eq!(h.action.calls_of("post").len(), 2);

    h.clock.advance(ChronoDuration::hours(25));
    assert_eq!(h.router.route("periodic-post").await.outcome, JobOutcome::Success);
    let snap = h.router.dispatcher().gates().quota.snapshot().await.unwrap();
    assert_eq!(snap.count, 1);
}

#[tokio::test]
async fn periodic_post_rides_out_transient_rate_limits() {
    let h = harness(StubAction::new().fail_next("post", StubFailure::RateLimited(None), 2));
    let res = h.router.route("periodic-post").await;

    assert_eq!(res.outcome, JobOutcome::Success, "{}", res.detail);
    assert_eq!(h.action.calls_of("post").len(), 3);
    assert_eq!(h.sleeper.waits().len(), 2);
}

#[tokio::test]
async fn periodic_post_reports_exhausted_rate_limit() {
    let h = harness(StubAction::new().fail_always("post", StubFailure::RateLimited(None)));
    let res = h.router.route("periodic-post").await;

    assert_eq!(res.outcome, JobOutcome::Failed);
    assert_eq!(res.detail, "rate limit exceeded for post after 3 attempts");
    assert_eq!(h.action.calls_of("post").len(), 3);
    assert_eq!(h.sleeper.waits().len(), 2);
}

#[tokio::test]
async fn one_failed_mention_reply_does_not_stop_the_others() {
    let mentions = vec![
        post_ref("m1", "u1", "hello bot"),
        post_ref("m2", "u2", "what about crypto?"),
        post_ref("m3", "u3", "nice post"),
    ];
    let h = harness(
        StubAction::new()
            .with_mentions(mentions)
            .fail_next("reply", StubFailure::Failed("boom".into()), 1),
    );

    let res = h.router.route("reply-to-mentions").await;
    assert_eq!(res.outcome, JobOutcome::Success);
    assert!(res.detail.contains("2/3 replies succeeded"), "{}", res.detail);
    assert!(res.detail.contains("m1 (reply)"), "{}", res.detail);
    assert_eq!(h.action.calls_of("reply").len(), 3);

    let throttled = h.router.route("reply-to-mentions").await;
    assert_eq!(throttled.outcome, JobOutcome::Skipped);
    assert_eq!(throttled.detail, "throttle active");

    // Next window: only the mention whose reply failed is tried again.
    h.clock.advance(ChronoDuration::minutes(11));
    let again = h.router.route("reply-to-mentions").await;
    assert_eq!(again.outcome, JobOutcome::Success);
    assert!(again.detail.contains("2 already answered"), "{}", again.detail);
    let replies = h.action.calls_of("reply");
    assert_eq!(replies.len(), 4);
    assert!(replies[3].starts_with("m1:"));
}

#[tokio::test]
async fn mention_fetch_failure_fails_the_job() {
    let h = harness(StubAction::new().fail_always("get_mentions", StubFailure::Failed("401".into())));
    let res = h.router.route("reply-to-mentions").await;
    assert_eq!(res.outcome, JobOutcome::Failed);
    assert!(h.action.calls_of("reply").is_empty());
}

#[tokio::test]
async fn monitor_trends_posts_only_relevant_trends() {
    let h = harness(StubAction::new().with_trends(["AI Agents Rising", "Sports News"]));
    let res = h.router.route("monitor-trends").await;

    assert_eq!(res.outcome, JobOutcome::Success, "{}", res.detail);
    assert_eq!(h.action.calls_of("post").len(), 1);
    let prompt = &h.decision.prompts()[0];
    assert!(prompt.contains("AI Agents Rising"));
    assert!(prompt.contains("'AI Agents'"));
}

#[tokio::test]
async fn monitor_trends_without_matches_is_skipped() {
    let h = harness(StubAction::new().with_trends(["Sports News", "Weather"]));
    let res = h.router.route("monitor-trends").await;
    assert_eq!(res.outcome, JobOutcome::Skipped);
    assert_eq!(res.detail, "no relevant trends");
    assert!(h.decision.prompts().is_empty());
}

#[tokio::test]
async fn follower_analysis_returns_summary_without_platform_calls() {
    let h = harness_with(
        StubAction::new(),
        StubDecision::replying("Followers up 3% this week."),
        StubScraper::returning(Vec::<String>::new()),
        |_| {},
    );
    let res = h.router.route("daily-follower-analysis").await;
    assert_eq!(res.outcome, JobOutcome::Success);
    assert_eq!(res.detail, "Followers up 3% this week.");
    assert!(h.action.calls().is_empty());
}

#[tokio::test]
async fn post_poll_runs_once_per_calendar_day() {
    let h = harness(StubAction::new());

    let first = h.router.route("post-poll").await;
    assert_eq!(first.outcome, JobOutcome::Success, "{}", first.detail);
    let second = h.router.route("post-poll").await;
    assert_eq!(second.outcome, JobOutcome::Skipped);
    assert_eq!(second.detail, "already ran today");
    assert_eq!(h.action.calls_of("post_poll").len(), 1);
    assert!(h.action.calls_of("post_poll")[0].contains("[Bitcoin|Ethereum|Dogecoin|Other]"));

    // 22:00 + 2h crosses midnight UTC.
    h.clock.advance(ChronoDuration::hours(2));
    assert_eq!(h.router.route("post-poll").await.outcome, JobOutcome::Success);
}

#[tokio::test]
async fn malformed_poll_output_fails_without_posting() {
    let h = harness_with(
        StubAction::new(),
        StubDecision::replying("Sure! Here is a poll about crypto."),
        StubScraper::returning(Vec::<String>::new()),
        |_| {},
    );
    let res = h.router.route("post-poll").await;
    assert_eq!(res.outcome, JobOutcome::Failed);
    assert!(res.detail.contains("malformed"), "{}", res.detail);
    assert!(h.action.calls_of("post_poll").is_empty());
}

#[tokio::test]
async fn like_failure_does_not_block_reply() {
    let h = harness(
        StubAction::new()
            .with_trends(["#AI"])
            .with_search_results(
                "#AI",
                vec![
                    post_ref("h1", "someone", "AI agents are everywhere"),
                    post_ref("h2", "me", "my own post"),
                ],
            )
            .fail_always("like", StubFailure::Failed("forbidden".into())),
    );

    let res = h.router.route("search-using-trends").await;
    assert_eq!(res.outcome, JobOutcome::Success);
    assert!(res.detail.contains("1/2 steps succeeded"), "{}", res.detail);
    assert!(res.detail.contains("h1 (like)"), "{}", res.detail);

    assert_eq!(h.action.calls_of("like"), vec!["me:h1".to_string()]);
    let replies = h.action.calls_of("reply");
    assert_eq!(replies.len(), 1);
    assert!(replies[0].starts_with("h1:"));
}

#[tokio::test]
async fn reply_failure_does_not_block_like() {
    let h = harness(
        StubAction::new()
            .with_trends(["#AI", "#Crypto"])
            .with_search_results("#AI", vec![post_ref("h1", "a", "one")])
            .with_search_results("#Crypto", vec![post_ref("h2", "b", "two")])
            .fail_always("reply", StubFailure::Failed("locked".into())),
    );

    let res = h.router.route("search-using-trends").await;
    assert_eq!(res.outcome, JobOutcome::Success);
    assert!(res.detail.contains("2/4 steps succeeded"), "{}", res.detail);
    assert_eq!(h.action.calls_of("like").len(), 2);
    assert_eq!(h.action.calls_of("search"), vec!["#AI".to_string(), "#Crypto".to_string()]);
}

#[tokio::test]
async fn empty_scrape_is_skipped_as_no_new_content() {
    let h = harness_with(
        StubAction::new(),
        StubDecision::canned(),
        StubScraper::returning(Vec::<String>::new()),
        |_| {},
    );
    let res = h.router.route("scrape-and-post").await;
    assert_eq!(res.outcome, JobOutcome::Skipped);
    assert_eq!(res.detail, "no new content");
    assert!(h.decision.prompts().is_empty());
    assert!(h.action.calls_of("post").is_empty());
}

#[tokio::test]
async fn one_failed_trend_post_does_not_stop_the_next() {
    let h = harness(
        StubAction::new()
            .with_trends(["AI Agents Rising", "Crypto Winter"])
            .fail_next("post", StubFailure::Failed("boom".into()), 1),
    );
    let res = h.router.route("monitor-trends").await;

    assert_eq!(res.outcome, JobOutcome::Success, "{}", res.detail);
    assert_eq!(h.action.calls_of("post").len(), 2);
    assert!(res.detail.contains("1/2 trend posts succeeded"), "{}", res.detail);
    assert!(res.detail.contains("AI Agents Rising (post)"), "{}", res.detail);
}
