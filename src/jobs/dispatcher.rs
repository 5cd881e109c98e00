// src/jobs/dispatcher.rs
//! One pipeline per job: gates first, then capability calls through the
//! retrier, then relevance/dedup where the job needs them.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::{Completion, ItemOutcomes, JobName};
use crate::capabilities::{ActionCapability, DecisionCapability, PostId, PostRef, ScrapeCapability};
use crate::config::AutopilotConfig;
use crate::dedup::DedupTracker;
use crate::error::{JobError, SkipReason};
use crate::gates::{DailyGate, QuotaTracker, ThrottleGate};
use crate::parse::{normalize_headline, parse_poll, parse_post_text};
use crate::relevance::TrendRelevanceFilter;
use crate::retry::RateLimitRetrier;
use crate::topics::TopicTiers;

const FALLBACK_TOPIC: &str = "technology";

pub struct Capabilities {
    pub action: Arc<dyn ActionCapability>,
    pub decision: Arc<dyn DecisionCapability>,
    pub scraper: Arc<dyn ScrapeCapability>,
}

pub struct GateSet {
    pub quota: QuotaTracker,
    pub mention_throttle: ThrottleGate,
    pub poll_gate: DailyGate,
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub tiers: TopicTiers,
    pub focus_topics: Vec<String>,
    pub scrape_url: String,
    pub max_headlines: usize,
    pub results_per_trend: usize,
    /// The bot's own account id; likes are made as this user.
    pub account_user_id: String,
    pub poll_question: String,
    pub poll_options: Vec<String>,
    pub poll_duration_minutes: u32,
    pub mention_interval: Duration,
}

impl DispatchSettings {
    pub fn from_config(cfg: &AutopilotConfig) -> Self {
        Self {
            tiers: TopicTiers {
                prioritized: cfg.topics.prioritized.clone(),
                general: cfg.topics.general.clone(),
            },
            focus_topics: cfg.topics.focus.clone(),
            scrape_url: cfg.scrape.url.clone(),
            max_headlines: cfg.scrape.max_headlines.max(1),
            results_per_trend: cfg.search.results_per_trend as usize,
            account_user_id: cfg.x.user_id.clone(),
            poll_question: cfg.poll.question.clone(),
            poll_options: cfg.poll.options.clone(),
            poll_duration_minutes: cfg.poll.duration_minutes,
            mention_interval: cfg.mention_interval(),
        }
    }
}

pub struct ActionDispatcher {
    caps: Capabilities,
    gates: GateSet,
    settings: DispatchSettings,
    retrier: RateLimitRetrier,
    relevance: TrendRelevanceFilter,
    headlines: DedupTracker,
    replied_mentions: DedupTracker,
}

impl ActionDispatcher {
    pub fn new(
        caps: Capabilities,
        gates: GateSet,
        settings: DispatchSettings,
        retrier: RateLimitRetrier,
        headlines: DedupTracker,
        replied_mentions: DedupTracker,
    ) -> Self {
        let relevance = TrendRelevanceFilter::new(&settings.focus_topics);
        Self {
            caps,
            gates,
            settings,
            retrier,
            relevance,
            headlines,
            replied_mentions,
        }
    }

    pub fn gates(&self) -> &GateSet {
        &self.gates
    }

    pub fn headlines(&self) -> &DedupTracker {
        &self.headlines
    }

    pub async fn dispatch(&self, job: JobName) -> Result<Completion, JobError> {
        match job {
            JobName::PeriodicPost => self.periodic_post().await,
            JobName::ReplyToMentions => self.reply_to_mentions().await,
            JobName::MonitorTrends => self.monitor_trends().await,
            JobName::DailyFollowerAnalysis => self.daily_follower_analysis().await,
            JobName::PostPoll => self.post_poll().await,
            JobName::SearchUsingTrends => self.search_using_trends().await,
            JobName::ScrapeAndPost => self.scrape_and_post().await,
        }
    }

    // ---- building blocks -------------------------------------------------

    /// Generate, then parse into a postable text.
    pub async fn generate_post(&self, call: &str, prompt: &str) -> Result<String, JobError> {
        let raw = self
            .retrier
            .invoke(call, || self.caps.decision.generate(prompt))
            .await?;
        parse_post_text(call, &raw)
    }

    /// Scrape `url` and return the normalised headlines, without dedup or posting.
    pub async fn preview_scrape(&self, url: &str) -> Result<Vec<String>, JobError> {
        let scraped = self
            .retrier
            .invoke("scrape", || self.caps.scraper.scrape(url))
            .await?;
        Ok(scraped
            .iter()
            .map(|h| normalize_headline(h))
            .filter(|h| !h.is_empty())
            .collect())
    }

    pub async fn recent_mentions(&self) -> Result<Vec<PostRef>, JobError> {
        self.retrier
            .invoke("get_mentions", || self.caps.action.get_mentions())
            .await
    }

    pub async fn trending(&self) -> Result<Vec<String>, JobError> {
        self.fetch_trends().await
    }

    async fn post_text(&self, text: &str) -> Result<PostId, JobError> {
        self.retrier
            .invoke("post", || self.caps.action.post(text))
            .await
    }

    async fn reply_to(&self, target: &PostRef, prompt: &str) -> Result<PostId, JobError> {
        let text = self.generate_post("generate_reply", prompt).await?;
        self.retrier
            .invoke("reply", || self.caps.action.reply(&text, &target.id))
            .await
    }

    async fn fetch_trends(&self) -> Result<Vec<String>, JobError> {
        let trends = self
            .retrier
            .invoke("get_trends", || self.caps.action.get_trends())
            .await?;
        Ok(trends
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect())
    }

    // ---- pipelines -------------------------------------------------------

    async fn periodic_post(&self) -> Result<Completion, JobError> {
        if !self.gates.quota.allow().await.map_err(JobError::State)? {
            return Ok(Completion::Skipped(SkipReason::QuotaExhausted));
        }
        let topic = {
            let mut rng = rand::rng();
            self.settings
                .tiers
                .pick(&mut rng)
                .unwrap_or(FALLBACK_TOPIC)
                .to_string()
        };

        let prompt = format!(
            "Write a creative post about {topic} and add emoji to express your sentiment."
        );
        let text = self.generate_post("generate", &prompt).await?;
        let id = self.post_text(&text).await?;
        info!(target: "jobs", %topic, post_id = %id, "periodic post published");
        Ok(Completion::Done(format!("posted {id} about {topic}")))
    }

    async fn reply_to_mentions(&self) -> Result<Completion, JobError> {
        if !self
            .gates
            .mention_throttle
            .try_acquire(self.settings.mention_interval)
            .await
            .map_err(JobError::State)?
        {
            return Ok(Completion::Skipped(SkipReason::ThrottleActive));
        }

        let mentions = self
            .retrier
            .invoke("get_mentions", || self.caps.action.get_mentions())
            .await?;

        let mut outcomes = ItemOutcomes::new();
        let mut already_answered = 0usize;
        for mention in &mentions {
            if !self.replied_mentions.is_new(&mention.id) {
                already_answered += 1;
                continue;
            }
            let who = mention.author_handle.as_deref().unwrap_or("someone");
            let prompt = format!(
                "Write a friendly, relevant reply to this post from @{who}: \"{}\"",
                mention.text
            );
            let res = self.reply_to(mention, &prompt).await;
            match &res {
                Ok(_) => self.replied_mentions.mark_seen(&mention.id),
                Err(e) => {
                    warn!(target: "jobs", mention_id = %mention.id, error = %e, "mention reply failed")
                }
            }
            outcomes.record(mention.id.as_str(), "reply", &res);
        }

        Ok(Completion::Done(format!(
            "{} mentions fetched, {already_answered} already answered; {}",
            mentions.len(),
            outcomes.summary("replies")
        )))
    }

    async fn monitor_trends(&self) -> Result<Completion, JobError> {
        let trends = self.fetch_trends().await?;
        let relevant = self.relevance.filter(&trends);
        if relevant.is_empty() {
            info!(target: "jobs", trends = trends.len(), "no relevant trends");
            return Ok(Completion::Skipped(SkipReason::NoRelevantTrends));
        }

        let mut outcomes = ItemOutcomes::new();
        for m in &relevant {
            let prompt = format!(
                "Write a post using the trending hashtag '{}' about the topic '{}'.",
                m.trend, m.topic
            );
            let res = match self.generate_post("generate", &prompt).await {
                Ok(text) => self.post_text(&text).await,
                Err(e) => Err(e),
            };
            if let Err(e) = &res {
                warn!(target: "jobs", trend = %m.trend, error = %e, "trend post failed");
            }
            outcomes.record(m.trend.as_str(), "post", &res);
        }

        Ok(Completion::Done(format!(
            "{} trends, {} relevant; {}",
            trends.len(),
            relevant.len(),
            outcomes.summary("trend posts")
        )))
    }

    async fn daily_follower_analysis(&self) -> Result<Completion, JobError> {
        let prompt = "Analyze my follower growth and engagement.";
        let raw = self
            .retrier
            .invoke("generate_analysis", || self.caps.decision.generate(prompt))
            .await?;
        let summary = raw.trim();
        if summary.is_empty() {
            return Err(JobError::malformed("generate_analysis", "empty analysis"));
        }
        info!(target: "jobs", summary, "follower growth analysis");
        Ok(Completion::Done(summary.to_string()))
    }

    async fn post_poll(&self) -> Result<Completion, JobError> {
        if !self
            .gates
            .poll_gate
            .try_acquire_for_today()
            .await
            .map_err(JobError::State)?
        {
            return Ok(Completion::Skipped(SkipReason::AlreadyRanToday));
        }

        let prompt = format!(
            "Generate a poll for the question \"{}\" with the options {}. \
             Answer only with JSON: {{\"question\": string, \"options\": [4 strings of at most 25 characters]}}.",
            self.settings.poll_question,
            self.settings.poll_options.join(", ")
        );
        let raw = self
            .retrier
            .invoke("generate_poll", || self.caps.decision.generate(&prompt))
            .await?;
        let poll = parse_poll("generate_poll", &raw, self.settings.poll_duration_minutes)?;
        let id = self
            .retrier
            .invoke("post_poll", || self.caps.action.post_poll(&poll))
            .await?;
        info!(target: "jobs", post_id = %id, question = %poll.question, "poll published");
        Ok(Completion::Done(format!("posted poll {id}: {}", poll.question)))
    }

    async fn search_using_trends(&self) -> Result<Completion, JobError> {
        let trends = self.fetch_trends().await?;

        let mut outcomes = ItemOutcomes::new();
        for trend in &trends {
            let hits = match self
                .retrier
                .invoke("search", || self.caps.action.search(trend))
                .await
            {
                Ok(h) => h,
                Err(e) => {
                    warn!(target: "jobs", %trend, error = %e, "search failed");
                    outcomes.record::<()>(trend.as_str(), "search", &Err(e));
                    continue;
                }
            };

            let own = self.settings.account_user_id.as_str();
            for hit in hits
                .iter()
                .filter(|h| h.author_id != own)
                .take(self.settings.results_per_trend)
            {
                // Like and reply are independent: both are always attempted.
                let liked = self
                    .retrier
                    .invoke("like", || self.caps.action.like(own, &hit.id))
                    .await;
                outcomes.record(hit.id.as_str(), "like", &liked);

                let prompt = format!(
                    "Write a short, genuine reply to this post about '{trend}': \"{}\"",
                    hit.text
                );
                let replied = self.reply_to(hit, &prompt).await;
                outcomes.record(hit.id.as_str(), "reply", &replied);

                if liked.is_err() || replied.is_err() {
                    warn!(target: "jobs", post_id = %hit.id, like_ok = liked.is_ok(), reply_ok = replied.is_ok(), "engagement partly failed");
                }
            }
        }

        Ok(Completion::Done(format!(
            "{} trends searched; {}",
            trends.len(),
            outcomes.summary("steps")
        )))
    }

    async fn scrape_and_post(&self) -> Result<Completion, JobError> {
        let url = self.settings.scrape_url.as_str();
        let scraped = self
            .retrier
            .invoke("scrape", || self.caps.scraper.scrape(url))
            .await?;

        let headlines: Vec<String> = scraped
            .iter()
            .map(|h| normalize_headline(h))
            .filter(|h| !h.is_empty())
            .collect();
        if headlines.is_empty() {
            info!(target: "jobs", "scrape returned no headlines");
            return Ok(Completion::Skipped(SkipReason::NoNewContent));
        }

        let fresh = self.headlines.retain_new(&headlines);
        if fresh.is_empty() {
            info!(target: "jobs", scraped = headlines.len(), "all headlines already used");
            return Ok(Completion::Skipped(SkipReason::NoNewContent));
        }
        let used: Vec<String> = fresh.into_iter().take(self.settings.max_headlines).collect();

        let prompt = format!(
            "Using the headlines \"{}\", create an engaging post. Do not repeat any headline word for word.",
            used.join("\", \"")
        );
        let text = self.generate_post("generate", &prompt).await?;
        for h in &used {
            self.headlines.mark_seen(h);
        }
        let id = self.post_text(&text).await?;
        info!(target: "jobs", post_id = %id, headlines = used.len(), "scraped headlines posted");
        Ok(Completion::Done(format!(
            "posted {id} from {} new headlines",
            used.len()
        )))
    }
}
