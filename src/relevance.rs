// src/relevance.rs
//! Trend relevance: keep the trending labels that mention one of our focus
//! topics, and remember which topic matched.

use serde::Serialize;
use tracing::debug;

/// A trend that survived the filter, with the focus topic that let it through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendMatch {
    pub trend: String,
    pub topic: String,
}

/// Case-insensitive substring filter over a fixed focus-topic list.
#[derive(Debug, Clone)]
pub struct TrendRelevanceFilter {
    /// (original label, lowercased label), in configured order.
    topics: Vec<(String, String)>,
}

impl TrendRelevanceFilter {
    /// Blank topics are dropped; they would match every trend.
    pub fn new<I, S>(focus_topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let topics = focus_topics
            .into_iter()
            .filter_map(|t| {
                let t = t.as_ref().trim();
                (!t.is_empty()).then(|| (t.to_string(), t.to_lowercase()))
            })
            .collect();
        Self { topics }
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.topics.iter().map(|(t, _)| t.as_str())
    }

    /// First focus topic (in configured order) contained in `candidate`.
    pub fn match_topic(&self, candidate: &str) -> Option<&str> {
        let hay = candidate.to_lowercase();
        self.topics
            .iter()
            .find(|(_, needle)| hay.contains(needle.as_str()))
            .map(|(t, _)| t.as_str())
    }

    /// Keeps candidate order; unmatched candidates are dropped.
    pub fn filter<S: AsRef<str>>(&self, candidates: &[S]) -> Vec<TrendMatch> {
        let out: Vec<TrendMatch> = candidates
            .iter()
            .filter_map(|c| {
                let c = c.as_ref();
                self.match_topic(c).map(|topic| TrendMatch {
                    trend: c.to_string(),
                    topic: topic.to_string(),
                })
            })
            .collect();
        debug!(target: "jobs", candidates = candidates.len(), relevant = out.len(), "trend relevance filtered");
        out
    }
}

/// One-shot form of [`TrendRelevanceFilter::filter`].
pub fn filter_trends<C: AsRef<str>, T: AsRef<str>>(
    candidates: &[C],
    focus_topics: &[T],
) -> Vec<TrendMatch> {
    TrendRelevanceFilter::new(focus_topics).filter(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_matching_trend_with_its_topic() {
        let out = filter_trends(&["AI Agents Rising", "Sports News"], &["AI Agents", "Crypto"]);
        assert_eq!(
            out,
            vec![TrendMatch {
                trend: "AI Agents Rising".into(),
                topic: "AI Agents".into()
            }]
        );
    }

    #[test]
    fn first_topic_in_list_wins_ties() {
        let f = TrendRelevanceFilter::new(["Crypto", "Blockchain"]);
        assert_eq!(f.match_topic("#Blockchain and crypto week"), Some("Crypto"));
        let f = TrendRelevanceFilter::new(["Blockchain", "Crypto"]);
        assert_eq!(f.match_topic("#Blockchain and crypto week"), Some("Blockchain"));
    }

    #[test]
    fn matching_is_case_insensitive_and_order_preserving() {
        let out = filter_trends(&["#DAOGovernance", "weather", "MACHINE LEARNING 101"], &["machine learning", "dao"]);
        let trends: Vec<_> = out.iter().map(|m| m.trend.as_str()).collect();
        assert_eq!(trends, ["#DAOGovernance", "MACHINE LEARNING 101"]);
        assert_eq!(out[0].topic, "dao");
    }

    #[test]
    fn empty_inputs_yield_empty_output() {
        let none: [&str; 0] = [];
        assert!(filter_trends(&none, &["AI"]).is_empty());
        assert!(filter_trends(&["AI news"], &none).is_empty());
        assert!(filter_trends(&["AI news"], &["  "]).is_empty());
    }
}
