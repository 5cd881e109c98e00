//! Topic tiers for the periodic post.

use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub fn default_prioritized() -> Vec<String> {
    [
        "DAO",
        "AI Agents",
        "robotics",
        "IoT",
        "Edge Computing",
        "Quantum Computing",
        "Autonomous Vehicles",
        "Smart Cities",
        "AI Ethics",
        "Natural Language Processing",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

pub fn default_general() -> Vec<String> {
    [
        "AI",
        "Machine Learning",
        "Blockchain",
        "Crypto",
        "Data Science",
        "Cybersecurity",
        "Cloud Computing",
        "DevOps",
        "AR/VR",
        "5G",
        "Computer Vision",
        "Big Data",
        "Augmented Reality",
        "Virtual Reality",
        "Fintech",
        "Healthtech",
        "Edtech",
        "Agtech",
        "Green Technology",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

pub fn default_focus() -> Vec<String> {
    ["DAO", "AI agents", "Blockchain", "Crypto", "Machine Learning"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicTiers {
    pub prioritized: Vec<String>,
    pub general: Vec<String>,
}

impl Default for TopicTiers {
    fn default() -> Self {
        Self {
            prioritized: default_prioritized(),
            general: default_general(),
        }
    }
}

impl TopicTiers {
    /// Coin flip between the tiers, then a uniform pick inside the chosen one.
    /// An empty tier defers to the other; `None` only when both are empty.
    pub fn pick<R: Rng>(&self, rng: &mut R) -> Option<&str> {
        let (first, second) = if rng.random_bool(0.5) {
            (&self.prioritized, &self.general)
        } else {
            (&self.general, &self.prioritized)
        };
        first
            .choose(rng)
            .or_else(|| second.choose(rng))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn both_tiers_get_picked_roughly_evenly() {
        let tiers = TopicTiers {
            prioritized: vec!["p".into()],
            general: vec!["g1".into(), "g2".into(), "g3".into()],
        };
        let mut rng = StdRng::seed_from_u64(7);
        let mut p = 0;
        for _ in 0..2000 {
            if tiers.pick(&mut rng) == Some("p") {
                p += 1;
            }
        }
        // 50% tier split even though the general tier is three times larger.
        assert!((850..=1150).contains(&p), "prioritized picked {p} times");
    }

    #[test]
    fn empty_tier_falls_back() {
        let tiers = TopicTiers {
            prioritized: vec![],
            general: vec!["only".into()],
        };
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..10 {
            assert_eq!(tiers.pick(&mut rng), Some("only"));
        }
        let empty = TopicTiers {
            prioritized: vec![],
            general: vec![],
        };
        assert_eq!(empty.pick(&mut rng), None);
    }
}
