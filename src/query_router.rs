//! Keyword routing of free-text questions to analysis topics

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicTag {
    Descriptor,
    Structure,
    Thermo,
    Screening,
    Reasoning,
}

impl TopicTag {
    pub const ALL: [TopicTag; 5] = [
        TopicTag::Descriptor,
        TopicTag::Structure,
        TopicTag::Thermo,
        TopicTag::Screening,
        TopicTag::Reasoning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TopicTag::Descriptor => "descriptor",
            TopicTag::Structure => "structure",
            TopicTag::Thermo => "thermo",
            TopicTag::Screening => "screening",
            TopicTag::Reasoning => "reasoning",
        }
    }
}

impl fmt::Display for TopicTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TopicTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TopicTag::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown topic: {s}"))
    }
}

pub trait QueryClassifier: Send + Sync {
    /// Topics for a query, most relevant first; never empty
    fn classify(&self, query: &str) -> Vec<TopicTag>;
}

lazy_static! {
    static ref DESCRIPTOR_WORDS: Regex = Regex::new(
        r"(?i)\b(homo|lumo|band\s*gap|gap|descriptors?|d-band|electronic|fermi|work\s*function|dos)\b"
    )
    .unwrap();
    static ref STRUCTURE_WORDS: Regex = Regex::new(
        r"(?i)\b(structures?|geometry|coordination|bonds?|xyz|3d|charges?|lattice)\b"
    )
    .unwrap();
    static ref THERMO_WORDS: Regex = Regex::new(
        r"(?i)\b(coverage|desorption|t50|temperatures?|pressures?|thermo\w*|langmuir|isotherm|enthalpy|entropy|doe)\b"
    )
    .unwrap();
    static ref SCREENING_WORDS: Regex = Regex::new(
        r"(?i)\b(predict\w*|screen\w*|dopants?|candidates?|symbolic|regression|gaussian|gp|ml|active\s+learning|next\s+experiment|uncertaint\w*|importance)\b"
    )
    .unwrap();
    static ref REASONING_WORDS: Regex = Regex::new(r"(?i)\b(why|explain\w*|mechanism|reason\w*)\b").unwrap();
}

/// Routes by keyword; unmatched queries go to [`TopicTag::Reasoning`]
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    fn patterns() -> [(TopicTag, &'static Regex); 5] {
        [
            (TopicTag::Descriptor, &*DESCRIPTOR_WORDS),
            (TopicTag::Structure, &*STRUCTURE_WORDS),
            (TopicTag::Thermo, &*THERMO_WORDS),
            (TopicTag::Screening, &*SCREENING_WORDS),
            (TopicTag::Reasoning, &*REASONING_WORDS),
        ]
    }
}

impl QueryClassifier for KeywordClassifier {
    fn classify(&self, query: &str) -> Vec<TopicTag> {
        let mut hits: Vec<(usize, TopicTag)> = Self::patterns()
            .iter()
            .filter_map(|(tag, pattern)| pattern.find(query).map(|m| (m.start(), *tag)))
            .collect();
        // earliest keyword first
        hits.sort_by_key(|(position, _)| *position);

        let topics: Vec<TopicTag> = hits.into_iter().map(|(_, tag)| tag).collect();
        if topics.is_empty() {
            vec![TopicTag::Reasoning]
        } else {
            topics
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDecision {
    pub query: String,
    pub primary: TopicTag,
    pub topics: Vec<TopicTag>,
}

pub fn route(classifier: &dyn QueryClassifier, query: &str) -> RouteDecision {
    let topics = classifier.classify(query);
    RouteDecision {
        query: query.to_string(),
        primary: topics.first().copied().unwrap_or(TopicTag::Reasoning),
        topics,
    }
}
