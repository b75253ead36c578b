use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, error};
use vader_sentiment::SentimentIntensityAnalyzer;

use crate::models::{Priority, Sentiment};

pub const POSITIVE_THRESHOLD: f64 = 0.05;
pub const NEGATIVE_THRESHOLD: f64 = -0.05;
pub const HIGH_PRIORITY_THRESHOLD: f64 = -0.5;

/// Impact assigned when the scorer cannot be consulted.
pub const FALLBACK_IMPACT: f64 = 0.5;

#[derive(Debug, Error)]
pub enum ScorerError {
    #[error("sentiment scorer panicked")]
    Panicked,
    #[error("sentiment scorer returned no '{0}' score")]
    MissingScore(&'static str),
    #[error("sentiment scorer returned a non-finite compound score")]
    NonFinite,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarityScores {
    pub compound: f64,
    pub pos: f64,
    pub neg: f64,
    pub neu: f64,
}

/// Black-box text scorer. Implementations may fail; callers decide how to degrade.
pub trait PolarityScorer {
    fn score(&self, text: &str) -> Result<PolarityScores, ScorerError>;

    /// A second, independent polarity signal in [-1, 1].
    fn polarity(&self, text: &str) -> Result<f64, ScorerError>;
}

pub struct VaderScorer {
    analyzer: SentimentIntensityAnalyzer<'static>,
}

impl VaderScorer {
    pub fn new() -> Self {
        Self {
            analyzer: SentimentIntensityAnalyzer::new(),
        }
    }

    fn compound_of(&self, text: &str) -> Result<f64, ScorerError> {
        let scores = self.raw_scores(text)?;
        scores
            .get("compound")
            .copied()
            .ok_or(ScorerError::MissingScore("compound"))
    }

    fn raw_scores(&self, text: &str) -> Result<HashMap<&'static str, f64>, ScorerError> {
        let scores = panic::catch_unwind(AssertUnwindSafe(|| self.analyzer.polarity_scores(text)))
            .map_err(|_| ScorerError::Panicked)?;

        let mut owned = HashMap::new();
        for key in ["compound", "pos", "neg", "neu"] {
            if let Some(value) = scores.get(key) {
                owned.insert(key, *value);
            }
        }
        Ok(owned)
    }
}

impl Default for VaderScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl PolarityScorer for VaderScorer {
    fn score(&self, text: &str) -> Result<PolarityScores, ScorerError> {
        let scores = self.raw_scores(text)?;
        let get = |key: &'static str| scores.get(key).copied().ok_or(ScorerError::MissingScore(key));

        Ok(PolarityScores {
            compound: get("compound")?,
            pos: get("pos")?,
            neg: get("neg")?,
            neu: get("neu")?,
        })
    }

    /// Mean sentence-level compound score.
    fn polarity(&self, text: &str) -> Result<f64, ScorerError> {
        let sentences: Vec<&str> = text
            .split(['.', '!', '?'])
            .map(str::trim)
            .filter(|sentence| !sentence.is_empty())
            .collect();

        if sentences.is_empty() {
            return Ok(0.0);
        }

        let mut total = 0.0;
        for sentence in &sentences {
            total += self.compound_of(sentence)?;
        }
        Ok(total / sentences.len() as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Analysis {
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
    pub secondary_polarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Triage {
    pub sentiment: Sentiment,
    pub priority: Priority,
    pub compound_score: f64,
    pub impact_score: f64,
    /// `None` when scoring fell back to defaults; serialized as `{}`.
    #[serde(serialize_with = "analysis_or_empty")]
    pub analysis: Option<Analysis>,
}

fn analysis_or_empty<S: Serializer>(analysis: &Option<Analysis>, serializer: S) -> Result<S::Ok, S::Error> {
    match analysis {
        Some(analysis) => analysis.serialize(serializer),
        None => serializer.serialize_map(Some(0))?.end(),
    }
}

impl Triage {
    pub fn fallback() -> Self {
        Self {
            sentiment: Sentiment::Neutral,
            priority: Priority::Medium,
            compound_score: 0.0,
            impact_score: FALLBACK_IMPACT,
            analysis: None,
        }
    }
}

pub fn classify(compound: f64, word_count: usize) -> Triage {
    let (sentiment, priority) = if compound >= POSITIVE_THRESHOLD {
        (Sentiment::Positive, Priority::Low)
    } else if compound <= NEGATIVE_THRESHOLD {
        let priority = if compound <= HIGH_PRIORITY_THRESHOLD {
            Priority::High
        } else {
            Priority::Medium
        };
        (Sentiment::Negative, priority)
    } else {
        (Sentiment::Neutral, Priority::Medium)
    };

    Triage {
        sentiment,
        priority,
        compound_score: compound,
        impact_score: impact_score(compound, word_count),
        analysis: None,
    }
}

pub fn impact_score(compound: f64, word_count: usize) -> f64 {
    (compound.abs() + word_count as f64 / 100.0).min(1.0)
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Scores `text`, falling back to neutral defaults if the scorer fails.
pub fn analyze(scorer: &dyn PolarityScorer, text: &str) -> Triage {
    match try_analyze(scorer, text) {
        Ok(triage) => {
            debug!(
                sentiment = %triage.sentiment,
                priority = triage.priority.level(),
                compound = triage.compound_score,
                "scored grievance text"
            );
            triage
        }
        Err(err) => {
            error!(error = %err, "error in sentiment analysis, using neutral defaults");
            Triage::fallback()
        }
    }
}

fn try_analyze(scorer: &dyn PolarityScorer, text: &str) -> Result<Triage, ScorerError> {
    let scores = scorer.score(text)?;
    if !scores.compound.is_finite() {
        return Err(ScorerError::NonFinite);
    }
    let secondary_polarity = scorer.polarity(text)?;

    let mut triage = classify(scores.compound, word_count(text));
    triage.analysis = Some(Analysis {
        positive: scores.pos,
        negative: scores.neg,
        neutral: scores.neu,
        secondary_polarity,
    });
    Ok(triage)
}
