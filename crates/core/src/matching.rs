//! Confidence scoring between a toll record and external candidates.
//!
//! The score is a fixed weighted rule so every result can be explained by
//! its reasons:
//!
//! | Component                     | Weight                          |
//! |-------------------------------|---------------------------------|
//! | card or vehicle id matches    | 0.50                            |
//! | time delta within the window  | 0.35 × (1 − delta / window)     |
//! | amount matches exactly        | 0.15                            |

use std::cmp::Ordering;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::mapping::validate_confidence;
use crate::toll_record::TollRecord;
use crate::types::DbId;

pub const IDENTIFIER_WEIGHT: f64 = 0.5;
pub const TIME_WEIGHT: f64 = 0.35;
pub const AMOUNT_WEIGHT: f64 = 0.15;

/// Default proximity window, in seconds.
pub const DEFAULT_TIME_WINDOW_SECS: i64 = 30 * 60;

/// An operational record from another system that may correspond to a toll
/// record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalCandidate {
    pub entity_id: DbId,
    pub entity_type: String,
    pub occurred_at: NaiveDateTime,
    pub vehicle_id: Option<String>,
    pub card_id: Option<String>,
    pub amount: Option<i64>,
}

/// A scored candidate. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PotentialMatch {
    pub entity_id: DbId,
    pub entity_type: String,
    pub confidence: f64,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct MatchScorer {
    window_secs: i64,
}

impl Default for MatchScorer {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_TIME_WINDOW_SECS,
        }
    }
}

impl MatchScorer {
    pub fn new(window_secs: i64) -> Result<Self, CoreError> {
        if window_secs <= 0 {
            return Err(CoreError::Validation(format!(
                "match time window must be positive, got {window_secs}"
            )));
        }
        Ok(Self { window_secs })
    }

    pub fn window_secs(&self) -> i64 {
        self.window_secs
    }

    /// Whether `candidate` should be scored at all: it shares an identifier
    /// with the record or falls inside the time window.
    pub fn is_candidate(&self, record: &TollRecord, candidate: &ExternalCandidate) -> bool {
        card_matches(record, candidate)
            || vehicle_matches(record, candidate)
            || self.time_delta_secs(record, candidate) <= self.window_secs
    }

    fn time_delta_secs(&self, record: &TollRecord, candidate: &ExternalCandidate) -> i64 {
        (candidate.occurred_at - record.occurred_at())
            .num_seconds()
            .abs()
    }

    /// Score one candidate, listing which components contributed.
    pub fn score(&self, record: &TollRecord, candidate: &ExternalCandidate) -> PotentialMatch {
        let mut score = 0.0;
        let mut reasons = Vec::new();

        if card_matches(record, candidate) {
            score += IDENTIFIER_WEIGHT;
            reasons.push("exact card-number match".to_string());
        } else if vehicle_matches(record, candidate) {
            score += IDENTIFIER_WEIGHT;
            reasons.push("exact vehicle-identifier match".to_string());
        }

        // The time component decays to zero at the window edge; a zero
        // contribution is not reported as a reason.
        let delta = self.time_delta_secs(record, candidate);
        if delta < self.window_secs {
            score += TIME_WEIGHT * (1.0 - delta as f64 / self.window_secs as f64);
            reasons.push(format!(
                "time difference of {delta}s within {}s window",
                self.window_secs
            ));
        }

        if candidate.amount == Some(record.amount) {
            score += AMOUNT_WEIGHT;
            reasons.push("exact amount match".to_string());
        }

        PotentialMatch {
            entity_id: candidate.entity_id,
            entity_type: candidate.entity_type.clone(),
            confidence: score.clamp(0.0, 1.0),
            reasons,
        }
    }

    /// Score `candidates`, keep those at or above `threshold`, and order them
    /// by descending confidence, then ascending entity id.
    pub fn rank(
        &self,
        record: &TollRecord,
        candidates: &[ExternalCandidate],
        threshold: f64,
    ) -> Result<Vec<PotentialMatch>, CoreError> {
        validate_confidence(threshold)?;
        let mut matches: Vec<PotentialMatch> = candidates
            .iter()
            .filter(|c| self.is_candidate(record, c))
            .map(|c| self.score(record, c))
            .filter(|m| m.confidence >= threshold)
            .collect();
        matches.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
                .then(a.entity_id.cmp(&b.entity_id))
        });
        Ok(matches)
    }
}

fn card_matches(record: &TollRecord, candidate: &ExternalCandidate) -> bool {
    candidate
        .card_id
        .as_deref()
        .is_some_and(|c| c.trim() == record.card_id)
}

fn vehicle_matches(record: &TollRecord, candidate: &ExternalCandidate) -> bool {
    candidate
        .vehicle_id
        .as_deref()
        .is_some_and(|v| v.trim() == record.vehicle_id)
}
