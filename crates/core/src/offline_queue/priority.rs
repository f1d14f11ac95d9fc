//! Priority scoring
//!
//! The score is an integer sum of independent contributions, mapped onto a
//! [`Priority`] class by fixed thresholds:
//!
//! | contribution      | value                                           |
//! |-------------------|-------------------------------------------------|
//! | requested class   | low 10, medium 20, high 30                      |
//! | user initiated    | +15                                             |
//! | category          | workout 25, settings 18, social 12, media 8, analytics 3 |
//! | network           | requirement x quality table                     |
//! | payload size      | < 512 B +8, < 2 KiB +5, < 10 KiB +2, else -3    |
//! | age               | >= 1 min +2, >= 5 min +5, >= 10 min +10         |
//!
//! A score of 50 or more is `High`, 30 or more is `Medium`, anything else
//! `Low`.

use std::cmp::Ordering;
use std::time::Duration;

use super::types::{NetworkQuality, NetworkRequirement, Operation, Priority};

const USER_INITIATED_BONUS: i32 = 15;
const HIGH_THRESHOLD: i32 = 50;
const MEDIUM_THRESHOLD: i32 = 30;

/// Stateless scorer; every method is pure
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityScorer;

impl PriorityScorer {
    pub fn new() -> Self {
        Self
    }

    /// Raw integer score
    pub fn score_value(&self, operation: &Operation, quality: NetworkQuality, now_ms: u64) -> i32 {
        let mut score = operation.requested_priority.base_score();
        if operation.user_initiated {
            score += USER_INITIATED_BONUS;
        }
        score += operation.category.weight();
        score += network_weight(operation.network_requirement, quality);
        score += size_adjustment(operation.estimated_size);
        score += age_bonus(operation.age(now_ms));
        score
    }

    /// Priority class for the current conditions
    pub fn score(&self, operation: &Operation, quality: NetworkQuality, now_ms: u64) -> Priority {
        classify(self.score_value(operation, quality, now_ms))
    }

    /// Class used for dispatch: the scored class, raised one level once the
    /// operation has waited `boost_threshold`, never below its current class
    pub fn effective_priority(
        &self,
        operation: &Operation,
        quality: NetworkQuality,
        now_ms: u64,
        boost_threshold: Duration,
    ) -> Priority {
        let mut priority = self.score(operation, quality, now_ms);
        if operation.age(now_ms) >= boost_threshold {
            priority = priority.raised();
        }
        priority.max(operation.priority)
    }

    /// Dispatch order: priority desc, user initiated first, category weight
    /// desc, oldest first, then id
    pub fn dispatch_order(a: &Operation, b: &Operation) -> Ordering {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.user_initiated.cmp(&a.user_initiated))
            .then_with(|| b.category.weight().cmp(&a.category.weight()))
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    }
}

/// Requirement x quality contribution
pub fn network_weight(requirement: NetworkRequirement, quality: NetworkQuality) -> i32 {
    use NetworkQuality as Q;
    use NetworkRequirement as R;

    match (requirement, quality) {
        (R::None, Q::Offline | Q::Poor) => 15,
        (R::None, Q::Fair) => 10,
        (R::None, Q::Good | Q::Excellent) => 5,
        (R::Low, Q::Offline) => -5,
        (R::Low, Q::Poor) => 2,
        (R::Low, Q::Fair | Q::Good | Q::Excellent) => 8,
        (R::Medium, Q::Offline | Q::Poor) => -10,
        (R::Medium, Q::Fair) => 3,
        (R::Medium, Q::Good | Q::Excellent) => 8,
        (R::High, Q::Offline | Q::Poor) => -15,
        (R::High, Q::Fair) => -5,
        (R::High, Q::Good | Q::Excellent) => 10,
    }
}

fn size_adjustment(bytes: usize) -> i32 {
    match bytes {
        0..=511 => 8,
        512..=2047 => 5,
        2048..=10_239 => 2,
        _ => -3,
    }
}

fn age_bonus(age: Duration) -> i32 {
    match age.as_secs() {
        600.. => 10,
        300.. => 5,
        60.. => 2,
        _ => 0,
    }
}

fn classify(score: i32) -> Priority {
    if score >= HIGH_THRESHOLD {
        Priority::High
    } else if score >= MEDIUM_THRESHOLD {
        Priority::Medium
    } else {
        Priority::Low
    }
}
