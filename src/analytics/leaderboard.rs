use std::collections::BTreeMap;

use serde::Serialize;

use super::{mean, sample_std_dev};
use crate::models::score::ScoreRecord;

/// Weight applied to the standard deviation of a user's normalized scores.
///
/// The term is added, so inconsistent users rank higher. Kept as-is until
/// the intended direction is confirmed; see DESIGN.md.
pub const CONSISTENCY_WEIGHT: f64 = 2.0;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LeaderboardEntry {
    pub user_id: i64,
    pub username: String,
    /// Mean of normalized (0-100) scores.
    pub avg_score: f64,
    /// Sample standard deviation of normalized scores.
    pub std_dev: f64,
    pub num_attempts: usize,
    /// Sum of raw points.
    pub total_score: i64,
    pub final_score: f64,
}

/// Scales raw points to 0-100 by the quiz's question count.
/// A quiz without questions normalizes to 0.
pub fn normalized_score(total_scored: i64, num_questions: i64) -> f64 {
    if num_questions <= 0 {
        return 0.0;
    }
    total_scored as f64 / num_questions as f64 * 100.0
}

#[derive(Default)]
struct Accumulator {
    username: String,
    normalized: Vec<f64>,
    total_score: i64,
}

/// Ranks users by `total_score / num_attempts + CONSISTENCY_WEIGHT * std_dev`,
/// highest first. Ties keep ascending user id order.
pub fn build_leaderboard(scores: &[ScoreRecord]) -> Vec<LeaderboardEntry> {
    let mut by_user: BTreeMap<i64, Accumulator> = BTreeMap::new();

    for score in scores {
        let acc = by_user.entry(score.user_id).or_default();
        if acc.username.is_empty() {
            acc.username = score.full_name.clone();
        }
        acc.normalized
            .push(normalized_score(score.total_scored, score.num_questions));
        acc.total_score += score.total_scored;
    }

    let mut entries: Vec<LeaderboardEntry> = by_user
        .into_iter()
        .map(|(user_id, acc)| {
            let num_attempts = acc.normalized.len();
            let std_dev = sample_std_dev(&acc.normalized);
            LeaderboardEntry {
                user_id,
                username: acc.username,
                avg_score: mean(&acc.normalized),
                std_dev,
                num_attempts,
                total_score: acc.total_score,
                final_score: acc.total_score as f64 / num_attempts as f64
                    + CONSISTENCY_WEIGHT * std_dev,
            }
        })
        .collect();

    entries.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
    entries
}
