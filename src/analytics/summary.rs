use std::collections::{BTreeMap, HashMap};

use chrono::Datelike;
use serde::Serialize;

use super::round2;
use crate::models::score::ScoreRecord;

/// One line per quiz a user attempted.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuizSummary {
    pub quiz_id: i64,
    pub user_id: i64,
    pub full_name: String,
    pub subject_name: String,
    pub chapter_name: String,
    pub total_attempts: usize,
    pub highest_score: i64,
    pub average_score: f64,
}

/// Mean raw score over a group of attempts, for charting.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Bucket {
    pub label: String,
    pub average_score: f64,
    pub attempts: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub user_id: i64,
    pub quizzes: Vec<QuizSummary>,
    pub subject_averages: Vec<Bucket>,
    pub weekly_averages: Vec<Bucket>,
}

/// Collapses one user's attempts to a line per quiz.
///
/// Quizzes appear in the order of their first occurrence in `scores`, so
/// passing attempts newest-first lists the most recently attempted quiz first.
pub fn summarize_quizzes(scores: &[ScoreRecord]) -> Vec<QuizSummary> {
    let mut order: Vec<i64> = Vec::new();
    let mut grouped: HashMap<i64, Vec<&ScoreRecord>> = HashMap::new();

    for score in scores {
        let attempts = grouped.entry(score.quiz_id).or_insert_with(|| {
            order.push(score.quiz_id);
            Vec::new()
        });
        attempts.push(score);
    }

    order
        .into_iter()
        .filter_map(|quiz_id| {
            let attempts = grouped.remove(&quiz_id)?;
            let first = attempts.first()?;
            let total: i64 = attempts.iter().map(|s| s.total_scored).sum();
            Some(QuizSummary {
                quiz_id,
                user_id: first.user_id,
                full_name: first.full_name.clone(),
                subject_name: first.subject_name.clone(),
                chapter_name: first.chapter_name.clone(),
                total_attempts: attempts.len(),
                highest_score: attempts.iter().map(|s| s.total_scored).max().unwrap_or(0),
                average_score: round2(total as f64 / attempts.len() as f64),
            })
        })
        .collect()
}

fn bucket_by<F>(scores: &[ScoreRecord], label: F) -> Vec<Bucket>
where
    F: Fn(&ScoreRecord) -> String,
{
    let mut groups: BTreeMap<String, (i64, usize)> = BTreeMap::new();
    for score in scores {
        let (sum, count) = groups.entry(label(score)).or_default();
        *sum += score.total_scored;
        *count += 1;
    }

    groups
        .into_iter()
        .map(|(label, (sum, count))| Bucket {
            label,
            average_score: round2(sum as f64 / count as f64),
            attempts: count,
        })
        .collect()
}

/// Mean score per subject, ordered by subject name.
pub fn bucket_by_subject(scores: &[ScoreRecord]) -> Vec<Bucket> {
    bucket_by(scores, |s| s.subject_name.clone())
}

/// ISO week label of an attempt, e.g. `2025-W09`.
pub fn week_label(score: &ScoreRecord) -> String {
    let week = score.time_stamp_of_attempt.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

/// Mean score per ISO week, oldest week first.
pub fn bucket_by_week(scores: &[ScoreRecord]) -> Vec<Bucket> {
    bucket_by(scores, week_label)
}

pub fn user_summary(user_id: i64, scores: &[ScoreRecord]) -> UserSummary {
    UserSummary {
        user_id,
        quizzes: summarize_quizzes(scores),
        subject_averages: bucket_by_subject(scores),
        weekly_averages: bucket_by_week(scores),
    }
}
