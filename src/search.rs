//! Activity search.
//!
//! Ranks activities against a free-text query. Exact title matches
//! dominate everything else; full token coverage of the title comes next;
//! goal-title coverage lets children of a matching goal surface without
//! any direct title hit. The recommendation score only breaks ties — a
//! stale exact match always outranks a fresh non-match.

use chrono::{DateTime, Utc};

use crate::scoring::recommendation_score;
use crate::types::Activity;

/// Matches scoring below this are dropped rather than ranked last.
const MIN_MATCH_SCORE: f64 = 20.0;

const EXACT_TITLE_SCORE: f64 = 100.0;
const FULL_TITLE_COVERAGE_SCORE: f64 = 70.0;
const PARTIAL_TITLE_WEIGHT: f64 = 45.0;
const FULL_GOAL_COVERAGE_SCORE: f64 = 40.0;
const PARTIAL_GOAL_WEIGHT: f64 = 25.0;
/// Ceiling of the recency/recommendation tiebreak — kept well under the
/// gap between match tiers.
const TIEBREAK_WEIGHT: f64 = 5.0;

/// A ranked search hit.
#[derive(Debug, Clone)]
pub struct SearchMatch<'a> {
    pub activity: &'a Activity,
    pub score: f64,
}

/// Rank activities against `query`. Non-matching activities are excluded;
/// an empty or non-alphanumeric query matches nothing.
pub fn search_activities<'a>(
    query: &str,
    activities: &'a [Activity],
    now: DateTime<Utc>,
) -> Vec<SearchMatch<'a>> {
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() {
        return Vec::new();
    }

    let mut matches: Vec<SearchMatch<'a>> = activities
        .iter()
        .filter_map(|activity| {
            let base = match_score(&query_tokens, activity);
            if base < MIN_MATCH_SCORE {
                return None;
            }
            let score = base + TIEBREAK_WEIGHT * recommendation_score(activity, now);
            Some(SearchMatch { activity, score })
        })
        .collect();

    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.activity.title.cmp(&b.activity.title))
    });

    matches
}

fn match_score(query_tokens: &[String], activity: &Activity) -> f64 {
    let title_tokens = tokenize(&activity.title);

    let title_component = if title_tokens == query_tokens {
        EXACT_TITLE_SCORE
    } else {
        match coverage(query_tokens, &title_tokens) {
            c if c >= 1.0 => FULL_TITLE_COVERAGE_SCORE,
            c => c * PARTIAL_TITLE_WEIGHT,
        }
    };

    let goal_component = match activity.goal_title.as_deref() {
        Some(goal) => {
            let goal_tokens = tokenize(goal);
            match coverage(query_tokens, &goal_tokens) {
                c if c >= 1.0 => FULL_GOAL_COVERAGE_SCORE,
                c => c * PARTIAL_GOAL_WEIGHT,
            }
        }
        None => 0.0,
    };

    title_component.max(goal_component)
}

/// Fraction of query tokens present in the candidate token list.
fn coverage(query_tokens: &[String], candidate_tokens: &[String]) -> f64 {
    if query_tokens.is_empty() {
        return 0.0;
    }
    let hits = query_tokens
        .iter()
        .filter(|t| candidate_tokens.contains(t))
        .count();
    hits as f64 / query_tokens.len() as f64
}

/// Lowercased alphanumeric tokens.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
