//! Scheduling-domain inference.
//!
//! Two passes: a free, synchronous keyword cascade over the activity
//! title (then the goal title), and an optional network-backed classifier
//! for whatever the cascade couldn't place. The remote pass is
//! best-effort: capped to a small batch per session, cancellable between
//! iterations, and silent on failure. A domain, once set, is never
//! overwritten.

use std::sync::{Arc, OnceLock};

use log::{debug, warn};
use regex::Regex;

use crate::ports::DomainClassifier;
use crate::session::SchedulingSession;
use crate::types::{Activity, Domain};

/// Remote lookups allowed per scheduling session, across all inference
/// passes. The budget lives on the session, not the call.
pub const MAX_REMOTE_BATCH: usize = 8;

/// Keyword tables per domain. First matching rule wins, so the more
/// specific personal-life domains are checked before the work catch-alls.
const RULES: &[(Domain, &[&str])] = &[
    (
        Domain::Health,
        &[
            "run", "gym", "workout", "yoga", "exercise", "doctor", "dentist", "therapy",
            "meditate", "meditation", "stretch", "swim",
        ],
    ),
    (
        Domain::Errands,
        &[
            "buy", "groceries", "shopping", "errand", "laundry", "pharmacy", "renew", "pay",
            "bank", "dmv", "post office", "drop off", "pick up",
        ],
    ),
    (
        Domain::Learning,
        &[
            "study", "read", "course", "learn", "practice", "lecture", "tutorial", "class",
            "flashcards", "duolingo",
        ],
    ),
    (
        Domain::Social,
        &[
            "dinner", "party", "birthday", "visit", "hangout", "brunch", "date night",
            "friends", "family",
        ],
    ),
    (
        Domain::Work,
        &[
            "meeting", "standup", "stand-up", "review", "deploy", "report", "client",
            "sprint", "interview", "presentation", "proposal", "invoice", "launch",
        ],
    ),
];

fn compiled_rules() -> &'static Vec<(Domain, Regex)> {
    static COMPILED: OnceLock<Vec<(Domain, Regex)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        RULES
            .iter()
            .map(|(domain, keywords)| {
                let alternation = keywords
                    .iter()
                    .map(|k| regex::escape(k))
                    .collect::<Vec<_>>()
                    .join("|");
                let pattern = format!(r"(?i)\b(?:{alternation})\b");
                // The pattern is built from escaped literals; it always compiles.
                let regex = Regex::new(&pattern).unwrap_or_else(|e| {
                    panic!("invalid domain rule pattern for {domain}: {e}")
                });
                (*domain, regex)
            })
            .collect()
    })
}

/// Local heuristic pass: title first, goal title as fallback context.
pub fn infer_local(title: &str, goal_title: Option<&str>) -> Option<Domain> {
    let rules = compiled_rules();
    for text in [Some(title), goal_title].into_iter().flatten() {
        for (domain, regex) in rules {
            if regex.is_match(text) {
                return Some(*domain);
            }
        }
    }
    None
}

/// Batch inference over a scheduling session's candidate activities.
pub struct DomainInference {
    classifier: Arc<dyn DomainClassifier>,
}

impl DomainInference {
    pub fn new(classifier: Arc<dyn DomainClassifier>) -> Self {
        Self { classifier }
    }

    /// Infer domains for activities that don't have one yet. Returns the
    /// number of activities that gained a domain.
    ///
    /// Activities with `scheduling_domain` already set are skipped without
    /// touching the classifier (idempotent). The remote pass draws on the
    /// session's [`MAX_REMOTE_BATCH`] lookup budget — shared across every
    /// pass in the session — and polls the cancellation flag between
    /// iterations; a response that resolves after cancellation is
    /// discarded.
    pub async fn infer_batch(
        &self,
        activities: &mut [Activity],
        session: &SchedulingSession,
    ) -> usize {
        let mut inferred = 0;

        // Local pass — synchronous and free.
        for activity in activities.iter_mut() {
            if activity.scheduling_domain.is_some() {
                continue;
            }
            if let Some(domain) = infer_local(&activity.title, activity.goal_title.as_deref()) {
                debug!("inferred domain {domain} for '{}' locally", activity.title);
                activity.scheduling_domain = Some(domain);
                inferred += 1;
            }
        }

        // Remote pass — best effort, bounded by the session budget.
        for activity in activities.iter_mut() {
            if activity.scheduling_domain.is_some() {
                continue;
            }
            if session.is_cancelled() {
                break;
            }
            if !session.try_reserve_remote_lookup(MAX_REMOTE_BATCH) {
                debug!("remote lookup budget spent for this session");
                break;
            }

            let result = self
                .classifier
                .classify(&activity.title, activity.goal_title.as_deref())
                .await;

            // Teardown raced the in-flight call — discard the result.
            if session.is_cancelled() {
                break;
            }

            match result {
                Ok(Some(domain)) => {
                    debug!("classifier tagged '{}' as {domain}", activity.title);
                    activity.scheduling_domain = Some(domain);
                    inferred += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("domain classifier failed for '{}': {e}", activity.title);
                }
            }
        }

        inferred
    }
}
