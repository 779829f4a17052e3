// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Consistency Referee
//!
//! Cross-checks independently reported views of the same data, and grades
//! challenges against answers recomputed from the log. Both produce events;
//! neither mutates history.

pub mod challenge;

use crate::error::{KernelError, Result};
use crate::event::{
    kinds, ChallengeIssued, ChallengeResponse, EventPayload, EventRecord, MultiViewConsistent,
    MultiViewMismatch,
};
use crate::log::{Chain, EventLog};
use crate::types::{hash_hex, Domain, EventId};
use challenge::{normalize_answer, Challenge, ChallengeType, ChallengeVerdict};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// One source's report of the data under comparison.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub source: String,
    /// Reported by the source; not compared.
    pub timestamp: u64,
    pub data: serde_json::Value,
}

/// Where the first disagreement was found.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Residue {
    pub baseline_source: String,
    pub divergent_source: String,
    /// Position of the divergent view in the input.
    pub position: usize,
    pub baseline_digest: String,
    pub divergent_digest: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ViewCheck {
    pub consistent: bool,
    pub residue: Option<Residue>,
    pub record: EventRecord,
}

pub struct ConsistencyReferee {
    log: Arc<EventLog>,
    resolve: Mutex<()>,
}

impl ConsistencyReferee {
    pub fn new(log: Arc<EventLog>) -> Self {
        Self {
            log,
            resolve: Mutex::new(()),
        }
    }

    /// Compare every view's data against the first.
    ///
    /// Fewer than two views is trivially consistent. The verdict is recorded
    /// either way.
    pub fn verify_views(&self, views: &[View]) -> Result<ViewCheck> {
        let sources: Vec<String> = views.iter().map(|v| v.source.clone()).collect();

        let baseline = match views.first() {
            Some(view) => view,
            None => return self.record_consistent(sources, None),
        };
        let baseline_digest = view_digest(baseline)?;

        for (position, view) in views.iter().enumerate().skip(1) {
            if view.data == baseline.data {
                continue;
            }
            let residue = Residue {
                baseline_source: baseline.source.clone(),
                divergent_source: view.source.clone(),
                position,
                baseline_digest: baseline_digest.clone(),
                divergent_digest: view_digest(view)?,
            };
            warn!(
                baseline = %residue.baseline_source,
                divergent = %residue.divergent_source,
                position,
                "Views disagree"
            );
            let record = self.log.append(
                Domain::Referee,
                kinds::MULTI_VIEW_MISMATCH,
                EventPayload::MultiViewMismatch(MultiViewMismatch {
                    sources,
                    residue: residue.clone(),
                }),
            )?;
            return Ok(ViewCheck {
                consistent: false,
                residue: Some(residue),
                record,
            });
        }

        self.record_consistent(sources, Some(baseline_digest))
    }

    fn record_consistent(&self, sources: Vec<String>, digest: Option<String>) -> Result<ViewCheck> {
        let view_count = sources.len();
        let record = self.log.append(
            Domain::Referee,
            kinds::MULTI_VIEW_CONSISTENT,
            EventPayload::MultiViewConsistent(MultiViewConsistent { sources, digest }),
        )?;
        debug!(view_count, "Views consistent");
        Ok(ViewCheck {
            consistent: true,
            residue: None,
            record,
        })
    }

    /// Issue a challenge anchored at the current head.
    pub fn issue_challenge(&self, target: &str, challenge_type: ChallengeType) -> Result<Challenge> {
        let anchor_index = self.log.chain()?.head().map(|r| r.index()).unwrap_or(0);
        let question = challenge_type.question(target, anchor_index);

        let record = self.log.append(
            Domain::Referee,
            kinds::CHALLENGE_ISSUED,
            EventPayload::ChallengeIssued(ChallengeIssued {
                target: target.to_string(),
                challenge_type,
                question: question.clone(),
                anchor_index,
            }),
        )?;
        info!(id = %record.id(), subject = target, challenge_type = %challenge_type, anchor_index, "Challenge issued");

        Ok(Challenge {
            id: record.id().clone(),
            target: target.to_string(),
            challenge_type,
            question,
            anchor_index,
            answer: None,
            passed: None,
        })
    }

    /// Grade `answer` and record the response. Each challenge resolves once.
    pub fn verify_challenge(&self, challenge_id: &EventId, answer: &str) -> Result<ChallengeVerdict> {
        let _guard = self.resolve.lock().map_err(|_| KernelError::LockPoisoned)?;
        let chain = self.log.chain()?;

        let issued = find_issued(&chain, challenge_id)
            .ok_or_else(|| KernelError::UnknownChallenge(challenge_id.clone()))?
            .clone();
        if find_response(&chain, challenge_id).is_some() {
            return Err(KernelError::ChallengeResolved(challenge_id.clone()));
        }
        let expected = issued.challenge_type.expected_answer(&chain, issued.anchor_index);
        drop(chain);

        let verdict = match expected {
            Ok(expected) if normalize_answer(&expected) == normalize_answer(answer) => ChallengeVerdict {
                passed: true,
                reason: None,
            },
            Ok(_) => ChallengeVerdict {
                passed: false,
                reason: Some(format!("{} answer does not match the log", issued.challenge_type)),
            },
            Err(unanswerable) => ChallengeVerdict {
                passed: false,
                reason: Some(unanswerable.to_string()),
            },
        };

        self.log.append(
            Domain::Referee,
            kinds::CHALLENGE_RESPONSE,
            EventPayload::ChallengeResponse(ChallengeResponse {
                challenge_id: challenge_id.clone(),
                target: issued.target,
                challenge_type: issued.challenge_type,
                answer: answer.to_string(),
                passed: verdict.passed,
                reason: verdict.reason.clone(),
            }),
        )?;

        if verdict.passed {
            info!(id = %challenge_id, "Challenge passed");
        } else {
            warn!(id = %challenge_id, reason = ?verdict.reason, "Challenge failed");
        }
        Ok(verdict)
    }

    /// Current view of a challenge, including its answer once resolved.
    pub fn challenge(&self, challenge_id: &EventId) -> Result<Option<Challenge>> {
        let chain = self.log.chain()?;
        let Some(issued) = find_issued(&chain, challenge_id) else {
            return Ok(None);
        };
        let response = find_response(&chain, challenge_id);

        Ok(Some(Challenge {
            id: challenge_id.clone(),
            target: issued.target.clone(),
            challenge_type: issued.challenge_type,
            question: issued.question.clone(),
            anchor_index: issued.anchor_index,
            answer: response.map(|r| r.answer.clone()),
            passed: response.map(|r| r.passed),
        }))
    }
}

fn view_digest(view: &View) -> Result<String> {
    let bytes = serde_json::to_vec(&view.data)?;
    Ok(hash_hex(blake3::hash(&bytes).as_bytes()))
}

fn find_issued<'a>(chain: &'a Chain, id: &EventId) -> Option<&'a ChallengeIssued> {
    match chain.find(id).map(|r| r.payload()) {
        Some(EventPayload::ChallengeIssued(issued)) => Some(issued),
        _ => None,
    }
}

fn find_response<'a>(chain: &'a Chain, id: &EventId) -> Option<&'a ChallengeResponse> {
    chain.iter().find_map(|r| match r.payload() {
        EventPayload::ChallengeResponse(response) if &response.challenge_id == id => Some(response),
        _ => None,
    })
}
