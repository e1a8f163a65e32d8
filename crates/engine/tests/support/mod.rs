//! In-memory doubles for the engine's capability traits.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use intervue_services::dao::base::DaoError;
use intervue_services::llm::{GenerationRequest, LlmClient, LlmError};
use intervue_services::store::{
    CompletionWrite, InterviewStore, NewQuestionResponse, NewSession,
};

/// Scripted LLM: pops replies in order; `None` entries fail the call. When
/// the script runs dry it falls back to `default` (or fails).
pub struct MockLlm {
    replies: Mutex<VecDeque<Option<String>>>,
    default: Option<String>,
    calls: AtomicUsize,
}

impl MockLlm {
    pub fn scripted<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Option<String>>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            default: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(reply: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            default: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn generate(&self, _request: GenerationRequest) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Some(reply)) => Ok(reply),
            Some(None) => Err(LlmError::Unavailable("scripted failure".to_string())),
            None => match &self.default {
                Some(reply) => Ok(reply.clone()),
                None => Err(LlmError::Unavailable("script exhausted".to_string())),
            },
        }
    }
}

#[derive(Default)]
pub struct StoredSession {
    pub session: Option<NewSession>,
    pub completion: Option<CompletionWrite>,
    pub progress_updates: usize,
}

/// Hash-map store mirroring the Mongo store's conditional-completion
/// semantics: the first completion write wins, later ones report `false`.
#[derive(Default)]
pub struct MemoryStore {
    pub sessions: Mutex<HashMap<String, StoredSession>>,
    pub responses: Mutex<Vec<NewQuestionResponse>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completion_for(&self, session_id: &str) -> Option<CompletionWrite> {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .and_then(|s| s.completion.clone())
    }

    pub fn completion_count(&self) -> usize {
        self.sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.completion.is_some())
            .count()
    }

    pub fn responses_for(&self, session_id: &str) -> Vec<NewQuestionResponse> {
        self.responses
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl InterviewStore for MemoryStore {
    async fn create_session(&self, session: NewSession) -> Result<(), DaoError> {
        let mut sessions = self.sessions.lock().unwrap();
        let entry = sessions.entry(session.session_id.clone()).or_default();
        if entry.session.is_some() {
            return Err(DaoError::DuplicateKey(session.session_id));
        }
        entry.session = Some(session);
        Ok(())
    }

    async fn session_exists(&self, session_id: &str) -> Result<bool, DaoError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .get(session_id)
            .is_some_and(|s| s.session.is_some()))
    }

    async fn update_progress(
        &self,
        session_id: &str,
        _current_question_index: u32,
        _completed_questions: u32,
        _individual_scores: &[f64],
        _average_score: f64,
    ) -> Result<(), DaoError> {
        if let Some(entry) = self.sessions.lock().unwrap().get_mut(session_id) {
            entry.progress_updates += 1;
        }
        Ok(())
    }

    async fn update_total_questions(&self, _session_id: &str, _total: u32) -> Result<(), DaoError> {
        Ok(())
    }

    async fn store_question_response(
        &self,
        response: NewQuestionResponse,
    ) -> Result<(), DaoError> {
        self.responses.lock().unwrap().push(response);
        Ok(())
    }

    async fn complete_session(&self, write: CompletionWrite) -> Result<bool, DaoError> {
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get_mut(&write.session_id) {
            Some(entry) if entry.session.is_some() => {
                if entry.completion.is_some() {
                    Ok(false)
                } else {
                    entry.completion = Some(write);
                    Ok(true)
                }
            }
            _ => Ok(false),
        }
    }
}

/// A realistic non-boilerplate submission.
pub const SOLUTION_CODE: &str = "def max_subarray(nums):\n    best = nums[0]\n    current = nums[0]\n    for n in nums[1:]:\n        current = max(n, current + n)\n        best = max(best, current)\n    return best\n";

pub fn evaluation_reply(tier: &str) -> String {
    format!(
        r#"{{"technical_correctness": "{tier}", "feedback": "Solid solution.", "correctness_reason": "Logic holds.", "edge_cases_handled": ["empty input"], "areas_for_improvement": ["naming"]}}"#
    )
}

pub fn interviewer_reply_json(rating: u32, next_question: &str) -> String {
    format!(
        r#"{{"evaluation": "Rating: {rating}/10 - Good depth and clear examples.", "next_question": "{next_question}"}}"#
    )
}
