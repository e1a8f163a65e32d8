//! Session state machines for the three interview modes.
//!
//! Each WebSocket connection owns exactly one session, and the connection's
//! receive loop is the only caller, so message handling within a session is
//! sequential by construction; no per-session locking is needed. Handlers
//! return the outbound messages for the transport to deliver and surface
//! every failure as a `SessionError` that the transport converts into a
//! client-visible `error` message without tearing down the connection.

pub mod conversational;
pub mod technical;

use std::sync::Arc;

use intervue_config::InterviewSettings;
use intervue_services::llm::LlmClient;
use intervue_services::store::InterviewStore;

pub use conversational::ConversationalSession;
pub use technical::TechnicalSession;

/// Capabilities a session needs per message. Owned by the transport layer
/// and injected, never reached through globals.
pub struct SessionDeps {
    pub llm: Option<Arc<dyn LlmClient>>,
    pub store: Arc<dyn InterviewStore>,
    pub settings: InterviewSettings,
}

impl SessionDeps {
    pub fn llm(&self) -> Option<&dyn LlmClient> {
        self.llm.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Created,
    /// Technical mode only: the batch question generation is still running
    /// and the session is not answer-ready.
    QuestionsPending,
    InProgress,
    Completed,
}

/// Counters that apply to the current question only. Reset as a unit when
/// the session advances.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerQuestionCounters {
    pub hints_used: u32,
    pub discussion_turns: u32,
    pub clarification_questions: u32,
    pub question_submitted: bool,
    pub approach_discussed: bool,
}

impl PerQuestionCounters {
    pub fn reset_for_next_question(&mut self) {
        *self = Self::default();
    }
}

/// Interrogative markers that flag an approach-discussion turn as a
/// clarification question.
const CLARIFICATION_MARKERS: &[&str] = &[
    "what", "how", "why", "can you", "could you", "explain", "clarify",
];

pub fn is_clarification(transcript: &str) -> bool {
    if transcript.contains('?') {
        return true;
    }
    let lower = transcript.to_lowercase();
    CLARIFICATION_MARKERS.iter().any(|m| lower.contains(m))
}

/// Input-level errors surfaced to the client as `error` messages. None of
/// these mutate session state.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session not initialized. Send 'init' first.")]
    NotInitialized,
    #[error("Questions are still being prepared. Please wait for the first question.")]
    QuestionsNotReady,
    #[error("This question has already been submitted. Please wait for the next question.")]
    AlreadySubmitted,
    #[error("Interview has already ended.")]
    AlreadyEnded,
    #[error("Empty answer text")]
    EmptyAnswer,
    #[error("Empty code submission")]
    EmptyCode,
    #[error("Provide non-empty 'topics' list")]
    EmptyTopics,
    #[error("Invalid or missing resume_id")]
    InvalidResume,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_reset_as_a_unit() {
        let mut counters = PerQuestionCounters {
            hints_used: 3,
            discussion_turns: 2,
            clarification_questions: 1,
            question_submitted: true,
            approach_discussed: true,
        };
        counters.reset_for_next_question();
        assert_eq!(counters.hints_used, 0);
        assert_eq!(counters.discussion_turns, 0);
        assert_eq!(counters.clarification_questions, 0);
        assert!(!counters.question_submitted);
        assert!(!counters.approach_discussed);
    }

    #[test]
    fn question_marks_and_interrogatives_are_clarifications() {
        assert!(is_clarification("Does the input fit in memory?"));
        assert!(is_clarification("Can you explain the constraints"));
        assert!(is_clarification("WHAT is the expected output"));
        assert!(!is_clarification("I will use a hash map and iterate once."));
    }
}
