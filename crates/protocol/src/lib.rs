//! Shared WebSocket protocol types (ClientMsg, ServerMsg).
//!
//! Both sides speak JSON objects discriminated by a `"type"` field. The
//! frontend sends `ClientMsg`; the server replies with one or more
//! `ServerMsg` per inbound message.

use intervue_db::models::Difficulty;
use serde::{Deserialize, Serialize};

/// Messages received from the candidate's browser.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Starts a conversational session (topic-based or resume-based).
    Init {
        mode: InitMode,
        #[serde(default)]
        topics: Vec<String>,
        resume_id: Option<String>,
    },
    /// Starts a technical (code-based) session.
    InitTechnical {
        #[serde(default)]
        topics: Vec<String>,
    },
    /// Free-text answer in a conversational session.
    Answer { text: String },
    /// Code shared as an answer in a conversational session.
    CodeSubmission { code: String },
    /// Formal submission of the current technical question.
    SubmitCode {
        code: String,
        #[serde(default = "default_language")]
        language: String,
        /// Milliseconds the candidate spent, as reported by the client.
        #[serde(default)]
        time_spent: u64,
        #[serde(default)]
        hints_used: u32,
    },
    RequestHint {
        #[serde(default)]
        code: String,
        #[serde(default = "default_language")]
        language: String,
    },
    /// Client-side transcript of an approach discussion.
    VoiceApproach { transcript: String },
    /// Server-side audio capture request (legacy; see the handler).
    RecordAudio,
    /// Graceful end of a conversational session.
    End,
    /// Graceful end of a technical session.
    EndInterview,
    /// Forced immediate termination.
    StopInterview { session_id: Option<String> },
}

fn default_language() -> String {
    "python".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitMode {
    Topics,
    Resume,
}

/// Messages sent to the candidate's browser.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    Ready {
        message: String,
        next_question: String,
    },
    /// Technical-mode ack while the question set is generated.
    Initializing { message: String },
    Question {
        next_question: String,
        difficulty: Difficulty,
        topics: Vec<String>,
    },
    Assessment {
        evaluation: String,
        next_question: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        hint: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        final_feedback: Option<String>,
    },
    CodeFeedback {
        code_feedback: String,
        score: u32,
        question_number: u32,
    },
    QuestionComplete {
        score: u32,
        question_number: u32,
        next_question: String,
        difficulty: Difficulty,
        topics: Vec<String>,
        total_questions: u32,
        remaining_questions: u32,
    },
    InterviewComplete {
        final_feedback: String,
        results: serde_json::Value,
    },
    Hint {
        hint: String,
        hints_used: u32,
    },
    ApproachFeedback {
        feedback: String,
        approach_discussed: bool,
    },
    Transcribed { transcript: String },
    Error { error: String },
    Ended {
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
    InterviewStopped { message: String },
}

impl ServerMsg {
    pub fn error(msg: impl Into<String>) -> Self {
        ServerMsg::Error { error: msg.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_msg_parses_by_type_tag() {
        let msg: ClientMsg = serde_json::from_str(
            r#"{"type": "init", "mode": "topics", "topics": ["Graphs", "Trees"]}"#,
        )
        .unwrap();
        match msg {
            ClientMsg::Init { mode, topics, .. } => {
                assert_eq!(mode, InitMode::Topics);
                assert_eq!(topics, vec!["Graphs", "Trees"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn submit_code_defaults() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type": "submit_code", "code": "def f(): return 1"}"#)
                .unwrap();
        match msg {
            ClientMsg::SubmitCode {
                language,
                time_spent,
                hints_used,
                ..
            } => {
                assert_eq!(language, "python");
                assert_eq!(time_spent, 0);
                assert_eq!(hints_used, 0);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_an_error() {
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type": "bogus"}"#).is_err());
    }

    #[test]
    fn server_msg_carries_type_tag() {
        let json = serde_json::to_value(ServerMsg::Hint {
            hint: "Think about a stack.".to_string(),
            hints_used: 1,
        })
        .unwrap();
        assert_eq!(json["type"], "hint");
        assert_eq!(json["hints_used"], 1);
    }

    #[test]
    fn assessment_omits_empty_optionals() {
        let json = serde_json::to_string(&ServerMsg::Assessment {
            evaluation: "Rating: 7/10".to_string(),
            next_question: "Next?".to_string(),
            hint: None,
            final_feedback: None,
        })
        .unwrap();
        assert!(!json.contains("hint"));
        assert!(!json.contains("final_feedback"));
    }
}
