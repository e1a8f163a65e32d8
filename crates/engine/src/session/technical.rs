//! Technical (code-based) interview sessions.
//!
//! The question set is generated up-front after `init_technical`; the
//! session then walks the questions one `submit_code` at a time, tracking
//! per-question counters that feed the evaluator's deduction formula.

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use intervue_db::models::{CompletionMethod, InterviewMode, Question};
use intervue_protocol::ServerMsg;
use intervue_services::llm::{GenerationRequest, LlmClient};
use intervue_services::store::{NewQuestionResponse, NewSession};

use crate::completion::{self, CompletionContext, EnrichmentInput};
use crate::evaluate::{self, SubmissionSignals};
use crate::questions;

use super::{PerQuestionCounters, SessionDeps, SessionError, SessionPhase, is_clarification};

const APPROACH_FALLBACK: &str = "Good start on explaining your approach. Consider discussing \
                                 time complexity and edge cases for a more complete analysis.";

#[derive(Debug, Clone)]
pub struct CodeSubmissionRecord {
    pub question_number: u32,
    pub code: String,
    pub language: String,
    pub hints_used_so_far: u32,
}

#[derive(Debug, Clone)]
pub struct VoiceResponse {
    pub question_number: u32,
    pub transcript: String,
}

#[derive(Debug)]
pub struct TechnicalSession {
    session_id: String,
    user_id: String,
    topics: Vec<String>,
    phase: SessionPhase,
    questions: Vec<Question>,
    current_question_index: usize,
    scores: Vec<f64>,
    counters: PerQuestionCounters,
    code_submissions: Vec<CodeSubmissionRecord>,
    voice_responses: Vec<VoiceResponse>,
    start_time: DateTime<Utc>,
    question_start_time: DateTime<Utc>,
    completed: bool,
}

impl TechnicalSession {
    pub fn new(user_id: String, topics: Vec<String>) -> Result<Self, SessionError> {
        if topics.is_empty() {
            return Err(SessionError::EmptyTopics);
        }

        let now = Utc::now();
        let session = Self {
            session_id: Uuid::new_v4().to_string(),
            user_id,
            topics,
            phase: SessionPhase::Created,
            questions: Vec::new(),
            current_question_index: 0,
            scores: Vec::new(),
            counters: PerQuestionCounters::default(),
            code_submissions: Vec::new(),
            voice_responses: Vec::new(),
            start_time: now,
            question_start_time: now,
            completed: false,
        };

        info!(session_id = %session.session_id, topics = ?session.topics, "Technical session created");
        Ok(session)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn current_question_index(&self) -> usize {
        self.current_question_index
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_question_index)
    }

    /// Generates the question set and creates the session record. Until
    /// this returns, the session is in `QuestionsPending` and every
    /// answer-path message is rejected with a clear not-ready error.
    pub async fn prepare_questions(&mut self, deps: &SessionDeps) -> Vec<ServerMsg> {
        self.phase = SessionPhase::QuestionsPending;

        self.questions =
            questions::build_question_set(deps.llm(), &self.topics, &deps.settings).await;

        self.phase = SessionPhase::InProgress;
        self.question_start_time = Utc::now();

        if let Err(e) = deps
            .store
            .create_session(NewSession {
                session_id: self.session_id.clone(),
                user_id: self.user_id.clone(),
                interview_type: InterviewMode::Technical,
                topics: self.topics.clone(),
                total_questions: self.questions.len() as u32,
                start_time: self.start_time,
            })
            .await
        {
            warn!(session_id = %self.session_id, %e, "Initial session record create failed");
        }

        match self.current_question() {
            Some(question) => vec![ServerMsg::Question {
                next_question: question.text.clone(),
                difficulty: question.difficulty,
                topics: question.topics.clone(),
            }],
            None => vec![ServerMsg::error(
                "No questions available for selected topics",
            )],
        }
    }

    fn ensure_in_progress(&self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::InProgress => Ok(()),
            SessionPhase::Created | SessionPhase::QuestionsPending => {
                Err(SessionError::QuestionsNotReady)
            }
            SessionPhase::Completed => Err(SessionError::AlreadyEnded),
        }
    }

    pub async fn handle_submit_code(
        &mut self,
        deps: &SessionDeps,
        code: &str,
        language: &str,
        time_spent_ms: u64,
        client_reported_hints: u32,
    ) -> Result<Vec<ServerMsg>, SessionError> {
        self.ensure_in_progress()?;

        // Idempotency guard against duplicate submission of one question.
        if self.counters.question_submitted {
            return Err(SessionError::AlreadySubmitted);
        }
        self.counters.question_submitted = true;

        let question_number = self.current_question_index as u32 + 1;
        self.code_submissions.push(CodeSubmissionRecord {
            question_number,
            code: code.to_string(),
            language: language.to_string(),
            hints_used_so_far: self.counters.hints_used,
        });

        let question = self
            .current_question()
            .cloned()
            .expect("in-progress session has a current question");

        let signals = SubmissionSignals {
            // The server-side counter is authoritative; the client's field
            // can only add hints the server somehow missed.
            hints_used: self.counters.hints_used.max(client_reported_hints),
            discussion_turns: self.counters.discussion_turns,
            clarification_questions: self.counters.clarification_questions,
            approach_discussed: self.counters.approach_discussed,
        };

        let (score, detail) =
            evaluate::evaluate_submission(deps.llm(), &question, code, language, time_spent_ms, signals)
                .await;
        self.scores.push(score as f64);

        info!(
            session_id = %self.session_id,
            question_number,
            score,
            correctness = %detail.technical_correctness,
            "Submission evaluated"
        );

        let feedback = if detail.feedback.is_empty() {
            format!("Score: {score}/100")
        } else {
            detail.feedback.clone()
        };

        let now = Utc::now();
        let time_taken_secs = (now - self.question_start_time).num_seconds().max(0);

        if let Err(e) = deps
            .store
            .store_question_response(NewQuestionResponse {
                session_id: self.session_id.clone(),
                question_index: question_number,
                question: question.text.clone(),
                user_response: code.to_string(),
                score: score as f64,
                feedback: feedback.clone(),
                time_taken_secs,
                hints_used: self.counters.hints_used,
                difficulty: question.difficulty.as_str().to_string(),
                language: Some(language.to_string()),
            })
            .await
        {
            warn!(session_id = %self.session_id, %e, "Question response store failed");
        }

        let mut msgs = vec![ServerMsg::CodeFeedback {
            code_feedback: format!("Question {question_number} completed! {feedback}"),
            score,
            question_number,
        }];

        if self.current_question_index + 1 >= self.questions.len() {
            // Natural exhaustion: the last question was just scored.
            let average = self.average_score();
            let results = self.complete(deps, CompletionMethod::Automatic).await;
            msgs.push(ServerMsg::InterviewComplete {
                final_feedback: format!(
                    "Technical interview completed! Final score: {average:.1}/100"
                ),
                results,
            });
        } else {
            self.advance(deps).await;
            let next = self
                .current_question()
                .expect("advance stays within bounds");
            msgs.push(ServerMsg::QuestionComplete {
                score,
                question_number: self.current_question_index as u32 + 1,
                next_question: next.text.clone(),
                difficulty: next.difficulty,
                topics: next.topics.clone(),
                total_questions: self.questions.len() as u32,
                remaining_questions: (self.questions.len() - self.current_question_index) as u32,
            });
        }

        Ok(msgs)
    }

    /// Moves the cursor forward and clears the per-question counters.
    /// The cursor only ever increases.
    async fn advance(&mut self, deps: &SessionDeps) {
        self.current_question_index += 1;
        self.counters.reset_for_next_question();
        self.question_start_time = Utc::now();

        if let Err(e) = deps
            .store
            .update_progress(
                &self.session_id,
                self.current_question_index as u32,
                self.scores.len() as u32,
                &self.scores,
                self.average_score(),
            )
            .await
        {
            warn!(session_id = %self.session_id, %e, "Progress update failed");
        }
    }

    pub async fn handle_request_hint(
        &mut self,
        deps: &SessionDeps,
        code: &str,
        language: &str,
    ) -> Result<Vec<ServerMsg>, SessionError> {
        self.ensure_in_progress()?;

        let question = self
            .current_question()
            .cloned()
            .expect("in-progress session has a current question");

        let hint = questions::generate_hint(
            deps.llm(),
            &question,
            code,
            language,
            self.counters.hints_used,
        )
        .await;
        self.counters.hints_used += 1;

        Ok(vec![ServerMsg::Hint {
            hint,
            hints_used: self.counters.hints_used,
        }])
    }

    /// Approach discussion: purely observational, feeds the evaluator's
    /// deduction inputs and never changes the question cursor.
    pub async fn handle_voice_approach(
        &mut self,
        deps: &SessionDeps,
        transcript: &str,
    ) -> Result<Vec<ServerMsg>, SessionError> {
        self.ensure_in_progress()?;

        if transcript.trim().is_empty() {
            return Err(SessionError::EmptyAnswer);
        }

        self.voice_responses.push(VoiceResponse {
            question_number: self.current_question_index as u32 + 1,
            transcript: transcript.to_string(),
        });
        self.counters.discussion_turns += 1;
        if is_clarification(transcript) {
            self.counters.clarification_questions += 1;
        }
        self.counters.approach_discussed = true;

        let question = self
            .current_question()
            .cloned()
            .expect("in-progress session has a current question");
        let feedback = analyze_approach(deps.llm(), &question, transcript).await;

        Ok(vec![ServerMsg::ApproachFeedback {
            feedback,
            approach_discussed: true,
        }])
    }

    /// Explicit graceful termination (`end_interview`).
    pub async fn end(&mut self, deps: &SessionDeps) -> Result<Vec<ServerMsg>, SessionError> {
        if self.completed {
            return Err(SessionError::AlreadyEnded);
        }

        let completed_count = self.scores.len();
        let total = self.questions.len();
        let average = self.average_score();

        let results = self.complete(deps, CompletionMethod::ManuallyEnded).await;

        Ok(vec![ServerMsg::InterviewComplete {
            final_feedback: format!(
                "Interview ended manually. Final score: {average:.1}/100 \
                 ({completed_count}/{total} questions completed)"
            ),
            results,
        }])
    }

    /// Forced immediate termination. Always acknowledges; a second stop
    /// after completion is a no-op.
    pub async fn force_stop(&mut self, deps: &SessionDeps) -> Vec<ServerMsg> {
        if !self.completed {
            self.complete(deps, CompletionMethod::ForceStopped).await;
        }

        vec![ServerMsg::InterviewStopped {
            message: "Interview forcefully terminated".to_string(),
        }]
    }

    /// Best-effort persistence when the connection drops mid-interview.
    pub async fn handle_disconnect(&mut self, deps: &SessionDeps) {
        if self.completed {
            return;
        }
        self.completed = true;
        self.phase = SessionPhase::Completed;

        info!(session_id = %self.session_id, "Connection dropped, persisting partial session");
        completion::finalize(
            None,
            deps.store.as_ref(),
            self.completion_context(),
            CompletionMethod::Disconnected,
        )
        .await;
    }

    async fn complete(&mut self, deps: &SessionDeps, method: CompletionMethod) -> serde_json::Value {
        self.completed = true;
        self.phase = SessionPhase::Completed;

        completion::finalize(
            deps.llm(),
            deps.store.as_ref(),
            self.completion_context(),
            method,
        )
        .await
    }

    fn completion_context(&self) -> CompletionContext {
        CompletionContext {
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
            mode: InterviewMode::Technical,
            topics: self.topics.clone(),
            total_questions: self.questions.len() as u32,
            start_time: self.start_time,
            scores: self.scores.clone(),
            enrichment: EnrichmentInput::Technical {
                questions: self.questions.clone(),
            },
        }
    }

    fn average_score(&self) -> f64 {
        if self.scores.is_empty() {
            0.0
        } else {
            self.scores.iter().sum::<f64>() / self.scores.len() as f64
        }
    }
}

/// Interviewer-style feedback on an approach discussion. Total.
async fn analyze_approach(
    llm: Option<&dyn LlmClient>,
    question: &Question,
    transcript: &str,
) -> String {
    let Some(llm) = llm else {
        return APPROACH_FALLBACK.to_string();
    };

    let prompt = format!(
        r#"Analyze the candidate's approach discussion for this technical interview question.

Question: {question}
Topics: {topics}

Candidate's Approach Discussion:
"{transcript}"

Evaluate:
1. Problem understanding demonstrated
2. Approach clarity and correctness
3. Consideration of edge cases
4. Time/space complexity awareness

Reply like an interviewer (2-3 sentences) focusing on strengths and areas for improvement."#,
        question = question.text,
        topics = question.topics.join(", "),
    );

    let request = GenerationRequest::new(prompt)
        .with_temperature(0.4)
        .with_max_tokens(300);

    match llm.generate(request).await {
        Ok(feedback) if !feedback.trim().is_empty() => feedback.trim().to_string(),
        Ok(_) => APPROACH_FALLBACK.to_string(),
        Err(e) => {
            warn!(%e, "Approach analysis failed, using fallback feedback");
            APPROACH_FALLBACK.to_string()
        }
    }
}
