//! Conversational interview sessions (topic-based and resume-based).
//!
//! Questions are generated one at a time by the interviewer LLM; each
//! candidate answer is scored from the evaluation text and persisted as it
//! arrives. Responses are attributed one message in arrears: the question a
//! candidate just answered is the previous reply's `next_question` (or the
//! mode's fixed opener for the first turn), never the freshly returned one.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use intervue_db::models::{CompletionMethod, InterviewMode};
use intervue_protocol::ServerMsg;
use intervue_services::llm::{GenerationRequest, LlmClient, parse_llm_json};
use intervue_services::store::{NewQuestionResponse, NewSession};

use crate::completion::{self, CompletionContext, EnrichmentInput};
use crate::enrich::QaRound;
use crate::scoring::extract_score;

use super::{SessionDeps, SessionError};

const TOPICS_OPENER: &str = "Let's begin. Can you introduce yourself?";
const RESUME_OPENER: &str =
    "Thanks for sharing your resume. Could you give a brief overview of your background?";

/// One scored exchange: the candidate's message, the interviewer's
/// evaluation of it, and the question asked next.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub candidate: String,
    pub evaluation: String,
    pub next_question: String,
    pub hint: Option<String>,
    pub final_feedback: Option<String>,
    pub score: u32,
    pub time_taken_secs: i64,
}

#[derive(Debug)]
pub struct ConversationalSession {
    session_id: String,
    user_id: String,
    mode: InterviewMode,
    topics: Vec<String>,
    resume_text: Option<String>,
    system_prompt: String,
    conversation: Vec<ConversationTurn>,
    scores: Vec<f64>,
    start_time: DateTime<Utc>,
    last_question_time: DateTime<Utc>,
    completed: bool,
}

impl ConversationalSession {
    /// Starts a topic-based session: builds the interviewer prompt, persists
    /// the initial record and emits the opener.
    pub async fn init_topics(
        deps: &SessionDeps,
        user_id: String,
        topics: Vec<String>,
    ) -> Result<(Self, Vec<ServerMsg>), SessionError> {
        if topics.is_empty() {
            return Err(SessionError::EmptyTopics);
        }

        let session = Self::create(
            deps,
            user_id,
            InterviewMode::Topics,
            topics.clone(),
            None,
            topics_prompt(&topics),
        )
        .await;

        let msgs = vec![ServerMsg::Ready {
            message: "Topic-based interview initialized".to_string(),
            next_question: TOPICS_OPENER.to_string(),
        }];
        Ok((session, msgs))
    }

    /// Starts a resume-based session from previously extracted resume text.
    pub async fn init_resume(
        deps: &SessionDeps,
        user_id: String,
        resume_text: Option<String>,
    ) -> Result<(Self, Vec<ServerMsg>), SessionError> {
        let resume_text = resume_text.ok_or(SessionError::InvalidResume)?;

        let session = Self::create(
            deps,
            user_id,
            InterviewMode::Resume,
            vec!["Resume-Based".to_string()],
            Some(resume_text.clone()),
            resume_prompt(&resume_text),
        )
        .await;

        let msgs = vec![ServerMsg::Ready {
            message: "Resume-based interview initialized".to_string(),
            next_question: RESUME_OPENER.to_string(),
        }];
        Ok((session, msgs))
    }

    async fn create(
        deps: &SessionDeps,
        user_id: String,
        mode: InterviewMode,
        topics: Vec<String>,
        resume_text: Option<String>,
        system_prompt: String,
    ) -> Self {
        let session_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        // Initial record; the interview proceeds either way and the
        // completion coordinator can recreate a missing record later.
        if let Err(e) = deps
            .store
            .create_session(NewSession {
                session_id: session_id.clone(),
                user_id: user_id.clone(),
                interview_type: mode,
                topics: topics.clone(),
                total_questions: 0,
                start_time: now,
            })
            .await
        {
            warn!(%session_id, %e, "Initial session record create failed");
        }

        info!(%session_id, mode = mode.as_str(), "Conversational session created");

        Self {
            session_id,
            user_id,
            mode,
            topics,
            resume_text,
            system_prompt,
            conversation: Vec::new(),
            scores: Vec::new(),
            start_time: now,
            last_question_time: now,
            completed: false,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    fn opener(&self) -> &'static str {
        match self.mode {
            InterviewMode::Resume => RESUME_OPENER,
            _ => TOPICS_OPENER,
        }
    }

    /// The question the incoming answer belongs to: previous reply's
    /// `next_question`, or the opener on the first turn.
    fn current_question_text(&self) -> String {
        self.conversation
            .last()
            .map(|turn| turn.next_question.clone())
            .unwrap_or_else(|| self.opener().to_string())
    }

    pub async fn handle_answer(
        &mut self,
        deps: &SessionDeps,
        text: &str,
    ) -> Result<Vec<ServerMsg>, SessionError> {
        if self.completed {
            return Err(SessionError::AlreadyEnded);
        }
        let candidate = text.trim();
        if candidate.is_empty() {
            return Err(SessionError::EmptyAnswer);
        }

        let word_count = candidate.split_whitespace().count();
        self.score_exchange(deps, candidate.to_string(), move |score| {
            derive_text_difficulty(score, word_count)
        })
        .await
    }

    pub async fn handle_code_submission(
        &mut self,
        deps: &SessionDeps,
        code: &str,
    ) -> Result<Vec<ServerMsg>, SessionError> {
        if self.completed {
            return Err(SessionError::AlreadyEnded);
        }
        if code.trim().is_empty() {
            return Err(SessionError::EmptyCode);
        }

        let line_count = code.lines().count();
        let candidate = format!("[Code Submission]\n{code}");
        self.score_exchange(deps, candidate, move |score| {
            derive_code_difficulty(score, line_count)
        })
        .await
    }

    async fn score_exchange(
        &mut self,
        deps: &SessionDeps,
        candidate: String,
        difficulty_for: impl FnOnce(u32) -> &'static str,
    ) -> Result<Vec<ServerMsg>, SessionError> {
        let reply =
            interviewer_reply(deps.llm(), &self.system_prompt, &self.conversation, &candidate)
                .await;

        let score = extract_score(&reply.evaluation);
        let now = Utc::now();
        let time_taken_secs = (now - self.last_question_time).num_seconds().max(0);
        let question_text = self.current_question_text();

        self.conversation.push(ConversationTurn {
            candidate: candidate.clone(),
            evaluation: reply.evaluation.clone(),
            next_question: reply.next_question.clone(),
            hint: reply.hint.clone(),
            final_feedback: reply.final_feedback.clone(),
            score,
            time_taken_secs,
        });
        self.scores.push(score as f64);
        self.last_question_time = now;

        let question_index = self.conversation.len() as u32;
        let average = self.average_score();

        // Real-time progress and the per-question record are best-effort.
        if let Err(e) = deps
            .store
            .update_progress(
                &self.session_id,
                question_index,
                question_index,
                &self.scores,
                average,
            )
            .await
        {
            warn!(session_id = %self.session_id, %e, "Progress update failed");
        }

        // Conversational question sets grow one exchange at a time.
        if let Err(e) = deps
            .store
            .update_total_questions(&self.session_id, question_index)
            .await
        {
            warn!(session_id = %self.session_id, %e, "Total-questions update failed");
        }

        if let Err(e) = deps
            .store
            .store_question_response(NewQuestionResponse {
                session_id: self.session_id.clone(),
                question_index,
                question: question_text,
                user_response: candidate,
                score: score as f64,
                feedback: reply.evaluation.clone(),
                time_taken_secs,
                hints_used: 0,
                difficulty: difficulty_for(score).to_string(),
                language: None,
            })
            .await
        {
            warn!(session_id = %self.session_id, %e, "Question response store failed");
        }

        Ok(vec![ServerMsg::Assessment {
            evaluation: reply.evaluation,
            next_question: reply.next_question,
            hint: reply.hint,
            final_feedback: reply.final_feedback,
        }])
    }

    fn average_score(&self) -> f64 {
        if self.scores.is_empty() {
            0.0
        } else {
            self.scores.iter().sum::<f64>() / self.scores.len() as f64
        }
    }

    fn completion_context(&self) -> CompletionContext {
        let conversation = self
            .conversation
            .iter()
            .map(|turn| QaRound {
                question: turn.next_question.clone(),
                answer: turn.candidate.clone(),
                evaluation: turn.evaluation.clone(),
                // Enrichment context speaks the 10-point scale.
                score: if turn.score > 10 {
                    turn.score as f64 / 10.0
                } else {
                    turn.score as f64
                },
            })
            .collect();

        CompletionContext {
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
            mode: self.mode,
            topics: self.topics.clone(),
            total_questions: self.conversation.len() as u32,
            start_time: self.start_time,
            scores: self.scores.clone(),
            enrichment: EnrichmentInput::Conversational {
                conversation,
                resume_text: self.resume_text.clone(),
            },
        }
    }

    /// Explicit graceful termination (`end`).
    pub async fn end(&mut self, deps: &SessionDeps) -> Result<Vec<ServerMsg>, SessionError> {
        if self.completed {
            return Err(SessionError::AlreadyEnded);
        }
        self.completed = true;

        completion::finalize(
            deps.llm(),
            deps.store.as_ref(),
            self.completion_context(),
            CompletionMethod::ManuallyEnded,
        )
        .await;

        Ok(vec![ServerMsg::Ended {
            session_id: Some(self.session_id.clone()),
        }])
    }

    /// Forced immediate termination (`stop_interview`). Always acknowledges;
    /// a second stop after completion is a no-op.
    pub async fn force_stop(&mut self, deps: &SessionDeps) -> Vec<ServerMsg> {
        if !self.completed {
            self.completed = true;
            completion::finalize(
                deps.llm(),
                deps.store.as_ref(),
                self.completion_context(),
                CompletionMethod::ForceStopped,
            )
            .await;
        }

        vec![ServerMsg::InterviewStopped {
            message: "Interview forcefully terminated".to_string(),
        }]
    }

    /// Best-effort persistence when the connection drops. No enrichment
    /// round-trip: nobody is waiting on the result.
    pub async fn handle_disconnect(&mut self, deps: &SessionDeps) {
        if self.completed {
            return;
        }
        self.completed = true;

        info!(session_id = %self.session_id, "Connection dropped, persisting partial session");
        completion::finalize(
            None,
            deps.store.as_ref(),
            self.completion_context(),
            CompletionMethod::Disconnected,
        )
        .await;
    }
}

#[derive(Debug, Clone)]
pub struct InterviewerReply {
    pub evaluation: String,
    pub next_question: String,
    pub hint: Option<String>,
    pub final_feedback: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InterviewerReplyRaw {
    #[serde(default)]
    evaluation: String,
    #[serde(default = "default_next_question")]
    next_question: String,
    hint: Option<String>,
    final_feedback: Option<String>,
}

fn default_next_question() -> String {
    "Could you tell me more about that?".to_string()
}

/// Asks the interviewer LLM to evaluate the latest response and pose the
/// next question. Total: degrades to a neutral scripted reply so a down LLM
/// never stalls the interview.
async fn interviewer_reply(
    llm: Option<&dyn LlmClient>,
    system_prompt: &str,
    conversation: &[ConversationTurn],
    candidate: &str,
) -> InterviewerReply {
    if let Some(llm) = llm {
        let mut history = String::new();
        for turn in conversation {
            history.push_str(&format!(
                "Candidate: {}\nInterviewer evaluation: {}\nInterviewer question: {}\n\n",
                turn.candidate, turn.evaluation, turn.next_question,
            ));
        }

        let prompt = format!(
            "Conversation so far:\n{history}\nCandidate's latest response:\n{candidate}\n\n\
             Reply with the JSON object described in your instructions."
        );

        let request = GenerationRequest::new(prompt)
            .with_system(system_prompt.to_string())
            .with_temperature(0.4)
            .with_max_tokens(700);

        match llm.generate(request).await {
            Ok(raw) => match parse_llm_json::<InterviewerReplyRaw>(&raw) {
                Ok(reply) => {
                    return InterviewerReply {
                        evaluation: reply.evaluation,
                        next_question: reply.next_question,
                        hint: reply.hint,
                        final_feedback: reply.final_feedback,
                    };
                }
                Err(e) => warn!(%e, "Unparseable interviewer reply, using scripted fallback"),
            },
            Err(e) => warn!(%e, "Interviewer LLM call failed, using scripted fallback"),
        }
    }

    InterviewerReply {
        evaluation: "Rating: 5/10 - Response recorded. Detailed feedback is temporarily \
                     unavailable."
            .to_string(),
        next_question: "Could you walk me through a recent project or problem you are proud of \
                        solving?"
            .to_string(),
        hint: None,
        final_feedback: None,
    }
}

fn derive_text_difficulty(score: u32, word_count: usize) -> &'static str {
    if score >= 80 && word_count > 50 {
        "advanced"
    } else if score >= 60 && word_count > 30 {
        "intermediate"
    } else {
        "conversational"
    }
}

fn derive_code_difficulty(score: u32, line_count: usize) -> &'static str {
    if score >= 80 && line_count > 10 {
        "advanced"
    } else if score >= 60 {
        "intermediate"
    } else {
        "conversational"
    }
}

fn topics_prompt(topics: &[String]) -> String {
    format!(
        r#"You are an AI technical interviewer conducting a live mock job interview.

### Interview Topics:
{topics}

### Interview Style:
- Speak in a natural, conversational tone.
- Keep answers concise (2-3 sentences max), like a real interviewer.
- Encourage the candidate to think aloud.
- Adapt follow-up questions based on their last response.
- Be supportive but professional.
- If the candidate uses a technical term that is misspelled or not recognized, infer the intended word and suggest the closest correct term in your feedback.

### Response Format:
ALWAYS reply in JSON with this EXACT structure:
{{
  "evaluation": "MANDATORY: Brief feedback with EXACTLY 'Rating: X/10' where X is 0-10. Example: 'Rating: 7/10 - Good understanding with clear examples.'",
  "next_question": "Your next question for the candidate.",
  "hint": "Optional hint if asked.",
  "final_feedback": "Only include this at the end."
}}

**MANDATORY REQUIREMENT: EVERY evaluation MUST include "Rating: X/10".**"#,
        topics = topics
            .iter()
            .map(|t| format!("- {t}"))
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

fn resume_prompt(resume_text: &str) -> String {
    format!(
        r#"You are an AI technical interviewer conducting a live mock job interview, using the candidate's resume as the primary source for questions.

### Interview Context:
- The candidate's resume is provided below. Use its content to guide your questions.
- Focus on their experience, skills, education, and projects mentioned in the resume.
- If the candidate mentions a project or experience not in the resume, politely ask them to clarify.

### Interview Style:
- Speak in a natural, conversational tone.
- Keep answers concise (2-3 sentences max), like a real interviewer.
- Adapt follow-up questions based on their last response and resume details.
- If the candidate uses a technical term that is misspelled or not recognized, infer the intended word and suggest the closest correct term in your feedback.

### Response Format:
ALWAYS reply in JSON with this EXACT structure:
{{
  "evaluation": "MANDATORY: Brief feedback with EXACTLY 'Rating: X/10' where X is 0-10. Include feedback about technical knowledge, depth, clarity, and resume relevance.",
  "next_question": "Your next question for the candidate.",
  "hint": "Optional hint if asked.",
  "final_feedback": "Only include this at the end."
}}

### Evaluation Scoring:
For EVERY candidate response, assign a score 0-10 based on:
1. Technical/Role Knowledge (30%)
2. Depth & Examples (25%)
3. Resume Relevance (20%)
4. Clarity of Communication (15%)
5. Candidate Initiative (10%)

**MANDATORY REQUIREMENT: EVERY evaluation MUST include "Rating: X/10".**

Resume:
{resume_text}"#,
    )
}
