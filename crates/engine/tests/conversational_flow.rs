//! End-to-end conversational session flows against in-memory doubles.

mod support;

use std::sync::Arc;

use intervue_config::InterviewSettings;
use intervue_db::models::CompletionMethod;
use intervue_engine::session::{ConversationalSession, SessionDeps, SessionError};
use intervue_protocol::ServerMsg;

use support::{MemoryStore, MockLlm, interviewer_reply_json};

fn deps(store: Arc<MemoryStore>, llm: Option<Arc<MockLlm>>) -> SessionDeps {
    SessionDeps {
        llm: llm.map(|l| l as _),
        store,
        settings: InterviewSettings::default(),
    }
}

#[tokio::test]
async fn topic_session_scores_and_attributes_answers_in_arrears() {
    let store = Arc::new(MemoryStore::new());
    let llm = Arc::new(MockLlm::scripted(vec![
        Some(interviewer_reply_json(8, "Tell me about ownership in Rust.")),
        Some(interviewer_reply_json(6, "How does borrowing differ from ownership?")),
    ]));
    let deps = deps(store.clone(), Some(llm));

    let (mut session, msgs) = ConversationalSession::init_topics(
        &deps,
        "user-7".to_string(),
        vec!["Rust".to_string()],
    )
    .await
    .unwrap();

    match &msgs[0] {
        ServerMsg::Ready { next_question, .. } => {
            assert!(next_question.contains("introduce yourself"));
        }
        other => panic!("expected ready, got {other:?}"),
    }

    let msgs = session
        .handle_answer(&deps, "I am a backend engineer with six years of experience.")
        .await
        .unwrap();
    match &msgs[0] {
        ServerMsg::Assessment { evaluation, next_question, .. } => {
            assert!(evaluation.contains("Rating: 8/10"));
            assert_eq!(next_question, "Tell me about ownership in Rust.");
        }
        other => panic!("expected assessment, got {other:?}"),
    }

    session
        .handle_answer(&deps, "Ownership means each value has a single owner.")
        .await
        .unwrap();

    assert_eq!(session.scores(), &[80.0, 60.0]);

    // The persisted record for each answer carries the question it actually
    // answered: the opener first, then the previous reply's next_question.
    let responses = store.responses_for(session.session_id());
    assert_eq!(responses.len(), 2);
    assert!(responses[0].question.contains("introduce yourself"));
    assert_eq!(responses[0].score, 80.0);
    assert_eq!(responses[1].question, "Tell me about ownership in Rust.");
    assert_eq!(responses[1].score, 60.0);
}

#[tokio::test]
async fn code_submission_is_scored_like_an_answer() {
    let store = Arc::new(MemoryStore::new());
    let llm = Arc::new(MockLlm::scripted(vec![Some(interviewer_reply_json(
        9,
        "Nice. Can you optimize it further?",
    ))]));
    let deps = deps(store.clone(), Some(llm));

    let (mut session, _) = ConversationalSession::init_topics(
        &deps,
        "user-7".to_string(),
        vec!["Algorithms".to_string()],
    )
    .await
    .unwrap();

    let msgs = session
        .handle_code_submission(&deps, "def two_sum(xs, t):\n    seen = {}\n    ...")
        .await
        .unwrap();
    assert!(matches!(msgs[0], ServerMsg::Assessment { .. }));
    assert_eq!(session.scores(), &[90.0]);

    let responses = store.responses_for(session.session_id());
    assert!(responses[0].user_response.starts_with("[Code Submission]"));
}

#[tokio::test]
async fn llm_outage_degrades_to_scripted_reply_with_neutral_score() {
    let store = Arc::new(MemoryStore::new());
    let deps = deps(store.clone(), None);

    let (mut session, _) = ConversationalSession::init_topics(
        &deps,
        "user-7".to_string(),
        vec!["Databases".to_string()],
    )
    .await
    .unwrap();

    let msgs = session
        .handle_answer(&deps, "Indexes trade write cost for read speed.")
        .await
        .unwrap();

    match &msgs[0] {
        ServerMsg::Assessment { evaluation, next_question, .. } => {
            assert!(evaluation.contains("Rating: 5/10"));
            assert!(!next_question.is_empty());
        }
        other => panic!("expected assessment, got {other:?}"),
    }
    // The neutral scripted reply scores exactly the empty-text default.
    assert_eq!(session.scores(), &[50.0]);
}

#[tokio::test]
async fn empty_answer_is_rejected_without_state_change() {
    let store = Arc::new(MemoryStore::new());
    let deps = deps(store.clone(), None);

    let (mut session, _) = ConversationalSession::init_topics(
        &deps,
        "user-7".to_string(),
        vec!["Databases".to_string()],
    )
    .await
    .unwrap();

    let err = session.handle_answer(&deps, "   ").await.unwrap_err();
    assert!(matches!(err, SessionError::EmptyAnswer));
    assert!(session.scores().is_empty());
    assert!(store.responses_for(session.session_id()).is_empty());
}

#[tokio::test]
async fn empty_topics_are_rejected_at_init() {
    let store = Arc::new(MemoryStore::new());
    let deps = deps(store, None);

    let err = ConversationalSession::init_topics(&deps, "user-7".to_string(), vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::EmptyTopics));
}

#[tokio::test]
async fn missing_resume_is_rejected_at_init() {
    let store = Arc::new(MemoryStore::new());
    let deps = deps(store, None);

    let err = ConversationalSession::init_resume(&deps, "user-7".to_string(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidResume));
}

#[tokio::test]
async fn end_completes_once_and_later_stop_is_a_noop() {
    let store = Arc::new(MemoryStore::new());
    let llm = Arc::new(MockLlm::scripted(vec![Some(interviewer_reply_json(
        7,
        "What was the hardest bug you fixed?",
    ))]));
    let deps = deps(store.clone(), Some(llm));

    let (mut session, _) = ConversationalSession::init_resume(
        &deps,
        "user-7".to_string(),
        Some("Backend engineer. Rust, Postgres, six years.".to_string()),
    )
    .await
    .unwrap();

    session
        .handle_answer(&deps, "I led the storage team for two years.")
        .await
        .unwrap();

    let msgs = session.end(&deps).await.unwrap();
    assert!(matches!(msgs[0], ServerMsg::Ended { .. }));

    let msgs = session.force_stop(&deps).await;
    assert!(matches!(msgs[0], ServerMsg::InterviewStopped { .. }));

    assert_eq!(store.completion_count(), 1);
    let completion = store.completion_for(session.session_id()).unwrap();
    assert_eq!(completion.completion_method, CompletionMethod::ManuallyEnded);
    assert_eq!(completion.completed_questions, 1);
    assert_eq!(completion.average_score, 70.0);

    // The persisted summary is structurally complete even though the
    // enrichment LLM script was exhausted by then.
    for key in ["interview_summary", "skill_signal_map", "evaluation_metadata"] {
        assert!(completion.final_results.get(key).is_some(), "missing {key}");
    }
    assert_eq!(
        completion.final_results["evaluation_metadata"]["completion_method"],
        "manually_ended"
    );
}

#[tokio::test]
async fn disconnect_persists_partial_conversation() {
    let store = Arc::new(MemoryStore::new());
    let llm = Arc::new(MockLlm::scripted(vec![Some(interviewer_reply_json(
        8,
        "Walk me through your schema design.",
    ))]));
    let deps = deps(store.clone(), Some(llm.clone()));

    let (mut session, _) = ConversationalSession::init_topics(
        &deps,
        "user-7".to_string(),
        vec!["Databases".to_string()],
    )
    .await
    .unwrap();

    session
        .handle_answer(&deps, "I normalized the schema and added covering indexes.")
        .await
        .unwrap();

    let calls_before = llm.call_count();
    session.handle_disconnect(&deps).await;

    let completion = store.completion_for(session.session_id()).unwrap();
    assert_eq!(completion.completion_method, CompletionMethod::Disconnected);
    assert_eq!(completion.individual_scores, vec![80.0]);
    // Nobody is waiting: the disconnect path never performs an LLM call.
    assert_eq!(llm.call_count(), calls_before);
}
