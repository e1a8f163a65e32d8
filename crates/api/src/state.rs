use std::sync::Arc;

use mongodb::Database;

use intervue_config::Settings;
use intervue_engine::session::SessionDeps;
use intervue_services::auth::AuthService;
use intervue_services::dao::interview::InterviewDao;
use intervue_services::dao::response::QuestionResponseDao;
use intervue_services::llm::{GroqClient, LlmClient};
use intervue_services::resume::{ResumeStore, TextExtractor, Utf8TextExtractor};
use intervue_services::store::{InterviewStore, MongoInterviewStore};
use intervue_services::transcribe::{HttpTranscriber, Transcriber};

use crate::ws::registry::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub auth: Arc<AuthService>,
    pub interviews: Arc<InterviewDao>,
    pub responses: Arc<QuestionResponseDao>,
    pub store: Arc<dyn InterviewStore>,
    pub llm: Option<Arc<dyn LlmClient>>,
    pub transcriber: Option<Arc<dyn Transcriber>>,
    pub resumes: Arc<ResumeStore>,
    pub text_extractor: Arc<dyn TextExtractor>,
    pub registry: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(settings: Settings, db: &Database) -> Self {
        let interviews = Arc::new(InterviewDao::new(db));
        let responses = Arc::new(QuestionResponseDao::new(db));
        let store: Arc<dyn InterviewStore> = Arc::new(MongoInterviewStore::new(
            interviews.clone(),
            responses.clone(),
        ));

        let llm: Option<Arc<dyn LlmClient>> = GroqClient::from_settings(&settings.llm)
            .map(|client| Arc::new(client) as Arc<dyn LlmClient>);
        if llm.is_none() {
            tracing::warn!(
                "No LLM API key configured; interviews run on deterministic fallbacks only"
            );
        }

        let transcriber: Option<Arc<dyn Transcriber>> =
            HttpTranscriber::from_settings(&settings.llm)
                .map(|t| Arc::new(t) as Arc<dyn Transcriber>);

        Self {
            auth: Arc::new(AuthService::new(&settings.auth)),
            settings: Arc::new(settings),
            interviews,
            responses,
            store,
            llm,
            transcriber,
            resumes: Arc::new(ResumeStore::new()),
            text_extractor: Arc::new(Utf8TextExtractor),
            registry: Arc::new(SessionRegistry::new()),
        }
    }

    /// Capability bundle handed to the session engine, one per connection.
    pub fn session_deps(&self) -> SessionDeps {
        SessionDeps {
            llm: self.llm.clone(),
            store: self.store.clone(),
            settings: self.settings.interview.clone(),
        }
    }
}
