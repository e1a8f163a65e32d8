use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt, stream::SplitSink};
use serde::Deserialize;
use tracing::{debug, info, warn};

use intervue_engine::session::{
    ConversationalSession, SessionDeps, SessionError, TechnicalSession,
};
use intervue_protocol::{ClientMsg, InitMode, ServerMsg};

use crate::state::AppState;

type WsSender = SplitSink<WebSocket, Message>;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: String,
}

pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let claims = match state.auth.verify_access_token(&params.token) {
        Ok(c) => c,
        Err(_) => {
            return Response::builder()
                .status(401)
                .body("Unauthorized".into())
                .unwrap();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, claims.sub))
}

/// One connection = one session. Messages are handled strictly in arrival
/// order, so session state never sees concurrent mutation.
enum ActiveInterview {
    None,
    Conversational(ConversationalSession),
    Technical(TechnicalSession),
}

impl ActiveInterview {
    fn session_id(&self) -> Option<String> {
        match self {
            ActiveInterview::None => None,
            ActiveInterview::Conversational(s) => Some(s.session_id().to_string()),
            ActiveInterview::Technical(s) => Some(s.session_id().to_string()),
        }
    }
}

enum Flow {
    Continue,
    Terminate,
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: String) {
    info!(%user_id, "WebSocket connected");

    let deps = state.session_deps();
    let (mut sender, mut receiver) = socket.split();
    let mut interview = ActiveInterview::None;

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let flow = handle_client_message(
                    &state,
                    &deps,
                    &mut interview,
                    &user_id,
                    &text,
                    &mut sender,
                )
                .await;
                if matches!(flow, Flow::Terminate) {
                    break;
                }
            }
            Ok(Message::Ping(data)) => {
                let _ = sender.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                warn!(%user_id, %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    // Best-effort persistence for sessions the client never terminated.
    match &mut interview {
        ActiveInterview::Conversational(session) if !session.is_completed() => {
            session.handle_disconnect(&deps).await;
        }
        ActiveInterview::Technical(session) if !session.is_completed() => {
            session.handle_disconnect(&deps).await;
        }
        _ => {}
    }

    if let Some(session_id) = interview.session_id() {
        state.registry.remove(&session_id);
    }

    info!(%user_id, "WebSocket disconnected");
}

async fn handle_client_message(
    state: &AppState,
    deps: &SessionDeps,
    interview: &mut ActiveInterview,
    user_id: &str,
    text: &str,
    sender: &mut WsSender,
) -> Flow {
    let msg: ClientMsg = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            debug!(%user_id, %e, "Unparseable client message");
            send(sender, &ServerMsg::error("Invalid message")).await;
            return Flow::Continue;
        }
    };

    match msg {
        ClientMsg::Init {
            mode,
            topics,
            resume_id,
        } => {
            if !matches!(interview, ActiveInterview::None) {
                send(sender, &ServerMsg::error("Session already initialized")).await;
                return Flow::Continue;
            }

            let result = match mode {
                InitMode::Topics => {
                    ConversationalSession::init_topics(deps, user_id.to_string(), topics).await
                }
                InitMode::Resume => {
                    let resume_text = resume_id.as_deref().and_then(|id| state.resumes.get(id));
                    ConversationalSession::init_resume(deps, user_id.to_string(), resume_text)
                        .await
                }
            };

            match result {
                Ok((session, msgs)) => {
                    state.registry.add(
                        session.session_id().to_string(),
                        user_id.to_string(),
                        "conversational",
                    );
                    *interview = ActiveInterview::Conversational(session);
                    send_all(sender, &msgs).await;
                }
                Err(e) => send(sender, &ServerMsg::error(e.to_string())).await,
            }
            Flow::Continue
        }

        ClientMsg::InitTechnical { topics } => {
            if !matches!(interview, ActiveInterview::None) {
                send(sender, &ServerMsg::error("Session already initialized")).await;
                return Flow::Continue;
            }

            let mut session = match TechnicalSession::new(user_id.to_string(), topics) {
                Ok(session) => session,
                Err(e) => {
                    send(sender, &ServerMsg::error(e.to_string())).await;
                    return Flow::Continue;
                }
            };

            // Ack immediately; the client sees progress while the question
            // set is generated.
            send(
                sender,
                &ServerMsg::Initializing {
                    message: "Preparing your interview questions...".to_string(),
                },
            )
            .await;

            let msgs = session.prepare_questions(deps).await;
            state.registry.add(
                session.session_id().to_string(),
                user_id.to_string(),
                "technical",
            );
            *interview = ActiveInterview::Technical(session);
            send_all(sender, &msgs).await;
            Flow::Continue
        }

        ClientMsg::Answer { text } => {
            let result = match interview {
                ActiveInterview::Conversational(session) => {
                    session.handle_answer(deps, &text).await
                }
                _ => Err(SessionError::NotInitialized),
            };
            reply(sender, result).await;
            Flow::Continue
        }

        ClientMsg::CodeSubmission { code } => {
            let result = match interview {
                ActiveInterview::Conversational(session) => {
                    session.handle_code_submission(deps, &code).await
                }
                _ => Err(SessionError::NotInitialized),
            };
            reply(sender, result).await;
            Flow::Continue
        }

        ClientMsg::SubmitCode {
            code,
            language,
            time_spent,
            hints_used,
        } => {
            let result = match interview {
                ActiveInterview::Technical(session) => {
                    session
                        .handle_submit_code(deps, &code, &language, time_spent, hints_used)
                        .await
                }
                _ => Err(SessionError::NotInitialized),
            };
            reply(sender, result).await;
            Flow::Continue
        }

        ClientMsg::RequestHint { code, language } => {
            let result = match interview {
                ActiveInterview::Technical(session) => {
                    session.handle_request_hint(deps, &code, &language).await
                }
                _ => Err(SessionError::NotInitialized),
            };
            reply(sender, result).await;
            Flow::Continue
        }

        ClientMsg::VoiceApproach { transcript } => {
            let result = match interview {
                ActiveInterview::Technical(session) => {
                    session.handle_voice_approach(deps, &transcript).await
                }
                _ => Err(SessionError::NotInitialized),
            };
            reply(sender, result).await;
            Flow::Continue
        }

        ClientMsg::RecordAudio => {
            // Server-side microphone capture only made sense in the desktop
            // deployment. Browser clients upload audio to /api/transcribe
            // and send the transcript as voice_approach.
            send(
                sender,
                &ServerMsg::error(
                    "Server-side recording is not available. Upload audio to /api/transcribe \
                     and send the transcript as a voice_approach message.",
                ),
            )
            .await;
            Flow::Continue
        }

        ClientMsg::End | ClientMsg::EndInterview => {
            let result = match interview {
                ActiveInterview::Conversational(session) => session.end(deps).await,
                ActiveInterview::Technical(session) => session.end(deps).await,
                ActiveInterview::None => Err(SessionError::NotInitialized),
            };
            match result {
                Ok(msgs) => {
                    send_all(sender, &msgs).await;
                    Flow::Terminate
                }
                Err(e) => {
                    send(sender, &ServerMsg::error(e.to_string())).await;
                    Flow::Continue
                }
            }
        }

        ClientMsg::StopInterview { session_id } => {
            info!(%user_id, requested = ?session_id, "Force stop requested");

            let msgs = match interview {
                ActiveInterview::Conversational(session) => session.force_stop(deps).await,
                ActiveInterview::Technical(session) => session.force_stop(deps).await,
                ActiveInterview::None => vec![ServerMsg::InterviewStopped {
                    message: "No active interview".to_string(),
                }],
            };
            send_all(sender, &msgs).await;
            Flow::Terminate
        }
    }
}

/// Sends the handler outcome: outbound messages on success, a client-visible
/// `error` message on failure. Input errors never tear down the connection.
async fn reply(sender: &mut WsSender, result: Result<Vec<ServerMsg>, SessionError>) {
    match result {
        Ok(msgs) => send_all(sender, &msgs).await,
        Err(e) => send(sender, &ServerMsg::error(e.to_string())).await,
    }
}

async fn send_all(sender: &mut WsSender, msgs: &[ServerMsg]) {
    for msg in msgs {
        send(sender, msg).await;
    }
}

async fn send(sender: &mut WsSender, msg: &ServerMsg) {
    let text = match serde_json::to_string(msg) {
        Ok(text) => text,
        Err(e) => {
            warn!(%e, "Failed to serialize outbound message");
            return;
        }
    };
    if let Err(e) = sender.send(Message::text(text)).await {
        warn!(%e, "Failed to send WS message");
    }
}
