//! Background coordinator - owns the session token and the outbound API call
//!
//! The coordinator runs as a long-lived task. Other components reach it only through
//! a [`CoordinatorHandle`], which sends an [`Envelope`] and waits on a oneshot reply.
//! Every envelope is handled on its own task and the reply is sent only once the
//! work behind it (interactive login, HTTP call) has finished.

mod summarize;

pub use summarize::{ApiError, HttpSummarizer, SummaryApi};

#[cfg(test)]
pub use summarize::FakeSummaryApi;

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex, OnceCell};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::Result;
use crate::auth::{build_auth_url, parse_redirect, IdentityFlow, Prompt, Session};
use crate::error::Error;
use crate::platform::{Clock, Scheduler, Store, IS_LOGGED_IN};
use crate::protocol::{decode_request, LoginResponse, Request, Response, SummarizeResponse};

/// Name of the single token refresh alarm
pub const REFRESH_ALARM: &str = "refresh_google_token";

/// Reported when the provider redirect carries no token
pub const MISSING_TOKEN: &str = "No access_token in redirect URL";

/// A request together with the channel its reply goes back on
#[derive(Debug)]
pub struct Envelope {
    pub request: Request,
    pub reply: oneshot::Sender<Response>,
}

/// Everything the coordinator talks to
pub struct Services {
    pub store: Arc<dyn Store>,
    pub clock: Arc<dyn Clock>,
    pub identity: Arc<dyn IdentityFlow>,
    pub api: Arc<dyn SummaryApi>,
    pub alarms: Arc<dyn Scheduler>,
}

pub struct Coordinator {
    client_id: String,
    services: Services,
    session: Mutex<Session>,
    restored: OnceCell<()>,
}

impl Coordinator {
    pub fn new(client_id: impl Into<String>, services: Services) -> Self {
        Self {
            client_id: client_id.into(),
            services,
            session: Mutex::new(Session::default()),
            restored: OnceCell::new(),
        }
    }

    /// Load the persisted token into memory. Runs once; later calls wait for the first.
    pub async fn ensure_restored(&self) {
        self.restored
            .get_or_init(|| async {
                let now = self.services.clock.now_ms();
                let session = match Session::load(self.services.store.as_ref()) {
                    Ok(session) => session,
                    Err(e) => {
                        warn!("Could not restore session: {}", e);
                        Session::default()
                    }
                };

                let flagged = self.services.store.get_flag(IS_LOGGED_IN).unwrap_or(false);
                if session.is_valid(now) {
                    debug!("Restored token valid until {}", session.expiry_ms());
                    self.services.alarms.create(REFRESH_ALARM, session.refresh_at(now));
                } else if session.token().is_some() || flagged {
                    // Missed refresh while dormant: renew or log out shortly
                    info!("Restored token has expired, refreshing");
                    self.services.alarms.create(REFRESH_ALARM, session.refresh_at(now));
                }

                *self.session.lock().await = session;
            })
            .await;
    }

    /// Snapshot of the in-memory session
    pub async fn session(&self) -> Session {
        self.ensure_restored().await;
        self.session.lock().await.clone()
    }

    /// Answer one request. Exhaustive over [`Request`].
    pub async fn handle(&self, request: Request) -> Response {
        self.ensure_restored().await;
        match request {
            Request::GoogleLogin => Response::Login(self.login().await),
            Request::SummarizeText { text } => Response::Summarize(self.summarize(&text).await),
        }
    }

    /// Interactive login; nothing is mutated unless a token comes back
    pub async fn login(&self) -> LoginResponse {
        self.ensure_restored().await;
        match self.authorize(Prompt::Consent).await {
            Ok(token) => {
                info!("Google login succeeded");
                LoginResponse::success(token)
            }
            Err(message) => {
                warn!("Google login failed: {}", message);
                LoginResponse::failure(message)
            }
        }
    }

    pub async fn summarize(&self, text: &str) -> SummarizeResponse {
        if text.trim().is_empty() {
            return SummarizeResponse::failure("No text to summarize");
        }

        info!("Summarizing {} chars", text.len());
        match self.services.api.classify_summarize(text).await {
            Ok(summary) => SummarizeResponse::success(summary),
            Err(e) => SummarizeResponse::failure(e.to_string()),
        }
    }

    /// Handle a fired alarm; only the refresh alarm does anything
    pub async fn on_alarm(&self, name: &str) {
        if name != REFRESH_ALARM {
            debug!("Ignoring alarm {}", name);
            return;
        }
        self.ensure_restored().await;

        match self.authorize(Prompt::None).await {
            Ok(_) => info!("Google token refreshed silently"),
            Err(message) => {
                warn!("Silent refresh failed, logging out: {}", message);
                if let Err(e) = self.revoke().await {
                    warn!("Could not clear stored token: {}", e);
                }
            }
        }
    }

    /// Forget the token and cancel the refresh alarm
    pub async fn logout(&self) -> Result<()> {
        self.ensure_restored().await;
        self.services.alarms.clear(REFRESH_ALARM);
        self.revoke().await
    }

    async fn revoke(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        *session = Session::default();
        Session::clear(self.services.store.as_ref())
    }

    /// Run the identity flow and adopt the resulting token. Errors are user-facing messages.
    async fn authorize(&self, prompt: Prompt) -> std::result::Result<String, String> {
        let redirect_uri = self.services.identity.redirect_uri();
        let url = build_auth_url(&self.client_id, &redirect_uri, prompt).map_err(flow_message)?;

        let redirect = self.services
            .identity
            .launch(&url, prompt.is_interactive())
            .await
            .map_err(flow_message)?;

        let grant = parse_redirect(&redirect).map_err(flow_message)?;
        let token = grant.access_token.ok_or_else(|| MISSING_TOKEN.to_string())?;

        self.adopt(&token, grant.expires_in).await.map_err(|e| e.to_string())?;
        Ok(token)
    }

    /// Replace whatever token was held and re-arm the refresh alarm
    async fn adopt(&self, token: &str, expires_in_secs: i64) -> Result<()> {
        let now = self.services.clock.now_ms();
        let lifetime_ms = expires_in_secs.saturating_mul(1000);
        let session = Session::new(token, now.saturating_add(lifetime_ms));

        let mut current = self.session.lock().await;
        session.save(self.services.store.as_ref())?;
        self.services.alarms.create(REFRESH_ALARM, session.refresh_at(now));
        *current = session;
        Ok(())
    }
}

/// Flow errors carry the provider's own wording, without our prefix
fn flow_message(err: Error) -> String {
    match err {
        Error::OAuth(message) => message,
        other => other.to_string(),
    }
}

/// Start the coordinator task.
///
/// `alarms` receives the names of fired alarms, normally from the
/// [`TokioAlarms`](crate::platform::TokioAlarms) the coordinator schedules on.
pub fn spawn(
    coordinator: Arc<Coordinator>,
    alarms: mpsc::UnboundedReceiver<String>,
) -> (CoordinatorHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(coordinator, rx, alarms));
    (CoordinatorHandle { tx }, task)
}

async fn run(
    coordinator: Arc<Coordinator>,
    mut inbox: mpsc::UnboundedReceiver<Envelope>,
    mut alarms: mpsc::UnboundedReceiver<String>,
) {
    coordinator.ensure_restored().await;

    loop {
        tokio::select! {
            envelope = inbox.recv() => {
                let Some(Envelope { request, reply }) = envelope else {
                    debug!("All handles dropped, coordinator stopping");
                    break;
                };
                debug!("Received message: {}", request.kind());
                let coordinator = coordinator.clone();
                tokio::spawn(async move {
                    let response = coordinator.handle(request).await;
                    if reply.send(response).is_err() {
                        debug!("Caller went away before the reply was ready");
                    }
                });
            }
            Some(name) = alarms.recv() => {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.on_alarm(&name).await });
            }
        }
    }
}

/// Cloneable sender side of the coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl CoordinatorHandle {
    pub async fn send(&self, request: Request) -> Result<Response> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Envelope { request, reply })
            .map_err(|_| Error::ChannelClosed("background coordinator"))?;
        response
            .await
            .map_err(|_| Error::ChannelClosed("background coordinator"))
    }

    /// Send a JSON message as it would arrive from another context.
    /// Unknown message types get no reply.
    pub async fn send_raw(&self, raw: &str) -> Result<Option<Response>> {
        match decode_request(raw) {
            Some(request) => self.send(request).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn login(&self) -> Result<LoginResponse> {
        match self.send(Request::GoogleLogin).await? {
            Response::Login(response) => Ok(response),
            other => Err(Error::Protocol(format!("Unexpected reply to GOOGLE_LOGIN: {:?}", other))),
        }
    }

    pub async fn summarize(&self, text: impl Into<String>) -> Result<SummarizeResponse> {
        match self.send(Request::SummarizeText { text: text.into() }).await? {
            Response::Summarize(response) => Ok(response),
            other => Err(Error::Protocol(format!("Unexpected reply to SUMMARIZE_TEXT: {:?}", other))),
        }
    }
}
