//! Panel controller - the "analyze current email" action
//!
//! One click runs: resolve the active tab, install the page agent, ask it for the
//! email text (with bounded retry), reject blank text, and forward the rest to the
//! background coordinator. The outcome is a [`PanelView`] ready to render.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::background::CoordinatorHandle;
use crate::platform::{Store, IS_LOGGED_IN};
use crate::protocol::{AgentRequest, EmailText, Summary};
use crate::retry::RetryPolicy;
use crate::tabs::{PageHost, TabId};

/// Why an analysis produced no summary. `Display` is shown to the user as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyzeError {
    #[error("No active tab to read from.")]
    NoActiveTab,

    #[error("Could not access Gmail tab. Please open an email.")]
    TargetUnreachable,

    #[error("Could not extract email text. Please open an email in Gmail first.")]
    EmptyContent,

    #[error("API error: {0}")]
    Api(String),
}

/// What the result area shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelView {
    Summary(Summary),
    Error(String),
}

/// State of the analyze button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affordance {
    Analyze,
    LoginFirst,
}

impl Affordance {
    pub fn label(&self) -> &'static str {
        match self {
            Affordance::Analyze => "Analyze Current Email",
            Affordance::LoginFirst => "Login First in Popup",
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Affordance::Analyze)
    }
}

pub struct PanelController {
    host: Arc<dyn PageHost>,
    coordinator: CoordinatorHandle,
    store: Arc<dyn Store>,
    retry: RetryPolicy,
    busy: AtomicBool,
}

/// Clears the busy flag however the analysis ends
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl PanelController {
    pub fn new(
        host: Arc<dyn PageHost>,
        coordinator: CoordinatorHandle,
        store: Arc<dyn Store>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            host,
            coordinator,
            store,
            retry,
            busy: AtomicBool::new(false),
        }
    }

    /// Whether an analysis is running
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// The analyze button is only live once the popup has logged in
    pub fn affordance(&self) -> Affordance {
        match self.store.get_flag(IS_LOGGED_IN) {
            Ok(true) => Affordance::Analyze,
            Ok(false) => Affordance::LoginFirst,
            Err(e) => {
                debug!("Could not read login flag: {}", e);
                Affordance::LoginFirst
            }
        }
    }

    /// Run the whole action and turn the outcome into something to render
    pub async fn analyze(&self) -> PanelView {
        self.busy.store(true, Ordering::SeqCst);
        let _busy = BusyGuard(&self.busy);

        match self.run().await {
            Ok(summary) => PanelView::Summary(summary),
            Err(e) => PanelView::Error(e.to_string()),
        }
    }

    pub async fn run(&self) -> Result<Summary, AnalyzeError> {
        let tab = self.host.active_tab().await.ok_or(AnalyzeError::NoActiveTab)?;

        // Already-installed agents make this fail on some hosts; that is fine
        if let Err(e) = self.host.inject_agent(tab).await {
            debug!("Agent injection into tab {} skipped: {}", tab, e);
        }

        let email = self.request_text(tab).await?;
        let text = email.text.trim();
        if text.is_empty() {
            return Err(AnalyzeError::EmptyContent);
        }

        info!("Extracted {} chars from tab {}", text.len(), tab);
        let response = self.coordinator
            .summarize(text)
            .await
            .map_err(|e| AnalyzeError::Api(e.to_string()))?;

        match (response.ok, response.data) {
            (true, Some(summary)) => Ok(summary),
            (_, _) => Err(AnalyzeError::Api(
                response.error.unwrap_or_else(|| "Unknown error".to_string()),
            )),
        }
    }

    async fn request_text(&self, tab: TabId) -> Result<EmailText, AnalyzeError> {
        let outcome = self.retry
            .run(
                |_| self.host.send_to_tab(tab, AgentRequest::GetEmailText),
                |reply| matches!(reply, Ok(Some(_))),
            )
            .await;

        match outcome {
            Ok(Ok(Some(email))) => Ok(email),
            _ => Err(AnalyzeError::TargetUnreachable),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::{self, ApiError, Coordinator, FakeSummaryApi, Services};
    use crate::auth::FakeIdentityFlow;
    use crate::error::Error;
    use crate::page::TextDocument;
    use crate::platform::{ManualClock, MemoryStore, RecordingScheduler};
    use crate::tabs::{LocalTabs, TabId};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Page host whose agent stays silent for the first `failures` requests
    struct FlakyHost {
        failures: u32,
        attempts: AtomicU32,
        text: String,
    }

    impl FlakyHost {
        fn new(failures: u32, text: &str) -> Self {
            Self { failures, attempts: AtomicU32::new(0), text: text.to_string() }
        }
    }

    #[async_trait]
    impl PageHost for FlakyHost {
        async fn active_tab(&self) -> Option<TabId> {
            Some(1)
        }

        async fn inject_agent(&self, _tab: TabId) -> crate::Result<()> {
            Ok(())
        }

        async fn send_to_tab(&self, _tab: TabId, _request: AgentRequest) -> crate::Result<Option<EmailText>> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                if n % 2 == 0 {
                    Err(Error::Protocol("Receiving end does not exist.".to_string()))
                } else {
                    Ok(None)
                }
            } else {
                Ok(Some(EmailText { text: self.text.clone() }))
            }
        }
    }

    struct Harness {
        api: Arc<FakeSummaryApi>,
        store: Arc<MemoryStore>,
        handle: CoordinatorHandle,
    }

    fn harness(summaries: Vec<Result<Summary, ApiError>>) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let api = Arc::new(FakeSummaryApi::new(summaries));
        let coordinator = Arc::new(Coordinator::new(
            "client-1",
            Services {
                store: store.clone(),
                clock: Arc::new(ManualClock::at(0)),
                identity: Arc::new(FakeIdentityFlow::new(vec![])),
                api: api.clone(),
                alarms: Arc::new(RecordingScheduler::default()),
            },
        ));
        let (_alarm_tx, alarm_rx) = tokio::sync::mpsc::unbounded_channel();
        let (handle, _task) = background::spawn(coordinator, alarm_rx);
        Harness { api, store, handle }
    }

    fn sample_summary() -> Summary {
        Summary {
            categories: vec!["Events".to_string(), "Work".to_string()],
            summary: "Invitation to the AI Conference on August 20th.".to_string(),
        }
    }

    fn controller(host: Arc<dyn PageHost>, h: &Harness) -> PanelController {
        PanelController::new(host, h.handle.clone(), h.store.clone(), RetryPolicy::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_summary() {
        let h = harness(vec![Ok(sample_summary())]);
        let tabs = Arc::new(LocalTabs::new());
        tabs.open(Arc::new(TextDocument::new("  Dear Rohit, please confirm.  ")));
        let panel = controller(tabs.clone(), &h);

        let view = panel.analyze().await;
        assert_eq!(view, PanelView::Summary(sample_summary()));
        assert_eq!(h.api.calls(), vec!["Dear Rohit, please confirm."]);
        assert!(!panel.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_agent_answers() {
        let h = harness(vec![Ok(sample_summary())]);
        let host = Arc::new(FlakyHost::new(2, "email body"));
        let panel = controller(host.clone(), &h);

        let view = panel.analyze().await;
        assert_eq!(view, PanelView::Summary(sample_summary()));
        assert_eq!(host.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_after_four_attempts() {
        let h = harness(vec![]);
        let host = Arc::new(FlakyHost::new(u32::MAX, "never"));
        let panel = controller(host.clone(), &h);
        let started = Instant::now();

        let result = panel.run().await;
        assert_eq!(result, Err(AnalyzeError::TargetUnreachable));
        assert_eq!(host.attempts.load(Ordering::SeqCst), 4);
        assert!(started.elapsed() >= Duration::from_millis(3 * 333));
        assert!(h.api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_text_short_circuits() {
        for body in ["", "   ", "\n\t "] {
            let h = harness(vec![Ok(sample_summary())]);
            let tabs = Arc::new(LocalTabs::new());
            tabs.open(Arc::new(TextDocument::new(body)));
            let panel = controller(tabs, &h);

            assert_eq!(panel.run().await, Err(AnalyzeError::EmptyContent));
            assert!(h.api.calls().is_empty());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_email_open() {
        let h = harness(vec![]);
        let tabs = Arc::new(LocalTabs::new());
        tabs.open(Arc::new(TextDocument::blank()));
        let panel = controller(tabs, &h);

        let view = panel.analyze().await;
        assert_eq!(
            view,
            PanelView::Error("Could not extract email text. Please open an email in Gmail first.".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_api_error_is_rendered() {
        let h = harness(vec![Err(ApiError::Status(500))]);
        let tabs = Arc::new(LocalTabs::new());
        tabs.open(Arc::new(TextDocument::new("body")));
        let panel = controller(tabs, &h);

        assert_eq!(panel.analyze().await, PanelView::Error("API error: HTTP 500".to_string()));
        assert!(!panel.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_active_tab() {
        let h = harness(vec![]);
        let panel = controller(Arc::new(LocalTabs::new()), &h);
        assert_eq!(panel.run().await, Err(AnalyzeError::NoActiveTab));
    }

    #[tokio::test(start_paused = true)]
    async fn test_affordance_follows_login_flag() {
        let h = harness(vec![]);
        let panel = controller(Arc::new(LocalTabs::new()), &h);
        assert_eq!(panel.affordance(), Affordance::LoginFirst);
        assert!(!panel.affordance().is_enabled());

        h.store.set(&[(IS_LOGGED_IN, json!(true))]).unwrap();
        assert_eq!(panel.affordance(), Affordance::Analyze);
        assert_eq!(panel.affordance().label(), "Analyze Current Email");
    }
}
