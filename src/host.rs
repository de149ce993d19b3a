//! Wires the components together for a desktop process

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::Result;
use crate::auth::BrowserFlow;
use crate::background::{self, Coordinator, CoordinatorHandle, HttpSummarizer, Services};
use crate::config::{self, Config};
use crate::panel::PanelController;
use crate::platform::{JsonFileStore, Store, SystemClock, TokioAlarms};
use crate::retry::RetryPolicy;
use crate::tabs::LocalTabs;

/// A running coordinator plus the shared state the other components need
pub struct Host {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub coordinator: Arc<Coordinator>,
    pub handle: CoordinatorHandle,
    pub tabs: Arc<LocalTabs>,
    pub api: HttpSummarizer,
    task: JoinHandle<()>,
}

impl Host {
    /// Start against the persisted store in the config directory
    pub fn start(config: Config) -> Result<Self> {
        let store = Arc::new(JsonFileStore::open(config::storage_path())?);
        Self::start_with_store(config, store)
    }

    pub fn start_with_store(config: Config, store: Arc<dyn Store>) -> Result<Self> {
        let api = HttpSummarizer::new(&config.api_base_url)?;
        let clock = Arc::new(SystemClock);
        let (alarm_tx, alarm_rx) = mpsc::unbounded_channel();

        let coordinator = Arc::new(Coordinator::new(
            config.client_id.clone(),
            Services {
                store: store.clone(),
                clock: clock.clone(),
                identity: Arc::new(BrowserFlow::new(config.callback_port, config.silent_timeout())),
                api: Arc::new(api.clone()),
                alarms: Arc::new(TokioAlarms::new(clock, alarm_tx)),
            },
        ));

        let (handle, task) = background::spawn(coordinator.clone(), alarm_rx);
        tracing::debug!("Background coordinator started");

        Ok(Self {
            config,
            store,
            coordinator,
            handle,
            tabs: Arc::new(LocalTabs::new()),
            api,
            task,
        })
    }

    pub fn panel(&self) -> PanelController {
        PanelController::new(
            self.tabs.clone(),
            self.handle.clone(),
            self.store.clone(),
            RetryPolicy::from(&self.config.retry),
        )
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        self.task.abort();
    }
}
