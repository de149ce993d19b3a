//! Tabs - the pages the panel can target and the agents installed in them

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use crate::Result;
use crate::error::Error;
use crate::page::{Document, PageAgent};
use crate::protocol::{AgentRequest, EmailText};

pub type TabId = u32;

/// Reported when a message reaches a tab with no agent in it
pub const NO_RECEIVER: &str = "Could not establish connection. Receiving end does not exist.";

/// The browser surface the panel controller drives
#[async_trait]
pub trait PageHost: Send + Sync {
    /// The active tab of the focused window
    async fn active_tab(&self) -> Option<TabId>;

    /// Install the page agent. Installing into a tab that already has one is a no-op.
    async fn inject_agent(&self, tab: TabId) -> Result<()>;

    /// Message the tab's agent. `Ok(None)` means the agent gave no answer.
    async fn send_to_tab(&self, tab: TabId, request: AgentRequest) -> Result<Option<EmailText>>;
}

struct Tab {
    document: Arc<dyn Document>,
    agent: Option<PageAgent>,
}

#[derive(Default)]
struct TabTable {
    tabs: HashMap<TabId, Tab>,
    active: Option<TabId>,
    next_id: TabId,
}

/// In-process tabs, each holding one document
#[derive(Default)]
pub struct LocalTabs {
    table: Mutex<TabTable>,
}

impl LocalTabs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a tab on `document` and focus it
    pub fn open(&self, document: Arc<dyn Document>) -> TabId {
        let mut table = self.lock();
        table.next_id += 1;
        let id = table.next_id;
        table.tabs.insert(id, Tab { document, agent: None });
        table.active = Some(id);
        id
    }

    #[cfg(test)]
    pub fn focus(&self, tab: TabId) {
        let mut table = self.lock();
        if table.tabs.contains_key(&tab) {
            table.active = Some(tab);
        }
    }

    #[cfg(test)]
    pub fn close(&self, tab: TabId) {
        let mut table = self.lock();
        table.tabs.remove(&tab);
        if table.active == Some(tab) {
            table.active = None;
        }
    }

    pub fn has_agent(&self, tab: TabId) -> bool {
        self.lock().tabs.get(&tab).is_some_and(|t| t.agent.is_some())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TabTable> {
        // The table holds no invariants a panicking writer could break halfway
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PageHost for LocalTabs {
    async fn active_tab(&self) -> Option<TabId> {
        self.lock().active
    }

    async fn inject_agent(&self, tab: TabId) -> Result<()> {
        let mut table = self.lock();
        let entry = table.tabs
            .get_mut(&tab)
            .ok_or_else(|| Error::Protocol(format!("No tab with id {}", tab)))?;
        if entry.agent.is_none() {
            entry.agent = Some(PageAgent);
        }
        Ok(())
    }

    async fn send_to_tab(&self, tab: TabId, request: AgentRequest) -> Result<Option<EmailText>> {
        let (agent, document) = {
            let table = self.lock();
            let entry = table.tabs
                .get(&tab)
                .ok_or_else(|| Error::Protocol(format!("No tab with id {}", tab)))?;
            let agent = entry.agent.ok_or_else(|| Error::Protocol(NO_RECEIVER.to_string()))?;
            (agent, entry.document.clone())
        };

        Ok(Some(agent.handle(request, document.as_ref())))
    }
}
