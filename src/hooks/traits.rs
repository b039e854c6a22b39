use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use crate::hooks::error::HookError;
use crate::types::CompanyId;

/// Closed set of extension points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookName {
    SidebarItems,
    DashboardWidgets,
    BeforeRecordSave,
    AfterRecordSave,
}

impl HookName {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookName::SidebarItems => "sidebar_items",
            HookName::DashboardWidgets => "dashboard_widgets",
            HookName::BeforeRecordSave => "before_record_save",
            HookName::AfterRecordSave => "after_record_save",
        }
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SidebarItem {
    pub module: String,
    pub label: String,
    pub icon: String,
    pub route: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardWidget {
    pub module: String,
    pub title: String,
    pub icon: String,
    pub route: String,
}

/// A module data entry about to be written
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordSave {
    pub company_id: CompanyId,
    pub module: String,
    pub record: Map<String, Value>,
}

/// A module data entry that was written
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedRecord {
    pub company_id: CompanyId,
    pub module: String,
    pub record_id: Uuid,
    pub record: Map<String, Value>,
    /// Messages handlers want surfaced to the user
    pub notices: Vec<String>,
}

/// Hook payloads, one variant per [`HookName`]. A handler gets the running value
/// and must return the same variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "hook", content = "payload", rename_all = "snake_case")]
pub enum HookEvent {
    SidebarItems(Vec<SidebarItem>),
    DashboardWidgets(Vec<DashboardWidget>),
    BeforeRecordSave(RecordSave),
    AfterRecordSave(SavedRecord),
}

impl HookEvent {
    pub fn name(&self) -> HookName {
        match self {
            HookEvent::SidebarItems(_) => HookName::SidebarItems,
            HookEvent::DashboardWidgets(_) => HookName::DashboardWidgets,
            HookEvent::BeforeRecordSave(_) => HookName::BeforeRecordSave,
            HookEvent::AfterRecordSave(_) => HookName::AfterRecordSave,
        }
    }

    pub fn into_sidebar_items(self) -> Vec<SidebarItem> {
        match self {
            HookEvent::SidebarItems(items) => items,
            _ => Vec::new(),
        }
    }

    pub fn into_dashboard_widgets(self) -> Vec<DashboardWidget> {
        match self {
            HookEvent::DashboardWidgets(widgets) => widgets,
            _ => Vec::new(),
        }
    }
}

/// A subscribed hook callback
#[async_trait]
pub trait HookHandler: Send + Sync {
    /// Name for logging
    fn name(&self) -> &str {
        "anonymous"
    }

    async fn handle(&self, event: HookEvent) -> Result<HookEvent, HookError>;
}

/// Adapts a plain closure into a handler
pub struct FnHook<F> {
    name: String,
    f: F,
}

impl<F> FnHook<F>
where
    F: Fn(HookEvent) -> Result<HookEvent, HookError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

#[async_trait]
impl<F> HookHandler for FnHook<F>
where
    F: Fn(HookEvent) -> Result<HookEvent, HookError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: HookEvent) -> Result<HookEvent, HookError> {
        (self.f)(event)
    }
}
