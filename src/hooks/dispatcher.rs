use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::timeout;

use crate::hooks::error::HookError;
use crate::hooks::traits::{HookEvent, HookHandler, HookName};

/// Handle returned by `register`, also the tie-breaker for equal priorities
pub type SubscriptionId = u64;

struct Subscription {
    id: SubscriptionId,
    module: String,
    priority: i32,
    handler: Arc<dyn HookHandler>,
}

/// Everything needed to subscribe one handler
pub struct Registration {
    pub module: String,
    pub hook: HookName,
    pub handler: Arc<dyn HookHandler>,
    pub priority: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HookFailure {
    pub subscription: SubscriptionId,
    pub module: String,
    pub error: HookError,
}

/// Outcome of one dispatch: the final value plus what ran and what failed
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub result: HookEvent,
    /// Modules whose handler completed, in execution order
    pub executed: Vec<String>,
    pub failures: Vec<HookFailure>,
    pub execution_time: Duration,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Default)]
struct Subscriptions {
    next_id: SubscriptionId,
    by_hook: HashMap<HookName, Vec<Arc<Subscription>>>,
}

impl Subscriptions {
    fn insert(&mut self, registration: Registration) -> SubscriptionId {
        self.next_id += 1;
        let id = self.next_id;
        let list = self.by_hook.entry(registration.hook).or_default();
        list.push(Arc::new(Subscription {
            id,
            module: registration.module,
            priority: registration.priority,
            handler: registration.handler,
        }));
        // ids grow monotonically, so (priority, id) keeps registration order on ties
        list.sort_by_key(|s| (s.priority, s.id));
        id
    }

    fn remove(&mut self, id: SubscriptionId) -> bool {
        let mut removed = false;
        for list in self.by_hook.values_mut() {
            let before = list.len();
            list.retain(|s| s.id != id);
            removed |= list.len() < before;
        }
        removed
    }
}

/// Per-tenant hook registry and dispatcher.
///
/// Dispatch uses pipeline semantics: each handler receives the value returned by
/// the previous one. A handler that errors, times out, or answers with a different
/// hook variant is logged and skipped, and the chain goes on with the last good
/// value. A hook without subscribers returns its input unchanged.
pub struct HookDispatcher {
    subscriptions: RwLock<Subscriptions>,
    handler_timeout: Duration,
}

impl HookDispatcher {
    pub fn new(handler_timeout: Duration) -> Self {
        Self {
            subscriptions: RwLock::new(Subscriptions::default()),
            handler_timeout,
        }
    }

    /// Dispatcher pre-populated with a full set of subscriptions
    pub fn with_registrations(handler_timeout: Duration, registrations: Vec<Registration>) -> Self {
        let mut subs = Subscriptions::default();
        for registration in registrations {
            subs.insert(registration);
        }
        Self {
            subscriptions: RwLock::new(subs),
            handler_timeout,
        }
    }

    pub async fn register(
        &self,
        module: &str,
        hook: HookName,
        handler: Arc<dyn HookHandler>,
        priority: i32,
    ) -> SubscriptionId {
        let id = self.subscriptions.write().await.insert(Registration {
            module: module.to_string(),
            hook,
            handler,
            priority,
        });
        tracing::debug!("Registered hook {} for module '{}' (id {}, priority {})", hook, module, id, priority);
        id
    }

    pub async fn unregister(&self, id: SubscriptionId) -> bool {
        self.subscriptions.write().await.remove(id)
    }

    /// Drops every subscription owned by `module`
    pub async fn unregister_module(&self, module: &str) -> usize {
        let mut subs = self.subscriptions.write().await;
        let mut removed = 0;
        for list in subs.by_hook.values_mut() {
            let before = list.len();
            list.retain(|s| s.module != module);
            removed += before - list.len();
        }
        removed
    }



    /// (module, priority) pairs in execution order
    pub async fn subscribers(&self, hook: HookName) -> Vec<(String, i32)> {
        let subs = self.subscriptions.read().await;
        subs.by_hook
            .get(&hook)
            .map(|list| list.iter().map(|s| (s.module.clone(), s.priority)).collect())
            .unwrap_or_default()
    }

    pub async fn dispatch(&self, event: HookEvent) -> DispatchReport {
        let start = Instant::now();
        let hook = event.name();

        // Snapshot so handlers run without holding the lock
        let chain: Vec<Arc<Subscription>> = {
            let subs = self.subscriptions.read().await;
            subs.by_hook.get(&hook).cloned().unwrap_or_default()
        };

        if chain.is_empty() {
            tracing::trace!("No subscribers for hook {}", hook);
        }

        let mut current = event;
        let mut executed = Vec::with_capacity(chain.len());
        let mut failures = Vec::new();

        for sub in chain {
            let handler_start = Instant::now();
            let call = AssertUnwindSafe(sub.handler.handle(current.clone())).catch_unwind();
            let outcome = timeout(self.handler_timeout, call).await;

            let error = match outcome {
                Ok(Ok(Ok(next))) if next.name() == hook => {
                    tracing::debug!(
                        "Hook {} handler {} ({}) completed in {:?}",
                        hook,
                        sub.handler.name(),
                        sub.module,
                        handler_start.elapsed()
                    );
                    current = next;
                    executed.push(sub.module.clone());
                    continue;
                }
                Ok(Ok(Ok(next))) => HookError::PayloadMismatch {
                    expected: hook,
                    actual: next.name(),
                },
                Ok(Ok(Err(e))) => e,
                Ok(Err(panic)) => HookError::Failed(format!(
                    "handler {} panicked: {}",
                    sub.handler.name(),
                    panic_message(panic.as_ref())
                )),
                Err(_elapsed) => HookError::Timeout(format!(
                    "handler {} timed out after {:?}",
                    sub.handler.name(),
                    self.handler_timeout
                )),
            };

            tracing::warn!(
                "Hook {} handler {} from module '{}' failed: {}",
                hook,
                sub.handler.name(),
                sub.module,
                error
            );
            failures.push(HookFailure {
                subscription: sub.id,
                module: sub.module.clone(),
                error,
            });
        }

        DispatchReport {
            result: current,
            executed,
            failures,
            execution_time: start.elapsed(),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::traits::{FnHook, SidebarItem};

    fn item(module: &str) -> SidebarItem {
        SidebarItem {
            module: module.to_string(),
            label: module.to_string(),
            icon: "puzzle".into(),
            route: format!("/{}", module),
        }
    }

    fn appender(module: &'static str) -> Arc<dyn HookHandler> {
        Arc::new(FnHook::new(module, move |event| match event {
            HookEvent::SidebarItems(mut items) => {
                items.push(item(module));
                Ok(HookEvent::SidebarItems(items))
            }
            other => Ok(other),
        }))
    }

    fn modules(report: &DispatchReport) -> Vec<String> {
        report
            .result
            .clone()
            .into_sidebar_items()
            .into_iter()
            .map(|i| i.module)
            .collect()
    }

    fn dispatcher() -> HookDispatcher {
        HookDispatcher::new(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn runs_in_ascending_priority() {
        let hooks = dispatcher();
        hooks.register("ten", HookName::SidebarItems, appender("ten"), 10).await;
        hooks.register("five", HookName::SidebarItems, appender("five"), 5).await;
        hooks.register("twenty", HookName::SidebarItems, appender("twenty"), 20).await;

        let report = hooks.dispatch(HookEvent::SidebarItems(Vec::new())).await;
        assert_eq!(report.executed, vec!["five", "ten", "twenty"]);
        assert_eq!(modules(&report), vec!["five", "ten", "twenty"]);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn ties_keep_registration_order() {
        let hooks = dispatcher();
        hooks.register("b", HookName::SidebarItems, appender("b"), 50).await;
        hooks.register("a", HookName::SidebarItems, appender("a"), 50).await;
        hooks.register("c", HookName::SidebarItems, appender("c"), 50).await;

        let report = hooks.dispatch(HookEvent::SidebarItems(Vec::new())).await;
        assert_eq!(modules(&report), vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn failing_handler_does_not_block_others() {
        let hooks = dispatcher();
        hooks.register("ten", HookName::SidebarItems, appender("ten"), 10).await;
        hooks
            .register(
                "broken",
                HookName::SidebarItems,
                Arc::new(FnHook::new("broken", |_| Err(HookError::failed("boom")))),
                5,
            )
            .await;
        hooks.register("twenty", HookName::SidebarItems, appender("twenty"), 20).await;

        let report = hooks.dispatch(HookEvent::SidebarItems(Vec::new())).await;
        assert_eq!(report.executed, vec!["ten", "twenty"]);
        assert_eq!(modules(&report), vec!["ten", "twenty"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].module, "broken");
    }

    #[tokio::test]
    async fn panicking_handler_is_isolated() {
        let hooks = dispatcher();
        hooks
            .register(
                "buggy",
                HookName::SidebarItems,
                Arc::new(FnHook::new("buggy", |_| panic!("module bug"))),
                5,
            )
            .await;
        hooks.register("ten", HookName::SidebarItems, appender("ten"), 10).await;

        let report = hooks.dispatch(HookEvent::SidebarItems(Vec::new())).await;
        assert_eq!(modules(&report), vec!["ten"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].module, "buggy");
        match &report.failures[0].error {
            HookError::Failed(msg) => assert!(msg.contains("module bug"), "{}", msg),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn wrong_variant_is_rejected_and_last_good_value_kept() {
        let hooks = dispatcher();
        hooks.register("first", HookName::SidebarItems, appender("first"), 1).await;
        hooks
            .register(
                "confused",
                HookName::SidebarItems,
                Arc::new(FnHook::new("confused", |_| Ok(HookEvent::DashboardWidgets(Vec::new())))),
                2,
            )
            .await;

        let report = hooks.dispatch(HookEvent::SidebarItems(Vec::new())).await;
        assert_eq!(modules(&report), vec!["first"]);
        assert_eq!(
            report.failures[0].error,
            HookError::PayloadMismatch {
                expected: HookName::SidebarItems,
                actual: HookName::DashboardWidgets
            }
        );
    }

    struct Sleeper;

    #[async_trait::async_trait]
    impl HookHandler for Sleeper {
        async fn handle(&self, event: HookEvent) -> Result<HookEvent, HookError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(event)
        }
    }

    #[tokio::test]
    async fn slow_handler_times_out() {
        let hooks = HookDispatcher::new(Duration::from_millis(20));
        hooks.register("slow", HookName::SidebarItems, Arc::new(Sleeper), 1).await;
        hooks.register("fast", HookName::SidebarItems, appender("fast"), 2).await;

        let report = hooks.dispatch(HookEvent::SidebarItems(Vec::new())).await;
        assert_eq!(modules(&report), vec!["fast"]);
        assert!(matches!(report.failures[0].error, HookError::Timeout(_)));
    }

    #[tokio::test]
    async fn no_subscribers_returns_input() {
        let hooks = dispatcher();
        let input = HookEvent::SidebarItems(vec![item("core")]);
        let report = hooks.dispatch(input.clone()).await;
        assert_eq!(report.result, input);
        assert!(report.executed.is_empty());
    }

    #[tokio::test]
    async fn unregister_by_id_and_module() {
        let hooks = dispatcher();
        let id = hooks.register("a", HookName::SidebarItems, appender("a"), 1).await;
        hooks.register("b", HookName::SidebarItems, appender("b"), 2).await;
        hooks.register("b", HookName::DashboardWidgets, appender("b"), 2).await;

        assert!(hooks.unregister(id).await);
        assert!(!hooks.unregister(id).await);
        assert_eq!(hooks.unregister_module("b").await, 2);
        assert!(hooks.subscribers(HookName::SidebarItems).await.is_empty());
    }

    #[tokio::test]
    async fn prepopulated_dispatcher_orders_registrations() {
        let registration = |module: &'static str, priority| Registration {
            module: module.into(),
            hook: HookName::SidebarItems,
            handler: appender(module),
            priority,
        };
        let hooks = HookDispatcher::with_registrations(
            Duration::from_millis(200),
            vec![registration("late", 30), registration("early", 10)],
        );

        assert_eq!(
            hooks.subscribers(HookName::SidebarItems).await,
            vec![("early".to_string(), 10), ("late".to_string(), 30)]
        );
    }
}
