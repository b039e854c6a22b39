// Handlers derived from what a manifest declares, registered by the module registry

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::hooks::dispatcher::Registration;
use crate::hooks::error::HookError;
use crate::hooks::traits::{DashboardWidget, HookEvent, HookHandler, HookName, SidebarItem};
use crate::modules::manifest::ModuleManifest;

/// Appends the module's entry to the sidebar
struct SidebarEntry {
    item: SidebarItem,
}

#[async_trait]
impl HookHandler for SidebarEntry {
    fn name(&self) -> &str {
        "sidebar_entry"
    }

    async fn handle(&self, event: HookEvent) -> Result<HookEvent, HookError> {
        match event {
            HookEvent::SidebarItems(mut items) => {
                if !items.iter().any(|i| i.module == self.item.module) {
                    items.push(self.item.clone());
                }
                Ok(HookEvent::SidebarItems(items))
            }
            other => Ok(other),
        }
    }
}

/// Appends the module's dashboard card
struct DashboardEntry {
    widget: DashboardWidget,
}

#[async_trait]
impl HookHandler for DashboardEntry {
    fn name(&self) -> &str {
        "dashboard_entry"
    }

    async fn handle(&self, event: HookEvent) -> Result<HookEvent, HookError> {
        match event {
            HookEvent::DashboardWidgets(mut widgets) => {
                widgets.push(self.widget.clone());
                Ok(HookEvent::DashboardWidgets(widgets))
            }
            other => Ok(other),
        }
    }
}

/// Fills declared field defaults into the module's own records before they are saved
struct FieldDefaults {
    module: String,
    defaults: Vec<(String, Value)>,
}

#[async_trait]
impl HookHandler for FieldDefaults {
    fn name(&self) -> &str {
        "field_defaults"
    }

    async fn handle(&self, event: HookEvent) -> Result<HookEvent, HookError> {
        match event {
            HookEvent::BeforeRecordSave(mut save) if save.module == self.module => {
                for (field, default) in &self.defaults {
                    let missing = save.record.get(field).map_or(true, Value::is_null);
                    if missing {
                        save.record.insert(field.clone(), default.clone());
                    }
                }
                Ok(HookEvent::BeforeRecordSave(save))
            }
            other => Ok(other),
        }
    }
}

/// Registrations for every hook the manifest declares that has a declarative
/// meaning. `after_record_save` has none and is left to programmatic handlers.
pub fn handlers_for_manifest(manifest: &ModuleManifest) -> Vec<Registration> {
    let mut registrations = Vec::new();

    for hook in &manifest.hooks {
        let handler: Option<Arc<dyn HookHandler>> = match hook {
            HookName::SidebarItems => Some(Arc::new(SidebarEntry {
                item: SidebarItem {
                    module: manifest.slug.clone(),
                    label: manifest.name.clone(),
                    icon: manifest.icon.clone(),
                    route: manifest.entry_route(),
                },
            })),
            HookName::DashboardWidgets => Some(Arc::new(DashboardEntry {
                widget: DashboardWidget {
                    module: manifest.slug.clone(),
                    title: manifest.name.clone(),
                    icon: manifest.icon.clone(),
                    route: manifest.entry_route(),
                },
            })),
            HookName::BeforeRecordSave => {
                let defaults: Vec<_> = manifest
                    .fields
                    .iter()
                    .filter_map(|f| f.default.clone().map(|d| (f.name.clone(), d)))
                    .collect();
                if defaults.is_empty() {
                    None
                } else {
                    Some(Arc::new(FieldDefaults {
                        module: manifest.slug.clone(),
                        defaults,
                    }))
                }
            }
            HookName::AfterRecordSave => None,
        };

        match handler {
            Some(handler) => registrations.push(Registration {
                module: manifest.slug.clone(),
                hook: *hook,
                handler,
                priority: manifest.priority,
            }),
            None => tracing::debug!(
                "Module '{}' declares hook {} with no declarative handler",
                manifest.slug,
                hook
            ),
        }
    }

    registrations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::traits::RecordSave;
    use serde_json::{json, Map};
    use uuid::Uuid;

    fn manifest() -> ModuleManifest {
        ModuleManifest::from_value(json!({
            "slug": "vehicles",
            "name": "Vehicles",
            "version": "1.0.0",
            "icon": "truck",
            "hooks": ["sidebar_items", "before_record_save", "after_record_save"],
            "fields": [
                { "name": "plate", "type": "text", "required": true },
                { "name": "fuel", "type": "select", "options": ["diesel", "petrol"], "default": "diesel" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn registers_only_meaningful_hooks() {
        let hooks: Vec<_> = handlers_for_manifest(&manifest()).iter().map(|r| r.hook).collect();
        assert_eq!(hooks, vec![HookName::SidebarItems, HookName::BeforeRecordSave]);
    }

    #[tokio::test]
    async fn defaults_fill_missing_fields_of_own_module_only() {
        let registrations = handlers_for_manifest(&manifest());
        let defaults = &registrations[1].handler;

        let mut record = Map::new();
        record.insert("plate".into(), json!("1234-ABC"));
        let own = HookEvent::BeforeRecordSave(RecordSave {
            company_id: Uuid::new_v4(),
            module: "vehicles".into(),
            record: record.clone(),
        });

        match defaults.handle(own).await.unwrap() {
            HookEvent::BeforeRecordSave(save) => assert_eq!(save.record["fuel"], json!("diesel")),
            other => panic!("unexpected {:?}", other),
        }

        let foreign = HookEvent::BeforeRecordSave(RecordSave {
            company_id: Uuid::new_v4(),
            module: "holidays".into(),
            record,
        });
        match defaults.handle(foreign).await.unwrap() {
            HookEvent::BeforeRecordSave(save) => assert!(!save.record.contains_key("fuel")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn sidebar_entry_is_not_duplicated() {
        let registrations = handlers_for_manifest(&manifest());
        let sidebar = &registrations[0].handler;

        let once = sidebar.handle(HookEvent::SidebarItems(Vec::new())).await.unwrap();
        let twice = sidebar.handle(once).await.unwrap().into_sidebar_items();
        assert_eq!(twice.len(), 1);
        assert_eq!(twice[0].icon, "truck");
    }
}
