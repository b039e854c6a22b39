use once_cell::sync::Lazy;

use crate::modules::manifest::ModuleManifest;

static BUILTIN: Lazy<Catalog> = Lazy::new(|| Catalog::from_yaml(include_str!("catalog.yaml")));

/// Modules available for activation
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    manifests: Vec<ModuleManifest>,
}

impl Catalog {
    pub fn builtin() -> &'static Catalog {
        &BUILTIN
    }

    /// Parses a YAML list of manifests. Entries that fail validation are logged
    /// and left out; a malformed document yields an empty catalog.
    pub fn from_yaml(source: &str) -> Self {
        let entries: Vec<serde_yaml::Value> = match serde_yaml::from_str(source) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("Module catalog is not a YAML list: {}", e);
                return Self::default();
            }
        };

        let manifests = entries
            .into_iter()
            .filter_map(|entry| {
                let manifest = serde_yaml::from_value::<ModuleManifest>(entry)
                    .map_err(|e| e.to_string())
                    .and_then(|m| m.validate().map(|_| m).map_err(|e| e.to_string()));
                match manifest {
                    Ok(m) => Some(m),
                    Err(e) => {
                        tracing::warn!("Skipping catalog entry: {}", e);
                        None
                    }
                }
            })
            .collect();

        Self { manifests }
    }

    pub fn all(&self) -> &[ModuleManifest] {
        &self.manifests
    }

    pub fn get(&self, slug: &str) -> Option<&ModuleManifest> {
        self.manifests.iter().find(|m| m.slug == slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::HookName;

    #[test]
    fn builtin_catalog_parses_completely() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.all().len(), 4);

        let vehicles = catalog.get("vehicles").unwrap();
        assert_eq!(vehicles.priority, 20);
        assert!(vehicles.participates_in(HookName::BeforeRecordSave));
        assert_eq!(vehicles.entry_route(), "/dashboard/vehicles");
    }

    #[test]
    fn invalid_entries_are_skipped() {
        let catalog = Catalog::from_yaml(
            r#"
- { slug: ok, name: Ok, version: "1" }
- { slug: "Not OK", name: Bad, version: "1" }
- { name: no-slug }
"#,
        );
        assert_eq!(catalog.all().len(), 1);
        assert!(catalog.get("ok").is_some());
    }

    #[test]
    fn malformed_document_is_empty() {
        assert!(Catalog::from_yaml("slug: [").all().is_empty());
    }
}
