pub mod catalog;
pub mod manifest;
pub mod registry;
pub mod validate;

pub use catalog::Catalog;
pub use manifest::{FieldSpec, FieldType, ManifestError, ModuleManifest, RouteSpec};
pub use registry::{InvalidModule, ModuleRegistry, RegistryCache, RegistrySnapshot, RegistryStats};
pub use validate::validate_record;
