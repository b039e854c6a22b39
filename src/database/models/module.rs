use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::CompanyId;

/// Tenant-scoped activation of a module. The manifest is stored as raw JSON and
/// parsed by the registry, so a broken manifest never blocks loading the rest.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ModuleInstance {
    pub id: Uuid,
    pub company_id: CompanyId,
    pub slug: String,
    pub manifest: Value,
    pub config: Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// One dynamic data entry of a module (`module_data` table)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub id: Uuid,
    pub company_id: CompanyId,
    pub module_slug: String,
    pub data: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ModuleRecordRow {
    pub id: Uuid,
    pub company_id: CompanyId,
    pub module_slug: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

impl From<ModuleRecordRow> for ModuleRecord {
    fn from(row: ModuleRecordRow) -> Self {
        let data = match row.data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };

        Self {
            id: row.id,
            company_id: row.company_id,
            module_slug: row.module_slug,
            data,
            created_at: row.created_at,
        }
    }
}
