use anyhow::{anyhow, Context, Result};
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::db::Database;
use crate::models::{Company, EmissionRecord, Post};
use crate::services::period::normalize_year_month;
use crate::services::source::normalize_company;
use crate::utils::sha256_bytes;

pub const DEMO_DATASET: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/fixtures/demo_dataset.json"
));

#[derive(Deserialize)]
struct DatasetFile {
    companies: Vec<CompanyEntry>,
    #[serde(default)]
    posts: Vec<PostEntry>,
}

#[derive(Deserialize)]
struct CompanyEntry {
    id: String,
    name: String,
    country: String,
    emissions: Vec<EmissionEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmissionEntry {
    year_month: String,
    source: String,
    emissions: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostEntry {
    id: String,
    title: String,
    resource_uid: String,
    date_time: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ImportOutcome {
    Imported {
        companies: usize,
        records: usize,
        posts: usize,
    },
    Unchanged,
}

pub fn import_file(db: &Arc<Mutex<Database>>, path: &Path) -> Result<ImportOutcome> {
    let bytes = std::fs::read(path).with_context(|| format!("Read dataset {}", path.display()))?;
    import_bytes(db, &bytes, &path.to_string_lossy())
}

pub fn import_demo(db: &Arc<Mutex<Database>>) -> Result<ImportOutcome> {
    import_bytes(db, DEMO_DATASET.as_bytes(), "demo")
}

/// Imports a dataset unless the same bytes were already imported successfully.
/// The database stays locked from the hash check through the write, and every
/// run that gets past the check leaves a row in the import log.
pub fn import_bytes(db: &Arc<Mutex<Database>>, bytes: &[u8], label: &str) -> Result<ImportOutcome> {
    let file_hash = sha256_bytes(bytes);
    let mut db = db.lock().map_err(|_| anyhow!("DB lock poisoned"))?;

    if db.has_successful_import(&file_hash)? {
        info!(dataset = label, "Dataset unchanged, skipping import");
        return Ok(ImportOutcome::Unchanged);
    }

    let (companies, posts) = match parse_dataset(bytes) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(dataset = label, "Dataset rejected: {:#}", err);
            db.log_import(&file_hash, Some(label), "failed", Some(&format!("{:#}", err)))?;
            return Err(err);
        }
    };

    let outcome = ImportOutcome::Imported {
        companies: companies.len(),
        records: companies.iter().map(|c| c.emissions.len()).sum(),
        posts: posts.len(),
    };

    if let Err(err) = db.import_dataset(&companies, &posts) {
        let err = anyhow::Error::new(err).context("Write dataset");
        warn!(dataset = label, "Dataset import failed: {:#}", err);
        db.log_import(&file_hash, Some(label), "failed", Some(&format!("{:#}", err)))?;
        return Err(err);
    }
    db.log_import(&file_hash, Some(label), "success", None)?;
    info!(dataset = label, ?outcome, "Dataset imported");

    Ok(outcome)
}

fn parse_dataset(bytes: &[u8]) -> Result<(Vec<Company>, Vec<Post>)> {
    let value: Value = serde_json::from_slice(bytes).context("Invalid JSON")?;

    let schema = dataset_schema()?;
    if let Err(errors) = schema.validate(&value) {
        let messages: Vec<String> = errors.map(|e| e.to_string()).collect();
        return Err(anyhow!("Dataset does not match schema: {}", messages.join("; ")));
    }

    let dataset: DatasetFile = serde_json::from_value(value)?;

    let companies = dataset
        .companies
        .into_iter()
        .map(|entry| {
            normalize_company(Company {
                id: entry.id,
                name: entry.name,
                country: entry.country,
                emissions: entry
                    .emissions
                    .into_iter()
                    .map(|e| EmissionRecord {
                        year_month: e.year_month,
                        source: e.source,
                        emissions: e.emissions,
                    })
                    .collect(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let posts = dataset
        .posts
        .into_iter()
        .map(|entry| -> Result<Post> {
            Ok(Post {
                id: entry.id,
                title: entry.title,
                company_id: entry.resource_uid,
                year_month: normalize_year_month(&entry.date_time)?,
                content: entry.content,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((companies, posts))
}

fn dataset_schema() -> Result<JSONSchema> {
    let schema = json!({
        "type": "object",
        "required": ["companies"],
        "properties": {
            "companies": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["id", "name", "country", "emissions"],
                    "properties": {
                        "id": {"type": "string", "minLength": 1},
                        "name": {"type": "string"},
                        "country": {"type": "string"},
                        "emissions": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["yearMonth", "source", "emissions"],
                                "properties": {
                                    "yearMonth": {"type": "string"},
                                    "source": {"type": "string"},
                                    "emissions": {"type": "number"}
                                }
                            }
                        }
                    }
                }
            },
            "posts": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["id", "title", "resourceUid", "dateTime"],
                    "properties": {
                        "id": {"type": "string", "minLength": 1},
                        "title": {"type": "string"},
                        "resourceUid": {"type": "string"},
                        "dateTime": {"type": "string"},
                        "content": {"type": "string"}
                    }
                }
            }
        }
    });

    JSONSchema::compile(&schema).map_err(|e| anyhow!("Invalid JSON schema: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn shared_db() -> Arc<Mutex<Database>> {
        Arc::new(Mutex::new(Database::open_in_memory().unwrap()))
    }

    #[test]
    fn demo_dataset_imports_once() {
        let db = shared_db();
        let first = import_demo(&db).unwrap();
        assert_eq!(
            first,
            ImportOutcome::Imported {
                companies: 6,
                records: 33,
                posts: 6
            }
        );
        assert_eq!(import_demo(&db).unwrap(), ImportOutcome::Unchanged);

        let db = db.lock().unwrap();
        assert_eq!(db.import_log_count("success").unwrap(), 1);
    }

    #[test]
    fn demo_months_are_normalized_on_ingest() {
        let db = shared_db();
        import_demo(&db).unwrap();
        let companies = db.lock().unwrap().get_companies().unwrap();
        let toyota = companies.iter().find(|c| c.id == "c5").unwrap();
        assert_eq!(toyota.emissions[0].year_month, "2024-06");
        assert!(companies
            .iter()
            .flat_map(|c| c.emissions.iter())
            .all(|e| e.year_month.len() == 7));
    }

    #[test]
    fn schema_violation_is_logged_and_rejected() {
        let db = shared_db();
        let bytes = br#"{"companies": [{"id": "c1", "name": "A", "country": "US", "emissions": [{"yearMonth": "2025-01", "source": "lpg", "emissions": "lots"}]}]}"#;
        assert!(import_bytes(&db, bytes, "bad").is_err());

        let db = db.lock().unwrap();
        assert_eq!(db.import_log_count("failed").unwrap(), 1);
        assert!(db.get_companies().unwrap().is_empty());
    }

    #[test]
    fn malformed_month_fails_the_whole_import() {
        let db = shared_db();
        let bytes = br#"{"companies": [
            {"id": "c1", "name": "A", "country": "US", "emissions": [{"yearMonth": "2025-01", "source": "lpg", "emissions": 1}]},
            {"id": "c2", "name": "B", "country": "DE", "emissions": [{"yearMonth": "2025-14", "source": "lpg", "emissions": 1}]}
        ]}"#;
        let err = import_bytes(&db, bytes, "bad-month").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AppError>(),
            Some(AppError::MalformedPeriod(_))
        ));
        assert!(db.lock().unwrap().get_companies().unwrap().is_empty());
    }

    #[test]
    fn failed_write_is_logged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("import.sqlite");
        let db = Arc::new(Mutex::new(Database::new(path.clone()).unwrap()));
        rusqlite::Connection::open(&path)
            .unwrap()
            .execute_batch("DROP TABLE emissions;")
            .unwrap();

        assert!(import_demo(&db).is_err());

        let db = db.lock().unwrap();
        assert_eq!(db.import_log_count("failed").unwrap(), 1);
        assert_eq!(db.import_log_count("success").unwrap(), 0);
        assert!(db.get_posts().unwrap().is_empty());
    }

    #[test]
    fn concurrent_imports_of_same_bytes_write_once() {
        let db = shared_db();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let db = db.clone();
                std::thread::spawn(move || import_demo(&db).unwrap())
            })
            .collect();
        let outcomes: Vec<ImportOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let imported = outcomes
            .iter()
            .filter(|o| matches!(o, ImportOutcome::Imported { .. }))
            .count();
        assert_eq!(imported, 1);
        assert_eq!(db.lock().unwrap().import_log_count("success").unwrap(), 1);
    }
}
