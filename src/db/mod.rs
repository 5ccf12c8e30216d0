use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, Transaction};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::models::{Company, EmissionRecord, Post};

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn new(db_path: PathBuf) -> SqlResult<Self> {
        let conn = Connection::open(db_path)?;
        Database::with_connection(conn)
    }

    pub fn open_in_memory() -> SqlResult<Self> {
        Database::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> SqlResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let mut db = Database { conn };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&mut self) -> SqlResult<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL
            );",
        )?;

        let migrations = vec![
            (
                "001_create_companies_and_emissions.sql",
                include_str!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/migrations/001_create_companies_and_emissions.sql"
                )),
            ),
            (
                "002_create_posts_and_settings.sql",
                include_str!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/migrations/002_create_posts_and_settings.sql"
                )),
            ),
            (
                "003_create_import_logs.sql",
                include_str!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/migrations/003_create_import_logs.sql"
                )),
            ),
        ];

        for (name, sql) in migrations {
            let applied: Option<String> = self
                .conn
                .query_row(
                    "SELECT name FROM schema_migrations WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                )
                .optional()?;

            if applied.is_none() {
                let tx = self.conn.transaction()?;
                tx.execute_batch(sql)?;
                tx.execute(
                    "INSERT INTO schema_migrations (name, applied_at) VALUES (?1, datetime('now'))",
                    params![name],
                )?;
                tx.commit()?;
            }
        }

        Ok(())
    }

    pub fn applied_migrations(&self) -> SqlResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM schema_migrations ORDER BY name")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect()
    }

    /// Writes companies (with their records) and posts in one transaction.
    /// A company's stored records are replaced by the ones given.
    pub fn import_dataset(&mut self, companies: &[Company], posts: &[Post]) -> SqlResult<()> {
        let tx = self.conn.transaction()?;
        for company in companies {
            upsert_company(&tx, company)?;
        }
        for post in posts {
            upsert_post(&tx, post)?;
        }
        tx.commit()
    }

    pub fn get_companies(&self) -> SqlResult<Vec<Company>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, country FROM companies ORDER BY position, id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Company {
                id: row.get(0)?,
                name: row.get(1)?,
                country: row.get(2)?,
                emissions: Vec::new(),
            })
        })?;
        let mut companies = rows.collect::<SqlResult<Vec<_>>>()?;

        let mut by_company: HashMap<String, Vec<EmissionRecord>> = HashMap::new();
        let mut stmt = self.conn.prepare(
            "SELECT company_id, year_month, source, emissions FROM emissions ORDER BY id",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let company_id: String = row.get(0)?;
            by_company.entry(company_id).or_default().push(EmissionRecord {
                year_month: row.get(1)?,
                source: row.get(2)?,
                emissions: row.get(3)?,
            });
        }

        for company in companies.iter_mut() {
            if let Some(records) = by_company.remove(&company.id) {
                company.emissions = records;
            }
        }
        Ok(companies)
    }

    pub fn get_posts(&self) -> SqlResult<Vec<Post>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, company_id, year_month, content
             FROM posts ORDER BY position, id",
        )?;
        let rows = stmt.query_map([], post_from_row)?;
        rows.collect()
    }

    /// Appends a post after every existing one.
    pub fn insert_post(&self, post: &Post) -> SqlResult<()> {
        self.conn.execute(
            "INSERT INTO posts (id, title, company_id, year_month, content, position, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5,
                     COALESCE((SELECT MAX(position) + 1 FROM posts), 0),
                     datetime('now'), datetime('now'))",
            params![post.id, post.title, post.company_id, post.year_month, post.content],
        )?;
        Ok(())
    }

    /// Replaces a post in place. Returns false when no post has that id.
    pub fn update_post(&self, post: &Post) -> SqlResult<bool> {
        let changed = self.conn.execute(
            "UPDATE posts
             SET title = ?2, company_id = ?3, year_month = ?4, content = ?5, updated_at = datetime('now')
             WHERE id = ?1",
            params![post.id, post.title, post.company_id, post.year_month, post.content],
        )?;
        Ok(changed > 0)
    }

    /// Writes several settings atomically; either all keys change or none do.
    pub fn set_settings(&mut self, entries: &[(&str, String)]) -> SqlResult<()> {
        let tx = self.conn.transaction()?;
        for (key, value) in entries {
            tx.execute(
                "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, datetime('now'))",
                params![key, value],
            )?;
        }
        tx.commit()
    }

    pub fn get_setting(&self, key: &str) -> SqlResult<Option<String>> {
        let mut stmt = self.conn.prepare("SELECT value FROM settings WHERE key = ?1")?;
        stmt.query_row(params![key], |row| row.get(0)).optional()
    }

    pub fn has_successful_import(&self, file_hash: &str) -> SqlResult<bool> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM import_logs WHERE file_hash = ?1 AND status = 'success' LIMIT 1",
                params![file_hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn log_import(
        &self,
        file_hash: &str,
        file_path: Option<&str>,
        status: &str,
        message: Option<&str>,
    ) -> SqlResult<()> {
        self.conn.execute(
            "INSERT INTO import_logs (id, file_hash, file_path, status, message, created_at)
             VALUES (hex(randomblob(16)), ?1, ?2, ?3, ?4, datetime('now'))",
            params![file_hash, file_path, status, message],
        )?;
        Ok(())
    }

    pub fn import_log_count(&self, status: &str) -> SqlResult<i64> {
        self.conn.query_row(
            "SELECT COUNT(*) FROM import_logs WHERE status = ?1",
            params![status],
            |row| row.get(0),
        )
    }
}

fn upsert_company(tx: &Transaction<'_>, company: &Company) -> SqlResult<()> {
    tx.execute(
        "INSERT INTO companies (id, name, country, position, created_at, updated_at)
         VALUES (?1, ?2, ?3,
                 COALESCE((SELECT MAX(position) + 1 FROM companies), 0),
                 datetime('now'), datetime('now'))
         ON CONFLICT(id) DO UPDATE SET
             name = excluded.name,
             country = excluded.country,
             updated_at = excluded.updated_at",
        params![company.id, company.name, company.country],
    )?;
    tx.execute(
        "DELETE FROM emissions WHERE company_id = ?1",
        params![company.id],
    )?;
    let mut stmt = tx.prepare(
        "INSERT INTO emissions (company_id, year_month, source, emissions) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for record in &company.emissions {
        stmt.execute(params![company.id, record.year_month, record.source, record.emissions])?;
    }
    Ok(())
}

fn upsert_post(tx: &Transaction<'_>, post: &Post) -> SqlResult<()> {
    tx.execute(
        "INSERT INTO posts (id, title, company_id, year_month, content, position, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5,
                 COALESCE((SELECT MAX(position) + 1 FROM posts), 0),
                 datetime('now'), datetime('now'))
         ON CONFLICT(id) DO UPDATE SET
             title = excluded.title,
             company_id = excluded.company_id,
             year_month = excluded.year_month,
             content = excluded.content,
             updated_at = excluded.updated_at",
        params![post.id, post.title, post.company_id, post.year_month, post.content],
    )?;
    Ok(())
}

fn post_from_row(row: &rusqlite::Row<'_>) -> SqlResult<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        company_id: row.get(2)?,
        year_month: row.get(3)?,
        content: row.get(4)?,
    })
}
