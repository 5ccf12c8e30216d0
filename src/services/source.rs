use async_trait::async_trait;
use std::sync::{Arc, Mutex, RwLock};
use tracing::info;

use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{Company, Post, PostDraft};
use crate::services::period::normalize_year_month;

/// Where companies and posts come from. The dashboard only depends on the
/// returned shapes.
#[async_trait]
pub trait EntitySource: Send + Sync {
    async fn list_companies(&self) -> AppResult<Vec<Company>>;

    async fn list_posts(&self) -> AppResult<Vec<Post>>;

    /// Creates the post when `draft.id` is empty, otherwise replaces the post
    /// with that id in place. An id that matches nothing is `NotFound`.
    async fn upsert_post(&self, draft: PostDraft) -> AppResult<Post>;
}

/// Rewrites every record month into zero-padded form.
pub fn normalize_company(mut company: Company) -> AppResult<Company> {
    for record in company.emissions.iter_mut() {
        record.year_month = normalize_year_month(&record.year_month)?;
    }
    Ok(company)
}

fn prepare_post(draft: PostDraft) -> AppResult<(Post, bool)> {
    let year_month = normalize_year_month(&draft.year_month)?;
    let (id, created) = match draft.id {
        Some(id) if !id.trim().is_empty() => (id, false),
        _ => (uuid::Uuid::new_v4().to_string(), true),
    };
    Ok((
        Post {
            id,
            title: draft.title,
            company_id: draft.company_id,
            year_month,
            content: draft.content,
        },
        created,
    ))
}

pub struct SqliteSource {
    db: Arc<Mutex<Database>>,
}

impl SqliteSource {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        SqliteSource { db }
    }
}

#[async_trait]
impl EntitySource for SqliteSource {
    async fn list_companies(&self) -> AppResult<Vec<Company>> {
        let db = self
            .db
            .lock()
            .map_err(|_| AppError::SourceUnavailable("DB lock".to_string()))?;
        db.get_companies()
            .map_err(|e| AppError::SourceUnavailable(e.to_string()))
    }

    async fn list_posts(&self) -> AppResult<Vec<Post>> {
        let db = self
            .db
            .lock()
            .map_err(|_| AppError::SourceUnavailable("DB lock".to_string()))?;
        db.get_posts()
            .map_err(|e| AppError::SourceUnavailable(e.to_string()))
    }

    async fn upsert_post(&self, draft: PostDraft) -> AppResult<Post> {
        let (post, created) = prepare_post(draft)?;
        let db = self
            .db
            .lock()
            .map_err(|_| AppError::WriteFailure("DB lock".to_string()))?;

        if created {
            db.insert_post(&post)
                .map_err(|e| AppError::WriteFailure(e.to_string()))?;
            info!(post = %post.id, company = %post.company_id, "Created post");
        } else {
            let updated = db
                .update_post(&post)
                .map_err(|e| AppError::WriteFailure(e.to_string()))?;
            if !updated {
                return Err(AppError::NotFound(format!("post {}", post.id)));
            }
            info!(post = %post.id, "Updated post");
        }
        Ok(post)
    }
}

/// Keeps everything in memory; handy for embedding and tests. Record and
/// post months are normalized on construction.
pub struct MemorySource {
    companies: RwLock<Vec<Company>>,
    posts: RwLock<Vec<Post>>,
}

impl MemorySource {
    pub fn new(companies: Vec<Company>, posts: Vec<Post>) -> AppResult<Self> {
        let companies = companies
            .into_iter()
            .map(normalize_company)
            .collect::<AppResult<Vec<_>>>()?;
        let posts = posts
            .into_iter()
            .map(|mut post| {
                post.year_month = normalize_year_month(&post.year_month)?;
                Ok(post)
            })
            .collect::<AppResult<Vec<_>>>()?;
        Ok(MemorySource {
            companies: RwLock::new(companies),
            posts: RwLock::new(posts),
        })
    }
}

#[async_trait]
impl EntitySource for MemorySource {
    async fn list_companies(&self) -> AppResult<Vec<Company>> {
        self.companies
            .read()
            .map(|companies| companies.clone())
            .map_err(|_| AppError::SourceUnavailable("companies lock".to_string()))
    }

    async fn list_posts(&self) -> AppResult<Vec<Post>> {
        self.posts
            .read()
            .map(|posts| posts.clone())
            .map_err(|_| AppError::SourceUnavailable("posts lock".to_string()))
    }

    async fn upsert_post(&self, draft: PostDraft) -> AppResult<Post> {
        let (post, created) = prepare_post(draft)?;
        let mut posts = self
            .posts
            .write()
            .map_err(|_| AppError::WriteFailure("posts lock".to_string()))?;

        if created {
            posts.push(post.clone());
        } else {
            let slot = posts
                .iter_mut()
                .find(|existing| existing.id == post.id)
                .ok_or_else(|| AppError::NotFound(format!("post {}", post.id)))?;
            *slot = post.clone();
        }
        Ok(post)
    }
}
