use std::cmp::Reverse;
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::models::{Post, PostDraft, PostListing};
use crate::services::period::YearMonth;
use crate::services::source::EntitySource;

/// Posts newest month first, optionally for one company, each labelled with
/// its company's name (or the raw id when the company is unknown).
pub async fn list_posts(source: &dyn EntitySource, company_id: Option<&str>) -> AppResult<Vec<PostListing>> {
    let companies = source.list_companies().await?;
    let posts = source.list_posts().await?;

    let mut listings: Vec<PostListing> = posts
        .into_iter()
        .filter(|p| company_id.map(|id| p.company_id == id).unwrap_or(true))
        .map(|post| {
            let company_name = companies
                .iter()
                .find(|c| c.id == post.company_id)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| post.company_id.clone());
            PostListing { post, company_name }
        })
        .collect();

    listings.sort_by_key(|l| Reverse(YearMonth::parse(&l.post.year_month).ok()));
    Ok(listings)
}

/// Validates and writes a post. On failure nothing is written and the draft
/// is left with the caller so it can be resubmitted.
pub async fn save_post(source: &dyn EntitySource, draft: &PostDraft) -> AppResult<Post> {
    if draft.title.trim().is_empty() {
        return Err(AppError::Validation("title is required".to_string()));
    }
    if draft.company_id.trim().is_empty() {
        return Err(AppError::Validation("company is required".to_string()));
    }
    YearMonth::parse(&draft.year_month)?;

    let companies = source.list_companies().await?;
    if !companies.iter().any(|c| c.id == draft.company_id) {
        return Err(AppError::Validation(format!("unknown company {}", draft.company_id)));
    }

    source.upsert_post(draft.clone()).await.map_err(|err| {
        warn!("Saving post failed: {}", err);
        err
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Company;
    use crate::services::source::MemorySource;

    fn source() -> MemorySource {
        let companies = vec![
            Company {
                id: "c1".to_string(),
                name: "Acme Corp".to_string(),
                country: "US".to_string(),
                emissions: Vec::new(),
            },
            Company {
                id: "c2".to_string(),
                name: "Globex".to_string(),
                country: "DE".to_string(),
                emissions: Vec::new(),
            },
        ];
        let posts = vec![
            Post {
                id: "p1".to_string(),
                title: "February".to_string(),
                company_id: "c1".to_string(),
                year_month: "2025-02".to_string(),
                content: String::new(),
            },
            Post {
                id: "p2".to_string(),
                title: "March".to_string(),
                company_id: "c2".to_string(),
                year_month: "2025-03".to_string(),
                content: String::new(),
            },
            Post {
                id: "p3".to_string(),
                title: "Orphan".to_string(),
                company_id: "c9".to_string(),
                year_month: "2024-12".to_string(),
                content: String::new(),
            },
        ];
        MemorySource::new(companies, posts).unwrap()
    }

    fn draft(title: &str, company_id: &str, year_month: &str) -> PostDraft {
        PostDraft {
            id: None,
            title: title.to_string(),
            company_id: company_id.to_string(),
            year_month: year_month.to_string(),
            content: "body".to_string(),
        }
    }

    #[tokio::test]
    async fn lists_newest_first_with_company_names() {
        let listings = list_posts(&source(), None).await.unwrap();
        let rows: Vec<(&str, &str)> = listings
            .iter()
            .map(|l| (l.post.id.as_str(), l.company_name.as_str()))
            .collect();
        assert_eq!(rows, vec![("p2", "Globex"), ("p1", "Acme Corp"), ("p3", "c9")]);
    }

    #[tokio::test]
    async fn filters_by_company() {
        let listings = list_posts(&source(), Some("c1")).await.unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].post.id, "p1");
    }

    #[tokio::test]
    async fn save_requires_title_company_and_month() {
        let source = source();
        for bad in [draft("  ", "c1", "2025-03"), draft("t", "", "2025-03"), draft("t", "c7", "2025-03")] {
            assert!(matches!(save_post(&source, &bad).await, Err(AppError::Validation(_))));
        }
        assert!(matches!(
            save_post(&source, &draft("t", "c1", "someday")).await,
            Err(AppError::MalformedPeriod(_))
        ));
        assert_eq!(source.list_posts().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn save_creates_and_updates() {
        let source = source();
        let created = save_post(&source, &draft("April", "c1", "2025-4")).await.unwrap();
        assert_eq!(created.year_month, "2025-04");

        let mut edit = draft("April, revised", "c1", "2025-04");
        edit.id = Some(created.id.clone());
        save_post(&source, &edit).await.unwrap();

        let posts = source.list_posts().await.unwrap();
        assert_eq!(posts.len(), 4);
        assert_eq!(posts[3].title, "April, revised");
    }
}
