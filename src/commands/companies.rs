use crate::error::AppResult;
use crate::models::CompanySummary;
use crate::services::source::EntitySource;

pub async fn list_companies(source: &dyn EntitySource) -> AppResult<Vec<CompanySummary>> {
    let companies = source.list_companies().await?;
    Ok(companies
        .into_iter()
        .map(|c| CompanySummary {
            id: c.id,
            name: c.name,
            country: c.country,
        })
        .collect())
}

/// Distinct country codes in first-seen order.
pub async fn list_countries(source: &dyn EntitySource) -> AppResult<Vec<String>> {
    let companies = source.list_companies().await?;
    let mut countries: Vec<String> = Vec::new();
    for company in companies {
        if !countries.contains(&company.country) {
            countries.push(company.country);
        }
    }
    Ok(countries)
}
