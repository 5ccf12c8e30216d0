use crate::error::{AppError, AppResult};
use crate::models::{Company, DashboardScope, DashboardView, Settings};
use crate::services::aggregation::{aggregate, estimate_tax, group_totals};
use crate::services::source::EntitySource;

pub async fn get_dashboard(
    source: &dyn EntitySource,
    settings: &Settings,
    scope: DashboardScope,
) -> AppResult<DashboardView> {
    let companies = source.list_companies().await?;
    build_dashboard(companies, settings, scope)
}

/// Narrows `companies` to `scope` and aggregates them with the given filter
/// state. The overall view groups its bars by `settings.group_by`; company
/// and country views always show one bar per company.
pub fn build_dashboard(
    companies: Vec<Company>,
    settings: &Settings,
    scope: DashboardScope,
) -> AppResult<DashboardView> {
    let in_scope: Vec<Company> = match &scope {
        DashboardScope::All => companies,
        DashboardScope::Company(id) => {
            let company = companies
                .into_iter()
                .find(|c| &c.id == id)
                .ok_or_else(|| AppError::NotFound(format!("company {}", id)))?;
            vec![company]
        }
        DashboardScope::Country(code) => companies
            .into_iter()
            .filter(|c| &c.country == code)
            .collect(),
    };

    let mut metrics = aggregate(&in_scope, &settings.period);
    if scope == DashboardScope::All {
        metrics.bar_data = group_totals(&in_scope, &settings.period, settings.group_by);
    }

    Ok(DashboardView {
        estimated_tax: estimate_tax(metrics.total, settings.rate_per_ton),
        scope,
        period: settings.period.clone(),
        rate_per_ton: settings.rate_per_ton,
        group_by: settings.group_by,
        metrics,
    })
}
