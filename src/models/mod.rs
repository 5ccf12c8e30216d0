use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    pub name: String,
    /// Country code used for the country grouping, e.g. "US".
    pub country: String,
    pub emissions: Vec<EmissionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionRecord {
    pub year_month: String,
    pub source: String,
    /// CO2-equivalent tons.
    pub emissions: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanySummary {
    pub id: String,
    pub name: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub company_id: String,
    pub year_month: String,
    pub content: String,
}

/// Create-or-update payload. Without an id a new post is created.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostDraft {
    pub id: Option<String>,
    pub title: String,
    pub company_id: String,
    pub year_month: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostListing {
    #[serde(flatten)]
    pub post: Post,
    pub company_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodRange {
    pub from: String,
    pub to: String,
}

impl PeriodRange {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        PeriodRange {
            from: from.into(),
            to: to.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    Company,
    Country,
}

impl GroupBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupBy::Company => "company",
            GroupBy::Country => "country",
        }
    }

    pub fn parse(value: &str) -> Option<GroupBy> {
        match value.trim().to_ascii_lowercase().as_str() {
            "company" => Some(GroupBy::Company),
            "country" => Some(GroupBy::Country),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub period: PeriodRange,
    pub rate_per_ton: f64,
    pub group_by: GroupBy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarPoint {
    /// Grouping identity: company id or country code.
    pub key: String,
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardMetrics {
    pub total: f64,
    pub prev_year_total: f64,
    /// Year-over-year change in percent; `None` when there is no prior-year data.
    pub delta: Option<f64>,
    pub line_data: Vec<ChartPoint>,
    pub donut_data: Vec<ChartPoint>,
    pub bar_data: Vec<BarPoint>,
}

impl DashboardMetrics {
    pub fn empty() -> Self {
        DashboardMetrics {
            total: 0.0,
            prev_year_total: 0.0,
            delta: None,
            line_data: Vec::new(),
            donut_data: Vec::new(),
            bar_data: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum DashboardScope {
    All,
    Company(String),
    Country(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardView {
    pub scope: DashboardScope,
    pub period: PeriodRange,
    pub rate_per_ton: f64,
    pub group_by: GroupBy,
    pub estimated_tax: f64,
    pub metrics: DashboardMetrics,
}
