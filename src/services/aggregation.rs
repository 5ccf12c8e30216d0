use std::collections::HashMap;

use tracing::{debug, warn};

use crate::models::{BarPoint, ChartPoint, Company, DashboardMetrics, GroupBy, PeriodRange};
use crate::services::period::{iter_months, parse_period, YearMonth};

#[derive(Debug, Clone, Copy)]
struct Window {
    from: YearMonth,
    to: YearMonth,
}

impl Window {
    fn contains(&self, month: YearMonth) -> bool {
        self.from <= month && month <= self.to
    }

    fn previous_year(&self) -> Option<Window> {
        Some(Window {
            from: self.from.previous_year().ok()?,
            to: self.to.previous_year().ok()?,
        })
    }
}

/// A malformed period aggregates as an empty window instead of failing.
fn resolve_window(period: &PeriodRange) -> Option<Window> {
    match parse_period(period) {
        Ok((from, to)) => Some(Window { from, to }),
        Err(err) => {
            warn!("Aggregating over empty period: {}", err);
            None
        }
    }
}

fn in_window(window: Option<Window>, month: YearMonth) -> bool {
    window.map(|w| w.contains(month)).unwrap_or(false)
}

fn record_month(company: &Company, raw: &str) -> Option<YearMonth> {
    match YearMonth::parse(raw) {
        Ok(month) => Some(month),
        Err(_) => {
            debug!(company = %company.id, year_month = raw, "Skipping record with malformed month");
            None
        }
    }
}

/// Accumulates values by key while remembering first-seen key order.
#[derive(Default)]
struct OrderedSums {
    index: HashMap<String, usize>,
    entries: Vec<(String, String, f64)>,
}

impl OrderedSums {
    fn add(&mut self, key: &str, name: &str, value: f64) {
        match self.index.get(key) {
            Some(&pos) => self.entries[pos].2 += value,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), name.to_string(), value));
            }
        }
    }

    fn into_chart_points(self) -> Vec<ChartPoint> {
        self.entries
            .into_iter()
            .map(|(_, name, value)| ChartPoint { name, value })
            .collect()
    }

    fn into_bar_points(self) -> Vec<BarPoint> {
        self.entries
            .into_iter()
            .map(|(key, name, value)| BarPoint { key, name, value })
            .collect()
    }
}

/// Computes KPI totals and chart series for `companies` over `period`.
///
/// Never fails: an empty company list yields empty metrics (no zero-filled
/// months), and a malformed period is treated as containing no months.
/// Inputs are only read; every call returns freshly allocated output.
pub fn aggregate(companies: &[Company], period: &PeriodRange) -> DashboardMetrics {
    if companies.is_empty() {
        return DashboardMetrics::empty();
    }

    let window = resolve_window(period);
    let prev_window = window.and_then(|w| w.previous_year());

    let mut monthly: HashMap<YearMonth, f64> = HashMap::new();
    let mut sources = OrderedSums::default();
    let mut bars = OrderedSums::default();
    let mut prev_year_total = 0.0;

    for company in companies {
        let mut company_sum = 0.0;
        for record in &company.emissions {
            let Some(month) = record_month(company, &record.year_month) else {
                continue;
            };
            if in_window(window, month) {
                company_sum += record.emissions;
                *monthly.entry(month).or_insert(0.0) += record.emissions;
                sources.add(&record.source, &record.source, record.emissions);
            }
            if in_window(prev_window, month) {
                prev_year_total += record.emissions;
            }
        }
        bars.add(&company.id, &company.name, company_sum);
    }

    let bar_data = bars.into_bar_points();
    let total: f64 = bar_data.iter().map(|b| b.value).sum();

    let line_data = window
        .map(|w| {
            iter_months(w.from, w.to)
                .map(|month| ChartPoint {
                    name: month.to_string(),
                    value: monthly.get(&month).copied().unwrap_or(0.0),
                })
                .collect()
        })
        .unwrap_or_default();

    DashboardMetrics {
        total,
        prev_year_total,
        delta: year_over_year_delta(total, prev_year_total),
        line_data,
        donut_data: sources.into_chart_points(),
        bar_data,
    }
}

/// Per-company or per-country totals over `period`, in first-seen order.
/// Every company contributes a bar (or to its country's bar) even without
/// records in range.
pub fn group_totals(companies: &[Company], period: &PeriodRange, group_by: GroupBy) -> Vec<BarPoint> {
    let window = resolve_window(period);
    let mut bars = OrderedSums::default();

    for company in companies {
        let sum: f64 = company
            .emissions
            .iter()
            .filter_map(|record| record_month(company, &record.year_month).map(|m| (m, record.emissions)))
            .filter(|(month, _)| in_window(window, *month))
            .map(|(_, value)| value)
            .sum();

        match group_by {
            GroupBy::Company => bars.add(&company.id, &company.name, sum),
            GroupBy::Country => bars.add(&company.country, &company.country, sum),
        }
    }

    bars.into_bar_points()
}

/// Percent change against the prior year; `None` when the prior year is zero.
pub fn year_over_year_delta(total: f64, prev_year_total: f64) -> Option<f64> {
    if prev_year_total == 0.0 {
        None
    } else {
        Some((total - prev_year_total) / prev_year_total * 100.0)
    }
}

pub fn estimate_tax(total: f64, rate_per_ton: f64) -> f64 {
    total * rate_per_ton
}
