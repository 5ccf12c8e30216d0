use serde::Deserialize;

use crate::error::AppResult;
use crate::models::{GroupBy, Settings};
use crate::services::state::{validate_period, validate_rate, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct SettingsPayload {
    pub period_from: Option<String>,
    pub period_to: Option<String>,
    pub rate_per_ton: Option<f64>,
    pub group_by: Option<GroupBy>,
}

pub fn get_settings(state: &AppState) -> AppResult<Settings> {
    state.snapshot()
}

/// Applies the fields present in `payload`. Everything is validated first
/// and then written in a single transaction, so a rejected payload or a
/// failed write changes nothing.
pub fn save_settings(state: &AppState, payload: SettingsPayload) -> AppResult<Settings> {
    let current = state.snapshot()?;

    let period = match (payload.period_from, payload.period_to) {
        (None, None) => None,
        (from, to) => Some(validate_period(
            from.as_deref().unwrap_or(current.period.from.as_str()),
            to.as_deref().unwrap_or(current.period.to.as_str()),
        )?),
    };
    let rate = payload.rate_per_ton.map(validate_rate).transpose()?;
    let group_by = payload.group_by;

    state.modify(|settings| {
        if let Some(period) = period {
            settings.period = period;
        }
        if let Some(rate) = rate {
            settings.rate_per_ton = rate;
        }
        if let Some(group_by) = group_by {
            settings.group_by = group_by;
        }
    })
}
