use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{GroupBy, PeriodRange, Settings};
use crate::services::period::{default_period, parse_period};
use crate::services::source::SqliteSource;
use crate::utils::parse_decimal;

pub const DEFAULT_RATE_PER_TON: f64 = 50.0;

const KEY_PERIOD_FROM: &str = "period_from";
const KEY_PERIOD_TO: &str = "period_to";
const KEY_RATE_PER_TON: &str = "rate_per_ton";
const KEY_GROUP_BY: &str = "group_by";

impl Default for Settings {
    fn default() -> Self {
        Settings {
            period: default_period(),
            rate_per_ton: DEFAULT_RATE_PER_TON,
            group_by: GroupBy::Company,
        }
    }
}

pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub settings: Arc<Mutex<Settings>>,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        let settings = load_settings(&db);
        AppState {
            db: Arc::new(Mutex::new(db)),
            settings: Arc::new(Mutex::new(settings)),
        }
    }

    pub fn source(&self) -> SqliteSource {
        SqliteSource::new(self.db.clone())
    }

    /// Copy of the current filter state.
    pub fn snapshot(&self) -> AppResult<Settings> {
        self.settings
            .lock()
            .map(|s| s.clone())
            .map_err(|_| AppError::SourceUnavailable("Settings lock".to_string()))
    }

    pub fn set_period(&self, from: &str, to: &str) -> AppResult<Settings> {
        let period = validate_period(from, to)?;
        info!(from = %period.from, to = %period.to, "Updating period");
        self.modify(|s| s.period = period)
    }

    pub fn set_rate_per_ton(&self, rate: f64) -> AppResult<Settings> {
        let rate = validate_rate(rate)?;
        info!(rate, "Updating carbon price");
        self.modify(|s| s.rate_per_ton = rate)
    }

    pub fn set_group_by(&self, group_by: GroupBy) -> AppResult<Settings> {
        info!(group_by = group_by.as_str(), "Updating grouping");
        self.modify(|s| s.group_by = group_by)
    }

    /// Applies `change` to a copy of the current settings, writes every key in
    /// one transaction and only then swaps the copy in. The settings lock is
    /// held throughout.
    pub fn modify(&self, change: impl FnOnce(&mut Settings)) -> AppResult<Settings> {
        let mut current = self
            .settings
            .lock()
            .map_err(|_| AppError::WriteFailure("Settings lock".to_string()))?;
        let mut next = current.clone();
        change(&mut next);

        let mut db = self
            .db
            .lock()
            .map_err(|_| AppError::WriteFailure("DB lock".to_string()))?;
        db.set_settings(&[
            (KEY_PERIOD_FROM, next.period.from.clone()),
            (KEY_PERIOD_TO, next.period.to.clone()),
            (KEY_RATE_PER_TON, next.rate_per_ton.to_string()),
            (KEY_GROUP_BY, next.group_by.as_str().to_string()),
        ])
        .map_err(|e| {
            warn!("Saving settings failed: {}", e);
            AppError::WriteFailure(e.to_string())
        })?;

        *current = next.clone();
        Ok(next)
    }
}

/// Reads persisted settings; missing or unreadable values fall back to defaults.
pub fn load_settings(db: &Database) -> Settings {
    let defaults = Settings::default();

    let from = db.get_setting(KEY_PERIOD_FROM).ok().flatten();
    let to = db.get_setting(KEY_PERIOD_TO).ok().flatten();
    let period = match (from, to) {
        (Some(from), Some(to)) => validate_period(&from, &to).unwrap_or_else(|err| {
            warn!("Ignoring stored period: {}", err);
            defaults.period.clone()
        }),
        _ => defaults.period.clone(),
    };

    let rate_per_ton = db
        .get_setting(KEY_RATE_PER_TON)
        .ok()
        .flatten()
        .and_then(|raw| parse_decimal(&raw))
        .and_then(|rate| validate_rate(rate).ok())
        .unwrap_or(defaults.rate_per_ton);

    let group_by = db
        .get_setting(KEY_GROUP_BY)
        .ok()
        .flatten()
        .and_then(|raw| GroupBy::parse(&raw))
        .unwrap_or(defaults.group_by);

    Settings {
        period,
        rate_per_ton,
        group_by,
    }
}

/// Boundary check for user-selected periods: both tokens must parse and
/// `from` must not come after `to`. Returns the normalized period.
pub fn validate_period(from: &str, to: &str) -> AppResult<PeriodRange> {
    let (from, to) = parse_period(&PeriodRange::new(from, to))?;
    if from > to {
        return Err(AppError::Validation(format!(
            "period start {} is after end {}",
            from, to
        )));
    }
    Ok(PeriodRange::new(from.to_string(), to.to_string()))
}

pub fn validate_rate(rate: f64) -> AppResult<f64> {
    if !rate.is_finite() || rate < 0.0 {
        return Err(AppError::Validation(format!("invalid carbon price {}", rate)));
    }
    Ok(rate)
}
