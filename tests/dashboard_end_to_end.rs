use std::sync::{Arc, Mutex};

use carbonboard::commands::dashboard::get_dashboard;
use carbonboard::db::Database;
use carbonboard::models::{DashboardScope, GroupBy, PeriodRange, Settings};
use carbonboard::services::import::{import_demo, import_file, ImportOutcome};
use carbonboard::services::source::SqliteSource;
use tempfile::tempdir;

fn settings(from: &str, to: &str, group_by: GroupBy) -> Settings {
    Settings {
        period: PeriodRange::new(from, to),
        rate_per_ton: 50.0,
        group_by,
    }
}

fn seeded(dir: &std::path::Path) -> SqliteSource {
    let db = Database::new(dir.join("dashboard.sqlite")).expect("open db");
    let db = Arc::new(Mutex::new(db));
    import_demo(&db).expect("seed");
    SqliteSource::new(db)
}

#[tokio::test]
async fn first_quarter_overview() {
    let dir = tempdir().expect("tempdir");
    let source = seeded(dir.path());

    let view = get_dashboard(&source, &settings("2025-01", "2025-03", GroupBy::Company), DashboardScope::All)
        .await
        .expect("dashboard");
    let metrics = &view.metrics;

    assert_eq!(metrics.total, 455.0);
    assert_eq!(metrics.prev_year_total, 340.0);
    let delta = metrics.delta.expect("delta");
    assert!((delta - (455.0 - 340.0) / 340.0 * 100.0).abs() < 1e-9);
    assert_eq!(view.estimated_tax, 22_750.0);

    let line: Vec<(&str, f64)> = metrics.line_data.iter().map(|p| (p.name.as_str(), p.value)).collect();
    assert_eq!(line, vec![("2025-01", 0.0), ("2025-02", 125.0), ("2025-03", 330.0)]);

    let donut: Vec<(&str, f64)> = metrics.donut_data.iter().map(|p| (p.name.as_str(), p.value)).collect();
    assert_eq!(donut, vec![("gasoline", 115.0), ("diesel", 275.0), ("lpg", 65.0)]);

    let bars: Vec<(&str, f64)> = metrics.bar_data.iter().map(|b| (b.name.as_str(), b.value)).collect();
    assert_eq!(
        bars,
        vec![
            ("Acme Corp", 115.0),
            ("Globex", 225.0),
            ("SK", 65.0),
            ("AstraZeneca", 50.0),
            ("Toyota", 0.0),
            ("LVMH", 0.0),
        ]
    );
}

#[tokio::test]
async fn country_grouping_and_scopes() {
    let dir = tempdir().expect("tempdir");
    let source = seeded(dir.path());

    let view = get_dashboard(&source, &settings("2025-01", "2025-03", GroupBy::Country), DashboardScope::All)
        .await
        .expect("dashboard");
    let keys: Vec<(&str, f64)> = view.metrics.bar_data.iter().map(|b| (b.key.as_str(), b.value)).collect();
    assert_eq!(
        keys,
        vec![("US", 115.0), ("DE", 225.0), ("KR", 65.0), ("GB", 50.0), ("JP", 0.0), ("FR", 0.0)]
    );

    let de = get_dashboard(
        &source,
        &settings("2025-01", "2025-03", GroupBy::Country),
        DashboardScope::Country("DE".to_string()),
    )
    .await
    .expect("country dashboard");
    assert_eq!(de.metrics.total, 225.0);
    assert_eq!(de.metrics.prev_year_total, 80.0);
}

#[tokio::test]
async fn unpadded_source_month_counts_after_ingest() {
    let dir = tempdir().expect("tempdir");
    let source = seeded(dir.path());

    let view = get_dashboard(&source, &settings("2024-06", "2024-06", GroupBy::Company), DashboardScope::All)
        .await
        .expect("dashboard");
    assert_eq!(view.metrics.total, 160.0);

    let toyota = get_dashboard(
        &source,
        &settings("2024-06", "2024-06", GroupBy::Company),
        DashboardScope::Company("c5".to_string()),
    )
    .await
    .expect("company dashboard");
    assert_eq!(toyota.metrics.total, 90.0);
}

#[tokio::test]
async fn importing_the_same_file_twice_is_a_no_op() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("dataset.json");
    std::fs::write(
        &path,
        r#"{"companies": [{"id": "x1", "name": "Solo", "country": "NO",
            "emissions": [{"yearMonth": "2025-1", "source": "hydro", "emissions": 3.5}]}]}"#,
    )
    .expect("write dataset");

    let db = Arc::new(Mutex::new(Database::new(dir.path().join("import.sqlite")).expect("open db")));
    assert_eq!(
        import_file(&db, &path).expect("first import"),
        ImportOutcome::Imported {
            companies: 1,
            records: 1,
            posts: 0
        }
    );
    assert_eq!(import_file(&db, &path).expect("second import"), ImportOutcome::Unchanged);

    let companies = db.lock().expect("lock").get_companies().expect("companies");
    assert_eq!(companies.len(), 1);
    assert_eq!(companies[0].emissions[0].year_month, "2025-01");
}
