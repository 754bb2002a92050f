use cartera::config::AppConfig;
use cartera::error::AppError;
use cartera::workflows::arrears::LetterType;
use cartera::workflows::collections::{CollectionsService, Period, SqliteStore};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type SqliteService = CollectionsService<SqliteStore>;

/// Loads configuration, applies the `--database` override and opens the store.
pub(crate) fn open_service(
    config: &mut AppConfig,
    database: Option<PathBuf>,
) -> Result<Arc<SqliteService>, AppError> {
    if let Some(path) = database {
        config.storage.database_path = path;
    }
    let store = SqliteStore::open(&config.storage)?;
    Ok(Arc::new(CollectionsService::new(Arc::new(store))))
}

pub(crate) fn parse_period(raw: &str) -> Result<Period, String> {
    Period::parse(raw).map_err(|err| err.to_string())
}

pub(crate) fn parse_letter_type(raw: &str) -> Result<LetterType, String> {
    LetterType::parse(raw).ok_or_else(|| format!("unknown letter type '{raw}', expected CS, CP or AB"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_parsers_explain_rejections() {
        assert_eq!(parse_period("2026-02").expect("valid").as_str(), "2026-02");
        assert!(parse_period("02-2026").expect_err("invalid").contains("YYYY-MM"));
        assert_eq!(parse_letter_type(" ab ").expect("valid"), LetterType::Judicial);
        assert!(parse_letter_type("XX").expect_err("invalid").contains("XX"));
    }
}
