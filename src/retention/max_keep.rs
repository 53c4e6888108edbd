use crate::{config::RetentionConfig, models::RunRecord};

/// Number of runs to keep for the group of `triggering`.
///
/// The run's max-keep annotation wins over the configured default; either is
/// capped by `max_max_keep`. `None` means retention should not run.
pub fn resolve_max_keep(triggering: &RunRecord, config: &RetentionConfig) -> Option<i64> {
    let annotation_key = &config.labels.max_keep_annotation;

    let requested = match triggering.annotation(annotation_key) {
        Some(raw) => match raw.parse::<i64>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(
                    run = %triggering.name,
                    annotation = %annotation_key,
                    value = raw,
                    error = %e,
                    "Ignoring unparsable max-keep annotation"
                );
                None
            }
        },
        None => None,
    };

    let max_keep = requested.or(config.default_max_keep.map(i64::from))?;

    match config.max_max_keep.map(i64::from) {
        Some(ceiling) if max_keep > ceiling => {
            tracing::debug!(
                run = %triggering.name,
                requested = max_keep,
                ceiling = ceiling,
                "Capping max-keep to configured ceiling"
            );
            Some(ceiling)
        }
        _ => Some(max_keep),
    }
}
