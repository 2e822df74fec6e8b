use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled || PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    describe();
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

fn describe() {
    metrics::describe_counter!(
        "quiz_provider_requests_total",
        "Text generation provider calls by outcome"
    );
    metrics::describe_histogram!(
        "quiz_provider_duration_seconds",
        "Latency of text generation provider calls"
    );
    metrics::describe_counter!(
        "quiz_questions_generated_total",
        "Question drafts produced, labelled by the strategy that produced them"
    );
    metrics::describe_counter!("quiz_generations_total", "Quiz generation requests by outcome");
    metrics::describe_counter!("quiz_attempts_total", "Graded quiz attempts");
}
