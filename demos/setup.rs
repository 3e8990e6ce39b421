use std::{error::Error, fmt};

#[derive(Debug)]
struct Timeout;

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("upstream timed out")
    }
}

impl Error for Timeout {}

fn main() -> Result<(), json_logging::ParseLevelError> {
    json_logging::setup("info", [("noisy", "warning")])?.init();
    // {"message": "Setup logging with level:INFO, ignore: [noisy=WARNING]", "Module": "json_logging::builder", "Severity": "INFO"}

    tracing::info!("service started");
    // {"message": "service started", "Module": "setup", "Severity": "INFO"}

    tracing::info!(target: "noisy", "this is dropped");
    tracing::warn!(target: "noisy", retries = 3, "this is not");
    // {"message": "this is not", "retries": 3, "Module": "noisy", "Severity": "WARNING"}

    tracing::info!(json = %serde_json::json!({"order": 17, "items": ["tea", "milk"]}));
    // {"message": null, "order": 17, "items": ["tea", "milk"], "Module": "setup", "Severity": "INFO"}

    let span = tracing::info_span!("request", user = "ada");
    let _span = span.enter();
    let error = Timeout;
    tracing::error!(error = &error as &(dyn Error + 'static), "request failed");
    // {"message": "request failed", "user": "ada", "exc_info": "upstream timed out", "Module": "setup", "Severity": "ERROR"}

    Ok(())
}
