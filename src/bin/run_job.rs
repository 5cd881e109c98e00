//! Manual trigger: `run-job <name>` runs one job and prints the JobResult JSON.
//! Exit code is 0 for success or skip, 1 for a failed job, 2 for bad usage.

use std::process::ExitCode;

use social_autopilot::config::AutopilotConfig;
use social_autopilot::{bootstrap, JobName, JobOutcome};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("social_autopilot=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(name) = std::env::args().nth(1) else {
        let names: Vec<&str> = JobName::ALL.iter().map(|j| j.as_str()).collect();
        eprintln!("usage: run-job <{}>", names.join("|"));
        return Ok(ExitCode::from(2));
    };

    let cfg = AutopilotConfig::load_default()?;
    let router = bootstrap::from_config(cfg)?;
    let res = router.route(&name).await;
    println!("{}", serde_json::to_string_pretty(&res)?);

    Ok(match res.outcome {
        JobOutcome::Failed => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}
