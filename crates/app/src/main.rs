mod job;
mod telemetry;

use tracing::{error, info};
use url_triage_netcraft::NetcraftClient;
use url_triage_storage::{Database, SubmissionSource, SummaryStore};
use url_triage_util::{load_env_file, AppConfig};

use crate::job::ReconcileJob;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;

    let database = Database::connect(&config.store).await?;
    database.run_migrations().await?;

    let job = ReconcileJob::new(
        SubmissionSource::new(&database, &config.store),
        NetcraftClient::new(config.netcraft_base_url.clone(), reqwest::Client::new()),
        SummaryStore::new(&database, &config.store),
        config.lookback,
    );

    match job.run_once().await {
        Ok(report) => {
            info!(
                stage = "run",
                summary_id = %report.summary_id,
                identifiers = report.identifiers,
                failed_lookups = report.lookups.non_success + report.lookups.failed,
                malformed_entries = report.lookups.malformed_entries,
                urls = report.distinct_urls,
                unrecognized_urls = report.unrecognized_urls,
                "run completed"
            );
            Ok(())
        }
        Err(err) => {
            error!(stage = "run", error = %err, "run aborted");
            Err(err.into())
        }
    }
}
