use anyhow::anyhow;
use etl::{
    access_token, get_config_info, setup_logger, Cli, OpenMeteo, Pipeline, SheetsClient,
    StateStore,
};
use slog::{error, info, Logger};
use tokio::time::timeout;

#[tokio::main]
async fn main() {
    let cli = get_config_info();
    let logger = setup_logger(&cli);

    if let Err(err) = run(&cli, logger.clone()).await {
        error!(logger, "run failed: {}", err);
        // the async drain flushes on drop
        drop(logger);
        std::process::exit(1);
    }
}

async fn run(cli: &Cli, logger: Logger) -> Result<(), anyhow::Error> {
    info!(logger, "Weather ETL starting...");
    info!(logger, "  Coordinate: {}, {}", cli.latitude(), cli.longitude());
    info!(logger, "  Sheet: {}", cli.sheet_name());
    info!(logger, "  State file: {}", cli.state_path());

    let token = access_token(&cli.credentials_path()).await?;
    let table = SheetsClient::new(token, logger.clone())
        .open(&cli.sheet_name())
        .await
        .map_err(|e| anyhow!("opening sheet {:?}: {}", cli.sheet_name(), e))?;

    let source = OpenMeteo::new(
        logger.clone(),
        cli.forecast_url(),
        cli.archive_url(),
        cli.latitude(),
        cli.longitude(),
    )?;
    let store = StateStore::new(cli.state_path(), logger.clone());

    let pipeline = Pipeline::new(
        logger.clone(),
        &source,
        &table,
        store,
        cli.window_policy(),
        cli.batch_size(),
    );

    let summary = timeout(cli.run_timeout(), pipeline.run())
        .await
        .map_err(|_| anyhow!("run exceeded deadline of {:?}", cli.run_timeout()))??;

    info!(
        logger,
        "done: fetched {} hours, appended {} rows", summary.fetched, summary.appended
    );
    Ok(())
}
