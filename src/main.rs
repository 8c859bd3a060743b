use std::{io::Write, process, sync::Arc};

use ordervault::{
    application::{
        error::AppError,
        ingest::{IngestPipeline, IngestStats},
        repos::{OrdersRepo, StoreHealth},
    },
    cache::CachedOrders,
    config,
    domain::sample::{corrupt, sample_order},
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        source, telemetry,
    },
};
use tokio::io::BufReader;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use uuid::Uuid;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    match command {
        // Writes NDJSON to stdout, so no log subscriber is installed.
        config::Command::Sample(args) => run_sample(args),
        config::Command::Serve(_) => {
            telemetry::init(&settings.logging).map_err(AppError::from)?;
            run_serve(settings).await
        }
        config::Command::Ingest(args) => {
            telemetry::init(&settings.logging).map_err(AppError::from)?;
            run_ingest(settings, args).await
        }
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let orders = warm_cache(repositories.clone()).await?;

    let max_message_bytes = settings.ingest.max_message_bytes.get();
    let (ingress, messages) = source::channel(settings.ingest.queue_capacity.get());
    let pipeline = IngestPipeline::new(orders.clone(), max_message_bytes);
    let pipeline_handle = tokio::spawn(async move { pipeline.run(messages).await });

    let state = HttpState {
        orders,
        health: repositories as Arc<dyn StoreHealth>,
        ingress,
        max_message_bytes,
    };
    let result = serve_http(&settings, state).await;

    // The router held the last ingress sender, so the queue now drains and closes.
    match tokio::time::timeout(settings.server.graceful_shutdown, pipeline_handle).await {
        Ok(Ok(stats)) => log_stats(&stats),
        Ok(Err(err)) => error!(error = %err, "ingest pipeline task failed"),
        Err(_) => warn!(
            timeout_secs = settings.server.graceful_shutdown.as_secs(),
            "ingest queue did not drain before the shutdown deadline"
        ),
    }

    result
}

async fn run_ingest(settings: config::Settings, args: config::IngestArgs) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let orders = warm_cache(repositories).await?;
    let max_message_bytes = settings.ingest.max_message_bytes.get();
    let pipeline = IngestPipeline::new(orders, max_message_bytes);

    let stats = match args.input_file() {
        Some(path) => {
            info!(path = %path.display(), "Ingesting orders from file");
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|err| AppError::from(InfraError::from(err)))?;
            pipeline
                .run(source::ndjson(BufReader::new(file), max_message_bytes))
                .await
        }
        None => {
            info!("Ingesting orders from stdin");
            pipeline
                .run(source::ndjson(
                    BufReader::new(tokio::io::stdin()),
                    max_message_bytes,
                ))
                .await
        }
    };

    log_stats(&stats);
    Ok(())
}

fn run_sample(args: config::SampleArgs) -> Result<(), AppError> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for index in 1..=args.count {
        let mut order = sample_order(&Uuid::new_v4().simple().to_string());
        if args.invalid_every > 0 && index % args.invalid_every == 0 {
            corrupt(&mut order);
        }
        serde_json::to_writer(&mut out, &order)
            .map_err(|err| AppError::unexpected(format!("failed to encode sample order: {err}")))?;
        writeln!(out).map_err(|err| AppError::from(InfraError::from(err)))?;
    }

    out.flush()
        .map_err(|err| AppError::from(InfraError::from(err)))
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

async fn warm_cache(
    repositories: Arc<PostgresRepositories>,
) -> Result<Arc<dyn OrdersRepo>, AppError> {
    let cache = CachedOrders::load(repositories)
        .await
        .map_err(|err| AppError::from(InfraError::CacheWarmup(err)))?;
    Ok(Arc::new(cache))
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "HTTP listener bound");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(err) => error!(error = %err, "failed to listen for shutdown signal"),
    }
}

fn log_stats(stats: &IngestStats) {
    info!(
        processed = stats.processed(),
        persisted = stats.persisted,
        duplicates = stats.duplicates,
        rejected_decode = stats.rejected_decode,
        rejected_validation = stats.rejected_validation,
        rejected_persistence = stats.rejected_persistence,
        source_errors = stats.source_errors,
        "Ingestion finished"
    );
}
