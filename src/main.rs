use std::{process, sync::Arc, time::Duration};

use fleetdesk::{
    application::{error::AppError, recurring::RecurringExpenseService},
    cache::{CacheConfig, TtlStore},
    config,
    domain::{error::DomainError, recurrence::Interval, recurrence::next_due_date},
    infra::{
        error::InfraError,
        http::{self, ApiState},
        memory::InMemoryRepositories,
        telemetry,
    },
};
use time::OffsetDateTime;
use tokio::{sync::Notify, task::JoinHandle, time::MissedTickBehavior};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

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

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::NextDue(args) => run_next_due(args),
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let cache_config = CacheConfig::from(&settings.cache);
    let store = Arc::new(TtlStore::new(&cache_config));
    let repositories = Arc::new(InMemoryRepositories::new());

    if settings.auth.tokens.is_empty() {
        warn!("No API tokens configured; every /api/v1 request will be rejected");
    }

    let state = ApiState::build(
        repositories,
        Arc::clone(&store),
        cache_config.clone(),
        settings.scheduler.maintenance_lead_days,
        settings.auth.tokens.clone(),
    );

    let sweeper = spawn_expiry_sweeper(Arc::clone(&store), cache_config.sweep_interval());
    let processor =
        spawn_recurring_processor(Arc::clone(&state.recurring), settings.scheduler.cadence);

    let result = serve_http(&settings, state).await;

    processor.abort();
    let _ = processor.await;
    sweeper.abort();
    let _ = sweeper.await;

    let cleared = store.clear();
    info!(cleared, "Cache cleared on shutdown");

    result
}

fn run_next_due(args: config::NextDueArgs) -> Result<(), AppError> {
    let interval = Interval::from_parts(args.interval, args.days).map_err(DomainError::from)?;

    let mut anchor = args.anchor;
    for _ in 0..args.count {
        anchor = next_due_date(anchor, interval).map_err(DomainError::from)?;
        println!("{anchor}");
    }
    Ok(())
}

fn spawn_expiry_sweeper(store: Arc<TtlStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await; // Skip the first immediate tick
        loop {
            interval.tick().await;
            let removed = store.purge_expired();
            if removed > 0 {
                info!(removed, "Expired cache entries swept");
            }
        }
    })
}

fn spawn_recurring_processor(
    service: Arc<RecurringExpenseService>,
    cadence: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cadence);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let today = OffsetDateTime::now_utc().date();
            if let Err(err) = service.process_due(today).await {
                error!(error = %err, "Recurring expense processor run failed");
            }
        }
    })
}

async fn serve_http(settings: &config::Settings, state: ApiState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let addr = settings.server.addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| AppError::from(InfraError::Bind { addr, source }))?;
    info!(addr = %settings.server.addr, "Listening");

    let shutdown = Arc::new(Notify::new());
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown({
        let shutdown = Arc::clone(&shutdown);
        async move { shutdown.notified().await }
    });
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        joined = &mut server => return finish_server(joined),
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(|err| AppError::from(InfraError::from(err)))?;
            info!("Shutdown signal received; draining connections");
        }
    }

    shutdown.notify_one();
    match tokio::time::timeout(settings.server.graceful_shutdown, &mut server).await {
        Ok(joined) => finish_server(joined),
        Err(_) => {
            warn!(
                timeout_secs = settings.server.graceful_shutdown.as_secs(),
                "Graceful shutdown timed out; dropping open connections"
            );
            server.abort();
            Ok(())
        }
    }
}

fn finish_server(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    joined
        .map_err(|err| AppError::from(InfraError::from(err)))?
        .map_err(|err| AppError::from(InfraError::from(err)))
}
