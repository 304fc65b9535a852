// src/main.rs

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use quiz_master::{
    cache::ResponseCache,
    config::Config,
    db,
    jobs::{
        JobContext, JobQueue,
        mailer::{LogMailer, Mailer, SmtpMailer},
        scheduler::Scheduler,
    },
    routes,
    state::AppState,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// How often expired cache entries are swept.
const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    // Load configuration from environment (.env included)
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Initialize Database Pool with Retry
    let pool = db::connect_with_retry(&config)
        .await
        .expect("Failed to connect to database after 5 retries");
    tracing::info!("Database connected...");

    // Migrations, roles and the admin account
    tracing::info!("Running migrations...");
    db::prepare(&pool, &config)
        .await
        .expect("Failed to prepare database");
    tracing::info!("Migrations applied successfully.");

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => match SmtpMailer::new(smtp) {
            Ok(mailer) => Arc::new(mailer),
            Err(e) => {
                tracing::error!("Invalid SMTP settings, falling back to log mailer: {}", e);
                Arc::new(LogMailer)
            }
        },
        None => {
            tracing::warn!("SMTP_HOST not set; outgoing mail will only be logged");
            Arc::new(LogMailer)
        }
    };

    let jobs = JobQueue::start(JobContext {
        pool: pool.clone(),
        mailer,
        export_dir: PathBuf::from(&config.export_dir),
        base_url: config.base_url.clone(),
    });

    if config.schedule.enabled {
        let scheduler = Scheduler::from_config(pool.clone(), jobs.clone(), &config.schedule);
        tokio::spawn(scheduler.run());
    } else {
        tracing::info!("Scheduler disabled");
    }

    let cache = ResponseCache::new();
    let sweeper = cache.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CACHE_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let purged = sweeper.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "expired cache entries removed");
            }
        }
    });

    // Create AppState
    let state = AppState {
        pool,
        config: config.clone(),
        cache,
        jobs,
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    // Bind to the listening address
    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .expect("BIND_ADDR must be a socket address like 0.0.0.0:3000");
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");

    // Start the server; client addresses feed the rate limiter
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}
