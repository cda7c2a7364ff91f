pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod entities;
pub mod services;

use anyhow::Context;
use tokio::signal;

use cli::Commands;
pub use config::Config;
use db::Store;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub async fn run(command: Commands, config: Config) -> anyhow::Result<()> {
    config.validate()?;
    init_tracing(&config);
    config.log_source();

    match command {
        Commands::Serve => run_server(config).await,
        Commands::Migrate => cmd_migrate(&config).await,
        Commands::Init => {
            if Config::create_default_if_missing()? {
                println!("✓ Config file created. Edit config.toml and run again.");
            } else {
                println!("config.toml already exists, leaving it untouched.");
            }
            Ok(())
        }
        Commands::Users => cmd_list_users(&config).await,
    }
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.general.log_format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn open_store(config: &Config) -> anyhow::Result<Store> {
    Store::with_pool_options(
        &config.general.database_url,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await
}

/// Seeds the admin account once, before anything else touches the database.
async fn bootstrap(store: &Store, config: &Config) -> anyhow::Result<()> {
    let created = store
        .bootstrap_admin(&config.bootstrap, &config.security)
        .await
        .context("Failed to bootstrap admin account")?;

    if created {
        info!(
            username = %config.bootstrap.admin_username.trim(),
            "Created initial admin account"
        );
    } else {
        info!("Users already present, skipping admin bootstrap");
    }

    Ok(())
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    info!("varsite v{} starting...", env!("CARGO_PKG_VERSION"));
    config.warn_on_insecure_defaults();

    let prometheus_handle = if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        info!("Prometheus metrics recorder initialized");
        Some(handle)
    } else {
        None
    };

    let store = open_store(&config).await?;
    bootstrap(&store, &config).await?;

    let addr = config.bind_address();
    let state = std::sync::Arc::new(api::AppState::new(config, store, prometheus_handle));
    let app = api::router(state).await?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("🌐 Web Server running at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Web server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Error listening for shutdown: {}", e),
    }
}

async fn cmd_migrate(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    bootstrap(&store, config).await?;

    println!(
        "✓ Database ready ({} user(s))",
        store.count_users().await?
    );
    Ok(())
}

async fn cmd_list_users(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let users = store.list_users().await?;

    if users.is_empty() {
        println!("No users yet. Run 'varsite migrate' to create the admin account.");
        return Ok(());
    }

    println!("{:<6} {:<32} {}", "ID", "USERNAME", "ROLE");
    println!("{:-<50}", "");
    for user in users {
        let role = if user.is_admin { "admin" } else { "member" };
        println!("{:<6} {:<32} {}", user.id, user.username, role);
    }

    Ok(())
}
