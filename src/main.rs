//! wiwb - download and sample grids from the WIWB API
//!
//! This is the main entry point for the wiwb command-line tool and server.

use anyhow::Context;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::signal;
use tracing::{error, info};

use wiwb::config::{Command, GridArgs};
use wiwb::handlers::router;
use wiwb::reconcile::ReconcilerConfig;
use wiwb::sample::parse_statistics;
use wiwb::{
    init_tracing, log_error, log_operation_end, log_operation_start, log_sample_stats,
    log_timed_operation, AppState, Client, Config, GeometrySet, GridRequest, Interval, WiwbError,
};

fn main() -> anyhow::Result<()> {
    let (config, command) = Config::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    init_tracing(&config.log_level);
    info!("Starting wiwb v{}", env!("CARGO_PKG_VERSION"));

    let client = Client::from_config(&config).map_err(|e| {
        log_error(&e, "client setup");
        e
    })?;

    match command {
        Command::Download {
            grid,
            output_dir,
            no_unzip,
        } => {
            let start = Instant::now();
            log_operation_start("download", Some(&grid.variable_code));

            let request = build_request(&grid, client.reconciler(), !no_unzip)?;
            let result = client.grids(request).write(&output_dir);
            log_operation_end("download", start, result.is_ok());

            let path = result?;
            println!("{}", path.display());
        }
        Command::Sample {
            grid,
            stats,
            output,
        } => {
            let start = Instant::now();
            log_operation_start("sample", Some(&stats));

            let statistics = parse_statistics(&stats)?;
            let request = build_request(&grid, client.reconciler(), false)?;
            let result = client.grids(request).sample(&statistics);
            log_operation_end("sample", start, result.is_ok());

            let table = result?;
            let names: Vec<&str> = statistics.iter().map(|s| s.name()).collect();
            log_sample_stats("sample", table.rows(), table.columns().len(), &names);

            match output {
                Some(path) => table.write_csv(&path)?,
                None => table.write_csv_to(std::io::stdout().lock())?,
            }
        }
        Command::Variables {
            data_sources,
            variables,
        } => {
            let reply = log_timed_operation("variables", || {
                client.get_variables(&data_sources, &variables)
            })?;
            println!("{}", serde_json::to_string_pretty(&reply)?);
        }
        Command::Serve { .. } => {
            let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
            runtime.block_on(serve(config, client))?;
        }
    }

    Ok(())
}

/// Reconcile command-line grid parameters into a request
fn build_request(
    grid: &GridArgs,
    reconciler: &ReconcilerConfig,
    unzip: bool,
) -> wiwb::Result<GridRequest> {
    let mut builder = GridRequest::builder(
        grid.data_source_code.clone(),
        grid.variable_code.clone(),
        grid.start,
        grid.end,
    )
    .data_format(grid.format)
    .interval(Some(Interval {
        kind: grid.interval_type,
        value: grid.interval_value,
    }))
    .unzip(unzip);

    if let Some(path) = &grid.geometries {
        let text = std::fs::read_to_string(path).map_err(|e| {
            WiwbError::configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        builder = builder.geometries(GeometrySet::from_geojson(&text)?);
    }
    if let Some(crs) = grid.crs {
        builder = builder.crs(crs);
    }
    if let Some(bounds) = grid.bounds {
        builder = builder.bounds(bounds);
    }

    builder.build(reconciler)
}

async fn serve(config: Config, client: Client) -> anyhow::Result<()> {
    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .map_err(|e| WiwbError::configuration(format!("Invalid host address: {}", e)))?,
        config.server.port,
    ));

    let app = router(AppState::new(config, client).shared());

    info!("Server listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!("Server error: {}", e);
            e
        })?;

    info!("Server has been gracefully shut down");
    Ok(())
}

/// Wait for a shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
