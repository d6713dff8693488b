//! room-exporter binary.
//!
//! Parses startup flags, validates the sensor selection, then runs the poll
//! loop alongside the metrics HTTP endpoint until interrupted.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use room_exporter::{
    build_reader, run_poll_loop, web, RoomMetrics, SensorConfig, WebConfig, DEFAULT_LISTEN_PORT,
    DEFAULT_ROOM, POLL_INTERVAL_SECS,
};
use tokio::sync::watch;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "room-exporter")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Collects DHT/Enviro pHAT environmental sensor readings and exports them as Prometheus metrics"
)]
struct Cli {
    /// Sensor connection type
    #[arg(long, value_name = "[gpio|envirophat]")]
    sensor_connection: String,

    /// DHT sensor version (required for the gpio connection)
    #[arg(long, value_name = "[11|22|2302]")]
    sensor_version: Option<String>,

    /// GPIO pin connected to the sensor (BCM numbering, required for the
    /// gpio connection)
    #[arg(long, value_name = "N")]
    sensor_pin: Option<u8>,

    /// Temperature offset to apply to Enviro pHAT readings, whole degrees
    #[arg(long, value_name = "N", default_value_t = 0)]
    envirophat_temperature_offset: i64,

    /// Named room for the metric label
    #[arg(long, value_name = "<room name>", default_value = DEFAULT_ROOM)]
    room: String,

    /// Listen port for the Prometheus metrics endpoint
    #[arg(long, value_name = "N", default_value_t = DEFAULT_LISTEN_PORT)]
    listen_port: u16,

    /// Bind address for the metrics endpoint
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    // Configuration errors exit with status 1 before anything is started
    let sensor_config = match SensorConfig::resolve(
        &cli.sensor_connection,
        cli.sensor_version.as_deref(),
        cli.sensor_pin,
        cli.envirophat_temperature_offset,
    ) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    let reader = build_reader(sensor_config)?;
    let metrics = Arc::new(RoomMetrics::new(reader.backend(), &cli.room));

    info!(
        "Starting room-exporter ({:?} backend, room '{}')",
        reader.backend(),
        cli.room
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);

    // Flip the shutdown channel on SIGINT; the poll loop and the server
    // both watch it.
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            let _ = signal_tx.send(true);
        }
    });

    let web_config = WebConfig::new(&cli.host, cli.listen_port);
    // Bind up front: an occupied port or bad address must kill startup, not
    // leave the poll loop running against a dead endpoint
    let listener = web::bind(&web_config).await?;
    info!("Starting server on http://{}", web_config.bind_address());
    let server_task = tokio::spawn(web::serve(
        listener,
        web_config,
        metrics.clone(),
        shutdown_rx.clone(),
    ));

    let poll_result = run_poll_loop(
        reader,
        metrics,
        shutdown_rx,
        Duration::from_secs(POLL_INTERVAL_SECS),
    )
    .await;

    // Stop the server whether the loop ended by interrupt or hardware fault
    let _ = shutdown_tx.send(true);
    server_task.await??;
    poll_result?;

    info!("Exiting");
    Ok(())
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}
