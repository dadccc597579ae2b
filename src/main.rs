use arcadeport::arcade::{ArcadeRegistry, LifecycleError};
use arcadeport::config::{Backend, Config};
use arcadeport::input::channel::ChannelBackend;
use arcadeport::input::monitor::MonitorHandle;
use arcadeport::port::gpio::GpioProvider;
use arcadeport::port::simulated::SimulatedProvider;
use arcadeport::port::PortProvider;
use color_eyre::{eyre::eyre, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;
    info!("Starting arcade port driver");

    let config_path = Config::default_path();
    Config::ensure_default_config(&config_path).await?;
    let config = Config::load(&config_path).await?;
    let maps = config.port_maps()?;

    let provider: Box<dyn PortProvider> = match config.backend {
        Backend::Simulated => {
            let mut provider = SimulatedProvider::new();
            for map in &maps {
                provider.add_port(map.port);
            }
            Box::new(provider)
        }
        Backend::Gpio => Box::new(GpioProvider::new(&config.gpio)),
    };

    let (backend, event_receiver) = ChannelBackend::new(1000);
    let monitor = MonitorHandle::spawn(event_receiver);

    let registry = ArcadeRegistry::configure(&maps, provider.as_ref(), &backend, &config.poll)
        .await
        .map_err(|e| eyre!("Failed to configure arcade ports: {}", e))?;

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
        ctrl_c.cancel();
    });

    match registry.open_all(&shutdown).await {
        Ok(count) => {
            info!("Polling {} devices, press Ctrl-C to stop", count);
            shutdown.cancelled().await;
            registry.close_all().await;
        }
        Err(LifecycleError::Aborted) => info!("Interrupted while opening devices"),
        Err(e) => error!("Failed to open devices: {}", e),
    }

    registry.shutdown().await;
    drop(backend);
    if let Some(monitor) = monitor.join().await {
        info!("Monitor saw {} frames", monitor.frames());
    }

    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
