//! Energy monitor daemon.
//!
//! Polls an ADE7878A power meter over I2C and posts readings to an HTTP
//! collector until interrupted.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use energymon::simulation::load_chip_image;
use energymon::{EnergyMonitor, MonitorArgs, MonitorConfig};
use energymon_bus::{BusChannel, I2cBus, SimulatedBus};
use energymon_meter::{Ade7878a, Calibration, PowerDriver};
use energymon_transport::{ResilientTransport, SimulatedConnector, Transport};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = MonitorArgs::parse();

    // Load configuration
    let mut config = MonitorConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;
    args.apply(&mut config);

    // Initialize logging
    energymon_common::init_tracing(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    info!("Starting energymon");
    info!("Loaded configuration from {:?}", args.config);

    if config.simulation.enabled {
        info!("Simulation mode: no hardware or collector required");

        let bus = Arc::new(SimulatedBus::new());
        load_chip_image(bus.as_ref(), config.bus.address);
        bus.initialize(&config.bus.device)
            .context("Failed to initialize simulated I2C bus")?;

        let driver = Ade7878a::with_address(bus, config.bus.address);
        info!(
            "ADE7878A at 0x{:02X} on {}",
            driver.address(),
            config.bus.device
        );
        let transport = ResilientTransport::simulated(SimulatedConnector::new());
        run(EnergyMonitor::new(driver, transport, &config), &config).await
    } else {
        let bus = Arc::new(I2cBus::new());
        bus.initialize(&config.bus.device)
            .with_context(|| format!("Failed to initialize I2C bus {}", config.bus.device))?;

        let driver = Ade7878a::with_address(bus, config.bus.address);
        info!(
            "ADE7878A at 0x{:02X} on {}",
            driver.address(),
            config.bus.device
        );
        let transport = ResilientTransport::http();
        run(EnergyMonitor::new(driver, transport, &config), &config).await
    }
}

async fn run<D, T>(monitor: EnergyMonitor<D, T>, config: &MonitorConfig) -> Result<()>
where
    D: PowerDriver + 'static,
    T: Transport + 'static,
{
    monitor
        .initialize_driver(Calibration::new(config.calibration))
        .context("Failed to initialize ADE7878A")?;

    monitor
        .initialize_transport(&config.server)
        .context("Failed to initialize HTTP transport")?;

    if !monitor.check_collector().await {
        warn!(
            "Collector at {} not reachable yet, readings will be cached",
            config.server.url
        );
    }

    monitor.arm_simulation(
        config.simulation.fail_device,
        config.simulation.fail_transport,
    );

    Arc::new(monitor)
        .run(config.polling.interval(), async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await;

    info!("energymon stopped");
    Ok(())
}
