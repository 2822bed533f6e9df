// Copyright (C) 2024 Laixer Equipment B.V.
// All rights reserved.
//
// This software may be modified and distributed under the terms
// of the included license.  See the LICENSE file for details.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use rover::{
    device::{
        sim::{SimMotorDriver, SimSensor},
        Device, GpioSensor, MotorDriver, ObstructionSensor, Qik,
    },
    Robot,
};

mod config;
mod form;
mod http;
mod server;

#[derive(Parser)]
#[command(author = "Copyright (C) 2024 Laixer Equipment B.V.")]
#[command(version, propagate_version = true)]
#[command(about = "Rover daemon", long_about = None)]
struct Args {
    /// Configuration file.
    #[arg(
        short = 'c',
        long = "config",
        alias = "conf",
        default_value = "/etc/rover.conf",
        value_name = "FILE"
    )]
    config: std::path::PathBuf,
    /// Enable simulation mode.
    #[arg(long, default_value_t = false)]
    simulation: bool,
    /// Also write the log to this file.
    #[arg(long, value_name = "FILE")]
    log_file: Option<std::path::PathBuf>,
    /// Quiet output (no logging).
    #[arg(long)]
    quiet: bool,
    /// Daemonize the service.
    #[arg(short = 'D', long)]
    daemon: bool,
    /// Level of verbosity.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(args: &Args) -> anyhow::Result<()> {
    use log::LevelFilter;
    use simplelog::SharedLogger;

    let mut log_config = simplelog::ConfigBuilder::new();
    if args.daemon {
        log_config.set_time_level(LevelFilter::Off);
        log_config.set_thread_level(LevelFilter::Off);
    }

    log_config.set_target_level(LevelFilter::Off);
    log_config.set_location_level(LevelFilter::Off);
    log_config.add_filter_ignore_str("mio");

    let log_level = if args.daemon {
        LevelFilter::Info
    } else if args.quiet {
        LevelFilter::Off
    } else {
        match args.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    let color_choice = if args.daemon {
        simplelog::ColorChoice::Never
    } else {
        simplelog::ColorChoice::Auto
    };

    let log_config = log_config.build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![simplelog::TermLogger::new(
        log_level,
        log_config.clone(),
        simplelog::TerminalMode::Mixed,
        color_choice,
    )];

    if let Some(path) = &args.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;

        loggers.push(simplelog::WriteLogger::new(log_level, log_config, file));
    }

    simplelog::CombinedLogger::init(loggers)?;

    Ok(())
}

/// Randomly flip the simulated obstruction once per second.
fn spawn_obstacle_simulator(sensor: SimSensor, probability: f64) {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    let probability = probability.clamp(0.0, 1.0);
    if probability == 0.0 {
        return;
    }

    tokio::spawn(async move {
        let mut rng = StdRng::from_entropy();
        let mut interval = tokio::time::interval(Duration::from_secs(1));

        loop {
            interval.tick().await;

            if rng.gen_bool(probability) {
                let obstructed = sensor.toggle();
                log::debug!(
                    "Simulated obstacle {}",
                    if obstructed { "appeared" } else { "cleared" }
                );
            }
        }
    });
}

/// Serve until interrupted, then shut the robot down.
async fn run<M, S>(config: config::Config, robot: Robot<M, S>) -> anyhow::Result<()>
where
    M: MotorDriver + 'static,
    S: ObstructionSensor,
{
    let robot = Arc::new(robot);

    let result = match robot.halt().await {
        Ok(_) => {
            tokio::select! {
                result = server::http_listen(config.server.clone(), robot.clone()) => result,
                _ = tokio::signal::ctrl_c() => {
                    log::info!("Termination requested");
                    Ok(())
                }
            }
        }
        Err(e) => Err(e.into()),
    };

    let shutdown = robot.shutdown().await;

    result?;
    shutdown?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config: config::Config = rover::from_file(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    if args.simulation {
        config.simulation.enabled = true;
    }

    init_logging(&args)?;

    if args.daemon {
        log::debug!("Running service as daemon");
    }

    log::trace!("{:#?}", config);

    log::info!("Rover runtime version {}", rover::consts::VERSION);

    if config.simulation.enabled {
        log::info!("Running in simulation mode");

        let sensor = SimSensor::new();
        spawn_obstacle_simulator(sensor.clone(), config.simulation.obstacle_probability);

        let robot = Robot::new(
            SimMotorDriver::new(),
            sensor,
            &config.drive,
            &config.rover,
        );

        run(config, robot).await?;
    } else {
        let mut motor = Qik::open(&config.motor)?;
        motor.probe().await?;

        match motor.firmware_version().await {
            Ok(version) => log::info!("Motor controller firmware version {}", version as char),
            Err(e) => log::warn!("Motor controller did not report its version: {}", e),
        }

        match motor.error_flags().await {
            Ok(flags) if !flags.is_empty() => {
                log::warn!("Motor controller reports errors: {}", flags)
            }
            Ok(_) => {}
            Err(e) => log::warn!("Motor controller did not report its state: {}", e),
        }

        let sensor = GpioSensor::new(config.sensor.front_pin)?;

        let robot = Robot::new(motor, sensor, &config.drive, &config.rover);

        run(config, robot).await?;
    }

    log::debug!("{} was shutdown gracefully", env!("CARGO_BIN_NAME"));

    Ok(())
}
