use std::env;
use std::io::{self, Write};
use log::{info, LevelFilter};
use serde::Serialize;
use tokio::time::timeout;

use crate::cli::Args;
use crate::config::io::ConfigIO;
use crate::device::adapter::DeviceAdapter;
use crate::device::btle::BtleAdapter;
use crate::device::types::HeartRateReading;
use crate::error::AppRunError;
use crate::session::HeartRateSession;

pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod session;

pub fn init_logging(level: LevelFilter) {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr());

    if let Ok(log_file) = env::var("LOG_FILE") {
        dispatch = dispatch.chain(
            fern::log_file(log_file).expect("Failed to open LOG_FILE")
        );
    }

    dispatch.apply().expect("Failed to initialize logger");
}

#[derive(Serialize)]
struct ReadingLine {
    time: String,
    bpm: HeartRateReading,
}

fn print_reading(out: &mut impl Write, reading: HeartRateReading, json: bool) -> Result<(), AppRunError> {
    if json {
        let line = ReadingLine {
            time: humantime::format_rfc3339_millis(std::time::SystemTime::now()).to_string(),
            bpm: reading,
        };
        let encoded = serde_json::to_string(&line).map_err(io::Error::from)?;
        writeln!(out, "{}", encoded)?;
    }
    else {
        writeln!(out, "{}", reading)?;
    }
    out.flush()?;
    Ok(())
}

/// Connects and prints readings until interrupted or until the device disconnects.
pub async fn monitor<A: DeviceAdapter>(
    session: &mut HeartRateSession<A>,
    connect_timeout: Option<std::time::Duration>,
    json: bool,
) -> Result<(), AppRunError> {
    let mut state = session.connection_state();
    let mut readings = session.readings();

    match connect_timeout {
        Some(limit) => {
            let outcome = timeout(limit, session.connect()).await;
            match outcome {
                Ok(result) => result?,
                Err(_) => {
                    // the handshake may have connected the device already
                    session.close().await;
                    return Err(AppRunError::ConnectTimeout(limit.as_millis() as u64));
                },
            }
        },
        None => session.connect().await?,
    }

    let stdout = io::stdout();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    'mainloop: loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break 'mainloop;
            },
            changed = state.changed() => {
                if changed.is_err() || !state.borrow_and_update().is_connected() {
                    info!("Connection lost");
                    break 'mainloop;
                }
            },
            reading = readings.recv() => match reading {
                Some(reading) => print_reading(&mut stdout.lock(), reading, json)?,
                None => break 'mainloop,
            },
        }
    }

    session.close().await;
    Ok(())
}

pub async fn run(args: Args) -> Result<(), AppRunError> {
    let config_io = ConfigIO::new_sync()?;
    let mut locker = config_io.locker()?;
    let _guard = locker.lock()?;

    let config = args.apply(config_io.read().await?);
    if args.save_config {
        config_io.save(&config).await?;
    }

    let adapter = BtleAdapter::new(config.btle_settings()).await?;
    let mut session = HeartRateSession::new(adapter);
    monitor(&mut session, config.connect_timeout(), args.json).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readings_print_as_text_or_json() {
        let mut out = Vec::new();
        print_reading(&mut out, HeartRateReading::new(72), false).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "72 bpm\n");

        let mut out = Vec::new();
        print_reading(&mut out, HeartRateReading::new(65), true).unwrap();
        let line: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(line["bpm"], 65);
        assert!(line["time"].is_string());
    }
}
