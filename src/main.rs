/*
 * This file is part of Hyperfan.
 *
 * Copyright (C) 2025 Hyperfan contributors
 *
 * Hyperfan is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Hyperfan is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Hyperfan. If not, see <https://www.gnu.org/licenses/>.
 */

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use hyperfan_ecio::config::{config_path, load_config_from, EcioConfig};
use hyperfan_ecio::service::{run_session, SessionOptions};
use hyperfan_ecio::{DevPort, GigabyteController};

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    config: Option<PathBuf>,
    once: bool,
    json: bool,
    enable: bool,
    polls: Option<u32>,
    set_control: Option<(usize, u8)>,
}

fn parse_number<T: TryFrom<u64>>(s: &str, what: &str) -> Result<T, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse::<u64>(),
    };
    parsed
        .ok()
        .and_then(|v| T::try_from(v).ok())
        .ok_or_else(|| format!("invalid {}: {}", what, s))
}

fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    let mut out = CliArgs::default();
    let mut it = args.iter().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => {
                let path = it.next().ok_or("--config requires a path")?;
                out.config = Some(PathBuf::from(path));
            }
            "--once" => out.once = true,
            "--json" => out.json = true,
            "--enable" => out.enable = true,
            "--polls" => {
                let n = it.next().ok_or("--polls requires a count")?;
                out.polls = Some(parse_number(n, "poll count")?);
            }
            "--set-control" => {
                let index = it.next().ok_or("--set-control requires <index> <raw>")?;
                let raw = it.next().ok_or("--set-control requires <index> <raw>")?;
                out.set_control = Some((
                    parse_number(index, "control index")?,
                    parse_number(raw, "control value")?,
                ));
            }
            other => return Err(format!("unknown argument: {}", other)),
        }
    }
    if out.once && out.polls.is_some() {
        return Err("--once and --polls are mutually exclusive".to_string());
    }
    if out.set_control.is_some() && !out.enable {
        return Err("--set-control requires --enable".to_string());
    }
    Ok(out)
}

fn session_options(cli: &CliArgs, cfg: &EcioConfig) -> SessionOptions {
    SessionOptions {
        polls: if cli.once { 1 } else { cli.polls.unwrap_or(0) },
        interval: cfg.poll_interval(),
        json: cli.json,
        enable: cli.enable,
        set_control: cli.set_control,
    }
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let cli = match parse_args(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!(
                "Usage: {} [--config PATH] [--once | --polls N] [--json] [--enable [--set-control INDEX RAW]]",
                args.first().map(String::as_str).unwrap_or("hyperfan-ecio")
            );
            std::process::exit(2);
        }
    };

    // Raw port access through /dev/port needs root
    if unsafe { libc::geteuid() } != 0 {
        eprintln!("Error: hyperfan-ecio requires root privileges to access I/O ports.");
        eprintln!("Please run with: sudo {}", args.first().map(String::as_str).unwrap_or("hyperfan-ecio"));
        std::process::exit(1);
    }

    let path = cli.config.clone().unwrap_or_else(config_path);
    let cfg = load_config_from(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    init_tracing(&cfg.log_level);

    let io = DevPort::open_path(&cfg.device_path)?;
    let Some(controller) = GigabyteController::try_create_at(io, cfg.register_port, cfg.value_port) else {
        bail!(
            "no compatible ECIO controller at ({:#X}, {:#X})",
            cfg.register_port,
            cfg.value_port
        );
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        error!("Failed to install signal handler: {}", e);
    }

    info!("Starting ECIO polling session");
    let opts = session_options(&cli, &cfg);
    let mut stdout = std::io::stdout().lock();
    run_session(controller, &opts, &shutdown, &mut stdout).context("polling session failed")?;
    Ok(())
}
