//! Supervisor binary: CLI parsing, config loading, and process wiring for
//! `actor-core`. Everything here is explicitly out of the core crate's
//! scope — signal handling in particular is not attempted; the binary
//! blocks on the supervisor's run loop and exits however its environment
//! chooses to stop it.

mod config;
mod services;

use std::path::PathBuf;
use std::process::ExitCode;

use actor_core::Supervisor;
use clap::Parser;
use tracing::{error, info};

use config::ServiceDef;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to the server-definitions config file (JSON array).
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// `sid` of the server definition to run. Defaults to the first
    /// entry in the config file when omitted.
    #[clap(short = 'r', long)]
    run: Option<u32>,

    /// Path to a single service-definition file, bypassing the config's
    /// server array entirely.
    #[clap(short = 'f', long)]
    file: Option<PathBuf>,
}

/// Exit codes: 0 success, 1 config missing, 2 parse error, 3 sid not
/// found, -1 usage.
#[derive(Debug)]
enum AppError {
    ConfigMissing(anyhow::Error),
    ParseError(anyhow::Error),
    SidNotFound(u32),
    Usage(&'static str),
}

impl AppError {
    fn code(&self) -> i32 {
        match self {
            AppError::ConfigMissing(_) => 1,
            AppError::ParseError(_) => 2,
            AppError::SidNotFound(_) => 3,
            AppError::Usage(_) => -1,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match &e {
                AppError::ConfigMissing(err) => error!(%err, "config file missing"),
                AppError::ParseError(err) => error!(%err, "config parse error"),
                AppError::SidNotFound(sid) => error!(sid, "no server definition with that sid"),
                AppError::Usage(msg) => error!(msg, "usage error"),
            }
            ExitCode::from(e.code() as u8)
        }
    }
}

fn run(args: Args) -> Result<(), AppError> {
    match (&args.config, &args.file) {
        (None, None) => Err(AppError::Usage("one of -c or -f is required")),
        (Some(_), Some(_)) => Err(AppError::Usage("-c and -f are mutually exclusive")),
        (Some(path), None) => run_from_server_config(path, args.run),
        (None, Some(path)) => run_single_service(path),
    }
}

fn run_from_server_config(path: &PathBuf, run: Option<u32>) -> Result<(), AppError> {
    let servers = load_config(path)?;

    let server = match run {
        Some(sid) => servers
            .into_iter()
            .find(|s| s.sid == sid)
            .ok_or(AppError::SidNotFound(sid))?,
        None => servers.into_iter().next().ok_or(AppError::SidNotFound(0))?,
    };

    let worker_count = server.thread.clamp(1, u8::MAX as u16) as u8;
    let sup = Supervisor::boot(worker_count).map_err(AppError::ParseError)?;
    services::register_all(sup.router());

    for def in &server.services {
        submit_service(&sup, def);
    }

    info!(sid = server.sid, worker_count, "supervisor running");
    sup.run();
    Ok(())
}

fn run_single_service(path: &PathBuf) -> Result<(), AppError> {
    if !path.exists() {
        return Err(AppError::ConfigMissing(anyhow::anyhow!(
            "{} does not exist",
            path.display()
        )));
    }
    let def = config::load_single_service(path).map_err(AppError::ParseError)?;

    let worker_count = default_worker_count();
    let sup = Supervisor::boot(worker_count).map_err(AppError::ParseError)?;
    services::register_all(sup.router());
    submit_service(&sup, &def);

    info!(service_type = %def.service_type, worker_count, "supervisor running single service");
    sup.run();
    Ok(())
}

fn submit_service(sup: &Supervisor, def: &ServiceDef) {
    let config_bytes = serde_json::to_vec(&def.config).unwrap_or_default();
    sup.router()
        .new_service(&def.service_type, &def.name, config_bytes, def.unique, def.threadid, 0, 0);
}

fn load_config(path: &PathBuf) -> Result<Vec<config::ServerConfig>, AppError> {
    if !path.exists() {
        return Err(AppError::ConfigMissing(anyhow::anyhow!(
            "{} does not exist",
            path.display()
        )));
    }
    config::load(path).map_err(AppError::ParseError)
}

fn default_worker_count() -> u8 {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(u8::MAX as usize) as u8
}
