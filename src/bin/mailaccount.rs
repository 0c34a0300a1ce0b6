// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Command line driver for an account on the in-process engine.
//!
//! Usage:
//!   mailaccount --addr alice@example.org --password secret
//!   mailaccount --config account.toml --watch-secs 30
//!
//! Opens the account, starts the workers, waits for configuration to finish,
//! prints whatever events arrive during the watch window, then shuts down.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Error

use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};

use mailaccount::prelude::*;

#[derive(Parser)]
#[command(name = "mailaccount", about = "Drive a mail account and watch its events")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, env = "MAILACCOUNT_CONFIG")]
    config: Option<String>,

    /// Backing store path (overrides the configuration)
    #[arg(long)]
    db_path: Option<String>,

    /// Prefix for event trace lines
    #[arg(long)]
    logid: Option<String>,

    #[arg(long, env = "MAILACCOUNT_ADDR")]
    addr: Option<String>,

    #[arg(long, env = "MAILACCOUNT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// How long to keep printing events after configuration
    #[arg(long, default_value_t = 5)]
    watch_secs: u64,
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = match Settings::new(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load settings: {}", e);
            return ExitCode::FAILURE;
        }
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(settings.log.level.as_str()))
        .init();

    match run(cli, settings.account) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, mut config: AccountConfig) -> AccountResult<()> {
    if let Some(db_path) = cli.db_path {
        config.db_path = db_path;
    }
    if cli.logid.is_some() {
        config.logid = cli.logid;
    }
    if config.event_timeout_secs.is_none() {
        config.event_timeout_secs = Some(30);
    }

    let engine = MemoryEngine::with_idle_timeout(config.idle_timeout());
    let account = Account::from_config(engine, &config)?;

    let mut pairs = Vec::new();
    if let Some(addr) = cli.addr {
        pairs.push(("addr", addr));
    }
    if let Some(password) = cli.password {
        pairs.push(("mail_pw", password));
    }
    account.set_config(&pairs)?;

    account.start()?;
    let result = watch(&account, Duration::from_secs(cli.watch_secs));
    account.shutdown();
    result
}

fn watch(account: &Account<MemoryEngine>, window: Duration) -> AccountResult<()> {
    let logger = account.logger();

    loop {
        let event = logger.get_matching("CONFIGURE_PROGRESS")?;
        println!("{}", event);
        if event == Event::ConfigureProgress(1000) {
            break;
        }
    }
    info!("Account {} configured", account.logid());

    let deadline = Instant::now() + window;
    while let Some(left) = deadline.checked_duration_since(Instant::now()) {
        match logger.get(Some(left), false) {
            Ok(event) => println!("{}", event),
            Err(e) if e.is_timeout() => break,
            Err(e) => {
                warn!("Stopped watching: {}", e);
                break;
            }
        }
    }
    Ok(())
}
