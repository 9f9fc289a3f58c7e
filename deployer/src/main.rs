//! Deployer - Entry Point
//!
//! Optionally clones a configuration repository, then generates the
//! artifacts of one deployment type and exits.

use std::collections::HashMap;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use tracing::info;

use deployer::app::options::RunOptions;
use deployer::app::run::Deployer;
use deployer::deploy::git::GitFetcher;
use deployer::deploy::handler::HandlerRegistry;
use deployer::filesys::file::File;
use deployer::filesys::sink::FsSink;
use deployer::logs::{init_logging, LogOptions};
use deployer::storage::env::Environment;
use deployer::storage::settings::Settings;
use deployer::utils::version_info;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(_) => println!("{}", version.version),
        }
        return ExitCode::SUCCESS;
    }

    match deploy(&cli_args, &version.version).await {
        Ok(()) => {
            println!("{} deployment completed", "[SUCCESS]".green().bold());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{} {:#}", "[ERROR]".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn deploy(cli_args: &HashMap<String, String>, version: &str) -> anyhow::Result<()> {
    // The environment is read exactly once, here
    let env = Environment::from_process();

    let settings_file = cli_args.get("settings").map(File::new);
    let settings = Settings::load(settings_file.as_ref(), &env)
        .await
        .context("Unable to load settings")?;

    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        log_dir: settings.log_dir.clone(),
        json_format: settings.log_json,
        ..Default::default()
    };
    if let Err(e) = init_logging(log_options) {
        println!("Failed to initialize logging: {e}");
    }

    info!("Starting deployer v{}", version);

    let requested_type = cli_args.get("type").map(String::as_str).unwrap_or_default();
    let options = RunOptions::from_settings(&settings, &env)?;
    let registry = HandlerRegistry::from_settings(&settings);
    let fetcher = Arc::new(GitFetcher::new(settings.fetch_timeout()));

    let mut deployer = Deployer::new(options, registry, fetcher, Arc::new(FsSink::new()));
    let report = deployer.run(requested_type).await?;

    info!(
        "Finished {} deployment in {} ms (configuration repository fetched: {})",
        report.deployment_type,
        (report.finished_at - report.started_at).num_milliseconds(),
        report.fetched
    );
    info!("Exiting ...");
    Ok(())
}
