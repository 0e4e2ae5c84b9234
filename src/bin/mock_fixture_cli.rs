use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mock_fixture_server::error::FixtureErrorCodes;
use mock_fixture_server::{
    init_logging, ErrorCode, FixtureCatalog, MockServer, Scenario, ServerConfig,
};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser, Debug)]
#[command(
    name = "mock_fixture_cli",
    about = "Serve JSON fixtures over HTTP with scripted overrides"
)]
struct Cli {
    /// Override directory containing fixture files (defaults to ./fixtures)
    #[arg(long, global = true)]
    fixtures_dir: Option<PathBuf>,
    /// JSON server configuration; missing or invalid files fall back to defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve fixtures until Ctrl-C
    Serve {
        #[arg(long)]
        host: Option<IpAddr>,
        #[arg(long)]
        port: Option<u16>,
        /// Scenario file of status overrides and patches to register up front
        #[arg(long)]
        scenario: Option<PathBuf>,
        /// Print every response as a JSON line on stdout
        #[arg(long)]
        log_responses: bool,
    },
    /// Print the fixture file a request path resolves to
    Resolve { path: String },
    /// List available fixtures on disk
    DumpFixtures,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::load_from_file(path),
        None => ServerConfig::default(),
    }
    .with_env_overrides();
    if let Some(dir) = cli.fixtures_dir {
        config.fixtures_dir = dir;
    }

    match cli.command {
        Commands::Serve {
            host,
            port,
            scenario,
            log_responses,
        } => {
            if let Some(host) = host {
                config = config.with_host(host);
            }
            if let Some(port) = port {
                config = config.with_port(port);
            }
            run_serve(config, scenario, log_responses)
        }
        Commands::Resolve { path } => {
            run_resolve(&FixtureCatalog::new(config.fixtures_dir), &path)
        }
        Commands::DumpFixtures => run_dump(&FixtureCatalog::new(config.fixtures_dir)),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("building tokio runtime")
}

fn run_serve(
    config: ServerConfig,
    scenario: Option<PathBuf>,
    log_responses: bool,
) -> Result<ExitCode> {
    let server = MockServer::new(config);
    if let Some(path) = scenario {
        Scenario::load_from_file(&path)?.apply(server.session());
    }

    runtime()?.block_on(async {
        if log_responses {
            let mut events = server.session().subscribe();
            tokio::spawn(async move {
                loop {
                    match events.recv().await {
                        Ok(event) => match serde_json::to_string(&event) {
                            Ok(line) => println!("{line}"),
                            Err(err) => log::warn!("Failed to encode observed response: {}", err),
                        },
                        Err(RecvError::Lagged(skipped)) => {
                            log::warn!("Dropped {} observed response(s)", skipped);
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            });
        }

        let addr = server.start().await?;
        println!(
            "Serving {} on http://{}",
            server.config().fixtures_dir.display(),
            addr
        );

        tokio::signal::ctrl_c()
            .await
            .context("waiting for Ctrl-C")?;
        server.stop().await?;
        Ok::<_, anyhow::Error>(ExitCode::from(0))
    })
}

fn run_resolve(catalog: &FixtureCatalog, path: &str) -> Result<ExitCode> {
    match runtime()?.block_on(catalog.resolve(path)) {
        Ok(file) => {
            println!("{}", file.display());
            Ok(ExitCode::from(0))
        }
        Err(err) if err.code() == FixtureErrorCodes::NOT_FOUND => {
            let report = MissingFixturePayload {
                code: err.code(),
                message: err.message(),
                root: catalog.root().display().to_string(),
            };
            eprintln!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::from(2))
        }
        Err(err) => Err(err).with_context(|| format!("resolving {}", path)),
    }
}

fn run_dump(catalog: &FixtureCatalog) -> Result<ExitCode> {
    let fixtures = catalog.discover()?;
    if fixtures.is_empty() {
        println!("No fixtures found under {}", catalog.root().display());
        return Ok(ExitCode::from(0));
    }

    for metadata in fixtures {
        let file = metadata
            .file
            .strip_prefix(catalog.root())
            .unwrap_or(&metadata.file);
        println!("{} -> {}", metadata.request_path, file.display());
    }
    Ok(ExitCode::from(0))
}

#[derive(Serialize)]
struct MissingFixturePayload {
    code: i32,
    message: String,
    root: String,
}
