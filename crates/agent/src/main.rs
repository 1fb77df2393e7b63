use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kong_certbot_agent::agent::CertbotAgent;
use kong_certbot_agent::certbot::{CertbotHandler, ProcessRunner};
use kong_certbot_agent::config::{AgentConfig, RunRequest};
use kong_certbot_agent::kong::{KongHandler, StoreProtocol};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "kong-certbot-agent")]
#[command(about = "Requests Let's Encrypt certificates with certbot and stores them in Kong")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, global = true)]
    verbose: bool,

    /// How certificates are written into Kong
    #[arg(long, value_enum, global = true)]
    protocol: Option<StoreProtocol>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Requests certificates for the given domains and notifies Kong
    #[command(name = "certs:update")]
    Update {
        /// Base URL to Kong Admin API; eg: https://foo:8001
        #[arg(value_name = "kong-endpoint")]
        kong_endpoint: String,

        /// Email the set of domains is to be associated with at Let's Encrypt
        #[arg(value_name = "email")]
        email: String,

        /// Comma separated list of domains to request certs for; eg: bar.com,foo.bar.com
        #[arg(value_name = "domains")]
        domains: String,

        /// Require test certificate from staging-letsencrypt
        #[arg(short = 't', long)]
        test_cert: bool,
    },
    /// Same as certs:update, configured through KONG_ADMIN_ENDPOINT, LETSENCRYPT_EMAIL and
    /// SUPPORTED_DOMAINS
    #[command(name = "from-env")]
    FromEnv,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let outcome = run(cli).await;
    if let Err(error) = &outcome {
        error!("{error:#}");
    }

    ExitCode::from(exit_status(&outcome))
}

/// 0 when everything was stored, 1 when errors were recorded, 2 when the run never started.
fn exit_status(outcome: &Result<bool>) -> u8 {
    match outcome {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(_) => 2,
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let config = AgentConfig::load()?;

    let request = match cli.command {
        Command::Update {
            kong_endpoint,
            email,
            domains,
            test_cert,
        } => RunRequest::new(&kong_endpoint, &email, &domains, test_cert)?,
        Command::FromEnv => RunRequest::from_env()?,
    };

    let protocol = cli.protocol.unwrap_or_else(|| config.protocol());
    info!(
        endpoint = %request.admin_endpoint,
        domains = ?request.domains,
        staging = request.staging,
        ?protocol,
        "starting certificate update"
    );

    let certbot = CertbotHandler::new(
        Box::new(ProcessRunner::new(config.certbot_timeout())),
        config.certbot_binary(),
        config.certs_base_path(),
    );
    let client =
        KongHandler::build_client(Some(config.http_timeout()), config.accept_invalid_certs())
            .context("Failed to build Kong admin API client")?;
    let agent = CertbotAgent::new(
        certbot,
        KongHandler::new(client, protocol),
        &request.admin_endpoint,
    )?;

    let report = agent
        .execute(&request.domains, &request.email, request.staging)
        .await?;
    report
        .print(&mut io::stdout().lock())
        .context("Failed to write report")?;

    Ok(report.succeeded())
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
