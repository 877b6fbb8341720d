use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use warden::{build_router, AppState, ServerConfig, ServerError};
use warden_audit::{AuditSink, Es256Signer, SignedJsonlSink, TracingAuditSink};
use warden_pdp::Pdp;

/// Warden: XACML 3.0 policy decision point for federated-learning task
/// governance.
#[derive(Parser, Debug)]
#[command(name = "warden", version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load policies and serve the HTTP decision endpoint
    Serve {
        /// Directory of Policy/PolicySet XML documents
        #[arg(long)]
        policy_dir: Option<PathBuf>,

        /// Bind address
        #[arg(long)]
        bind: Option<String>,

        /// Port
        #[arg(long)]
        port: Option<u16>,

        /// EC P-256 private key (PEM) for audit-record signing
        #[arg(long)]
        signing_key: Option<PathBuf>,

        /// JSON-lines audit log file
        #[arg(long)]
        audit_log: Option<PathBuf>,
    },

    /// Validate a policy directory and exit
    Check {
        /// Directory of Policy/PolicySet XML documents
        #[arg(long)]
        policy_dir: PathBuf,
    },

    /// Evaluate one Request XML file and print the Response XML
    Decide {
        /// Directory of Policy/PolicySet XML documents
        #[arg(long)]
        policy_dir: PathBuf,

        /// Request XML file
        #[arg(long)]
        request: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("warden=debug,warden_pdp=debug,warden_policy=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warden=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli
        .config
        .unwrap_or_else(|| PathBuf::from("warden.toml"));

    let result = match cli.command {
        Commands::Serve {
            policy_dir,
            bind,
            port,
            signing_key,
            audit_log,
        } => {
            let mut config = match ServerConfig::load(&config_path) {
                Ok(config) => config,
                Err(e) => {
                    error!("failed to load config: {}", e);
                    std::process::exit(1);
                }
            };
            if let Some(policy_dir) = policy_dir {
                config.policy_dir = policy_dir;
            }
            if let Some(bind) = bind {
                config.bind = bind;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if signing_key.is_some() {
                config.signing_key = signing_key;
            }
            if audit_log.is_some() {
                config.audit_log = audit_log;
            }
            serve(config).await
        }
        Commands::Check { policy_dir } => check(policy_dir),
        Commands::Decide {
            policy_dir,
            request,
        } => decide(policy_dir, request),
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn serve(config: ServerConfig) -> Result<(), ServerError> {
    config.validate()?;

    let state = Arc::new(AppState::initializing());
    let addr = format!("{}:{}", config.bind, config.port);

    let sink = audit_sink(&config)?;
    let pdp = Pdp::builder()
        .policy_dir(&config.policy_dir)?
        .audit_sink(sink)
        .build()?;
    state.set_ready(Arc::new(pdp));

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, policy_dir = %config.policy_dir.display(), "warden listening");
    axum::serve(listener, router).await?;
    Ok(())
}

fn audit_sink(config: &ServerConfig) -> Result<Arc<dyn AuditSink>, ServerError> {
    let Some(audit_log) = &config.audit_log else {
        return Ok(Arc::new(TracingAuditSink));
    };
    let signer = match &config.signing_key {
        Some(path) => {
            let pem = std::fs::read(path)?;
            Some(Es256Signer::from_pem(&pem)?)
        }
        None => None,
    };
    Ok(Arc::new(SignedJsonlSink::create(audit_log, signer)?))
}

fn check(policy_dir: PathBuf) -> Result<(), ServerError> {
    Pdp::builder().policy_dir(&policy_dir)?.build()?;
    info!(policy_dir = %policy_dir.display(), "policies loaded cleanly");
    Ok(())
}

fn decide(policy_dir: PathBuf, request: PathBuf) -> Result<(), ServerError> {
    let pdp = Pdp::builder().policy_dir(&policy_dir)?.build()?;
    let xml = std::fs::read_to_string(&request)?;
    let response = pdp.evaluate_xml(&xml);
    println!("{}", warden_xml::serialize_response(&response));
    Ok(())
}
