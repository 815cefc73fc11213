//! Mesh Synth - Standalone Binary
//!
//! Synthesizes the central governance CloudFormation template of a data mesh
//! and builds execution inputs for its registration state machine.
//!
//! ## Usage
//!
//! ```bash
//! # Render the template with references from the config file
//! mesh-synth synth --config mesh.json
//!
//! # Let CloudFormation resolve domain secrets at deploy time
//! mesh-synth synth --config mesh.json --secrets dynamic --output compact
//!
//! # Execution input registering two tables of a producer
//! mesh-synth execution-input --account 111111111111 --mode tbac \
//!     --table orders=s3://clean-111111111111-us-east-1/data-products/orders \
//!     --table customers=s3://clean-111111111111-us-east-1/data-products/customers
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mesh_governance::{LfAccessControlMode, MeshConfig, RegistrationRequest, SecretSource};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Mesh Synth - Data mesh central governance templates
#[derive(Parser, Debug)]
#[command(name = "mesh-synth", version, about)]
struct Args {
    /// Log format
    #[arg(long, value_enum, default_value = "text", global = true, env = "MESH_LOG_FORMAT")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the rendered CloudFormation template
    Synth {
        /// Mesh config file (JSON)
        #[arg(long, env = "MESH_CONFIG")]
        config: PathBuf,

        /// Where domain references come from: static, dynamic or aws-cli
        #[arg(long, default_value = "static", env = "MESH_SECRET_SOURCE")]
        secrets: SecretSource,

        /// Output format
        #[arg(long, value_enum, default_value = "pretty")]
        output: OutputFormat,
    },

    /// Print an execution input for the registration state machine
    ExecutionInput {
        /// Producer account id
        #[arg(long)]
        account: String,

        /// Access control mode of the producer
        #[arg(long)]
        mode: LfAccessControlMode,

        /// Table to register (name=location format, can be repeated)
        #[arg(long, short = 't', required = true)]
        table: Vec<String>,
    },
}

#[derive(Debug, Clone, ValueEnum)]
enum LogFormat {
    /// Human-readable text logs
    Text,
    /// JSON lines
    Json,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    /// Indented JSON
    Pretty,
    /// Single-line JSON
    Compact,
}

fn init_logging(format: &LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_format);

    match args.command {
        Command::Synth {
            config,
            secrets,
            output,
        } => synth(config, secrets, output).await,
        Command::ExecutionInput {
            account,
            mode,
            table,
        } => execution_input(account, mode, &table),
    }
}

async fn synth(path: PathBuf, source: SecretSource, output: OutputFormat) -> Result<()> {
    info!(config = %path.display(), secrets = %source, "Starting synthesis");

    let config = MeshConfig::load(&path)
        .with_context(|| format!("Failed to load config {}", path.display()))?;

    let resolver = config
        .resolver(source)
        .await
        .with_context(|| format!("Failed to prepare {} secret resolver", source))?;

    let governance = config
        .synthesize(resolver)
        .context("Failed to synthesize central governance")?;

    let document = governance
        .template()
        .render()
        .context("Failed to render template")?;

    let rendered = match output {
        OutputFormat::Pretty => serde_json::to_string_pretty(&document)?,
        OutputFormat::Compact => serde_json::to_string(&document)?,
    };
    println!("{}", rendered);

    info!(
        resources = governance.template().len(),
        domains = governance.registrations().len(),
        "Template written"
    );
    Ok(())
}

fn execution_input(account: String, mode: LfAccessControlMode, tables: &[String]) -> Result<()> {
    let mut request = RegistrationRequest::new(account, mode);

    for table in tables {
        let Some((name, location)) = table.split_once('=') else {
            anyhow::bail!("Invalid table format: {}. Use name=location format.", table);
        };
        request = request.table(name, location);
    }

    println!("{}", serde_json::to_string_pretty(&request)?);
    Ok(())
}
