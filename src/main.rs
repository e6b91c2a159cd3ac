use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use procession_config::{OrchestratorConfig, PolicyDef};
use procession_context::RequestType;
use procession_orchestrator::{
  ExecutionOutcome, ExecutionRequest, PolicyExecutionOrchestrator, TracingAuditSink,
};
use procession_policy::{FsPolicyRegistry, PolicyRegistry, StandardResolver, VersionResolver};
use procession_program::StaticProgramExecutor;
use procession_store::InMemoryCache;

/// Procession - A versioned, multi-step policy orchestrator
#[derive(Parser)]
#[command(name = "procession")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.procession)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Path to the orchestrator config (default: <data-dir>/config.json)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a sequence of create/resume requests against the installed policies
  Run {
    /// Path to a JSON request or array of requests (default: stdin)
    requests_file: Option<PathBuf>,
  },

  /// Print the parameter schema of a policy step
  Schema {
    policy: String,

    /// Requested version, e.g. 1, 1.0 or 1.0.3
    version: String,

    #[arg(long)]
    step: Option<String>,
  },

  /// Install a policy definition
  Install {
    /// Path to the policy definition (JSON)
    policy_file: PathBuf,
  },

  /// Deactivate a policy version so it no longer resolves
  Deactivate {
    policy: String,

    /// Exact version, e.g. 1.0.3
    version: String,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(io::stderr)
    .init();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".procession"),
  };
  let config_path = cli.config.unwrap_or_else(|| data_dir.join("config.json"));

  let rt = tokio::runtime::Runtime::new()?;
  match cli.command {
    Some(Commands::Run { requests_file }) => rt.block_on(run_requests(
      requests_file,
      &config_path,
      &data_dir,
    )),
    Some(Commands::Schema {
      policy,
      version,
      step,
    }) => rt.block_on(print_schema(policy, version, step, &config_path, &data_dir)),
    Some(Commands::Install { policy_file }) => rt.block_on(install_policy(policy_file, &data_dir)),
    Some(Commands::Deactivate { policy, version }) => {
      rt.block_on(deactivate_policy(policy, version, &data_dir))
    }
    None => {
      println!("procession - use --help to see available commands");
      Ok(())
    }
  }
}

fn load_config(path: &Path) -> Result<OrchestratorConfig> {
  if !path.exists() {
    return Ok(OrchestratorConfig::default());
  }
  OrchestratorConfig::from_file(path)
    .with_context(|| format!("failed to load config: {}", path.display()))
}

fn registry(data_dir: &Path) -> Arc<FsPolicyRegistry> {
  Arc::new(FsPolicyRegistry::new(data_dir.join("policies")))
}

fn build_orchestrator(config_path: &Path, data_dir: &Path) -> Result<PolicyExecutionOrchestrator> {
  let config = load_config(config_path)?;
  let registry = registry(data_dir);
  let executor = Arc::new(StaticProgramExecutor::new(registry.clone()));

  let orchestrator = PolicyExecutionOrchestrator::from_registry(
    &config,
    registry,
    executor,
    Some(Arc::new(InMemoryCache::new())),
  )
  .with_context(|| format!("invalid config: {}", config_path.display()))?;

  Ok(orchestrator.with_audit_sink(Arc::new(TracingAuditSink)))
}

async fn run_requests(
  requests_file: Option<PathBuf>,
  config_path: &Path,
  data_dir: &Path,
) -> Result<()> {
  let content = match &requests_file {
    Some(path) => tokio::fs::read_to_string(path)
      .await
      .with_context(|| format!("failed to read requests file: {}", path.display()))?,
    None => read_stdin()?,
  };

  let requests: Vec<ExecutionRequest> = match serde_json::from_str(&content)
    .context("failed to parse requests")?
  {
    serde_json::Value::Array(items) => items
      .into_iter()
      .map(serde_json::from_value)
      .collect::<Result<_, _>>()
      .context("failed to parse requests")?,
    single => vec![serde_json::from_value(single).context("failed to parse request")?],
  };

  let orchestrator = build_orchestrator(config_path, data_dir)?;

  // A resume without a process ID continues the most recently created process.
  let mut last_created: Option<String> = None;
  let mut outcomes: Vec<ExecutionOutcome> = Vec::with_capacity(requests.len());
  for mut request in requests {
    if request.request_type == RequestType::Resume && request.process_id.is_none() {
      request.process_id = last_created.clone();
    }

    let outcome = orchestrator.execute(request.clone()).await;
    if request.request_type == RequestType::Create {
      if let Some(results) = outcome.results() {
        last_created = Some(results.process_id.clone());
      }
    }
    outcomes.push(outcome);
  }

  println!("{}", serde_json::to_string_pretty(&outcomes)?);
  Ok(())
}

async fn print_schema(
  policy: String,
  version: String,
  step: Option<String>,
  config_path: &Path,
  data_dir: &Path,
) -> Result<()> {
  let orchestrator = build_orchestrator(config_path, data_dir)?;
  match orchestrator
    .get_policy_metadata(&policy, &version, step.as_deref())
    .await
  {
    Ok(schema) => {
      println!("{}", serde_json::to_string_pretty(&schema)?);
      Ok(())
    }
    Err(error) => bail!("{}: {}", error.id, error.text),
  }
}

async fn install_policy(policy_file: PathBuf, data_dir: &Path) -> Result<()> {
  let def = PolicyDef::from_file(&policy_file)
    .with_context(|| format!("failed to load policy: {}", policy_file.display()))?;
  let label = format!("{}@{}", def.name, def.version);

  registry(data_dir)
    .install(def)
    .await
    .with_context(|| format!("failed to install policy {}", label))?;

  eprintln!("Installed policy: {}", label);
  Ok(())
}

async fn deactivate_policy(policy: String, version: String, data_dir: &Path) -> Result<()> {
  let resolver = StandardResolver::new(registry(data_dir));
  let resolved = resolver
    .resolve(&policy, &version)
    .await
    .with_context(|| format!("failed to resolve {}@{}", policy, version))?;

  resolver
    .deactivate(&resolved)
    .await
    .with_context(|| format!("failed to deactivate {}", resolved))?;

  eprintln!("Deactivated policy: {}", resolved);
  Ok(())
}

fn read_stdin() -> Result<String> {
  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read stdin")?;
  Ok(input)
}
