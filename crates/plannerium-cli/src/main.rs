mod config;
mod export_cmd;
mod plan_cmds;
mod serve_cmd;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use plannerium_core::export::{ExportFormat, PdfRenderer};
use plannerium_store::ProjectStore;

use config::{Overrides, PlanneriumConfig};

#[derive(Parser)]
#[command(
    name = "plannerium",
    about = "Turn a goal and a deadline into a scheduled, risk-assessed project plan"
)]
struct Cli {
    /// Generator API key (overrides PLANNERIUM_API_KEY / GEMINI_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Model name (overrides PLANNERIUM_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Project storage directory (overrides PLANNERIUM_STORAGE_DIR)
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    /// Per-stage generation timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            storage_dir: self.storage_dir.clone(),
            stage_timeout_secs: self.timeout,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a plannerium config file
    Init {
        /// Generator backend: gemini or openai
        #[arg(long, default_value = "gemini")]
        provider: String,
        /// Base URL of an OpenAI-compatible endpoint
        #[arg(long)]
        base_url: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Generate a plan for a goal
    Generate {
        /// What you want to achieve
        goal: String,
        /// First day of work, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last day of work, YYYY-MM-DD
        #[arg(long)]
        deadline: NaiveDate,
        /// Hours available per week
        #[arg(long)]
        hours: f64,
        /// Print the full plan as JSON instead of a summary
        #[arg(long)]
        json: bool,
        /// Save the plan under this project name
        #[arg(long)]
        save: Option<String>,
    },
    /// List saved projects
    List,
    /// Show a saved project
    Show {
        /// Project name
        name: String,
        /// Print the stored project as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export a saved project's plan
    Export {
        /// Project name
        name: String,
        /// Output format: csv, ics, html, or pdf
        #[arg(long, default_value = "csv")]
        format: ExportFormat,
        /// Output file path (defaults to stdout)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show time-tracking statistics, optionally recording progress first
    Stats {
        /// Project name
        name: String,
        /// Record hours against a task, as TASK_ID=HOURS (repeatable)
        #[arg(long = "log", value_parser = plan_cmds::parse_log_entry)]
        log: Vec<(String, f64)>,
        /// Mark a task as completed (repeatable)
        #[arg(long = "done")]
        done: Vec<String>,
        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Ask the planning assistant a question
    Ask {
        /// The question
        message: String,
        /// Use a saved project as context
        #[arg(long)]
        project: Option<String>,
    },
    /// Start the HTTP server
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Port to listen on
        #[arg(long, default_value_t = 5000)]
        port: u16,
    },
}

/// Execute the `plannerium init` command: write config file.
fn cmd_init(cli: &Cli, provider: &str, base_url: Option<String>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let provider: plannerium_core::generator::Provider = provider.parse()?;

    let cfg = config::ConfigFile {
        generator: config::GeneratorSection {
            provider: Some(provider.to_string()),
            model: cli.model.clone(),
            api_key: cli.api_key.clone(),
            base_url,
        },
        storage: config::StorageSection {
            dir: cli.storage_dir.clone(),
        },
        pipeline: config::PipelineSection {
            stage_timeout_secs: cli.timeout,
        },
    };

    let path = config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  generator.provider = {provider}");
    if let Some(ref model) = cfg.generator.model {
        println!("  generator.model = {model}");
    }
    match cfg.generator.api_key {
        Some(ref key) => println!("  generator.api_key = {}", mask(key)),
        None => println!("  generator.api_key = (unset; PLANNERIUM_API_KEY will be used)"),
    }
    if let Some(ref dir) = cfg.storage.dir {
        println!("  storage.dir = {}", dir.display());
    }
    println!();
    println!("Next: run `plannerium generate \"<goal>\" --deadline YYYY-MM-DD --hours N`.");

    Ok(())
}

/// Show only the ends of a secret.
fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Init {
        ref provider,
        ref base_url,
        force,
    } = cli.command
    {
        return cmd_init(&cli, provider, base_url.clone(), force);
    }

    let resolved = PlanneriumConfig::resolve(&cli.overrides())?;
    let store = ProjectStore::new(resolved.store.clone());

    match cli.command {
        Commands::Init { .. } => {}
        Commands::Generate {
            goal,
            start,
            deadline,
            hours,
            json,
            save,
        } => {
            let generator = resolved.build_generator()?;
            let args = plan_cmds::GenerateArgs {
                goal,
                start,
                deadline,
                hours,
                json,
                save,
            };
            plan_cmds::cmd_generate(&store, generator.as_ref(), resolved.stage_timeout, args)
                .await?;
        }
        Commands::List => {
            plan_cmds::cmd_list(&store).await?;
        }
        Commands::Show { name, json } => {
            plan_cmds::cmd_show(&store, &name, json).await?;
        }
        Commands::Export {
            name,
            format,
            output,
        } => {
            let pdf = match format {
                ExportFormat::Pdf => PdfRenderer::detect(),
                _ => None,
            };
            export_cmd::run_export(&store, pdf.as_ref(), &name, format, output.as_deref())
                .await?;
        }
        Commands::Stats {
            name,
            log,
            done,
            json,
        } => {
            plan_cmds::cmd_stats(&store, &name, &log, &done, json).await?;
        }
        Commands::Ask { message, project } => {
            let generator = resolved.build_generator()?;
            plan_cmds::cmd_ask(&store, generator.as_ref(), &message, project.as_deref()).await?;
        }
        Commands::Serve { bind, port } => {
            let generator = resolved.build_generator()?;
            let state = serve_cmd::AppState::new(
                store,
                generator.into(),
                PdfRenderer::detect(),
                Some(resolved.stage_timeout),
            );
            serve_cmd::run_serve(state, &bind, port).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod test_util {
    use std::sync::{Mutex, MutexGuard};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Serialize tests that read or write process environment variables.
    pub fn lock_env() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
