mod commands;
mod output;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use meritsim::config::{self, CliArgs};
use meritsim::{db, run_migrations};
use output::{OutputConfig, OutputFormat};

/// Operator CLI for the MeritSim database
#[derive(Parser, Debug)]
#[clap(name = "meritsim-cli", about = "Operator tasks for a MeritSim database")]
struct Cli {
    /// Database URL; defaults to the server's configured database
    #[clap(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Output format
    #[clap(long, value_enum, default_value_t = OutputFormat::Human, global = true)]
    format: OutputFormat,

    /// Quiet mode: minimal output (just IDs or counts)
    #[clap(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the bundled entities, profiles, topics and questions
    Seed,
    /// Scan the materials folder and record new PDFs
    IndexMaterials {
        /// Folder to scan instead of the configured materials path
        #[clap(long, env = "MATERIALS_PATH")]
        path: Option<PathBuf>,
    },
    /// Create an administrator account
    CreateAdmin {
        #[clap(long)]
        email: String,
        #[clap(long)]
        password: String,
        #[clap(long)]
        full_name: Option<String>,
    },
    /// List entities with their question counts
    Entities,
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = config::get_config(CliArgs {
        database_url: cli.database_url,
        ..Default::default()
    });
    let output_config = OutputConfig {
        format: cli.format,
        quiet: cli.quiet,
    };

    let pool = db::init_pool(&config.database_url)?;
    {
        let mut conn = pool.get()?;
        run_migrations(&mut conn)?;
    }

    match cli.command {
        Commands::Seed => commands::seed::seed(&pool, &output_config),
        Commands::IndexMaterials { path } => {
            let root = path.unwrap_or(config.materials_path);
            commands::materials::index(&pool, &root, &output_config)
        }
        Commands::CreateAdmin { email, password, full_name } => {
            commands::seed::create_admin(&pool, email, password, full_name, &output_config)
        }
        Commands::Entities => commands::catalog::entities(&pool, &output_config),
    }
}

fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
