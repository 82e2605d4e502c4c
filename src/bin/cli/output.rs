use clap::ValueEnum;
use meritsim::dto::{EntityDto, UserDto};
use meritsim::indexer::IndexReport;
use meritsim::models::{Entity, User};
use meritsim::seed::SeedReport;
use serde::Serialize;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

/// Bundled output configuration passed to all print functions
#[derive(Debug, Clone, Copy)]
pub struct OutputConfig {
    /// The output format
    pub format: OutputFormat,
    /// When true, print minimal output (just IDs or counts)
    pub quiet: bool,
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error: could not encode output: {}", e),
    }
}

/// Prints the counts created by a seeding run
pub fn print_seed_report(report: &SeedReport, config: &OutputConfig) {
    match config.format {
        OutputFormat::Human => {
            if config.quiet {
                println!("{}", report.questions);
                return;
            }
            println!("Admins:    {}", report.admins);
            println!("Entities:  {}", report.entities);
            println!("Profiles:  {}", report.profiles);
            println!("Topics:    {}", report.topics);
            println!("Questions: {}", report.questions);
        }
        OutputFormat::Json => print_json(report),
    }
}

/// Prints the outcome of an indexing run
pub fn print_index_report(report: &IndexReport, config: &OutputConfig) {
    match config.format {
        OutputFormat::Human => {
            if config.quiet {
                println!("{}", report.indexed);
                return;
            }
            if let Some(message) = &report.message {
                println!("{}", message);
            }
            println!("Found:    {}", report.total_files);
            println!("Indexed:  {}", report.indexed);
            println!("Skipped:  {}", report.skipped);
            println!("Errors:   {}", report.errors);
            if !report.entities.is_empty() {
                println!("Entities: {}", report.entities.join(", "));
            }
        }
        OutputFormat::Json => print_json(report),
    }
}

/// Prints a single account without its password hash
pub fn print_user(user: &User, config: &OutputConfig) {
    match config.format {
        OutputFormat::Human => {
            if config.quiet {
                println!("{}", user.get_id());
                return;
            }
            println!("ID:    {}", user.get_id());
            println!("Email: {}", user.get_email());
            if let Some(name) = user.get_full_name() {
                println!("Name:  {}", name);
            }
            println!("Role:  {}", user.get_role());
        }
        OutputFormat::Json => print_json(&UserDto::from(user)),
    }
}

/// Prints entities as a table with question counts
pub fn print_entities(entities: &[(Entity, i64)], config: &OutputConfig) {
    match config.format {
        OutputFormat::Human => {
            if entities.is_empty() {
                if !config.quiet {
                    println!("No entities found. Run `meritsim-cli seed` first.");
                }
                return;
            }
            if config.quiet {
                for (entity, _) in entities {
                    println!("{}", entity.get_id());
                }
                return;
            }
            let max_id = entities.iter().map(|(e, _)| e.get_id().len()).max().unwrap_or(2);
            let max_name = entities.iter().map(|(e, _)| e.get_name().chars().count()).max().unwrap_or(4);
            println!("{:<id_w$}  {:<name_w$}  QUESTIONS", "ID", "NAME", id_w = max_id, name_w = max_name);
            for (entity, count) in entities {
                println!(
                    "{:<id_w$}  {:<name_w$}  {:>9}",
                    entity.get_id(),
                    entity.get_name(),
                    count,
                    id_w = max_id,
                    name_w = max_name,
                );
            }
        }
        OutputFormat::Json => {
            let data: Vec<EntityDto> = entities
                .iter()
                .map(|(entity, count)| EntityDto::new(entity, *count))
                .collect();
            print_json(&data);
        }
    }
}

/// Prints a success message
pub fn print_success(message: &str, config: &OutputConfig) {
    match config.format {
        OutputFormat::Human => {
            if !config.quiet {
                println!("{}", message);
            }
        }
        OutputFormat::Json => print_json(&serde_json::json!({ "status": "ok", "message": message })),
    }
}
