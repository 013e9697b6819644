//! Tableload CLI - import CSV files into relational tables
//!
//! # Commands
//!
//! ```bash
//! tableload import companies.json --db app.db   # Run an import definition
//! tableload import companies.json --dry-run     # Run against an in-memory sink
//! tableload plan companies.json                 # Show the resolved column plan
//! tableload example                             # Show an example definition
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tableload::logging::{self, LogFormat};
use tableload::{
    example_definition, load_definition, plan_for, ConfigError, EventBus, ImportDefinition,
    ImportReport, Importer, MemorySink, Notifier, RelationalSink, SqliteSink, TracingNotifier,
    Verdict,
};

#[derive(Parser)]
#[command(name = "tableload")]
#[command(about = "Load CSV files into relational tables through column mappings", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log format: text or json
    #[arg(long, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an import definition
    Import {
        /// Definition file (JSON)
        definition: PathBuf,

        /// SQLite database path
        #[arg(long, env = "TABLELOAD_DATABASE", required_unless_present = "dry_run")]
        db: Option<PathBuf>,

        /// Insert into an in-memory sink instead of a database
        #[arg(long)]
        dry_run: bool,

        /// CSV file, overriding the definition
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Destination table, overriding the definition
        #[arg(short, long)]
        table: Option<String>,

        /// Records per page
        #[arg(long)]
        page_size: Option<usize>,

        /// Print every lifecycle event as a JSON line on stderr
        #[arg(long)]
        events: bool,
    },

    /// Show the column plan a definition resolves to
    Plan {
        /// Definition file (JSON)
        definition: PathBuf,
    },

    /// Show an example definition file
    Example,
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_format);

    let result = match cli.command {
        Commands::Import {
            definition,
            db,
            dry_run,
            file,
            table,
            page_size,
            events,
        } => {
            let overrides = Overrides { file, table, page_size };
            cmd_import(&definition, db.as_deref(), dry_run, overrides, events)
        }

        Commands::Plan { definition } => cmd_plan(&definition),

        Commands::Example => cmd_example(),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

type CmdResult = Result<i32, Box<dyn std::error::Error>>;

/// Command-line overrides applied on top of a loaded definition.
struct Overrides {
    file: Option<PathBuf>,
    table: Option<String>,
    page_size: Option<usize>,
}

impl Overrides {
    fn apply(self, definition: &mut ImportDefinition) -> Result<(), ConfigError> {
        if let Some(file) = self.file {
            definition.text = None;
            definition.file = Some(file);
        }
        if let Some(table) = self.table {
            definition.table = Some(table);
        }
        if let Some(page_size) = self.page_size {
            if page_size == 0 {
                return Err(ConfigError::InvalidPageSize);
            }
            definition.page_size = page_size;
        }
        Ok(())
    }
}

fn cmd_import(path: &Path, db: Option<&Path>, dry_run: bool, overrides: Overrides, events: bool) -> CmdResult {
    eprintln!("📄 Definition: {}", path.display());

    let mut definition = load_definition(path)?;
    overrides.apply(&mut definition)?;
    let table = definition.table_name();

    let mut sink: Box<dyn RelationalSink> = match db {
        Some(db) if !dry_run => {
            eprintln!("   Database: {}", db.display());
            Box::new(SqliteSink::open(db)?)
        }
        _ => {
            eprintln!("   Dry run into table {}", table);
            Box::new(MemorySink::new().with_table(&table, &[]))
        }
    };

    let mut bus = EventBus::new();
    let mut tracer = TracingNotifier;
    bus.listen_all(move |event| tracer.notify(event));
    if events {
        bus.listen_all(|event| {
            match serde_json::to_string(event) {
                Ok(line) => eprintln!("{}", line),
                Err(e) => tracing::warn!(error = %e, "cannot serialize event"),
            }
            Verdict::Continue
        });
    }

    let report = Importer::new(definition, sink.as_mut(), &mut bus).import()?;
    print_report(&report)?;

    Ok(if report.is_success() { 0 } else { 2 })
}

fn print_report(report: &ImportReport) -> Result<(), Box<dyn std::error::Error>> {
    if report.is_success() {
        eprintln!("✅ {}", report.summary());
    } else {
        eprintln!("❌ {}", report.summary());
    }
    for error in report.errors.iter().take(5) {
        eprintln!("   Row {}: {}", error.row, error.message);
    }
    if report.errors.len() > 5 {
        eprintln!("   ... and {} more", report.errors.len() - 5);
    }

    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

fn cmd_plan(path: &Path) -> CmdResult {
    let plan = plan_for(load_definition(path)?)?;
    println!("{}", serde_json::to_string_pretty(&plan.describe())?);
    Ok(0)
}

fn cmd_example() -> CmdResult {
    println!("{}", serde_json::to_string_pretty(&example_definition())?);
    Ok(0)
}
