use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::{fmt, EnvFilter};

use zedconsole::errors::ConsoleError;
use zedconsole::{schema, settings, terminal, web};

#[derive(Parser, Debug)]
#[command(
    name = "zedconsole",
    version,
    about = "Command interpreter and schema tooling for SpiceDB"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API (default)
    Serve,
    /// Run one `zed ...` command line and print the result as JSON
    Exec {
        /// Full command line, e.g. "zed schema read"
        line: String,
    },
    /// Offline schema tools
    Schema {
        #[command(subcommand)]
        command: SchemaCommands,
    },
}

#[derive(Subcommand, Debug)]
enum SchemaCommands {
    /// Print definitions, relations and permissions as a tree
    Tree { file: PathBuf },
    /// Print the schema as highlighted HTML
    Highlight { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging goes to stderr so `exec` and `schema` output stays clean
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let settings = settings::Settings::load(&cli.config)?;
            tracing::info!(?settings, "Loaded configuration");
            web::serve(settings).await?;
        }
        Commands::Exec { line } => {
            let settings = settings::Settings::load(&cli.config)?;
            let dispatcher = terminal::dispatcher_from_settings(&settings)?;
            let result = dispatcher.run(&line).await.map_err(ConsoleError::from)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&result).into_diagnostic()?
            );
            if !result.ok {
                std::process::exit(1);
            }
        }
        Commands::Schema { command } => match command {
            SchemaCommands::Tree { file } => {
                let text = std::fs::read_to_string(&file).into_diagnostic()?;
                println!("{}", schema::render_tree(&schema::parse_schema(&text)));
            }
            SchemaCommands::Highlight { file } => {
                let text = std::fs::read_to_string(&file).into_diagnostic()?;
                println!("{}", schema::highlight(&text));
            }
        },
    }
    Ok(())
}
