use crate::ingest;
use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::fs;
use std::io;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ghload", version)]
#[command(
    about = "Load GitHub event dumps into SQLite",
    long_about = "ghload walks a directory of JSON event dumps, extracts actors and events, and upserts them into a SQLite database with one transaction per file."
)]
#[command(arg_required_else_help = true)]
#[command(after_long_help = "Examples:
  ghload ingest data/ --db events.db
  ghload ingest --config .ghload/config.toml --log ingest.ndjson
  ghload stats --db events.db
  ghload completion zsh > ~/.zsh/completions/_ghload
  ghload man > ghload.1

Set RUST_LOG=ghload=debug to trace every record.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Ingest every .json file under a directory",
        long_about = "Ingest every .json file under ROOT, in directory order. Actors are upserted last-write-wins, events first-write-wins. The first file that cannot be read or written stops the run; files committed before it stay committed."
    )]
    #[command(after_long_help = "Examples:
  ghload ingest
  ghload ingest data/ --db events.db --page-size 500
  ghload ingest data/ --log ingest.ndjson")]
    Ingest {
        #[arg(
            value_name = "ROOT",
            help = "Directory to scan (default: [source].root from config, then ./data)"
        )]
        root: Option<PathBuf>,
        #[arg(
            long,
            value_name = "PATH",
            help = "Path to SQLite DB (default: $XDG_DATA_HOME/ghload/events.db)"
        )]
        db: Option<PathBuf>,
        #[arg(
            long,
            value_name = "PATH",
            help = "Config file (default: .ghload/config.toml when present)"
        )]
        config: Option<PathBuf>,
        #[arg(long, value_name = "N", help = "Rows per INSERT statement (1-10000)")]
        page_size: Option<usize>,
        #[arg(long, value_name = "PATH", help = "Append NDJSON run log to file")]
        log: Option<PathBuf>,
    },
    #[command(about = "Create the actors/events tables if they do not exist")]
    Schema {
        #[arg(
            long,
            value_name = "PATH",
            help = "Path to SQLite DB (default: $XDG_DATA_HOME/ghload/events.db)"
        )]
        db: Option<PathBuf>,
        #[arg(
            long,
            value_name = "PATH",
            help = "Config file (default: .ghload/config.toml when present)"
        )]
        config: Option<PathBuf>,
    },
    #[command(about = "Print actor and event counts")]
    Stats {
        #[arg(
            long,
            value_name = "PATH",
            help = "Path to SQLite DB (default: $XDG_DATA_HOME/ghload/events.db)"
        )]
        db: Option<PathBuf>,
        #[arg(
            long,
            value_name = "PATH",
            help = "Config file (default: .ghload/config.toml when present)"
        )]
        config: Option<PathBuf>,
    },
    #[command(
        about = "Generate shell completion script",
        long_about = "Generate shell completion script for your shell. Redirect output to your shell completion directory."
    )]
    #[command(arg_required_else_help = true)]
    Completion {
        #[arg(value_enum, value_name = "SHELL", help = "Target shell")]
        shell: Shell,
    },
    #[command(
        about = "Generate a man page",
        long_about = "Generate a roff man page for ghload."
    )]
    Man {
        #[arg(
            long,
            value_name = "PATH",
            help = "Write man page to file (stdout when omitted)"
        )]
        output: Option<PathBuf>,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Ingest {
            root,
            db,
            config,
            page_size,
            log,
        } => {
            let cmd = ingest::IngestCommand {
                root,
                db,
                config,
                page_size,
                log,
            };
            ingest::execute_ingest(cmd).map(|_| ())
        }
        Commands::Schema { db, config } => ingest::create_schema(db, config),
        Commands::Stats { db, config } => ingest::print_stats(db, config),
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        Commands::Man { output } => {
            let man = clap_mangen::Man::new(Cli::command());
            match output {
                Some(path) => {
                    let mut bytes = Vec::new();
                    man.render(&mut bytes)?;
                    fs::write(path, bytes)?;
                }
                None => {
                    man.render(&mut io::stdout())?;
                }
            }
            Ok(())
        }
    }
}
