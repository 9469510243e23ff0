use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use sylime_cli::commands::{config_ops, learn_ops, store_ops};

#[derive(Parser)]
#[command(name = "udtool", about = "Sylime learning store maintenance")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show store header and record counts
    Info {
        /// User dictionary file (default: ~/.local/share/sylime/user_dict.syud)
        #[arg(long)]
        file: Option<String>,
    },
    /// List live entries as code, text and commit count
    List {
        /// User dictionary file
        #[arg(long)]
        file: Option<String>,
    },
    /// Prefix-scan entries the way the engine ranks them
    Scan {
        /// Code prefix to scan, e.g. "ni ha"
        input: String,
        /// User dictionary file
        #[arg(long)]
        file: Option<String>,
        /// Include completions past the typed prefix
        #[arg(long)]
        predictive: bool,
        /// Maximum entries to report
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Settings TOML file (default: embedded settings)
        #[arg(long)]
        settings: Option<String>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Add a phrase, or reinforce one that already exists
    Add {
        /// Syllable code, spellings separated by spaces
        code: String,
        /// Phrase text
        text: String,
        /// User dictionary file
        #[arg(long)]
        file: Option<String>,
        /// Commit count to record
        #[arg(long, default_value = "1")]
        commits: i32,
    },
    /// Mark a phrase deleted (a later add revives it)
    Remove {
        /// Syllable code, spellings separated by spaces
        code: String,
        /// Phrase text
        text: String,
        /// User dictionary file
        #[arg(long)]
        file: Option<String>,
    },
    /// Dump all records to a JSONL snapshot
    Export {
        /// Output JSONL file
        output: String,
        /// User dictionary file
        #[arg(long)]
        file: Option<String>,
    },
    /// Load records from a JSONL snapshot
    Import {
        /// Input JSONL file
        input: String,
        /// User dictionary file
        #[arg(long)]
        file: Option<String>,
    },
    /// Rebuild an unreadable store from its write-ahead log
    Repair {
        /// User dictionary file
        #[arg(long)]
        file: Option<String>,
    },
    /// Export default settings as TOML
    SettingsExport,
    /// Validate a settings TOML file
    SettingsValidate {
        /// Path to the TOML file
        file: String,
    },
}

fn store_path(file: Option<String>) -> PathBuf {
    PathBuf::from(file.unwrap_or_else(store_ops::default_store_path))
}

fn main() {
    let cli = Cli::parse();

    #[cfg(feature = "trace")]
    let _trace_guard = std::env::var("SYLIME_TRACE_DIR")
        .ok()
        .map(|dir| sylime_cli::trace_init::init_tracing(Path::new(&dir)));

    match cli.command {
        Command::Info { file } => store_ops::info(&store_path(file)),
        Command::List { file } => store_ops::list(&store_path(file)),
        Command::Scan {
            input,
            file,
            predictive,
            limit,
            settings,
            json,
        } => {
            let settings = config_ops::load_settings(settings.as_deref());
            learn_ops::scan(
                &store_path(file),
                &settings,
                &input,
                predictive,
                limit,
                json,
            );
        }
        Command::Add {
            code,
            text,
            file,
            commits,
        } => learn_ops::add(&store_path(file), &code, &text, commits),
        Command::Remove { code, text, file } => {
            learn_ops::remove(&store_path(file), &code, &text)
        }
        Command::Export { output, file } => {
            store_ops::export(&store_path(file), Path::new(&output))
        }
        Command::Import { input, file } => {
            store_ops::import(&store_path(file), Path::new(&input))
        }
        Command::Repair { file } => store_ops::repair(&store_path(file)),
        Command::SettingsExport => config_ops::settings_export(),
        Command::SettingsValidate { file } => config_ops::settings_validate(&file),
    }
}
