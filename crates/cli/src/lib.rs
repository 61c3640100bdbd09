pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use resetline_core::config::{AppConfig, LoadOptions, LogFormat};

pub const DEFAULT_UTTERANCE: &str = "reset my password";

#[derive(Debug, Parser)]
#[command(
    name = "resetline",
    about = "Resetline password-reset assistant demo",
    long_about = concat!(
        "Route typed or recorded requests through the password-reset assistant ",
        "and inspect its configuration."
    ),
    after_help = concat!(
        "Examples:\n",
        "  resetline text \"I forgot my password\"\n",
        "  resetline voice --input request.wav --output reply.wav\n",
        "  resetline tools\n",
        "  resetline config"
    )
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a resetline.toml config file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Route a typed utterance and print the reset outcome")]
    Text {
        #[arg(default_value = DEFAULT_UTTERANCE)]
        utterance: String,
    },
    #[command(about = "Run one voice turn from a WAV recording and write the spoken reply")]
    Voice {
        #[arg(long, help = "WAV file holding the spoken request")]
        input: PathBuf,
        #[arg(long, default_value = "response.wav", help = "Where to write the spoken reply")]
        output: PathBuf,
    },
    #[command(about = "List the tools advertised to the language model")]
    Tools,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions {
        require_file: cli.config.is_some(),
        config_path: cli.config,
        ..LoadOptions::default()
    };

    let result = match cli.command {
        Command::Text { utterance } => commands::text::run(options, &utterance),
        Command::Voice { input, output } => commands::voice::run(options, input, output),
        Command::Tools => commands::tools::run(options),
        Command::Config => commands::config::run(options),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Installs the stderr subscriber. Later calls are no-ops so commands can be
/// invoked repeatedly in one process.
pub fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
