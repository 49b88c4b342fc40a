use clap::{Args, Parser, Subcommand};
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use thiserror::Error;
use tidepool_client_core::api::{ApiClient, ApiError, CodeSnippet};
use tidepool_client_core::client::board::render_board;
use tidepool_client_core::client::run::{RunOutcome, stream_output};
use tidepool_client_core::client::term;
use tidepool_client_core::session::{
    ChannelSlot, ConfigError, NegotiationError, SessionConfig, SessionRequest, negotiate,
};
use tidepool_client_core::telemetry::logging::{self as logctl, LogConfig, LogLevel};
use tracing::{debug, info};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    let log_config = cli.logging.to_config();
    logctl::init(&log_config).map_err(|err| CliError::Logging(err.to_string()))?;
    debug!(log_level = ?log_config.level, log_file = ?log_config.file, "logging configured");
    let config = SessionConfig::new(&cli.server)?;

    match cli.command {
        Command::Run(args) => handle_run(&config, args).await,
        Command::Term(args) => handle_term(&config, args).await,
        Command::Save(args) => handle_save(&config, args).await,
        Command::Load(args) => handle_load(&config, args).await,
        Command::Examples(args) => handle_examples(&config, args).await,
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "tidepool",
    about = "🌊 Run code and attach terminals on a remote playground",
    author,
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "TIDEPOOL_SERVER",
        default_value = "http://127.0.0.1:8080",
        help = "Base URL for the playground gateway"
    )]
    server: String,

    #[command(flatten)]
    logging: LoggingArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct LoggingArgs {
    #[arg(
        long = "log-level",
        value_enum,
        env = "TIDEPOOL_LOG_LEVEL",
        default_value_t = LogLevel::Warn,
        help = "Minimum log level (error, warn, info, debug, trace)"
    )]
    level: LogLevel,

    #[arg(
        long = "log-file",
        value_name = "PATH",
        env = "TIDEPOOL_LOG_FILE",
        help = "Write structured logs to the specified file"
    )]
    file: Option<PathBuf>,
}

impl LoggingArgs {
    fn to_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            file: self.file.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute source code remotely and stream its output
    Run(RunArgs),
    /// Attach an interactive terminal for a language
    Term(TermArgs),
    /// Store a snippet and print its key
    Save(SaveArgs),
    /// Load a stored snippet by key
    Load(LoadArgs),
    /// Query the example library and render it as a card board
    Examples(ExamplesArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    #[arg(value_name = "FILE", help = "Source file (stdin when omitted)")]
    file: Option<PathBuf>,

    #[arg(long, short = 'l', value_name = "LANG", help = "Execution language")]
    language: Option<String>,

    #[arg(
        long,
        value_name = "KEY",
        conflicts_with_all = ["file", "language"],
        help = "Run a stored snippet instead of local code"
    )]
    key: Option<String>,
}

#[derive(Args, Debug)]
struct TermArgs {
    #[arg(value_name = "LANG", help = "Terminal language environment")]
    language: String,
}

#[derive(Args, Debug)]
struct SaveArgs {
    #[arg(value_name = "FILE", help = "Source file (stdin when omitted)")]
    file: Option<PathBuf>,

    #[arg(long, short = 'l', value_name = "LANG", help = "Snippet language")]
    language: String,
}

#[derive(Args, Debug)]
struct LoadArgs {
    #[arg(value_name = "KEY", help = "Key returned by save")]
    key: String,
}

#[derive(Args, Debug)]
struct ExamplesArgs {
    #[arg(value_name = "QUERY", help = "Search words (all examples when omitted)")]
    query: Vec<String>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Negotiation(#[from] NegotiationError),
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("logging initialization failed: {0}")]
    Logging(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

async fn handle_run(config: &SessionConfig, args: RunArgs) -> Result<(), CliError> {
    let (language, code) = if let Some(key) = args.key {
        let api = ApiClient::new(config)?;
        let snippet = api.load(&key).await?;
        (snippet.language, snippet.code)
    } else {
        let language = args.language.ok_or_else(|| {
            CliError::InvalidArgument("--language is required unless --key is given".into())
        })?;
        (language, read_source(args.file.as_deref())?)
    };

    info!(language = %language, "starting run session");
    let request = SessionRequest::Run { language, code };
    let handle = negotiate(config, &request).await?;

    match stream_output(handle).await? {
        RunOutcome::Finished => eprintln!("run finished"),
        RunOutcome::Stopped => eprintln!("run stopped"),
    }
    Ok(())
}

async fn handle_term(config: &SessionConfig, args: TermArgs) -> Result<(), CliError> {
    info!(language = %args.language, "starting terminal session");
    let request = SessionRequest::Term {
        language: args.language,
    };
    let handle = negotiate(config, &request).await?;

    let mut slot = ChannelSlot::new();
    term::attach(&mut slot, handle).await?;
    eprintln!("terminal disconnected");
    Ok(())
}

async fn handle_save(config: &SessionConfig, args: SaveArgs) -> Result<(), CliError> {
    let snippet = CodeSnippet {
        code: read_source(args.file.as_deref())?,
        language: args.language,
    };
    let api = ApiClient::new(config)?;
    let key = api.store(&snippet).await?;
    println!("{key}");
    Ok(())
}

async fn handle_load(config: &SessionConfig, args: LoadArgs) -> Result<(), CliError> {
    let api = ApiClient::new(config)?;
    let snippet = api.load(&args.key).await?;
    eprintln!("language: {}", snippet.language);
    print!("{}", snippet.code);
    Ok(())
}

async fn handle_examples(config: &SessionConfig, args: ExamplesArgs) -> Result<(), CliError> {
    let api = ApiClient::new(config)?;
    let query = args.query.join(" ");
    let examples = api.query_examples(&query).await?;
    if examples.is_empty() {
        eprintln!("no examples matched '{query}'");
        return Ok(());
    }

    let width = crossterm::terminal::size().map(|(cols, _)| cols).unwrap_or(80);
    print!("{}", render_board(&examples, width));
    Ok(())
}

fn read_source(file: Option<&std::path::Path>) -> Result<String, CliError> {
    match file {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            if io::stdin().is_terminal() {
                eprintln!("reading source from stdin; finish with ctrl-d");
            }
            let mut code = String::new();
            io::stdin().read_to_string(&mut code)?;
            Ok(code)
        }
    }
}
