use std::{error::Error, io, process};

use clap::{command, Parser, Subcommand, ValueHint};
use log::{debug, error, info, LevelFilter};

use spotremote::{
    config::{Config, Credentials},
    remote::Remote,
    store::FileStore,
};

/// Profile to display when not built in release mode.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
/// Profile to display when not built release mode.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Command line arguments as parsed by `clap`.
#[derive(Clone, Debug, Hash, PartialEq, Eq, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Secrets file
    ///
    /// Holds the `client_id`, `client_secret` and `redirect_uri` of your
    /// Spotify application. Keep it private: the client secret allows anyone
    /// to act as your application.
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath, default_value_t = String::from("secrets.toml"))]
    secrets_file: String,

    /// Token store
    ///
    /// JSON file where access and refresh tokens are kept between runs.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath, default_value_t = String::from("tokens.json"))]
    store: String,

    /// Session identifier
    ///
    /// Tokens are stored per session. `login` creates a new session when
    /// none is given.
    #[arg(long, global = true, env = "SPOTREMOTE_SESSION")]
    session: Option<String>,

    /// Suppresses all output except warnings and errors.
    #[arg(short, long, default_value_t = false, group = ARGS_GROUP_LOGGING)]
    quiet: bool,

    /// Enable verbose logging
    ///
    /// Specify twice for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, Subcommand)]
enum Commands {
    /// Print the URL to authorize this application
    AuthUrl,

    /// Exchange the code from the authorization redirect for tokens
    Login {
        /// Value of the `code` query parameter of the redirect
        code: String,
    },

    /// Show whether the session is authenticated
    Status,

    /// List available playback devices
    Devices,

    /// Show the current track
    NowPlaying,

    /// Start or resume playback
    Play,

    /// Pause playback
    Pause,

    /// Skip to the next track
    Skip,

    /// Forget the tokens of the session
    Logout,
}

/// Initializes the logger facade.
///
/// The logging level is determined as follows, in order of precedence from
/// highest to lowest:
/// 1. Command line arguments
/// 2. `RUST_LOG` environment variable
/// 3. Hard coded default
///
/// # Panics
///
/// Panics when a logger facade is already initialized.
fn init_logger(config: &Args) {
    let mut logger = env_logger::Builder::from_env(
        // Note: if you change the default logging level here, then you should
        // probably also change the verbosity levels below.
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    if config.quiet || config.verbose > 0 {
        let level = match config.verbose {
            // Quiet and verbose are mutually exclusive.
            0 => LevelFilter::Warn,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Filter log messages of external crates.
        logger.filter_module("spotremote", level);
    }

    logger.init();
}

/// Loads the application credentials.
///
/// Points to the example file when the secrets file does not exist.
fn load_credentials(secrets_file: &str) -> spotremote::error::Result<Credentials> {
    let credentials = Credentials::from_file(secrets_file);

    if let Err(ref e) = credentials {
        if e
            .downcast::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::NotFound)
        {
            info!("copy secrets.toml.example to {secrets_file} and fill in your application");
        }
    }

    credentials
}

/// The session to act on, for commands that need an existing one.
fn session(args: &Args) -> Result<String, Box<dyn Error>> {
    args.session
        .clone()
        .ok_or_else(|| "no session given: pass --session or set SPOTREMOTE_SESSION".into())
}

/// Runs one command.
///
/// # Errors
///
/// Returns an error when the configuration cannot be loaded or the command
/// fails.
async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let credentials = load_credentials(&args.secrets_file)?;
    let config = Config::with_credentials(credentials);
    let remote = Remote::new(&config, FileStore::new(&args.store))?;

    match &args.command {
        Commands::AuthUrl => println!("{}", remote.auth_url()?),

        Commands::Login { code } => {
            let session_id = args
                .session
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let record = remote.exchange_code_for_token(&session_id, code).await?;
            println!("logged in: {record}");
            println!("export SPOTREMOTE_SESSION={session_id}");
        }

        Commands::Status => {
            let status = remote.token_status(&session(&args)?).await?;
            if status.authenticated {
                println!(
                    "authenticated, token expires in {}s",
                    status.expires_in.as_secs()
                );
            } else {
                println!("not authenticated");
            }
        }

        Commands::Devices => {
            let devices = remote.list_devices(&session(&args)?).await?;
            if devices.is_empty() {
                println!("no devices");
            }
            for device in devices {
                println!("{device}");
            }
        }

        Commands::NowPlaying => match remote.get_current_playback(&session(&args)?).await? {
            Some(playback) => {
                println!("{playback}");
                if let Some(cover) = playback.item.as_ref().and_then(|track| track.cover_url()) {
                    println!("cover: {cover}");
                }
            }
            None => println!("nothing playing"),
        },

        Commands::Play => remote.play(&session(&args)?).await?,
        Commands::Pause => remote.pause(&session(&args)?).await?,
        Commands::Skip => {
            remote.skip(&session(&args)?).await?;
        }

        Commands::Logout => remote.logout(&session(&args)?)?,
    }

    Ok(())
}

/// Main entry point of the application.
///
/// This function initializes the logger facade, parses the command line
/// arguments, and runs the requested command.
#[tokio::main]
async fn main() {
    // `clap` handles our command line arguments and help text.
    let args = Args::parse();
    init_logger(&args);

    // Dump command line arguments before we do anything more.
    // This aids in debugging of whatever comes next.
    debug!("Command {:#?}", args);

    let cmd = command!();
    let name = cmd.get_name().to_string();
    let version = cmd.get_version().unwrap_or("UNKNOWN").to_string();

    info!("starting {name}/{version}; {BUILD_PROFILE}");

    if let Err(e) = run(args).await {
        error!("{e}");
        process::exit(1);
    }
}
