mod analyze;
mod config;
mod credentials;
mod error;
mod fingerprint;
mod report;
mod spotify;
mod utils;

use clap::{Args, Parser, Subcommand};
use env_logger;
use std::path::{Path, PathBuf};
use std::process;

use crate::config::AuthFlow;
use crate::error::AppError;
use crate::spotify::auth::{self, RedirectMode, Token};
use crate::spotify::SpotifyClient;

#[derive(Parser)]
#[command(name = "emotional-fingerprint")]
#[command(about = "Computes emotional fingerprints of Spotify tracks from their audio features", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Fingerprints the given tracks (the default command)
    Run(RunArgs),
    /// Authenticates only and reports the token, to check the OAuth setup
    Login(AuthArgs),
    /// Writes a config.toml with the default settings
    InitConfig {
        #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
        path: PathBuf,
    },
}

#[derive(Args, Clone)]
struct AuthArgs {
    /// Env file holding CLIENT_ID and CLIENT_SECRET
    #[arg(long, default_value = credentials::DEFAULT_ENV_PATH)]
    env_file: PathBuf,

    /// Settings file (optional; defaults apply when absent)
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Overrides the OAuth flow from the settings file
    #[arg(long, value_enum)]
    flow: Option<AuthFlow>,

    /// Paste the redirected URL instead of running the local callback listener
    #[arg(long)]
    paste: bool,
}

#[derive(Args, Clone)]
struct RunArgs {
    /// Spotify track links, spotify:track: URIs or bare ids (sample tracks when omitted)
    #[arg(value_name = "TRACKS")]
    tracks: Vec<String>,

    /// Also write the fingerprints to a JSON file (e.g., --json=report.json)
    #[arg(long)]
    json: Option<PathBuf>,

    #[command(flatten)]
    auth: AuthArgs,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Run(args)) => handle_run(&args).await,
        Some(Commands::Login(args)) => handle_login(&args).await,
        Some(Commands::InitConfig { path }) => handle_init_config(&path),
        None => handle_run(&cli.run).await,
    };

    if let Err(e) = result {
        eprintln!();
        utils::log_error(&e);
        if let Some(hint) = e.hint() {
            eprintln!();
            eprintln!("{}", hint);
        }
        process::exit(e.exit_code());
    }
}

async fn authenticate(args: &AuthArgs) -> Result<(Token, config::Settings), AppError> {
    // Credentials first: never start an OAuth flow with empty values.
    let credentials = credentials::load_credentials(&args.env_file)?;
    let mut settings = config::load_config(&args.config)?;
    if let Some(flow) = args.flow {
        settings.auth.flow = flow;
    }

    let mode = if args.paste {
        RedirectMode::Paste
    } else {
        RedirectMode::Listener
    };
    let token = auth::authenticate(&credentials, &settings, mode).await?;
    Ok((token, settings))
}

async fn handle_run(args: &RunArgs) -> Result<(), AppError> {
    let ids = analyze::resolve_track_ids(&args.tracks)?;
    let (token, settings) = authenticate(&args.auth).await?;
    let client = SpotifyClient::new(&settings.spotify.api_base, &token);

    println!("Fingerprinting {} tracks...", ids.len());
    let rows = analyze::analyze(&client, &ids).await?;

    println!();
    println!("--- Emotional Fingerprints ---");
    println!();
    print!("{}", report::render_table(&rows));

    if let Some(path) = &args.json {
        report::write_json(&rows, path)?;
        println!();
        println!("[SAVED] Report saved to: {}", path.display());
    }
    Ok(())
}

async fn handle_login(args: &AuthArgs) -> Result<(), AppError> {
    let (token, _) = authenticate(args).await?;

    println!();
    println!("[OK] Authenticated with Spotify");
    println!("Flow:        {:?}", token.flow);
    println!("Token:       {}", token.prefix());
    match token.expires_in {
        Some(expires) => println!("Expires in:  {}s", expires.as_secs()),
        None => println!("Expires in:  unknown"),
    }
    if !token.scopes.is_empty() {
        println!("Scopes:      {}", token.scopes.join(" "));
    }
    Ok(())
}

fn handle_init_config(path: &Path) -> Result<(), AppError> {
    config::write_default_config(path)?;
    println!("[SAVED] Default settings written to: {}", path.display());
    Ok(())
}
