use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand};
use sports_portal::config::{API_URL_VAR, SESSION_FILE_VAR, VALIDATE_SESSION_VAR, env_var};
use sports_portal::guard::{self, GuardDecision, Route};
use sports_portal::{
    AuthController, AuthError, ConfigError, Credentials, FileSessionStore, HttpIdentityClient, PortalConfig,
    RegistrationPayload, Role, Session, User,
};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("http client init failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{}", .0.user_message())]
    Auth(#[from] AuthError),
    #[error("no page at {0}")]
    NotFound(String),
}

#[derive(Parser, Debug)]
#[command(name = "portal", about = "Sports portal sign-in from the command line")]
struct Cli {
    /// Identity service root, including the `/api` mount.
    #[arg(long, env = API_URL_VAR)]
    api_url: Option<String>,

    /// Where the session is kept between runs.
    #[arg(long, env = SESSION_FILE_VAR)]
    session_file: Option<PathBuf>,

    /// Trust the stored session instead of confirming it with the service.
    #[arg(long, default_value_t = false)]
    no_validate: bool,

    /// Log more to stderr (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with email and password.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in.
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        phone: String,
        /// player, coach, official or viewer.
        #[arg(long, default_value = "player")]
        role: Role,
    },
    /// Sign out and forget the stored session.
    Logout,
    /// Show the current session.
    #[command(alias = "whoami")]
    Status,
    /// Resolve a portal path the way the web front-end would.
    Open { path: String },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "ignoring unreadable .env"),
    }

    let config = resolve_config(&cli)?;
    tracing::debug!(api = %config.api_base_url, session = %config.session_path.display(), hydration = ?config.hydration, "portal config");

    let api = HttpIdentityClient::new(config.api_base_url.clone(), config.timeouts)?;
    let store = FileSessionStore::new(config.session_path.clone());
    let controller = AuthController::new(Arc::new(api), Arc::new(store), config.hydration);
    controller.init().await;

    let outcome = run(&controller, cli.command).await;
    controller.teardown();
    outcome
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr).init();
}

/// Flags win over the environment; everything goes through the same parser.
fn resolve_config(cli: &Cli) -> Result<PortalConfig, CliError> {
    let overrides = [
        (API_URL_VAR, cli.api_url.clone()),
        (SESSION_FILE_VAR, cli.session_file.as_ref().map(|path| path.display().to_string())),
        (VALIDATE_SESSION_VAR, cli.no_validate.then(|| "false".to_owned())),
    ];
    let config = PortalConfig::from_lookup(|key| {
        overrides
            .iter()
            .find(|(var, _)| *var == key)
            .and_then(|(_, value)| value.clone())
            .or_else(|| env_var(key))
    })?;
    Ok(config)
}

async fn run(controller: &AuthController, command: Command) -> Result<(), CliError> {
    match command {
        Command::Login { email, password } => {
            let user = controller.login(Credentials::new(email, password)).await?;
            println!("signed in as {}", describe(&user));
            Ok(())
        }
        Command::Register { name, email, password, phone, role } => {
            let user = controller.register(RegistrationPayload { name, email, password, phone, role }).await?;
            println!("registered and signed in as {}", describe(&user));
            Ok(())
        }
        Command::Logout => {
            controller.logout();
            println!("signed out");
            Ok(())
        }
        Command::Status => {
            print_session(&controller.session());
            Ok(())
        }
        Command::Open { path } => {
            let route = Route::from_path(&path).ok_or_else(|| CliError::NotFound(path.clone()))?;
            let decision = guard::settle(&mut controller.subscribe(), route).await;
            match decision {
                GuardDecision::Render(Route::Dashboard) => print_dashboard(&controller.session()),
                GuardDecision::Render(route) => println!("render {route}"),
                GuardDecision::Redirect(target) => println!("redirect {route} -> {target}"),
                GuardDecision::Loading => println!("loading {route}"),
            }
            Ok(())
        }
    }
}

fn describe(user: &User) -> String {
    format!("{} <{}> ({})", user.name, user.email, user.role)
}

fn print_session(session: &Session) {
    println!("status: {}", session.status());
    if let Some(user) = session.user() {
        println!("user:   {}", describe(user));
        println!("phone:  {}", user.phone);
    }
    if let Some(message) = session.last_error() {
        println!("error:  {message}");
    }
}

fn print_dashboard(session: &Session) {
    let Some(user) = session.user() else {
        println!("render /dashboard");
        return;
    };
    println!("Welcome, {}", user.name);
    println!("  role:  {}", user.role);
    println!("  email: {}", user.email);
    println!("  phone: {}", user.phone);
    if let Some(joined) = &user.created_at {
        println!("  since: {joined}");
    }
}
