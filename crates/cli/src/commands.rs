//! CLI commands

use anyhow::{Result, bail};
use clap::Subcommand;
use sessiongate_client::{
    ClientError, Credentials, Method, Registration, SessionClient, SessionState,
};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::config::{self, Settings};

#[derive(Subcommand)]
pub enum Commands {
    /// Log in, then fetch protected paths with the new session
    Login {
        #[arg(long)]
        email: String,

        #[arg(long, env = "SESSIONGATE_PASSWORD", hide_env_values = true)]
        password: String,

        /// Protected path to GET after login (repeatable)
        #[arg(long = "fetch", value_name = "PATH")]
        fetch: Vec<String>,
    },

    /// Evaluate the session guard and print the resulting state
    Guard {
        /// Log in first with this email
        #[arg(long, requires = "password")]
        email: Option<String>,

        #[arg(long, env = "SESSIONGATE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Create an account
    Register {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long, env = "SESSIONGATE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Interactive session reading commands from stdin
    Shell,

    /// Configuration file helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a default configuration file
    Init {
        /// Output file path (defaults to the per-user config location)
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

impl Commands {
    /// Whether the command runs until the user ends it
    pub fn is_interactive(&self) -> bool {
        matches!(self, Commands::Shell)
    }

    pub async fn execute(self, settings: Settings) -> Result<()> {
        match self {
            Commands::Login {
                email,
                password,
                fetch,
            } => {
                let client = settings.client()?;
                login(&client, email, password).await?;
                for path in fetch {
                    print_fetch(&client, Method::GET, &path, None).await?;
                }
                client.logout().await;
                Ok(())
            }
            Commands::Guard { email, password } => {
                let client = settings.client()?;
                if let (Some(email), Some(password)) = (email, password) {
                    login(&client, email, password).await?;
                }
                let state = client.evaluate().await;
                print_state(state);
                Ok(())
            }
            Commands::Register {
                name,
                email,
                password,
            } => {
                let client = settings.client()?;
                let body = client
                    .register(&Registration::new(name, email, password))
                    .await?;
                println!("Registration successful");
                print_json(&body);
                Ok(())
            }
            Commands::Shell => {
                let client = settings.client()?;
                run_shell(&client).await
            }
            Commands::Config { command } => command.execute(&settings),
        }
    }
}

impl ConfigCommands {
    pub fn execute(self, settings: &Settings) -> Result<()> {
        match self {
            ConfigCommands::Init { output, force } => {
                let Some(path) = output.or_else(config::default_config_path) else {
                    bail!("no config directory on this platform, pass an output path");
                };
                config::generate_default_config(&path, force)?;
                info!("Wrote default configuration to {}", path.display());
                println!("{}", path.display());
                Ok(())
            }
            ConfigCommands::Show => {
                let config = settings.client_config()?;
                print!("{}", config::render(&config)?);
                Ok(())
            }
        }
    }
}

async fn login(client: &SessionClient, email: String, password: String) -> Result<()> {
    client.login(&Credentials::new(email, password)).await?;
    println!("Login successful");
    Ok(())
}

async fn print_fetch(
    client: &SessionClient,
    method: Method,
    path: &str,
    body: Option<serde_json::Value>,
) -> Result<()> {
    let mut request = client.request(method.clone(), path);
    if let Some(body) = &body {
        request = request.json(body);
    }

    let response = client.fetch_authenticated(request).await?;
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    println!("{method} {path} -> {status}");
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(json) => print_json(&json),
        Err(_) if !text.is_empty() => println!("{text}"),
        Err(_) => {}
    }
    if status == sessiongate_client::StatusCode::UNAUTHORIZED {
        println!("Session expired, log in again");
    }
    Ok(())
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(pretty) => println!("{pretty}"),
        Err(_) => println!("{value}"),
    }
}

fn print_state(state: SessionState) {
    match state {
        SessionState::Checking => println!("Checking authentication..."),
        SessionState::Authenticated => println!("Authenticated"),
        SessionState::Unauthenticated => {
            println!("Not Authenticated: must be logged in to view this page (run `login`)");
        }
    }
}

const SHELL_HELP: &str = "\
commands:
  login <email> <password>
  register <name> <email> <password>
  get <path>
  post <path> [json]
  delete <path>
  verify
  guard
  state
  logout
  help
  quit";

async fn run_shell(client: &SessionClient) -> Result<()> {
    println!("Connected to {} (type `help`)", client.base_url());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        debug!(command = line.split_whitespace().next(), "Shell command");

        match shell_command(client, line).await {
            Ok(ShellFlow::Continue) => {}
            Ok(ShellFlow::Quit) => break,
            Err(e) => println!("error: {e:#}"),
        }
    }

    client.logout().await;
    Ok(())
}

enum ShellFlow {
    Continue,
    Quit,
}

async fn shell_command(client: &SessionClient, line: &str) -> Result<ShellFlow> {
    let (command, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(command, rest)| (command, rest.trim()));
    let args: Vec<&str> = rest.split_whitespace().collect();

    match (command, args.as_slice()) {
        ("login", [email, password]) => {
            login(client, (*email).to_string(), (*password).to_string()).await?;
        }
        ("register", [name, email, password]) => {
            let body = client
                .register(&Registration::new(*name, *email, *password))
                .await?;
            println!("Registration successful");
            print_json(&body);
        }
        ("get", [path]) => print_fetch(client, Method::GET, path, None).await?,
        ("delete", [path]) => print_fetch(client, Method::DELETE, path, None).await?,
        ("post", [path, ..]) => {
            let json = rest[path.len()..].trim();
            let body = if json.is_empty() {
                None
            } else {
                Some(serde_json::from_str(json)?)
            };
            print_fetch(client, Method::POST, path, body).await?;
        }
        ("verify", []) => match client.verify_token().await {
            Ok(body) => print_json(&body),
            Err(e) if e.requires_login() => println!("Session expired, log in again"),
            Err(ClientError::NetworkUnavailable(reason)) => println!("Backend unreachable: {reason}"),
            Err(e) => return Err(e.into()),
        },
        ("guard", []) => print_state(client.evaluate().await),
        ("state", []) => print_state(client.session_state()),
        ("logout", []) => {
            client.logout().await;
            println!("Logged out");
        }
        ("help", _) => println!("{SHELL_HELP}"),
        ("quit" | "exit", _) => return Ok(ShellFlow::Quit),
        _ => println!("unrecognized command, type `help`"),
    }

    Ok(ShellFlow::Continue)
}
