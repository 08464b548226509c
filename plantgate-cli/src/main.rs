use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use colored::Colorize;
use reqwest::{RequestBuilder, StatusCode};
use serde_json::{Value, json};
use std::time::Instant;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "plantgate-cli")]
#[command(about = "PlantGate CLI - inspect identities and plant scope on a running gate", long_about = None)]
#[command(version)]
struct Args {
    /// Server host
    #[arg(short = 'H', long, default_value = "127.0.0.1", global = true)]
    host: String,

    /// Server port
    #[arg(short = 'p', long, default_value = "15600", global = true)]
    port: u16,

    /// Access token sent as a bearer credential
    #[arg(short = 't', long, env = "PLANTGATE_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ping the server
    Health,
    /// Show the identity the gate resolves for the token
    Whoami,
    /// Show the tenant context (home plant, grants, accessible plants)
    Context,
    /// Exchange a refresh token for a new session
    Refresh {
        refresh_token: String,
    },
    /// Check whether the token may reach a plant
    CheckPlant {
        plant_id: String,

        /// Guard to test: access, manage, admin or own
        #[arg(short, long, default_value = "access")]
        guard: String,
    },
}

const PLANT_GUARDS: [&str; 4] = ["access", "manage", "admin", "own"];

struct GateClient {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl GateClient {
    fn new(host: &str, port: u16, token: Option<String>) -> Self {
        Self {
            base_url: format!("http://{}:{}", host, port),
            token,
            client: reqwest::Client::new(),
        }
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| anyhow!("No token: pass --token or set PLANTGATE_TOKEN"))?;
        Ok(request.bearer_auth(token))
    }

    async fn execute(&self, command: &Command) -> Result<String> {
        let start = Instant::now();

        let response = match command {
            Command::Health => self.cmd_health().await?,
            Command::Whoami => self.cmd_whoami().await?,
            Command::Context => self.cmd_context().await?,
            Command::Refresh { refresh_token } => self.cmd_refresh(refresh_token).await?,
            Command::CheckPlant { plant_id, guard } => self.cmd_check_plant(plant_id, guard).await?,
        };

        let elapsed = start.elapsed();
        Ok(format!(
            "{}\n{}",
            response,
            format!("({:.2?})", elapsed).dimmed()
        ))
    }

    async fn send(&self, request: RequestBuilder) -> Result<(StatusCode, Value)> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        Ok((status, body))
    }

    async fn cmd_health(&self) -> Result<String> {
        let (_, body) = self
            .send(self.client.get(format!("{}/health", self.base_url)))
            .await?;

        Ok(format!(
            "{} {} v{}",
            body["status"].as_str().unwrap_or("unknown").green(),
            body["service"].as_str().unwrap_or("?"),
            body["version"].as_str().unwrap_or("?")
        ))
    }

    async fn cmd_whoami(&self) -> Result<String> {
        let request =
            self.authorized(self.client.get(format!("{}/api/me/identity", self.base_url)))?;
        let (status, body) = self.send(request).await?;
        if !status.is_success() {
            return Err(failure(status, &body));
        }

        let data = &body["data"];
        let permissions = data["permissions"]
            .as_array()
            .map(|p| {
                p.iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();

        Ok(format!(
            "{} {}\n{} {}\n{} {}\n{} {}",
            "user:".bold(),
            data["userId"].as_str().unwrap_or("?"),
            "role:".bold(),
            data["role"].as_str().unwrap_or("?").cyan(),
            "home plant:".bold(),
            data["plantId"].as_str().unwrap_or("(none)"),
            "permissions:".bold(),
            permissions
        ))
    }

    async fn cmd_context(&self) -> Result<String> {
        let request =
            self.authorized(self.client.get(format!("{}/api/me/context", self.base_url)))?;
        let (status, body) = self.send(request).await?;
        if !status.is_success() {
            return Err(failure(status, &body));
        }

        Ok(serde_json::to_string_pretty(&body["data"])?)
    }

    async fn cmd_refresh(&self, refresh_token: &str) -> Result<String> {
        let request = self
            .client
            .post(format!("{}/auth/refresh", self.base_url))
            .json(&json!({ "refresh_token": refresh_token }));
        let (status, body) = self.send(request).await?;
        if !status.is_success() {
            return Err(failure(status, &body));
        }

        let data = &body["data"];
        Ok(format!(
            "{}\n{} {}\n{} {}",
            "Session refreshed".green(),
            "access token:".bold(),
            data["accessToken"].as_str().unwrap_or("?"),
            "refresh token:".bold(),
            data["refreshToken"].as_str().unwrap_or("?")
        ))
    }

    async fn cmd_check_plant(&self, plant_id: &str, guard: &str) -> Result<String> {
        if !PLANT_GUARDS.contains(&guard) {
            return Err(anyhow!(
                "Unknown guard '{}', expected one of: {}",
                guard,
                PLANT_GUARDS.join(", ")
            ));
        }

        let url = format!("{}/api/plants/{}/{}", self.base_url, plant_id, guard);
        let (status, body) = self.send(self.authorized(self.client.get(url))?).await?;

        if status.is_success() {
            Ok(format!(
                "{} {} ({})",
                "ALLOWED".green().bold(),
                plant_id,
                guard
            ))
        } else {
            Ok(format!(
                "{} {} ({}): {}",
                "DENIED".red().bold(),
                plant_id,
                guard,
                describe(status, &body)
            ))
        }
    }
}

/// `code: error` from either error shape the gate returns
fn describe(status: StatusCode, body: &Value) -> String {
    let message = body["error"].as_str().unwrap_or("no details");
    match body["code"].as_str() {
        Some(code) => format!("{} {}", code, message),
        None => format!("{} {}", status.as_u16(), message),
    }
}

fn failure(status: StatusCode, body: &Value) -> anyhow::Error {
    anyhow!("{}", describe(status, body))
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout)
        .with_env_filter(tracing_subscriber::EnvFilter::new(log_level))
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let args = Args::parse();
    let client = GateClient::new(&args.host, args.port, args.token.clone());

    match client.execute(&args.command).await {
        Ok(output) => {
            info!("{}", output);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "{}", format!("Error: {}", e).red());
            std::process::exit(1);
        }
    }
}
