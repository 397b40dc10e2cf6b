//! Command line options

use clap::{Parser, Subcommand, ValueEnum};
use trapline_client::ClientConfig;

#[derive(Debug, Parser)]
#[command(name = "trapline", version, about = "Watch a mail-trap inbox from the terminal")]
pub struct Cli {
    /// Server root URL
    #[arg(long, env = "TRAPLINE_URL", default_value = "http://127.0.0.1:1080")]
    pub url: String,

    /// Path prefix of the REST endpoints, e.g. `api`
    #[arg(long, env = "TRAPLINE_API_PREFIX", default_value = "")]
    pub api_prefix: String,

    /// HTTP basic auth user
    #[arg(long, env = "TRAPLINE_USER")]
    pub user: Option<String>,

    /// HTTP basic auth password
    #[arg(long, env = "TRAPLINE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Seconds between event stream reconnection attempts
    #[arg(long, env = "TRAPLINE_RETRY_SECS", default_value_t = 5)]
    pub retry_secs: u64,

    /// Per-request timeout in seconds
    #[arg(long, env = "TRAPLINE_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand, PartialEq)]
pub enum Command {
    /// Follow the inbox live (default)
    Watch {
        /// Only show messages matching this text
        #[arg(long)]
        filter: Option<String>,
    },
    /// Print the captured messages
    List {
        #[arg(long)]
        filter: Option<String>,
    },
    /// Print one message with its formats and attachments
    Show { id: String },
    /// Delete one message
    Delete { id: String },
    /// Delete every message
    Clear,
    /// Stop the mail-trap server
    Terminate,
    /// Show or change the desktop notification setting
    Notifications {
        #[arg(value_enum, default_value_t = NotificationAction::Status)]
        action: NotificationAction,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NotificationAction {
    On,
    Off,
    Toggle,
    Status,
}

impl Cli {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.url.clone(),
            api_prefix: self.api_prefix.clone(),
            username: self.user.clone(),
            password: self.password.clone(),
            timeout_secs: self.timeout_secs,
            retry_secs: self.retry_secs,
        }
    }

    /// The chosen subcommand, `watch` if none was given
    pub fn subcommand(&self) -> Command {
        self.command
            .clone()
            .unwrap_or(Command::Watch { filter: None })
    }
}
