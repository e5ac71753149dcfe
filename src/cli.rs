use clap::{Parser, Subcommand};

/// Opslink — operations console client
#[derive(Parser)]
#[command(name = "opslink", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and persist the access credential
    Login {
        #[arg(long)]
        email: String,
        /// Account password (prefer the env var over the flag)
        #[arg(long, env = "OPSLINK_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// End the session, server-side and locally
    Logout,

    /// Follow the live activity feed (Ctrl+C to stop)
    Tail,

    /// Destructively clear the log history, remote store included
    ClearHistory,
}
