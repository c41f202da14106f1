//! `op-gnap` - Open Payments client signing command-line interface
//!
//! Generates client key pairs, signs requests with a configured key, verifies
//! signed requests against a published JWKS and checks GNAP interaction
//! hashes. Command output goes to stdout; logs go to stderr.

use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};

mod commands;
mod observability;

use observability::{LogFormat, init_observability};

#[derive(Parser)]
#[command(name = "op-gnap")]
#[command(author, version, about = "Open Payments GNAP request signing", long_about = None)]
struct Cli {
    /// Log format: `pretty` or `json` (default: `LOG_FORMAT` env var, then `pretty`)
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an Ed25519 key pair and print its JWKS
    Keygen {
        /// Directory to write `private.pem` and `jwks.json` into
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Sign a request and print the resulting headers
    Sign {
        /// Client configuration file (TOML)
        #[arg(long)]
        config: PathBuf,

        /// HTTP method
        #[arg(long, default_value = "GET")]
        method: String,

        /// Absolute target URL
        #[arg(long)]
        url: String,

        /// Extra header in `Name: value` form (repeatable)
        #[arg(long = "header", value_name = "NAME: VALUE")]
        headers: Vec<String>,

        /// Request body
        #[arg(long)]
        body: Option<String>,

        /// GNAP access token for the `Authorization` header
        #[arg(long)]
        access_token: Option<String>,
    },

    /// Verify a signed request against a JWKS
    Verify {
        /// JWKS file published by the client
        #[arg(long)]
        jwks: PathBuf,

        /// HTTP method
        #[arg(long, default_value = "GET")]
        method: String,

        /// Absolute target URL
        #[arg(long)]
        url: String,

        /// Received header in `Name: value` form (repeatable)
        #[arg(long = "header", value_name = "NAME: VALUE")]
        headers: Vec<String>,

        /// Received body
        #[arg(long)]
        body: Option<String>,
    },

    /// Check the interaction hash returned on a grant redirect
    VerifyHash {
        /// Nonce the client sent in the grant request
        #[arg(long)]
        client_nonce: String,

        /// Nonce returned by the authorization server
        #[arg(long)]
        interact_nonce: String,

        /// Interaction reference from the redirect
        #[arg(long)]
        interact_ref: String,

        /// Grant endpoint URL of the authorization server
        #[arg(long)]
        auth_server_url: String,

        /// `hash` query parameter from the redirect
        #[arg(long)]
        hash: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let format = cli.log_format.as_deref().map_or_else(LogFormat::from_env, LogFormat::parse);
    init_observability(format);

    let result = match cli.command {
        Commands::Keygen { out_dir } => commands::keygen(out_dir.as_deref()),
        Commands::Sign { config, method, url, headers, body, access_token } => commands::sign(
            &config,
            &commands::RequestArgs { method: &method, url: &url, headers: &headers, body: body.as_deref() },
            access_token.as_deref(),
        ),
        Commands::Verify { jwks, method, url, headers, body } => commands::verify(
            &jwks,
            &commands::RequestArgs { method: &method, url: &url, headers: &headers, body: body.as_deref() },
        ),
        Commands::VerifyHash { client_nonce, interact_nonce, interact_ref, auth_server_url, hash } => {
            Ok(commands::verify_hash(
                &client_nonce,
                &interact_nonce,
                &interact_ref,
                &auth_server_url,
                &hash,
            ))
        }
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
