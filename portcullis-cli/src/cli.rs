use std::net::SocketAddr;

use clap::{Parser, Subcommand};
use portcullis::{MAX_LOCKOUT_MINUTES, Role};

#[derive(Debug, Parser)]
#[command(author, version, about = "CTF platform account guard", long_about = None)]
pub struct Cli {
    /// SQLite connection URL
    #[arg(
        long,
        global = true,
        env = "PORTCULLIS_DATABASE_URL",
        default_value = "sqlite://portcullis.db"
    )]
    pub database_url: String,

    /// Consecutive failed logins before an account is locked
    #[arg(
        long,
        global = true,
        env = "PORTCULLIS_MAX_FAILED_ATTEMPTS",
        default_value_t = 5,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_failed_attempts: u32,

    /// How long a lockout lasts, in minutes
    #[arg(
        long,
        global = true,
        env = "PORTCULLIS_LOCKOUT_MINUTES",
        default_value_t = 15,
        value_parser = clap::value_parser!(i64).range(1..=MAX_LOCKOUT_MINUTES)
    )]
    pub lockout_minutes: i64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API
    Serve {
        #[arg(long, env = "PORTCULLIS_LISTEN", default_value = "127.0.0.1:3000")]
        listen: SocketAddr,

        /// HS256 signing key for access tokens
        #[arg(long, env = "PORTCULLIS_JWT_SECRET", hide_env_values = true)]
        jwt_secret: String,

        /// Value of the `iss` claim
        #[arg(long, env = "PORTCULLIS_JWT_ISSUER")]
        jwt_issuer: Option<String>,
    },
    /// Apply pending schema migrations
    Migrate,
    /// Create an account
    Provision {
        identity: String,
        #[arg(long, env = "PORTCULLIS_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, default_value = "user", value_parser = parse_role)]
        role: Role,
    },
    /// Block an account until an administrator unblocks it
    Block {
        identity: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Lift an administrative block
    Unblock { identity: String },
    /// Replace an account's password and clear any lockout
    ResetPassword {
        identity: String,
        #[arg(long, env = "PORTCULLIS_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Print the lockout and block status of an account as JSON
    Status { identity: String },
}

fn parse_role(value: &str) -> Result<Role, String> {
    value.parse::<Role>().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_provision() {
        let cli = Cli::try_parse_from([
            "portcullis",
            "provision",
            "admin@ctf.example",
            "--password",
            "correct-horse-battery",
            "--role",
            "admin",
        ])
        .unwrap();

        match cli.command {
            Command::Provision { identity, role, .. } => {
                assert_eq!(identity, "admin@ctf.example");
                assert_eq!(role, Role::Admin);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.max_failed_attempts, 5);
        assert_eq!(cli.lockout_minutes, 15);
    }

    #[test]
    fn test_rejects_unknown_role() {
        let result = Cli::try_parse_from([
            "portcullis",
            "provision",
            "someone@ctf.example",
            "--password",
            "correct-horse-battery",
            "--role",
            "root",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_out_of_range_lockout() {
        for minutes in ["0", "-5", "200000000000"] {
            let result = Cli::try_parse_from([
                "portcullis",
                "migrate",
                "--lockout-minutes",
                minutes,
            ]);
            assert!(result.is_err(), "accepted --lockout-minutes {minutes}");
        }

        let cli = Cli::try_parse_from([
            "portcullis",
            "migrate",
            "--lockout-minutes",
            &MAX_LOCKOUT_MINUTES.to_string(),
        ])
        .unwrap();
        assert_eq!(cli.lockout_minutes, MAX_LOCKOUT_MINUTES);
    }

    #[test]
    fn test_rejects_zero_failed_attempts() {
        let result = Cli::try_parse_from(["portcullis", "migrate", "--max-failed-attempts", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "portcullis",
            "status",
            "player@ctf.example",
            "--database-url",
            "sqlite::memory:",
            "--max-failed-attempts",
            "3",
        ])
        .unwrap();

        assert_eq!(cli.database_url, "sqlite::memory:");
        assert_eq!(cli.max_failed_attempts, 3);
    }
}
