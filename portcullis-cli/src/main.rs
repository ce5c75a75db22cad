use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Duration;
use clap::Parser;
use portcullis::{
    AccountGuard, AccountGuardConfig, CredentialRepositoryAdapter, Guard, JwtConfig,
    PortcullisBuilder, RepositoryProvider, SqliteRepositoryProvider,
};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command};

/// Shortest HS256 key accepted by `serve`.
const MIN_JWT_SECRET_LEN: usize = 32;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = guard_config(&cli);

    match cli.command {
        Command::Serve {
            listen,
            jwt_secret,
            jwt_issuer,
        } => {
            if jwt_secret.len() < MIN_JWT_SECRET_LEN {
                bail!("PORTCULLIS_JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} bytes");
            }

            let mut jwt = JwtConfig::new_hs256(jwt_secret.into_bytes());
            if let Some(issuer) = jwt_issuer {
                jwt = jwt.with_issuer(issuer);
            }

            let portcullis = PortcullisBuilder::new()
                .with_sqlite(&cli.database_url)
                .await?
                .with_guard_config(config)
                .with_jwt(jwt)
                .apply_migrations(true)
                .build()
                .await?;
            let portcullis = Arc::new(portcullis);

            let app = portcullis_axum::routes(portcullis.clone());
            let listener = tokio::net::TcpListener::bind(listen)
                .await
                .with_context(|| format!("failed to bind {listen}"))?;

            tracing::info!(address = %listen, "Listening");
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            portcullis.close().await;
            tracing::info!("Shut down");
        }
        Command::Migrate => {
            let provider = SqliteRepositoryProvider::connect(&cli.database_url).await?;
            provider.migrate().await?;
            provider.close().await;
            tracing::info!("Migrations applied");
        }
        command => {
            let provider = Arc::new(SqliteRepositoryProvider::connect(&cli.database_url).await?);
            provider.migrate().await?;

            let guard: Guard<SqliteRepositoryProvider> = AccountGuard::new(
                Arc::new(CredentialRepositoryAdapter::new(provider.clone())),
                config,
            );

            let result = run_admin_command(&guard, command).await;
            provider.close().await;
            result?;
        }
    }

    Ok(())
}

fn guard_config(cli: &Cli) -> AccountGuardConfig {
    AccountGuardConfig::default()
        .with_max_failed_attempts(cli.max_failed_attempts)
        .with_lockout_period(Duration::minutes(cli.lockout_minutes))
}

async fn run_admin_command(guard: &Guard<SqliteRepositoryProvider>, command: Command) -> Result<()> {
    match command {
        Command::Provision {
            identity,
            password,
            role,
        } => {
            let record = guard.provision_account(&identity, &password, role).await?;
            println!("provisioned {} ({})", record.identity, record.role);
        }
        Command::Block { identity, reason } => {
            guard
                .admin_set_blocked(&identity, true, reason.as_deref())
                .await?;
            println!("blocked {identity}");
        }
        Command::Unblock { identity } => {
            guard.admin_set_blocked(&identity, false, None).await?;
            println!("unblocked {identity}");
        }
        Command::ResetPassword { identity, password } => {
            guard.reset_password(&identity, &password).await?;
            println!("password reset for {identity}");
        }
        Command::Status { identity } => {
            let status = guard.account_status(&identity).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        other => bail!("not an account command: {other:?}"),
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
