mod config;
mod flash;
mod http;
mod views;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use platform_db::{DbPool, connect};
use platform_obs::{ObsConfig, init_tracing};
use products_hr::{EmployeeForm, HrModule};
use tracing::info;

use crate::{
    config::AppConfig,
    http::{AppState, ServeConfig},
    views::Views,
};

#[derive(Parser, Debug)]
#[command(name = "employee-server", version, about = "Employee records manager")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server.
    Serve(ServeCommand),
    /// Run database migrations.
    #[command(subcommand)]
    Migrate(MigrateCommand),
    /// Insert a few demo employees.
    Seed,
}

#[derive(Subcommand, Debug)]
enum MigrateCommand {
    /// Apply pending migrations.
    Up,
    /// Rollback the most recent migration.
    Down,
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, default_value = "127.0.0.1")]
    host: std::net::IpAddr,
    #[arg(long, default_value_t = 5000)]
    port: u16,
}

impl From<ServeCommand> for ServeConfig {
    fn from(value: ServeCommand) -> Self {
        ServeConfig::new(value.host, value.port)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(ObsConfig::default())?;
    let cli = Cli::parse();
    let app_config = Arc::new(AppConfig::load()?);
    match cli.command {
        Command::Serve(cmd) => run_server(cmd, app_config).await,
        Command::Migrate(action) => match action {
            MigrateCommand::Up => migrate_up(&app_config).await,
            MigrateCommand::Down => migrate_down(&app_config).await,
        },
        Command::Seed => run_seed(&app_config).await,
    }
}

async fn setup_pool(config: &AppConfig) -> Result<DbPool> {
    connect(&config.database).await.map_err(Into::into)
}

/// Creates the employees table when it is missing. Failure aborts startup.
async fn ensure_schema(pool: &DbPool) -> Result<()> {
    Migrator::up(pool, None)
        .await
        .context("failed to initialize employees schema")?;
    info!("employees schema ready");
    Ok(())
}

async fn run_server(cmd: ServeCommand, config: Arc<AppConfig>) -> Result<()> {
    let pool = setup_pool(&config).await?;
    ensure_schema(&pool).await?;
    let views = Views::new().context("failed to compile templates")?;
    let state = AppState {
        hr: HrModule::new(pool),
        views: Arc::new(views),
        config,
    };
    http::serve(cmd.into(), state).await
}

async fn run_seed(config: &AppConfig) -> Result<()> {
    let pool = setup_pool(config).await?;
    ensure_schema(&pool).await?;
    let hr = HrModule::new(pool);
    for (name, position, department, salary) in [
        ("Ada Lovelace", "Engineer", "Research", "98000"),
        ("Grace Hopper", "Director", "Engineering", "125000"),
        ("Alan Turing", "Analyst", "Research", "87000.50"),
    ] {
        let form = EmployeeForm {
            name: name.into(),
            position: position.into(),
            department: department.into(),
            salary: salary.into(),
        };
        let employee = hr.add_employee(&form).await?;
        info!(id = employee.id, name, "seeded employee");
    }
    Ok(())
}

async fn migrate_up(config: &AppConfig) -> Result<()> {
    let pool = setup_pool(config).await?;
    Migrator::up(&pool, None).await?;
    info!("database migrations applied");
    Ok(())
}

async fn migrate_down(config: &AppConfig) -> Result<()> {
    let pool = setup_pool(config).await?;
    Migrator::down(&pool, Some(1)).await?;
    info!("most recent migration rolled back");
    Ok(())
}
