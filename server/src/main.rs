use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use crm_server::{
    config::AppConfig,
    graphql::{self, GraphqlData},
    http::{self, AppState},
    import,
    insights::HttpTextGenerator,
    seed,
};
use migration::{Migrator, MigratorTrait};
use platform_db::{DatabaseSettings, DbPool, connect};
use platform_obs::{ObsConfig, init_tracing};
use tracing::info;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "crm-server", version, about = "Multi-tenant CRM backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP + GraphQL server.
    Serve {
        #[arg(long, env = "BIND", default_value = "127.0.0.1:8080")]
        bind: SocketAddr,
        #[arg(long, help = "Allow starting even when migrations are pending")]
        allow_dirty: bool,
    },
    /// Run database migrations.
    Migrate {
        #[arg(long, value_enum, default_value_t = MigrateAction::Up)]
        action: MigrateAction,
    },
    /// Seed a demo organization with sample records.
    Seed,
    /// Print the GraphQL schema.
    #[command(name = "schema:print")]
    SchemaPrint {
        #[arg(long, value_name = "FILE", help = "Write to a file instead of stdout")]
        output: Option<PathBuf>,
    },
    /// Import a JSON array of exported documents into an organization.
    Import {
        #[arg(long)]
        org: Uuid,
        /// `customers` or `artifacts/{appId}/users/{userId}/customers`.
        #[arg(long)]
        path: String,
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum MigrateAction {
    Up,
    Down,
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let _guard = init_tracing(ObsConfig::from_env("crm-server"))?;
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind, allow_dirty } => run_server(bind, allow_dirty).await,
        Command::Migrate { action } => migrate(action).await,
        Command::Seed => {
            let pool = setup_pool().await?;
            let seeded = seed::seed_demo(&pool).await?;
            info!(
                organization_id = %seeded.organization_id,
                created = seeded.created,
                login = seed::DEMO_OWNER_EMAIL,
                "seed finished"
            );
            Ok(())
        }
        Command::SchemaPrint { output } => schema_print(output),
        Command::Import { org, path, file } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let pool = setup_pool().await?;
            let summary = import::import_documents(&pool, org, &path, &json).await?;
            println!("imported {} {}", summary.imported, summary.collection);
            Ok(())
        }
    }
}

fn schema_print(output: Option<PathBuf>) -> Result<()> {
    let sdl = graphql::schema_sdl();
    match output {
        Some(path) => {
            std::fs::write(&path, sdl).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "schema written");
        }
        None => println!("{sdl}"),
    }
    Ok(())
}

async fn setup_pool() -> Result<DbPool> {
    let settings = DatabaseSettings::from_env();
    connect(&settings).await.map_err(Into::into)
}

async fn run_server(bind: SocketAddr, allow_dirty: bool) -> Result<()> {
    let config = AppConfig::load()?;
    let pool = setup_pool().await?;
    ensure_migrations(&pool, allow_dirty).await?;

    let auth = Arc::new(config.auth.clone());
    let generator = HttpTextGenerator::new(config.generator.clone())?;
    let schema = graphql::build_schema(GraphqlData {
        db: pool.clone(),
        auth: auth.clone(),
        generator: Arc::new(generator),
        dashboard_offset: config.dashboard_offset,
    });
    let state = AppState {
        db: pool,
        schema,
        auth,
        cors_allowed_origins: Arc::new(config.cors_allowed_origins),
    };
    http::serve(bind, state).await
}

async fn ensure_migrations(pool: &DbPool, allow_dirty: bool) -> Result<()> {
    let pending = Migrator::get_pending_migrations(pool).await?;
    if !pending.is_empty() && !allow_dirty {
        bail!(
            "{} pending migrations; run `crm-server migrate` or pass --allow-dirty",
            pending.len()
        );
    }
    Ok(())
}

async fn migrate(action: MigrateAction) -> Result<()> {
    let pool = setup_pool().await?;
    match action {
        MigrateAction::Up => Migrator::up(&pool, None).await?,
        MigrateAction::Down => Migrator::down(&pool, Some(1)).await?,
        MigrateAction::Reset => Migrator::reset(&pool).await?,
    }
    info!(?action, "migrations finished");
    Ok(())
}
