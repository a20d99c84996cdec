use anyhow::{bail, Context, Result};
use banquet_core::storage::Storage;
use banquet_web::state::open_storage;
use banquet_web::{app_router, logging, AppState, Config};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "banquet-web")]
#[command(about = "Find My Banquet - banquet hall directory")]
struct Cli {
    /// Database path or libsql:// URL (overrides DATABASE_URL from config)
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run migrations and start the web server (default)
    Serve {
        /// Address to listen on
        #[arg(long, env = "BIND_ADDR")]
        bind: Option<String>,
    },
    /// Apply the database schema and exit
    Migrate,
    /// Delete every user, listing and enquiry
    ClearDatabase {
        /// Skip the confirmation guard
        #[arg(long)]
        yes: bool,
    },
    /// Delete one listing together with its images
    DeleteListing {
        /// Listing id
        id: i64,
    },
    /// Print call requests and contact messages, newest first
    Inbox,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }
    let _guard = logging::init_logging(&config.log_dir);

    match cli.command.unwrap_or(Commands::Serve { bind: None }) {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            serve(config).await?;
        }
        Commands::Migrate => {
            open_storage(&config).await?;
            println!("✅ Database schema is up to date");
        }
        Commands::ClearDatabase { yes } => {
            if !yes {
                bail!("Refusing to clear the database without --yes");
            }
            let storage = open_storage(&config).await?;
            storage.clear_all_data().await?;
            println!("🗑️  All data deleted");
        }
        Commands::DeleteListing { id } => {
            let storage = open_storage(&config).await?;
            if storage.delete_listing(id).await? {
                println!("🗑️  Listing {} and its images deleted", id);
            } else {
                bail!("Listing {} not found", id);
            }
        }
        Commands::Inbox => {
            let storage = open_storage(&config).await?;
            print_inbox(&storage).await?;
        }
    }

    Ok(())
}

async fn serve(config: Config) -> Result<()> {
    let bind_addr = config.bind_addr.clone();
    let state = AppState::from_config(config).await?;
    let app = app_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;

    info!("Web server listening on {}", bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn print_inbox(storage: &dyn Storage) -> Result<()> {
    let calls = storage.list_call_requests().await?;
    println!("📞 Call requests ({})", calls.len());
    for call in &calls {
        println!(
            "  #{} {} <{}> {} | {} {} | {}{}",
            call.id,
            call.name,
            call.email,
            call.phone,
            call.date,
            call.time_slot,
            call.reason.as_str(),
            call.notes.as_deref().map(|n| format!(" | {n}")).unwrap_or_default()
        );
    }

    let messages = storage.list_contact_messages().await?;
    println!("✉️  Contact messages ({})", messages.len());
    for message in &messages {
        println!(
            "  #{} {} <{}> [{}] {}",
            message.id,
            message.full_name,
            message.email,
            message.subject.label(),
            message.message
        );
    }
    Ok(())
}

