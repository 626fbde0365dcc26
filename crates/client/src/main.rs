//! PetAdmin command line client
//!
//! Drives the data-access layer against a live backend: sign in, browse
//! players/pets/items/shop listings with search, filters, sorting and
//! pagination, and run the admin mutations.
//!
//! ## Configuration (env)
//!
//! | Key                       | Default                     |
//! |---------------------------|-----------------------------|
//! | `PETADMIN_API_URL`        | `http://localhost:8080/api` |
//! | `PETADMIN_PAGE_SIZE`      | `10`                        |
//! | `PETADMIN_FLASH_TTL_SECS` | `15`                        |
//! | `PETADMIN_DATA_DIR`       | platform config dir         |
//! | `RUST_LOG`                | `petadmin_client=info`      |

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use petadmin_client::{
    logging,
    notify::{report, NotificationKind},
    storage::{FileStore, KeyValueStore, MemoryStore},
    ApiClient, AuthSession, ClientConfig, ListController, NotificationBridge, Repository,
    ResourceCache, SortSpec,
};
use petadmin_shared::{ApiError, RecordId, ResourceKind};
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "petadmin", about = "PetAdmin dashboard client", version)]
struct Args {
    /// Backend base URL
    #[arg(long, env = "PETADMIN_API_URL")]
    api_url: Option<String>,

    /// Where the token and flash messages are stored
    #[arg(long, env = "PETADMIN_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the token
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "PETADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored token
    Logout,
    /// Show the signed-in admin
    Whoami,
    /// List records of a kind
    List {
        kind: ResourceKind,
        /// Case-insensitive substring search
        #[arg(long)]
        search: Option<String>,
        /// `field=value`; repeatable. `level=low|medium|high`, `price=10..100`
        #[arg(long = "filter")]
        filters: Vec<String>,
        /// `field` or `field:asc|desc`
        #[arg(long)]
        sort: Option<SortSpec>,
        /// 0-based page index
        #[arg(long, default_value_t = 0)]
        page: u64,
        #[arg(long)]
        size: Option<u64>,
    },
    /// Fetch one record
    Get { kind: ResourceKind, id: RecordId },
    /// Create a record from a JSON body
    Create {
        kind: ResourceKind,
        #[arg(long)]
        json: String,
    },
    /// Update a record from a JSON body
    Update {
        kind: ResourceKind,
        id: RecordId,
        #[arg(long)]
        json: String,
    },
    /// Delete a record
    Delete { kind: ResourceKind, id: RecordId },
    /// Ban a player
    Ban { id: RecordId },
    /// Lift a player ban
    Unban { id: RecordId },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let args = Args::parse();
    let mut config = ClientConfig::from_env();
    if let Some(url) = args.api_url {
        config.api_url = url.trim_end_matches('/').to_string();
    }
    if let Some(dir) = args.data_dir {
        config.data_dir = Some(dir);
    }

    let store = open_store(&config);
    let session = AuthSession::new(store.clone());
    let bridge = NotificationBridge::with_flash_ttl(store, config.flash_ttl);
    let client = Arc::new(ApiClient::from_config(&config, session.clone())?);
    let cache = Arc::new(ResourceCache::with_ttl(config.cache_ttl));
    let repo = Repository::new(client.clone(), cache);

    // Whatever the previous command left behind.
    if let Some(flash) = bridge.mount() {
        eprintln!("[{}] {}", kind_label(flash.kind), flash.message);
    }

    let signing_in = matches!(args.command, Command::Login { .. });
    let result = run(args.command, &config, &session, &bridge, &client, repo).await;
    if let Err(err) = &result {
        let rejected = err.downcast_ref::<ApiError>().is_some_and(ApiError::is_unauthorized);
        if rejected && !signing_in {
            session.logout();
            eprintln!("Session missing or expired; sign in again with `petadmin login`.");
        }
    }
    result
}

async fn run(
    command: Command,
    config: &ClientConfig,
    session: &AuthSession,
    bridge: &NotificationBridge,
    client: &ApiClient,
    repo: Repository,
) -> Result<()> {
    match command {
        Command::Login { username, password } => {
            let profile = client.login(&username, &password).await?;
            print_json(&json!({ "signedIn": profile.username }))
        }
        Command::Logout => {
            client.logout();
            print_json(&json!({ "signedIn": null }))
        }
        Command::Whoami => {
            require_session(session)?;
            print_json(&serde_json::to_value(session.profile().unwrap_or_default())?)
        }
        Command::List {
            kind,
            search,
            filters,
            sort,
            page,
            size,
        } => {
            require_session(session)?;
            let mut list = ListController::from_config(kind, repo, config);
            if let Some(size) = size {
                list.set_page_size(size);
            }
            if let Some(term) = search {
                list.set_search(term);
            }
            for raw in &filters {
                let (name, value) = raw
                    .split_once('=')
                    .with_context(|| format!("filter `{raw}` is not field=value"))?;
                list.set_filter(name.trim(), value);
            }
            list.set_sort(sort);
            list.set_page(page);
            list.refresh().await;

            let Some(view) = list.view() else {
                match list.error() {
                    Some(err) => return Err(err.clone().into()),
                    None => bail!("no data for {kind}"),
                }
            };
            if let Some(err) = list.error() {
                eprintln!("warning: showing cached data, refresh failed: {err}");
            }
            let records: Vec<Value> = view.page.iter().map(|r| r.to_value()).collect();
            print_json(&json!({
                "records": records,
                "pagination": view.pagination,
            }))
        }
        Command::Get { kind, id } => {
            require_session(session)?;
            let record = repo.get(kind, id).await?;
            print_json(&record.to_value())
        }
        Command::Create { kind, json } => {
            require_session(session)?;
            let body = parse_body(&json)?;
            let record = finish(repo.create(kind, body).await, bridge, &format!("Created {kind}"))?;
            print_json(&record.to_value())
        }
        Command::Update { kind, id, json } => {
            require_session(session)?;
            let body = parse_body(&json)?;
            let record = finish(
                repo.update(kind, id, body).await,
                bridge,
                &format!("Updated {kind} #{id}"),
            )?;
            print_json(&record.to_value())
        }
        Command::Delete { kind, id } => {
            require_session(session)?;
            finish(repo.delete(kind, id).await, bridge, &format!("Deleted {kind} #{id}"))?;
            print_json(&json!({ "deleted": id }))
        }
        Command::Ban { id } => {
            require_session(session)?;
            finish(repo.ban_player(id).await, bridge, &format!("Banned player #{id}"))?;
            print_json(&json!({ "banned": id }))
        }
        Command::Unban { id } => {
            require_session(session)?;
            finish(repo.unban_player(id).await, bridge, &format!("Unbanned player #{id}"))?;
            print_json(&json!({ "unbanned": id }))
        }
    }
}

/// Report a mutation and leave the message for the next invocation.
fn finish<T>(outcome: Result<T, ApiError>, bridge: &NotificationBridge, success_msg: &str) -> Result<T> {
    let outcome = report(outcome, bridge, success_msg);
    if let Some(shown) = bridge.current() {
        bridge.persist(shown.message, shown.kind);
    }
    Ok(outcome?)
}

fn open_store(config: &ClientConfig) -> Arc<dyn KeyValueStore> {
    match config.data_dir.clone().map(FileStore::new).or_else(FileStore::in_config_dir) {
        Some(store) => {
            tracing::debug!(dir = %store.dir().display(), "using file store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("no config directory; token will not be kept between runs");
            Arc::new(MemoryStore::new())
        }
    }
}

fn require_session(session: &AuthSession) -> Result<(), ApiError> {
    if session.is_authenticated() {
        Ok(())
    } else {
        Err(ApiError::Unauthenticated)
    }
}

fn parse_body(raw: &str) -> Result<Value> {
    let body: Value = serde_json::from_str(raw).context("--json is not valid JSON")?;
    if !body.is_object() {
        bail!("--json must be a JSON object");
    }
    Ok(body)
}

fn kind_label(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::Success => "ok",
        NotificationKind::Error => "error",
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
