//! Walks the Students / Class_of_83 scenario against a server or the
//! in-memory store.

use clap::Parser;
use mongo_manager::prelude::*;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

const DATABASE: &str = "Students";
const COLLECTION: &str = "Class_of_83";

#[derive(Debug, Parser)]
#[command(name = "mongo-manager-demo", about = "Run the Class_of_83 walkthrough")]
struct Args {
    /// Server host. Overrides the config file and MONGO_MANAGER_HOST.
    #[arg(long)]
    host: Option<String>,

    /// Server port.
    #[arg(long)]
    port: Option<u16>,

    /// Per-operation timeout in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// JSON file with client options.
    #[arg(long, value_name = "PATH")]
    config: Option<String>,

    /// Use the in-memory store instead of a server.
    #[arg(long)]
    memory: bool,

    /// Leave the collection and database in place at the end.
    #[arg(long)]
    keep: bool,
}

impl Args {
    fn client_options(&self) -> Result<ClientOptions> {
        let mut options = match &self.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .map_err(|e| Error::configuration(format!("cannot read {path}: {e}")))?;
                ClientOptions::from_json(&json)?
            }
            None => ClientOptions::from_env()?,
        };
        if let Some(host) = &self.host {
            options.host = host.clone();
        }
        if let Some(port) = self.port {
            options.port = port;
        }
        if let Some(timeout) = self.timeout_ms {
            options.timeout_ms = timeout;
        }
        options.app_name.get_or_insert_with(|| "mongo-manager-demo".to_string());
        options.validate()?;
        Ok(options)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args = Args::parse();
    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_fatal() => {
            error!(error = %e, "stopping");
            ExitCode::from(2)
        }
        Err(e) => {
            error!(error = %e, kind = ?e.kind(), "demo failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> Result<()> {
    let options = args.client_options()?;
    let manager = if args.memory {
        info!("using the in-memory store");
        Manager::with_store(options, Arc::new(MemoryStore::new()))
    } else {
        Manager::connect(options).await?
    };

    let result = scenario(&manager, args.keep).await;
    manager.close().await?;
    result
}

async fn scenario(manager: &Manager, keep: bool) -> Result<()> {
    let db = manager.create_database(DATABASE).await?;
    let class = db.collection_with_doc(COLLECTION)?;

    let john = class.insert_one(doc! { "name": "John", "age": 25 }).await?;
    info!(id = %john.inserted_id, "inserted John");

    let others = class
        .insert_many(vec![
            doc! { "name": "Alice", "age": 30 },
            doc! { "name": "Bob", "age": 28 },
        ])
        .await?;
    info!(count = others.inserted_ids.len(), "inserted Alice and Bob");

    let deleted = class.delete_one(doc! { "name": "John" }).await?;
    info!(deleted = deleted.deleted_count, "deleted John");

    let deleted = class.delete_many(doc! { "age": { "$lt": 30 } }).await?;
    info!(deleted = deleted.deleted_count, "deleted everyone under 30");

    let updated = class
        .update_one(doc! { "name": "Alice" }, doc! { "age": 31 })
        .await?;
    info!(modified = updated.modified_count, "updated Alice");

    let updated = class
        .update_many(doc! { "age": { "$lt": 30 } }, doc! { "status": "Young" })
        .await?;
    info!(matched = updated.matched_count, "marked everyone under 30 as Young");

    for student in class.find(None).await? {
        let json = serde_json::to_string(&student)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        println!("{json}");
    }

    if keep {
        info!(db = DATABASE, collection = COLLECTION, "keeping data");
        return Ok(());
    }
    db.drop_collection(COLLECTION).await?;
    manager.drop_database(DATABASE).await?;
    Ok(())
}
