//! Reactive Actions CLI Binary
//!
//! Loads configuration, opens the configured tracking store and either prints the
//! effective configuration, checks the store, or runs a small invalidation demo.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use parking_lot::Mutex;
use reactive_actions::config::{ConfigLoader, ReactiveConfig, StoreBackend};
use reactive_actions::filter_params;
use reactive_actions::logging::init_logging;
use reactive_actions::{
    Action, ActionBroker, ActionDescriptor, ActionError, ActionExecutor,
    ActionResultUpdateHandler, DescriptorValue, ExecutionContext, Model, ModelChange,
    ModelFilter, TrackingSessionStore,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{error, info};

/// Reactive Actions - track action results and invalidate them on model updates
#[derive(Parser)]
#[command(name = "reactive-actions")]
#[command(about = "Reactive query invalidation for server-side actions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory searched for reactive-actions.toml
    #[arg(long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    log_level: Option<String>,

    /// Tracking store backend
    #[arg(long, value_enum)]
    backend: Option<Backend>,

    /// Redis URL, implies the redis backend
    #[arg(long)]
    redis_url: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    Memory,
    Redis,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration as TOML
    Config,
    /// Connect to the configured store and exit
    CheckStore,
    /// Track a query in a session, update the model and report the invalidation
    Demo {
        /// Tracking session used for the demo
        #[arg(long, default_value = "demo-session")]
        session: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            process::exit(1);
        }
    };

    if let Err(e) = init_logging(Some(&config.logging)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    if let Err(e) = run(&cli, config).await {
        error!("Command failed: {:#}", e);
        eprintln!("{:#}", e);
        process::exit(1);
    }
}

/// Config file and environment first, CLI arguments override
fn load_config(cli: &Cli) -> Result<ReactiveConfig> {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => ConfigLoader::load(&cli.workspace)?,
    };

    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    match cli.backend {
        Some(Backend::Memory) => config.store.backend = StoreBackend::Memory,
        Some(Backend::Redis) => config.store.backend = StoreBackend::Redis,
        None => {}
    }
    if let Some(url) = &cli.redis_url {
        config.store.backend = StoreBackend::Redis;
        config.store.redis.url = url.clone();
    }

    config.validate().map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        anyhow!("invalid configuration: {}", messages.join("; "))
    })?;
    Ok(config)
}

async fn run(cli: &Cli, config: ReactiveConfig) -> Result<()> {
    match &cli.command {
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::CheckStore => {
            config.store.open().await?;
            info!(backend = ?config.store.backend, "Tracking store reachable");
            println!("ok");
            Ok(())
        }
        Commands::Demo { session } => run_demo(&config, session).await,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Foo {
    id: i32,
    name: String,
}

impl Model for Foo {
    const MODEL_TYPE: &'static str = "Foo";
}

#[derive(Serialize, Deserialize)]
struct FooById {
    id: i32,
}

impl ActionDescriptor for FooById {
    const TYPE_NAME: &'static str = "FooById";

    fn combined_identifier(&self) -> String {
        self.id.to_string()
    }
}

#[derive(Serialize, Deserialize)]
struct SetFooName {
    id: i32,
    name: String,
}

impl ActionDescriptor for SetFooName {
    const TYPE_NAME: &'static str = "SetFooName";

    fn combined_identifier(&self) -> String {
        format!("{}:{}", self.id, self.name)
    }
}

type FooTable = Arc<Mutex<BTreeMap<i32, Foo>>>;

/// Prints every invalidation it receives
struct PrintingUpdateHandler;

#[async_trait]
impl ActionResultUpdateHandler for PrintingUpdateHandler {
    async fn on_result_changed(
        &self,
        tracking_session: &str,
        action: &Action,
        descriptor: Option<&DescriptorValue>,
    ) -> Result<(), ActionError> {
        println!(
            "[{}] result of {}({}) changed",
            tracking_session,
            action.name(),
            descriptor.map(|d| d.fields().to_string()).unwrap_or_default()
        );
        Ok(())
    }

    async fn on_result_item_changed(
        &self,
        tracking_session: &str,
        action: &Action,
        _descriptor: Option<&DescriptorValue>,
        change: &ModelChange<'_>,
    ) -> Result<(), ActionError> {
        println!(
            "[{}] item of {} changed: {:?} -> {:?}",
            tracking_session,
            action.name(),
            change.before::<Foo>().map(|f| &f.name),
            change.after::<Foo>().map(|f| &f.name)
        );
        Ok(())
    }
}

fn build_executor(
    config: &ReactiveConfig,
    table: FooTable,
    store: Arc<dyn TrackingSessionStore>,
) -> Result<ActionExecutor> {
    let get_table = Arc::clone(&table);
    let list_table = Arc::clone(&table);
    let rename_table = table;

    let mut builder = ActionExecutor::builder();
    builder
        .store(store)
        .apply_config(&config.executor)
        .add_model_filter(ModelFilter::new("ById", |foo: &Foo, id: i32| foo.id == id))?
        .add_model_filter(ModelFilter::new("All", |_: &Foo| true))?
        .add_action(Action::reactive::<Foo, _, _, _>(
            "GetFooById",
            move |ctx: ExecutionContext, descriptor: Option<DescriptorValue>| {
                let table = Arc::clone(&get_table);
                async move {
                    let FooById { id } = descriptor
                        .ok_or_else(|| ActionError::InvalidDescriptor("missing FooById".to_string()))?
                        .decode()?;
                    let foo = table.lock().get(&id).cloned();
                    ctx.track_entity_query(foo, "ById", filter_params![id])
                }
            },
        )?)?
        .add_action(Action::reactive_collection::<Foo, _, _, _>(
            "ListFoos",
            move |ctx: ExecutionContext, _: Option<DescriptorValue>| {
                let table = Arc::clone(&list_table);
                async move {
                    let foos: Vec<Foo> = table.lock().values().cloned().collect();
                    ctx.track_collection_query::<Foo, _>(foos, "All", filter_params![])
                }
            },
        )?)?
        .add_action(Action::new(
            "SetFooName",
            move |ctx: ExecutionContext, descriptor: Option<DescriptorValue>| {
                let table = Arc::clone(&rename_table);
                async move {
                    let SetFooName { id, name } = descriptor
                        .ok_or_else(|| ActionError::InvalidDescriptor("missing SetFooName".to_string()))?
                        .decode()?;
                    let (old, updated) = {
                        let mut table = table.lock();
                        let entry = table
                            .get_mut(&id)
                            .ok_or_else(|| ActionError::Execution(format!("no Foo with id {}", id)))?;
                        let old = entry.clone();
                        entry.name = name;
                        (old, entry.clone())
                    };
                    ctx.track_entity_changed(&updated, &old).await
                }
            },
        )?)?
        .add_update_handler("print", Arc::new(PrintingUpdateHandler))?;
    Ok(builder.build())
}

async fn run_demo(config: &ReactiveConfig, session: &str) -> Result<()> {
    let table: FooTable = Arc::new(Mutex::new(BTreeMap::from([
        (1, Foo { id: 1, name: "first".to_string() }),
        (2, Foo { id: 2, name: "second".to_string() }),
    ])));
    let store = config.store.open().await?;
    let broker = ActionBroker::new(build_executor(config, table, store)?);

    let foo: Option<Foo> = broker
        .invoke_and_track_action_as(
            session,
            "GetFooById",
            Some(DescriptorValue::encode(&FooById { id: 1 })?),
        )
        .await?;
    println!("GetFooById(1) -> {:?}", foo);

    let foos: Vec<Foo> = broker
        .invoke_and_track_action_as(session, "ListFoos", None)
        .await?;
    println!("ListFoos -> {} items", foos.len());

    broker
        .invoke_action(
            "SetFooName",
            Some(DescriptorValue::encode(&SetFooName {
                id: 1,
                name: "renamed".to_string(),
            })?),
        )
        .await?;

    broker.unregister_session(session).await?;
    info!(session, "Demo finished");
    Ok(())
}
