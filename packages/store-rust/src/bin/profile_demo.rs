//! `profile-demo`: walks one user profile through the request pipeline.
//!
//! Inserts a profile, persists it, applies an upsert under every version
//! conflict strategy and prints the stored fields after each step. With
//! `--watch` the profile stream is printed until Ctrl+C.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use futures_util::StreamExt;
use recordkit_core::{
    object_at, partition_results, sections_with_limit, IndexPath, Predicate, PureObject, Record,
    RequestError, RequestResult, ResultExt, Section, VersionConflictStrategy,
};
use recordkit_store::service::typed;
use recordkit_store::storage::MutationObserver;
use recordkit_store::{
    ChangeEvent, ChangeNotifier, ProcessorConfig, RequestProcessor, StoreConfig, StoreContext,
    StoreFactory, StreamController, StreamOptions,
};
use tracing_subscriber::EnvFilter;

const PLACEHOLDER: &str = "No information yet";
const LISTED_PROFILES: usize = 3;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "profile-demo", version, about = "recordkit user profile demo")]
struct Args {
    /// redb database file; in-memory store when omitted.
    #[arg(long, env = "RECORDKIT_DB")]
    db: Option<PathBuf>,

    /// JSON file with a store configuration; `--db` overrides its path.
    #[arg(long, env = "RECORDKIT_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Keep running and print profile stream events until Ctrl+C.
    #[arg(long)]
    watch: bool,
}

#[derive(Debug, Clone)]
struct UserProfile {
    id: String,
    name: String,
    email: Option<String>,
    version: u64,
}

impl PureObject for UserProfile {
    const ENTITY: &'static str = "userProfile";

    fn to_record(&self) -> Record {
        Record::new(Self::ENTITY, &self.id)
            .with_version(self.version)
            .with_field("name", self.name.as_str())
            .with_field("email", self.email.clone())
    }

    fn from_record(record: &Record) -> anyhow::Result<Self> {
        Ok(Self {
            id: record.key.clone(),
            name: record.require_str("name")?.to_string(),
            email: record
                .field("email")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            version: record.version,
        })
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn store_config(args: &Args) -> anyhow::Result<StoreConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("invalid store config in {}", path.display()))?
        }
        None => StoreConfig::default(),
    };
    if let Some(db) = &args.db {
        config = StoreConfig {
            auto_persist_interval_ms: config.auto_persist_interval_ms,
            mutation_queue_capacity: config.mutation_queue_capacity,
            ..StoreConfig::durable(db)
        };
    }
    Ok(config)
}

async fn print_profile(step: &str, processor: &RequestProcessor, id: &str) {
    let fetched = processor
        .fetch_all::<UserProfile, _>(Ok(()), Some(Predicate::key_in([id])), Vec::new())
        .await;
    let profile: RequestResult<UserProfile> = fetched.and_then(|items| {
        items.into_iter().next().unwrap_or_else(|| {
            Err(RequestError::Processor(anyhow::anyhow!("profile {id} not found")))
        })
    });
    let rendered = profile.map(|p| {
        format!(
            "{} <{}> v{}",
            p.name,
            p.email.as_deref().unwrap_or(PLACEHOLDER),
            p.version
        )
    });
    println!("[{step}] {}", rendered.display_or(PLACEHOLDER));
}

/// Prints rejected items and hands the accepted ones to the next stage.
fn report<T>(step: &str, outcome: RequestResult<Vec<RequestResult<T>>>) -> RequestResult<Vec<T>> {
    let (accepted, rejected) = partition_results(outcome.inspect_err(|err| {
        println!("[{step}] failed: {err}");
    })?);
    for err in &rejected {
        println!("[{step}] rejected: {err}");
    }
    Ok(accepted)
}

fn print_window(sections: Vec<Section<UserProfile>>) {
    let count: usize = sections.iter().map(Section::len).sum();
    let listed = sections_with_limit(sections, LISTED_PROFILES);
    let first = object_at(&listed, IndexPath::new(0, 0)).map_or(PLACEHOLDER, |p| p.name.as_str());
    println!("[stream] didLoad ({count} profiles, first: {first})");
    for profile in listed.iter().flat_map(|s| s.objects.iter()) {
        println!("[stream]   {} v{}", profile.id, profile.version);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    let processor_config = ProcessorConfig::default();
    let notifier = Arc::new(ChangeNotifier::new(processor_config.event_channel_capacity));
    let config = store_config(&args)?;
    let adapter = StoreFactory::new(config.clone())
        .with_observer(notifier.clone() as Arc<dyn MutationObserver>)
        .create()?;
    let context = Arc::new(StoreContext::new(Arc::new(adapter), &config));
    let processor = RequestProcessor::new(context, processor_config);

    let watcher = if args.watch {
        let controller = StreamController::new(processor.clone(), notifier);
        let (mut stream, _cursor) =
            controller.watch(StreamOptions::new(UserProfile::ENTITY), typed::<UserProfile>());
        Some(tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                match event {
                    Ok(ChangeEvent::DidLoad(sections)) => print_window(sections),
                    Ok(event) => println!("[stream] {}", event.kind()),
                    Err(err) => println!("[stream] error: {err}"),
                }
            }
        }))
    } else {
        None
    };

    let id = "user-1";
    print_profile("empty store", &processor, id).await;

    let inserted = processor
        .save_to_memory(Ok(vec![UserProfile {
            id: id.to_string(),
            name: "Ada".to_string(),
            email: None,
            version: 1,
        }]))
        .await;
    let inserted = report("insert", inserted);
    let persisted = processor.persist_to_store(inserted).await;
    if let Err(err) = &persisted {
        println!("[persist] failed: {err}");
    }
    print_profile("inserted", &processor, id).await;

    let steps = [
        ("error, same version", VersionConflictStrategy::Error, 1, "Ada Lovelace"),
        ("error, stale version", VersionConflictStrategy::Error, 1, "A. Lovelace"),
        ("overwrite", VersionConflictStrategy::Overwrite, 1, "Augusta Ada King"),
        ("take preferable, stale", VersionConflictStrategy::TakePreferable, 1, "Ada"),
    ];
    for (step, strategy, version, name) in steps {
        let edit = UserProfile {
            id: id.to_string(),
            name: name.to_string(),
            email: Some("ada@example.org".to_string()),
            version,
        };
        let outcome = processor.upsert_in_memory(Ok(vec![edit]), strategy).await;
        let _ = report(step, outcome);
        print_profile(step, &processor, id).await;
    }

    processor
        .persist_to_store(Ok(()))
        .await
        .context("final persist failed")?;

    if let Some(watcher) = watcher {
        println!("watching {}; press Ctrl+C to stop", UserProfile::ENTITY);
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl+C")?;
        watcher.abort();
    }

    tracing::info!("demo finished");
    Ok(())
}
