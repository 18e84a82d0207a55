use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dynalinq::cache::{KeyValueTableCacheFactory, MemoryCache};
use dynalinq::config::Config;
use dynalinq::demo::{
    game_scores_table, movies_table, seed_game_scores, seed_movies, GameScore, Movie,
    GAME_SCORES, MOVIES,
};
use dynalinq::query::{field, QueryDescription};
use dynalinq::storage::{InMemoryStore, RetryingStore};
use dynalinq::{DataContext, Value};
use dynalinq_core::cache::{Cache, CacheEvent};
use dynalinq_core::store::DocumentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StoreBackend {
    Memory,
    Dynamodb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CacheBackend {
    Memory,
    Redis,
}

/// dynalinq - typed, cached queries over DynamoDB-style tables
#[derive(Parser, Debug)]
#[command(name = "dynalinq")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Document store to run against
    #[arg(long, value_enum, default_value = "memory", env = "DYNALINQ_STORE")]
    store: StoreBackend,

    /// Cache backend
    #[arg(long, value_enum, default_value = "memory", env = "DYNALINQ_CACHE")]
    cache: CacheBackend,

    /// Print the access path of each query
    #[arg(long)]
    explain: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dynalinq=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let store = Arc::new(RetryingStore::new(
        connect_store(cli.store, &config).await?,
        config.throughput_retries,
        config.throughput_backoff(),
    ));
    let caches = KeyValueTableCacheFactory::new(
        connect_cache(cli.cache, &config).await?,
        config.event_channel_capacity,
    );
    let ctx = DataContext::new(store, Arc::new(caches));

    let mut events = ctx.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let CacheEvent::Hit { table, detail } = event {
                tracing::info!(%table, %detail, "Served from cache");
            }
        }
    });

    ctx.declare_table(game_scores_table(true), seed_game_scores)
        .await?;
    ctx.declare_table(movies_table(config.cache_ttl()), seed_movies)
        .await?;

    run_game_scores(&ctx, cli.explain).await?;
    run_movies(&ctx).await?;

    tracing::info!("Done");
    Ok(())
}

async fn connect_store(backend: StoreBackend, config: &Config) -> Result<Arc<dyn DocumentStore>> {
    match backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryStore::new())),
        #[cfg(feature = "dynamodb")]
        StoreBackend::Dynamodb => {
            let store = dynalinq::storage::DynamoDbStore::connect(
                config.dynamodb_endpoint_url.as_deref(),
                &config.aws_region,
            )
            .await;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "dynamodb"))]
        StoreBackend::Dynamodb => {
            let _ = config;
            anyhow::bail!("built without the `dynamodb` feature")
        }
    }
}

async fn connect_cache(backend: CacheBackend, config: &Config) -> Result<Arc<dyn Cache>> {
    match backend {
        CacheBackend::Memory => Ok(Arc::new(MemoryCache::new(config.cache_max_entries))),
        #[cfg(feature = "redis")]
        CacheBackend::Redis => Ok(Arc::new(
            dynalinq::cache::RedisCache::new(&config.redis_url).await?,
        )),
        #[cfg(not(feature = "redis"))]
        CacheBackend::Redis => anyhow::bail!("built without the `redis` feature"),
    }
}

async fn run_game_scores(ctx: &DataContext, explain: bool) -> Result<()> {
    let scores = ctx.table::<GameScore>(GAME_SCORES).await?;
    let high_scores = QueryDescription::new()
        .filter(field("GameTitle").eq("Starship X"))
        .filter(field("TopScore").gt(30))
        .order_by_desc("TopScore");

    if explain {
        println!("plan: {}", scores.explain(&high_scores)?);
    }
    for score in scores.to_vec(&high_scores).await? {
        println!("{} scored {} in {}", score.user_id, score.top_score, score.game_title);
    }
    // Second run is answered by the cache.
    let again = scores.to_vec(&high_scores).await?;
    println!("cached rows: {}", again.len());

    scores
        .modify(&[Value::from("101"), Value::from("Starship X")], |s| {
            s.wins += 1
        })
        .await?;
    ctx.submit_changes().await?;
    Ok(())
}

async fn run_movies(ctx: &DataContext) -> Result<()> {
    let movies = ctx.table::<Movie>(MOVIES).await?;
    let alien = movies.find(&[Value::from("Alien"), Value::from(1979)]).await?;
    println!(
        "{} ({}) directed by {}",
        alien.name,
        alien.year,
        alien
            .details
            .as_ref()
            .map(|d| d.director.as_str())
            .unwrap_or("unknown")
    );

    if let Err(error) = movies.find(&[Value::from("Alien")]).await {
        println!("find by name only: {error}");
    }

    let count = movies
        .count(QueryDescription::new().filter(field("Name").eq("Alien")))
        .await?;
    println!("{count} movie(s) named Alien");
    Ok(())
}
