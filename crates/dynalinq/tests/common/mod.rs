#![allow(dead_code)]

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::broadcast;

use dynalinq::cache::{KeyValueTableCacheFactory, MemoryCache};
use dynalinq::demo::{game_scores_table, movies_table, seed_game_scores, seed_movies};
use dynalinq::storage::InMemoryStore;
use dynalinq::DataContext;
use dynalinq_core::cache::CacheEvent;
use dynalinq_core::entity::convert;
use dynalinq_core::schema::{GlobalIndex, KeyAttribute, KeySchema, TableDefinition};
use dynalinq_core::{Entity, EntityDescriptor, FieldKind, Value};

pub struct Harness {
    pub store: InMemoryStore,
    pub ctx: DataContext,
}

pub fn context(store: &InMemoryStore) -> DataContext {
    let cache = Arc::new(MemoryCache::new(10_000));
    DataContext::new(
        Arc::new(store.clone()),
        Arc::new(KeyValueTableCacheFactory::new(cache, 1_024)),
    )
}

/// Declares and seeds `GameScores` (with or without its title index) and
/// `Movies` with the given cache TTL.
pub async fn harness(with_title_index: bool, movies_ttl: Duration) -> Harness {
    let store = InMemoryStore::new();
    let ctx = context(&store);
    ctx.declare_table(game_scores_table(with_title_index), seed_game_scores)
        .await
        .unwrap();
    ctx.declare_table(movies_table(movies_ttl), seed_movies)
        .await
        .unwrap();
    Harness { store, ctx }
}

pub fn drain(events: &mut broadcast::Receiver<CacheEvent>) -> Vec<CacheEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

pub const PLAYERS: &str = "Players";

/// An unversioned entity whose ranking is optional. Hash `Id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Player {
    pub id: String,
    pub team: String,
    pub rank: Option<i64>,
    pub nickname: String,
}

impl Player {
    pub fn new(id: &str, team: &str, rank: Option<i64>, nickname: &str) -> Self {
        Self {
            id: id.to_string(),
            team: team.to_string(),
            rank,
            nickname: nickname.to_string(),
        }
    }
}

impl Entity for Player {
    fn descriptor() -> &'static EntityDescriptor<Self> {
        static DESCRIPTOR: OnceLock<EntityDescriptor<Player>> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::builder("Player", Player::default)
                .field(
                    "Id",
                    FieldKind::Str,
                    |e| Value::from(&e.id),
                    |e, v| {
                        e.id = convert::string(v)?;
                        Ok(())
                    },
                )
                .field(
                    "Team",
                    FieldKind::Str,
                    |e| Value::from(&e.team),
                    |e, v| {
                        e.team = convert::string(v)?;
                        Ok(())
                    },
                )
                .field(
                    "Rank",
                    FieldKind::Int,
                    |e| Value::from(e.rank),
                    |e, v| {
                        e.rank = convert::optional(v, convert::int)?;
                        Ok(())
                    },
                )
                .field(
                    "Nickname",
                    FieldKind::Str,
                    |e| Value::from(&e.nickname),
                    |e, v| {
                        e.nickname = convert::string(v)?;
                        Ok(())
                    },
                )
                .build()
        })
    }
}

/// `Players`, optionally with `TeamRankIndex` (hash `Team`, range `Rank`).
pub fn players_table(with_rank_index: bool) -> TableDefinition {
    let mut schema = KeySchema::new(KeyAttribute::string("Id"));
    if with_rank_index {
        schema = schema.with_global_index(
            GlobalIndex::new("TeamRankIndex", KeyAttribute::string("Team"))
                .with_range(KeyAttribute::number("Rank")),
        );
    }
    TableDefinition::new(PLAYERS, schema)
}

pub fn seed_players() -> Vec<Player> {
    vec![
        Player::new("p1", "A", Some(1), "ace"),
        Player::new("p2", "A", None, "rookie"),
        Player::new("p3", "B", Some(2), "blocker"),
    ]
}

/// A context over a fresh store holding only the seeded `Players` table.
pub async fn players(with_rank_index: bool) -> Harness {
    let store = InMemoryStore::new();
    let ctx = context(&store);
    ctx.declare_table(players_table(with_rank_index), seed_players)
        .await
        .unwrap();
    Harness { store, ctx }
}
