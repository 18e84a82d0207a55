//! Sample entities and tables used by the `dynalinq` binary and the tests.

use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use dynalinq_core::entity::convert;
use dynalinq_core::schema::{GlobalIndex, KeyAttribute, KeySchema, TableDefinition};
use dynalinq_core::{Entity, EntityDescriptor, FieldKind, Value};

pub const GAME_SCORES: &str = "GameScores";
pub const MOVIES: &str = "Movies";

/// A player's best result in one game. Hash `UserId`, range `GameTitle`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameScore {
    pub user_id: String,
    pub game_title: String,
    pub top_score: i64,
    pub wins: i64,
    pub losses: i64,
    pub tags: Vec<String>,
    pub version: Option<i64>,
}

impl GameScore {
    pub fn new(user_id: &str, game_title: &str, top_score: i64) -> Self {
        Self {
            user_id: user_id.to_string(),
            game_title: game_title.to_string(),
            top_score,
            ..Self::default()
        }
    }
}

impl Entity for GameScore {
    fn descriptor() -> &'static EntityDescriptor<Self> {
        static DESCRIPTOR: OnceLock<EntityDescriptor<GameScore>> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::builder("GameScore", GameScore::default)
                .field(
                    "UserId",
                    FieldKind::Str,
                    |e| Value::from(&e.user_id),
                    |e, v| {
                        e.user_id = convert::string(v)?;
                        Ok(())
                    },
                )
                .field(
                    "GameTitle",
                    FieldKind::Str,
                    |e| Value::from(&e.game_title),
                    |e, v| {
                        e.game_title = convert::string(v)?;
                        Ok(())
                    },
                )
                .field(
                    "TopScore",
                    FieldKind::Int,
                    |e| Value::Int(e.top_score),
                    |e, v| {
                        e.top_score = convert::int(v)?;
                        Ok(())
                    },
                )
                .field(
                    "Wins",
                    FieldKind::Int,
                    |e| Value::Int(e.wins),
                    |e, v| {
                        e.wins = convert::int(v)?;
                        Ok(())
                    },
                )
                .field(
                    "Losses",
                    FieldKind::Int,
                    |e| Value::Int(e.losses),
                    |e, v| {
                        e.losses = convert::int(v)?;
                        Ok(())
                    },
                )
                .field(
                    "Tags",
                    FieldKind::List,
                    |e| convert::to_structured(&e.tags),
                    |e, v| {
                        e.tags = convert::structured(v)?;
                        Ok(())
                    },
                )
                .version(
                    "Version",
                    |e| Value::from(e.version),
                    |e, v| {
                        e.version = convert::optional(v, convert::int)?;
                        Ok(())
                    },
                )
                .build()
        })
    }
}

/// `GameScores`, optionally with the `GameTitleIndex` global index
/// (hash `GameTitle`, range `TopScore`).
pub fn game_scores_table(with_title_index: bool) -> TableDefinition {
    let mut schema = KeySchema::new(KeyAttribute::string("UserId"))
        .with_range(KeyAttribute::string("GameTitle"));
    if with_title_index {
        schema = schema.with_global_index(
            GlobalIndex::new("GameTitleIndex", KeyAttribute::string("GameTitle"))
                .with_range(KeyAttribute::number("TopScore")),
        );
    }
    TableDefinition::new(GAME_SCORES, schema)
}

pub fn seed_game_scores() -> Vec<GameScore> {
    vec![
        GameScore::new("101", "Starship X", 42),
        GameScore::new("102", "Starship X", 24),
        GameScore::new("101", "Meteor Blasters", 1_000),
    ]
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovieDetails {
    pub director: String,
    pub runtime_minutes: i64,
}

/// Hash `Name`, range `Year`, local index on `Rating`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Movie {
    pub name: String,
    pub year: i64,
    pub rating: f64,
    pub genres: Vec<String>,
    pub cast: BTreeMap<String, String>,
    pub details: Option<MovieDetails>,
    pub version: Option<i64>,
}

impl Movie {
    pub fn new(name: &str, year: i64, rating: f64) -> Self {
        Self {
            name: name.to_string(),
            year,
            rating,
            ..Self::default()
        }
    }
}

impl Entity for Movie {
    fn descriptor() -> &'static EntityDescriptor<Self> {
        static DESCRIPTOR: OnceLock<EntityDescriptor<Movie>> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::builder("Movie", Movie::default)
                .field(
                    "Name",
                    FieldKind::Str,
                    |e| Value::from(&e.name),
                    |e, v| {
                        e.name = convert::string(v)?;
                        Ok(())
                    },
                )
                .field(
                    "Year",
                    FieldKind::Int,
                    |e| Value::Int(e.year),
                    |e, v| {
                        e.year = convert::int(v)?;
                        Ok(())
                    },
                )
                .field(
                    "Rating",
                    FieldKind::Float,
                    |e| Value::Float(e.rating),
                    |e, v| {
                        e.rating = convert::float(v)?;
                        Ok(())
                    },
                )
                .field(
                    "Genres",
                    FieldKind::List,
                    |e| convert::to_structured(&e.genres),
                    |e, v| {
                        e.genres = convert::structured(v)?;
                        Ok(())
                    },
                )
                .field(
                    "Cast",
                    FieldKind::Map,
                    |e| convert::to_structured(&e.cast),
                    |e, v| {
                        e.cast = convert::structured(v)?;
                        Ok(())
                    },
                )
                .field(
                    "Details",
                    FieldKind::Structured,
                    |e| convert::to_structured(&e.details),
                    |e, v| {
                        e.details = convert::optional(v, convert::structured)?;
                        Ok(())
                    },
                )
                .version(
                    "Version",
                    |e| Value::from(e.version),
                    |e, v| {
                        e.version = convert::optional(v, convert::int)?;
                        Ok(())
                    },
                )
                .build()
        })
    }
}

pub fn movies_table(cache_ttl: Duration) -> TableDefinition {
    let schema = KeySchema::new(KeyAttribute::string("Name"))
        .with_range(KeyAttribute::number("Year"))
        .with_local_index("RatingIndex", KeyAttribute::number("Rating"));
    TableDefinition::new(MOVIES, schema).with_cache_ttl(cache_ttl)
}

pub fn seed_movies() -> Vec<Movie> {
    let mut alien = Movie::new("Alien", 1979, 8.5);
    alien.genres = vec!["horror".to_string(), "sci-fi".to_string()];
    alien
        .cast
        .insert("Ripley".to_string(), "Sigourney Weaver".to_string());
    alien.details = Some(MovieDetails {
        director: "Ridley Scott".to_string(),
        runtime_minutes: 117,
    });

    let mut aliens = Movie::new("Aliens", 1986, 8.4);
    aliens.genres = vec!["action".to_string(), "sci-fi".to_string()];

    vec![alien, aliens, Movie::new("Alien", 1992, 6.4)]
}
