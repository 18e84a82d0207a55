mod common;

use std::time::Duration;

use dynalinq::demo::{GameScore, Movie, GAME_SCORES, MOVIES};
use dynalinq::query::{field, one_of, QueryDescription};
use dynalinq::schema::{GlobalIndex, KeyAttribute, KeySchema, TableDefinition};
use dynalinq::storage::InMemoryStore;
use dynalinq::{DataContext, ErrorKind, QueryPlan, Value};

use common::{harness, players, Player, PLAYERS};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

fn high_starship_scores() -> QueryDescription {
    QueryDescription::new()
        .filter(field("GameTitle").eq("Starship X"))
        .filter(field("TopScore").gt(30))
}

#[tokio::test]
async fn test_global_index_serves_title_query() {
    let h = harness(true, DAY).await;
    let scores = h.ctx.table::<GameScore>(GAME_SCORES).await.unwrap();

    let plan = scores.explain(&high_starship_scores()).unwrap();
    assert!(matches!(
        plan,
        QueryPlan::IndexQuery { ref index_name, .. } if index_name == "GameTitleIndex"
    ));

    let before = h.store.operation_counts();
    let rows = scores.to_vec(&high_starship_scores()).await.unwrap();
    let ops = h.store.operation_counts().since(&before);

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].user_id, "101");
    assert_eq!(rows[0].top_score, 42);
    assert_eq!(ops.index_queries, 1);
    assert_eq!(ops.scans, 0);
}

#[tokio::test]
async fn test_same_rows_without_the_index_come_from_a_scan() {
    let h = harness(false, DAY).await;
    let scores = h.ctx.table::<GameScore>(GAME_SCORES).await.unwrap();

    let plan = scores.explain(&high_starship_scores()).unwrap();
    assert_eq!(plan.kind(), "scan");

    let before = h.store.operation_counts();
    let rows = scores.to_vec(&high_starship_scores()).await.unwrap();
    let ops = h.store.operation_counts().since(&before);

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].user_id, "101");
    assert_eq!(rows[0].top_score, 42);
    assert_eq!(ops.scans, 1);
    assert_eq!(ops.index_queries, 0);
}

#[tokio::test]
async fn test_full_key_is_a_point_get() {
    let h = harness(true, DAY).await;
    let scores = h.ctx.table::<GameScore>(GAME_SCORES).await.unwrap();
    let description = QueryDescription::new()
        .filter(field("UserId").eq("102"))
        .filter(field("GameTitle").eq("Starship X"));

    let before = h.store.operation_counts();
    let score = scores.first(description).await.unwrap();
    let ops = h.store.operation_counts().since(&before);

    assert_eq!(score.top_score, 24);
    assert_eq!(ops.gets, 1);
    assert_eq!(ops.reads(), 1);
}

#[tokio::test]
async fn test_hash_key_alone_is_a_primary_query() {
    let h = harness(true, DAY).await;
    let scores = h.ctx.table::<GameScore>(GAME_SCORES).await.unwrap();
    let description = QueryDescription::new()
        .filter(field("UserId").eq("101"))
        .order_by("GameTitle");

    let before = h.store.operation_counts();
    let rows = scores.to_vec(&description).await.unwrap();
    let ops = h.store.operation_counts().since(&before);

    let titles: Vec<&str> = rows.iter().map(|r| r.game_title.as_str()).collect();
    assert_eq!(titles, vec!["Meteor Blasters", "Starship X"]);
    assert_eq!(ops.queries, 1);
}

#[tokio::test]
async fn test_local_index_on_rating() {
    let h = harness(true, DAY).await;
    let movies = h.ctx.table::<Movie>(MOVIES).await.unwrap();
    let description = QueryDescription::new()
        .filter(field("Name").eq("Alien"))
        .filter(field("Rating").gt(7.0));

    let plan = movies.explain(&description).unwrap();
    assert!(matches!(
        plan,
        QueryPlan::PrimaryQuery { local_index: Some(ref name), .. } if name == "RatingIndex"
    ));

    let rows = movies.to_vec(&description).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].year, 1979);
}

#[tokio::test]
async fn test_find_checks_key_shape_before_io() {
    let h = harness(true, DAY).await;
    let movies = h.ctx.table::<Movie>(MOVIES).await.unwrap();

    let before = h.store.operation_counts();
    let err = movies.find(&[Value::from("Alien")]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::KeySchemaMismatch);

    let err = movies
        .find(&[Value::from("Alien"), Value::from("1979")])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::KeySchemaMismatch);
    assert_eq!(h.store.operation_counts().since(&before).total(), 0);

    let alien = movies
        .find(&[Value::from("Alien"), Value::from(1979)])
        .await
        .unwrap();
    assert_eq!(alien.rating, 8.5);

    let err = movies
        .find(&[Value::from("Alien"), Value::from(2000)])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_consistent_read_bypasses_the_cache() {
    let h = harness(true, DAY).await;
    let scores = h.ctx.table::<GameScore>(GAME_SCORES).await.unwrap();
    let consistent = high_starship_scores().customize(|opts| opts.consistent_read = true);

    scores.to_vec(&consistent).await.unwrap();
    let before = h.store.operation_counts();
    let rows = scores.to_vec(&consistent).await.unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(h.store.operation_counts().since(&before).reads(), 1);
}

fn scored(user_id: &str, title: &str, top_score: i64, wins: i64, tags: &[&str]) -> GameScore {
    GameScore {
        wins,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        ..GameScore::new(user_id, title, top_score)
    }
}

fn ranked_game_scores() -> Vec<GameScore> {
    vec![
        scored("101", "Starship X", 42, 3, &["pro"]),
        scored("102", "Starship X", 24, 0, &[]),
        scored("103", "Starship X", 77, 5, &["pro", "streamer"]),
        scored("104", "Starship X", 10, 2, &["casual"]),
        scored("101", "Meteor Blasters", 1_000, 9, &["pro"]),
        scored("105", "Meteor Blasters", 35, 1, &[]),
    ]
}

/// `GameScores` with none, one or both title indexes.
fn game_scores_with_indexes(count: usize) -> TableDefinition {
    let indexes = [
        GlobalIndex::new("GameTitleIndex", KeyAttribute::string("GameTitle"))
            .with_range(KeyAttribute::number("TopScore")),
        GlobalIndex::new("GameTitleWinsIndex", KeyAttribute::string("GameTitle"))
            .with_range(KeyAttribute::number("Wins")),
    ];
    let schema = indexes.into_iter().take(count).fold(
        KeySchema::new(KeyAttribute::string("UserId"))
            .with_range(KeyAttribute::string("GameTitle")),
        KeySchema::with_global_index,
    );
    TableDefinition::new(GAME_SCORES, schema)
}

async fn variant(count: usize) -> (InMemoryStore, DataContext) {
    let store = InMemoryStore::new();
    let ctx = common::context(&store);
    ctx.declare_table(game_scores_with_indexes(count), ranked_game_scores)
        .await
        .unwrap();
    (store, ctx)
}

#[tokio::test]
async fn test_every_index_variant_returns_the_same_rows() {
    let starship = || QueryDescription::new().filter(field("GameTitle").eq("Starship X"));
    let shapes = vec![
        ("title only", starship()),
        ("title and score range", starship().filter(field("TopScore").gt(30))),
        (
            "title and score window",
            starship()
                .filter(field("TopScore").ge(10))
                .filter(field("TopScore").le(42)),
        ),
        ("score not equal", starship().filter(field("TopScore").ne(24))),
        ("title and wins", starship().filter(field("Wins").ge(2))),
        (
            "user in list",
            starship().filter(one_of([Value::from("101"), Value::from("104")], "UserId")),
        ),
        (
            "tag contains",
            starship()
                .filter(field("Tags").contains("pro"))
                .filter(field("TopScore").ge(10)),
        ),
        ("score only", QueryDescription::new().filter(field("TopScore").lt(40))),
    ];

    let variants = [variant(0).await, variant(1).await, variant(2).await];

    for (name, description) in &shapes {
        let mut results = Vec::new();
        for (_, ctx) in &variants {
            let scores = ctx.table::<GameScore>(GAME_SCORES).await.unwrap();
            let mut rows: Vec<(String, String)> = scores
                .to_vec(description)
                .await
                .unwrap()
                .into_iter()
                .map(|s| (s.user_id, s.game_title))
                .collect();
            rows.sort();
            results.push(rows);
        }
        assert_eq!(results[0], results[1], "{name}: one index differs from none");
        assert_eq!(results[0], results[2], "{name}: two indexes differ from none");
    }
}

#[tokio::test]
async fn test_second_index_serves_its_range_attribute() {
    let description = QueryDescription::new()
        .filter(field("GameTitle").eq("Starship X"))
        .filter(field("Wins").ge(2));
    let mut plans = Vec::new();
    for count in 0..3 {
        let (store, ctx) = variant(count).await;
        let scores = ctx.table::<GameScore>(GAME_SCORES).await.unwrap();
        let plan = scores.explain(&description).unwrap();

        let before = store.operation_counts();
        let rows = scores.to_vec(&description).await.unwrap();
        let ops = store.operation_counts().since(&before);

        assert_eq!(rows.len(), 3);
        assert_eq!(ops.reads(), 1);
        plans.push(plan);
    }

    assert_eq!(plans[0].kind(), "scan");
    assert_eq!(plans[1].kind(), "scan");
    assert!(matches!(
        plans[2],
        QueryPlan::IndexQuery { ref index_name, .. } if index_name == "GameTitleWinsIndex"
    ));
}

#[tokio::test]
async fn test_rows_missing_the_index_range_are_not_dropped() {
    let team_a = QueryDescription::new().filter(field("Team").eq("A"));

    let mut counts = Vec::new();
    for with_rank_index in [true, false] {
        let h = players(with_rank_index).await;
        let table = h.ctx.table::<Player>(PLAYERS).await.unwrap();
        assert_eq!(table.explain(&team_a).unwrap().kind(), "scan");
        counts.push(table.to_vec(&team_a).await.unwrap().len());
    }
    assert_eq!(counts, vec![2, 2]);

    let ranked = team_a.clone().filter(field("Rank").ge(1));
    let h = players(true).await;
    let table = h.ctx.table::<Player>(PLAYERS).await.unwrap();
    assert_eq!(table.explain(&ranked).unwrap().kind(), "index-query");
    let rows = table.to_vec(&ranked).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, "p1");
}
