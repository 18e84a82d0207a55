mod common;

use std::time::Duration;

use dynalinq::demo::{GameScore, Movie, GAME_SCORES, MOVIES};
use dynalinq::query::{field, one_of, QueryDescription};
use dynalinq::Value;

use common::{drain, harness};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

fn starship_by_score() -> QueryDescription {
    QueryDescription::new()
        .filter(field("GameTitle").eq("Starship X"))
        .order_by_desc("TopScore")
}

#[tokio::test]
async fn test_repeated_query_is_served_from_cache() {
    let h = harness(true, DAY).await;
    let scores = h.ctx.table::<GameScore>(GAME_SCORES).await.unwrap();
    let mut events = h.ctx.subscribe();

    let first = scores.to_vec(&starship_by_score()).await.unwrap();
    assert!(drain(&mut events).iter().any(|e| e.is_miss()));

    let before = h.store.operation_counts();
    let second = scores.to_vec(&starship_by_score()).await.unwrap();

    assert_eq!(h.store.operation_counts().since(&before).total(), 0);
    assert_eq!(first, second);
    let events = drain(&mut events);
    assert!(events.iter().any(|e| e.is_hit()));
    assert!(!events.iter().any(|e| e.is_miss()));
}

#[tokio::test]
async fn test_count_uses_the_cached_index() {
    let h = harness(true, DAY).await;
    let scores = h.ctx.table::<GameScore>(GAME_SCORES).await.unwrap();
    let starship = QueryDescription::new().filter(field("GameTitle").eq("Starship X"));

    assert_eq!(scores.count(starship.clone()).await.unwrap(), 2);
    let before = h.store.operation_counts();
    assert_eq!(scores.count(starship).await.unwrap(), 2);
    assert_eq!(h.store.operation_counts().since(&before).total(), 0);
}

#[tokio::test]
async fn test_expired_index_goes_back_to_the_store() {
    let h = harness(true, Duration::from_millis(50)).await;
    let movies = h.ctx.table::<Movie>(MOVIES).await.unwrap();
    let named_alien = QueryDescription::new()
        .filter(field("Name").eq("Alien"))
        .order_by("Year");
    let mut events = h.ctx.subscribe();

    movies.to_vec(&named_alien).await.unwrap();
    drain(&mut events);

    tokio::time::sleep(Duration::from_millis(120)).await;

    let before = h.store.operation_counts();
    let rows = movies.to_vec(&named_alien).await.unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(h.store.operation_counts().since(&before).queries, 1);
    assert!(drain(&mut events).iter().any(|e| e.is_miss()));
}

#[tokio::test]
async fn test_write_patches_ordered_index() {
    let h = harness(true, DAY).await;
    let scores = h.ctx.table::<GameScore>(GAME_SCORES).await.unwrap();

    scores.to_vec(&starship_by_score()).await.unwrap();
    scores
        .modify(&[Value::from("102"), Value::from("Starship X")], |s| {
            s.top_score = 50
        })
        .await
        .unwrap();
    h.ctx.submit_changes().await.unwrap();

    let before = h.store.operation_counts();
    let rows = scores.to_vec(&starship_by_score()).await.unwrap();

    assert_eq!(h.store.operation_counts().since(&before).total(), 0);
    let order: Vec<(&str, i64)> = rows
        .iter()
        .map(|r| (r.user_id.as_str(), r.top_score))
        .collect();
    assert_eq!(order, vec![("102", 50), ("101", 42)]);
}

#[tokio::test]
async fn test_write_discards_limited_index() {
    let h = harness(true, DAY).await;
    let scores = h.ctx.table::<GameScore>(GAME_SCORES).await.unwrap();
    let limited = starship_by_score().customize(|opts| opts.limit = Some(10));
    let mut events = h.ctx.subscribe();

    scores.to_vec(&limited).await.unwrap();
    let before = h.store.operation_counts();
    scores.to_vec(&limited).await.unwrap();
    assert_eq!(h.store.operation_counts().since(&before).total(), 0);

    scores
        .modify(&[Value::from("101"), Value::from("Starship X")], |s| {
            s.wins += 1
        })
        .await
        .unwrap();
    h.ctx.submit_changes().await.unwrap();
    drain(&mut events);

    let before = h.store.operation_counts();
    let rows = scores.to_vec(&limited).await.unwrap();

    assert_eq!(h.store.operation_counts().since(&before).reads(), 1);
    assert!(drain(&mut events).iter().any(|e| e.is_miss()));
    assert_eq!(rows[0].wins, 1);
}

#[tokio::test]
async fn test_other_sessions_see_committed_writes() {
    let h = harness(true, DAY).await;
    let scores = h.ctx.table::<GameScore>(GAME_SCORES).await.unwrap();
    let key = [Value::from("101"), Value::from("Starship X")];

    let reader = h.ctx.session();
    let reader_scores = reader.table::<GameScore>(GAME_SCORES).await.unwrap();
    assert_eq!(reader_scores.find(&key).await.unwrap().wins, 0);

    scores.modify(&key, |s| s.wins = 9).await.unwrap();
    h.ctx.submit_changes().await.unwrap();

    // A fresh session reads the entity the commit wrote into the cache.
    let later = h.ctx.session();
    let later_scores = later.table::<GameScore>(GAME_SCORES).await.unwrap();
    let before = h.store.operation_counts();
    assert_eq!(later_scores.find(&key).await.unwrap().wins, 9);
    assert_eq!(h.store.operation_counts().since(&before).total(), 0);
}

#[tokio::test]
async fn test_lookalike_query_is_not_served_another_queries_rows() {
    let h = harness(true, DAY).await;
    let movies = h.ctx.table::<Movie>(MOVIES).await.unwrap();
    let both = QueryDescription::new().filter(one_of(
        [Value::from("Alien"), Value::from("Aliens")],
        "Name",
    ));
    let lookalike =
        QueryDescription::new().filter(one_of([Value::from("Alien,s:Aliens")], "Name"));

    assert_eq!(movies.to_vec(&both).await.unwrap().len(), 3);

    let before = h.store.operation_counts();
    assert!(movies.to_vec(&lookalike).await.unwrap().is_empty());
    assert_eq!(h.store.operation_counts().since(&before).scans, 1);
}
