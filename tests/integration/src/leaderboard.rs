//! End-to-end behaviour of a single leaderboard.

use podium::{Entry, Error, Leaderboard, LeaderboardOptions, SortPolicy, UpdatePolicy};

use crate::helpers::{leaderboard, store, three_players, twenty_one};

fn ids(entries: &[Entry]) -> Vec<&str> {
    entries.iter().map(|e| e.id.as_str()).collect()
}

// --- reads ---

#[tokio::test]
async fn top_in_both_directions() {
    let lb = three_players(SortPolicy::HighToLow).await;
    assert_eq!(
        lb.top(3).await.unwrap(),
        vec![
            Entry::new("foo", 15.0, 1),
            Entry::new("bar", 10.0, 2),
            Entry::new("baz", 5.0, 3),
        ]
    );

    let lb = three_players(SortPolicy::LowToHigh).await;
    assert_eq!(
        lb.top(3).await.unwrap(),
        vec![
            Entry::new("baz", 5.0, 1),
            Entry::new("bar", 10.0, 2),
            Entry::new("foo", 15.0, 3),
        ]
    );
}

#[tokio::test]
async fn list_length_and_ranks() {
    let lb = twenty_one().await;
    let count = lb.count().await.unwrap() as i64;
    for (low, high) in [(1, 1), (1, 21), (5, 9), (18, 30), (21, 21), (22, 40)] {
        let entries = lb.list(low, high).await.unwrap();
        let expected = (high.min(count) - low + 1).max(0) as usize;
        assert_eq!(entries.len(), expected, "list({low}, {high})");
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.rank, low as usize + i);
        }
    }
}

#[tokio::test]
async fn validation_happens_before_the_store() {
    let lb = twenty_one().await;
    assert!(matches!(lb.list(5, 4).await, Err(Error::InvalidRange { .. })));
    assert!(matches!(lb.top(0).await, Err(Error::NonPositive { .. })));
    assert!(matches!(lb.bottom(-3).await, Err(Error::NonPositive { .. })));
    assert!(matches!(
        lb.around("3", -1, true).await,
        Err(Error::NegativeDistance(-1))
    ));
    assert_eq!(lb.count().await.unwrap(), 21);
}

#[tokio::test]
async fn bottom_ranks_are_absolute() {
    let lb = twenty_one().await;
    let bottom = lb.bottom(3).await.unwrap();
    assert_eq!(ids(&bottom), vec!["18", "19", "20"]);
    assert_eq!(bottom[0].rank, 19);
}

#[tokio::test]
async fn absent_ids_are_not_errors() {
    let lb = three_players(SortPolicy::HighToLow).await;
    assert_eq!(lb.score("ghost").await.unwrap(), None);
    assert_eq!(lb.rank("ghost").await.unwrap(), None);
    assert_eq!(lb.find("ghost").await.unwrap(), None);
    assert!(lb.around("ghost", 2, false).await.unwrap().is_empty());
}

// --- around ---

#[tokio::test]
async fn around_distance_zero() {
    let lb = twenty_one().await;
    for id in ["0", "10", "20"] {
        for fill in [false, true] {
            let window = lb.around(id, 0, fill).await.unwrap();
            assert_eq!(ids(&window), vec![id]);
        }
    }
}

#[tokio::test]
async fn around_centre_is_symmetric() {
    let lb = twenty_one().await;
    let window = lb.around("10", 5, false).await.unwrap();
    assert_eq!(window.len(), 11);
    assert_eq!(window.first().unwrap().rank, 6);
    assert_eq!(window.last().unwrap().rank, 16);
}

#[tokio::test]
async fn around_top_border() {
    let lb = twenty_one().await;

    let clipped = lb.around("3", 5, false).await.unwrap();
    assert_eq!(clipped.len(), 9);
    assert_eq!(clipped[0].rank, 1);

    let filled = lb.around("3", 5, true).await.unwrap();
    assert_eq!(filled.len(), 11);
    assert_eq!(filled[0].rank, 1);
    assert_eq!(filled[10].rank, 11);
}

#[tokio::test]
async fn around_bottom_border() {
    let lb = twenty_one().await;

    let clipped = lb.around("19", 5, false).await.unwrap();
    assert_eq!(clipped.len(), 7);

    let filled = lb.around("19", 5, true).await.unwrap();
    assert_eq!(filled.len(), 11);
    assert_eq!(filled[0].rank, 11);
    assert_eq!(filled[10].rank, 21);
}

// --- updates ---

#[tokio::test]
async fn update_policies_on_both_directions() {
    for sort in [SortPolicy::HighToLow, SortPolicy::LowToHigh] {
        let best = leaderboard(sort, UpdatePolicy::Best);
        best.update_one("id", 10.0, None).await.unwrap();
        best.update_one("id", 5.0, None).await.unwrap();
        let expected = match sort {
            SortPolicy::HighToLow => 10.0,
            SortPolicy::LowToHigh => 5.0,
        };
        assert_eq!(best.score("id").await.unwrap(), Some(expected));

        let aggregate = leaderboard(sort, UpdatePolicy::Aggregate);
        aggregate.update_one("id", 10.0, None).await.unwrap();
        aggregate.update_one("id", 5.0, None).await.unwrap();
        assert_eq!(aggregate.score("id").await.unwrap(), Some(15.0));

        let replace = leaderboard(sort, UpdatePolicy::Replace);
        replace.update_one("id", 10.0, None).await.unwrap();
        replace.update_one("id", 5.0, None).await.unwrap();
        assert_eq!(replace.score("id").await.unwrap(), Some(5.0));
    }
}

#[tokio::test]
async fn concurrent_best_updates_keep_the_maximum() {
    let lb = leaderboard(SortPolicy::HighToLow, UpdatePolicy::Best);
    let mut handles = Vec::new();
    for value in 0..64 {
        let lb = lb.clone();
        handles.push(tokio::spawn(async move {
            lb.update_one("racer", value as f64, None).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(lb.score("racer").await.unwrap(), Some(63.0));
}

#[tokio::test]
async fn concurrent_aggregates_are_not_lost() {
    let lb = leaderboard(SortPolicy::HighToLow, UpdatePolicy::Aggregate);
    let mut handles = Vec::new();
    for _ in 0..50 {
        let lb = lb.clone();
        handles.push(tokio::spawn(async move {
            lb.update([("counter", 2.0)], None).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(lb.score("counter").await.unwrap(), Some(100.0));
}

#[tokio::test]
async fn top_n_limit_holds_after_every_update() {
    for sort in [SortPolicy::HighToLow, SortPolicy::LowToHigh] {
        let lb = Leaderboard::new(
            store(),
            "limited",
            LeaderboardOptions::new(sort, UpdatePolicy::Best).with_limit(3),
        );
        let values = [12.0, 3.0, 48.0, 7.0, 30.0, 1.0, 25.0, 9.0];
        for (i, v) in values.iter().enumerate() {
            lb.update([(format!("p{i}"), *v)], None).await.unwrap();
            assert!(lb.count().await.unwrap() <= 3);
            assert!(lb.top(100).await.unwrap().len() <= 3);
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        if sort == SortPolicy::HighToLow {
            sorted.reverse();
        }
        let kept: Vec<f64> = lb.top(100).await.unwrap().iter().map(|e| e.score).collect();
        assert_eq!(kept, sorted[..3]);
    }
}

#[tokio::test]
async fn remove_and_clear_are_idempotent() {
    let lb = three_players(SortPolicy::HighToLow).await;
    lb.remove(["bar"]).await.unwrap();
    lb.remove(["bar"]).await.unwrap();
    assert_eq!(ids(&lb.top(10).await.unwrap()), vec!["foo", "baz"]);
    assert_eq!(lb.rank("baz").await.unwrap(), Some(2));

    lb.clear().await.unwrap();
    assert_eq!(lb.count().await.unwrap(), 0);
    lb.clear().await.unwrap();
    assert_eq!(lb.count().await.unwrap(), 0);
}

// --- export ---

#[tokio::test]
async fn export_visits_every_rank_once() {
    let lb = twenty_one().await;
    let mut exporter = lb.export(5).unwrap();
    let mut seen = Vec::new();
    while let Some(page) = exporter.next_batch().await.unwrap() {
        seen.extend(page.into_iter().map(|e| e.id));
    }
    let expected: Vec<String> = (0..21).map(|i| i.to_string()).collect();
    assert_eq!(seen, expected);
}
