//! Periodic leaderboards routed by time.

use chrono::{DateTime, Datelike, Utc};
use podium::{Cycle, CycleKind, LeaderboardOptions, PeriodicLeaderboard, SortPolicy, UpdatePolicy};

use crate::helpers::{at, fixed_clock, store};

fn options() -> LeaderboardOptions {
    LeaderboardOptions::new(SortPolicy::HighToLow, UpdatePolicy::Aggregate)
}

#[tokio::test]
async fn buckets_are_independent() {
    let monthly = PeriodicLeaderboard::new(store(), "monthly", options(), CycleKind::Month);

    let may = monthly.leaderboard_at(at(2020, 5, 15, 22, 53));
    let june = monthly.leaderboard_at(at(2020, 6, 1, 0, 0));
    may.update_one("p", 10.0, None).await.unwrap();
    june.update_one("p", 1.0, None).await.unwrap();

    assert_eq!(may.key(), "monthly:y2020-m05");
    assert_eq!(may.score("p").await.unwrap(), Some(10.0));
    assert_eq!(june.score("p").await.unwrap(), Some(1.0));

    // same bucket, different instant
    let later_in_may = monthly.leaderboard_at(at(2020, 5, 31, 23, 59));
    assert_eq!(later_in_may.score("p").await.unwrap(), Some(10.0));
}

#[tokio::test]
async fn current_follows_the_clock() {
    let daily = PeriodicLeaderboard::new(store(), "daily", options(), CycleKind::Day)
        .with_clock(fixed_clock(at(2021, 2, 3, 4, 5)));
    assert_eq!(daily.current().key(), "daily:y2021-m02-d03");
    assert_eq!(daily.current_key(), "y2021-m02-d03");
}

#[tokio::test]
async fn custom_cycle_buckets() {
    let quarterly = PeriodicLeaderboard::new(
        store(),
        "quarterly",
        options(),
        Cycle::custom(|t: DateTime<Utc>| format!("y{}-q{}", t.year(), (t.month() - 1) / 3 + 1)),
    );
    quarterly
        .leaderboard_at(at(2020, 2, 1, 0, 0))
        .update_one("p", 1.0, None)
        .await
        .unwrap();
    quarterly
        .leaderboard_at(at(2020, 3, 31, 0, 0))
        .update_one("p", 1.0, None)
        .await
        .unwrap();
    quarterly
        .leaderboard_at(at(2020, 4, 1, 0, 0))
        .update_one("p", 5.0, None)
        .await
        .unwrap();

    assert_eq!(
        quarterly.leaderboard("y2020-q1").score("p").await.unwrap(),
        Some(2.0)
    );
    assert_eq!(
        quarterly.existing_keys().await.unwrap(),
        vec!["y2020-q1", "y2020-q2"]
    );
}

#[tokio::test]
async fn existing_keys_ignore_other_prefixes() {
    let s = store();
    let yearly = PeriodicLeaderboard::new(s.clone(), "yearly", options(), CycleKind::Year);
    let other = PeriodicLeaderboard::new(s, "yearly-other", options(), CycleKind::Year);

    for year in 2015..2025 {
        yearly
            .leaderboard_at(at(year, 6, 1, 0, 0))
            .update_one("p", 1.0, None)
            .await
            .unwrap();
    }
    other.current().update_one("p", 1.0, None).await.unwrap();

    let keys = yearly.existing_keys().await.unwrap();
    assert_eq!(keys.len(), 10);
    assert_eq!(keys.first().map(String::as_str), Some("y2015"));
    assert_eq!(keys.last().map(String::as_str), Some("y2024"));
}

#[tokio::test]
async fn week_keys_sort_in_time_order() {
    let weekly = PeriodicLeaderboard::new(store(), "weekly", options(), CycleKind::Week);
    let keys: Vec<String> = (1..=28)
        .map(|day| weekly.key_at(at(2020, 2, day, 12, 0)))
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
    sorted.dedup();
    assert!(sorted.len() >= 4 && sorted.len() <= 5);
}
