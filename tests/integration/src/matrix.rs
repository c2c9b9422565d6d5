//! Leaderboard matrices: fan-out updates, filtered reads and showcase.

use podium::{
    CycleKind, DimensionDef, Error, FeatureDef, LeaderboardMatrix, LeaderboardOptions,
    MatrixConfig, MatrixUpdate, QueryFilter, SortPolicy, UpdatePolicy,
};
use podium_store::StoreHandle;

use crate::helpers::{at, fixed_clock, store};

fn matrix() -> LeaderboardMatrix<StoreHandle> {
    LeaderboardMatrix::new(
        store(),
        "game",
        vec![
            DimensionDef::new("all"),
            DimensionDef::periodic("week", CycleKind::Week),
        ],
        vec![
            FeatureDef::new(
                "feat1",
                LeaderboardOptions::new(SortPolicy::HighToLow, UpdatePolicy::Replace),
            ),
            FeatureDef::new(
                "feat2",
                LeaderboardOptions::new(SortPolicy::LowToHigh, UpdatePolicy::Best),
            ),
        ],
    )
    .unwrap()
    .with_clock(fixed_clock(at(2020, 5, 15, 12, 0)))
}

async fn seeded() -> LeaderboardMatrix<StoreHandle> {
    let m = matrix();
    let entries = (1..=5).map(|i| {
        MatrixUpdate::new(format!("p{i}"))
            .value("feat1", (i * 10) as f64)
            .value("feat2", i as f64)
    });
    m.update(entries, None, None).await.unwrap();
    m
}

#[tokio::test]
async fn feature_filter_excludes_other_features() {
    let m = seeded().await;
    let filter = QueryFilter::all().with_features(["feat2"]);

    let entry = m.find("p3", &filter).await.unwrap().unwrap();
    for dimension in ["all", "week"] {
        assert!(!entry.scores[dimension].contains_key("feat1"));
        assert!(!entry.ranks[dimension].contains_key("feat1"));
        assert_eq!(entry.score(dimension, "feat2"), Some(3.0));
        assert_eq!(entry.rank(dimension, "feat2"), Some(3));
    }
}

#[tokio::test]
async fn rows_mix_sort_directions() {
    let m = seeded().await;
    let top = m.top("all", "feat1", 2, &QueryFilter::all()).await.unwrap();
    assert_eq!(top[0].id, "p5");
    assert_eq!(top[0].rank("all", "feat1"), Some(1));
    assert_eq!(top[0].rank("all", "feat2"), Some(5));
    assert_eq!(top[1].id, "p4");
}

#[tokio::test]
async fn dimension_filter_and_forced_sort_cell() {
    let m = seeded().await;
    let filter = QueryFilter::all().with_dimensions(["week"]);
    let entries = m.list("all", "feat2", 1, 2, &filter).await.unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].id, "p1");
    // the sort cell is present even though "all" was filtered out
    assert_eq!(entries[0].rank("all", "feat2"), Some(1));
    assert!(entries[0].score("all", "feat1").is_none());
    assert_eq!(entries[0].score("week", "feat1"), Some(10.0));
}

#[tokio::test]
async fn empty_filter_is_a_no_op() {
    let m = seeded().await;
    let nothing = QueryFilter::all().with_features(Vec::<String>::new());
    assert!(m.find("p1", &nothing).await.unwrap().is_none());
}

#[tokio::test]
async fn around_and_bottom_across_cells() {
    let m = seeded().await;
    let window = m
        .around("week", "feat1", "p1", 1, true, &QueryFilter::all())
        .await
        .unwrap();
    let ids: Vec<&str> = window.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["p3", "p2", "p1"]);

    let bottom = m.bottom("all", "feat2", 2, &QueryFilter::all()).await.unwrap();
    let ids: Vec<&str> = bottom.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["p4", "p5"]);
}

#[tokio::test]
async fn update_respects_dimension_selection_and_override() {
    let m = seeded().await;
    m.update(
        [MatrixUpdate::new("p1").value("feat2", 0.5)],
        Some(&["all"]),
        Some(UpdatePolicy::Aggregate),
    )
    .await
    .unwrap();

    let entry = m.find("p1", &QueryFilter::all()).await.unwrap().unwrap();
    assert_eq!(entry.score("all", "feat2"), Some(1.5));
    assert_eq!(entry.score("week", "feat2"), Some(1.0));
}

#[tokio::test]
async fn periodic_cells_rotate_with_the_clock() {
    let m = seeded().await;
    let next_week = m
        .clone()
        .with_clock(fixed_clock(at(2020, 5, 25, 12, 0)));

    let entry = next_week.find("p1", &QueryFilter::all()).await.unwrap().unwrap();
    assert!(entry.scores.contains_key("all"));
    assert!(!entry.scores.contains_key("week"));

    let counts = next_week.count().await.unwrap();
    assert_eq!(counts["all"]["feat1"], 5);
    assert_eq!(counts["week"]["feat1"], 0);

    let old = m.leaderboard("week", "feat1", Some(at(2020, 5, 14, 0, 0))).unwrap();
    assert_eq!(old.count().await.unwrap(), 5);
}

#[tokio::test]
async fn remove_then_count() {
    let m = seeded().await;
    m.remove(["p1", "p2"], Some(&["week", "month"]), None)
        .await
        .unwrap();
    m.remove(["p1", "p2"], Some(&["week", "month"]), None)
        .await
        .unwrap();

    let counts = m.count().await.unwrap();
    assert_eq!(counts["all"]["feat1"], 5);
    assert_eq!(counts["all"]["feat2"], 5);
    assert_eq!(counts["week"]["feat1"], 3);
    assert_eq!(counts["week"]["feat2"], 3);
}

#[tokio::test]
async fn showcase_picks_by_priority_then_size() {
    let m = seeded().await;
    m.remove(["p1", "p2", "p3"], Some(&["week"]), None)
        .await
        .unwrap();

    let first = m
        .showcase(&["week", "all"], "feat1", 2, &QueryFilter::all())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.dimension, "week");
    assert_eq!(first.entries.len(), 2);

    let fallback = m
        .showcase(&["week", "all"], "feat1", 50, &QueryFilter::all())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fallback.dimension, "all");
    assert_eq!(fallback.entries.len(), 5);

    assert!(matches!(
        m.showcase(&["all"], "nope", 1, &QueryFilter::all()).await,
        Err(Error::UnknownCell { .. })
    ));
}

#[tokio::test]
async fn built_from_toml() {
    let config = MatrixConfig::from_toml(
        r#"
        [[dimensions]]
        name = "all"

        [[dimensions]]
        name = "day"
        cycle = "day"

        [[features]]
        name = "wins"
        update-policy = "aggregate"
        limit-top-n = 2
        "#,
    )
    .unwrap();
    let m = LeaderboardMatrix::from_config(store(), "cfg", &config)
        .unwrap()
        .with_clock(fixed_clock(at(2020, 5, 15, 12, 0)));

    for id in ["a", "b", "c"] {
        m.update([MatrixUpdate::new(id).value("wins", 1.0)], None, None)
            .await
            .unwrap();
    }
    m.update([MatrixUpdate::new("c").value("wins", 1.0)], None, None)
        .await
        .unwrap();

    let day = m.leaderboard("day", "wins", None).unwrap();
    assert_eq!(day.key(), "cfg:day:wins:y2020-m05-d15");
    assert_eq!(day.count().await.unwrap(), 2);
    assert_eq!(day.top(1).await.unwrap()[0].id, "c");
}

#[tokio::test]
async fn duplicated_features_are_rejected() {
    let options = LeaderboardOptions::new(SortPolicy::HighToLow, UpdatePolicy::Aggregate);
    let built = LeaderboardMatrix::new(
        store(),
        "dup",
        vec![DimensionDef::new("all")],
        vec![FeatureDef::new("kills", options), FeatureDef::new("kills", options)],
    );
    assert!(matches!(built, Err(Error::InvalidGrid(_))));
}
