//! A grid of leaderboards queried as one structure.
//!
//! A [`LeaderboardMatrix`] crosses named dimensions with named features.
//! Every `(dimension, feature)` cell is its own leaderboard, stored under
//! `<base>:<dimension>:<feature>`, or `<base>:<dimension>:<feature>:<bucket>`
//! when the dimension rotates on a [`Cycle`]. Features carry the
//! leaderboard options, so one row can mix high-to-low and low-to-high
//! cells.
//!
//! Multi-cell writes and reads are submitted to the store as a single
//! script or batch: a reader never sees half of a matrix update, and every
//! cell of a read reflects the same moment.

mod plan;

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use podium_store::{OrderedSetStore, StoreRequest};
use tracing::debug;

use crate::config::MatrixConfig;
use crate::error::{Error, Result};
use crate::leaderboard::Leaderboard;
use crate::periodic::{system_clock, Clock, Cycle, PeriodicLeaderboard};
use crate::policy::{LeaderboardOptions, UpdatePolicy};
use crate::update::{UpdateBatch, UpdateScript};

use self::plan::{parse, MatrixReadScript, PlannedCell, QueryPlan, Selection};

/// A named axis of the grid. Without a cycle the dimension is one
/// permanent collection per feature.
#[derive(Debug, Clone)]
pub struct DimensionDef {
    pub name: String,
    pub cycle: Option<Cycle>,
}

impl DimensionDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cycle: None,
        }
    }

    pub fn periodic(name: impl Into<String>, cycle: impl Into<Cycle>) -> Self {
        Self {
            name: name.into(),
            cycle: Some(cycle.into()),
        }
    }
}

/// A named axis of the grid, with the options its leaderboards rank by.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureDef {
    pub name: String,
    pub options: LeaderboardOptions,
}

impl FeatureDef {
    pub fn new(name: impl Into<String>, options: LeaderboardOptions) -> Self {
        Self {
            name: name.into(),
            options,
        }
    }
}

/// Restricts the cells a read touches. `None` selects everything on that
/// axis; an empty list selects nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilter {
    pub dimensions: Option<Vec<String>>,
    pub features: Option<Vec<String>>,
}

impl QueryFilter {
    /// A filter selecting every cell.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_dimensions<I, T>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.dimensions = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_features<I, T>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.features = Some(names.into_iter().map(Into::into).collect());
        self
    }

    fn selects_dimension(&self, name: &str) -> bool {
        selects(self.dimensions.as_deref(), name)
    }

    fn selects_feature(&self, name: &str) -> bool {
        selects(self.features.as_deref(), name)
    }
}

fn selects<T: AsRef<str>>(names: Option<&[T]>, name: &str) -> bool {
    names.map_or(true, |names| names.iter().any(|n| n.as_ref() == name))
}

/// Rejects names that would collide in the `<base>:<dimension>:<feature>`
/// key layout.
pub(crate) fn check_names<'a>(
    kind: &str,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    let mut seen: Vec<&str> = Vec::new();
    for name in names {
        if name.is_empty() || name.contains(':') {
            return Err(Error::InvalidGrid(format!("invalid {kind} name {name:?}")));
        }
        if seen.contains(&name) {
            return Err(Error::InvalidGrid(format!("duplicate {kind} {name:?}")));
        }
        seen.push(name);
    }
    Ok(())
}

/// One id across the grid.
///
/// `scores` and `ranks` map dimension → feature → value and are sparse: a
/// dimension appears only if the id is in at least one of its selected
/// cells, and a feature only if the id is in that cell. Ranks are 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixEntry {
    pub id: String,
    pub scores: HashMap<String, HashMap<String, f64>>,
    pub ranks: HashMap<String, HashMap<String, usize>>,
}

impl MatrixEntry {
    pub fn score(&self, dimension: &str, feature: &str) -> Option<f64> {
        self.scores.get(dimension)?.get(feature).copied()
    }

    pub fn rank(&self, dimension: &str, feature: &str) -> Option<usize> {
        self.ranks.get(dimension)?.get(feature).copied()
    }
}

/// Values to submit for one id, keyed by feature name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatrixUpdate {
    pub id: String,
    pub values: HashMap<String, f64>,
}

impl MatrixUpdate {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            values: HashMap::new(),
        }
    }

    pub fn value(mut self, feature: impl Into<String>, value: f64) -> Self {
        self.values.insert(feature.into(), value);
        self
    }
}

/// The dimension [`LeaderboardMatrix::showcase`] settled on, with its top
/// entries.
#[derive(Debug, Clone, PartialEq)]
pub struct Showcase {
    pub dimension: String,
    pub feature: String,
    pub entries: Vec<MatrixEntry>,
}

/// Per-dimension, per-feature entry counts.
pub type MatrixCounts = HashMap<String, HashMap<String, usize>>;

/// A grid cell's leaderboard, fixed or rotating.
#[derive(Debug, Clone)]
enum Cell<S> {
    Fixed(Leaderboard<S>),
    Periodic(PeriodicLeaderboard<S>),
}

impl<S: OrderedSetStore> Cell<S> {
    fn leaderboard(&self, time: DateTime<Utc>) -> Leaderboard<S> {
        match self {
            Cell::Fixed(lb) => lb.clone(),
            Cell::Periodic(periodic) => periodic.leaderboard_at(time),
        }
    }
}

/// A dimensions × features grid of leaderboards.
#[derive(Clone)]
pub struct LeaderboardMatrix<S> {
    store: S,
    base_key: String,
    dimensions: Vec<DimensionDef>,
    features: Vec<FeatureDef>,
    /// `cells[d][f]` for dimension `d`, feature `f`, in declared order.
    cells: Vec<Vec<Cell<S>>>,
    clock: Clock,
}

impl<S> fmt::Debug for LeaderboardMatrix<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeaderboardMatrix")
            .field("base_key", &self.base_key)
            .field("dimensions", &self.dimensions)
            .field("features", &self.features)
            .finish_non_exhaustive()
    }
}

impl<S: OrderedSetStore> LeaderboardMatrix<S> {
    /// Builds the grid. Cells are handles only; nothing is written.
    ///
    /// Fails with [`Error::InvalidGrid`] if a dimension or feature name is
    /// empty, contains `:`, or appears twice on its axis: any of those would
    /// make two cells share a store key.
    pub fn new(
        store: S,
        base_key: impl Into<String>,
        dimensions: Vec<DimensionDef>,
        features: Vec<FeatureDef>,
    ) -> Result<Self> {
        check_names("dimension", dimensions.iter().map(|d| d.name.as_str()))?;
        check_names("feature", features.iter().map(|f| f.name.as_str()))?;
        let base_key = base_key.into();
        let cells = dimensions
            .iter()
            .map(|dimension| {
                features
                    .iter()
                    .map(|feature| {
                        let key = format!("{base_key}:{}:{}", dimension.name, feature.name);
                        match &dimension.cycle {
                            None => Cell::Fixed(Leaderboard::new(
                                store.clone(),
                                key,
                                feature.options,
                            )),
                            Some(cycle) => Cell::Periodic(PeriodicLeaderboard::new(
                                store.clone(),
                                key,
                                feature.options,
                                cycle.clone(),
                            )),
                        }
                    })
                    .collect()
            })
            .collect();

        Ok(Self {
            store,
            base_key,
            dimensions,
            features,
            cells,
            clock: system_clock(),
        })
    }

    /// Builds the grid a [`MatrixConfig`] describes.
    pub fn from_config(
        store: S,
        base_key: impl Into<String>,
        config: &MatrixConfig,
    ) -> Result<Self> {
        Self::new(store, base_key, config.dimension_defs(), config.feature_defs())
    }

    /// Replaces the clock that picks the bucket of periodic cells.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn base_key(&self) -> &str {
        &self.base_key
    }

    pub fn dimensions(&self) -> &[DimensionDef] {
        &self.dimensions
    }

    pub fn features(&self) -> &[FeatureDef] {
        &self.features
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    fn cell(&self, dimension: usize, feature: usize) -> &Cell<S> {
        match self.cells.get(dimension).and_then(|row| row.get(feature)) {
            Some(cell) => cell,
            None => panic!("matrix cell ({dimension}, {feature}) was not built"),
        }
    }

    fn dimension_index(&self, name: &str) -> Option<usize> {
        self.dimensions.iter().position(|d| d.name == name)
    }

    fn feature_index(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f.name == name)
    }

    fn sort_cell(&self, dimension: &str, feature: &str) -> Result<(usize, usize)> {
        match (self.dimension_index(dimension), self.feature_index(feature)) {
            (Some(d), Some(f)) => Ok((d, f)),
            _ => Err(Error::UnknownCell {
                dimension: dimension.to_owned(),
                feature: feature.to_owned(),
            }),
        }
    }

    /// The leaderboard behind one cell, at `time` (default: now) for
    /// periodic dimensions. `None` for unknown names.
    pub fn leaderboard(
        &self,
        dimension: &str,
        feature: &str,
        time: Option<DateTime<Utc>>,
    ) -> Option<Leaderboard<S>> {
        let (d, f) = self.sort_cell(dimension, feature).ok()?;
        let time = time.unwrap_or_else(|| self.now());
        Some(self.cell(d, f).leaderboard(time))
    }

    /// Plans the cells a read touches. A `sort` cell is always included.
    fn plan(&self, filter: &QueryFilter, sort: Option<(usize, usize)>, now: DateTime<Utc>) -> QueryPlan {
        let mut cells = Vec::new();
        for (d, dimension) in self.dimensions.iter().enumerate() {
            for (f, feature) in self.features.iter().enumerate() {
                let forced = sort == Some((d, f));
                if !forced
                    && !(filter.selects_dimension(&dimension.name)
                        && filter.selects_feature(&feature.name))
                {
                    continue;
                }
                let lb = self.cell(d, f).leaderboard(now);
                cells.push(PlannedCell {
                    dimension: dimension.name.clone(),
                    feature: feature.name.clone(),
                    key: lb.key().to_owned(),
                    order: feature.options.sort_policy.order(),
                });
            }
        }
        QueryPlan { cells }
    }

    async fn read(&self, plan: QueryPlan, selection: Selection) -> Result<Vec<MatrixEntry>> {
        if plan.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self
            .store
            .eval(MatrixReadScript {
                cells: plan.cells.clone(),
                selection,
            })
            .await?;
        Ok(parse(&plan, rows))
    }

    /// Reads a range anchored on a sort cell.
    async fn read_anchored(
        &self,
        dimension: &str,
        feature: &str,
        filter: &QueryFilter,
        selection: impl FnOnce(usize) -> Selection,
    ) -> Result<Vec<MatrixEntry>> {
        let sort = self.sort_cell(dimension, feature)?;
        let plan = self.plan(filter, Some(sort), self.now());
        let anchor = match plan.position(dimension, feature) {
            Some(anchor) => anchor,
            None => unreachable!("sort cell {dimension}:{feature} missing from plan"),
        };
        self.read(plan, selection(anchor)).await
    }

    /// Applies every update to each selected dimension's cell for every
    /// feature the update carries a value for. Feature names the matrix
    /// does not know are ignored.
    ///
    /// All cells are updated, then trimmed to their top-N, as one atomic
    /// unit.
    pub async fn update<I>(
        &self,
        entries: I,
        dimensions: Option<&[&str]>,
        policy: Option<UpdatePolicy>,
    ) -> Result<()>
    where
        I: IntoIterator<Item = MatrixUpdate>,
    {
        let entries: Vec<MatrixUpdate> = entries.into_iter().collect();
        let now = self.now();
        let mut batches = Vec::new();
        for (d, dimension) in self.dimensions.iter().enumerate() {
            if !selects(dimensions, &dimension.name) {
                continue;
            }
            for (f, feature) in self.features.iter().enumerate() {
                let values: Vec<(String, f64)> = entries
                    .iter()
                    .filter_map(|e| e.values.get(&feature.name).map(|v| (e.id.clone(), *v)))
                    .collect();
                if values.is_empty() {
                    continue;
                }
                let lb = self.cell(d, f).leaderboard(now);
                batches.push(UpdateBatch {
                    key: lb.key().to_owned(),
                    sort_policy: feature.options.sort_policy,
                    update_policy: policy.unwrap_or(feature.options.update_policy),
                    limit: feature.options.limit(),
                    entries: values,
                });
            }
        }

        if batches.is_empty() {
            return Ok(());
        }
        debug!(base_key = %self.base_key, cells = batches.len(), entries = entries.len(), "updating matrix");
        self.store.eval(UpdateScript { batches }).await?;
        Ok(())
    }

    /// Removes ids from every selected cell. Unknown names are ignored.
    pub async fn remove<I, K>(
        &self,
        ids: I,
        dimensions: Option<&[&str]>,
        features: Option<&[&str]>,
    ) -> Result<()>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let members: Vec<String> = ids.into_iter().map(Into::into).collect();
        if members.is_empty() {
            return Ok(());
        }
        let now = self.now();
        let mut requests = Vec::new();
        for (d, dimension) in self.dimensions.iter().enumerate() {
            if !selects(dimensions, &dimension.name) {
                continue;
            }
            for (f, feature) in self.features.iter().enumerate() {
                if !selects(features, &feature.name) {
                    continue;
                }
                requests.push(StoreRequest::ZRem {
                    key: self.cell(d, f).leaderboard(now).key().to_owned(),
                    members: members.clone(),
                });
            }
        }
        if requests.is_empty() {
            return Ok(());
        }
        for reply in self.store.execute_batch(requests).await? {
            reply.into_removed()?;
        }
        Ok(())
    }

    /// Reads one id across the filtered grid. `None` if it is in no
    /// selected cell.
    pub async fn find(&self, id: &str, filter: &QueryFilter) -> Result<Option<MatrixEntry>> {
        let plan = self.plan(filter, None, self.now());
        let entries = self.read(plan, Selection::Ids(vec![id.to_owned()])).await?;
        Ok(entries.into_iter().next())
    }

    /// Entries ranked `low..=high` (1-based) in the sort cell, with the
    /// filtered cells read at the same ids. Bounds clamp as in
    /// [`Leaderboard::list`].
    pub async fn list(
        &self,
        dimension: &str,
        feature: &str,
        low: i64,
        high: i64,
        filter: &QueryFilter,
    ) -> Result<Vec<MatrixEntry>> {
        let (low, high) = (low.max(1), high.max(1));
        if low > high {
            return Err(Error::InvalidRange { low, high });
        }
        self.read_anchored(dimension, feature, filter, |anchor| Selection::Range {
            anchor,
            start: low - 1,
            stop: high - 1,
        })
        .await
    }

    /// The best `max` entries of the sort cell.
    pub async fn top(
        &self,
        dimension: &str,
        feature: &str,
        max: i64,
        filter: &QueryFilter,
    ) -> Result<Vec<MatrixEntry>> {
        if max <= 0 {
            return Err(Error::non_positive("max", max));
        }
        self.list(dimension, feature, 1, max, filter).await
    }

    /// The worst `max` entries of the sort cell, in ascending rank order.
    pub async fn bottom(
        &self,
        dimension: &str,
        feature: &str,
        max: i64,
        filter: &QueryFilter,
    ) -> Result<Vec<MatrixEntry>> {
        if max <= 0 {
            return Err(Error::non_positive("max", max));
        }
        self.read_anchored(dimension, feature, filter, |anchor| Selection::Bottom {
            anchor,
            max: max as usize,
        })
        .await
    }

    /// The rank window around `id` in the sort cell, as in
    /// [`Leaderboard::around`].
    pub async fn around(
        &self,
        dimension: &str,
        feature: &str,
        id: &str,
        distance: i64,
        fill_borders: bool,
        filter: &QueryFilter,
    ) -> Result<Vec<MatrixEntry>> {
        if distance < 0 {
            return Err(Error::NegativeDistance(distance));
        }
        self.read_anchored(dimension, feature, filter, |anchor| Selection::Around {
            anchor,
            member: id.to_owned(),
            distance: distance as usize,
            fill_borders,
        })
        .await
    }

    /// Picks a dimension worth showing for `feature` and returns its top
    /// `threshold` entries.
    ///
    /// The first dimension of `dimension_order` holding at least
    /// `threshold` entries wins; failing that, the one holding the most
    /// (earliest on ties). `None` when every candidate is empty. Unknown
    /// dimension names are skipped.
    ///
    /// Counting and reading are two separate submissions, so a concurrent
    /// writer can change the counts in between.
    pub async fn showcase(
        &self,
        dimension_order: &[&str],
        feature: &str,
        threshold: i64,
        filter: &QueryFilter,
    ) -> Result<Option<Showcase>> {
        if threshold <= 0 {
            return Err(Error::non_positive("threshold", threshold));
        }
        let Some(f) = self.feature_index(feature) else {
            return Err(Error::UnknownCell {
                dimension: dimension_order.join(","),
                feature: feature.to_owned(),
            });
        };

        let now = self.now();
        let candidates: Vec<usize> = dimension_order
            .iter()
            .filter_map(|name| self.dimension_index(name))
            .collect();
        if candidates.is_empty() {
            return Ok(None);
        }
        let requests = candidates
            .iter()
            .map(|&d| StoreRequest::ZCard {
                key: self.cell(d, f).leaderboard(now).key().to_owned(),
            })
            .collect();
        let counts = self
            .store
            .execute_batch(requests)
            .await?
            .into_iter()
            .map(|reply| reply.into_len())
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let chosen = candidates
            .iter()
            .zip(&counts)
            .find(|(_, &count)| count as i64 >= threshold)
            .or_else(|| {
                candidates
                    .iter()
                    .zip(&counts)
                    .filter(|(_, &count)| count > 0)
                    .fold(None, |best: Option<(&usize, &usize)>, cur| match best {
                        Some(b) if b.1 >= cur.1 => Some(b),
                        _ => Some(cur),
                    })
            });
        let Some((&d, _)) = chosen else {
            return Ok(None);
        };

        let dimension = self.dimensions[d].name.clone();
        debug!(base_key = %self.base_key, %dimension, feature, "showcase picked dimension");
        let entries = self
            .top(&dimension, feature, threshold, filter)
            .await?;
        Ok(Some(Showcase {
            dimension,
            feature: feature.to_owned(),
            entries,
        }))
    }

    /// Entry count of every cell, read in one atomic batch.
    pub async fn count(&self) -> Result<MatrixCounts> {
        let now = self.now();
        let mut cells = Vec::new();
        let mut requests = Vec::new();
        for (d, dimension) in self.dimensions.iter().enumerate() {
            for (f, feature) in self.features.iter().enumerate() {
                cells.push((dimension.name.as_str(), feature.name.as_str()));
                requests.push(StoreRequest::ZCard {
                    key: self.cell(d, f).leaderboard(now).key().to_owned(),
                });
            }
        }

        let mut counts = MatrixCounts::new();
        if requests.is_empty() {
            return Ok(counts);
        }
        let replies = self.store.execute_batch(requests).await?;
        for ((dimension, feature), reply) in cells.into_iter().zip(replies) {
            counts
                .entry(dimension.to_owned())
                .or_default()
                .insert(feature.to_owned(), reply.into_len()?);
        }
        Ok(counts)
    }
}
