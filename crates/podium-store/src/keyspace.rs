//! The keyspace: a flat map of key → sorted set.
//!
//! A `Keyspace` owns an `AHashMap<Box<str>, SortedSet>` and implements the
//! single-key sorted-set primitives. Keys come into existence on their
//! first write and are deleted as soon as their set becomes empty, so an
//! empty collection and a missing one are indistinguishable.

use ahash::AHashMap;

use crate::script::ScriptContext;
use crate::sorted_set::SortedSet;
use crate::Order;

/// The sorted-set keyspace owned by the store task.
///
/// All operations are single-threaded, with no internal locking. Atomicity of
/// batches and scripts comes from the store task running each message to
/// completion before looking at the next.
#[derive(Debug, Default)]
pub struct Keyspace {
    entries: AHashMap<Box<str>, SortedSet>,
}

impl Keyspace {
    /// Creates a new, empty keyspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the keyspace holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if the key exists.
    pub fn exists(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Scans keys starting from a cursor position.
    ///
    /// Returns the next cursor (0 if scan complete) and a batch of keys.
    /// The `pattern` argument supports glob-style matching (`*`, `?`, `[abc]`).
    /// The cursor is a position in the map's iteration order, so keys
    /// written during a scan may be missed or repeated.
    pub fn scan_keys(&self, cursor: u64, count: usize, pattern: Option<&str>) -> (u64, Vec<String>) {
        let target_count = if count == 0 { 10 } else { count };
        let mut keys = Vec::with_capacity(target_count);
        let compiled = pattern.map(GlobPattern::new);

        for (position, key) in self.entries.keys().enumerate().skip(cursor as usize) {
            if compiled.as_ref().map_or(true, |pat| pat.matches(key)) {
                keys.push(String::from(&**key));
            }
            if keys.len() >= target_count {
                return ((position + 1) as u64, keys);
            }
        }

        (0, keys)
    }

    /// Runs `f` against an existing set, deleting the key if `f` leaves it
    /// empty. Returns `None` when the key does not exist.
    fn with_set_mut<T>(&mut self, key: &str, f: impl FnOnce(&mut SortedSet) -> T) -> Option<T> {
        let set = self.entries.get_mut(key)?;
        let result = f(set);
        if set.is_empty() {
            self.entries.remove(key);
        }
        Some(result)
    }

    fn set_or_insert(&mut self, key: &str) -> &mut SortedSet {
        if !self.entries.contains_key(key) {
            self.entries.insert(Box::from(key), SortedSet::new());
        }
        match self.entries.get_mut(key) {
            Some(set) => set,
            None => unreachable!("key inserted above"),
        }
    }
}

impl ScriptContext for Keyspace {
    fn zadd(&mut self, key: &str, members: &[(f64, String)]) -> usize {
        if members.is_empty() {
            return 0;
        }
        let set = self.set_or_insert(key);
        members
            .iter()
            .filter(|(score, member)| set.add(member, *score))
            .count()
    }

    fn zincrby(&mut self, key: &str, member: &str, delta: f64) -> f64 {
        self.set_or_insert(key).incr(member, delta)
    }

    fn zrem(&mut self, key: &str, members: &[String]) -> Vec<String> {
        self.with_set_mut(key, |set| {
            members
                .iter()
                .filter(|m| set.remove(m))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
    }

    fn zremrangebyrank(&mut self, key: &str, start: i64, stop: i64) -> usize {
        self.with_set_mut(key, |set| set.remove_range_by_rank(start, stop))
            .unwrap_or(0)
    }

    fn zscore(&self, key: &str, member: &str) -> Option<f64> {
        self.entries.get(key)?.score(member)
    }

    fn zrank(&self, key: &str, member: &str, order: Order) -> Option<usize> {
        self.entries.get(key)?.rank(member, order)
    }

    fn zcard(&self, key: &str) -> usize {
        self.entries.get(key).map_or(0, SortedSet::len)
    }

    fn zrange(&self, key: &str, start: i64, stop: i64, order: Order) -> Vec<(String, f64)> {
        match self.entries.get(key) {
            Some(set) => set
                .range_by_rank(start, stop, order)
                .into_iter()
                .map(|(m, s)| (m.to_owned(), s))
                .collect(),
            None => Vec::new(),
        }
    }

    fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> Vec<(String, f64)> {
        match self.entries.get(key) {
            Some(set) => set
                .range_by_score(min, max)
                .into_iter()
                .map(|(m, s)| (m.to_owned(), s))
                .collect(),
            None => Vec::new(),
        }
    }

    fn del(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }
}

/// Returns true if `text` matches the glob `pattern`.
///
/// Supports `*` (any run of characters), `?` (any single character) and
/// `[abc]` / `[^abc]` character classes. A backslash makes the next
/// character literal.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    GlobPattern::new(pattern).matches(text)
}

/// Pre-compiled glob pattern that avoids re-allocating pattern chars
/// on every match call. Used by SCAN, where the same pattern is tested
/// against every key in the keyspace.
struct GlobPattern {
    chars: Vec<char>,
}

impl GlobPattern {
    fn new(pattern: &str) -> Self {
        Self {
            chars: pattern.chars().collect(),
        }
    }

    /// Iterative two-pointer match with backtracking to the last `*`.
    fn matches(&self, text: &str) -> bool {
        let pat = &self.chars;
        let txt: Vec<char> = text.chars().collect();

        let mut pi = 0;
        let mut ti = 0;

        // backtracking state for the most recent '*'
        let mut star_pi: Option<usize> = None;
        let mut star_ti = 0;

        while ti < txt.len() || pi < pat.len() {
            if pi < pat.len() {
                match pat[pi] {
                    '*' => {
                        star_pi = Some(pi);
                        star_ti = ti;
                        pi += 1;
                        continue;
                    }
                    '?' if ti < txt.len() => {
                        pi += 1;
                        ti += 1;
                        continue;
                    }
                    '[' if ti < txt.len() => {
                        let tc = txt[ti];
                        let mut j = pi + 1;
                        let mut negated = false;
                        let mut matched = false;

                        if j < pat.len() && (pat[j] == '^' || pat[j] == '!') {
                            negated = true;
                            j += 1;
                        }
                        while j < pat.len() && pat[j] != ']' {
                            if pat[j] == tc {
                                matched = true;
                            }
                            j += 1;
                        }
                        if negated {
                            matched = !matched;
                        }
                        if matched && j < pat.len() {
                            pi = j + 1;
                            ti += 1;
                            continue;
                        }
                    }
                    '\\' if pi + 1 < pat.len() && ti < txt.len() => {
                        if pat[pi + 1] == txt[ti] {
                            pi += 2;
                            ti += 1;
                            continue;
                        }
                    }
                    c if ti < txt.len() && c == txt[ti] => {
                        pi += 1;
                        ti += 1;
                        continue;
                    }
                    _ => {}
                }
            }

            // mismatch: retry from the last '*' consuming one more char
            match star_pi {
                Some(sp) => {
                    pi = sp + 1;
                    star_ti += 1;
                    ti = star_ti;
                    if ti > txt.len() {
                        return false;
                    }
                }
                None => return false,
            }
        }

        pi == pat.len()
    }
}
