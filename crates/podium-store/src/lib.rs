//! podium-store: the ordered-set store podium ranks on top of.
//!
//! Defines the store capability contract ([`OrderedSetStore`]): single
//! sorted-set requests, atomic batches, and atomic [`Script`]s. Ships one
//! implementation, an in-process store task that owns a [`Keyspace`] and
//! executes every submission to completion before starting the next.

pub mod error;
pub mod keyspace;
pub mod request;
pub mod script;
pub mod sorted_set;
pub mod store;

pub use error::StoreError;
pub use keyspace::{glob_match, Keyspace};
pub use request::{StoreRequest, StoreResponse};
pub use script::{Script, ScriptContext};
pub use sorted_set::SortedSet;
pub use store::{spawn_store, OrderedSetStore, StoreConfig, StoreHandle};

/// Direction in which ranks are counted.
///
/// `Asc` gives rank 0 to the lowest score, `Desc` to the highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl Order {
    /// The opposite direction.
    pub fn reverse(self) -> Self {
        match self {
            Order::Asc => Order::Desc,
            Order::Desc => Order::Asc,
        }
    }
}
