pub mod compare;
pub mod config;
pub mod link;
pub mod store;

pub use compare::{Comparator, Levenshtein};
pub use link::{AssertionsWin, Link, LinkKind, LinkStatus, OverridePolicy};
pub use store::{AssertOutcome, ChangeQuery, ConnectionSpec, LinkStore, LinkStoreError};
