//! Shared application state.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::storage::Storage;

/// State shared by all request handlers. The storage handle sits behind one
/// async mutex, so store operations never interleave between their read and
/// write halves.
pub struct AppState {
    pub storage: Storage,
}

pub type SharedState = Arc<Mutex<AppState>>;
