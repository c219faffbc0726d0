//! Interactive shell: command classification, the view cache that mirrors
//! store tables into the SQL engine, mutations, drift-aware queries, and the
//! line-oriented session on top of them.

use crate::{error::Result, interrupt::Interrupt, sql::engine::SqlEngine, store::TableStore};

pub mod cache;
pub mod clause;
pub mod command;
pub mod mutation;
pub mod render;
pub mod repl;
pub mod runner;
pub mod session;

pub use cache::ViewCache;
pub use command::{Command, CommandParser};
pub use session::{Reply, Session};

/// Everything one session owns. Only the session registers or unregisters
/// engine views, always through `views`.
pub struct SessionState<S: TableStore, G: SqlEngine> {
    pub store: S,
    pub engine: G,
    pub views: ViewCache,
    pub interrupt: Interrupt,
}

impl<S: TableStore, G: SqlEngine> SessionState<S, G> {
    /// Builds the state and registers a view for every table the store lists
    pub fn start(store: S, engine: G, interrupt: Interrupt) -> Result<Self> {
        let mut state = Self {
            store,
            engine,
            views: ViewCache::new(),
            interrupt,
        };
        state.views.refresh_all(&state.store, &mut state.engine)?;
        Ok(state)
    }
}
