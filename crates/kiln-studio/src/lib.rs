//! Session state for the Kiln asset-creation workspace: the event bus, the
//! cart, history and favorites, live settings, debounced search and the
//! persisted configuration document.

mod cart;
pub mod codec;
mod config;
mod creation;
mod error;
mod events;
mod recency;
mod search;
mod settings;
mod studio;

pub use cart::*;
pub use codec::{PersistedMap, PersistedValue, WriteMode};
pub use config::*;
pub use creation::*;
pub use error::*;
pub use events::*;
pub use recency::*;
pub use search::*;
pub use settings::*;
pub use studio::*;

pub use kiln_catalog as catalog;
