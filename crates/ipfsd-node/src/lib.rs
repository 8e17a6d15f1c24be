//! The node core's composition root: the Block Layer, Engine Core,
//! Repository Migrator, on-disk config, and the external-collaborator
//! interfaces (`Swarm`) the core depends on but does not implement.
//!
//! - [`block_layer`] composes the Block Store, Exchange Engine, Pin
//! Set, and Routing Facade behind a `put`/`get`/`stat`/`remove` surface.
//! - [`engine`] owns process lifecycle: starting per-peer exchange
//! handling and the optional background discovery walk.
//! - [`migrator`] steps the on-disk repository version up or down.
//! - [`config`] is the `serde`-backed `<root>/config` file.
//! - [`collaborators`] narrows the Swarm external collaborator to the
//! lifecycle surface the Engine Core drives directly.

pub mod block_layer;
pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod migrator;

pub use block_layer::{BlockLayer, ProviderDialer, PutOptions};
pub use config::RepoConfig;
pub use engine::Engine;
pub use error::{NodeError, Result};
pub use migrator::{Migration, Migrator};
