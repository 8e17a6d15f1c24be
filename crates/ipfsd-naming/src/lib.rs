//! Mutable name record (IPNS) lifecycle and the routing facade.
//!
//! [`manager::NameManager`] owns publish/resolve/admit;
//! [`routing::RoutingFacade`] is the thin find/provide/get/put surface
//! over a DHT collaborator. Module organization follows this
//! workspace's layering: a `record` data model, an `error` enum
//! composing the crates below it, and the manager/facade on top.

pub mod error;
pub mod manager;
pub mod record;
pub mod routing;

pub use error::{NamingError, Result};
pub use manager::{peer_id_from_public_key, DnsLinkResolver, NameManager, PublishedName};
pub use record::{IpnsEntry, NameRecord, ValidityType};
pub use routing::{Dht, PubSub, PubSubHandler, ProviderSink, RoutingFacade, RoutingKey};
