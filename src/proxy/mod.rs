pub mod models;

pub use models::{ProxyNode, ResolvedIdentity};
