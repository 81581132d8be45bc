//! # Shipped service client adapters.
//!
//! - [`TcpClient`]: connect = TCP reachability, close = shutdown. Works for any
//!   service that accepts TCP connections.
//! - `PgClient` (feature `postgres`): a sqlx connection pool.
//!
//! Both implement [`ServiceClient`](crate::ServiceClient) and plug into
//! [`ServiceClientFactory`](crate::ServiceClientFactory) or
//! [`ClientFactory`](crate::ClientFactory).

#[cfg(feature = "postgres")]
mod postgres;
mod tcp;

#[cfg(feature = "postgres")]
pub use postgres::{PgClient, PgOptions};
pub use tcp::{TcpClient, TcpOptions};
