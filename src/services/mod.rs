//! # Per-service start specifications.
//!
//! Each service fixes the internal ports, environment, command and readiness wait
//! its image needs; callers only pick the image and, optionally, add hooks.
//!
//! | Service       | Ports              | Readiness                                          |
//! |---------------|--------------------|----------------------------------------------------|
//! | [`Redis`]     | 6379               | log "Ready to accept connections"                  |
//! | [`Postgres`]  | 5432               | log "database system is ready to accept connections" |
//! | [`MongoDb`]   | 27017              | log "Waiting for connections" AND port 27017 open  |
//! | [`Nats`]      | 4222, 6222, 8222   | regex ".*Server is ready"                          |
//! | [`CockroachDb`] | 26257, 8080      | HTTP GET /health on 8080                           |

mod cockroachdb;
mod mongodb;
mod nats;
mod postgres;
mod redis;

pub use cockroachdb::CockroachDb;
pub use mongodb::MongoDb;
pub use nats::Nats;
pub use postgres::Postgres;
pub use redis::Redis;
