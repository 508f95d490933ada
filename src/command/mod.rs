//! Administrative command routing.
//!
//! Requests are a tagged union keyed by command name with an explicit schema
//! per command. Unknown fields are rejected only where the underlying
//! contract demands it (`writeConcern`); everywhere else extras simply do
//! not exist in the schema.

mod dispatcher;
mod request;
mod router_cache;

pub use dispatcher::*;
pub use request::*;
pub(crate) use router_cache::*;
