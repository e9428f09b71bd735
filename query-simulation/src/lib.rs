//! The externally reachable, read-only face of the query host.
//!
//! A [SmartQuerier] answers queries arriving from outside the sandbox (an RPC
//! endpoint, a CLI) with an explicit gas limit of its own. It is the single
//! place where out-of-budget and depth-ceiling aborts stop travelling and
//! become ordinary, reportable [QueryError]s.

mod config;
pub mod querier;

pub use config::QueryConfig;
pub use querier::{QueryError, SmartContractStateResponse, SmartQuerier};
