//! This crate provides the [Host] type, the gas-metered query-dispatch core
//! of a smart-contract host. It runs contract query entry points inside a
//! sandbox adapter ([vm]) and accounts for every unit of work they perform,
//! including the work of nested smart queries issued from inside a running
//! contract.
//!
//! The crate also re-exports all of the content of the [query_env_common]
//! crate.
//!
//! The main pieces are:
//!
//!   - The [budget] module: the [Budget](budget::Budget) meter that charges
//!     are made against, the [CostParams](budget::CostParams) translating VM
//!     fuel into gas, and the [QueryDepth](budget::QueryDepth) ceiling on
//!     nested queries.
//!   - The [query] module: the [QueryHandler](query::QueryHandler) port a
//!     running contract queries through, and the decorators that observe it.
//!   - The [storage] module: where contract code and state are loaded from.
//!
//! Budget exhaustion and the depth ceiling are reported as [HostError]s for
//! which [HostError::is_recoverable] is false. Such errors must travel
//! unchanged to the top-level caller; no frame in between may turn them
//! into ordinary data.

#[macro_use]
mod macros;

pub mod budget;
pub mod events;
mod host;
pub mod query;
pub mod storage;
pub mod vm;

#[cfg(any(test, feature = "testutils"))]
pub mod testutils;

pub use host::{BlockInfo, Host, HostBuilder, HostError, QueryContext};
pub use query_env_common::*;
