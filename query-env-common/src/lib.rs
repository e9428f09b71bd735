//! The environment-common crate contains the types shared between the
//! metered query host and anything that talks to it:
//!
//!   - The [Error] type, a pair of an [ErrorType] naming the subsystem that
//!     failed and a code, used by every layer of the host.
//!   - The [Address] of a contract instance, rendered as a strkey.
//!   - The query wire format ([QueryRequest], [QueryResponse] and friends),
//!     which is what a sandboxed contract exchanges with the host when it
//!     queries chain state or other contracts.

mod address;
mod error;
mod query;

pub use address::{Address, ADDRESS_BYTES};
pub use error::{Error, ErrorCode, ErrorType};
pub use query::{
    Binary, ChainQuery, ContractInfoResponse, QueryRequest, QueryResponse, RawQueryResponse,
    WasmQuery,
};
