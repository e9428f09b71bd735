//! Default values for every tunable of the query cost model. Hosts built
//! with explicit [CostParams](super::CostParams) or depth limits override
//! these.

/// Gas made available to a smart query issued from outside the sandbox when
/// the caller does not supply its own limit.
pub const DEFAULT_SMART_QUERY_GAS_LIMIT: u64 = 3_000_000;

/// The maximum number of nested smart queries on the stack at once. The
/// outermost query has depth 1.
pub const DEFAULT_QUERY_DEPTH_LIMIT: u32 = 10;

/// VM fuel units per unit of gas.
pub const DEFAULT_GAS_MULTIPLIER: u64 = 100;

/// Gas charged for loading a contract before running its query entry point.
pub const DEFAULT_INSTANCE_COST: u64 = 60_000;

/// Gas a calling frame pays for each nested smart query that returns to it.
pub const DEFAULT_SUB_QUERY_COST: u64 = 30;

/// Gas charged for a query that runs no contract code.
pub const DEFAULT_QUERY_FLAT_COST: u64 = 1_000;
