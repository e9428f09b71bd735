use std::{rc::Rc, str::FromStr};

use log::{debug, warn};
use query_env_host::{
    budget::Budget, storage::ContractStore, Address, BlockInfo, ContractInfoResponse, Host,
    HostError,
};
use thiserror::Error;

use crate::QueryConfig;

/// Why an external query produced no data.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid contract address `{address}`")]
    InvalidAddress { address: String },
    #[error("query data is not valid JSON")]
    InvalidQueryData,
    #[error("no such contract: {address}")]
    NoSuchContract { address: String },
    #[error("out of gas: limit {limit}, used {used}")]
    OutOfGas { limit: u64, used: u64 },
    #[error("query depth limit of {limit} exceeded")]
    RecursionLimitExceeded { limit: u32 },
    #[error("contract query failed: {reason}")]
    ContractQueryFailed { reason: String },
    #[error("host error: {}", .0.error)]
    Host(HostError),
}

impl QueryError {
    pub fn is_out_of_gas(&self) -> bool {
        matches!(self, QueryError::OutOfGas { .. })
    }
}

/// A successful smart query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmartContractStateResponse {
    pub data: Vec<u8>,
    pub gas_used: u64,
}

/// Answers read-only queries from outside the sandbox, each under a gas
/// limit of its own.
pub struct SmartQuerier {
    host: Host,
    config: QueryConfig,
}

impl SmartQuerier {
    /// Wraps an already built host. `config` only supplies the default gas
    /// limit here; the host's cost model is whatever it was built with.
    pub fn new(host: Host, config: QueryConfig) -> Self {
        Self { host, config }
    }

    /// Builds a host over `store` from a validated `config`.
    pub fn from_config(
        config: QueryConfig,
        store: Rc<dyn ContractStore>,
        block_info: BlockInfo,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let host = config.build_host(store, block_info);
        Ok(Self::new(host, config))
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn default_gas_limit(&self) -> u64 {
        self.config.smart_query_gas_limit
    }

    /// Runs the query entry point of the contract at `address` with
    /// `query_data`, spending at most `gas_limit` (or the configured default).
    ///
    /// Each call starts a new call chain: a fresh budget and a fresh depth
    /// counter. Every abort raised inside the chain ends here.
    pub fn smart_contract_state(
        &self,
        address: &str,
        query_data: &[u8],
        gas_limit: Option<u64>,
    ) -> Result<SmartContractStateResponse, QueryError> {
        let contract = parse_address(address)?;
        if serde_json::from_slice::<serde::de::IgnoredAny>(query_data).is_err() {
            return Err(QueryError::InvalidQueryData);
        }
        self.ensure_contract(&contract, address)?;

        let limit = gas_limit.unwrap_or(self.config.smart_query_gas_limit);
        let budget = Budget::new(limit);
        debug!("smart query to {} with gas limit {}", address, limit);
        let res = self.host.query_smart(&budget, &contract, query_data);
        let used = budget.get_consumed().map_err(QueryError::Host)?;
        self.flush_diagnostics();
        match res {
            Ok(data) => {
                debug!("smart query to {} used {} of {} gas", address, used, limit);
                Ok(SmartContractStateResponse {
                    data,
                    gas_used: used,
                })
            }
            Err(e) => Err(self.convert_error(e, address, limit, used)),
        }
    }

    /// Reads one key of a contract's persisted state.
    pub fn raw_contract_state(
        &self,
        address: &str,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>, QueryError> {
        let contract = parse_address(address)?;
        self.ensure_contract(&contract, address)?;
        let limit = self.config.smart_query_gas_limit;
        let budget = Budget::new(limit);
        let res = self.host.query_raw_state(&budget, &contract, key);
        let used = budget.get_consumed().map_err(QueryError::Host)?;
        res.map_err(|e| self.convert_error(e, address, limit, used))
    }

    pub fn contract_info(&self, address: &str) -> Result<ContractInfoResponse, QueryError> {
        let contract = parse_address(address)?;
        self.ensure_contract(&contract, address)?;
        let limit = self.config.smart_query_gas_limit;
        let budget = Budget::new(limit);
        let res = self.host.query_contract_info(&budget, &contract);
        let used = budget.get_consumed().map_err(QueryError::Host)?;
        res.map_err(|e| self.convert_error(e, address, limit, used))
    }

    fn ensure_contract(&self, contract: &Address, address: &str) -> Result<(), QueryError> {
        if self.host.contract_exists(contract).map_err(QueryError::Host)? {
            Ok(())
        } else {
            Err(QueryError::NoSuchContract {
                address: address.to_string(),
            })
        }
    }

    fn convert_error(&self, e: HostError, address: &str, limit: u64, used: u64) -> QueryError {
        if e.is_out_of_budget() {
            warn!(
                "query to {} ran out of gas: limit {}, used {}",
                address, limit, used
            );
            QueryError::OutOfGas { limit, used }
        } else if e.is_recursion_limit() {
            warn!("query to {} exceeded the query depth limit", address);
            QueryError::RecursionLimitExceeded {
                limit: self.host.max_query_depth(),
            }
        } else if e.is_recoverable() {
            QueryError::ContractQueryFailed { reason: e.reason() }
        } else {
            warn!("query to {} aborted: {:?}", address, e);
            QueryError::Host(e)
        }
    }

    fn flush_diagnostics(&self) {
        if !self.host.is_diagnostics_enabled() {
            return;
        }
        if let Ok(events) = self.host.get_events() {
            events.dump_to_debug_log();
        }
        if let Err(e) = self.host.clear_events() {
            warn!("failed to clear diagnostic events: {:?}", e);
        }
    }
}

fn parse_address(address: &str) -> Result<Address, QueryError> {
    Address::from_str(address).map_err(|_| QueryError::InvalidAddress {
        address: address.to_string(),
    })
}
