use anyhow::{ensure, Context, Result};
use query_env_host::{
    budget::{
        CostParams, DEFAULT_GAS_MULTIPLIER, DEFAULT_INSTANCE_COST, DEFAULT_QUERY_DEPTH_LIMIT,
        DEFAULT_QUERY_FLAT_COST, DEFAULT_SMART_QUERY_GAS_LIMIT, DEFAULT_SUB_QUERY_COST,
    },
    storage::ContractStore,
    BlockInfo, Host, HostBuilder,
};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Node-level settings for answering queries.
///
/// Every field is optional in the serialized form; missing fields take the
/// host's defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryConfig {
    /// Gas available to an external smart query that does not bring its own
    /// limit.
    pub smart_query_gas_limit: u64,
    pub max_query_depth: u32,
    /// VM fuel per unit of gas.
    pub gas_multiplier: u64,
    pub instance_cost: u64,
    pub sub_query_cost: u64,
    pub query_flat_cost: u64,
    /// Record diagnostic events for failing queries and write them to the
    /// debug log.
    pub contract_debug_mode: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            smart_query_gas_limit: DEFAULT_SMART_QUERY_GAS_LIMIT,
            max_query_depth: DEFAULT_QUERY_DEPTH_LIMIT,
            gas_multiplier: DEFAULT_GAS_MULTIPLIER,
            instance_cost: DEFAULT_INSTANCE_COST,
            sub_query_cost: DEFAULT_SUB_QUERY_COST,
            query_flat_cost: DEFAULT_QUERY_FLAT_COST,
            contract_debug_mode: false,
        }
    }
}

impl QueryConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).context("failed to parse query configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.gas_multiplier > 0, "gas_multiplier must be non-zero");
        ensure!(self.max_query_depth > 0, "max_query_depth must be non-zero");
        ensure!(
            self.smart_query_gas_limit > 0,
            "smart_query_gas_limit must be non-zero"
        );
        Ok(())
    }

    pub fn cost_params(&self) -> CostParams {
        CostParams {
            gas_multiplier: self.gas_multiplier,
            instance_cost: self.instance_cost,
            sub_query_cost: self.sub_query_cost,
            query_flat_cost: self.query_flat_cost,
        }
    }

    /// Returns a builder for a host over `store` configured by `self`, for
    /// callers that want to add query handler decorators before building.
    pub fn host_builder(
        &self,
        store: Rc<dyn ContractStore>,
        block_info: BlockInfo,
    ) -> HostBuilder {
        HostBuilder::new(store)
            .with_block_info(block_info)
            .with_cost_params(self.cost_params())
            .with_max_query_depth(self.max_query_depth)
            .with_diagnostics(self.contract_debug_mode)
    }

    pub fn build_host(&self, store: Rc<dyn ContractStore>, block_info: BlockInfo) -> Host {
        self.host_builder(store, block_info).build()
    }
}
