use super::limits::{
    DEFAULT_GAS_MULTIPLIER, DEFAULT_INSTANCE_COST, DEFAULT_QUERY_FLAT_COST,
    DEFAULT_SUB_QUERY_COST,
};

/// The constants of the query cost model, and the conversion between VM
/// fuel and gas.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CostParams {
    /// Fuel units per gas unit. A value of zero is treated as one.
    pub gas_multiplier: u64,
    pub instance_cost: u64,
    pub sub_query_cost: u64,
    pub query_flat_cost: u64,
}

impl Default for CostParams {
    fn default() -> Self {
        Self {
            gas_multiplier: DEFAULT_GAS_MULTIPLIER,
            instance_cost: DEFAULT_INSTANCE_COST,
            sub_query_cost: DEFAULT_SUB_QUERY_COST,
            query_flat_cost: DEFAULT_QUERY_FLAT_COST,
        }
    }
}

impl CostParams {
    fn multiplier(&self) -> u64 {
        self.gas_multiplier.max(1)
    }

    /// Converts VM fuel to gas, truncating. Fuel below one gas unit is not
    /// charged.
    pub fn to_budget_units(&self, vm_units: u64) -> u64 {
        vm_units / self.multiplier()
    }

    /// Converts gas to VM fuel, saturating at `u64::MAX`.
    pub fn to_vm_units(&self, budget_units: u64) -> u64 {
        budget_units.saturating_mul(self.multiplier())
    }
}
