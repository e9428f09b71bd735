use core::fmt::Debug;
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use crate::{
    budget::{Budget, CostParams, CostType, QueryDepth, DEFAULT_QUERY_DEPTH_LIMIT},
    events::Events,
    query::{ChainQueryHandler, QueryHandler, WasmQueryHandler},
    storage::{ContractInstance, ContractStore},
    Address, ContractInfoResponse, ErrorCode, ErrorType,
};

mod dispatch;
pub(crate) mod error;

pub use error::HostError;
use error::TryBorrowOrErr;

/// Chain metadata answered by chain-native queries.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BlockInfo {
    pub height: u64,
    /// Seconds since the unix epoch.
    pub time: u64,
    pub chain_id: String,
}

/// What a query handler needs to answer one query: the host, the budget of
/// the frame that issued the query and the depth counter of the call chain.
pub struct QueryContext<'a> {
    pub host: &'a Host,
    pub budget: Budget,
    pub depth: &'a QueryDepth,
}

impl<'a> QueryContext<'a> {
    pub fn new(host: &'a Host, budget: Budget, depth: &'a QueryDepth) -> Self {
        Self {
            host,
            budget,
            depth,
        }
    }
}

type QueryHandlerDecorator = Box<dyn FnOnce(Box<dyn QueryHandler>) -> Box<dyn QueryHandler>>;

/// Assembles a [Host]. Everything but the contract store has a default.
pub struct HostBuilder {
    store: Rc<dyn ContractStore>,
    block_info: BlockInfo,
    cost_params: CostParams,
    max_query_depth: u32,
    decorators: Vec<QueryHandlerDecorator>,
    diagnostics: bool,
}

impl HostBuilder {
    pub fn new(store: Rc<dyn ContractStore>) -> Self {
        Self {
            store,
            block_info: BlockInfo::default(),
            cost_params: CostParams::default(),
            max_query_depth: DEFAULT_QUERY_DEPTH_LIMIT,
            decorators: Vec::new(),
            diagnostics: false,
        }
    }

    pub fn with_block_info(mut self, block_info: BlockInfo) -> Self {
        self.block_info = block_info;
        self
    }

    pub fn with_cost_params(mut self, cost_params: CostParams) -> Self {
        self.cost_params = cost_params;
        self
    }

    pub fn with_max_query_depth(mut self, max_query_depth: u32) -> Self {
        self.max_query_depth = max_query_depth;
        self
    }

    /// Wraps the host's query handler chain. Decorators apply in the order
    /// they are added, so the last one added sees each query first.
    pub fn with_query_handler_decorator<F>(mut self, decorate: F) -> Self
    where
        F: FnOnce(Box<dyn QueryHandler>) -> Box<dyn QueryHandler> + 'static,
    {
        self.decorators.push(Box::new(decorate));
        self
    }

    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }

    pub fn build(self) -> Host {
        let base: Box<dyn QueryHandler> = Box::new(WasmQueryHandler::new(ChainQueryHandler));
        let query_handler = self
            .decorators
            .into_iter()
            .fold(base, |handler, decorate| decorate(handler));
        Host(Rc::new(HostImpl {
            store: self.store,
            block_info: RefCell::new(self.block_info),
            cost_params: self.cost_params,
            max_query_depth: self.max_query_depth,
            query_handler,
            events: RefCell::new(Events::default()),
            diagnostics: Cell::new(self.diagnostics),
            #[cfg(any(test, feature = "testutils"))]
            test_contracts: Default::default(),
        }))
    }
}

pub(crate) struct HostImpl {
    store: Rc<dyn ContractStore>,
    block_info: RefCell<BlockInfo>,
    cost_params: CostParams,
    max_query_depth: u32,
    query_handler: Box<dyn QueryHandler>,
    pub(crate) events: RefCell<Events>,
    diagnostics: Cell<bool>,
    // Contracts registered directly on the host by tests, consulted before
    // the store. Not covered by metering.
    #[cfg(any(test, feature = "testutils"))]
    test_contracts: RefCell<std::collections::BTreeMap<Address, Rc<ContractInstance>>>,
}

/// The query host. A cheap, clonable handle; clones share everything.
#[derive(Clone)]
pub struct Host(pub(crate) Rc<HostImpl>);

impl Debug for HostImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HostImpl(...)")
    }
}

impl Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Host({:x})", Rc::<HostImpl>::as_ptr(&self.0) as usize)
    }
}

impl Host {
    pub fn cost_params(&self) -> CostParams {
        self.0.cost_params
    }

    pub fn max_query_depth(&self) -> u32 {
        self.0.max_query_depth
    }

    pub(crate) fn query_handler(&self) -> &dyn QueryHandler {
        self.0.query_handler.as_ref()
    }

    pub fn block_info(&self) -> Result<BlockInfo, HostError> {
        Ok(self
            .0
            .block_info
            .try_borrow_or_err_with(self, "host.block_info")?
            .clone())
    }

    pub fn set_block_info(&self, block_info: BlockInfo) -> Result<(), HostError> {
        *self
            .0
            .block_info
            .try_borrow_mut_or_err_with(self, "host.block_info")? = block_info;
        Ok(())
    }

    pub fn enable_diagnostics(&self) {
        self.0.diagnostics.set(true)
    }

    pub fn is_diagnostics_enabled(&self) -> bool {
        self.0.diagnostics.get()
    }

    pub fn get_events(&self) -> Result<Events, HostError> {
        Ok(self.0.events.try_borrow_or_err()?.clone())
    }

    pub fn clear_events(&self) -> Result<(), HostError> {
        self.0.events.try_borrow_mut_or_err()?.0.clear();
        Ok(())
    }

    /// Runs a smart query against `contract` as a top-level call: a fresh
    /// depth counter is created, so this must only be used at the boundary
    /// where a call chain starts. All cost is charged to `budget`.
    ///
    /// Diagnostic events left over from the previous call chain are
    /// discarded first.
    pub fn query_smart(
        &self,
        budget: &Budget,
        contract: &Address,
        msg: &[u8],
    ) -> Result<Vec<u8>, HostError> {
        if self.is_diagnostics_enabled() {
            self.clear_events()?;
        }
        let depth = QueryDepth::new(self.max_query_depth());
        let ctx = QueryContext::new(self, budget.clone(), &depth);
        self.dispatch_smart_query(&ctx, contract, msg)
    }

    /// Reads one key of `contract`'s persisted state for a flat charge.
    pub fn query_raw_state(
        &self,
        budget: &Budget,
        contract: &Address,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>, HostError> {
        budget.charge(CostType::PassThroughQuery, self.0.cost_params.query_flat_cost)?;
        let instance = self.load_contract(contract)?;
        Ok(instance.state.get(key).cloned())
    }

    /// Returns `contract`'s metadata for a flat charge.
    pub fn query_contract_info(
        &self,
        budget: &Budget,
        contract: &Address,
    ) -> Result<ContractInfoResponse, HostError> {
        budget.charge(CostType::PassThroughQuery, self.0.cost_params.query_flat_cost)?;
        let instance = self.load_contract(contract)?;
        Ok(ContractInfoResponse {
            code_id: instance.code_id,
            label: instance.label.clone(),
        })
    }

    pub fn contract_exists(&self, contract: &Address) -> Result<bool, HostError> {
        Ok(self.lookup_contract(contract)?.is_some())
    }

    fn lookup_contract(
        &self,
        contract: &Address,
    ) -> Result<Option<Rc<ContractInstance>>, HostError> {
        #[cfg(any(test, feature = "testutils"))]
        {
            if let Some(instance) = self.0.test_contracts.try_borrow_or_err()?.get(contract) {
                return Ok(Some(instance.clone()));
            }
        }
        self.0.store.get_contract(contract)
    }

    pub(crate) fn load_contract(
        &self,
        contract: &Address,
    ) -> Result<Rc<ContractInstance>, HostError> {
        self.lookup_contract(contract)?.ok_or_else(|| {
            self.err(
                ErrorType::Storage,
                ErrorCode::MissingValue,
                &format!("no such contract: {}", contract),
            )
        })
    }
}

#[cfg(any(test, feature = "testutils"))]
impl Host {
    /// A host over an empty in-memory store with default settings.
    pub fn test_host() -> Self {
        HostBuilder::new(Rc::new(crate::storage::MemoryContractStore::new())).build()
    }

    /// Registers `code` under an address derived from `label`, bypassing
    /// the contract store.
    // "testutils" is not covered by budget metering.
    pub fn register_test_contract(
        &self,
        label: &str,
        code: Rc<dyn crate::vm::QueryContract>,
    ) -> Result<Address, HostError> {
        let mut contracts = self.0.test_contracts.try_borrow_mut_or_err()?;
        let code_id = contracts.len() as u64 + 1;
        let addr = crate::storage::derive_contract_address(code_id, label);
        if contracts.contains_key(&addr) {
            return Err(self.err(
                ErrorType::Storage,
                ErrorCode::ExistingValue,
                "test contract already registered",
            ));
        }
        contracts.insert(addr, Rc::new(ContractInstance::new(code_id, label, code)));
        Ok(addr)
    }
}
