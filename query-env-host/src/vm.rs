//! The sandbox adapter.
//!
//! A contract is anything implementing [QueryContract]. It runs against a
//! [VmEnv], which is the only thing it can touch: it meters fuel, exposes the
//! contract's own state and the chain info, and is the contract's port for
//! issuing nested queries.
//!
//! Fuel is the sandbox's own unit of work. It is converted to gas at the
//! host's [CostParams](crate::budget::CostParams) rate and charged against the
//! frame's budget lazily: whenever the contract issues a nested query and
//! once more when it returns. Settling before every nested query is what
//! keeps a contract from burning most of its budget and then handing a fresh
//! full budget to a sub-query.

use std::{cell::RefCell, panic::AssertUnwindSafe, rc::Rc};

use log::trace;
use sha2::{Digest, Sha256};

use crate::{
    budget::{Budget, CostType, QueryDepth},
    host::error::TryBorrowOrErr,
    storage::ContractInstance,
    Address, BlockInfo, Error, ErrorCode, ErrorType, Host, HostError, QueryContext, QueryRequest,
    QueryResponse,
};

/// Fuel charged for hashing one input with [VmEnv::sha256].
pub const SHA256_FUEL: u64 = 10_033;

/// Fuel charged per byte of a state key or value read through
/// [VmEnv::read_state].
pub const STATE_READ_FUEL_PER_BYTE: u64 = 1;

/// The query entry point of a contract.
///
/// An implementation must route every fallible host interaction through `?`
/// (or otherwise give up once a host call has failed unrecoverably): the
/// sandbox remembers such failures and fails the whole invocation with them
/// no matter what the contract returns.
pub trait QueryContract {
    fn query(&self, env: &VmEnv, msg: &[u8]) -> Result<Vec<u8>, HostError>;
}

#[derive(Clone, Debug, Default)]
struct FuelMeter {
    limit: u64,
    used: u64,
    /// Gas already charged to the frame budget for `used`.
    settled: u64,
}

/// Everything a running contract can reach.
pub struct VmEnv<'a> {
    host: &'a Host,
    contract: Address,
    instance: Rc<ContractInstance>,
    budget: Budget,
    depth: &'a QueryDepth,
    fuel: RefCell<FuelMeter>,
    abort: RefCell<Option<HostError>>,
}

impl<'a> VmEnv<'a> {
    pub fn contract_address(&self) -> Address {
        self.contract
    }

    /// Depth of the smart query this contract is answering; the outermost
    /// query is at depth 1.
    pub fn depth(&self) -> u32 {
        self.depth.current()
    }

    pub fn block_info(&self) -> Result<BlockInfo, HostError> {
        self.check_aborted()?;
        self.latch(self.host.block_info())
    }

    pub fn fuel_used(&self) -> Result<u64, HostError> {
        let res = self.fuel.try_borrow_or_err().map(|fuel| fuel.used);
        self.latch(res.map_err(Into::into))
    }

    pub fn fuel_limit(&self) -> Result<u64, HostError> {
        let res = self.fuel.try_borrow_or_err().map(|fuel| fuel.limit);
        self.latch(res.map_err(Into::into))
    }

    /// Builds a recoverable error carrying a contract-defined `code`.
    pub fn contract_error(&self, code: u32, msg: &str) -> HostError {
        self.host
            .error_in_contract(Some(&self.contract), Error::from_contract_error(code), msg)
    }

    /// Burns `amount` fuel. Exceeding the fuel ceiling is an out-of-budget
    /// failure that aborts the invocation.
    pub fn charge_fuel(&self, amount: u64) -> Result<(), HostError> {
        self.check_aborted()?;
        let res = (|| -> Result<(), HostError> {
            let mut fuel = self.fuel.try_borrow_mut_or_err()?;
            match fuel.used.checked_add(amount) {
                Some(used) if used <= fuel.limit => {
                    fuel.used = used;
                    Ok(())
                }
                _ => Err(self.host.error_in_contract(
                    Some(&self.contract),
                    (ErrorType::Budget, ErrorCode::ExceededLimit).into(),
                    "contract ran out of fuel",
                )),
            }
        })();
        self.latch(res)
    }

    pub fn sha256(&self, data: &[u8]) -> Result<[u8; 32], HostError> {
        self.charge_fuel(SHA256_FUEL)?;
        Ok(Sha256::digest(data).into())
    }

    /// Reads one key of the contract's own persisted state.
    pub fn read_state(&self, key: &[u8]) -> Result<Option<Vec<u8>>, HostError> {
        let value = self.instance.state.get(key).cloned();
        let len = key.len() as u64 + value.as_ref().map_or(0, |v| v.len() as u64);
        self.charge_fuel(len.saturating_mul(STATE_READ_FUEL_PER_BYTE))?;
        Ok(value)
    }

    /// Issues a nested query through the host's query handler chain.
    ///
    /// Fuel burned so far is settled against the frame budget first, and the
    /// fuel ceiling is lowered afterwards to whatever the frame budget has
    /// left. Recoverable failures are returned for the contract to handle.
    /// Unrecoverable failures are returned too, but they also abort the whole
    /// invocation.
    pub fn query(&self, request: &QueryRequest) -> Result<Vec<u8>, HostError> {
        self.check_aborted()?;
        let res = (|| -> Result<Vec<u8>, HostError> {
            self.settle_fuel()?;
            let ctx = QueryContext::new(self.host, self.budget.clone(), self.depth);
            let res = self
                .host
                .query_handler()
                .handle_query(&ctx, &self.contract, request);
            match res {
                Err(e) if !e.is_recoverable() => Err(e),
                res => {
                    self.refresh_fuel_limit()?;
                    res
                }
            }
        })();
        self.latch(res)
    }

    /// The byte-level port: decodes a JSON [QueryRequest], answers it and
    /// encodes the outcome as a JSON [QueryResponse]. Only unrecoverable
    /// failures come back as `Err`.
    pub fn query_raw(&self, request: &[u8]) -> Result<Vec<u8>, HostError> {
        let response = match QueryRequest::from_json_slice(request) {
            Ok(request) => match self.query(&request) {
                Ok(data) => QueryResponse::Ok(data.into()),
                Err(e) if e.is_recoverable() => QueryResponse::Err(e.reason()),
                Err(e) => return Err(e),
            },
            Err(e) => QueryResponse::Err(format!("malformed query request: {:?}", e)),
        };
        Ok(response.to_json_vec()?)
    }

    fn check_aborted(&self) -> Result<(), HostError> {
        match &*self.abort.try_borrow_or_err()? {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn latch<T>(&self, res: Result<T, HostError>) -> Result<T, HostError> {
        if let Err(e) = &res {
            if !e.is_recoverable() {
                if let Ok(mut abort) = self.abort.try_borrow_mut() {
                    if abort.is_none() {
                        *abort = Some(e.clone());
                    }
                }
            }
        }
        res
    }

    /// Charges `floor(used / K) - settled` gas against the frame budget.
    fn settle_fuel(&self) -> Result<(), HostError> {
        let mut fuel = self.fuel.try_borrow_mut_or_err()?;
        let total = self.host.cost_params().to_budget_units(fuel.used);
        let due = total.saturating_sub(fuel.settled);
        self.budget.charge(CostType::VmExecution, due)?;
        fuel.settled = total;
        trace!(
            "settled {} gas of fuel for {} (total {})",
            due,
            self.contract,
            total
        );
        Ok(())
    }

    fn refresh_fuel_limit(&self) -> Result<(), HostError> {
        let remaining = self.budget.get_remaining()?;
        let mut fuel = self.fuel.try_borrow_mut_or_err()?;
        fuel.limit = self
            .host
            .cost_params()
            .to_vm_units(fuel.settled.saturating_add(remaining));
        Ok(())
    }
}

/// What a successful invocation produced.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VmOutput {
    pub data: Vec<u8>,
    pub fuel_used: u64,
}

/// One loaded contract, ready to answer a single query with a fuel ceiling
/// derived from its frame budget.
pub(crate) struct Vm<'a> {
    env: VmEnv<'a>,
}

impl<'a> Vm<'a> {
    pub(crate) fn new(
        host: &'a Host,
        contract: Address,
        instance: Rc<ContractInstance>,
        budget: Budget,
        depth: &'a QueryDepth,
    ) -> Result<Self, HostError> {
        let limit = host.cost_params().to_vm_units(budget.get_remaining()?);
        Ok(Self {
            env: VmEnv {
                host,
                contract,
                instance,
                budget,
                depth,
                fuel: RefCell::new(FuelMeter {
                    limit,
                    ..Default::default()
                }),
                abort: RefCell::new(None),
            },
        })
    }

    /// Runs the contract's query entry point. Native panics become a
    /// recoverable trap; an abort recorded during the call wins over
    /// whatever the contract returned.
    ///
    /// Only the host raises unrecoverable errors. One returned by the
    /// contract that the host never raised during this call is treated as a
    /// trap, so contracts cannot end the whole call chain on their own.
    pub(crate) fn invoke_query(&self, msg: &[u8]) -> Result<VmOutput, HostError> {
        let _span = tracy_span!("Vm::invoke_query");
        let env = &self.env;
        let code = env.instance.code.clone();
        let closure = AssertUnwindSafe(move || code.query(env, msg));
        #[cfg(any(test, feature = "testutils"))]
        let caught = crate::testutils::call_with_suppressed_panic_hook(closure);
        #[cfg(not(any(test, feature = "testutils")))]
        let caught = std::panic::catch_unwind(closure);

        let res = match caught {
            Ok(res) => res,
            Err(_) => Err(env.host.error_in_contract(
                Some(&env.contract),
                (ErrorType::WasmVm, ErrorCode::InvalidAction).into(),
                "contract panicked",
            )),
        };
        env.check_aborted()?;
        let data = match res {
            Err(e) if !e.is_recoverable() => {
                return Err(env.host.error_in_contract(
                    Some(&env.contract),
                    (ErrorType::WasmVm, ErrorCode::InvalidAction).into(),
                    "contract returned a host-reserved error",
                ))
            }
            res => res?,
        };
        Ok(VmOutput {
            data,
            fuel_used: env.fuel_used()?,
        })
    }

    /// Settles whatever fuel the contract burned since its last nested query.
    pub(crate) fn charge_unsettled_fuel(&self) -> Result<(), HostError> {
        self.env.settle_fuel()
    }
}
