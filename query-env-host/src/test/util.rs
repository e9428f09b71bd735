use std::rc::Rc;

use crate::{
    budget::Budget,
    testutils::{RecurseContract, RecurseResponse},
    vm::{QueryContract, VmEnv},
    Address, Error, Host, HostError, QueryRequest,
};

pub(crate) const C0: u64 = 60_000;
pub(crate) const SUB_QUERY: u64 = 30;
/// One RecurseContract frame doing 50 rounds of work.
pub(crate) const COST_50: u64 = 65_016;

impl Host {
    pub(crate) fn with_recurse_contract(self) -> Result<(Self, Address), HostError> {
        let addr = self.register_test_contract("recurse", Rc::new(RecurseContract))?;
        Ok((self, addr))
    }
}

pub(crate) fn decode_hashed(data: &[u8]) -> Vec<u8> {
    serde_json::from_slice::<RecurseResponse>(data)
        .unwrap()
        .hashed
        .into_vec()
}

pub(crate) fn run(
    host: &Host,
    limit: u64,
    addr: &Address,
    msg: &[u8],
) -> (Result<Vec<u8>, HostError>, u64) {
    let budget = Budget::new(limit);
    let res = host.query_smart(&budget, addr, msg);
    (res, budget.get_consumed().unwrap())
}

/// Panics as soon as it is called.
pub(crate) struct PanicContract;

impl QueryContract for PanicContract {
    fn query(&self, _env: &VmEnv, _msg: &[u8]) -> Result<Vec<u8>, HostError> {
        panic!("contract bug")
    }
}

/// Fails with `error` without ever touching the host.
pub(crate) struct ForgedErrorContract {
    pub(crate) error: Error,
}

impl QueryContract for ForgedErrorContract {
    fn query(&self, _env: &VmEnv, _msg: &[u8]) -> Result<Vec<u8>, HostError> {
        Err(self.error.into())
    }
}

/// Forwards its message as a smart query to `target` through the byte-level
/// port and returns the raw response envelope.
pub(crate) struct ForwardContract {
    pub(crate) target: Address,
}

impl QueryContract for ForwardContract {
    fn query(&self, env: &VmEnv, msg: &[u8]) -> Result<Vec<u8>, HostError> {
        let req = QueryRequest::smart(self.target, msg.to_vec());
        env.query_raw(&req.to_json_vec()?)
    }
}

/// Sends its message verbatim as a request through the byte-level port.
pub(crate) struct RawPortContract;

impl QueryContract for RawPortContract {
    fn query(&self, env: &VmEnv, msg: &[u8]) -> Result<Vec<u8>, HostError> {
        env.query_raw(msg)
    }
}

/// Queries `target` with the message, ignores the outcome and reports
/// success anyway.
pub(crate) struct SwallowContract {
    pub(crate) target: Address,
}

impl QueryContract for SwallowContract {
    fn query(&self, env: &VmEnv, msg: &[u8]) -> Result<Vec<u8>, HostError> {
        let req = QueryRequest::smart(self.target, msg.to_vec());
        let _ = env.query(&req);
        // Everything after an abort is refused as well.
        let _ = env.sha256(b"more work");
        Ok(b"swallowed".to_vec())
    }
}

/// Burns `fuel` and then queries `target` with the message.
pub(crate) struct BurnThenQueryContract {
    pub(crate) fuel: u64,
    pub(crate) target: Address,
}

impl QueryContract for BurnThenQueryContract {
    fn query(&self, env: &VmEnv, msg: &[u8]) -> Result<Vec<u8>, HostError> {
        env.charge_fuel(self.fuel)?;
        env.query(&QueryRequest::smart(self.target, msg.to_vec()))
    }
}

/// Reports its fuel ceiling before and after querying `target`.
pub(crate) struct FuelCeilingContract {
    pub(crate) target: Address,
}

impl QueryContract for FuelCeilingContract {
    fn query(&self, env: &VmEnv, msg: &[u8]) -> Result<Vec<u8>, HostError> {
        let before = env.fuel_limit()?;
        env.query(&QueryRequest::smart(self.target, msg.to_vec()))?;
        let after = env.fuel_limit()?;
        Ok(serde_json::to_vec(&(before, after))?)
    }
}
