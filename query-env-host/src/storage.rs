//! The read-only view of deployed contracts the host queries against.
//!
//! Persisting, migrating or instantiating contracts happens elsewhere; the
//! host only ever resolves an [Address] to a [ContractInstance] and reads its
//! state.

use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use sha2::{Digest, Sha256};

use crate::{
    host::error::TryBorrowOrErr, vm::QueryContract, Address, ErrorCode, ErrorType, HostError,
};

/// A deployed contract: its code, the metadata answered by contract-info
/// queries and its persisted key-value state.
#[derive(Clone)]
pub struct ContractInstance {
    pub code_id: u64,
    pub label: String,
    pub code: Rc<dyn QueryContract>,
    pub state: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl core::fmt::Debug for ContractInstance {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ContractInstance")
            .field("code_id", &self.code_id)
            .field("label", &self.label)
            .field("state_entries", &self.state.len())
            .finish()
    }
}

impl ContractInstance {
    pub fn new(code_id: u64, label: impl Into<String>, code: Rc<dyn QueryContract>) -> Self {
        Self {
            code_id,
            label: label.into(),
            code,
            state: BTreeMap::new(),
        }
    }

    pub fn with_state(mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        self.state.insert(key.into(), value.into());
        self
    }
}

pub trait ContractStore {
    /// Resolves `addr`, returning `None` when no contract lives there.
    fn get_contract(&self, addr: &Address) -> Result<Option<Rc<ContractInstance>>, HostError>;
}

/// A [ContractStore] backed by an in-memory map.
#[derive(Default)]
pub struct MemoryContractStore {
    contracts: RefCell<BTreeMap<Address, Rc<ContractInstance>>>,
}

impl MemoryContractStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `instance` at `addr`, failing with
    /// `(ErrorType::Storage, ErrorCode::ExistingValue)` if `addr` is taken.
    pub fn insert(&self, addr: Address, instance: ContractInstance) -> Result<(), HostError> {
        let mut contracts = self.contracts.try_borrow_mut_or_err()?;
        if contracts.contains_key(&addr) {
            return Err((ErrorType::Storage, ErrorCode::ExistingValue).into());
        }
        contracts.insert(addr, Rc::new(instance));
        Ok(())
    }

    /// Stores `instance` at the address derived from its code id and label
    /// and returns that address.
    pub fn register(&self, instance: ContractInstance) -> Result<Address, HostError> {
        let addr = derive_contract_address(instance.code_id, &instance.label);
        self.insert(addr, instance)?;
        Ok(addr)
    }

    pub fn len(&self) -> Result<usize, HostError> {
        Ok(self.contracts.try_borrow_or_err()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, HostError> {
        Ok(self.len()? == 0)
    }
}

impl ContractStore for MemoryContractStore {
    fn get_contract(&self, addr: &Address) -> Result<Option<Rc<ContractInstance>>, HostError> {
        Ok(self.contracts.try_borrow_or_err()?.get(addr).cloned())
    }
}

/// Deterministically derives a contract address from a code id and a label.
pub fn derive_contract_address(code_id: u64, label: &str) -> Address {
    let mut hasher = Sha256::new();
    hasher.update(b"contract");
    hasher.update(code_id.to_be_bytes());
    hasher.update(label.as_bytes());
    Address(hasher.finalize().into())
}
