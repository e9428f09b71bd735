//! The wire format of queries exchanged between a running contract and the
//! host. Requests and responses are JSON documents; binary payloads are hex
//! strings so that arbitrary byte sequences survive the trip unchanged.

use crate::{Address, Error};
use serde::{Deserialize, Serialize};

/// Opaque bytes, hex-encoded on the wire.
#[derive(Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Binary(#[serde(with = "hex::serde")] pub Vec<u8>);

impl Binary {
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl core::fmt::Debug for Binary {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Binary({})", hex::encode(&self.0))
    }
}

impl From<Vec<u8>> for Binary {
    fn from(v: Vec<u8>) -> Self {
        Binary(v)
    }
}

impl From<&[u8]> for Binary {
    fn from(v: &[u8]) -> Self {
        Binary(v.to_vec())
    }
}

impl AsRef<[u8]> for Binary {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A query a contract (or an external caller) asks the host to answer.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryRequest {
    Wasm(WasmQuery),
    Chain(ChainQuery),
}

/// Queries addressed to contracts.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WasmQuery {
    /// Runs the query entry point of `contract_addr` with `msg`. This is the
    /// only variant that executes contract code, and so the only one that
    /// can recurse.
    Smart { contract_addr: Address, msg: Binary },
    /// Reads one key from the persisted state of `contract_addr`.
    Raw { contract_addr: Address, key: Binary },
    /// Returns the stored metadata of `contract_addr`.
    ContractInfo { contract_addr: Address },
}

/// Chain-native queries, answered by the host without running any contract.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainQuery {
    BlockHeight,
    BlockTime,
    ChainId,
}

/// The envelope a query result travels in on the way back to a contract.
/// Only failures a contract may legitimately handle are ever encoded as
/// `Err`; resource exhaustion never reaches the contract as data.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryResponse {
    Ok(Binary),
    Err(String),
}

/// Metadata answered by [WasmQuery::ContractInfo].
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ContractInfoResponse {
    pub code_id: u64,
    pub label: String,
}

/// Answer to [WasmQuery::Raw]; `data` is `None` when the key is absent.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RawQueryResponse {
    pub data: Option<Binary>,
}

impl QueryRequest {
    pub fn smart(contract_addr: Address, msg: impl Into<Binary>) -> Self {
        QueryRequest::Wasm(WasmQuery::Smart {
            contract_addr,
            msg: msg.into(),
        })
    }

    pub fn to_json_vec(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, Error> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl QueryResponse {
    pub fn to_json_vec(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, Error> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn into_result(self) -> Result<Vec<u8>, String> {
        match self {
            QueryResponse::Ok(data) => Ok(data.into_vec()),
            QueryResponse::Err(reason) => Err(reason),
        }
    }
}

impl From<Result<Vec<u8>, String>> for QueryResponse {
    fn from(res: Result<Vec<u8>, String>) -> Self {
        match res {
            Ok(data) => QueryResponse::Ok(Binary(data)),
            Err(reason) => QueryResponse::Err(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorCode, ErrorType, ADDRESS_BYTES};
    use arbitrary::Unstructured;
    use pretty_assertions::assert_eq;

    fn addr(b: u8) -> Address {
        Address([b; ADDRESS_BYTES])
    }

    #[test]
    fn smart_query_wire_shape() {
        let req = QueryRequest::smart(addr(1), b"{}".to_vec());
        let json: serde_json::Value = serde_json::from_slice(&req.to_json_vec().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "wasm": {
                    "smart": {
                        "contract_addr": addr(1).to_string(),
                        "msg": "7b7d",
                    }
                }
            })
        );
        let chain = QueryRequest::Chain(ChainQuery::BlockHeight);
        assert_eq!(
            chain.to_json_vec().unwrap(),
            br#"{"chain":"block_height"}"#.to_vec()
        );
    }

    #[test]
    fn payloads_survive_the_wire() {
        // Every byte value, plus a spread of pseudo-random payloads of
        // varying length.
        let mut payloads: Vec<Vec<u8>> = vec![vec![], (0..=255u8).collect()];
        let seed: Vec<u8> = (0..4096u32)
            .map(|i| (i.wrapping_mul(2654435761) >> 13) as u8)
            .collect();
        let mut u = Unstructured::new(&seed);
        for _ in 0..32 {
            payloads.push(u.arbitrary::<Vec<u8>>().unwrap());
        }
        for p in payloads {
            let req = QueryRequest::Wasm(WasmQuery::Raw {
                contract_addr: addr(9),
                key: Binary(p.clone()),
            });
            assert_eq!(
                QueryRequest::from_json_slice(&req.to_json_vec().unwrap()).unwrap(),
                req
            );
            let resp = QueryResponse::Ok(Binary(p.clone()));
            assert_eq!(
                QueryResponse::from_json_slice(&resp.to_json_vec().unwrap())
                    .unwrap()
                    .into_result(),
                Ok(p)
            );
        }
    }

    #[test]
    fn malformed_requests_are_value_errors() {
        let bad_addr = br#"{"wasm":{"contract_info":{"contract_addr":"GABC"}}}"#;
        assert_eq!(
            QueryRequest::from_json_slice(bad_addr),
            Err(Error::from_type_and_code(
                ErrorType::Value,
                ErrorCode::InvalidInput
            ))
        );
        assert_eq!(
            QueryRequest::from_json_slice(br#"{"chain":"#),
            Err(Error::from_type_and_code(
                ErrorType::Value,
                ErrorCode::UnexpectedSize
            ))
        );
    }
}
