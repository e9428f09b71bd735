use crate::{Error, ErrorCode, ErrorType};
use core::{fmt::Display, str::FromStr};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Length in bytes of a contract id.
pub const ADDRESS_BYTES: usize = 32;

/// The address of a contract instance: a 32-byte id that is rendered and
/// parsed as a strkey (`C...`, 56 characters).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Address(pub [u8; ADDRESS_BYTES]);

impl Address {
    pub const fn from_bytes(bytes: [u8; ADDRESS_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_BYTES] {
        &self.0
    }

    pub fn to_strkey(&self) -> String {
        stellar_strkey::Strkey::Contract(stellar_strkey::Contract(self.0)).to_string()
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let strkey = stellar_strkey::Contract(self.0);
        write!(f, "{}", strkey)
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match stellar_strkey::Strkey::from_string(s) {
            Ok(stellar_strkey::Strkey::Contract(stellar_strkey::Contract(id))) => Ok(Self(id)),
            // A well-formed strkey of some other kind (eg. an account key)
            // is still not a contract address.
            Ok(_) => Err(Error::from_type_and_code(
                ErrorType::Value,
                ErrorCode::UnexpectedType,
            )),
            Err(_) => Err(Error::from_type_and_code(
                ErrorType::Value,
                ErrorCode::InvalidInput,
            )),
        }
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_strkey())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_str(&s).map_err(|e| de::Error::custom(format!("invalid address: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strkey_roundtrip() {
        let addr = Address([7; ADDRESS_BYTES]);
        let s = addr.to_string();
        assert_eq!(s.len(), 56);
        assert!(s.starts_with('C'));
        assert_eq!(s, addr.to_strkey());
        assert_eq!(Address::from_str(&s).unwrap(), addr);
    }

    #[test]
    fn rejects_non_contract_strkeys() {
        let account = stellar_strkey::ed25519::PublicKey([1; 32]).to_string();
        assert_eq!(
            Address::from_str(&account),
            Err(Error::from_type_and_code(
                ErrorType::Value,
                ErrorCode::UnexpectedType
            ))
        );
        assert_eq!(
            Address::from_str("not-an-address"),
            Err(Error::from_type_and_code(
                ErrorType::Value,
                ErrorCode::InvalidInput
            ))
        );
    }
}
