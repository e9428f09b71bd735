use core::{
    cmp::Ordering,
    fmt::{Debug, Display},
    hash::{Hash, Hasher},
};

/// The subsystem an [Error] originates from.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ErrorType {
    /// Raised by a contract's own logic. The code is contract-defined.
    Contract = 0,
    /// Raised by the sandbox: traps, malformed modules, native panics.
    WasmVm = 1,
    /// Raised by the host's call-context machinery, including the query
    /// depth ceiling.
    Context = 2,
    /// Raised by the contract store.
    Storage = 3,
    /// Raised by the budget meter.
    Budget = 4,
    /// Raised when decoding or encoding values on the wire.
    Value = 5,
}

impl ErrorType {
    pub const fn name(&self) -> &'static str {
        match self {
            ErrorType::Contract => "Contract",
            ErrorType::WasmVm => "WasmVm",
            ErrorType::Context => "Context",
            ErrorType::Storage => "Storage",
            ErrorType::Budget => "Budget",
            ErrorType::Value => "Value",
        }
    }
}

#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ErrorCode {
    ArithDomain = 0,
    IndexBounds = 1,
    InvalidInput = 2,
    MissingValue = 3,
    ExistingValue = 4,
    ExceededLimit = 5,
    InvalidAction = 6,
    InternalError = 7,
    UnexpectedType = 8,
    UnexpectedSize = 9,
}

impl ErrorCode {
    const VARIANTS: [ErrorCode; 10] = [
        ErrorCode::ArithDomain,
        ErrorCode::IndexBounds,
        ErrorCode::InvalidInput,
        ErrorCode::MissingValue,
        ErrorCode::ExistingValue,
        ErrorCode::ExceededLimit,
        ErrorCode::InvalidAction,
        ErrorCode::InternalError,
        ErrorCode::UnexpectedType,
        ErrorCode::UnexpectedSize,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            ErrorCode::ArithDomain => "ArithDomain",
            ErrorCode::IndexBounds => "IndexBounds",
            ErrorCode::InvalidInput => "InvalidInput",
            ErrorCode::MissingValue => "MissingValue",
            ErrorCode::ExistingValue => "ExistingValue",
            ErrorCode::ExceededLimit => "ExceededLimit",
            ErrorCode::InvalidAction => "InvalidAction",
            ErrorCode::InternalError => "InternalError",
            ErrorCode::UnexpectedType => "UnexpectedType",
            ErrorCode::UnexpectedSize => "UnexpectedSize",
        }
    }
}

impl TryFrom<u32> for ErrorCode {
    type Error = ();
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::VARIANTS.get(value as usize).copied().ok_or(())
    }
}

/// A pair of an [ErrorType] and a 32-bit code. For every type other than
/// [ErrorType::Contract] the code is one of the [ErrorCode] values; contract
/// errors carry whatever code the contract chose.
#[derive(Copy, Clone)]
pub struct Error {
    type_: ErrorType,
    code: u32,
}

impl Hash for Error {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_.hash(state);
        self.code.hash(state);
    }
}

impl PartialEq for Error {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.type_ == other.type_ && self.code == other.code
    }
}

impl Eq for Error {}

impl PartialOrd for Error {
    #[inline(always)]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Error {
    #[inline(always)]
    fn cmp(&self, other: &Self) -> Ordering {
        (self.type_, self.code).cmp(&(other.type_, other.code))
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.type_ == ErrorType::Contract {
            write!(f, "Error({}, #{})", self.type_.name(), self.code)
        } else if let Ok(code) = ErrorCode::try_from(self.code) {
            write!(f, "Error({}, {})", self.type_.name(), code.name())
        } else {
            write!(f, "Error({}, #{})", self.type_.name(), self.code)
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        <Error as Debug>::fmt(self, f)
    }
}

impl std::error::Error for Error {}

impl<'a> From<&'a Error> for Error {
    fn from(value: &'a Error) -> Self {
        *value
    }
}

impl From<(ErrorType, ErrorCode)> for Error {
    fn from(value: (ErrorType, ErrorCode)) -> Self {
        Error::from_type_and_code(value.0, value.1)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_eof() {
            Error::from_type_and_code(ErrorType::Value, ErrorCode::UnexpectedSize)
        } else {
            Error::from_type_and_code(ErrorType::Value, ErrorCode::InvalidInput)
        }
    }
}

impl From<core::convert::Infallible> for Error {
    fn from(x: core::convert::Infallible) -> Self {
        match x {}
    }
}

impl Error {
    #[inline(always)]
    pub const fn is_type(&self, type_: ErrorType) -> bool {
        self.type_ as u32 == type_ as u32
    }

    #[inline(always)]
    pub const fn is_code(&self, code: ErrorCode) -> bool {
        self.code == code as u32
    }

    #[inline(always)]
    pub const fn get_type(&self) -> ErrorType {
        self.type_
    }

    #[inline(always)]
    pub const fn get_code(&self) -> u32 {
        self.code
    }

    #[inline(always)]
    pub const fn from_contract_error(code: u32) -> Error {
        Error {
            type_: ErrorType::Contract,
            code,
        }
    }

    #[inline(always)]
    pub const fn from_type_and_code(type_: ErrorType, code: ErrorCode) -> Error {
        Error {
            type_,
            code: code as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_names_type_and_code() {
        let e = Error::from_type_and_code(ErrorType::Budget, ErrorCode::ExceededLimit);
        assert_eq!(format!("{:?}", e), "Error(Budget, ExceededLimit)");
        let e = Error::from_contract_error(12);
        assert_eq!(format!("{:?}", e), "Error(Contract, #12)");
    }

    #[test]
    fn contract_codes_do_not_alias_host_codes() {
        let contract = Error::from_contract_error(ErrorCode::ExceededLimit as u32);
        assert!(contract.is_code(ErrorCode::ExceededLimit));
        assert!(!contract.is_type(ErrorType::Budget));
        assert_ne!(
            contract,
            Error::from_type_and_code(ErrorType::Budget, ErrorCode::ExceededLimit)
        );
    }

    #[test]
    fn json_errors_map_to_value_type() {
        let truncated = serde_json::from_slice::<serde_json::Value>(b"{\"a\":").unwrap_err();
        let e: Error = truncated.into();
        assert_eq!(
            e,
            (ErrorType::Value, ErrorCode::UnexpectedSize).into()
        );
        let garbage = serde_json::from_slice::<serde_json::Value>(b"}{").unwrap_err();
        let e: Error = garbage.into();
        assert_eq!(e, (ErrorType::Value, ErrorCode::InvalidInput).into());
    }
}
