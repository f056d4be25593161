//! Runtime dispatch errors and their translation into readable messages.
//!
//! A dispatch error means the extrinsic made it into a block but the runtime
//! refused to execute it. Pallet (module) errors only carry indices on the
//! wire; a `ModuleErrorRegistry` built from chain metadata resolves them to
//! `section.name` plus docs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleError {
    /// Pallet index
    pub index: u8,
    /// Encoded error; the first byte is the variant index
    pub error: [u8; 4],
}

impl fmt::Display for ModuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.index, self.error[0])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenError {
    FundsUnavailable,
    OnlyProvider,
    BelowMinimum,
    CannotCreate,
    UnknownAsset,
    Frozen,
    Unsupported,
    CannotCreateHold,
    NotExpendable,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithmeticError {
    Underflow,
    Overflow,
    DivisionByZero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionalError {
    LimitReached,
    NoLayer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchError {
    Other(String),
    CannotLookup,
    BadOrigin,
    Module(ModuleError),
    ConsumerRemaining,
    NoProviders,
    TooManyConsumers,
    Token(TokenError),
    Arithmetic(ArithmeticError),
    Transactional(TransactionalError),
    Exhausted,
    Corruption,
    Unavailable,
    RootNotAllowed,
}

/// Metadata entry for a pallet error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleErrorMeta {
    pub section: String,
    pub name: String,
    pub docs: Vec<String>,
}

/// Resolves pallet error indices against chain metadata.
pub trait ModuleErrorRegistry: Send + Sync {
    fn find_meta_error(&self, error: &ModuleError) -> Option<ModuleErrorMeta>;
}

/// In-memory registry keyed by `(pallet index, error index)`.
#[derive(Debug, Clone, Default)]
pub struct StaticErrorRegistry {
    entries: HashMap<(u8, u8), ModuleErrorMeta>,
}

impl StaticErrorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_error(
        mut self,
        pallet_index: u8,
        error_index: u8,
        section: &str,
        name: &str,
        docs: &[&str],
    ) -> Self {
        self.entries.insert(
            (pallet_index, error_index),
            ModuleErrorMeta {
                section: section.to_string(),
                name: name.to_string(),
                docs: docs.iter().map(|d| d.to_string()).collect(),
            },
        );
        self
    }
}

impl ModuleErrorRegistry for StaticErrorRegistry {
    fn find_meta_error(&self, error: &ModuleError) -> Option<ModuleErrorMeta> {
        self.entries.get(&(error.index, error.error[0])).cloned()
    }
}

/// Maps a dispatch error to a readable message, prefixed with
/// `"<transaction_type> failed: "` (or `"Transaction failed: "`).
pub fn map_dispatch_error_to_message(
    error: &DispatchError,
    registry: Option<&dyn ModuleErrorRegistry>,
    transaction_type: Option<&str>,
) -> String {
    let prefix = match transaction_type {
        Some(kind) => format!("{} failed: ", kind),
        None => "Transaction failed: ".to_string(),
    };

    let detail = match error {
        DispatchError::Other(message) => message.clone(),
        DispatchError::CannotLookup => "Failed to lookup required data".to_string(),
        DispatchError::BadOrigin => "Invalid transaction origin".to_string(),
        DispatchError::Module(module) => describe_module_error(module, registry),
        DispatchError::ConsumerRemaining => {
            "Account has remaining consumers and cannot be destroyed".to_string()
        }
        DispatchError::NoProviders => {
            "Account cannot be created - no providers available".to_string()
        }
        DispatchError::TooManyConsumers => {
            "Account cannot be created - too many consumers".to_string()
        }
        DispatchError::Token(token) => describe_token_error(*token).to_string(),
        DispatchError::Arithmetic(arith) => match arith {
            ArithmeticError::Underflow => "Arithmetic underflow occurred",
            ArithmeticError::Overflow => "Arithmetic overflow occurred",
            ArithmeticError::DivisionByZero => "Division by zero error",
        }
        .to_string(),
        DispatchError::Transactional(layer) => match layer {
            TransactionalError::LimitReached => "Too many transactional layers",
            TransactionalError::NoLayer => "No transactional layer available",
        }
        .to_string(),
        DispatchError::Exhausted => "System resources exhausted".to_string(),
        DispatchError::Corruption => "System state corruption detected".to_string(),
        DispatchError::Unavailable => "Required resource is currently unavailable".to_string(),
        DispatchError::RootNotAllowed => {
            "Root origin is not allowed for this operation".to_string()
        }
    };

    format!("{}{}", prefix, detail)
}

fn describe_module_error(
    module: &ModuleError,
    registry: Option<&dyn ModuleErrorRegistry>,
) -> String {
    match registry.and_then(|r| r.find_meta_error(module)) {
        Some(meta) => {
            let docs = if meta.docs.is_empty() {
                String::new()
            } else {
                format!(" - {}", meta.docs.join(" "))
            };
            format!("{}.{}{}", meta.section, meta.name, docs)
        }
        None => {
            debug!("No metadata entry for module error {}", module);
            format!("Module error {}", module)
        }
    }
}

fn describe_token_error(error: TokenError) -> &'static str {
    match error {
        TokenError::FundsUnavailable => "Insufficient funds available",
        TokenError::OnlyProvider => "Cannot remove funds - account would lose only provider",
        TokenError::BelowMinimum => "Account balance would fall below minimum required",
        TokenError::CannotCreate => "Cannot create account with these funds",
        TokenError::UnknownAsset => "Unknown asset specified",
        TokenError::Frozen => "Funds are frozen and cannot be used",
        TokenError::Unsupported => "Operation not supported for this asset",
        TokenError::CannotCreateHold => "Cannot create account for held balance",
        TokenError::NotExpendable => "Withdrawal would cause unwanted loss of account",
        TokenError::Blocked => "Account cannot receive the assets",
    }
}
