//! Transport-agnostic domain layer: coin value objects, ports, the ledger
//! service, and payment settlement.

pub mod coins;
pub mod error;
pub mod ledger;
pub mod packages;
pub mod ports;
pub mod settlement;

pub use coins::{
    CoinAmount, CoinAmountValidationError, ProviderReference, ProviderReferenceValidationError,
    TransactionDraft, TransactionRecord, TransactionType, TransactionTypeParseError, UserId,
    UserIdValidationError,
};
pub use error::{Error, ErrorCode, ErrorValidationError};
pub use ledger::{CreditStrategy, JournaledCredit, LedgerService, TransactionalCredit};
pub use packages::{
    CARD_PACKAGES, CoinPackage, GATEWAY_PACKAGES, IMAGE_GENERATION_COST, POST_GENERATION_COST,
    card_package, gateway_package,
};
pub use settlement::{
    IntentState, IntentTransitionError, SettlementError, SettlementNotice, SettlementReceipt,
    SettlementService,
};
