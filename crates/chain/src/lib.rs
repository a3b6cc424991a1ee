//! # Satoshi Chain
//!
//! The consensus data model: headers, transactions (legacy and segwit
//! serialization), blocks, outpoints, scripts, and witnesses, plus the
//! check/accept validation surface for each. Built on [`satoshi_core`]'s
//! byte codec and hash primitives; script *execution* lives in
//! `satoshi-script`, which depends on the types defined here.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod block;
pub mod error;
pub mod header;
pub mod input;
pub mod output;
pub mod point;
pub mod script;
pub mod transaction;
pub mod witness;

pub use block::{Block, BlockAcceptContext};
pub use header::{Header, HeaderAcceptContext};
pub use input::Input;
pub use output::Output;
pub use point::Point;
pub use script::{Operation, Script};
pub use transaction::{SpentOutput, Transaction, TxAcceptContext};
pub use witness::Witness;
