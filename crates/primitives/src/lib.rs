//! Commonly used types for the chain database.
//!
//! This crate contains Ethereum-style primitive types: headers, blocks,
//! transactions and receipts, together with their canonical RLP encodings and
//! the chain parameter record shared by the consensus and storage layers.

#![warn(missing_debug_implementations, missing_docs, unreachable_pub, rustdoc::all)]
#![deny(unused_must_use, rust_2018_idioms)]

pub mod constants;

mod block;
mod chain_spec;
mod header;
pub mod proofs;
mod receipt;
mod transaction;

pub use block::{Block, SealedBlock};
pub use chain_spec::{ChainSpec, Era, GenesisConfig};
pub use header::{BlockNumHash, Header, SealedHeader};
pub use receipt::{Receipt, ReceiptWithBloom};
pub use transaction::TransactionSigned;

pub use alloy_primitives::{
    keccak256, Address, BlockHash, BlockNumber, Bloom, BloomInput, Bytes, Log, TxHash, B256, B64,
    U256,
};
