//! # Vault Ledger Testkit
//!
//! Testing utilities for the vault ledger.
//!
//! - **Fixtures**: a [`TestVault`](fixtures::TestVault) over a temp
//!   directory with file-backed stores and a seeded key
//! - **Generators**: proptest strategies for arbitrary records
//! - **Vectors**: golden canonicalization cases with expected bytes and
//!   digests, for cross-implementation verification

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::TestVault;
pub use generators::arb_record;
pub use vectors::{all_vectors, GoldenVector};
