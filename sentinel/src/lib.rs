// Copyright (c) 2026 Meridian Ledger Contributors. MIT License.
// See LICENSE for details.

//! # Meridian Sentinel — Core Library
//!
//! The sentinel is the transaction-intake node of the Meridian two-phase-commit
//! ledger. It sits between end-user clients and the coordinator cluster that
//! drives the actual commit protocol over the sharded unspent-value set.
//!
//! A sentinel does three things, and does them well:
//!
//! 1. **Validate** — structural checks run synchronously; expensive spend-proof
//!    verification is amortized across many transactions via batching.
//! 2. **Execute** — forward a verified transaction (in condensed form) to the
//!    coordinator cluster and relay the commit outcome to the caller.
//! 3. **Attest** — gather corroborating attestations from peer sentinels so a
//!    caller can gain confidence in a transaction without committing it.
//!
//! ## Architecture
//!
//! - **transaction** — Transaction types, compaction, and the proof verifier.
//! - **batch** — The batched verification engine with its flush timer.
//! - **attestation** — Peer attestation types and the quorum gatherer.
//! - **coordinator** — The coordinator client boundary and submitter.
//! - **controller** — The orchestrator tying the pipeline together.
//! - **net** — Length-prefixed bincode transport for inbound and outbound RPC.
//! - **crypto** — Ed25519 keypair wrapper and content hashing.
//! - **config** — Tunables and their defaults.
//!
//! The sentinel is stateless across transactions: the only mutable state it
//! carries is the in-flight verification batch.

pub mod attestation;
pub mod batch;
pub mod config;
pub mod controller;
pub mod coordinator;
pub mod crypto;
pub mod net;
pub mod transaction;
