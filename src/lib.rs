pub mod classify;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod orchestrator;
pub mod rpc;
pub mod signer;
pub mod strkey;
pub mod tx_builder;
pub mod xdr;
