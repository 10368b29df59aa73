#![doc = "gdoc-flatten: download Google Docs and flatten them into markdown-like text."]

//! The pipeline is linear: authorize ([`auth`]), list the newest documents
//! in Drive and fetch each one from Docs ([`download`]), flatten the
//! structured content to text ([`preprocess`]) and write one file per
//! document. [`synchronise`] ties the steps together; [`cli`] is the thin
//! command-line layer on top.

pub mod auth;
pub mod cli;
pub mod config;
pub mod contract;
pub mod document;
pub mod download;
pub mod load_config;
pub mod preprocess;
pub mod synchronise;
