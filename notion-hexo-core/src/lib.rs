#![doc = "notion-hexo-core: incremental Notion to Hexo synchronisation."]

//! Everything between the Notion API and the files Hexo reads: the page
//! cache, sub-page discovery, the publish filter, tree diffing, front matter
//! and markdown rendering. Transport and the command line live in the
//! `notion-hexo` crate, which implements the traits in [`contract`].
//!
//! # Usage
//! Build a [`config::SyncConfig`], provide a [`contract::RemoteSource`] and
//! [`contract::AssetFetcher`], open a [`cache::DirectoryCache`] and call
//! [`synchronise::synchronise`].

pub mod cache;
pub mod config;
pub mod context;
pub mod contract;
pub mod download;
pub mod error;
pub mod filter;
pub mod front_matter;
mod fsutil;
pub mod id;
pub mod images;
pub mod markdown;
pub mod model;
pub mod output;
pub mod property;
pub mod state;
pub mod synchronise;
pub mod tree;
pub mod url;

pub use error::{ImageError, SchemaError, SyncError};
pub use id::PageId;
