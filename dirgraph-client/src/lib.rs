//! Client core for a directory graph REST service (OData conventions).
//!
//! This crate handles:
//! - Lazy, cursor-driven iteration over paginated listings ([`Pager`])
//! - Draining pagers into one result with an optional item cap ([`collect`])
//! - Typing untyped payloads through a [`TypeRegistry`] into [`DirectoryObject`]s
//! - Compiling up to 20 requests into one `$batch` call ([`call_batch`])
//!
//! # Design Principles
//!
//! - **One transport seam**: every request goes through [`GraphTransport`],
//!   so paging and batching logic is testable without a network
//! - **Awaited, never spawned**: each call completes before the next starts
//! - **Fixed output shape**: a pager decides raw, object or tabular output
//!   on its first page and keeps it for its whole life
//!
//! # Envelopes
//!
//! A page is a JSON object with an item array under `value` and an optional
//! absolute continuation URL under `@odata.nextLink`. Both field names are
//! configurable through [`PagerOptions`].

mod auth;
pub mod batch;
mod client;
mod collect;
mod config;
mod error;
mod http;
mod object;
mod page;
mod pager;
pub mod transport;

pub use auth::{StaticToken, TokenSource};
pub use batch::{
    call_batch, BatchFailure, BatchRequest, BatchResponse, Dependencies, MAX_BATCH_SIZE,
};
pub use client::GraphClient;
pub use collect::{collect, collect_all, collect_at_most, Collected, ItemLimit};
pub use config::GraphConfig;
pub use error::{GraphError, GraphResult};
pub use http::HttpTransport;
pub use object::DirectoryObject;
pub use page::Page;
pub use pager::{PageResult, PageShape, Pager, PagerOptions, PagerState};
pub use transport::{GraphRequest, GraphResponse, GraphTransport, RequestTarget};

pub use dirgraph_model::{
    Entity, EntityClass, ModelError, Properties, Table, TypeFilter, TypeRegistry,
};
