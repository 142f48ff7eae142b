//! Lazy iteration over server-paginated results.
//!
//! A [`Pager`] wraps the first page of a listing and fetches each following
//! page only when the current one is handed out. It is stateful and
//! single-consumer: [`Pager::next_page`] takes `&mut self`, yields the
//! buffered page, and advances to the next cursor as a side effect.
//!
//! ```text
//!  FirstPage ──next_page──▶ HasMore ──next_page──▶ … ──▶ Exhausted
//!      │                                                    ▲
//!      └────────────── empty first page ────────────────────┘
//! ```
//!
//! Once exhausted, a pager stays exhausted and every read returns the
//! shape's empty result.

use crate::error::{GraphError, GraphResult};
use crate::object::DirectoryObject;
use crate::page::Page;
use crate::transport::{GraphRequest, GraphTransport};
use dirgraph_model::{odata, EntityClass, Table, TypeFilter, TypeRegistry};
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// How a pager reads envelopes and shapes its output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagerOptions {
    /// Envelope field holding the continuation cursor.
    pub next_link_field: String,
    /// Envelope field holding the item sequence.
    pub value_field: String,
    /// Materialize items as [`DirectoryObject`]s.
    pub materialize: bool,
    /// Arrange pages of records as rows and columns.
    pub simplify: bool,
    /// Only keep objects whose resolved type is in this set.
    #[serde(default)]
    pub type_filter: Option<TypeFilter>,
    /// Class for objects no registered type claims.
    #[serde(default)]
    pub default_class: Option<EntityClass>,
}

impl Default for PagerOptions {
    fn default() -> Self {
        Self {
            next_link_field: odata::NEXT_LINK.to_string(),
            value_field: odata::VALUE.to_string(),
            materialize: false,
            simplify: false,
            type_filter: None,
            default_class: None,
        }
    }
}

impl PagerOptions {
    /// Options for typed-object output.
    pub fn objects() -> Self {
        Self {
            materialize: true,
            ..Default::default()
        }
    }

    /// Options for tabular output.
    pub fn tabular() -> Self {
        Self {
            simplify: true,
            ..Default::default()
        }
    }

    pub fn with_type_filter(mut self, filter: TypeFilter) -> Self {
        self.type_filter = Some(filter);
        self
    }

    pub fn with_default_class(mut self, class: EntityClass) -> Self {
        self.default_class = Some(class);
        self
    }

    pub fn with_fields(
        mut self,
        value_field: impl Into<String>,
        next_link_field: impl Into<String>,
    ) -> Self {
        self.value_field = value_field.into();
        self.next_link_field = next_link_field.into();
        self
    }
}

/// Output shape of a pager, fixed when it is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageShape {
    /// Items exactly as received.
    Raw,
    /// Items resolved through the type registry.
    Objects,
    /// Rows under a shared column set.
    Tabular,
}

impl PageShape {
    /// The empty result for this shape.
    pub fn empty_result(self) -> PageResult {
        match self {
            PageShape::Raw => PageResult::Records(Vec::new()),
            PageShape::Objects => PageResult::Objects(Vec::new()),
            PageShape::Tabular => PageResult::Rows(Table::empty()),
        }
    }
}

/// Pager state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerState {
    FirstPage,
    HasMore,
    Exhausted,
}

/// One page of output in the pager's shape.
#[derive(Debug, Clone)]
pub enum PageResult {
    Records(Vec<Value>),
    Objects(Vec<DirectoryObject>),
    Rows(Table),
}

impl PageResult {
    pub fn shape(&self) -> PageShape {
        match self {
            PageResult::Records(_) => PageShape::Raw,
            PageResult::Objects(_) => PageShape::Objects,
            PageResult::Rows(_) => PageShape::Tabular,
        }
    }

    /// Number of items (rows for tabular output).
    pub fn len(&self) -> usize {
        match self {
            PageResult::Records(items) => items.len(),
            PageResult::Objects(objects) => objects.len(),
            PageResult::Rows(table) => table.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends `other`, which must have the same shape.
    pub fn append(&mut self, other: PageResult) -> GraphResult<()> {
        match (self, other) {
            (PageResult::Records(acc), PageResult::Records(more)) => acc.extend(more),
            (PageResult::Objects(acc), PageResult::Objects(more)) => acc.extend(more),
            (PageResult::Rows(acc), PageResult::Rows(more)) => acc.append(more),
            (acc, more) => {
                return Err(GraphError::InvalidPage(format!(
                    "cannot append {:?} output to {:?} output",
                    more.shape(),
                    acc.shape()
                )))
            }
        }
        Ok(())
    }

    /// Keeps the first `len` items.
    pub fn truncate(&mut self, len: usize) {
        match self {
            PageResult::Records(items) => items.truncate(len),
            PageResult::Objects(objects) => objects.truncate(len),
            PageResult::Rows(table) => table.truncate(len),
        }
    }

    pub fn into_records(self) -> Option<Vec<Value>> {
        match self {
            PageResult::Records(items) => Some(items),
            _ => None,
        }
    }

    pub fn into_objects(self) -> Option<Vec<DirectoryObject>> {
        match self {
            PageResult::Objects(objects) => Some(objects),
            _ => None,
        }
    }

    pub fn into_table(self) -> Option<Table> {
        match self {
            PageResult::Rows(table) => Some(table),
            _ => None,
        }
    }
}

/// A validated page held by the pager until it is read.
#[derive(Debug)]
enum PageBuffer {
    /// Raw or object-bound records (object shape guarantees JSON objects).
    Records(Vec<Value>),
    Rows(Table),
}

impl PageBuffer {
    fn is_empty(&self) -> bool {
        match self {
            PageBuffer::Records(items) => items.is_empty(),
            PageBuffer::Rows(table) => table.is_empty(),
        }
    }
}

/// Cursor-driven lazy sequence of pages.
pub struct Pager {
    transport: Arc<dyn GraphTransport>,
    registry: Arc<TypeRegistry>,
    default_class: Arc<EntityClass>,
    options: PagerOptions,
    shape: PageShape,
    state: PagerState,
    buffer: Option<PageBuffer>,
    next_link: Option<String>,
}

impl Pager {
    /// Wraps a first-page envelope.
    pub fn new(
        transport: Arc<dyn GraphTransport>,
        registry: Arc<TypeRegistry>,
        first_page: Value,
        options: PagerOptions,
    ) -> GraphResult<Self> {
        let page = Page::from_envelope(first_page, &options.value_field, &options.next_link_field)?;
        Self::from_page(transport, registry, page, options)
    }

    /// Wraps an already-parsed first page.
    ///
    /// The output shape is decided here: records that can be arranged as a
    /// table under `simplify` make the pager tabular for its whole life;
    /// otherwise `materialize` selects object output, else raw records.
    pub fn from_page(
        transport: Arc<dyn GraphTransport>,
        registry: Arc<TypeRegistry>,
        page: Page,
        options: PagerOptions,
    ) -> GraphResult<Self> {
        let shape = if options.simplify && page.items.iter().all(Value::is_object) {
            PageShape::Tabular
        } else if options.materialize {
            PageShape::Objects
        } else {
            PageShape::Raw
        };

        let default_class = options
            .default_class
            .clone()
            .map(Arc::new)
            .unwrap_or_else(dirgraph_model::default_class);

        let mut pager = Self {
            transport,
            registry,
            default_class,
            options,
            shape,
            state: PagerState::Exhausted,
            buffer: None,
            next_link: None,
        };

        let buffer = pager.ingest(page.items)?;
        if !buffer.is_empty() {
            pager.state = PagerState::FirstPage;
            pager.buffer = Some(buffer);
            pager.next_link = page.next_link;
        }

        debug!(shape = ?pager.shape, state = ?pager.state, "Created pager");
        Ok(pager)
    }

    /// Whether a read would return data. Pure query.
    pub fn has_data(&self) -> bool {
        self.state != PagerState::Exhausted
    }

    pub fn shape(&self) -> PageShape {
        self.shape
    }

    pub fn state(&self) -> PagerState {
        self.state
    }

    /// Cursor for the page after the buffered one.
    pub fn next_link(&self) -> Option<&str> {
        self.next_link.as_deref()
    }

    pub fn options(&self) -> &PagerOptions {
        &self.options
    }

    /// Returns the buffered page and fetches the next one.
    ///
    /// If fetching the next page fails, the error is returned and the pager
    /// is left exactly as it was, so the same read can be retried. After
    /// exhaustion this returns the shape's empty result.
    pub async fn next_page(&mut self) -> GraphResult<PageResult> {
        if self.buffer.is_none() {
            return Ok(self.shape.empty_result());
        }

        let fetched = self.fetch_non_empty().await?;

        let Some(current) = self.buffer.take() else {
            return Ok(self.shape.empty_result());
        };

        match fetched {
            Some((buffer, next_link)) => {
                self.buffer = Some(buffer);
                self.next_link = next_link;
                self.state = PagerState::HasMore;
            }
            None => {
                self.next_link = None;
                self.state = PagerState::Exhausted;
                debug!("Pager exhausted");
            }
        }

        Ok(self.materialize(current))
    }

    /// Consumes the pager as a stream of pages.
    pub fn into_stream(self) -> impl Stream<Item = GraphResult<PageResult>> + Send {
        futures::stream::try_unfold(self, |mut pager| async move {
            if !pager.has_data() {
                return Ok(None);
            }
            let page = pager.next_page().await?;
            Ok(Some((page, pager)))
        })
    }

    /// Follows the cursor past empty pages until one carries items.
    ///
    /// Returns `None` once the cursor runs out. Nothing is committed to the
    /// pager, so an error leaves it untouched.
    async fn fetch_non_empty(&self) -> GraphResult<Option<(PageBuffer, Option<String>)>> {
        let mut link = self.next_link.clone();
        while let Some(current) = link {
            let (buffer, next_link) = self.fetch(&current).await?;
            if !buffer.is_empty() {
                return Ok(Some((buffer, next_link)));
            }
            if next_link.as_deref() == Some(current.as_str()) {
                return Err(GraphError::InvalidPage(format!(
                    "empty page links back to itself: {current}"
                )));
            }
            debug!(next_link = ?next_link, "Skipping empty page");
            link = next_link;
        }
        Ok(None)
    }

    async fn fetch(&self, link: &str) -> GraphResult<(PageBuffer, Option<String>)> {
        debug!(next_link = %link, "Fetching next page");
        let response = self.transport.perform(GraphRequest::url(link)).await?;
        let page = Page::from_envelope(
            response.body,
            &self.options.value_field,
            &self.options.next_link_field,
        )?;
        let buffer = self.ingest(page.items)?;
        Ok((buffer, page.next_link))
    }

    /// Validates raw items against the pager's shape.
    fn ingest(&self, items: Vec<Value>) -> GraphResult<PageBuffer> {
        match self.shape {
            PageShape::Tabular => Ok(PageBuffer::Rows(Table::from_records(&items).map_err(
                |e| GraphError::InvalidPage(format!("page cannot be tabulated: {e}")),
            )?)),
            PageShape::Objects => {
                if let Some(pos) = items.iter().position(|item| !item.is_object()) {
                    return Err(GraphError::InvalidPage(format!(
                        "item {pos} is not an object and cannot be materialized"
                    )));
                }
                Ok(PageBuffer::Records(items))
            }
            PageShape::Raw => Ok(PageBuffer::Records(items)),
        }
    }

    fn materialize(&self, buffer: PageBuffer) -> PageResult {
        match (self.shape, buffer) {
            (_, PageBuffer::Rows(table)) => PageResult::Rows(table),
            (PageShape::Objects, PageBuffer::Records(items)) => {
                PageResult::Objects(self.build_objects(items))
            }
            (_, PageBuffer::Records(items)) => PageResult::Records(items),
        }
    }

    /// Resolves each record to a class; records the filter rejects are dropped.
    fn build_objects(&self, items: Vec<Value>) -> Vec<DirectoryObject> {
        let tenant = self.transport.tenant().to_string();
        items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(properties) => Some(properties),
                _ => None,
            })
            .filter_map(|properties| {
                let class = self.registry.resolve(
                    &properties,
                    self.options.type_filter.as_ref(),
                    &self.default_class,
                )?;
                Some(DirectoryObject::new(
                    Arc::clone(&self.transport),
                    Arc::clone(&self.registry),
                    class.construct(&tenant, properties),
                ))
            })
            .collect()
    }
}

impl fmt::Debug for Pager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pager")
            .field("shape", &self.shape)
            .field("state", &self.state)
            .field("next_link", &self.next_link)
            .finish_non_exhaustive()
    }
}
