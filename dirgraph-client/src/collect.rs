//! Draining a pager into a single result.

use crate::error::{GraphError, GraphResult};
use crate::pager::{PageResult, Pager};
use tracing::debug;

/// How many items a listing call should materialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemLimit {
    /// Hand back the pager unconsumed for manual iteration.
    Pager,
    /// Drain every page.
    All,
    /// Stop once this many items are collected.
    AtMost(usize),
}

/// Result of [`collect`]: either the untouched pager or the drained items.
#[derive(Debug)]
pub enum Collected {
    Pager(Pager),
    Items(PageResult),
}

impl Collected {
    pub fn into_items(self) -> Option<PageResult> {
        match self {
            Collected::Items(items) => Some(items),
            Collected::Pager(_) => None,
        }
    }

    pub fn into_pager(self) -> Option<Pager> {
        match self {
            Collected::Pager(pager) => Some(pager),
            Collected::Items(_) => None,
        }
    }
}

/// Drains `pager` according to `limit`.
///
/// Fails with [`GraphError::EmptyResult`] if the pager never had data.
/// Pages are concatenated in arrival order; if the last page overshoots an
/// [`ItemLimit::AtMost`] cap, its tail is dropped so exactly `n` items remain.
pub async fn collect(pager: Pager, limit: ItemLimit) -> GraphResult<Collected> {
    match limit {
        ItemLimit::Pager => Ok(Collected::Pager(pager)),
        ItemLimit::All => drain(pager, usize::MAX).await.map(Collected::Items),
        ItemLimit::AtMost(n) => drain(pager, n).await.map(Collected::Items),
    }
}

/// Drains every page of `pager`.
pub async fn collect_all(pager: Pager) -> GraphResult<PageResult> {
    drain(pager, usize::MAX).await
}

/// Drains `pager` until `max` items are collected.
pub async fn collect_at_most(pager: Pager, max: usize) -> GraphResult<PageResult> {
    drain(pager, max).await
}

async fn drain(mut pager: Pager, max: usize) -> GraphResult<PageResult> {
    if !pager.has_data() {
        return Err(GraphError::EmptyResult);
    }

    let mut collected = pager.shape().empty_result();
    let mut pages = 0usize;
    while pager.has_data() && collected.len() < max {
        collected.append(pager.next_page().await?)?;
        pages += 1;
    }

    if collected.len() > max {
        collected.truncate(max);
    }

    debug!(pages, items = collected.len(), "Collected pager results");
    Ok(collected)
}
