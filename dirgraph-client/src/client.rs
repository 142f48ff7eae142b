//! High-level entry point tying the transport, registry and pagers together.

use crate::auth::TokenSource;
use crate::batch::{self, BatchRequest, BatchResponse, Dependencies};
use crate::collect::{collect, Collected, ItemLimit};
use crate::config::GraphConfig;
use crate::error::{GraphError, GraphResult};
use crate::http::HttpTransport;
use crate::object::DirectoryObject;
use crate::pager::{Pager, PagerOptions};
use crate::transport::{GraphRequest, GraphTransport};
use dirgraph_model::{default_class, object_path, EntityClass, Properties, TypeRegistry};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Client for the directory graph service.
#[derive(Clone)]
pub struct GraphClient {
    transport: Arc<dyn GraphTransport>,
    registry: Arc<TypeRegistry>,
    page_size: Option<u32>,
}

impl GraphClient {
    /// Creates an HTTP client using the process-wide type registry.
    pub fn new(config: GraphConfig, token: Arc<dyn TokenSource>) -> GraphResult<Self> {
        let page_size = config.page_size;
        let transport = HttpTransport::new(config, token)?;
        Ok(Self {
            transport: Arc::new(transport),
            registry: TypeRegistry::global(),
            page_size,
        })
    }

    /// Creates a client over an existing transport and registry.
    pub fn with_transport(transport: Arc<dyn GraphTransport>, registry: Arc<TypeRegistry>) -> Self {
        Self {
            transport,
            registry,
            page_size: None,
        }
    }

    /// Sets the `$top` sent with listing requests.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn transport(&self) -> &Arc<dyn GraphTransport> {
        &self.transport
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn tenant(&self) -> &str {
        self.transport.tenant()
    }

    /// Sends an arbitrary request and returns the decoded body.
    pub async fn call_graph_endpoint(&self, request: GraphRequest) -> GraphResult<Value> {
        Ok(self.transport.perform(request).await?.body)
    }

    /// Reads `{api_path}/{id}` and types the result through the registry.
    ///
    /// `id` is percent-encoded into a single path segment.
    #[instrument(skip(self))]
    pub async fn get_object(&self, api_path: &str, id: &str) -> GraphResult<DirectoryObject> {
        let properties = self.read_properties(api_path, id).await?;
        let fallback = default_class();
        let class = self
            .registry
            .resolve(&properties, None, &fallback)
            .unwrap_or(fallback);
        Ok(self.bind(&class, properties))
    }

    /// Reads a user by object ID or user principal name.
    pub async fn get_user(&self, id_or_upn: &str) -> GraphResult<DirectoryObject> {
        self.get_typed("user", id_or_upn).await
    }

    pub async fn get_group(&self, id: &str) -> GraphResult<DirectoryObject> {
        self.get_typed("group", id).await
    }

    /// Reads an application registration by its object ID (not its app ID).
    pub async fn get_app(&self, object_id: &str) -> GraphResult<DirectoryObject> {
        self.get_typed("application", object_id).await
    }

    pub async fn get_service_principal(&self, object_id: &str) -> GraphResult<DirectoryObject> {
        self.get_typed("servicePrincipal", object_id).await
    }

    /// Lists a collection and drains it according to `limit`.
    #[instrument(skip(self, options))]
    pub async fn list_objects(
        &self,
        api_path: &str,
        options: PagerOptions,
        limit: ItemLimit,
    ) -> GraphResult<Collected> {
        let mut request = GraphRequest::get(api_path);
        if let Some(top) = self.page_size {
            request = request.with_query("$top", top.to_string());
        }
        let first_page = self.call_graph_endpoint(request).await?;
        let pager = self.pager(first_page, options)?;
        collect(pager, limit).await
    }

    /// Wraps a first-page envelope obtained elsewhere.
    pub fn pager(&self, first_page: Value, options: PagerOptions) -> GraphResult<Pager> {
        Pager::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.registry),
            first_page,
            options,
        )
    }

    /// Sends `requests` as a single batch call.
    pub async fn call_batch(
        &self,
        requests: &[BatchRequest],
        dependencies: &Dependencies,
    ) -> GraphResult<Vec<BatchResponse>> {
        batch::call_batch(self.transport.as_ref(), requests, dependencies).await
    }

    async fn get_typed(&self, tag: &str, id: &str) -> GraphResult<DirectoryObject> {
        let class = self.registry.class(tag).ok_or_else(|| {
            GraphError::Config(format!("type '{tag}' is not registered"))
        })?;
        let properties = self.read_properties(class.api_path(), id).await?;
        Ok(self.bind(&class, properties))
    }

    async fn read_properties(&self, api_path: &str, id: &str) -> GraphResult<Properties> {
        let path = object_path(api_path, id);
        let body = self.call_graph_endpoint(GraphRequest::get(path.as_str())).await?;
        debug!(api_path, id, "Read directory object");
        match body {
            Value::Object(properties) => Ok(properties),
            _ => Err(GraphError::InvalidPage(format!(
                "{path} did not return a JSON object"
            ))),
        }
    }

    fn bind(&self, class: &EntityClass, properties: Properties) -> DirectoryObject {
        DirectoryObject::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.registry),
            class.construct(self.transport.tenant(), properties),
        )
    }
}

impl fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphClient")
            .field("tenant", &self.transport.tenant())
            .field("registry", &self.registry)
            .field("page_size", &self.page_size)
            .finish()
    }
}
