//! Directory objects bound to the transport they were read through.

use crate::collect::collect_all;
use crate::error::{GraphError, GraphResult};
use crate::pager::{Pager, PagerOptions};
use crate::transport::{GraphRequest, GraphTransport, RequestTarget};
use dirgraph_model::{Entity, Properties, TypeRegistry};
use reqwest::Method;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// A typed directory entity that can issue follow-up calls about itself.
///
/// Objects are addressed as `{api_path}/{id}`, so every operation except
/// reading local properties needs the payload to have carried an `id`.
#[derive(Clone)]
pub struct DirectoryObject {
    transport: Arc<dyn GraphTransport>,
    registry: Arc<TypeRegistry>,
    entity: Entity,
}

impl DirectoryObject {
    pub fn new(
        transport: Arc<dyn GraphTransport>,
        registry: Arc<TypeRegistry>,
        entity: Entity,
    ) -> Self {
        Self {
            transport,
            registry,
            entity,
        }
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn into_entity(self) -> Entity {
        self.entity
    }

    pub fn id(&self) -> Option<&str> {
        self.entity.id()
    }

    pub fn type_name(&self) -> &str {
        &self.entity.type_name
    }

    pub fn api_path(&self) -> &str {
        &self.entity.api_path
    }

    pub fn tenant(&self) -> &str {
        &self.entity.tenant
    }

    pub fn properties(&self) -> &Properties {
        &self.entity.properties
    }

    pub fn display_name(&self) -> Option<&str> {
        self.entity.display_name()
    }

    /// Calls `{api_path}/{id}/{op}` and returns the decoded body.
    ///
    /// An empty `op` addresses the object itself.
    pub async fn do_operation(
        &self,
        op: &str,
        method: Method,
        body: Option<Value>,
        query: &[(&str, &str)],
    ) -> GraphResult<Value> {
        let mut request = GraphRequest::new(method, RequestTarget::Path(self.operation_path(op)?));
        for (key, value) in query {
            request = request.with_query(*key, *value);
        }
        if let Some(body) = body {
            request = request.with_body(body);
        }
        Ok(self.transport.perform(request).await?.body)
    }

    /// Re-reads the object and replaces its local properties.
    pub async fn sync_fields(&mut self) -> GraphResult<()> {
        let body = self.do_operation("", Method::GET, None, &[]).await?;
        let Value::Object(properties) = body else {
            return Err(GraphError::InvalidPage(format!(
                "{} payload is not a JSON object",
                self.type_name()
            )));
        };
        self.entity.properties = properties;
        debug!(type_name = %self.type_name(), id = ?self.id(), "Synced object fields");
        Ok(())
    }

    /// Sends `properties` as a PATCH, then re-reads the object.
    pub async fn update(&mut self, properties: Properties) -> GraphResult<()> {
        self.do_operation("", Method::PATCH, Some(Value::Object(properties)), &[])
            .await?;
        info!(type_name = %self.type_name(), id = ?self.id(), "Updated object");
        self.sync_fields().await
    }

    /// Deletes the object on the server.
    pub async fn delete(self) -> GraphResult<()> {
        self.do_operation("", Method::DELETE, None, &[]).await?;
        info!(type_name = %self.type_name(), id = ?self.id(), "Deleted object");
        Ok(())
    }

    /// Opens a pager over a related collection such as `members` or
    /// `owners`.
    pub async fn list_pager(&self, op: &str, options: PagerOptions) -> GraphResult<Pager> {
        let first_page = self.do_operation(op, Method::GET, None, &[]).await?;
        Pager::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.registry),
            first_page,
            options,
        )
    }

    /// IDs of the groups this object is a member of, transitively.
    pub async fn list_group_memberships(&self, security_only: bool) -> GraphResult<Vec<String>> {
        self.member_ids("getMemberGroups", security_only).await
    }

    /// IDs of the groups, roles and units this object is a member of,
    /// transitively.
    pub async fn list_object_memberships(&self, security_only: bool) -> GraphResult<Vec<String>> {
        self.member_ids("getMemberObjects", security_only).await
    }

    async fn member_ids(&self, op: &str, security_only: bool) -> GraphResult<Vec<String>> {
        let first_page = self
            .do_operation(
                op,
                Method::POST,
                Some(json!({ "securityEnabledOnly": security_only })),
                &[],
            )
            .await?;
        let pager = Pager::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.registry),
            first_page,
            PagerOptions::default(),
        )?;
        if !pager.has_data() {
            return Ok(Vec::new());
        }

        let records = collect_all(pager).await?.into_records().unwrap_or_default();
        Ok(records
            .into_iter()
            .filter_map(|v| match v {
                Value::String(id) => Some(id),
                _ => None,
            })
            .collect())
    }

    fn operation_path(&self, op: &str) -> GraphResult<String> {
        let path = self
            .entity
            .object_path()
            .ok_or_else(|| GraphError::MissingId {
                type_name: self.entity.type_name.clone(),
            })?;
        let op = op.trim_matches('/');
        if op.is_empty() {
            Ok(path)
        } else {
            Ok(format!("{path}/{op}"))
        }
    }
}

impl fmt::Debug for DirectoryObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryObject")
            .field("entity", &self.entity)
            .finish_non_exhaustive()
    }
}

impl PartialEq for DirectoryObject {
    fn eq(&self, other: &Self) -> bool {
        self.entity == other.entity
    }
}
