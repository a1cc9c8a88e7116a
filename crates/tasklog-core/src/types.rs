// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the storage, sync, and CLI crates.

use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumCount, EnumString};

use crate::error::TasklogError;

/// Identifier of a row in the task log.
pub type TaskId = i64;

/// Identifier of a data version (one resync attempt).
pub type VersionId = i64;

/// Fixed resource id of the deployment-wide configuration singleton.
pub const CONFIG_RESOURCE_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Reserved id of the bootstrap marker written after the log is truncated.
pub const BOOTSTRAP_TASK_ID: TaskId = 1;

/// Tenant recorded on tasks written by operator-triggered rebuilds.
pub const OPERATOR_TENANT: &str = "operator";

/// The kind of intent a task carries.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskType {
    Create,
    Delete,
    Update,
    Flush,
}

/// A control-plane resource kind that is mirrored into the task log.
///
/// The string form is the `data_type` written to the log. Every kind owns
/// exactly one entity table, see [`ResourceKind::table`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumCount,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceKind {
    Network,
    Subnet,
    Port,
    Router,
    FloatingIp,
    SecurityGroup,
    SecurityGroupRule,
    Pool,
    Vip,
    HealthMonitor,
    Member,
    AgentMembership,
    PortBinding,
}

impl ResourceKind {
    /// Order in which kinds are replayed by a resync or import.
    pub const SNAPSHOT_ORDER: [ResourceKind; 13] = [
        ResourceKind::Network,
        ResourceKind::Subnet,
        ResourceKind::Port,
        ResourceKind::Router,
        ResourceKind::FloatingIp,
        ResourceKind::SecurityGroup,
        ResourceKind::SecurityGroupRule,
        ResourceKind::Pool,
        ResourceKind::Vip,
        ResourceKind::HealthMonitor,
        ResourceKind::Member,
        ResourceKind::AgentMembership,
        ResourceKind::PortBinding,
    ];

    /// Entity table holding the live rows of this kind.
    pub const fn table(self) -> &'static str {
        match self {
            ResourceKind::Network => "networks",
            ResourceKind::Subnet => "subnets",
            ResourceKind::Port => "ports",
            ResourceKind::Router => "routers",
            ResourceKind::FloatingIp => "floating_ips",
            ResourceKind::SecurityGroup => "security_groups",
            ResourceKind::SecurityGroupRule => "security_group_rules",
            ResourceKind::Pool => "pools",
            ResourceKind::Vip => "vips",
            ResourceKind::HealthMonitor => "health_monitors",
            ResourceKind::Member => "members",
            ResourceKind::AgentMembership => "agent_memberships",
            ResourceKind::PortBinding => "port_bindings",
        }
    }
}

// Every kind must be replayed; a new variant without a slot fails the build.
const _: () = assert!(ResourceKind::SNAPSHOT_ORDER.len() == ResourceKind::COUNT);

/// The `data_type` column of a task: a resource kind or a control marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Resource(ResourceKind),
    Config,
    DataVersionSync,
    DataVersionActivate,
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Resource(kind) => std::fmt::Display::fmt(kind, f),
            DataType::Config => f.write_str("CONFIG"),
            DataType::DataVersionSync => f.write_str("DATA_VERSION_SYNC"),
            DataType::DataVersionActivate => f.write_str("DATA_VERSION_ACTIVATE"),
        }
    }
}

impl FromStr for DataType {
    type Err = strum::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONFIG" => Ok(DataType::Config),
            "DATA_VERSION_SYNC" => Ok(DataType::DataVersionSync),
            "DATA_VERSION_ACTIVATE" => Ok(DataType::DataVersionActivate),
            other => ResourceKind::from_str(other).map(DataType::Resource),
        }
    }
}

impl From<ResourceKind> for DataType {
    fn from(kind: ResourceKind) -> Self {
        DataType::Resource(kind)
    }
}

impl Serialize for DataType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Status of one phase of a data version.
///
/// Each of `sync_status` and `sync_tasks_status` moves independently through
/// `unset -> STARTED -> {COMPLETED | ERROR | ABORTED}`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum VersionStatus {
    Started,
    Completed,
    Error,
    Aborted,
}

impl VersionStatus {
    /// Whether a field currently at `from` may move to `to`.
    pub fn can_transition(from: Option<VersionStatus>, to: VersionStatus) -> bool {
        matches!(
            (from, to),
            (None, VersionStatus::Started)
                | (
                    Some(VersionStatus::Started),
                    VersionStatus::Completed | VersionStatus::Error | VersionStatus::Aborted
                )
        )
    }

    /// ERROR and ABORTED end an attempt without producing an activatable snapshot.
    pub fn is_failure(self) -> bool {
        matches!(self, VersionStatus::Error | VersionStatus::Aborted)
    }
}

macro_rules! sql_text_enum {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.to_string()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                <$ty>::from_str(text).map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

sql_text_enum!(TaskType);
sql_text_enum!(DataType);
sql_text_enum!(VersionStatus);

/// One committed row of the task log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub data_type: Option<DataType>,
    pub resource_id: Option<String>,
    /// JSON text of the entity snapshot, if any.
    pub data: Option<String>,
    pub tenant_id: Option<String>,
    pub transaction_id: Option<String>,
    pub created_at: String,
}

impl Task {
    /// Decode the JSON payload.
    pub fn payload(&self) -> Result<Option<serde_json::Value>, TasklogError> {
        self.data
            .as_deref()
            .map(serde_json::from_str::<serde_json::Value>)
            .transpose()
            .map_err(TasklogError::from)
    }
}

/// An intent to be appended to the task log.
///
/// `id` is left unset for ordinary appends so the log assigns the next one.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub id: Option<TaskId>,
    pub task_type: TaskType,
    pub data_type: Option<DataType>,
    pub resource_id: Option<String>,
    pub data: Option<String>,
    pub tenant_id: Option<String>,
    pub transaction_id: Option<String>,
}

impl NewTask {
    /// An intent without payload or provenance.
    pub fn new(task_type: TaskType, data_type: Option<DataType>) -> Self {
        Self {
            id: None,
            task_type,
            data_type,
            resource_id: None,
            data: None,
            tenant_id: None,
            transaction_id: None,
        }
    }

    /// A create/update/delete of one control-plane resource.
    pub fn resource(
        task_type: TaskType,
        kind: ResourceKind,
        resource_id: impl Into<String>,
        data: Option<&serde_json::Value>,
    ) -> Result<Self, TasklogError> {
        let mut task = Self::new(task_type, Some(kind.into()));
        task.resource_id = Some(resource_id.into());
        task.data = data.map(serde_json::to_string).transpose()?;
        Ok(task)
    }

    /// A CREATE of the deployment configuration singleton.
    ///
    /// The payload must be a JSON object; its `id` is forced to
    /// [`CONFIG_RESOURCE_ID`] so repeated pushes address the same resource.
    pub fn config(mut payload: serde_json::Value) -> Result<Self, TasklogError> {
        let object = payload.as_object_mut().ok_or_else(|| {
            TasklogError::Serialization("configuration payload must be a JSON object".into())
        })?;
        object.insert(
            "id".to_string(),
            serde_json::Value::String(CONFIG_RESOURCE_ID.to_string()),
        );
        let mut task = Self::new(TaskType::Create, Some(DataType::Config));
        task.resource_id = Some(CONFIG_RESOURCE_ID.to_string());
        task.data = Some(serde_json::to_string(&payload)?);
        task.transaction_id = Some(uuid::Uuid::new_v4().to_string());
        Ok(task)
    }

    /// Pin the task to an explicit id (bootstrap markers only).
    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_raw_data(mut self, data: Option<String>) -> Self {
        self.data = data;
        self
    }

    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_tenant(mut self, tenant_id: Option<String>) -> Self {
        self.tenant_id = tenant_id;
        self
    }

    pub fn with_transaction(mut self, transaction_id: Option<String>) -> Self {
        self.transaction_id = transaction_id;
        self
    }
}

/// The process-wide coordination record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataState {
    pub id: i64,
    /// Watermark: the last task the external cluster acknowledged.
    pub last_processed_task_id: Option<TaskId>,
    /// The data version whose snapshot is authoritative.
    pub active_version: Option<VersionId>,
    /// When set, control-plane mutations that would append tasks are refused.
    pub readonly: bool,
    /// Optimistic concurrency token, bumped on every change of the row.
    pub revision: i64,
    pub updated_at: String,
}

/// Both status fields of a data version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VersionStates {
    pub sync_status: Option<VersionStatus>,
    pub sync_tasks_status: Option<VersionStatus>,
}

impl VersionStates {
    /// Any status that is set and not COMPLETED blocks a new resync.
    pub fn blocks_resync(&self) -> bool {
        [self.sync_status, self.sync_tasks_status]
            .into_iter()
            .flatten()
            .any(|status| status != VersionStatus::Completed)
    }

    /// Both phases finished successfully.
    pub fn is_completed(&self) -> bool {
        self.sync_status == Some(VersionStatus::Completed)
            && self.sync_tasks_status == Some(VersionStatus::Completed)
    }
}

/// One resync attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataVersion {
    pub id: VersionId,
    pub sync_started_at: Option<String>,
    pub sync_finished_at: Option<String>,
    pub sync_status: Option<VersionStatus>,
    pub sync_tasks_status: Option<VersionStatus>,
    /// Superseded by a later successful resync, or retired by an operator.
    pub stale: bool,
}

impl DataVersion {
    pub fn states(&self) -> VersionStates {
        VersionStates {
            sync_status: self.sync_status,
            sync_tasks_status: self.sync_tasks_status,
        }
    }
}

/// A create, update, or delete of one control-plane entity.
///
/// Applied together with its task append in a single transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceMutation {
    pub op: TaskType,
    pub kind: ResourceKind,
    pub resource_id: String,
    pub tenant_id: Option<String>,
    pub transaction_id: Option<String>,
    /// New entity body; ignored for deletes.
    pub data: Option<serde_json::Value>,
}

impl ResourceMutation {
    pub fn create(kind: ResourceKind, resource_id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            op: TaskType::Create,
            kind,
            resource_id: resource_id.into(),
            tenant_id: None,
            transaction_id: None,
            data: Some(data),
        }
    }

    pub fn update(kind: ResourceKind, resource_id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            op: TaskType::Update,
            ..Self::create(kind, resource_id, data)
        }
    }

    pub fn delete(kind: ResourceKind, resource_id: impl Into<String>) -> Self {
        Self {
            op: TaskType::Delete,
            kind,
            resource_id: resource_id.into(),
            tenant_id: None,
            transaction_id: None,
            data: None,
        }
    }

    pub fn tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn transaction(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}
