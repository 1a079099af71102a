use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracksync_domain::{CoreError, ExplicitMapping, ExternalRecordA, ExternalRecordB, TenantId};

/// Which tracker a provider speaks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerSide {
    Board,
    Issues,
}

impl TrackerSide {
    pub const fn namespace(self) -> &'static str {
        match self {
            Self::Board => "tracker_a",
            Self::Issues => "tracker_b",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerProviderKind {
    BoardSnapshot,
    BoardMemory,
    IssueSnapshot,
    IssueMemory,
}

impl TrackerProviderKind {
    pub const fn as_key(self) -> &'static str {
        match self {
            Self::BoardSnapshot => "tracker_a.snapshot",
            Self::BoardMemory => "tracker_a.memory",
            Self::IssueSnapshot => "tracker_b.snapshot",
            Self::IssueMemory => "tracker_b.memory",
        }
    }

    pub fn from_key(provider_key: &str) -> Option<Self> {
        match provider_key {
            "tracker_a.snapshot" => Some(Self::BoardSnapshot),
            "tracker_a.memory" => Some(Self::BoardMemory),
            "tracker_b.snapshot" => Some(Self::IssueSnapshot),
            "tracker_b.memory" => Some(Self::IssueMemory),
            _ => None,
        }
    }

    pub const fn side(self) -> TrackerSide {
        match self {
            Self::BoardSnapshot | Self::BoardMemory => TrackerSide::Board,
            Self::IssueSnapshot | Self::IssueMemory => TrackerSide::Issues,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateIssueRequest {
    pub summary: String,
    pub description: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subsystem: Option<String>,
}

impl CreateIssueRequest {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.summary.trim().is_empty() {
            return Err(CoreError::Configuration(
                "issue summary must not be empty".to_owned(),
            ));
        }
        if self.state.trim().is_empty() {
            return Err(CoreError::Configuration(
                "issue state must not be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateIssueStateRequest {
    /// Internal id or readable key.
    pub issue_id: String,
    pub state: String,
}

impl UpdateIssueStateRequest {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.issue_id.trim().is_empty() {
            return Err(CoreError::Configuration(
                "issue id must not be empty".to_owned(),
            ));
        }
        if self.state.trim().is_empty() {
            return Err(CoreError::Configuration(
                "issue state must not be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Read side of the task board.
#[async_trait::async_trait]
pub trait TrackerASource: Send + Sync {
    fn kind(&self) -> TrackerProviderKind;
    async fn fetch_all(&self, tenant: &TenantId) -> Result<Vec<ExternalRecordA>, CoreError>;

    fn provider_key(&self) -> &'static str {
        self.kind().as_key()
    }
}

/// Read and write side of the issue tracker.
#[async_trait::async_trait]
pub trait TrackerBSource: Send + Sync {
    fn kind(&self) -> TrackerProviderKind;
    async fn fetch_all(&self, tenant: &TenantId) -> Result<Vec<ExternalRecordB>, CoreError>;
    async fn create_issue(
        &self,
        tenant: &TenantId,
        request: CreateIssueRequest,
    ) -> Result<ExternalRecordB, CoreError>;
    async fn update_issue_state(
        &self,
        tenant: &TenantId,
        request: UpdateIssueStateRequest,
    ) -> Result<(), CoreError>;

    fn provider_key(&self) -> &'static str {
        self.kind().as_key()
    }
}

/// Persisted explicit mappings, scoped per tenant.
#[async_trait::async_trait]
pub trait MappingStore: Send + Sync {
    async fn lookup(&self, tenant: &TenantId) -> Result<Vec<ExplicitMapping>, CoreError>;
    async fn record(&self, tenant: &TenantId, mapping: ExplicitMapping) -> Result<(), CoreError>;
}

/// Tenant-scoped ignore set owned by the caller.
pub trait IgnoreList: Send + Sync {
    fn is_ignored(&self, tenant: &TenantId, identifier: &str) -> bool;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackerProviderError {
    #[error("unknown tracker provider key: {0}")]
    UnknownProviderKey(String),
    #[error("provider key {key} does not serve {expected}")]
    WrongTracker { key: String, expected: &'static str },
    #[error("failed to initialize tracker provider: {0}")]
    ProviderInitialization(String),
}
