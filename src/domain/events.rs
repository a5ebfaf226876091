//! Domain events broadcast on the in-process event bus.
//!
//! The log service persists these as activity log rows.

use serde::Serialize;

use super::JobKind;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum NotificationEvent {
    ModuleSubmitted {
        module_id: i32,
        name: String,
        submitted_by: String,
    },
    ModuleResubmitted {
        module_id: i32,
        name: String,
    },
    ModuleApproved {
        module_id: i32,
        name: String,
        reviewed_by: String,
    },
    ModuleDeclined {
        module_id: i32,
        name: String,
        reviewed_by: String,
        reason: String,
    },
    ModuleUpdated {
        module_id: i32,
        name: String,
    },
    ModuleDeleted {
        module_id: i32,
        name: String,
    },
    ReleaseAdded {
        module_id: i32,
        version: String,
        source: String,
    },
    UserRegistered {
        username: String,
    },
    UserRoleChanged {
        username: String,
        role: String,
    },
    ApiKeyCreated {
        username: String,
        prefix: String,
    },
    ApiKeyRevoked {
        key_id: i32,
        prefix: String,
        revoked_by: String,
    },
    JobStarted {
        job_id: i32,
        kind: JobKind,
    },
    JobFinished {
        job_id: i32,
        kind: JobKind,
        summary: String,
    },
    JobFailed {
        job_id: i32,
        kind: JobKind,
        error: String,
    },
    SyncFailed {
        module_id: i32,
        repository: String,
        message: String,
    },
    Info {
        message: String,
    },
    Error {
        message: String,
    },
}
