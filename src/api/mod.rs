//! Canonical admin API schemas and their dispatch onto the supervisor.
//!
//! Routing and transport are external; this module fixes the request and
//! response shapes the admin surface must preserve, the Basic-auth check,
//! and the mapping from process errors to HTTP status codes.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pine::json::json_from_value;
use crate::pine::value::ValueHash;
use crate::process::app::{AppError, FunctionApplicationResult};
use crate::process::supervisor::{
    PersistentProcess, ProcessError, ProcessStatus, TruncationReport,
};
use crate::store::tree::TreeNode;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("missing credentials")]
    MissingAuth,
    #[error("invalid credentials")]
    Unauthorized,
    #[error("not found")]
    NotFound,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("bad request: {reason}")]
    BadRequest { reason: String },
    #[error("runtime exception: {reason}")]
    RuntimeException { reason: String },
}

impl AdminError {
    pub fn status_code(&self) -> u16 {
        match self {
            AdminError::MissingAuth => 401,
            AdminError::Unauthorized => 403,
            AdminError::NotFound => 404,
            AdminError::MethodNotAllowed => 405,
            AdminError::BadRequest { .. } => 400,
            AdminError::RuntimeException { .. } => 422,
        }
    }
}

impl From<ProcessError> for AdminError {
    fn from(e: ProcessError) -> Self {
        match e {
            ProcessError::CommitRejected { reason } => AdminError::BadRequest { reason },
            ProcessError::App(AppError::UnknownFunction { name }) => AdminError::BadRequest {
                reason: format!("app exposes no function named '{name}'"),
            },
            ProcessError::NoLiveProcess => AdminError::NotFound,
            ProcessError::Json(e) => AdminError::BadRequest {
                reason: e.to_string(),
            },
            other => AdminError::RuntimeException {
                reason: other.to_string(),
            },
        }
    }
}

/// Check an `Authorization` header against the configured admin password.
/// Any user name is accepted; only the password counts.
pub fn check_basic_auth(
    authorization: Option<&str>,
    admin_password: &str,
) -> Result<(), AdminError> {
    let header = authorization.ok_or(AdminError::MissingAuth)?;
    let encoded = header
        .strip_prefix("Basic ")
        .ok_or(AdminError::MissingAuth)?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|_| AdminError::Unauthorized)?;
    let credentials = String::from_utf8(decoded).map_err(|_| AdminError::Unauthorized)?;
    let (_user, password) = credentials
        .split_once(':')
        .ok_or(AdminError::Unauthorized)?;
    if password == admin_password {
        Ok(())
    } else {
        Err(AdminError::Unauthorized)
    }
}

/// Body of `POST /api/apply-function-on-db/`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyFunctionOnDatabaseRequest {
    pub function_name: String,
    #[serde(default)]
    pub serialized_arguments_json: Vec<String>,
    #[serde(default)]
    pub commit_resulting_state: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyFunctionOnDatabaseResponse {
    pub function_application_result: FunctionApplicationResult,
    pub committed: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployResponse {
    pub record_hash: ValueHash,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init_or_migrate_cmds_json: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevertResponse {
    pub record_hash: ValueHash,
}

/// The admin operations, one method per route. Transport-agnostic: an HTTP
/// layer parses bodies, calls these, and maps [`AdminError::status_code`].
pub struct AdminInterface {
    process: Arc<PersistentProcess>,
}

impl AdminInterface {
    pub fn new(process: Arc<PersistentProcess>) -> Self {
        Self { process }
    }

    pub fn process(&self) -> &Arc<PersistentProcess> {
        &self.process
    }

    /// `POST /api/deploy-and-init-app-state`
    pub fn deploy_and_init_app_state(&self, tree: &TreeNode) -> Result<DeployResponse, AdminError> {
        let outcome = self.process.deploy_app_config_and_init_elm_app_state(tree)?;
        Ok(DeployResponse {
            record_hash: outcome.record_hash,
            init_or_migrate_cmds_json: cmds_json(outcome.init_or_migrate_response.as_ref()),
        })
    }

    /// `POST /api/deploy-and-migrate-app-state`
    pub fn deploy_and_migrate_app_state(
        &self,
        tree: &TreeNode,
    ) -> Result<DeployResponse, AdminError> {
        let outcome = self
            .process
            .deploy_app_config_and_migrate_elm_app_state(tree)?;
        Ok(DeployResponse {
            record_hash: outcome.record_hash,
            init_or_migrate_cmds_json: cmds_json(outcome.init_or_migrate_response.as_ref()),
        })
    }

    /// `POST /api/revert-process-to/{hash}`
    pub fn revert_process_to(&self, hash_base16: &str) -> Result<RevertResponse, AdminError> {
        let target = ValueHash::from_hex(hash_base16).map_err(|e| AdminError::BadRequest {
            reason: e.to_string(),
        })?;
        let outcome = self.process.revert_process_to(target)?;
        Ok(RevertResponse {
            record_hash: outcome.record_hash,
        })
    }

    /// `GET /api/elm-app-state`
    pub fn get_elm_app_state(&self) -> Result<String, AdminError> {
        Ok(self.process.state_json()?)
    }

    /// `POST /api/elm-app-state`
    pub fn set_elm_app_state(&self, state_json: &str) -> Result<(), AdminError> {
        self.process.set_state_on_main_branch(state_json)?;
        Ok(())
    }

    /// `POST /api/apply-function-on-db/`
    pub fn apply_function_on_database(
        &self,
        request: &ApplyFunctionOnDatabaseRequest,
    ) -> Result<ApplyFunctionOnDatabaseResponse, AdminError> {
        let result = self
            .process
            .apply_function_on_main_branch(
                &request.function_name,
                &request.serialized_arguments_json,
                request.commit_resulting_state,
            )
            .map_err(|e| match e {
                // runtime failures inside the applied function are 422
                ProcessError::App(AppError::Apply { name, source }) => {
                    AdminError::RuntimeException {
                        reason: format!("failed to apply function '{name}': {source}"),
                    }
                }
                other => AdminError::from(other),
            })?;
        let committed = request.commit_resulting_state && result.state_changed;
        Ok(ApplyFunctionOnDatabaseResponse {
            function_application_result: result,
            committed,
        })
    }

    /// `POST /api/truncate-process-history`
    pub fn truncate_process_history(
        &self,
        budget: Duration,
    ) -> Result<TruncationReport, AdminError> {
        Ok(self.process.truncate_process_history(budget)?)
    }

    pub fn status(&self) -> Result<ProcessStatus, AdminError> {
        Ok(self.process.status()?)
    }
}

fn cmds_json(cmds: Option<&crate::pine::value::Value>) -> Option<String> {
    let cmds = cmds?;
    let document = json_from_value(cmds).ok()?;
    serde_json::to_string(&document).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_outcomes() {
        let password = "secret";
        let header = |credentials: &str| {
            format!(
                "Basic {}",
                base64::engine::general_purpose::STANDARD.encode(credentials)
            )
        };

        assert!(matches!(
            check_basic_auth(None, password),
            Err(AdminError::MissingAuth)
        ));
        assert!(matches!(
            check_basic_auth(Some("Bearer token"), password),
            Err(AdminError::MissingAuth)
        ));
        assert!(matches!(
            check_basic_auth(Some("Basic @@@"), password),
            Err(AdminError::Unauthorized)
        ));
        assert!(matches!(
            check_basic_auth(Some(&header("user:wrong")), password),
            Err(AdminError::Unauthorized)
        ));
        check_basic_auth(Some(&header("user:secret")), password).expect("valid credentials");
        check_basic_auth(Some(&header(":secret")), password).expect("empty user accepted");
    }

    #[test]
    fn status_codes() {
        assert_eq!(AdminError::MissingAuth.status_code(), 401);
        assert_eq!(AdminError::Unauthorized.status_code(), 403);
        assert_eq!(AdminError::NotFound.status_code(), 404);
        assert_eq!(AdminError::MethodNotAllowed.status_code(), 405);
        assert_eq!(
            AdminError::BadRequest { reason: "x".into() }.status_code(),
            400
        );
        assert_eq!(
            AdminError::RuntimeException { reason: "x".into() }.status_code(),
            422
        );
    }

    #[test]
    fn apply_function_request_json_shape() {
        let json =
            r#"{"functionName":"add","serializedArgumentsJson":["5"],"commitResultingState":true}"#;
        let request: ApplyFunctionOnDatabaseRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.function_name, "add");
        assert_eq!(request.serialized_arguments_json, vec!["5".to_string()]);
        assert!(request.commit_resulting_state);
    }
}
