//! The live application: a compiled function table driven through a state
//! shim.
//!
//! A deployed source tree is lowered by an [`AppCompiler`] into a table of
//! named function values. Applying a function value `f` to arguments `args`
//! with state `s` evaluates `DecodeAndEvaluate(Literal(f),
//! Literal(List([s, List(args)])))`; the function must return
//! `List([newState, response])`. The shim keeps the state of the "main"
//! branch and serializes arguments and responses as JSON at the host
//! boundary.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pine::eval::{EvalError, Evaluator};
use crate::pine::expression::Expression;
use crate::pine::json::{JsonValueError, json_str_from_value, value_from_json_str};
use crate::pine::value::Value;
use crate::store::tree::TreeNode;

pub const ENTRY_INIT: &str = "init";
pub const ENTRY_PROCESS_EVENT: &str = "processEvent";
pub const ENTRY_MIGRATE: &str = "migrate";

pub const MAIN_BRANCH: &str = "main";

/// Suffix of deployment tree files holding encoded function values.
const FUNCTION_FILE_SUFFIX: &str = ".pine";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("app compilation failed: {reason}")]
    Compile { reason: String },
    #[error("app exposes no function named '{name}'")]
    UnknownFunction { name: String },
    #[error("no application state present on branch '{branch}'")]
    NoState { branch: String },
    #[error("failed to apply function '{name}': {source}")]
    Apply {
        name: String,
        #[source]
        source: EvalError,
    },
    #[error("function '{name}' returned a malformed response: {reason}")]
    MalformedResponse { name: String, reason: String },
    #[error(transparent)]
    Json(#[from] JsonValueError),
}

/// A compiled application: named function values.
#[derive(Clone, Debug)]
pub struct CompiledApp {
    functions: BTreeMap<String, Value>,
}

impl CompiledApp {
    pub fn from_functions(functions: BTreeMap<String, Value>) -> Self {
        Self { functions }
    }

    pub fn function(&self, name: &str) -> Option<&Value> {
        self.functions.get(name)
    }

    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

/// Lowers a deployed source tree into a compiled application. The real
/// source-language compiler is an external collaborator behind this seam.
pub trait AppCompiler: Send + Sync {
    fn compile(&self, tree: &TreeNode) -> Result<CompiledApp, AppError>;
}

/// Default compiler: every `<name>.pine` file at the tree root is the JSON
/// serialization of an encoded function value, exposed under `<name>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExpressionTreeCompiler;

impl AppCompiler for ExpressionTreeCompiler {
    fn compile(&self, tree: &TreeNode) -> Result<CompiledApp, AppError> {
        let mut functions = BTreeMap::new();
        for (name, child) in tree.entries() {
            let Some(function_name) = name.strip_suffix(FUNCTION_FILE_SUFFIX) else {
                continue;
            };
            let TreeNode::Blob(bytes) = child else {
                return Err(AppError::Compile {
                    reason: format!("'{name}' is a directory, expected a file"),
                });
            };
            let function: Value =
                serde_json::from_slice(bytes).map_err(|e| AppError::Compile {
                    reason: format!("'{name}' does not hold a function value: {e}"),
                })?;
            functions.insert(function_name.to_string(), function);
        }
        if functions.is_empty() {
            return Err(AppError::Compile {
                reason: "tree exposes no functions".into(),
            });
        }
        Ok(CompiledApp::from_functions(functions))
    }
}

/// Outcome of a named-function application on the main branch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionApplicationResult {
    pub response_json: String,
    pub state_changed: bool,
}

/// The in-memory, currently-deployed application instance.
pub struct LiveApp {
    compiled: CompiledApp,
    evaluator: Arc<Evaluator>,
    branches: BTreeMap<String, Value>,
}

impl LiveApp {
    pub fn new(compiled: CompiledApp, evaluator: Arc<Evaluator>) -> Self {
        Self {
            compiled,
            evaluator,
            branches: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> Option<&Value> {
        self.branches.get(MAIN_BRANCH)
    }

    pub fn set_state(&mut self, state: Value) {
        self.branches.insert(MAIN_BRANCH.to_string(), state);
    }

    pub fn state_json(&self) -> Result<String, AppError> {
        let state = self.state().ok_or_else(|| AppError::NoState {
            branch: MAIN_BRANCH.to_string(),
        })?;
        Ok(json_str_from_value(state)?)
    }

    /// Apply a function value to `(state, args)`; returns `(newState,
    /// response)`.
    fn apply(&self, name: &str, state: Value, args: Vec<Value>) -> Result<(Value, Value), AppError> {
        let function = self
            .compiled
            .function(name)
            .ok_or_else(|| AppError::UnknownFunction {
                name: name.to_string(),
            })?;
        let environment = Value::list(vec![state, Value::list(args)]);
        let expression = Expression::decode_and_evaluate(
            Expression::Literal(function.clone()),
            Expression::Literal(environment),
        );
        let result = self
            .evaluator
            .evaluate(&expression, &Value::empty_list())
            .map_err(|source| AppError::Apply {
                name: name.to_string(),
                source,
            })?;

        let items = result.as_list().ok_or_else(|| AppError::MalformedResponse {
            name: name.to_string(),
            reason: "result is not a list".into(),
        })?;
        let [new_state, response] = items else {
            return Err(AppError::MalformedResponse {
                name: name.to_string(),
                reason: format!("result has {} elements, expected [state, response]", items.len()),
            });
        };
        Ok((new_state.clone(), response.clone()))
    }

    /// Run `init`; sets the main-branch state and returns the commands value.
    pub fn init(&mut self) -> Result<Value, AppError> {
        let (state, cmds) = self.apply(ENTRY_INIT, Value::empty_list(), Vec::new())?;
        self.set_state(state);
        Ok(cmds)
    }

    /// Run `migrate` on a prior state; sets the main-branch state and returns
    /// the commands value.
    pub fn migrate(&mut self, prior_state: Value) -> Result<Value, AppError> {
        let (state, cmds) = self.apply(ENTRY_MIGRATE, Value::empty_list(), vec![prior_state])?;
        self.set_state(state);
        Ok(cmds)
    }

    /// Apply a serialized application event on the main branch; returns the
    /// response JSON.
    pub fn process_event(&mut self, event_json: &str) -> Result<String, AppError> {
        let state = self.state().cloned().ok_or_else(|| AppError::NoState {
            branch: MAIN_BRANCH.to_string(),
        })?;
        let event = value_from_json_str(event_json)?;
        let (new_state, response) = self.apply(ENTRY_PROCESS_EVENT, state, vec![event])?;
        self.set_state(new_state);
        Ok(json_str_from_value(&response)?)
    }

    /// Apply a named function with JSON-serialized arguments on the main
    /// branch. The new state is kept only when `commit_resulting_state`.
    pub fn apply_named_function(
        &mut self,
        name: &str,
        serialized_arguments_json: &[String],
        commit_resulting_state: bool,
    ) -> Result<FunctionApplicationResult, AppError> {
        let state = self.state().cloned().ok_or_else(|| AppError::NoState {
            branch: MAIN_BRANCH.to_string(),
        })?;
        let args = serialized_arguments_json
            .iter()
            .map(|json| value_from_json_str(json))
            .collect::<Result<Vec<_>, _>>()?;
        let (new_state, response) = self.apply(name, state.clone(), args)?;
        let state_changed = new_state != state;
        if commit_resulting_state {
            self.set_state(new_state);
        }
        Ok(FunctionApplicationResult {
            response_json: json_str_from_value(&response)?,
            state_changed,
        })
    }
}
