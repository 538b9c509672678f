//! The PineVM evaluator: reduces an expression against an environment value.
//!
//! The reducer is a single match over the seven variants. `DecodeAndEvaluate`
//! carries the interesting machinery: a function-application cache keyed by
//! the hashes of the function and argument values, populated only when the
//! inner evaluation took at least [`APPLICATION_CACHE_MIN_DURATION`] and
//! succeeded. Cache membership is a performance hint only; cached results are
//! observationally equal to uncached evaluation.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::pine::codec::{DecodeExprError, decode_expression};
use crate::pine::expression::Expression;
use crate::pine::kernel::{KernelTable, apply_kernel, kernel_table};
use crate::pine::value::{Value, ValueHash};

/// Applications faster than this are not worth a cache slot.
const APPLICATION_CACHE_MIN_DURATION: Duration = Duration::from_millis(4);

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("failed to decode expression from function value: {source}")]
    DecodeFunction {
        #[source]
        source: DecodeExprError,
    },
    #[error("unknown kernel function: {name}")]
    UnknownKernelFunction { name: String },
    #[error("failed to evaluate {context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<EvalError>,
    },
}

impl EvalError {
    fn in_context(self, context: impl Into<String>) -> Self {
        EvalError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// A host-native replacement for a specific encoded function value.
pub type NativeFunction = dyn Fn(&Value) -> Result<Value, EvalError> + Send + Sync;

/// The default reducer, as seen by an [`OverrideEvaluate`] hook.
pub type DefaultEvaluate<'a> = dyn Fn(&Expression, &Value) -> Result<Value, EvalError> + 'a;

/// A wrapper around the default reducer, called for every reduction step.
pub type OverrideEvaluate =
    Box<dyn Fn(&DefaultEvaluate<'_>, &Expression, &Value) -> Result<Value, EvalError> + Send + Sync>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvalMetrics {
    pub cache_lookup_count: u64,
    pub cache_size: usize,
    pub max_observed_arg_list_size: usize,
}

pub struct Evaluator {
    kernel: &'static KernelTable,
    decode_overrides: HashMap<ValueHash, Box<NativeFunction>>,
    override_evaluate: Option<OverrideEvaluate>,
    cache: Mutex<HashMap<(ValueHash, ValueHash), Value>>,
    cache_lookup_count: AtomicU64,
    max_observed_arg_list_size: AtomicUsize,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self {
            kernel: kernel_table(),
            decode_overrides: HashMap::new(),
            override_evaluate: None,
            cache: Mutex::new(HashMap::new()),
            cache_lookup_count: AtomicU64::new(0),
            max_observed_arg_list_size: AtomicUsize::new(0),
        }
    }

    /// Short-circuit decoding of a specific encoded function value with a
    /// host-native implementation of equivalent semantics.
    pub fn with_decode_override(
        mut self,
        function_value: &Value,
        native: Box<NativeFunction>,
    ) -> Self {
        self.decode_overrides.insert(function_value.hash(), native);
        self
    }

    /// Wrap every reduction step (tracing, instrumentation, alternative
    /// strategies).
    pub fn with_override_evaluate(mut self, hook: OverrideEvaluate) -> Self {
        self.override_evaluate = Some(hook);
        self
    }

    pub fn metrics(&self) -> EvalMetrics {
        EvalMetrics {
            cache_lookup_count: self.cache_lookup_count.load(Ordering::Relaxed),
            cache_size: self.cache.lock().map(|c| c.len()).unwrap_or(0),
            max_observed_arg_list_size: self.max_observed_arg_list_size.load(Ordering::Relaxed),
        }
    }

    pub fn evaluate(&self, expression: &Expression, environment: &Value) -> Result<Value, EvalError> {
        match &self.override_evaluate {
            Some(hook) => hook(
                &|expression, environment| self.evaluate_default(expression, environment),
                expression,
                environment,
            ),
            None => self.evaluate_default(expression, environment),
        }
    }

    fn evaluate_default(
        &self,
        expression: &Expression,
        environment: &Value,
    ) -> Result<Value, EvalError> {
        match expression {
            Expression::Literal(value) => Ok(value.clone()),
            Expression::Environment => Ok(environment.clone()),
            Expression::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(
                        self.evaluate(item, environment)
                            .map_err(|e| e.in_context("list item"))?,
                    );
                }
                Ok(Value::list(values))
            }
            Expression::Conditional {
                condition,
                if_true,
                if_false,
            } => {
                let condition = self
                    .evaluate(condition, environment)
                    .map_err(|e| e.in_context("conditional condition"))?;
                if condition.is_true() {
                    self.evaluate(if_true, environment)
                } else {
                    self.evaluate(if_false, environment)
                }
            }
            Expression::KernelApplication { function, argument } => {
                let argument = self
                    .evaluate(argument, environment)
                    .map_err(|e| e.in_context(format!("kernel application '{function}' argument")))?;
                let kernel_fn =
                    self.kernel
                        .get(function.as_str())
                        .ok_or_else(|| EvalError::UnknownKernelFunction {
                            name: function.clone(),
                        })?;
                Ok(apply_kernel(*kernel_fn, &argument))
            }
            Expression::DecodeAndEvaluate {
                expression,
                environment: environment_expr,
            } => self
                .evaluate_decode_and_evaluate(expression, environment_expr, environment)
                .map_err(|e| e.in_context("decode and evaluate")),
            Expression::StringTag { tag, tagged } => self
                .evaluate(tagged, environment)
                .map_err(|e| e.in_context(format!("tagged expression '{tag}'"))),
        }
    }

    fn evaluate_decode_and_evaluate(
        &self,
        expression: &Expression,
        environment_expr: &Expression,
        environment: &Value,
    ) -> Result<Value, EvalError> {
        enum Applicable<'a> {
            Native(&'a NativeFunction),
            Decoded(Expression),
        }

        let function_value = self.evaluate(expression, environment)?;
        let function_hash = function_value.hash();

        let applicable = match self.decode_overrides.get(&function_hash) {
            Some(native) => Applicable::Native(native.as_ref()),
            None => Applicable::Decoded(
                decode_expression(&function_value)
                    .map_err(|source| EvalError::DecodeFunction { source })?,
            ),
        };

        let argument_value = self.evaluate(environment_expr, environment)?;
        if let Some(items) = argument_value.as_list() {
            self.max_observed_arg_list_size
                .fetch_max(items.len(), Ordering::Relaxed);
        }

        let cache_key = (function_hash, argument_value.hash());
        self.cache_lookup_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(cache) = self.cache.lock()
            && let Some(hit) = cache.get(&cache_key)
        {
            return Ok(hit.clone());
        }

        let started = Instant::now();
        let result = match &applicable {
            Applicable::Native(native) => native(&argument_value),
            Applicable::Decoded(function_expr) => self.evaluate(function_expr, &argument_value),
        };

        if started.elapsed() >= APPLICATION_CACHE_MIN_DURATION
            && let Ok(value) = &result
            && let Ok(mut cache) = self.cache.lock()
        {
            cache.insert(cache_key, value.clone());
        }

        result
    }

    /// Pre-populate the application cache; test hook for verifying cache
    /// transparency.
    #[cfg(test)]
    fn prime_cache(&self, function_value: &Value, argument_value: &Value, result: Value) {
        self.cache
            .lock()
            .unwrap()
            .insert((function_value.hash(), argument_value.hash()), result);
    }
}
