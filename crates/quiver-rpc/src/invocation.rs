//! Invocation and result payloads.
//!
//! Arguments and return values are JSON values: the core dispatches and
//! decorates calls, it does not define a wire codec. Attachments are
//! string metadata that filters may read and write on the way through.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One method call flowing through a filter chain to an invoker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    method: String,
    arguments: Vec<Value>,
    attachments: BTreeMap<String, String>,
}

impl Invocation {
    /// A call of `method` with no arguments.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            arguments: Vec::new(),
            attachments: BTreeMap::new(),
        }
    }

    /// Append one argument, builder style.
    pub fn with_argument(mut self, argument: Value) -> Self {
        self.arguments.push(argument);
        self
    }

    /// Replace the argument list, builder style.
    pub fn with_arguments(mut self, arguments: Vec<Value>) -> Self {
        self.arguments = arguments;
        self
    }

    /// Set one attachment, builder style.
    pub fn with_attachment(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attachments.insert(key.into(), value.into());
        self
    }

    /// Method name, e.g. `sayHello` or the echo probe `$echo`.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Positional arguments.
    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    /// All attachments.
    pub fn attachments(&self) -> &BTreeMap<String, String> {
        &self.attachments
    }

    /// One attachment.
    pub fn attachment(&self, key: &str) -> Option<&str> {
        self.attachments.get(key).map(String::as_str)
    }
}

/// The outcome of a successful invocation: an optional value plus
/// response attachments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpcResult {
    value: Option<Value>,
    attachments: BTreeMap<String, String>,
}

impl RpcResult {
    /// A result carrying `value`.
    pub fn new(value: Option<Value>) -> Self {
        Self {
            value,
            attachments: BTreeMap::new(),
        }
    }

    /// The returned value, if any.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// All response attachments.
    pub fn attachments(&self) -> &BTreeMap<String, String> {
        &self.attachments
    }

    /// One response attachment.
    pub fn attachment(&self, key: &str) -> Option<&str> {
        self.attachments.get(key).map(String::as_str)
    }

    /// Set a response attachment; filters use this to annotate results on
    /// the way back out.
    pub fn set_attachment(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attachments.insert(key.into(), value.into());
    }
}
