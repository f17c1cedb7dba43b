// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Transcoding request messages into REST calls.
//!
//! A [RestDescriptor] captures how one RPC maps onto HTTP, following
//! [gRPC Transcoding](https://google.aip.dev/127): the HTTP method, a URI
//! template whose bindings name request fields, an optional body selector,
//! and alternative bindings tried in order when the primary one does not
//! apply.
//!
//! [build][RestDescriptor::build] serializes the request message and splits
//! its fields three ways: fields bound in the matched URI template render
//! into the path, the body selector claims the body, and every remaining
//! field becomes a query parameter in `field.subfield` form.

use crate::Result;
use crate::error::Error;
use crate::path_template::PathTemplate;
use http::Method;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Selects the HTTP body from the request message.
#[derive(Clone, Debug, PartialEq)]
pub enum BodySelector {
    /// `*`: every field not bound in the path goes into the body.
    All,
    /// One top-level field goes into the body.
    Field(String),
}

/// One HTTP binding: a method and a URI template.
#[derive(Clone, Debug)]
pub struct RestBinding {
    method: Method,
    template: PathTemplate,
}

impl RestBinding {
    /// Parses `template` into a binding.
    pub fn new(method: Method, template: &str) -> Result<Self> {
        let template = PathTemplate::new(template).map_err(Error::binding)?;
        Ok(Self { method, template })
    }

    // Renders the path if all bound fields are present in `message`.
    fn render(&self, message: &Value) -> Option<String> {
        let mut bindings = HashMap::new();
        for name in self.template.variable_names() {
            let value = lookup(message, &name)?;
            bindings.insert(name, scalar(value)?);
        }
        self.template.render(&bindings).ok()
    }
}

/// The REST mapping of one RPC.
#[derive(Clone, Debug)]
pub struct RestDescriptor {
    binding: RestBinding,
    additional_bindings: Vec<RestBinding>,
    body: Option<BodySelector>,
}

/// A transport-ready description of one HTTP request.
///
/// The transport owns URL assembly and encoding; path segments and query
/// values here are raw, not percent-encoded.
#[derive(Clone, Debug, PartialEq)]
pub struct RestRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RestDescriptor {
    /// Creates a descriptor from its primary binding.
    pub fn new(method: Method, template: &str) -> Result<Self> {
        Ok(Self {
            binding: RestBinding::new(method, template)?,
            additional_bindings: Vec::new(),
            body: None,
        })
    }

    /// Sets the body selector.
    pub fn with_body(mut self, v: BodySelector) -> Self {
        self.body = Some(v);
        self
    }

    /// Appends an alternative binding, tried after the primary one.
    pub fn with_additional_binding(mut self, v: RestBinding) -> Self {
        self.additional_bindings.push(v);
        self
    }

    /// Transcodes `request` into a [RestRequest].
    ///
    /// Bindings are tried in declaration order; the first whose fields are
    /// all present in the request wins. No applicable binding is a binding
    /// error.
    pub fn build<T: Serialize>(&self, request: &T) -> Result<RestRequest> {
        let message = serde_json::to_value(request).map_err(Error::ser)?;
        let (binding, path) = std::iter::once(&self.binding)
            .chain(self.additional_bindings.iter())
            .find_map(|b| b.render(&message).map(|path| (b, path)))
            .ok_or_else(|| {
                Error::binding("no binding matches the fields set in the request")
            })?;

        // Path-bound fields are consumed; they appear in neither body nor
        // query.
        let mut remaining = message;
        for name in binding.template.variable_names() {
            remove(&mut remaining, &name);
        }

        let (body, query_source) = match &self.body {
            Some(BodySelector::All) => (Some(remaining), Value::Null),
            Some(BodySelector::Field(field)) => {
                let body = match &mut remaining {
                    Value::Object(map) => map.remove(field),
                    _ => None,
                };
                (body, remaining)
            }
            None => (None, remaining),
        };

        let mut query = Vec::new();
        flatten_query("", &query_source, &mut query);
        Ok(RestRequest {
            method: binding.method.clone(),
            path,
            query,
            body,
        })
    }
}

// Resolves a dotted field path in a serialized message.
fn lookup<'a>(message: &'a Value, name: &str) -> Option<&'a Value> {
    let mut current = message;
    for part in name.split('.') {
        current = current.as_object()?.get(part)?;
    }
    if current.is_null() {
        return None;
    }
    Some(current)
}

fn remove(message: &mut Value, name: &str) {
    let mut current = message;
    let mut parts = name.split('.').peekable();
    while let Some(part) = parts.next() {
        let Some(map) = current.as_object_mut() else {
            return;
        };
        if parts.peek().is_none() {
            map.remove(part);
            return;
        }
        match map.get_mut(part) {
            Some(next) => current = next,
            None => return,
        }
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// Flattens remaining fields into `field.subfield` query parameters. Repeated
// fields repeat the parameter; null and empty values are skipped.
fn flatten_query(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (key, value) in map {
                let name = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_query(&name, value, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                flatten_query(prefix, item, out);
            }
        }
        Value::String(s) => out.push((prefix.to_string(), s.clone())),
        Value::Number(n) => out.push((prefix.to_string(), n.to_string())),
        Value::Bool(b) => out.push((prefix.to_string(), b.to_string())),
    }
}
