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

//! Declarative per-method call configuration.
//!
//! Services ship a JSON document describing, per interface and method, the
//! timeout, the named set of retryable codes, and the named retry parameter
//! set. [ClientConfig] parses that document and turns each method entry into
//! [CallOptions]. Generated clients load the document once and merge
//! per-invocation overrides on top.
//!
//! Name references are resolved at load time; a method naming a missing
//! retry-codes or retry-params set is a configuration error, not a runtime
//! surprise.

use crate::error::rpc::Code;
use crate::exponential_backoff::ExponentialBackoffBuilder;
use crate::options::CallOptions;
use crate::retry_settings::RetrySettingsBuilder;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// The errors loading or resolving a client configuration document.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("the configuration document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("method {method} references unknown retry codes {name}")]
    UnknownRetryCodes { method: String, name: String },
    #[error("method {method} references unknown retry params {name}")]
    UnknownRetryParams { method: String, name: String },
    #[error("retry codes {name} contains an unknown status code {code}")]
    UnknownStatusCode { name: String, code: String },
    #[error("interface {0} is not in the configuration")]
    UnknownInterface(String),
    #[error("method {method} is not in interface {interface}")]
    UnknownMethod { interface: String, method: String },
    #[error("retry params {name} are invalid: {source}")]
    InvalidRetryParams {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Clone, Debug, Default, Deserialize)]
struct InterfaceConfig {
    #[serde(default)]
    retry_codes: HashMap<String, Vec<String>>,
    #[serde(default)]
    retry_params: HashMap<String, RetryParams>,
    #[serde(default)]
    methods: HashMap<String, MethodConfig>,
}

#[derive(Clone, Debug, Deserialize)]
struct RetryParams {
    initial_retry_delay_millis: u64,
    retry_delay_multiplier: f64,
    max_retry_delay_millis: u64,
    initial_rpc_timeout_millis: u64,
    rpc_timeout_multiplier: f64,
    max_rpc_timeout_millis: u64,
    total_timeout_millis: u64,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct MethodConfig {
    #[serde(default)]
    timeout_millis: Option<u64>,
    #[serde(default)]
    retry_codes_name: Option<String>,
    #[serde(default)]
    retry_params_name: Option<String>,
}

/// A parsed client configuration document.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    interfaces: HashMap<String, InterfaceConfig>,
}

impl ClientConfig {
    /// Parses and validates a configuration document.
    ///
    /// All name references are resolved and all status code names parsed
    /// here, so a bad document fails at load time.
    pub fn from_json(document: &str) -> Result<Self, Error> {
        let config: Self = serde_json::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        for interface in self.interfaces.values() {
            for (name, codes) in interface.retry_codes.iter() {
                for code in codes {
                    Code::try_from(code.as_str()).map_err(|_| Error::UnknownStatusCode {
                        name: name.clone(),
                        code: code.clone(),
                    })?;
                }
            }
            for (method, config) in interface.methods.iter() {
                if let Some(name) = &config.retry_codes_name {
                    if !interface.retry_codes.contains_key(name) {
                        return Err(Error::UnknownRetryCodes {
                            method: method.clone(),
                            name: name.clone(),
                        });
                    }
                }
                if let Some(name) = &config.retry_params_name {
                    if !interface.retry_params.contains_key(name) {
                        return Err(Error::UnknownRetryParams {
                            method: method.clone(),
                            name: name.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Builds the [CallOptions] configured for one method.
    ///
    /// A method with a non-empty set of retryable codes gets full retry
    /// settings from its retry params. A method with an empty code set (or
    /// no retry configuration) gets a flat attempt timeout from its
    /// `timeout_millis`.
    pub fn method_options(&self, interface: &str, method: &str) -> Result<CallOptions, Error> {
        let interface_config = self
            .interfaces
            .get(interface)
            .ok_or_else(|| Error::UnknownInterface(interface.to_string()))?;
        let method_config =
            interface_config
                .methods
                .get(method)
                .ok_or_else(|| Error::UnknownMethod {
                    interface: interface.to_string(),
                    method: method.to_string(),
                })?;

        let codes = method_config
            .retry_codes_name
            .as_ref()
            .and_then(|name| interface_config.retry_codes.get(name))
            .filter(|codes| !codes.is_empty());
        let params = method_config
            .retry_params_name
            .as_ref()
            .and_then(|name| interface_config.retry_params.get(name));

        let mut options = CallOptions::new();
        match (codes, params) {
            (Some(codes), Some(params)) => {
                let retryable = codes
                    .iter()
                    // Already validated in from_json.
                    .filter_map(|code| Code::try_from(code.as_str()).ok());
                let name = || {
                    method_config
                        .retry_params_name
                        .clone()
                        .unwrap_or_default()
                };
                let backoff = ExponentialBackoffBuilder::new()
                    .with_initial_delay(Duration::from_millis(params.initial_retry_delay_millis))
                    .with_maximum_delay(Duration::from_millis(params.max_retry_delay_millis))
                    .with_scaling(params.retry_delay_multiplier)
                    .build()
                    .map_err(|e| Error::InvalidRetryParams {
                        name: name(),
                        source: e.into(),
                    })?;
                let settings = RetrySettingsBuilder::new()
                    .with_retryable_codes(retryable)
                    .with_total_timeout(Duration::from_millis(params.total_timeout_millis))
                    .with_initial_attempt_timeout(Duration::from_millis(
                        params.initial_rpc_timeout_millis,
                    ))
                    .with_attempt_timeout_scaling(params.rpc_timeout_multiplier)
                    .with_maximum_attempt_timeout(Duration::from_millis(
                        params.max_rpc_timeout_millis,
                    ))
                    .with_backoff_policy(backoff)
                    .build()
                    .map_err(|e| Error::InvalidRetryParams {
                        name: name(),
                        source: e.into(),
                    })?;
                options = options.with_retry_settings(settings);
            }
            _ => {
                if let Some(millis) = method_config.timeout_millis {
                    options = options.with_attempt_timeout(Duration::from_millis(millis));
                }
            }
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "interfaces": {
            "google.example.v1.Service": {
                "retry_codes": {
                    "idempotent": ["DEADLINE_EXCEEDED", "UNAVAILABLE"],
                    "non_idempotent": []
                },
                "retry_params": {
                    "default": {
                        "initial_retry_delay_millis": 100,
                        "retry_delay_multiplier": 1.3,
                        "max_retry_delay_millis": 60000,
                        "initial_rpc_timeout_millis": 20000,
                        "rpc_timeout_multiplier": 1.0,
                        "max_rpc_timeout_millis": 20000,
                        "total_timeout_millis": 600000
                    }
                },
                "methods": {
                    "GetThing": {
                        "timeout_millis": 30000,
                        "retry_codes_name": "idempotent",
                        "retry_params_name": "default"
                    },
                    "CreateThing": {
                        "timeout_millis": 30000,
                        "retry_codes_name": "non_idempotent",
                        "retry_params_name": "default"
                    },
                    "DeleteThing": {
                        "timeout_millis": 5000
                    }
                }
            }
        }
    }"#;

    #[test]
    fn retryable_method_gets_retry_settings() -> anyhow::Result<()> {
        let config = ClientConfig::from_json(DOCUMENT)?;
        let options = config.method_options("google.example.v1.Service", "GetThing")?;
        let settings = options.retry_settings().expect("retry settings configured");
        assert!(settings.retryable(Code::Unavailable));
        assert!(settings.retryable(Code::DeadlineExceeded));
        assert!(!settings.retryable(Code::PermissionDenied));
        assert_eq!(settings.total_timeout(), Duration::from_secs(600));
        assert_eq!(settings.attempt_timeout(1), Duration::from_secs(20));
        Ok(())
    }

    #[test]
    fn empty_code_set_disables_retries() -> anyhow::Result<()> {
        let config = ClientConfig::from_json(DOCUMENT)?;
        let options = config.method_options("google.example.v1.Service", "CreateThing")?;
        assert!(options.retry_settings().is_none());
        assert_eq!(options.attempt_timeout(), Some(Duration::from_secs(30)));
        Ok(())
    }

    #[test]
    fn unconfigured_method_gets_flat_timeout() -> anyhow::Result<()> {
        let config = ClientConfig::from_json(DOCUMENT)?;
        let options = config.method_options("google.example.v1.Service", "DeleteThing")?;
        assert!(options.retry_settings().is_none());
        assert_eq!(options.attempt_timeout(), Some(Duration::from_secs(5)));
        Ok(())
    }

    #[test]
    fn unknown_names_fail_at_load() {
        let document = r#"{
            "interfaces": {
                "google.example.v1.Service": {
                    "retry_codes": {},
                    "retry_params": {},
                    "methods": {
                        "GetThing": { "retry_codes_name": "missing" }
                    }
                }
            }
        }"#;
        let err = ClientConfig::from_json(document).expect_err("unknown name");
        assert!(matches!(err, Error::UnknownRetryCodes { ref name, .. } if name == "missing"));
    }

    #[test]
    fn unknown_status_codes_fail_at_load() {
        let document = r#"{
            "interfaces": {
                "google.example.v1.Service": {
                    "retry_codes": { "bad": ["NOT_A_CODE"] },
                    "retry_params": {},
                    "methods": {}
                }
            }
        }"#;
        let err = ClientConfig::from_json(document).expect_err("unknown code");
        assert!(matches!(err, Error::UnknownStatusCode { ref code, .. } if code == "NOT_A_CODE"));
    }

    #[test]
    fn unknown_interface_and_method() -> anyhow::Result<()> {
        let config = ClientConfig::from_json(DOCUMENT)?;
        let err = config
            .method_options("google.other.v1.Service", "GetThing")
            .expect_err("unknown interface");
        assert!(matches!(err, Error::UnknownInterface(_)), "{err:?}");
        let err = config
            .method_options("google.example.v1.Service", "ListThings")
            .expect_err("unknown method");
        assert!(matches!(err, Error::UnknownMethod { .. }), "{err:?}");
        Ok(())
    }

    #[test]
    fn overrides_layer_on_configured_options() -> anyhow::Result<()> {
        let config = ClientConfig::from_json(DOCUMENT)?;
        let base = config.method_options("google.example.v1.Service", "GetThing")?;
        let overrides = CallOptions::new().with_attempt_timeout(Duration::from_secs(3));
        let merged = base.merge(&overrides);
        assert!(merged.retry_settings().is_some());
        assert_eq!(merged.attempt_timeout(), Some(Duration::from_secs(3)));
        Ok(())
    }
}
