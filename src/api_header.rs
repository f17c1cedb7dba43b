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

//! The client-identification header attached to every request.
//!
//! Services use the `x-goog-api-client` header to aggregate metrics by
//! client language, generator, and library version. The value has a fixed
//! token order:
//!
//! ```text
//! gl-rust/<version> [<libname>/<libversion>] gapic/<version> gax/<version> grpc/<version>
//! ```
//!
//! The value is computed once, at builder time, from explicitly supplied
//! versions. There is no process-wide cache; clients construct one
//! [AgentHeader] and share it across calls.

use http::HeaderValue;

/// The reserved header name for client identification.
///
/// This key is always owned by the library. User-supplied headers cannot
/// override it.
pub const API_CLIENT_HEADER: &str = "x-goog-api-client";

/// The error type for agent header construction.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("the agent header value `{0}` contains invalid header characters")]
    InvalidValue(String),
}

/// Creates [AgentHeader] values.
#[derive(Clone, Debug)]
pub struct AgentHeaderBuilder {
    language_version: String,
    library: Option<(String, String)>,
    gapic_version: Option<String>,
    gax_version: String,
    grpc_version: Option<String>,
}

impl AgentHeaderBuilder {
    /// Creates a builder with the default versions.
    pub fn new() -> Self {
        Self {
            language_version: env!("CARGO_PKG_RUST_VERSION").to_string(),
            library: None,
            gapic_version: None,
            gax_version: env!("CARGO_PKG_VERSION").to_string(),
            grpc_version: None,
        }
    }

    /// Change the language version reported in the `gl-rust/` token.
    pub fn with_language_version<V: Into<String>>(mut self, v: V) -> Self {
        self.language_version = v.into();
        self
    }

    /// Add a `<libname>/<libversion>` token for the wrapping client library.
    pub fn with_library<N: Into<String>, V: Into<String>>(mut self, name: N, version: V) -> Self {
        self.library = Some((name.into(), version.into()));
        self
    }

    /// Change the generated client (gapic) version.
    pub fn with_gapic_version<V: Into<String>>(mut self, v: V) -> Self {
        self.gapic_version = Some(v.into());
        self
    }

    /// Change the support library (gax) version.
    pub fn with_gax_version<V: Into<String>>(mut self, v: V) -> Self {
        self.gax_version = v.into();
        self
    }

    /// Change the transport version reported in the `grpc/` token.
    pub fn with_grpc_version<V: Into<String>>(mut self, v: V) -> Self {
        self.grpc_version = Some(v.into());
        self
    }

    /// Computes the header value.
    ///
    /// Tokens appear in the fixed order, skipping the optional tokens that
    /// were not supplied.
    pub fn build(self) -> Result<AgentHeader, Error> {
        let mut tokens = vec![format!("gl-rust/{}", self.language_version)];
        if let Some((name, version)) = &self.library {
            tokens.push(format!("{name}/{version}"));
        }
        if let Some(v) = &self.gapic_version {
            tokens.push(format!("gapic/{v}"));
        }
        tokens.push(format!("gax/{}", self.gax_version));
        if let Some(v) = &self.grpc_version {
            tokens.push(format!("grpc/{v}"));
        }
        let value = tokens.join(" ");
        let header_value =
            HeaderValue::from_str(&value).map_err(|_| Error::InvalidValue(value.clone()))?;
        Ok(AgentHeader {
            value,
            header_value,
        })
    }
}

impl Default for AgentHeaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The precomputed value for the [API_CLIENT_HEADER] header.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentHeader {
    value: String,
    header_value: HeaderValue,
}

impl AgentHeader {
    /// The header value as a string.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The header value, validated at construction.
    pub fn header_value(&self) -> HeaderValue {
        self.header_value.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_token_order() -> anyhow::Result<()> {
        let header = AgentHeaderBuilder::new()
            .with_language_version("1.85.0")
            .with_library("secretmanager", "1.2.3")
            .with_gapic_version("4.5.6")
            .with_gax_version("0.1.0")
            .with_grpc_version("7.8.9")
            .build()?;
        assert_eq!(
            header.value(),
            "gl-rust/1.85.0 secretmanager/1.2.3 gapic/4.5.6 gax/0.1.0 grpc/7.8.9"
        );
        Ok(())
    }

    #[test]
    fn optional_tokens_skipped() -> anyhow::Result<()> {
        let header = AgentHeaderBuilder::new()
            .with_language_version("1.85.0")
            .with_gax_version("0.1.0")
            .build()?;
        assert_eq!(header.value(), "gl-rust/1.85.0 gax/0.1.0");
        Ok(())
    }

    #[test]
    fn defaults_are_valid() -> anyhow::Result<()> {
        let header = AgentHeaderBuilder::new().build()?;
        assert!(header.value().starts_with("gl-rust/"), "{}", header.value());
        assert!(header.value().contains("gax/"), "{}", header.value());
        Ok(())
    }

    #[test]
    fn invalid_characters() {
        let r = AgentHeaderBuilder::new()
            .with_library("bad\nname", "1.0")
            .build();
        assert!(matches!(r, Err(Error::InvalidValue(_))), "{r:?}");
    }
}
