// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use crate::{AuthSettings, ConfigError};
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// Name the exporter is registered under.
pub const EXPORTER_TYPE: &str = "cortex";

const DEFAULT_ENDPOINT: &str = "http://some.url:9411/api/prom/push";
const DEFAULT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_WRITE_BUFFER_SIZE: usize = 512 * 1024;

/// Configuration of a remote-write exporter.
///
/// ```toml
/// namespace = "app"
/// endpoint = "https://aps-workspaces.us-east-1.amazonaws.com/workspaces/ws-1/api/v1/remote_write"
/// timeout = 10
///
/// [headers]
/// x-scope-orgid = "tenant-1"
///
/// [auth]
/// enabled = true
/// region = "us-east-1"
/// service = "aps"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    /// Prefix attached to every exported metric name.
    pub namespace: String,
    /// Remote-write URL.
    pub endpoint: String,
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Write buffer size in bytes requested by the host.
    ///
    /// reqwest sizes its own connection buffers, so this is carried for the
    /// host exporter and not applied to the client.
    pub write_buffer_size: usize,
    /// Static headers sent with every request.
    pub headers: BTreeMap<String, String>,
    /// Retry policy applied by the host exporter.
    pub retry: RetrySettings,
    /// Sending queue used by the host exporter.
    pub queue: QueueSettings,
    /// SigV4 settings.
    pub auth: AuthSettings,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT_SECS,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            headers: BTreeMap::new(),
            retry: RetrySettings::default(),
            queue: QueueSettings::default(),
            auth: AuthSettings::default(),
        }
    }
}

impl ExporterConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the endpoint, headers and auth settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidEndpoint {
            endpoint: self.endpoint.clone(),
            reason,
        };
        let url = Url::parse(&self.endpoint).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme {}", url.scheme())));
        }
        if url.host_str().is_none() {
            return Err(invalid("missing host".to_string()));
        }

        self.header_map()?;
        self.auth.validate()
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Static headers as a [`HeaderMap`].
    pub fn header_map(&self) -> Result<HeaderMap, ConfigError> {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let invalid = |reason: String| ConfigError::InvalidHeader {
                name: name.clone(),
                reason,
            };
            let name = HeaderName::try_from(name.as_str()).map_err(|e| invalid(e.to_string()))?;
            let value = HeaderValue::try_from(value.as_str()).map_err(|e| invalid(e.to_string()))?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

/// Retry policy of the host exporter.
///
/// Disabled by default. A retry layer must sit outside the signing
/// interceptor so that every attempt is signed again.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Whether failed pushes are retried.
    pub enabled: bool,
    /// Delay before the first retry, in seconds.
    pub initial_interval: u64,
    /// Upper bound between consecutive retries, in seconds.
    pub max_interval: u64,
    /// Give up after this many seconds in total.
    pub max_elapsed_time: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            initial_interval: 5,
            max_interval: 30,
            max_elapsed_time: 300,
        }
    }
}

/// Sending queue of the host exporter. Disabled by default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Whether pushes are buffered in a queue.
    pub enabled: bool,
    /// Number of consumers draining the queue.
    pub num_consumers: usize,
    /// Maximum number of batches held.
    pub queue_size: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            num_consumers: 10,
            queue_size: 5000,
        }
    }
}
