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

use crate::ConfigError;
use serde::Deserialize;

/// SigV4 settings for the export client.
///
/// Values built with [`AuthSettings::new`] are validated on construction.
/// Values deserialized from a config document are validated by
/// [`ExporterConfig::validate`](crate::ExporterConfig::validate) and again
/// before any interceptor is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    enabled: bool,
    region: String,
    service: String,
    debug: bool,
}

impl AuthSettings {
    /// Build validated settings.
    pub fn new(
        enabled: bool,
        region: impl Into<String>,
        service: impl Into<String>,
        debug: bool,
    ) -> Result<Self, ConfigError> {
        let settings = Self {
            enabled,
            region: region.into(),
            service: service.into(),
            debug,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Settings with signing turned off.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Whether requests get signed.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Signing region, e.g. `us-east-1`.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Signing service, e.g. `aps` for Amazon Managed Prometheus.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Whether signed requests and their responses are dumped.
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Reject settings that enable signing without a region or service.
    ///
    /// Disabled settings are always accepted, whatever region and service hold.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }

        let mut missing = Vec::new();
        if self.region.trim().is_empty() {
            missing.push("region");
        }
        if self.service.trim().is_empty() {
            missing.push("service");
        }
        if missing.is_empty() {
            return Ok(());
        }

        Err(ConfigError::InvalidAuthConfig(format!(
            "{} must be set when auth is enabled",
            missing.join(" and ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(true, "us-east-1", "aps", true; "enabled complete")]
    #[test_case(true, "", "aps", false; "enabled without region")]
    #[test_case(true, "us-east-1", "", false; "enabled without service")]
    #[test_case(true, "", "", false; "enabled without both")]
    #[test_case(true, "  ", "aps", false; "enabled with blank region")]
    #[test_case(false, "", "", true; "disabled empty")]
    #[test_case(false, "us-east-1", "", true; "disabled without service")]
    #[test_case(false, "", "aps", true; "disabled without region")]
    fn test_validate(enabled: bool, region: &str, service: &str, ok: bool) {
        let result = AuthSettings::new(enabled, region, service, false);
        assert_eq!(result.is_ok(), ok, "{result:?}");
        if let Err(err) = result {
            assert!(matches!(err, ConfigError::InvalidAuthConfig(_)));
        }
    }

    #[test]
    fn test_error_names_missing_fields() {
        let err = AuthSettings::new(true, "", "", false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid auth config: region and service must be set when auth is enabled"
        );
    }

    #[test]
    fn test_getters() {
        let settings = AuthSettings::new(true, "eu-west-1", "aps", true).unwrap();
        assert!(settings.enabled());
        assert_eq!(settings.region(), "eu-west-1");
        assert_eq!(settings.service(), "aps");
        assert!(settings.debug());

        let disabled = AuthSettings::disabled();
        assert!(!disabled.enabled());
        assert!(!disabled.debug());
    }

    #[test]
    fn test_deserialize_defaults() {
        let settings: AuthSettings = toml::from_str("region = \"us-east-1\"").unwrap();
        assert!(!settings.enabled());
        assert_eq!(settings.region(), "us-east-1");
        assert_eq!(settings.service(), "");

        // Deserialization doesn't validate; `validate` catches it afterwards.
        let settings: AuthSettings = toml::from_str("enabled = true").unwrap();
        assert!(settings.validate().is_err());
    }
}
