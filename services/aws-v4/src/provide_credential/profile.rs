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

use crate::{constants::*, Credential};
use async_trait::async_trait;
use cortexauth_core::{Context, Error, ProvideCredential, Result};
use ini::Ini;

const DEFAULT_PROFILE: &str = "default";
const DEFAULT_CREDENTIALS_FILE: &str = "~/.aws/credentials";
const DEFAULT_CONFIG_FILE: &str = "~/.aws/config";

/// ProfileCredentialProvider loads static keys from the shared AWS files.
///
/// The shared credentials file (`AWS_SHARED_CREDENTIALS_FILE`, default
/// `~/.aws/credentials`) is consulted before the config file
/// (`AWS_CONFIG_FILE`, default `~/.aws/config`). In the config file every
/// profile except `default` lives under a `[profile <name>]` section.
///
/// `AWS_PROFILE` overrides the profile configured with [`Self::with_profile`].
/// Missing files or sections yield `None`; a file that exists but cannot be
/// parsed is an error.
#[derive(Debug, Clone)]
pub struct ProfileCredentialProvider {
    profile: String,
    credentials_file: Option<String>,
    config_file: Option<String>,
}

impl Default for ProfileCredentialProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileCredentialProvider {
    /// Create a provider reading the `default` profile.
    pub fn new() -> Self {
        Self {
            profile: DEFAULT_PROFILE.to_string(),
            credentials_file: None,
            config_file: None,
        }
    }

    /// Set the profile name to use.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    /// Override the shared credentials file location.
    pub fn with_credentials_file(mut self, path: impl Into<String>) -> Self {
        self.credentials_file = Some(path.into());
        self
    }

    /// Override the config file location.
    pub fn with_config_file(mut self, path: impl Into<String>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    fn resolve_path(
        &self,
        ctx: &Context,
        configured: &Option<String>,
        env_key: &str,
        fallback: &str,
    ) -> Option<String> {
        let path = configured
            .clone()
            .or_else(|| ctx.env_value(env_key))
            .unwrap_or_else(|| fallback.to_string());

        let expanded = ctx.expand_home_dir(&path);
        if expanded.is_none() {
            log::debug!("cannot expand home dir for {path}, skipping");
        }
        expanded
    }
}

/// Read `section` out of the ini file at `path`.
///
/// Returns `Ok(None)` if the file can't be read or lacks the section or keys.
async fn load_section(ctx: &Context, path: &str, section: &str) -> Result<Option<Credential>> {
    let content = match ctx.file_read_as_string(path).await {
        Ok(v) => v,
        Err(err) => {
            log::debug!("shared aws file {path} not readable: {err}");
            return Ok(None);
        }
    };

    let conf = Ini::load_from_str(&content).map_err(|e| {
        Error::config_invalid("failed to parse shared aws file")
            .with_source(anyhow::Error::new(e))
            .with_context(format!("path: {path}"))
    })?;

    let Some(props) = conf.section(Some(section)) else {
        log::debug!("section [{section}] not found in {path}");
        return Ok(None);
    };

    let (Some(ak), Some(sk)) = (
        props.get("aws_access_key_id"),
        props.get("aws_secret_access_key"),
    ) else {
        return Ok(None);
    };

    Ok(Some(Credential {
        access_key_id: ak.to_string(),
        secret_access_key: sk.to_string(),
        session_token: props.get("aws_session_token").map(str::to_string),
        expires_in: None,
    }))
}

#[async_trait]
impl ProvideCredential for ProfileCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let profile = ctx
            .env_value(AWS_PROFILE)
            .unwrap_or_else(|| self.profile.clone());

        if let Some(path) = self.resolve_path(
            ctx,
            &self.credentials_file,
            AWS_SHARED_CREDENTIALS_FILE,
            DEFAULT_CREDENTIALS_FILE,
        ) {
            if let Some(cred) = load_section(ctx, &path, &profile).await? {
                return Ok(Some(cred));
            }
        }

        let Some(path) =
            self.resolve_path(ctx, &self.config_file, AWS_CONFIG_FILE, DEFAULT_CONFIG_FILE)
        else {
            return Ok(None);
        };
        let section = if profile == DEFAULT_PROFILE {
            profile
        } else {
            format!("profile {profile}")
        };
        load_section(ctx, &path, &section).await
    }
}
