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

use crate::AuthError;
use cortexauth_aws_v4::{Credential, DefaultCredentialProvider};
use cortexauth_core::{Context, ProvideCredential, SigningCredential};
use std::fmt::{self, Debug};
use tokio::sync::Mutex;

/// CredentialResolver hands out AWS credentials and refreshes them when
/// they are about to expire.
///
/// The cache lock is held across a reload, so when many requests find the
/// credential stale at once only the first one reaches the provider; the
/// rest wait and reuse its result.
pub struct CredentialResolver {
    ctx: Context,
    provider: Box<dyn ProvideCredential<Credential = Credential>>,
    cached: Mutex<Option<Credential>>,
}

impl CredentialResolver {
    /// Create a resolver over the given provider.
    pub fn new(ctx: Context, provider: impl ProvideCredential<Credential = Credential>) -> Self {
        Self {
            ctx,
            provider: Box::new(provider),
            cached: Mutex::new(None),
        }
    }

    /// Create a resolver over the standard AWS chain.
    pub fn with_default_chain(ctx: Context) -> Self {
        Self::new(ctx, DefaultCredentialProvider::new())
    }

    /// Return a usable credential, reloading from the provider if the cached
    /// one is missing or expiring.
    pub async fn resolve(&self) -> Result<Credential, AuthError> {
        let mut cached = self.cached.lock().await;
        if let Some(cred) = cached.as_ref().filter(|v| v.is_valid()) {
            return Ok(cred.clone());
        }

        log::debug!("credential missing or expiring, reloading from {:?}", self.provider);
        match self.provider.provide_credential(&self.ctx).await {
            Ok(Some(cred)) => {
                if !cred.is_valid() {
                    log::warn!("provider returned a credential that is already expiring");
                }
                *cached = Some(cred.clone());
                Ok(cred)
            }
            Ok(None) => Err(AuthError::CredentialsUnavailable {
                message: "no credential provider yielded credentials".to_string(),
                source: None,
            }),
            Err(err) => Err(AuthError::CredentialsUnavailable {
                message: "credential provider failed".to_string(),
                source: Some(err),
            }),
        }
    }
}

impl Debug for CredentialResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}
