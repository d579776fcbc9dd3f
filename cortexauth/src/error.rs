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

use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Auth is enabled but region or service is missing.
    #[error("invalid auth config: {0}")]
    InvalidAuthConfig(String),
    /// The exporter endpoint is not an http(s) URL.
    #[error("invalid exporter endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint {
        /// The rejected endpoint.
        endpoint: String,
        /// Why it was rejected.
        reason: String,
    },
    /// A static header name or value is not valid HTTP.
    #[error("invalid header {name:?}: {reason}")]
    InvalidHeader {
        /// The rejected header name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },
    /// The config document could not be deserialized.
    #[error("failed to parse exporter config")]
    Parse(#[from] toml::de::Error),
}

/// Errors raised while resolving credentials.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No provider in the chain yielded usable credentials.
    #[error("aws credentials unavailable: {message}")]
    CredentialsUnavailable {
        /// What went wrong.
        message: String,
        /// Provider failure, if one caused this.
        #[source]
        source: Option<cortexauth_core::Error>,
    },
}

/// Errors raised while sending a request through the signing interceptor.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request body is a one-shot stream and can't be hashed for signing.
    #[error("request body is not replayable and cannot be signed")]
    BodyUnavailable,
    /// Credentials could not be resolved for this request.
    #[error(transparent)]
    Credentials(#[from] AuthError),
    /// The signature could not be computed.
    #[error("failed to sign request")]
    Signing(#[source] cortexauth_core::Error),
    /// Whatever the wrapped transport reported, untouched.
    #[error(transparent)]
    Underlying(reqwest_middleware::Error),
}

/// Errors raised while building a signing client.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Credentials could not be resolved at construction.
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// The underlying reqwest client could not be built.
    #[error("failed to build http client")]
    Client(#[from] reqwest::Error),
}

impl From<TransportError> for reqwest_middleware::Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Underlying(err) => err,
            err => reqwest_middleware::Error::middleware(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortexauth_core::Error;
    use std::error::Error as _;

    #[test]
    fn test_credentials_unavailable_keeps_source() {
        let err = AuthError::CredentialsUnavailable {
            message: "no provider yielded credentials".to_string(),
            source: Some(Error::permission_denied("imds denied")),
        };
        assert!(err.to_string().contains("no provider yielded credentials"));
        assert!(err.source().is_some());

        let err = TransportError::from(err);
        assert!(matches!(err, TransportError::Credentials(_)));
    }

    #[test]
    fn test_transport_error_into_middleware_error() {
        let err: reqwest_middleware::Error = TransportError::BodyUnavailable.into();
        match err {
            reqwest_middleware::Error::Middleware(e) => {
                assert!(e.downcast_ref::<TransportError>().is_some())
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
