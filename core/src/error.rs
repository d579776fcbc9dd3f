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

use std::fmt;

/// Error raised while loading credentials or signing a request.
///
/// Carries a coarse [`ErrorKind`], a message, free-form context lines such
/// as `endpoint: http://169.254.169.254`, whether retrying may help, and the
/// underlying cause.
pub struct Error {
    kind: ErrorKind,
    message: String,
    context: Vec<String>,
    retryable: bool,
    source: Option<anyhow::Error>,
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A credential was found but is malformed.
    CredentialInvalid,
    /// A credential was found but has expired.
    CredentialExpired,
    /// A credential source refused access.
    PermissionDenied,
    /// The request can't be signed as it stands.
    RequestInvalid,
    /// A credential source is misconfigured.
    ConfigInvalid,
    /// Anything else: I/O, network, unexpected responses.
    Unexpected,
}

impl ErrorKind {
    fn as_str(self) -> &'static str {
        match self {
            ErrorKind::CredentialInvalid => "invalid credentials",
            ErrorKind::CredentialExpired => "expired credentials",
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::RequestInvalid => "invalid request",
            ErrorKind::ConfigInvalid => "invalid configuration",
            ErrorKind::Unexpected => "unexpected error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Error of `kind`, not retryable, without context or source.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: Vec::new(),
            retryable: false,
            source: None,
        }
    }

    /// See [`ErrorKind::CredentialInvalid`].
    pub fn credential_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CredentialInvalid, message)
    }

    /// See [`ErrorKind::CredentialExpired`].
    pub fn credential_expired(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CredentialExpired, message)
    }

    /// See [`ErrorKind::PermissionDenied`].
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, message)
    }

    /// See [`ErrorKind::RequestInvalid`].
    pub fn request_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RequestInvalid, message)
    }

    /// See [`ErrorKind::ConfigInvalid`].
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    /// See [`ErrorKind::Unexpected`].
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, message)
    }

    /// Record the underlying cause.
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Append a context line, like `endpoint: http://169.254.169.254`.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Mark whether retrying may succeed.
    pub fn set_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Message without kind or context.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Context lines in the order they were added.
    pub fn context(&self) -> &[String] {
        &self.context
    }

    /// Whether retrying may succeed, e.g. after a timeout or a 5xx.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Whether the credential itself is the problem rather than the
    /// environment or the request.
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::CredentialInvalid | ErrorKind::CredentialExpired | ErrorKind::PermissionDenied
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)?;
        if !self.context.is_empty() {
            write!(f, ", context: {{ {} }}", self.context.join(", "))?;
        }
        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            return f
                .debug_struct("Error")
                .field("kind", &self.kind)
                .field("message", &self.message)
                .field("context", &self.context)
                .field("retryable", &self.retryable)
                .field("source", &self.source)
                .finish();
        }

        fmt::Display::fmt(self, f)?;
        match &self.source {
            Some(source) => write!(f, ", source: {source:?}"),
            None => Ok(()),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| &**e as &(dyn std::error::Error + 'static))
    }
}

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(err)
    }
}

macro_rules! from_std_error {
    ($($ty:ty => $ctor:ident),* $(,)?) => {
        $(
            impl From<$ty> for Error {
                fn from(err: $ty) -> Self {
                    Self::$ctor(err.to_string()).with_source(err)
                }
            }
        )*
    };
}

from_std_error! {
    std::fmt::Error => unexpected,
    std::io::Error => unexpected,
    http::Error => request_invalid,
    http::header::InvalidHeaderValue => request_invalid,
    http::header::InvalidHeaderName => request_invalid,
    http::header::ToStrError => request_invalid,
    http::uri::InvalidUri => request_invalid,
}
