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

//! SigV4 signing for Prometheus remote-write clients.
//!
//! [`SigningInterceptor`] is a [`reqwest_middleware::Middleware`] that signs
//! each outgoing request with AWS Signature Version 4 using credentials from
//! a [`CredentialResolver`]. [`build_client`] wires it into a client from an
//! [`ExporterConfig`].
//!
//! ```no_run
//! use cortexauth::{build_client, default_context, ExporterConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ExporterConfig::from_toml_str(
//!     r#"
//! endpoint = "https://aps-workspaces.us-east-1.amazonaws.com/workspaces/ws-1/api/v1/remote_write"
//!
//! [auth]
//! enabled = true
//! region = "us-east-1"
//! service = "aps"
//! "#,
//! )?;
//!
//! let client = build_client(&config, reqwest::Client::builder(), default_context()).await?;
//! let resp = client
//!     .post(&config.endpoint)
//!     .body(vec![0u8; 16])
//!     .send()
//!     .await?;
//! println!("{}", resp.status());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
pub use config::{ExporterConfig, QueueSettings, RetrySettings, EXPORTER_TYPE};

mod dump;
pub use dump::{DumpSink, LogDumpSink};

mod error;
pub use error::{AuthError, BuildError, ConfigError, TransportError};

mod factory;
pub use factory::{build_client, default_context};

mod interceptor;
pub use interceptor::{new_auth, SigningInterceptor};

mod resolver;
pub use resolver::CredentialResolver;

mod settings;
pub use settings::AuthSettings;
