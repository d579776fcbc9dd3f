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
//! AWS SigV4 signing for cortexauth.
//!
//! This crate contains the two halves the interceptor needs:
//!
//! - credential providers that implement [`ProvideCredential`](cortexauth_core::ProvideCredential)
//!   and the [`DefaultCredentialProvider`] chain that combines them,
//! - [`RequestSigner`], which computes a SigV4 `Authorization` header for a request.
//!
//! ```no_run
//! use cortexauth_aws_v4::{Credential, Payload, RequestSigner};
//!
//! # fn example() -> cortexauth_core::Result<()> {
//! let cred = Credential {
//!     access_key_id: "AKIDEXAMPLE".to_string(),
//!     secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
//!     session_token: None,
//!     expires_in: None,
//! };
//!
//! let signer = RequestSigner::new("aps", "us-east-1");
//! let (mut parts, body) = http::Request::post("https://aps-workspaces.us-east-1.amazonaws.com/workspaces/ws-1/api/v1/remote_write")
//!     .body(b"payload".to_vec())?
//!     .into_parts();
//! signer.sign(&mut parts, &cred, Payload::Bytes(&body))?;
//! # Ok(())
//! # }
//! ```

mod constants;
pub use constants::*;

mod credential;
pub use credential::Credential;

mod provide_credential;
pub use provide_credential::*;

mod sign_request;
pub use sign_request::Payload;
pub use sign_request::RequestSigner;
