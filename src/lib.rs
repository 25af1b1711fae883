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
// KIND, either express or implied. See the License for the
// specific language governing permissions and limitations
// under the License.

//! Streaming aws-chunked payload signing for AWS SigV4.
//!
//! This crate turns an arbitrary-length request body into an `aws-chunked`
//! encoded byte stream without buffering the full payload: each data chunk
//! may carry a rolling `chunk-signature` extension, and integrity metadata
//! (a streamed checksum, a trailer signature) is delivered as trailing
//! headers after the terminal zero-length chunk.
//!
//! Signing the initial (seed) request, credential loading, and the HTTP
//! transport are out of scope: callers bring a [`SigningContext`] (signing
//! key plus seed signature) from their SigV4 request signer and drive the
//! returned reader themselves.
//!
//! ## Example
//!
//! ```no_run
//! use std::io::Read;
//! use reqsign_aws_chunked::{
//!     ChecksumAlgorithm, CredentialScope, PayloadSigner, SigningContext,
//! };
//!
//! # fn main() -> reqsign_aws_chunked::Result<()> {
//! let scope = CredentialScope::new(reqsign_aws_chunked::time::now(), "us-east-1", "s3");
//! let signer = PayloadSigner::new(scope, 64 * 1024)
//!     .with_checksum_algorithm(ChecksumAlgorithm::Crc32);
//!
//! let (mut parts, body) = http::Request::builder()
//!     .method("PUT")
//!     .uri("https://example-bucket.s3.amazonaws.com/example-key")
//!     .header("content-length", "11")
//!     .header("x-amz-content-sha256", "STREAMING-UNSIGNED-PAYLOAD-TRAILER")
//!     .body("Hello world")
//!     .expect("request must be valid")
//!     .into_parts();
//!
//! let context = SigningContext {
//!     signing_key: vec![],  // from the seed request signer
//!     seed_signature: String::new(),
//! };
//! let mut framed = signer.sign(Some(Box::new(body.as_bytes())), &mut parts, context)?;
//!
//! // The transport layer pulls the encoded chunks lazily.
//! let mut encoded = Vec::new();
//! framed.read_to_end(&mut encoded)?;
//! # Ok(())
//! # }
//! ```

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

pub mod hash;
pub mod time;

mod constants;

mod error;
pub use error::Error;
pub use error::ErrorKind;
pub use error::Result;

mod scope;
pub use scope::CredentialScope;

mod checksum;
pub use checksum::Checksum;
pub use checksum::ChecksumAlgorithm;

mod rolling;
pub use rolling::RollingSigner;

pub mod chunked;

mod sign_payload;
pub use sign_payload::PayloadSigner;
pub use sign_payload::PayloadSigningMode;
pub use sign_payload::SigningContext;
