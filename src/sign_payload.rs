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

use std::fmt::{Debug, Formatter};
use std::io::Read;
use std::sync::Arc;
use std::sync::Mutex;

use bytes::Bytes;
use futures::Stream;
use http::header;
use http::request::Parts;
use http::HeaderMap;
use http::HeaderValue;
use log::debug;

use crate::checksum::ChecksumAlgorithm;
use crate::chunked::canonical_trailer_string;
use crate::chunked::ChecksumRead;
use crate::chunked::ChecksumState;
use crate::chunked::ChunkedEncodedReader;
use crate::chunked::ChunkedEncodedReaderBuilder;
use crate::chunked::ExtensionFn;
use crate::chunked::ResolveTrailer;
use crate::chunked::StaticTrailer;
use crate::chunked::Trailer;
use crate::constants::{
    AWS4_HMAC_SHA256_PAYLOAD, AWS4_HMAC_SHA256_TRAILER, CHUNK_SIGNATURE, EMPTY_STRING_SHA256,
    STREAMING_SIGNED_PAYLOAD, STREAMING_SIGNED_PAYLOAD_TRAILER,
    STREAMING_UNSIGNED_PAYLOAD_TRAILER, X_AMZ_CONTENT_SHA_256, X_AMZ_DECODED_CONTENT_LENGTH,
    X_AMZ_TRAILER, X_AMZ_TRAILER_SIGNATURE,
};
use crate::hash::hex_sha256;
use crate::rolling::RollingSigner;
use crate::CredentialScope;
use crate::Error;
use crate::Result;

/// The signing key and seed signature produced by signing the initial
/// request.
///
/// Owned exclusively by one request's chunked signing operation; must not be
/// shared across requests.
pub struct SigningContext {
    /// The derived SigV4 signing key.
    pub signing_key: Vec<u8>,
    /// Hex signature of the initial (non-chunked) request, seeding the
    /// rolling signature chain.
    pub seed_signature: String,
}

impl Debug for SigningContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningContext")
            .field("signing_key", &"***")
            .field("seed_signature", &self.seed_signature)
            .finish()
    }
}

/// Payload signing mode, selected by the value of `x-amz-content-sha256`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSigningMode {
    /// Each chunk carries a `chunk-signature` extension; no trailers beyond
    /// those declared on the request.
    Signed,
    /// Chunks are unsigned; a checksum is delivered as a trailer.
    UnsignedWithTrailer,
    /// Chunks carry signatures, a checksum trailer may be present, and the
    /// trailer block itself is signed.
    SignedWithTrailer,
}

impl PayloadSigningMode {
    /// Select a mode from the `x-amz-content-sha256` header value.
    ///
    /// Any unrecognized value is an unsupported operation, surfaced before
    /// any byte is produced.
    pub fn from_header(value: &str) -> Result<Self> {
        match value {
            STREAMING_SIGNED_PAYLOAD => Ok(PayloadSigningMode::Signed),
            STREAMING_UNSIGNED_PAYLOAD_TRAILER => Ok(PayloadSigningMode::UnsignedWithTrailer),
            STREAMING_SIGNED_PAYLOAD_TRAILER => Ok(PayloadSigningMode::SignedWithTrailer),
            v => Err(Error::unsupported(format!(
                "{X_AMZ_CONTENT_SHA_256} value {v} does not select a chunked signing mode"
            ))),
        }
    }
}

/// Signs a request payload by chunk-encoding it, optionally adding a
/// `chunk-signature` chunk-extension and/or trailers with their signature at
/// the end.
///
/// - [Signature Calculations: Transfer Payload in Multiple Chunks](https://docs.aws.amazon.com/AmazonS3/latest/API/sigv4-streaming.html)
/// - [Signature Calculations: Including Trailing Headers](https://docs.aws.amazon.com/AmazonS3/latest/API/sigv4-streaming-trailers.html)
#[derive(Debug)]
pub struct PayloadSigner {
    scope: CredentialScope,
    chunk_size: usize,
    checksum_algorithm: Option<ChecksumAlgorithm>,
}

impl PayloadSigner {
    /// Create a payload signer emitting data chunks of at most `chunk_size`
    /// bytes.
    pub fn new(scope: CredentialScope, chunk_size: usize) -> Self {
        Self {
            scope,
            chunk_size,
            checksum_algorithm: None,
        }
    }

    /// Deliver a checksum of the full payload as a trailer.
    pub fn with_checksum_algorithm(mut self, algorithm: ChecksumAlgorithm) -> Self {
        self.checksum_algorithm = Some(algorithm);
        self
    }

    /// Transform `payload` into a lazily-pulled aws-chunked byte source and
    /// rewrite the request's length metadata accordingly.
    ///
    /// No payload byte is consumed and no cryptographic work happens until
    /// the returned reader is pulled; every fatal condition detectable up
    /// front surfaces here instead.
    pub fn sign(
        &self,
        payload: Option<Box<dyn Read + Send>>,
        req: &mut Parts,
        context: SigningContext,
    ) -> Result<ChunkedEncodedReader> {
        move_content_length(&mut req.headers)?;

        let mode = req
            .headers
            .get(X_AMZ_CONTENT_SHA_256)
            .ok_or_else(|| Error::request_invalid(format!("{X_AMZ_CONTENT_SHA_256} must be set")))
            .and_then(|v| PayloadSigningMode::from_header(v.to_str()?))?;
        debug!(
            "chunked payload signing mode: {mode:?}, scope: {}",
            self.scope.scope()
        );

        let mut builder = ChunkedEncodedReader::builder().chunk_size(self.chunk_size);
        for trailer in take_declared_trailers(&mut req.headers)? {
            builder = builder.add_trailer(Box::new(trailer));
        }

        let mut source: Box<dyn Read + Send> = match payload {
            Some(payload) => payload,
            None => Box::new(std::io::empty()),
        };

        match mode {
            PayloadSigningMode::Signed => {
                let signer = shared_signer(context);
                builder = builder.extension(self.chunk_signature_extension(signer));
            }
            PayloadSigningMode::UnsignedWithTrailer => {
                let algorithm = self.checksum_algorithm.ok_or_else(|| {
                    Error::config_invalid(
                        "a checksum algorithm must be configured to add a checksum trailer",
                    )
                })?;
                (source, builder) =
                    setup_checksum_trailer(algorithm, source, &mut req.headers, builder);
            }
            PayloadSigningMode::SignedWithTrailer => {
                let signer = shared_signer(context);
                builder = builder.extension(self.chunk_signature_extension(signer.clone()));
                if let Some(algorithm) = self.checksum_algorithm {
                    (source, builder) =
                        setup_checksum_trailer(algorithm, source, &mut req.headers, builder);
                }
                // The trailer signature depends on every other trailer, so it
                // must be the last provider registered.
                builder = builder.add_trailer(Box::new(SignatureTrailer {
                    scope: self.scope.clone(),
                    signer,
                }));
            }
        }

        builder.source(source).build()
    }

    /// Signing an asynchronous payload is unsupported.
    ///
    /// This fails fast before any work begins rather than partially signing
    /// and then failing mid-stream.
    pub fn sign_async<S>(
        &self,
        _payload: S,
        _req: &mut Parts,
        _context: SigningContext,
    ) -> Result<ChunkedEncodedReader>
    where
        S: Stream<Item = std::io::Result<Bytes>>,
    {
        Err(Error::unsupported(
            "signing an asynchronous payload stream is not supported",
        ))
    }

    /// The `chunk-signature` extension: signs every chunk, including the
    /// terminal zero-length one, against the rolling chain.
    fn chunk_signature_extension(&self, signer: Arc<Mutex<RollingSigner>>) -> ExtensionFn {
        let scope = self.scope.clone();
        Box::new(move |chunk: &[u8]| {
            let mut signer = signer.lock().expect("rolling signer lock poisoned");
            let signature = signer.sign(|previous| chunk_string_to_sign(&scope, previous, chunk));
            Ok((CHUNK_SIGNATURE.to_string(), signature))
        })
    }
}

fn shared_signer(context: SigningContext) -> Arc<Mutex<RollingSigner>> {
    // One rolling signer per operation, shared between the per-chunk
    // extension and the trailer signer so the chain is unbroken.
    Arc::new(Mutex::new(RollingSigner::new(
        context.signing_key,
        context.seed_signature,
    )))
}

/// Move `content-length` into `x-amz-decoded-content-length` if the latter
/// isn't already present. The framed output's length differs from the
/// original, so `content-length` is always removed.
fn move_content_length(headers: &mut HeaderMap) -> Result<()> {
    if headers.contains_key(X_AMZ_DECODED_CONTENT_LENGTH) {
        headers.remove(header::CONTENT_LENGTH);
        return Ok(());
    }

    let content_length = headers.remove(header::CONTENT_LENGTH).ok_or_else(|| {
        Error::request_invalid(format!(
            "either {} or {X_AMZ_DECODED_CONTENT_LENGTH} must be set",
            header::CONTENT_LENGTH
        ))
    })?;
    headers.insert(X_AMZ_DECODED_CONTENT_LENGTH, content_length);
    Ok(())
}

/// Move trailers declared via `x-amz-trailer` out of the request headers
/// into static trailer providers.
///
/// Each declared name must have at least one value among the request
/// headers; the checksum trailer is the only one added without a backing
/// header, and it is declared later by `setup_checksum_trailer`.
fn take_declared_trailers(headers: &mut HeaderMap) -> Result<Vec<StaticTrailer>> {
    let declared: Vec<String> = headers
        .get_all(X_AMZ_TRAILER)
        .iter()
        .map(|v| v.to_str().map_err(Error::from))
        .collect::<Result<Vec<_>>>()?
        .iter()
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();

    let mut trailers = Vec::with_capacity(declared.len());
    for name in declared {
        let values: Vec<String> = headers
            .get_all(name.as_str())
            .iter()
            .map(|v| v.to_str().map(|v| v.to_string()).map_err(Error::from))
            .collect::<Result<Vec<_>>>()?;
        if values.is_empty() {
            return Err(Error::config_invalid(format!(
                "{name} must be present in the request headers to be a valid trailer"
            )));
        }

        headers.remove(name.as_str());
        trailers.push(StaticTrailer::new(Trailer::new(name, values)));
    }
    Ok(trailers)
}

/// Wrap the source in a checksum relay, register the checksum trailer, and
/// declare its header name in `x-amz-trailer`.
fn setup_checksum_trailer(
    algorithm: ChecksumAlgorithm,
    source: Box<dyn Read + Send>,
    headers: &mut HeaderMap,
    builder: ChunkedEncodedReaderBuilder,
) -> (Box<dyn Read + Send>, ChunkedEncodedReaderBuilder) {
    debug!(
        "adding {} trailer for checksum algorithm {algorithm:?}",
        algorithm.header_name()
    );
    let state = Arc::new(Mutex::new(ChecksumState::new(algorithm.create())));
    let source = Box::new(ChecksumRead::new(source, state.clone()));

    headers.append(X_AMZ_TRAILER, HeaderValue::from_static(algorithm.header_name()));
    let builder = builder.add_trailer(Box::new(ChecksumTrailer {
        name: algorithm.header_name(),
        state,
    }));
    (source, builder)
}

/// Reports the relayed checksum, base64 encoded, once the source is
/// exhausted.
struct ChecksumTrailer {
    name: &'static str,
    state: Arc<Mutex<ChecksumState>>,
}

impl ResolveTrailer for ChecksumTrailer {
    fn resolve(&mut self, _: &[Trailer]) -> Result<Trailer> {
        let mut state = self.state.lock().expect("checksum state lock poisoned");
        // The framer reads the source to exhaustion before resolving
        // trailers, so the digest is already final; finish() is idempotent.
        state.finish();
        let digest = state
            .digest()
            .ok_or_else(|| Error::unexpected("checksum digest read before end of stream"))?;
        Ok(Trailer::new(self.name, vec![crate::hash::base64_encode(digest)]))
    }
}

/// Signs the fully-resolved trailer set with the rolling chain.
struct SignatureTrailer {
    scope: CredentialScope,
    signer: Arc<Mutex<RollingSigner>>,
}

impl ResolveTrailer for SignatureTrailer {
    fn resolve(&mut self, resolved: &[Trailer]) -> Result<Trailer> {
        let mut signer = self.signer.lock().expect("rolling signer lock poisoned");
        let signature =
            signer.sign(|previous| trailer_string_to_sign(&self.scope, previous, resolved));
        Ok(Trailer::new(X_AMZ_TRAILER_SIGNATURE, vec![signature]))
    }
}

fn chunk_string_to_sign(scope: &CredentialScope, previous_signature: &str, chunk: &[u8]) -> String {
    let datetime = scope.datetime();
    let scope = scope.scope();
    let chunk_hash = hex_sha256(chunk);
    [
        AWS4_HMAC_SHA256_PAYLOAD,
        datetime.as_str(),
        scope.as_str(),
        previous_signature,
        EMPTY_STRING_SHA256,
        chunk_hash.as_str(),
    ]
    .join("\n")
}

fn trailer_string_to_sign(
    scope: &CredentialScope,
    previous_signature: &str,
    trailers: &[Trailer],
) -> String {
    let datetime = scope.datetime();
    let scope = scope.scope();
    let trailer_hash = hex_sha256(canonical_trailer_string(trailers).as_bytes());
    [
        AWS4_HMAC_SHA256_TRAILER,
        datetime.as_str(),
        scope.as_str(),
        previous_signature,
        trailer_hash.as_str(),
    ]
    .join("\n")
}
