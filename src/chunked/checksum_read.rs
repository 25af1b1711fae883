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

use std::io::Read;
use std::sync::Arc;
use std::sync::Mutex;

use crate::checksum::Checksum;

/// Mutable digest state shared between a [`ChecksumRead`] and the trailer
/// provider that reports the final digest.
pub struct ChecksumState {
    checksum: Option<Box<dyn Checksum>>,
    digest: Option<Vec<u8>>,
}

impl ChecksumState {
    /// Wrap a streaming digest.
    pub fn new(checksum: Box<dyn Checksum>) -> Self {
        Self {
            checksum: Some(checksum),
            digest: None,
        }
    }

    fn update(&mut self, data: &[u8]) {
        if let Some(checksum) = self.checksum.as_mut() {
            checksum.update(data);
        }
    }

    /// Finalize the digest. Idempotent.
    pub fn finish(&mut self) {
        if let Some(checksum) = self.checksum.take() {
            self.digest = Some(checksum.finalize());
        }
    }

    /// The final digest, available only once the source is exhausted.
    pub fn digest(&self) -> Option<&[u8]> {
        self.digest.as_deref()
    }
}

/// A transparent pass-through reader that accumulates a streaming checksum.
///
/// Every read delegates to the wrapped source and feeds the bytes into the
/// shared digest state before handing them to the caller, so the checksum is
/// computed exactly once while the payload is consumed. The digest finalizes
/// when the source signals exhaustion.
pub struct ChecksumRead {
    inner: Box<dyn Read + Send>,
    state: Arc<Mutex<ChecksumState>>,
}

impl ChecksumRead {
    /// Wrap `inner`, feeding every byte read into `state`.
    pub fn new(inner: Box<dyn Read + Send>, state: Arc<Mutex<ChecksumState>>) -> Self {
        Self { inner, state }
    }
}

impl Read for ChecksumRead {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        let mut state = self.state.lock().expect("checksum state lock poisoned");
        if n == 0 {
            state.finish();
        } else {
            state.update(&buf[..n]);
        }
        Ok(n)
    }
}
