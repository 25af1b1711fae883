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

//! Streaming checksums usable as aws-chunked trailers.

use std::str::FromStr;

use crate::Error;

/// A streaming digest: update with bytes as they pass through, finalize to
/// the raw digest once the stream is exhausted.
pub trait Checksum: Send {
    /// Feed bytes into the digest.
    fn update(&mut self, data: &[u8]);

    /// Finalize the digest, consuming the state.
    ///
    /// The returned bytes are big-endian for the CRC family.
    fn finalize(self: Box<Self>) -> Vec<u8>;
}

/// Checksum algorithms with an `x-amz-checksum-*` trailer header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    /// CRC32 (ISO-HDLC)
    Crc32,
    /// CRC32C (iSCSI)
    Crc32c,
    /// CRC64-NVME
    Crc64Nvme,
    /// SHA-1
    Sha1,
    /// SHA-256
    Sha256,
}

impl ChecksumAlgorithm {
    /// The trailer header name carrying this algorithm's checksum.
    pub fn header_name(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Crc32 => "x-amz-checksum-crc32",
            ChecksumAlgorithm::Crc32c => "x-amz-checksum-crc32c",
            ChecksumAlgorithm::Crc64Nvme => "x-amz-checksum-crc64nvme",
            ChecksumAlgorithm::Sha1 => "x-amz-checksum-sha1",
            ChecksumAlgorithm::Sha256 => "x-amz-checksum-sha256",
        }
    }

    /// Create a fresh streaming digest for this algorithm.
    pub fn create(&self) -> Box<dyn Checksum> {
        match self {
            ChecksumAlgorithm::Crc32 => Box::new(Crc32::new()),
            ChecksumAlgorithm::Crc32c => Box::new(Crc32c::new()),
            ChecksumAlgorithm::Crc64Nvme => Box::new(Crc64Nvme::new()),
            ChecksumAlgorithm::Sha1 => Box::new(Sha1::default()),
            ChecksumAlgorithm::Sha256 => Box::new(Sha256::default()),
        }
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "crc32" => Ok(ChecksumAlgorithm::Crc32),
            "crc32c" => Ok(ChecksumAlgorithm::Crc32c),
            "crc64nvme" => Ok(ChecksumAlgorithm::Crc64Nvme),
            "sha1" => Ok(ChecksumAlgorithm::Sha1),
            "sha256" => Ok(ChecksumAlgorithm::Sha256),
            _ => Err(Error::config_invalid(format!(
                "unknown checksum algorithm: {s}"
            ))),
        }
    }
}

struct Crc32(crc_fast::Digest);

impl Crc32 {
    fn new() -> Self {
        Self(crc_fast::Digest::new(crc_fast::CrcAlgorithm::Crc32IsoHdlc))
    }
}

impl Checksum for Crc32 {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        (self.0.finalize() as u32).to_be_bytes().to_vec()
    }
}

struct Crc32c(crc_fast::Digest);

impl Crc32c {
    fn new() -> Self {
        Self(crc_fast::Digest::new(crc_fast::CrcAlgorithm::Crc32Iscsi))
    }
}

impl Checksum for Crc32c {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        (self.0.finalize() as u32).to_be_bytes().to_vec()
    }
}

struct Crc64Nvme(crc_fast::Digest);

impl Crc64Nvme {
    fn new() -> Self {
        Self(crc_fast::Digest::new(crc_fast::CrcAlgorithm::Crc64Nvme))
    }
}

impl Checksum for Crc64Nvme {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.0.finalize().to_be_bytes().to_vec()
    }
}

#[derive(Default)]
struct Sha1(sha1::Sha1);

impl Checksum for Sha1 {
    fn update(&mut self, data: &[u8]) {
        use sha1::Digest as _;
        self.0.update(data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        use sha1::Digest as _;
        self.0.finalize().to_vec()
    }
}

#[derive(Default)]
struct Sha256(sha2::Sha256);

impl Checksum for Sha256 {
    fn update(&mut self, data: &[u8]) {
        use sha2::Digest as _;
        self.0.update(data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        use sha2::Digest as _;
        self.0.finalize().to_vec()
    }
}
