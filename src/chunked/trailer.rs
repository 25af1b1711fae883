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

use crate::Result;

/// A resolved trailer: a name and its ordered values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trailer {
    /// Trailer name, e.g. `x-amz-checksum-crc32`.
    pub name: String,
    /// Trailer values, rendered comma-joined on the wire.
    pub values: Vec<String>,
}

impl Trailer {
    /// Create a trailer from a name and its values.
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// The wire rendering of the trailer value.
    pub fn wire_value(&self) -> String {
        self.values.join(",")
    }
}

/// A deferred trailer, resolved exactly once at end-of-stream.
///
/// Providers are resolved in registration order and receive every earlier
/// provider's already-resolved trailer, so a later trailer may depend on an
/// earlier one (the trailer signature depends on the checksum trailer).
pub trait ResolveTrailer: Send {
    /// Produce the trailer. Called exactly once, after the last data chunk.
    fn resolve(&mut self, resolved: &[Trailer]) -> Result<Trailer>;
}

/// A trailer whose value is already known at registration time.
///
/// Used for trailers declared via `x-amz-trailer` whose values were moved out
/// of the request headers.
pub struct StaticTrailer(Trailer);

impl StaticTrailer {
    /// Create a static trailer provider.
    pub fn new(trailer: Trailer) -> Self {
        Self(trailer)
    }
}

impl ResolveTrailer for StaticTrailer {
    fn resolve(&mut self, _: &[Trailer]) -> Result<Trailer> {
        Ok(self.0.clone())
    }
}

/// Canonicalize trailers for signing: lowercased names sorted ascending, one
/// `name:value` line per trailer, values trimmed and comma-joined.
pub fn canonical_trailer_string(trailers: &[Trailer]) -> String {
    let mut entries: Vec<(String, String)> = trailers
        .iter()
        .map(|t| {
            (
                t.name.to_ascii_lowercase(),
                t.values
                    .iter()
                    .map(|v| v.trim())
                    .collect::<Vec<_>>()
                    .join(","),
            )
        })
        .collect();
    entries.sort();

    entries
        .into_iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect()
}
