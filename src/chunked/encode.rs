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

use bytes::Buf;
use bytes::Bytes;

use super::trailer::ResolveTrailer;
use super::trailer::Trailer;
use crate::Error;
use crate::Result;

/// A per-chunk extension: given the chunk's bytes, produce a `name=value`
/// pair appended to the chunk's length header line.
pub type ExtensionFn = Box<dyn FnMut(&[u8]) -> Result<(String, String)> + Send>;

const CRLF: &[u8] = b"\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    NotStarted,
    DataChunks,
    Trailers,
    Done,
}

/// A lazy chunk-framed byte source.
///
/// Splits the wrapped source into chunks of at most the configured size, each
/// emitted as a length-prefixed frame with optional extensions, terminated by
/// a zero-length chunk and a trailer block:
///
/// ```text
/// <hex-chunk-length>[;ext-name=ext-value ...]\r\n
/// <chunk-bytes>\r\n
/// ...
/// 0[;ext-name=ext-value ...]\r\n
/// <trailer-name>:<trailer-value>\r\n
/// \r\n
/// ```
///
/// Nothing is produced ahead of demand: chunks are framed, extensions
/// computed, and trailers resolved only as the caller pulls bytes.
pub struct ChunkedEncodedReader {
    source: Box<dyn Read + Send>,
    chunk_size: usize,
    extensions: Vec<ExtensionFn>,
    trailers: Vec<Box<dyn ResolveTrailer>>,

    state: State,
    buffer: Bytes,
}

impl std::fmt::Debug for ChunkedEncodedReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedEncodedReader")
            .field("chunk_size", &self.chunk_size)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ChunkedEncodedReader {
    /// Create a builder for a chunk-framed byte source.
    pub fn builder() -> ChunkedEncodedReaderBuilder {
        ChunkedEncodedReaderBuilder::default()
    }

    /// Read from the source until `chunk_size` bytes are buffered or the
    /// source is exhausted.
    fn fill_chunk(&mut self) -> std::io::Result<Vec<u8>> {
        let mut chunk = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < self.chunk_size {
            let n = self.source.read(&mut chunk[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        chunk.truncate(filled);
        Ok(chunk)
    }

    fn chunk_header(&mut self, chunk: &[u8]) -> Result<Vec<u8>> {
        let mut header = format!("{:x}", chunk.len()).into_bytes();
        for extension in self.extensions.iter_mut() {
            let (name, value) = extension(chunk)?;
            header.push(b';');
            header.extend_from_slice(name.as_bytes());
            header.push(b'=');
            header.extend_from_slice(value.as_bytes());
        }
        header.extend_from_slice(CRLF);
        Ok(header)
    }

    /// Produce the next framed byte group, or `None` once done.
    fn next_frame(&mut self) -> Result<Option<Bytes>> {
        match self.state {
            State::NotStarted | State::DataChunks => {
                let chunk = self.fill_chunk()?;
                if chunk.is_empty() {
                    // Terminal zero-length chunk; only trailers may follow.
                    self.state = State::Trailers;
                    let header = self.chunk_header(&chunk)?;
                    Ok(Some(header.into()))
                } else {
                    self.state = State::DataChunks;
                    let mut frame = self.chunk_header(&chunk)?;
                    frame.extend_from_slice(&chunk);
                    frame.extend_from_slice(CRLF);
                    Ok(Some(frame.into()))
                }
            }
            State::Trailers => {
                let mut resolved: Vec<Trailer> = Vec::with_capacity(self.trailers.len());
                for provider in self.trailers.iter_mut() {
                    let trailer = provider.resolve(&resolved)?;
                    resolved.push(trailer);
                }

                let mut frame = Vec::new();
                for trailer in &resolved {
                    frame.extend_from_slice(trailer.name.as_bytes());
                    frame.push(b':');
                    frame.extend_from_slice(trailer.wire_value().as_bytes());
                    frame.extend_from_slice(CRLF);
                }
                frame.extend_from_slice(CRLF);

                self.state = State::Done;
                Ok(Some(frame.into()))
            }
            State::Done => Ok(None),
        }
    }
}

impl Read for ChunkedEncodedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        while self.buffer.is_empty() {
            match self.next_frame().map_err(std::io::Error::other)? {
                Some(frame) => self.buffer = frame,
                None => return Ok(0),
            }
        }

        let n = buf.len().min(self.buffer.len());
        buf[..n].copy_from_slice(&self.buffer[..n]);
        self.buffer.advance(n);
        Ok(n)
    }
}

/// Builder for [`ChunkedEncodedReader`].
#[derive(Default)]
pub struct ChunkedEncodedReaderBuilder {
    source: Option<Box<dyn Read + Send>>,
    chunk_size: usize,
    extensions: Vec<ExtensionFn>,
    trailers: Vec<Box<dyn ResolveTrailer>>,
}

impl ChunkedEncodedReaderBuilder {
    /// Set the byte source to frame.
    pub fn source(mut self, source: Box<dyn Read + Send>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the maximum data chunk size.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Register a per-chunk extension, computed lazily for every emitted
    /// chunk including the terminal zero-length one.
    pub fn extension(mut self, extension: ExtensionFn) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Register a deferred trailer. Trailers resolve in registration order.
    pub fn add_trailer(mut self, trailer: Box<dyn ResolveTrailer>) -> Self {
        self.trailers.push(trailer);
        self
    }

    /// Build the reader.
    pub fn build(self) -> Result<ChunkedEncodedReader> {
        let source = self
            .source
            .ok_or_else(|| Error::config_invalid("chunked encoding requires a byte source"))?;
        if self.chunk_size == 0 {
            return Err(Error::config_invalid("chunk size must be non-zero"));
        }

        Ok(ChunkedEncodedReader {
            source,
            chunk_size: self.chunk_size,
            extensions: self.extensions,
            trailers: self.trailers,
            state: State::NotStarted,
            buffer: Bytes::new(),
        })
    }
}
