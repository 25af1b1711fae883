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

//! Chunk framing for aws-chunked encoded payloads.

mod encode;
pub use encode::ChunkedEncodedReader;
pub use encode::ChunkedEncodedReaderBuilder;
pub use encode::ExtensionFn;

mod trailer;
pub use trailer::canonical_trailer_string;
pub use trailer::ResolveTrailer;
pub use trailer::StaticTrailer;
pub use trailer::Trailer;

mod checksum_read;
pub use checksum_read::ChecksumRead;
pub use checksum_read::ChecksumState;
