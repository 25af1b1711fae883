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

use crate::time::{format_date, format_iso8601, DateTime};

/// The credential scope a chunked payload is signed under.
///
/// Supplied by the seed-request signing step and consumed read-only: every
/// chunk and trailer string-to-sign embeds the same signing date and
/// region/service scope as the seed request.
#[derive(Debug, Clone)]
pub struct CredentialScope {
    date: DateTime,
    region: String,
    service: String,
}

impl CredentialScope {
    /// Create a new credential scope.
    pub fn new(date: DateTime, region: &str, service: &str) -> Self {
        Self {
            date,
            region: region.into(),
            service: service.into(),
        }
    }

    /// The request datetime: `20130524T000000Z`
    pub fn datetime(&self) -> String {
        format_iso8601(self.date)
    }

    /// Scope: `20130524/<region>/<service>/aws4_request`
    pub fn scope(&self) -> String {
        format!(
            "{}/{}/{}/aws4_request",
            format_date(self.date),
            self.region,
            self.service
        )
    }
}
