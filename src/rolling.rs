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

use log::trace;

use crate::hash::hex_hmac_sha256;

/// A signer whose every signature depends on the previous one.
///
/// The chain starts at the seed signature of the initial request; each
/// [`sign`](RollingSigner::sign) call replaces the current signature with the
/// new one, so per-chunk signatures and the final trailer signature form one
/// unbroken chain.
///
/// Exactly one instance must exist per chunked signing operation, and calls
/// must happen in chunk order: the chain is corrupted by out-of-order or
/// concurrent signing. This is a caller contract, not enforced here.
pub struct RollingSigner {
    signing_key: Vec<u8>,
    previous_signature: String,
}

impl RollingSigner {
    /// Create a rolling signer seeded with the initial request's signature.
    pub fn new(signing_key: impl Into<Vec<u8>>, seed_signature: impl Into<String>) -> Self {
        Self {
            signing_key: signing_key.into(),
            previous_signature: seed_signature.into(),
        }
    }

    /// Sign the string built by `string_to_sign` from the previous signature.
    ///
    /// The result becomes the new previous signature.
    pub fn sign<F>(&mut self, string_to_sign: F) -> String
    where
        F: FnOnce(&str) -> String,
    {
        let sts = string_to_sign(&self.previous_signature);
        trace!("rolling signer string to sign: {sts}");

        let signature = hex_hmac_sha256(&self.signing_key, sts.as_bytes());
        self.previous_signature = signature.clone();
        signature
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signatures_chain() {
        let mut signer = RollingSigner::new(b"key".to_vec(), "seed");

        let first = signer.sign(|prev| {
            assert_eq!(prev, "seed");
            format!("chunk-1\n{prev}")
        });
        let second = signer.sign(|prev| {
            assert_eq!(prev, first);
            format!("chunk-2\n{prev}")
        });
        assert_ne!(first, second);
    }

    #[test]
    fn test_deterministic() {
        let run = || {
            let mut signer = RollingSigner::new(b"key".to_vec(), "seed");
            (signer.sign(|p| format!("a\n{p}")), signer.sign(|p| format!("b\n{p}")))
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_tampered_predecessor_changes_signature() {
        // Same chunk content, different previous signature: the second chunk's
        // signature must differ, proving the chain dependency.
        let mut honest = RollingSigner::new(b"key".to_vec(), "seed");
        let mut tampered = RollingSigner::new(b"key".to_vec(), "tampered-seed");

        let sts = |prev: &str| format!("same-chunk\n{prev}");
        assert_ne!(honest.sign(sts), tampered.sign(sts));
        assert_ne!(honest.sign(sts), tampered.sign(sts));
    }
}
