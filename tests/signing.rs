//! End-to-end chunked signing tests against the published AWS SigV4
//! streaming examples and the documented wire format.

use std::io::Read;

use http::request::Parts;
use http::Request;
use pretty_assertions::assert_eq;
use reqsign_aws_chunked::chunked::canonical_trailer_string;
use reqsign_aws_chunked::chunked::Trailer;
use reqsign_aws_chunked::hash;
use reqsign_aws_chunked::time::parse_iso8601;
use reqsign_aws_chunked::ChecksumAlgorithm;
use reqsign_aws_chunked::CredentialScope;
use reqsign_aws_chunked::ErrorKind;
use reqsign_aws_chunked::PayloadSigner;
use reqsign_aws_chunked::RollingSigner;
use reqsign_aws_chunked::SigningContext;

const SECRET_ACCESS_KEY: &str = "wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY";

/// Derive the SigV4 signing key the same way the seed request signer does.
fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let secret = format!("AWS4{secret}");
    let date_key = hash::hmac_sha256(secret.as_bytes(), date.as_bytes());
    let region_key = hash::hmac_sha256(&date_key, region.as_bytes());
    let service_key = hash::hmac_sha256(&region_key, service.as_bytes());
    hash::hmac_sha256(&service_key, b"aws4_request")
}

fn example_scope() -> CredentialScope {
    CredentialScope::new(
        parse_iso8601("20130524T000000Z").expect("datetime must parse"),
        "us-east-1",
        "s3",
    )
}

fn example_context(seed_signature: &str) -> SigningContext {
    SigningContext {
        signing_key: signing_key(SECRET_ACCESS_KEY, "20130524", "us-east-1", "s3"),
        seed_signature: seed_signature.to_string(),
    }
}

fn parts_with_headers(headers: &[(&str, &str)]) -> Parts {
    let mut builder = Request::builder()
        .method("PUT")
        .uri("https://examplebucket.s3.amazonaws.com/chunkObject.txt");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder
        .body(())
        .expect("request must be valid")
        .into_parts()
        .0
}

fn encode_all(
    signer: &PayloadSigner,
    parts: &mut Parts,
    payload: &'static [u8],
    seed_signature: &str,
) -> String {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut framed = signer
        .sign(
            Some(Box::new(payload)),
            parts,
            example_context(seed_signature),
        )
        .expect("signing must succeed");
    let mut out = Vec::new();
    framed.read_to_end(&mut out).expect("stream must drain");
    String::from_utf8(out).expect("encoded output must be ascii")
}

fn checksum_base64(algorithm: ChecksumAlgorithm, data: &[u8]) -> String {
    let mut checksum = algorithm.create();
    checksum.update(data);
    hash::base64_encode(&checksum.finalize())
}

/// The signed streaming example from the SigV4 documentation: 66560 bytes of
/// `a` in 64 KiB chunks, with known chunk signatures.
#[test]
fn test_aws_example_signed_payload() {
    let payload = vec![b'a'; 65536 + 1024].leak();
    let signer = PayloadSigner::new(example_scope(), 65536);
    let mut parts = parts_with_headers(&[
        ("content-length", "66560"),
        ("x-amz-content-sha256", "STREAMING-AWS4-HMAC-SHA256-PAYLOAD"),
    ]);

    let encoded = encode_all(
        &signer,
        &mut parts,
        payload,
        "4f232c4386841ef735655705268965c44a0e4690baa4adea153f7db9fa80a0a9",
    );

    let expected = format!(
        "10000;chunk-signature=ad80c730a21e5b8d04586a2213dd63b9a0e99e0e2307b0ade35a65485a288648\r\n{}\r\n\
         400;chunk-signature=0055627c9e194cb4542bae2aa5492e3c1575bbb81b612b7d234b86a503ef5497\r\n{}\r\n\
         0;chunk-signature=b6c6ea8a5354eaf15b3cb7646744f4275b71ea724fed81ceb9323e279d449df9\r\n\r\n",
        "a".repeat(65536),
        "a".repeat(1024),
    );
    assert_eq!(encoded, expected);
    // The documented length of the encoded example body.
    assert_eq!(encoded.len(), 66824);

    // Length metadata is rewritten: the receiver learns the decoded length.
    assert_eq!(
        parts.headers.get("x-amz-decoded-content-length").unwrap(),
        "66560"
    );
    assert!(parts.headers.get("content-length").is_none());
}

/// The trailing-header streaming example: same payload, signed chunks plus a
/// CRC32C checksum trailer and a trailer signature.
#[test]
fn test_aws_example_signed_payload_with_trailer() {
    let payload = vec![b'a'; 65536 + 1024].leak();
    let signer =
        PayloadSigner::new(example_scope(), 65536).with_checksum_algorithm(ChecksumAlgorithm::Crc32c);
    let mut parts = parts_with_headers(&[
        ("content-length", "66560"),
        (
            "x-amz-content-sha256",
            "STREAMING-AWS4-HMAC-SHA256-PAYLOAD-TRAILER",
        ),
    ]);

    let encoded = encode_all(
        &signer,
        &mut parts,
        payload,
        "106e2a8a18243abcf37539882f36619c00e2dfc72633413f02d3b74544bfeb8e",
    );

    let expected = format!(
        "10000;chunk-signature=b474d8862b1487a5145d686f57f013e54db672cee1c953b3010fb58501ef5aa2\r\n{}\r\n\
         400;chunk-signature=1c1344b170168f8e65b41376b44b20fe354e373826ccbbe2c1d40a8cae51e5c7\r\n{}\r\n\
         0;chunk-signature=2ca2aba2005185cf7159c6277faf83795951dd77a3a99e6e65d5c9f85863f992\r\n\
         x-amz-checksum-crc32c:sOO8/Q==\r\n\
         x-amz-trailer-signature:d81f82fc3505edab99d459891051a732e8730629a2e4a59689829ca17fe2e435\r\n\r\n",
        "a".repeat(65536),
        "a".repeat(1024),
    );
    assert_eq!(encoded, expected);

    // The checksum trailer was declared on the request.
    assert_eq!(
        parts.headers.get("x-amz-trailer").unwrap(),
        "x-amz-checksum-crc32c"
    );
}

/// Scenario: 11 byte payload, 8 byte chunks, unsigned with a CRC32 trailer.
#[test]
fn test_unsigned_payload_with_crc32_trailer() {
    let signer =
        PayloadSigner::new(example_scope(), 8).with_checksum_algorithm(ChecksumAlgorithm::Crc32);
    let mut parts = parts_with_headers(&[
        ("content-length", "11"),
        ("x-amz-content-sha256", "STREAMING-UNSIGNED-PAYLOAD-TRAILER"),
    ]);

    let encoded = encode_all(&signer, &mut parts, b"Hello world", "unused-seed");

    let expected = format!(
        "8\r\nHello wo\r\n3\r\nrld\r\n0\r\nx-amz-checksum-crc32:{}\r\n\r\n",
        checksum_base64(ChecksumAlgorithm::Crc32, b"Hello world"),
    );
    assert_eq!(encoded, expected);
}

/// Scenario: empty payload still emits exactly one zero-length chunk, and
/// the checksum trailer covers the empty string.
#[test]
fn test_empty_payload_with_trailer() {
    let signer =
        PayloadSigner::new(example_scope(), 8).with_checksum_algorithm(ChecksumAlgorithm::Crc32);
    let mut parts = parts_with_headers(&[
        ("content-length", "0"),
        ("x-amz-content-sha256", "STREAMING-UNSIGNED-PAYLOAD-TRAILER"),
    ]);

    let encoded = encode_all(&signer, &mut parts, b"", "unused-seed");

    assert_eq!(
        encoded,
        format!(
            "0\r\nx-amz-checksum-crc32:{}\r\n\r\n",
            checksum_base64(ChecksumAlgorithm::Crc32, b""),
        )
    );
}

/// Scenario: a declared trailer with no backing header is a configuration
/// error; nothing is emitted.
#[test]
fn test_declared_trailer_without_value_fails() {
    let signer = PayloadSigner::new(example_scope(), 8);
    let mut parts = parts_with_headers(&[
        ("content-length", "11"),
        ("x-amz-content-sha256", "STREAMING-AWS4-HMAC-SHA256-PAYLOAD"),
        ("x-amz-trailer", "x-custom-trailer"),
    ]);

    let err = signer
        .sign(
            Some(Box::new(&b"Hello world"[..])),
            &mut parts,
            example_context("seed"),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
}

/// Pre-existing trailers are moved out of the headers and emitted before the
/// mode-specific trailers; the trailer signature is always the last line.
#[test]
fn test_trailer_ordering_with_pre_existing_trailer() {
    let signer =
        PayloadSigner::new(example_scope(), 8).with_checksum_algorithm(ChecksumAlgorithm::Crc32);
    let mut parts = parts_with_headers(&[
        ("content-length", "11"),
        (
            "x-amz-content-sha256",
            "STREAMING-AWS4-HMAC-SHA256-PAYLOAD-TRAILER",
        ),
        ("x-amz-trailer", "x-custom-trailer"),
        ("x-custom-trailer", "abc"),
    ]);

    let encoded = encode_all(&signer, &mut parts, b"Hello world", "seed");

    // The declared trailer left the request headers.
    assert!(parts.headers.get("x-custom-trailer").is_none());

    let trailer_lines: Vec<&str> = encoded
        .split("\r\n")
        .skip_while(|line| *line != "0" && !line.starts_with("0;"))
        .skip(1)
        .filter(|line| !line.is_empty())
        .collect();
    assert_eq!(trailer_lines.len(), 3);
    assert_eq!(trailer_lines[0], "x-custom-trailer:abc");
    assert!(trailer_lines[1].starts_with("x-amz-checksum-crc32:"));
    assert!(trailer_lines[2].starts_with("x-amz-trailer-signature:"));
}

/// The trailer signature depends on the checksum trailer's value: same
/// payload and seed, different checksum algorithm, different trailer
/// signature while the chunk signatures stay identical.
#[test]
fn test_trailer_signature_depends_on_checksum() {
    let encode_with = |algorithm: ChecksumAlgorithm| {
        let signer = PayloadSigner::new(example_scope(), 8).with_checksum_algorithm(algorithm);
        let mut parts = parts_with_headers(&[
            ("content-length", "11"),
            (
                "x-amz-content-sha256",
                "STREAMING-AWS4-HMAC-SHA256-PAYLOAD-TRAILER",
            ),
        ]);
        encode_all(&signer, &mut parts, b"Hello world", "seed")
    };

    let with_crc32 = encode_with(ChecksumAlgorithm::Crc32);
    let with_crc32c = encode_with(ChecksumAlgorithm::Crc32c);

    let chunk_headers = |encoded: &str| -> Vec<String> {
        encoded
            .split("\r\n")
            .filter(|line| line.contains(";chunk-signature="))
            .map(|line| line.to_string())
            .collect()
    };
    let trailer_signature = |encoded: &str| -> String {
        encoded
            .split("\r\n")
            .find(|line| line.starts_with("x-amz-trailer-signature:"))
            .expect("trailer signature must be present")
            .to_string()
    };

    assert_eq!(chunk_headers(&with_crc32), chunk_headers(&with_crc32c));
    assert_ne!(
        trailer_signature(&with_crc32),
        trailer_signature(&with_crc32c)
    );
}

/// Repeated runs over identical input produce identical bytes.
#[test]
fn test_signing_is_deterministic() {
    let run = || {
        let signer = PayloadSigner::new(example_scope(), 8)
            .with_checksum_algorithm(ChecksumAlgorithm::Sha256);
        let mut parts = parts_with_headers(&[
            ("content-length", "11"),
            (
                "x-amz-content-sha256",
                "STREAMING-AWS4-HMAC-SHA256-PAYLOAD-TRAILER",
            ),
        ]);
        encode_all(&signer, &mut parts, b"Hello world", "seed")
    };
    assert_eq!(run(), run());
}

/// Tampering with any chunk changes that chunk's signature and every
/// signature after it.
#[test]
fn test_chunk_tampering_breaks_the_chain() {
    let chunk_signatures = |payload: &'static [u8]| -> Vec<String> {
        let signer = PayloadSigner::new(example_scope(), 8);
        let mut parts = parts_with_headers(&[
            ("content-length", "16"),
            ("x-amz-content-sha256", "STREAMING-AWS4-HMAC-SHA256-PAYLOAD"),
        ]);
        let encoded = encode_all(&signer, &mut parts, payload, "seed");
        encoded
            .split("\r\n")
            .filter(|line| line.contains(";chunk-signature="))
            .map(|line| line.to_string())
            .collect()
    };

    // Same first chunk, different second chunk.
    let original = chunk_signatures(b"aaaaaaaabbbbbbbb");
    let tampered = chunk_signatures(b"aaaaaaaacccccccc");

    assert_eq!(original.len(), 3);
    assert_eq!(original[0], tampered[0]);
    assert_ne!(original[1], tampered[1]);
    // The zero-length terminal chunk inherits the divergence.
    assert_ne!(original[2], tampered[2]);
}

/// An unrecognized content-sha256 marker is rejected before any byte is
/// produced.
#[test]
fn test_unrecognized_mode_is_unsupported() {
    let signer = PayloadSigner::new(example_scope(), 8);
    let mut parts = parts_with_headers(&[
        ("content-length", "11"),
        ("x-amz-content-sha256", "UNSIGNED-PAYLOAD"),
    ]);

    let err = signer
        .sign(
            Some(Box::new(&b"Hello world"[..])),
            &mut parts,
            example_context("seed"),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}

/// The rolling trailer signature can be reproduced from the public pieces:
/// canonical trailers, the chain seed, and the signing key.
#[test]
fn test_trailer_signature_matches_manual_chain() {
    let canonical = canonical_trailer_string(&[Trailer::new(
        "x-amz-checksum-crc32c",
        vec!["sOO8/Q==".to_string()],
    )]);
    assert_eq!(canonical, "x-amz-checksum-crc32c:sOO8/Q==\n");

    // Last data chunk signature from the documented trailing example.
    let mut signer = RollingSigner::new(
        signing_key(SECRET_ACCESS_KEY, "20130524", "us-east-1", "s3"),
        "2ca2aba2005185cf7159c6277faf83795951dd77a3a99e6e65d5c9f85863f992",
    );
    let scope = example_scope();
    let datetime = scope.datetime();
    let scope = scope.scope();
    let trailer_hash = hash::hex_sha256(canonical.as_bytes());
    let signature = signer.sign(|previous| {
        [
            "AWS4-HMAC-SHA256-TRAILER",
            datetime.as_str(),
            scope.as_str(),
            previous,
            trailer_hash.as_str(),
        ]
        .join("\n")
    });
    assert_eq!(
        signature,
        "d81f82fc3505edab99d459891051a732e8730629a2e4a59689829ca17fe2e435"
    );
}
