mod common;

use std::time::Duration;

use http::{HeaderValue, Request, Response};
use simple_httpsig::signing::{CONTENT_DIGEST, SIGNATURE, SIGNATURE_INPUT, digest};
use simple_httpsig::{Component, MessageSigner, MessageVerifier, SignatureError};

use common::{KEY_A, KEY_B, KID_A, KID_B, resolver};

const BODY: &[u8] = br#"{"temp": 1.46}"#;
const CREATED: u64 = 1_700_000_000;
const NOW: u64 = CREATED + 10;
const MAX_AGE: Duration = Duration::from_secs(3600);

fn signed_request(body: &[u8]) -> Request<Vec<u8>> {
    let (sender, _) = resolver(KEY_A, &[]);
    let mut request = Request::post("/draft/Weather/Current/Metric")
        .body(body.to_vec())
        .unwrap();
    digest::inject(request.headers_mut(), body).unwrap();
    MessageSigner::new(sender, "sig1")
        .sign_at(&request, KID_A, &[Component::Method, Component::ContentDigest], CREATED)
        .unwrap()
        .apply(request.headers_mut())
        .unwrap();
    request
}

fn replace_header(request: &mut Request<Vec<u8>>, name: http::HeaderName, value: &str) {
    request
        .headers_mut()
        .insert(name, HeaderValue::from_str(value).unwrap());
}

#[tokio::test]
async fn signed_request_verifies_on_other_party() {
    let request = signed_request(BODY);
    let (receiver, source) = resolver(KEY_B, &[KEY_A]);
    let verifier = MessageVerifier::new(receiver, MAX_AGE);

    let verified = verifier.verify_at(&request, NOW).await.unwrap();
    assert_eq!(verified.len(), 1);
    assert_eq!(verified[0].key_id, KID_A);
    assert_eq!(verified[0].created, Some(CREATED));
    assert_eq!(source.fetch_count(), 1);

    // second verification is served from cache
    verifier.verify_at(&request, NOW).await.unwrap();
    assert_eq!(source.fetch_count(), 1);
}

#[tokio::test]
async fn independent_signature_verifies() {
    let mut request = Request::post("/").body(BODY.to_vec()).unwrap();
    replace_header(
        &mut request,
        CONTENT_DIGEST,
        "sha-256=:hZyhnC0lFCAAf7uaOx2zp9DbXKHeReggguA61LSdMTw=:",
    );
    replace_header(
        &mut request,
        SIGNATURE_INPUT,
        &format!(
            r#"sig1=("@method" "content-digest");created=1700000000;keyid="{KID_A}";alg="rsa-v1_5-sha256""#
        ),
    );
    replace_header(
        &mut request,
        SIGNATURE,
        "sig1=:D99SFaEdH6X225pUDGy3HCxWgC2cVyllnKRKK3dkd2sGxkVgV8j/QOSRo/F6n2DQy5YH1vl1j5CdB6BsxQqZ2V7SVNzK8nTB3ytYW3JOqDBsOq4LUjcLtd8/U8YbdO7AC7yEuMHIZvXHOJ/gyGdLD/RDEJAd+3lxWa053YrH0ofV50W/pb0GiT7TjJXuguZXP5zgwApUFkvQS5KN8ALxgl9AfIfJoEMXNrjRUpTtfsO+QuRTl6DdgprL4IjnVZ7IBzqba5UmCKkjikraPFQuzAXmgTOq3cDmht8/jMI319cay181PR1cIVmK+QZoe6wCQGjB7fxeGQYFz/lHhbCt0g==:",
    );

    let (receiver, _) = resolver(KEY_B, &[KEY_A]);
    let verifier = MessageVerifier::new(receiver, MAX_AGE);
    digest::verify_headers(request.headers(), BODY).unwrap();
    verifier.verify_at(&request, NOW).await.unwrap();
}

#[tokio::test]
async fn flipped_digest_fails_before_key_lookup() {
    let mut request = signed_request(BODY);
    replace_header(
        &mut request,
        CONTENT_DIGEST,
        "sha-256=:iZyhnC0lFCAAf7uaOx2zp9DbXKHeReggguA61LSdMTw=:",
    );
    let (receiver, source) = resolver(KEY_B, &[KEY_A]);
    let verifier = MessageVerifier::new(receiver, MAX_AGE);

    let result = verifier.verify_with_body(&request, BODY).await;
    assert!(matches!(result, Err(SignatureError::ContentDigestMismatch)));
    assert_eq!(source.fetch_count(), 0);
}

#[tokio::test]
async fn tampered_body_fails_digest() {
    let request = signed_request(BODY);
    let (receiver, source) = resolver(KEY_B, &[KEY_A]);
    let verifier = MessageVerifier::new(receiver, MAX_AGE);

    let result = verifier.verify_with_body(&request, br#"{"temp": 9.99}"#).await;
    assert!(matches!(result, Err(SignatureError::ContentDigestMismatch)));
    assert_eq!(source.fetch_count(), 0);
}

#[tokio::test]
async fn digest_swapped_with_consistent_body_fails_signature() {
    // attacker replaces body and digest together; the signature still covers the old digest
    let other = br#"{"temp": 9.99}"#;
    let mut request = signed_request(BODY);
    replace_header(&mut request, CONTENT_DIGEST, &digest::compute(other).header_value());
    let (receiver, _) = resolver(KEY_B, &[KEY_A]);
    let verifier = MessageVerifier::new(receiver, MAX_AGE);

    digest::verify_headers(request.headers(), other).unwrap();
    assert!(matches!(
        verifier.verify_at(&request, NOW).await,
        Err(SignatureError::SignatureInvalid)
    ));
}

#[tokio::test]
async fn tampered_signature_is_invalid() {
    let mut request = signed_request(BODY);
    let signature = request.headers()[SIGNATURE].to_str().unwrap().to_string();
    // flip one base64 character inside the byte sequence
    let index = "sig1=:".len() + 10;
    let replacement = if &signature[index..=index] == "A" { "B" } else { "A" };
    let tampered = format!("{}{replacement}{}", &signature[..index], &signature[index + 1..]);
    replace_header(&mut request, SIGNATURE, &tampered);

    let (receiver, _) = resolver(KEY_B, &[KEY_A]);
    let verifier = MessageVerifier::new(receiver, MAX_AGE);
    assert!(matches!(
        verifier.verify_at(&request, NOW).await,
        Err(SignatureError::SignatureInvalid)
    ));
}

#[tokio::test]
async fn changed_method_is_invalid() {
    let mut request = signed_request(BODY);
    *request.method_mut() = http::Method::PUT;
    let (receiver, _) = resolver(KEY_B, &[KEY_A]);
    let verifier = MessageVerifier::new(receiver, MAX_AGE);
    assert!(matches!(
        verifier.verify_at(&request, NOW).await,
        Err(SignatureError::SignatureInvalid)
    ));
}

#[tokio::test]
async fn missing_signature_headers() {
    let (receiver, source) = resolver(KEY_B, &[KEY_A]);
    let verifier = MessageVerifier::new(receiver, MAX_AGE);

    let mut without_signature = signed_request(BODY);
    without_signature.headers_mut().remove(SIGNATURE);
    assert!(matches!(
        verifier.verify_at(&without_signature, NOW).await,
        Err(SignatureError::MissingSignature)
    ));

    let mut without_input = signed_request(BODY);
    without_input.headers_mut().remove(SIGNATURE_INPUT);
    assert!(matches!(
        verifier.verify_at(&without_input, NOW).await,
        Err(SignatureError::MissingSignature)
    ));
    assert_eq!(source.fetch_count(), 0);
}

#[tokio::test]
async fn key_unknown_to_remote_set() {
    let request = signed_request(BODY);
    // the receiver's remote set holds only its own key
    let (receiver, source) = resolver(KEY_B, &[KEY_B]);
    let verifier = MessageVerifier::new(receiver, MAX_AGE);
    assert!(matches!(
        verifier.verify_at(&request, NOW).await,
        Err(SignatureError::UnknownKeyId(kid)) if kid == KID_A
    ));
    assert_eq!(source.fetch_count(), 1);
}

#[tokio::test]
async fn own_key_verifies_without_fetch() {
    let request = signed_request(BODY);
    let (receiver, source) = resolver(KEY_A, &[]);
    let verifier = MessageVerifier::new(receiver, MAX_AGE);
    verifier.verify_at(&request, NOW).await.unwrap();
    assert_eq!(source.fetch_count(), 0);
}

#[tokio::test]
async fn signed_response_covers_digest_only() {
    let (sender, _) = resolver(KEY_B, &[]);
    let mut response = Response::new(());
    let metadata = MessageSigner::new(sender, "sig1")
        .sign_message(&mut response, BODY, KID_B, &[Component::ContentDigest])
        .unwrap();
    assert!(metadata.signature_input.starts_with(r#"sig1=("content-digest");created="#));

    let (receiver, _) = resolver(KEY_A, &[KEY_B]);
    let verified = MessageVerifier::new(receiver, MAX_AGE)
        .verify_with_body(&response, BODY)
        .await
        .unwrap();
    assert_eq!(verified[0].components, vec![Component::ContentDigest]);
}

#[test]
fn response_cannot_cover_method() {
    let (sender, _) = resolver(KEY_B, &[]);
    let mut response = Response::new(());
    let result = MessageSigner::new(sender, "sig1").sign_message(
        &mut response,
        BODY,
        KID_B,
        &[Component::Method, Component::ContentDigest],
    );
    assert!(matches!(result, Err(SignatureError::UnresolvableComponent(_))));
}
