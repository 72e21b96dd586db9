//! Email-verified signup against the fake API.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use shopfront_client::api::VerificationToken;
use shopfront_client::{
    ApiClient, CancellationToken, ClientError, MemoryTokenStore, Operation, SessionManager,
    SignupFlow, SignupStage, ValidationError,
};
use shopfront_core::Email;
use shopfront_integration_tests::{FakeApi, VERIFICATION_CODE};

const EMAIL: &str = "new@shop.com";

#[tokio::test]
async fn full_signup_then_login() {
    let fake = FakeApi::start().await;
    let api = ApiClient::new(&fake.config()).unwrap();
    let flow = SignupFlow::new(api.clone());
    let cancel = CancellationToken::new();

    assert!(
        api.check_email_availability(&Email::parse(EMAIL).unwrap())
            .await
            .unwrap()
    );

    flow.send_code(EMAIL, &cancel).await.unwrap();
    assert!(matches!(flow.stage().await, SignupStage::CodeSent { .. }));

    flow.verify(VERIFICATION_CODE, &cancel).await.unwrap();
    assert!(matches!(flow.stage().await, SignupStage::Verified { .. }));

    let user = flow
        .register(SecretString::from("s3cret"), "New Person", "010-0000-0000", &cancel)
        .await
        .unwrap();
    assert_eq!(user.email.as_str(), EMAIL);
    assert_eq!(flow.stage().await, SignupStage::Registered { user });
    assert!(fake.has_account(EMAIL));

    let email = Email::parse(EMAIL).unwrap();
    assert!(!api.check_email_availability(&email).await.unwrap());
    assert_eq!(api.get_user_by_email(&email).await.unwrap().name, "New Person");
    let lookup = fake.requests_to("/users").pop().unwrap();
    assert_eq!(lookup.query.as_deref(), Some("email=new%40shop.com"));

    let signup = fake.requests_to("/auth/signup").pop().unwrap();
    assert!(signup.query.unwrap().starts_with("token="));

    let session = SessionManager::new(api, Arc::new(MemoryTokenStore::new()));
    session
        .login(EMAIL, &SecretString::from("s3cret"), &cancel)
        .await
        .unwrap();
    assert!(session.is_authenticated().await);
}

#[tokio::test]
async fn wrong_code_is_a_validation_error() {
    let fake = FakeApi::start().await;
    let flow = SignupFlow::new(ApiClient::new(&fake.config()).unwrap());
    let cancel = CancellationToken::new();
    flow.send_code(EMAIL, &cancel).await.unwrap();

    let err = flow.verify("000000", &cancel).await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::Validation(ValidationError::InvalidVerificationCode)
    ));
    assert!(matches!(flow.stage().await, SignupStage::CodeSent { .. }));
}

#[tokio::test]
async fn empty_email_never_reaches_api() {
    let fake = FakeApi::start().await;
    let flow = SignupFlow::new(ApiClient::new(&fake.config()).unwrap());

    let err = flow
        .send_code("   ", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::Validation(ValidationError::InvalidEmail(_))
    ));
    assert!(fake.requests().is_empty());
}

#[tokio::test]
async fn forged_token_is_refused() {
    let fake = FakeApi::start().await;
    let flow = SignupFlow::with_stage(
        ApiClient::new(&fake.config()).unwrap(),
        SignupStage::Verified {
            email: Email::parse(EMAIL).unwrap(),
            token: VerificationToken::new("signup-forged"),
        },
    );

    let err = flow
        .register(
            SecretString::from("s3cret"),
            "New Person",
            "010",
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Api { .. }));
    assert!(!fake.has_account(EMAIL));
}

#[tokio::test]
async fn resend_while_sending_is_busy() {
    let fake = FakeApi::start().await;
    fake.set_latency(Duration::from_millis(200));
    let flow = Arc::new(SignupFlow::new(ApiClient::new(&fake.config()).unwrap()));

    let first = {
        let flow = flow.clone();
        tokio::spawn(async move { flow.send_code(EMAIL, &CancellationToken::new()).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(flow.is_busy());

    let err = flow
        .send_code(EMAIL, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Busy(Operation::SendVerification)));

    first.await.unwrap().unwrap();
    assert!(!flow.is_busy());
    assert_eq!(fake.requests_to("/email-verifications/send").len(), 1);
}
