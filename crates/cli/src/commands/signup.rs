//! Account registration commands.
//!
//! Each step is a separate invocation, so the state between steps travels on
//! the command line: `verify` prints the signup token that `register` takes.

use secrecy::SecretString;
use shopfront_client::api::VerificationToken;
use shopfront_client::{SignupFlow, SignupStage, ValidationError};
use shopfront_core::Email;

use super::{CliError, Context};

/// `shop signup send-code <email>`
///
/// # Errors
///
/// Returns an error for a malformed email or if sending fails.
pub async fn send_code(ctx: &Context, email: &str) -> Result<(), CliError> {
    let flow = SignupFlow::new(ctx.api().clone());
    flow.send_code(email, &ctx.cancel()).await?;
    println!("Verification code sent to {email}.");
    Ok(())
}

/// `shop signup verify <email> <code>`
///
/// # Errors
///
/// Returns an error if the code is refused or the request fails.
pub async fn verify(ctx: &Context, email: &str, code: &str) -> Result<(), CliError> {
    let email = parse_email(email)?;
    let flow = SignupFlow::with_stage(ctx.api().clone(), SignupStage::CodeSent { email });
    flow.verify(code, &ctx.cancel()).await?;

    if let SignupStage::Verified { token, .. } = flow.stage().await {
        println!("Email verified. Signup token: {}", token.as_str());
    }
    Ok(())
}

/// `shop signup register <email> <token>`
///
/// # Errors
///
/// Returns an error for missing fields or if the API refuses the signup.
pub async fn register(
    ctx: &Context,
    email: &str,
    token: &str,
    password: SecretString,
    name: &str,
    phone: &str,
) -> Result<(), CliError> {
    let email = parse_email(email)?;
    let flow = SignupFlow::with_stage(
        ctx.api().clone(),
        SignupStage::Verified {
            email,
            token: VerificationToken::new(token),
        },
    );
    let user = flow.register(password, name, phone, &ctx.cancel()).await?;
    println!("Account created for {}. Sign in with `shop login`.", user.email);
    Ok(())
}

fn parse_email(email: &str) -> Result<Email, CliError> {
    Email::parse(email)
        .map_err(|e| CliError::Client(ValidationError::from(e).into()))
}
