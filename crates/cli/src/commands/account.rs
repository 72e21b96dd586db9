//! Sign-in, sign-out and account commands.

use secrecy::SecretString;

use super::{CliError, Context};

/// `shop login <email>`
///
/// # Errors
///
/// Returns an error if the credentials are rejected or the request fails.
pub async fn login(ctx: &Context, email: &str, password: &SecretString) -> Result<(), CliError> {
    let session = ctx.session().await?;
    let user = session.login(email, password, &ctx.cancel()).await?;
    println!("Signed in as {} <{}>", user.display_name(), user.email);
    Ok(())
}

/// `shop logout`
///
/// # Errors
///
/// Returns an error if the stored tokens cannot be erased.
pub async fn logout(ctx: &Context) -> Result<(), CliError> {
    let session = ctx.session().await?;
    session.logout().await?;
    println!("Signed out.");
    Ok(())
}

/// `shop whoami`
///
/// # Errors
///
/// Returns an error only if restoring the session is cancelled.
pub async fn whoami(ctx: &Context) -> Result<(), CliError> {
    let session = ctx.session().await?;
    match session.current_user().await {
        Some(user) => {
            println!("{} <{}>", user.display_name(), user.email);
            println!("  id:   {}", user.id);
            println!("  role: {}", user.role);
            if !user.phone.is_empty() {
                println!("  phone: {}", user.phone);
            }
        }
        None => println!("Not signed in."),
    }
    Ok(())
}
