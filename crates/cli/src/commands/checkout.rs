//! `shop checkout`

use shopfront_core::ShippingInfo;

use super::cart::print_cart;
use super::{CliError, Context};

/// Order the saved cart. The cart file is emptied once the order is placed.
///
/// # Errors
///
/// Returns an error if the cart is empty, shipping details are incomplete,
/// no one is signed in, or the API refuses the order.
pub async fn run(ctx: &Context, shipping: &ShippingInfo) -> Result<(), CliError> {
    let session = ctx.session().await?;
    let mut cart = ctx.load_cart().await?;
    print_cart(&cart);

    let confirmation =
        shopfront_client::checkout(session, &mut cart, shipping, &ctx.cancel()).await?;
    ctx.save_cart(&cart).await?;

    match confirmation.id {
        Some(id) => println!("Order {id} placed."),
        None => println!("Order placed."),
    }
    if let Some(status) = confirmation.status {
        println!("Status: {status}");
    }
    Ok(())
}
