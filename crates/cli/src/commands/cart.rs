//! Local cart commands.

use shopfront_client::CartManager;
use shopfront_core::ProductId;

use super::{CliError, Context};

/// `shop cart show`
///
/// # Errors
///
/// Returns an error if the cart file cannot be read.
pub async fn show(ctx: &Context) -> Result<(), CliError> {
    let cart = ctx.load_cart().await?;
    print_cart(&cart);
    Ok(())
}

/// `shop cart add <product-id>`
///
/// Looks the product up first so the line carries current price and sale.
///
/// # Errors
///
/// Returns an error if the product does not exist or the cart cannot be
/// saved.
pub async fn add(ctx: &Context, product_id: &str) -> Result<(), CliError> {
    let product = ctx.api().get_product(&ProductId::new(product_id)).await?;
    let mut cart = ctx.load_cart().await?;

    let name = product.name.clone();
    cart.add_to_cart(product);
    ctx.save_cart(&cart).await?;

    let quantity = cart
        .get(&ProductId::new(product_id))
        .map_or(1, |line| line.quantity);
    println!("Added {name} (now {quantity} in cart).");
    Ok(())
}

/// `shop cart remove <product-id>`
///
/// # Errors
///
/// Returns an error if the product is not in the cart or the cart cannot be
/// saved.
pub async fn remove(ctx: &Context, product_id: &str) -> Result<(), CliError> {
    let mut cart = ctx.load_cart().await?;
    if !cart.remove_from_cart(&ProductId::new(product_id)) {
        return Err(CliError::NotInCart(product_id.to_string()));
    }
    ctx.save_cart(&cart).await?;
    println!("Removed {product_id}.");
    Ok(())
}

/// `shop cart set <product-id> <quantity>`
///
/// # Errors
///
/// Returns an error for a quantity below 1, a product not in the cart, or if
/// the cart cannot be saved.
pub async fn set(ctx: &Context, product_id: &str, quantity: i64) -> Result<(), CliError> {
    let mut cart = ctx.load_cart().await?;
    let updated = cart
        .update_quantity(&ProductId::new(product_id), quantity)
        .map_err(shopfront_client::ClientError::from)?;
    if !updated {
        return Err(CliError::NotInCart(product_id.to_string()));
    }
    ctx.save_cart(&cart).await?;
    print_cart(&cart);
    Ok(())
}

/// `shop cart clear`
///
/// # Errors
///
/// Returns an error if the cart cannot be saved.
pub async fn clear(ctx: &Context) -> Result<(), CliError> {
    let mut cart = ctx.load_cart().await?;
    cart.clear_cart();
    ctx.save_cart(&cart).await?;
    println!("Cart cleared.");
    Ok(())
}

pub(super) fn print_cart(cart: &CartManager) {
    if cart.is_empty() {
        println!("Your cart is empty.");
        return;
    }
    for line in cart.items() {
        println!(
            "{:<12} {:<32} {:>4} x {:>10} = {:>12}",
            line.id(),
            line.product.name,
            line.quantity,
            line.effective_price(),
            CartManager::line_total(line),
        );
    }
    println!("{} item(s), total {}", cart.item_count(), cart.total());
}
