//! Catalog browsing commands.

use shopfront_client::ProductQuery;
use shopfront_core::{Category, Product, ProductId};

use super::{CliError, Context};

/// `shop products`
///
/// # Errors
///
/// Returns an error if the API request fails.
pub async fn products(
    ctx: &Context,
    page: u32,
    size: u32,
    search: Option<String>,
    category: Option<String>,
) -> Result<(), CliError> {
    let mut query = ProductQuery::default().page(page).size(size);
    if let Some(search) = search {
        query = query.search(search);
    }
    if let Some(category) = category {
        query = query.category(category);
    }

    let products = ctx.api().get_products(&query).await?;
    if products.is_empty() {
        println!("No products found.");
        return Ok(());
    }
    for product in &products {
        println!("{}", summary_line(product));
    }
    Ok(())
}

/// `shop product <id>`
///
/// # Errors
///
/// Returns an error if the product does not exist or the request fails.
pub async fn product(ctx: &Context, id: &str) -> Result<(), CliError> {
    let product = ctx.api().get_product(&ProductId::new(id)).await?;

    println!("{}", product.name);
    println!("  id:       {}", product.id);
    if !product.product_id.is_empty() {
        println!("  code:     {}", product.product_id);
    }
    println!("  price:    {}", price_label(&product));
    println!("  in stock: {}", product.count);
    if let Some(category) = &product.category {
        println!("  category: {}", category.path().join(" > "));
    }
    if !product.content.is_empty() {
        println!();
        println!("{}", product.content);
    }
    Ok(())
}

/// `shop categories`
///
/// # Errors
///
/// Returns an error if the API request fails.
pub async fn categories(ctx: &Context) -> Result<(), CliError> {
    let categories = ctx.api().get_categories().await?;
    for category in &categories {
        println!("{:<12} {}", category.id, category_label(category));
    }
    Ok(())
}

fn summary_line(product: &Product) -> String {
    let stock = if product.in_stock() { "" } else { "  (sold out)" };
    format!("{:<12} {:<40} {}{stock}", product.id, product.name, price_label(product))
}

fn price_label(product: &Product) -> String {
    if product.is_on_sale() {
        format!(
            "{} (was {}, {} off)",
            product.effective_price(),
            product.price,
            product.sale
        )
    } else {
        product.price.to_string()
    }
}

fn category_label(category: &Category) -> String {
    category.path().join(" > ")
}
