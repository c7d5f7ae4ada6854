use clap::Args;
use lp_shop_app::domain::carts::{CartStore, models::NewCartLine};

#[derive(Debug, Args)]
pub(crate) struct AddArgs {
    /// Product id
    #[arg(long)]
    product: String,

    /// Product display name
    #[arg(long)]
    name: String,

    /// Product slug
    #[arg(long, default_value = "")]
    slug: String,

    /// Product image URL
    #[arg(long, default_value = "")]
    image: String,

    /// Regular unit price
    #[arg(long)]
    price: u64,

    /// Discounted unit price
    #[arg(long)]
    sale_price: Option<u64>,

    /// Size selector
    #[arg(long)]
    size: Option<String>,

    /// Color selector
    #[arg(long)]
    color: Option<String>,

    /// Units currently in stock
    #[arg(long)]
    stock: u32,

    /// Units to add
    #[arg(long, default_value_t = 1)]
    quantity: u32,
}

pub(crate) fn run(args: AddArgs, store: &mut CartStore) -> Result<(), String> {
    if args.product.trim().is_empty() {
        return Err("product cannot be empty".to_string());
    }

    let line_id = store.add_line(
        NewCartLine {
            product_id: args.product,
            display_name: args.name,
            slug: args.slug,
            image_url: args.image,
            unit_price: args.price,
            sale_price: args.sale_price,
            size: args.size,
            color: args.color,
            stock_snapshot: args.stock,
        },
        args.quantity,
    );

    println!("line_id: {line_id}");

    Ok(())
}
