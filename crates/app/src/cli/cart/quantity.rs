use clap::Args;
use lp_shop_app::domain::carts::{CartStore, models::LineId};

#[derive(Debug, Args)]
pub(crate) struct SetArgs {
    /// Line id as printed by `cart show`
    line_id: String,

    /// Requested quantity; clamped to the line's stock
    #[arg(allow_negative_numbers = true)]
    quantity: i64,
}

pub(crate) fn run(args: &SetArgs, store: &mut CartStore) -> Result<(), String> {
    let line_id = LineId::from(args.line_id.as_str());

    match store.set_quantity(&line_id, args.quantity) {
        Some(quantity) if i64::from(quantity) != args.quantity => {
            println!("quantity adjusted to {quantity}");
        }
        Some(_) => {}
        None => return Err(format!("no line {line_id} in cart")),
    }

    Ok(())
}
