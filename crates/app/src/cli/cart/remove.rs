use clap::Args;
use lp_shop_app::domain::carts::{CartStore, models::LineId};

#[derive(Debug, Args)]
pub(crate) struct RemoveArgs {
    /// Line id as printed by `cart show`
    line_id: String,
}

pub(crate) fn run(args: &RemoveArgs, store: &mut CartStore) -> Result<(), String> {
    let line_id = LineId::from(args.line_id.as_str());

    if store.remove_line(&line_id).is_none() {
        println!("no line {line_id} in cart");
    }

    Ok(())
}
