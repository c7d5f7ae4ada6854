use clap::{Args, Subcommand};
use lp_shop_app::domain::carts::CartStore;

use crate::cli::format_vnd;

mod add;
mod quantity;
mod remove;

#[derive(Debug, Args)]
pub(crate) struct CartCommand {
    #[command(subcommand)]
    command: CartSubcommand,
}

#[derive(Debug, Subcommand)]
enum CartSubcommand {
    /// Print the cart
    Show,
    /// Add a product configuration
    Add(add::AddArgs),
    /// Remove a line
    Remove(remove::RemoveArgs),
    /// Change a line's quantity
    Set(quantity::SetArgs),
    /// Remove every line
    Clear,
}

pub(crate) fn run(command: CartCommand, store: &mut CartStore) -> Result<(), String> {
    match command.command {
        CartSubcommand::Show => Ok(()),
        CartSubcommand::Add(args) => add::run(args, store),
        CartSubcommand::Remove(args) => remove::run(&args, store),
        CartSubcommand::Set(args) => quantity::run(&args, store),
        CartSubcommand::Clear => {
            store.clear();
            Ok(())
        }
    }
}

pub(crate) fn print(store: &CartStore) {
    println!("owner: {}", store.owner());

    if store.lines().is_empty() {
        println!("cart is empty");
        return;
    }

    for line in store.lines() {
        let variant = [line.size.as_deref(), line.color.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" / ");

        println!(
            "{}  {} [{}] x{}  {}",
            line.line_id,
            line.display_name,
            variant,
            line.quantity,
            format_vnd(line.line_total())
        );
    }

    println!("items: {}", store.total_quantity());

    let savings = store.total_savings();
    if savings > 0 {
        println!("savings: {}", format_vnd(savings));
    }

    println!("total: {}", format_vnd(store.total_value()));
}
