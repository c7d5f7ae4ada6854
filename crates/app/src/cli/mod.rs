use clap::{Parser, Subcommand};
use lp_shop_app::{
    auth::BearerCredential,
    context::{AppContext, AppSettings},
};

use crate::cli::{
    config::{ApiConfig, LoggingConfig, StorageConfig},
    session::SessionFile,
};

mod cart;
pub(crate) mod config;
pub(crate) mod logging;
mod session;

#[derive(Debug, Parser)]
#[command(name = "lp-shop", about = "LP Shop cart CLI", long_about = None)]
pub(crate) struct Cli {
    /// Shop API settings.
    #[command(flatten)]
    api: ApiConfig,

    /// Local snapshot storage settings.
    #[command(flatten)]
    storage: StorageConfig,

    /// Logging output settings.
    #[command(flatten)]
    pub(crate) logging: LoggingConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Cart(cart::CartCommand),
    Session(session::SessionCommand),
}

impl Cli {
    pub(crate) async fn run(self) -> Result<(), String> {
        let session = SessionFile::new(&self.storage.data_dir);

        let credential = match self.api.token {
            Some(token) => Some(BearerCredential::new(token)),
            None => session.load()?,
        };

        let ctx = AppContext::new(AppSettings {
            api_url: self.api.api_url,
            data_dir: self.storage.data_dir,
            credential,
        })
        .map_err(|error| format!("failed to open cart storage: {error}"))?;

        let mut store = ctx.cart_store();
        store.initialize().await;

        let result = match self.command {
            Commands::Cart(command) => cart::run(command, &mut store),
            Commands::Session(command) => {
                session::run(command, &ctx, &session, &mut store).await
            }
        };

        store.flush().await;

        result?;

        cart::print(&store);

        Ok(())
    }
}

/// Format an amount in whole dong, e.g. `1.250.000 ₫`.
pub(crate) fn format_vnd(amount: u64) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 2);

    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push('.');
        }

        grouped.push(digit);
    }

    grouped.push_str(" ₫");
    grouped
}
