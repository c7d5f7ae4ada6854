use clap::{Args, Subcommand};
use lp_shop_app::{context::AppContext, domain::carts::CartStore};

mod file;
mod login;
mod logout;

pub(crate) use file::SessionFile;

#[derive(Debug, Args)]
pub(crate) struct SessionCommand {
    #[command(subcommand)]
    command: SessionSubcommand,
}

#[derive(Debug, Subcommand)]
enum SessionSubcommand {
    /// Sign in and merge the guest cart into the account cart
    Login(login::LoginArgs),
    /// Sign out and start over with an empty guest cart
    Logout,
}

pub(crate) async fn run(
    command: SessionCommand,
    ctx: &AppContext,
    session: &SessionFile,
    store: &mut CartStore,
) -> Result<(), String> {
    match command.command {
        SessionSubcommand::Login(args) => login::run(args, ctx, session, store).await,
        SessionSubcommand::Logout => logout::run(ctx, session, store).await,
    }
}
