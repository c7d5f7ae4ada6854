use clap::Args;
use jiff::Timestamp;
use lp_shop_app::{
    auth::{BearerCredential, decode_subject},
    context::AppContext,
    domain::carts::CartStore,
};

use crate::cli::session::SessionFile;

#[derive(Debug, Args)]
pub(crate) struct LoginArgs {
    /// Bearer credential issued by the shop API
    #[arg(long, env = "LP_SHOP_LOGIN_TOKEN", hide_env_values = true)]
    token: String,
}

pub(crate) async fn run(
    args: LoginArgs,
    ctx: &AppContext,
    session: &SessionFile,
    store: &mut CartStore,
) -> Result<(), String> {
    let credential = BearerCredential::new(args.token.trim());

    let subject = decode_subject(&credential, Timestamp::now())
        .map_err(|error| format!("cannot sign in: {error}"))?;

    session.save(&credential)?;

    ctx.identity.login(credential);
    store.process_identity_events().await;

    println!("signed in as {subject}");

    Ok(())
}
