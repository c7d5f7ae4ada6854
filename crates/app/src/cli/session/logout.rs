use lp_shop_app::{context::AppContext, domain::carts::CartStore};

use crate::cli::session::SessionFile;

pub(crate) async fn run(
    ctx: &AppContext,
    session: &SessionFile,
    store: &mut CartStore,
) -> Result<(), String> {
    session.clear()?;

    if store.owner().is_guest() {
        println!("not signed in");

        return Ok(());
    }

    ctx.identity.logout();
    store.process_identity_events().await;

    println!("signed out");

    Ok(())
}
