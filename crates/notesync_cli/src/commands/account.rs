//! Account commands: register, login, logout, whoami.

use crate::commands::sync::after_change;
use crate::context::Context;
use crate::error::CliResult;
use notesync_core::UserKey;
use tracing::{info, warn};

/// Runs the register command.
pub fn register(ctx: &Context, email: &str, password: &str) -> CliResult<()> {
    ctx.auth()?.register(email, password)?;
    println!("registered {email}; log in with `notesync login {email} --password ...`");
    Ok(())
}

/// Runs the login command.
///
/// Stores the credential pair, asks the server who we are, binds the local
/// store to that account and pulls its notes.
pub fn login(ctx: &mut Context, email: &str, password: &str) -> CliResult<()> {
    ctx.auth()?.login(email, password)?;

    let me = ctx.remote()?.me()?;
    let user = UserKey::new(me.id)?;
    ctx.bind(&user, &me.email)?;
    info!(user = %user, "local store bound");
    println!("logged in as {}", me.email);

    after_change(&ctx.engine()?);
    Ok(())
}

/// Runs the logout command.
///
/// Local notes stay on disk under the account's own file; they are not
/// visible until that account logs in again.
pub fn logout(ctx: &mut Context) -> CliResult<()> {
    ctx.auth()?.logout()?;
    ctx.unbind()?;
    println!("logged out");
    Ok(())
}

/// Runs the whoami command.
pub fn whoami(ctx: &Context) -> CliResult<()> {
    let user = ctx.user()?;
    match ctx.remote()?.me() {
        Ok(me) => println!("{} ({})", me.email, me.id),
        Err(e) => {
            warn!(error = %e, "server unavailable, showing saved session");
            let email = ctx.session().email.as_deref().unwrap_or("unknown");
            println!("{email} ({user}, offline)");
        }
    }
    Ok(())
}
