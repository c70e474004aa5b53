//! Sync command implementation.

use crate::context::{Context, Engine};
use crate::error::CliResult;
use notesync_engine::SyncOutcome;
use tracing::warn;

/// Runs the sync command.
pub fn run(ctx: &Context) -> CliResult<()> {
    let outcome = ctx.engine()?.synchronize()?;
    println!("{}", describe(&outcome));
    Ok(())
}

/// Syncs after a local change. Failures are reported, not fatal: the change
/// is already saved and will be pushed by a later sync.
pub fn after_change(engine: &Engine) {
    match engine.synchronize() {
        Ok(outcome) => println!("{}", describe(&outcome)),
        Err(e) => warn!(error = %e, "sync failed; change saved locally"),
    }
}

/// One-line summary of a sync run.
pub fn describe(outcome: &SyncOutcome) -> String {
    if outcome.offline {
        return "offline: changes kept locally".to_string();
    }

    let mut line = format!(
        "synced: {} pushed ({} updated, {} created, {} deleted), {} pulled",
        outcome.pushed(),
        outcome.updated,
        outcome.created,
        outcome.deleted,
        outcome.pulled
    );
    if outcome.failed > 0 {
        line.push_str(&format!(", {} left for next sync", outcome.failed));
    }
    if outcome.pull_abandoned {
        line.push_str(", server notes unavailable");
    }
    if outcome.cancelled {
        line.push_str(", cancelled");
    }
    line
}
