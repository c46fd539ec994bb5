//! Migration, verification and cleanup passes over project sections.

mod cleanup;
mod migrate;
mod rewrite;
mod scan;
mod verify;

#[cfg(test)]
mod test_helpers;

pub use cleanup::{CleanupOptions, CleanupPass};
pub use migrate::{MigrationOptions, MigrationPipeline};
pub use verify::{ProjectAudit, VerificationPass, VerificationReport};
