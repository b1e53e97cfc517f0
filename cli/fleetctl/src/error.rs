//! Error display for the CLI.

use colored::Colorize;
use fleet_assign::InsufficientClusters;

use crate::git::GitError;
use crate::store::StoreError;

/// Print an error in a user-friendly format, with hints for the common
/// operator mistakes.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    if err.downcast_ref::<InsufficientClusters>().is_some() {
        eprintln!(
            "\n{}",
            "Hint: register more clusters, widen the application's selector, or lower spec.clusters."
                .yellow()
        );
    } else if let Some(store_err) = err.downcast_ref::<StoreError>() {
        if matches!(store_err, StoreError::Parse { .. } | StoreError::Invalid { .. }) {
            eprintln!(
                "\n{}",
                "Hint: fix the record file named above; no operations were applied from it."
                    .yellow()
            );
        }
    } else if err.downcast_ref::<GitError>().is_some() {
        eprintln!(
            "\n{}",
            "Hint: check repository URLs and refs in the control-plane records, and your network access."
                .yellow()
        );
    }
}
