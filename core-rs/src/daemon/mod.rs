// Daemon Module - Long-running background services
//
// The watcher runs on a blocking thread (or as the `s4ac watch` subcommand)
// and stops when its shutdown flag is set.

pub mod policy_watcher;

pub use policy_watcher::{source_fingerprint, PolicyWatcher};
