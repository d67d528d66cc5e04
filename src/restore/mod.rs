mod restore_client;

pub use restore_client::run_restore;
pub use restore_client::RestoreClient;
