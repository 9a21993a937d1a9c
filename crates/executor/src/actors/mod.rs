pub mod control_actor;
pub mod scanner_actor;
pub mod supervisor;

pub use common::actors::{Actor, ActorType, ControlMessage};

use tokio::task::JoinHandle;

/// Aborts the heartbeat task when the owning actor stops, whether it
/// returns or is aborted by the supervisor.
pub struct HeartbeatGuard(pub JoinHandle<()>);

impl Drop for HeartbeatGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}
