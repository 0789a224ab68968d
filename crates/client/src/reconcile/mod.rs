//! Login-time reconciliation of the local cart with the server cart.
//!
//! On each successful login or registration the engine:
//!
//! 1. Fetches the server cart. On failure it stops and the local cart is
//!    left exactly as it was.
//! 2. If the server cart is empty, pushes the local cart as-is.
//! 3. Otherwise merges the local cart into the server cart (server order
//!    first, quantities summed per identity key), installs the result in
//!    the store, and pushes it back.
//!
//! Fetch and push failures are reported to [`Telemetry`](crate::telemetry::Telemetry) and returned in
//! [`ReconcileOutcome`]; they never roll back the local cart.
//!
//! Runs are serialized: a second event waits for the first run to finish
//! and then reconciles against the fresh state.

mod engine;
mod remote;

pub use engine::{PushStatus, ReconcileOutcome, ReconciliationEngine};
pub use remote::{CartRemote, RemoteError};
