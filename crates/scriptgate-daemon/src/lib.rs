//! scriptgate daemon library: the TCP front end of the gateway.
//!
//! The daemon accepts connections, decodes each into a signed script
//! request, and pushes it through a bounded worker pool:
//!
//! ```text
//! Listener (accept loop)
//!     │  bounded mpsc queue (capacity C; full queue blocks accept)
//!     ▼
//! Worker pool (W tasks)
//!     │  per connection, in order:
//!     │    decode → policy hook → authenticate → execute → respond
//!     ▼
//! Response written, connection closed
//! ```
//!
//! Everything transport-shaped lives here; the trust store, the
//! authenticator, and the execution capability come from
//! `scriptgate-core` and are shared immutably across workers.

pub mod dispatch;
pub mod protocol;
pub mod server;

pub use dispatch::{DispatchConfig, Dispatcher, GatewayContext, RequestOutcome};
pub use server::Gateway;
