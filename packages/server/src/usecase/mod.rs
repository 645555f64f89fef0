//! UseCase layer.
//!
//! - Event Ingress: `HandleProtocolEventUseCase`
//! - Relay: `RelayQueue` / `RelayBroadcaster`
//! - Ingress-from-Client: `ConnectClientUseCase`, `ForwardClientMessageUseCase`,
//!   `DisconnectClientUseCase`
//! - HTTP: `GetRoomsUseCase`

mod connect_client;
mod disconnect_client;
mod error;
mod forward_client_message;
mod get_rooms;
mod handle_protocol_event;
mod relay_broadcast;

pub use connect_client::ConnectClientUseCase;
pub use disconnect_client::DisconnectClientUseCase;
pub use error::{ForwardClientMessageError, GetRoomsError};
pub use forward_client_message::ForwardClientMessageUseCase;
pub use get_rooms::GetRoomsUseCase;
pub use handle_protocol_event::{HandleProtocolEventUseCase, IngressOutcome};
pub use relay_broadcast::{RelayBroadcaster, RelayQueue, relay_queue};
