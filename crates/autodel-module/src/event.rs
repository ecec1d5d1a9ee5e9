use autodel_types::ClientId;

/// Which client lifecycle transition happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientSubEvent {
    Connected,
    Disconnected,
}

/// Notification that a client session started or ended.
///
/// Hosts deliver `Disconnected` exactly once per session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientChangeEvent {
    pub client: ClientId,
    pub sub: ClientSubEvent,
}

impl ClientChangeEvent {
    pub fn connected(client: ClientId) -> Self {
        Self {
            client,
            sub: ClientSubEvent::Connected,
        }
    }

    pub fn disconnected(client: ClientId) -> Self {
        Self {
            client,
            sub: ClientSubEvent::Disconnected,
        }
    }
}
