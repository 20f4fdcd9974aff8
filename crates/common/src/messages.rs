//! Control messages for runtime interaction with a running connection.

/// Commands that can be sent to a WsManager while it is connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Register interest in additional topic patterns.
    Register(Vec<String>),
    /// Graceful shutdown
    Shutdown,
}
