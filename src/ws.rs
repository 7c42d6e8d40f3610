//! WebSocket support.
//!
//! Planned surface:
//! - detect and complete the `Upgrade: websocket` handshake
//! - frame-level send/receive over the upgraded stream
//! - close-frame propagation in both directions
//!
//! This module is currently a placeholder. The upgrade API will be designed
//! and stabilised in a subsequent iteration, once the core dispatch engine
//! is battle-tested.
