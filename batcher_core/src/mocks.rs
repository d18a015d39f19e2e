//! Stand-ins for running without a controller.

use batcher_traits::{BoxError, RelayLink, WeightFeed, Weights};

/// A link that never connects. Relay changes stay local in the gateway.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineLink;

impl RelayLink for OfflineLink {
    fn is_connected(&self) -> bool {
        false
    }

    fn set_relay(&mut self, relay: &str, _on: bool, _address: Option<u16>) -> Result<(), BoxError> {
        Err(format!("controller not connected (relay {relay})").into())
    }
}

/// A feed with no weigher behind it; weighing falls back to simulation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFeed;

impl WeightFeed for NoFeed {
    fn is_live(&self) -> bool {
        false
    }

    fn latest(&mut self) -> Result<Option<Weights>, BoxError> {
        Err(Box::new(std::io::Error::other("no weight feed")))
    }
}
