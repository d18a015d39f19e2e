pub mod clock;

pub use clock::{Clock, MonotonicClock};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One weight frame from the plant, in kilograms per weigher.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Weights {
    pub pasir: f64,
    pub batu: f64,
    pub semen: f64,
    pub air: f64,
}

impl Weights {
    /// Combined sand + stone reading (single-hopper display channel).
    #[inline]
    pub fn aggregate(&self) -> f64 {
        self.pasir + self.batu
    }
}

/// Outbound side of the hardware channel.
///
/// `address` is the resolved coil/output for `relay`; controllers that map
/// names on their own side may ignore it.
pub trait RelayLink {
    fn is_connected(&self) -> bool;
    fn set_relay(&mut self, relay: &str, on: bool, address: Option<u16>) -> Result<(), BoxError>;
    /// Best-effort "everything off" broadcast to the controller.
    fn emergency_stop(&mut self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Inbound side of the hardware channel.
///
/// `latest()` returns `Ok(None)` when no new frame arrived since the last call
/// and an error once the feed is gone.
pub trait WeightFeed {
    fn is_live(&self) -> bool;
    fn latest(&mut self) -> Result<Option<Weights>, BoxError>;
}

impl<T: RelayLink + ?Sized> RelayLink for Box<T> {
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
    fn set_relay(&mut self, relay: &str, on: bool, address: Option<u16>) -> Result<(), BoxError> {
        (**self).set_relay(relay, on, address)
    }
    fn emergency_stop(&mut self) -> Result<(), BoxError> {
        (**self).emergency_stop()
    }
}

impl<T: WeightFeed + ?Sized> WeightFeed for Box<T> {
    fn is_live(&self) -> bool {
        (**self).is_live()
    }
    fn latest(&mut self) -> Result<Option<Weights>, BoxError> {
        (**self).latest()
    }
}
