//! Edge-triggered relay output.
//!
//! The gateway is the only place where `ComponentState` changes. Every
//! request is diffed against the latched state and only real edges are
//! sent. While the link is down the change is latched locally and pushed
//! once the controller comes back (`sync`).
use crate::actuator::{Actuator, ComponentState, RelayMap};
use crate::error::PlantError;
use crate::hw_error::map_link_error;
use batcher_traits::RelayLink;

pub struct RelayGateway<L: RelayLink> {
    link: L,
    map: RelayMap,
    /// Commanded state
    state: ComponentState,
    /// What the controller was last told
    sent: ComponentState,
    connected: bool,
}

impl<L: RelayLink> RelayGateway<L> {
    pub fn new(link: L, map: RelayMap) -> Self {
        let connected = link.is_connected();
        Self {
            link,
            map,
            state: ComponentState::default(),
            sent: ComponentState::default(),
            connected,
        }
    }

    pub fn map(&self) -> &RelayMap {
        &self.map
    }

    pub fn state(&self) -> &ComponentState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Name-based entry point. Unknown or unmapped names are errors.
    pub fn set_actuator(&mut self, name: &str, on: bool) -> Result<bool, PlantError> {
        let a = Actuator::from_name(name).ok_or_else(|| PlantError::UnknownActuator(name.into()))?;
        self.set(a, on)
    }

    /// Latch `a` to `on`. Returns whether this was an edge.
    pub fn set(&mut self, a: Actuator, on: bool) -> Result<bool, PlantError> {
        let slot = self.map.resolve(a)?;
        if self.state.get(a) == on {
            return Ok(false);
        }
        self.state.set(a, on);
        tracing::debug!(relay = a.name(), address = slot.address, on, "relay edge");
        self.transmit(a, on, slot.address);
        Ok(true)
    }

    fn transmit(&mut self, a: Actuator, on: bool, address: u16) {
        if !self.connected {
            return;
        }
        match self.link.set_relay(a.name(), on, Some(address)) {
            Ok(()) => self.sent.set(a, on),
            Err(e) => {
                let err = map_link_error(e.as_ref());
                tracing::warn!(relay = a.name(), error = %err, "relay command not delivered");
                if err == PlantError::HardwareDisconnected {
                    self.connected = false;
                }
            }
        }
    }

    /// Switch off everything currently on.
    pub fn all_off(&mut self) {
        let active: Vec<Actuator> = self.state.active().collect();
        for a in active {
            if let Err(e) = self.set(a, false) {
                tracing::error!(relay = a.name(), error = %e, "cannot switch relay off");
            }
        }
    }

    /// Emergency variant: switch everything off and ask the controller to
    /// drop all outputs on its side too.
    pub fn emergency_off(&mut self) {
        self.all_off();
        if self.connected {
            if let Err(e) = self.link.emergency_stop() {
                tracing::warn!(error = %map_link_error(e.as_ref()), "emergency stop not delivered");
            }
        }
    }

    /// Drive the outputs to `target` with the minimal set of edges.
    /// Offs go out before ons.
    pub fn restore(&mut self, target: &ComponentState) {
        for on in [false, true] {
            for a in Actuator::ALL {
                if target.get(a) == on && self.state.get(a) != on {
                    if let Err(e) = self.set(a, on) {
                        tracing::error!(relay = a.name(), error = %e, "cannot restore relay");
                    }
                }
            }
        }
    }

    /// Poll link connectivity. On reconnect, push every latched state the
    /// controller missed. Returns `Some(new)` when connectivity changed.
    pub fn sync(&mut self) -> Option<bool> {
        let now = self.link.is_connected();
        let changed = now != self.connected;
        self.connected = now;
        if changed {
            if now {
                tracing::info!("controller link up, resyncing relays");
            } else {
                tracing::warn!("controller link down, relay commands stay local");
            }
        }
        if now {
            for a in Actuator::ALL {
                let want = self.state.get(a);
                if want != self.sent.get(a) {
                    if let Ok(slot) = self.map.resolve(a) {
                        self.transmit(a, want, slot.address);
                    }
                }
            }
        }
        changed.then_some(now)
    }
}
