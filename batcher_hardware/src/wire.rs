//! JSON messages exchanged with the plant controller.
//!
//! One message per line. The `type` field selects the variant; unknown
//! inbound types decode to [`Inbound::Other`] so a newer controller cannot
//! break an older client.
use batcher_traits::Weights;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    RelayControl {
        relay: String,
        state: bool,
        /// Coil address; the field name is kept for controller compatibility.
        #[serde(skip_serializing_if = "Option::is_none")]
        gpio_pin: Option<u16>,
    },
    GetStatus,
    EmergencyStop,
}

/// Per-weigher reading in kilograms as sent by the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireWeights {
    pub pasir: f64,
    pub batu: f64,
    pub semen: f64,
    pub air: f64,
}

impl From<WireWeights> for Weights {
    fn from(w: WireWeights) -> Self {
        Weights {
            pasir: w.pasir,
            batu: w.batu,
            semen: w.semen,
            air: w.air,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    WeightUpdate {
        /// Controller time; integer milliseconds or fractional seconds
        #[serde(default)]
        timestamp: f64,
        weights: WireWeights,
    },
    RelayAck {
        relay: String,
        state: bool,
        #[serde(default = "yes")]
        success: bool,
    },
    Status {
        #[serde(default)]
        relays: BTreeMap<String, serde_json::Value>,
    },
    EmergencyAck {
        #[serde(default)]
        message: String,
    },
    Error {
        #[serde(default)]
        message: String,
    },
    #[serde(other)]
    Other,
}

fn yes() -> bool {
    true
}

pub fn encode(msg: &Outbound) -> Result<String, serde_json::Error> {
    let mut s = serde_json::to_string(msg)?;
    s.push('\n');
    Ok(s)
}

pub fn decode(line: &str) -> Result<Inbound, serde_json::Error> {
    serde_json::from_str(line.trim())
}
