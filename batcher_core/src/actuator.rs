//! Typed actuator identifiers, the relay map and latched component state.
//!
//! Every physical output the sequencer can touch is an [`Actuator`]. The
//! controller knows them by name and coil address; [`RelayMap`] resolves the
//! address plus the four per-relay timer slots.
use crate::error::PlantError;
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Actuator {
    Mixer,
    UpperBelt,
    LowerBelt,
    HorizontalBelt,
    SandGate1,
    SandGate2,
    StoneGate1,
    StoneGate2,
    Silo1,
    Silo2,
    Silo3,
    Silo4,
    Silo5,
    Silo6,
    SandHopperValve,
    StoneHopperValve,
    CementValve,
    WaterFillValve,
    WaterDischargeValve,
    AdditiveValve,
    Vibrator,
    Horn,
    DoorOpen,
    DoorClose,
}

pub const ACTUATOR_COUNT: usize = 24;

impl Actuator {
    pub const ALL: [Actuator; ACTUATOR_COUNT] = [
        Actuator::Mixer,
        Actuator::UpperBelt,
        Actuator::LowerBelt,
        Actuator::HorizontalBelt,
        Actuator::SandGate1,
        Actuator::SandGate2,
        Actuator::StoneGate1,
        Actuator::StoneGate2,
        Actuator::Silo1,
        Actuator::Silo2,
        Actuator::Silo3,
        Actuator::Silo4,
        Actuator::Silo5,
        Actuator::Silo6,
        Actuator::SandHopperValve,
        Actuator::StoneHopperValve,
        Actuator::CementValve,
        Actuator::WaterFillValve,
        Actuator::WaterDischargeValve,
        Actuator::AdditiveValve,
        Actuator::Vibrator,
        Actuator::Horn,
        Actuator::DoorOpen,
        Actuator::DoorClose,
    ];

    /// Controller-side relay name.
    pub fn name(self) -> &'static str {
        match self {
            Actuator::Mixer => "mixer",
            Actuator::UpperBelt => "konveyor_atas",
            Actuator::LowerBelt => "konveyor_bawah",
            Actuator::HorizontalBelt => "konveyor_horizontal",
            Actuator::SandGate1 => "pintu_pasir_1",
            Actuator::SandGate2 => "pintu_pasir_2",
            Actuator::StoneGate1 => "pintu_batu_1",
            Actuator::StoneGate2 => "pintu_batu_2",
            Actuator::Silo1 => "silo_1",
            Actuator::Silo2 => "silo_2",
            Actuator::Silo3 => "silo_3",
            Actuator::Silo4 => "silo_4",
            Actuator::Silo5 => "silo_5",
            Actuator::Silo6 => "silo_6",
            Actuator::SandHopperValve => "dump_material",
            Actuator::StoneHopperValve => "dump_material_2",
            Actuator::CementValve => "dump_semen",
            Actuator::WaterFillValve => "water_tank_valve",
            Actuator::WaterDischargeValve => "water_hopper_discharge",
            Actuator::AdditiveValve => "additive",
            Actuator::Vibrator => "vibrator",
            Actuator::Horn => "klakson",
            Actuator::DoorOpen => "pintu_mixer_buka",
            Actuator::DoorClose => "pintu_mixer_tutup",
        }
    }

    /// Coil address on the standard relay board.
    pub fn default_address(self) -> u16 {
        match self {
            Actuator::Mixer => 0,
            Actuator::UpperBelt => 1,
            Actuator::LowerBelt => 2,
            Actuator::SandGate1 => 3,
            Actuator::SandGate2 => 4,
            Actuator::StoneGate1 => 5,
            Actuator::StoneGate2 => 6,
            Actuator::Vibrator => 7,
            Actuator::SandHopperValve => 8,
            Actuator::StoneHopperValve => 9,
            Actuator::CementValve => 10,
            Actuator::WaterFillValve => 11,
            Actuator::WaterDischargeValve => 12,
            Actuator::DoorOpen => 13,
            Actuator::DoorClose => 14,
            Actuator::Horn => 15,
            Actuator::Silo1 => 16,
            Actuator::Silo2 => 17,
            Actuator::Silo3 => 18,
            Actuator::Silo4 => 19,
            Actuator::Silo5 => 20,
            Actuator::Silo6 => 21,
            Actuator::AdditiveValve => 22,
            Actuator::HorizontalBelt => 23,
        }
    }

    /// Standard timer slots. Door open: open, hold, open, hold.
    /// Door close: close time.
    pub fn default_timers(self) -> [u64; 4] {
        match self {
            Actuator::DoorOpen => [2000, 5000, 2000, 5000],
            Actuator::DoorClose => [4000, 0, 0, 0],
            _ => [0; 4],
        }
    }

    /// Resolve a relay name the way operators type it: case and spacing
    /// are ignored ("Pintu Mixer Buka" == "pintu_mixer_buka").
    pub fn from_name(name: &str) -> Option<Self> {
        let key = normalize(name);
        Self::ALL.into_iter().find(|a| a.name() == key)
    }

    pub fn silo(n: u8) -> Option<Self> {
        match n {
            1 => Some(Actuator::Silo1),
            2 => Some(Actuator::Silo2),
            3 => Some(Actuator::Silo3),
            4 => Some(Actuator::Silo4),
            5 => Some(Actuator::Silo5),
            6 => Some(Actuator::Silo6),
            _ => None,
        }
    }

    pub fn sand_gate(bin: u8) -> Option<Self> {
        match bin {
            1 => Some(Actuator::SandGate1),
            2 => Some(Actuator::SandGate2),
            _ => None,
        }
    }

    pub fn stone_gate(bin: u8) -> Option<Self> {
        match bin {
            1 => Some(Actuator::StoneGate1),
            2 => Some(Actuator::StoneGate2),
            _ => None,
        }
    }

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Actuator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Actuator {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.name())
    }
}

pub fn normalize(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySlot {
    pub address: u16,
    pub timers: [u64; 4],
}

/// Actuator → coil address and timer slots. Read-only once a batch starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayMap {
    slots: BTreeMap<Actuator, RelaySlot>,
}

impl RelayMap {
    /// The standard board layout with every actuator wired.
    pub fn standard() -> Self {
        let slots = Actuator::ALL
            .into_iter()
            .map(|a| {
                (
                    a,
                    RelaySlot {
                        address: a.default_address(),
                        timers: a.default_timers(),
                    },
                )
            })
            .collect();
        Self { slots }
    }

    /// Build from `(name, address, timers)` rows. Unknown names are rejected;
    /// timer slots left out (or zero) fall back to the standard values.
    pub fn from_rows<'a, I>(rows: I) -> Result<Self, PlantError>
    where
        I: IntoIterator<Item = (&'a str, u16, &'a [u64])>,
    {
        let mut slots = BTreeMap::new();
        for (name, address, timers) in rows {
            let actuator =
                Actuator::from_name(name).ok_or_else(|| PlantError::UnknownActuator(name.into()))?;
            let mut t = actuator.default_timers();
            for (slot, v) in t.iter_mut().zip(timers.iter()) {
                if *v > 0 {
                    *slot = *v;
                }
            }
            if slots
                .insert(actuator, RelaySlot { address, timers: t })
                .is_some()
            {
                return Err(PlantError::invalid(format!(
                    "relay '{actuator}' is listed twice"
                )));
            }
        }
        Ok(Self { slots })
    }

    pub fn resolve(&self, a: Actuator) -> Result<RelaySlot, PlantError> {
        self.slots
            .get(&a)
            .copied()
            .ok_or_else(|| PlantError::UnknownActuator(a.name().into()))
    }

    pub fn contains(&self, a: Actuator) -> bool {
        self.slots.contains_key(&a)
    }

    pub fn timers(&self, a: Actuator) -> [u64; 4] {
        self.slots.get(&a).map_or(a.default_timers(), |s| s.timers)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Actuator, RelaySlot)> + '_ {
        self.slots.iter().map(|(a, s)| (*a, *s))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Default for RelayMap {
    fn default() -> Self {
        Self::standard()
    }
}

/// Latched ON/OFF state per actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComponentState {
    on: [bool; ACTUATOR_COUNT],
}

impl ComponentState {
    #[inline]
    pub fn get(&self, a: Actuator) -> bool {
        self.on[a.index()]
    }

    #[inline]
    pub(crate) fn set(&mut self, a: Actuator, on: bool) {
        self.on[a.index()] = on;
    }

    pub fn active(&self) -> impl Iterator<Item = Actuator> + '_ {
        Actuator::ALL.into_iter().filter(|a| self.get(*a))
    }

    pub fn any_on(&self) -> bool {
        self.on.iter().any(|b| *b)
    }
}

impl Serialize for ComponentState {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(ACTUATOR_COUNT))?;
        for a in Actuator::ALL {
            map.serialize_entry(a.name(), &self.get(a))?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_normalized() {
        assert_eq!(Actuator::from_name("Pintu Mixer Buka"), Some(Actuator::DoorOpen));
        assert_eq!(Actuator::from_name("  KLAKSON "), Some(Actuator::Horn));
        assert_eq!(Actuator::from_name("silo_7"), None);
    }

    #[test]
    fn standard_board_has_known_coils() {
        let map = RelayMap::standard();
        assert_eq!(map.resolve(Actuator::SandHopperValve).unwrap().address, 8);
        assert_eq!(map.resolve(Actuator::StoneHopperValve).unwrap().address, 9);
        assert_eq!(map.resolve(Actuator::Horn).unwrap().address, 15);
        assert_eq!(map.len(), ACTUATOR_COUNT);
        let mut seen = std::collections::HashSet::new();
        assert!(map.iter().all(|(_, s)| seen.insert(s.address)));
    }

    #[test]
    fn rows_fill_missing_timers_and_reject_unknown_names() {
        let rows: Vec<(&str, u16, &[u64])> = vec![
            ("Pintu Mixer Buka", 30, &[1500, 0]),
            ("mixer", 31, &[]),
        ];
        let map = RelayMap::from_rows(rows).unwrap();
        assert_eq!(map.timers(Actuator::DoorOpen), [1500, 5000, 2000, 5000]);
        assert_eq!(map.resolve(Actuator::Mixer).unwrap().address, 31);
        assert!(matches!(
            map.resolve(Actuator::Horn),
            Err(PlantError::UnknownActuator(n)) if n == "klakson"
        ));

        let bad: Vec<(&str, u16, &[u64])> = vec![("conveyor", 1, &[])];
        assert_eq!(
            RelayMap::from_rows(bad),
            Err(PlantError::UnknownActuator("conveyor".into()))
        );
    }

    #[test]
    fn component_state_lists_active_relays() {
        let mut c = ComponentState::default();
        c.set(Actuator::Mixer, true);
        let active: Vec<_> = c.active().collect();
        assert_eq!(active, vec![Actuator::Mixer]);
        assert!(c.any_on());
    }
}
