//! Production order: what to weigh, from where, how often.
use crate::actuator::{Actuator, RelayMap};
use crate::config::{PlantVariant, SequencerCfg};
use crate::error::PlantError;
use crate::material::{Material, PerMaterial};
use crate::util::share;

pub const MOISTURE_LIMIT_PCT: f64 = 50.0;

/// Moisture corrections in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Moisture {
    pub pasir: f64,
    pub batu: f64,
    pub air: f64,
}

impl Moisture {
    /// Net water correction: the sum of all corrections, clamped to ±50 %.
    pub fn water_adjust_pct(&self) -> f64 {
        (self.pasir + self.batu + self.air).clamp(-MOISTURE_LIMIT_PCT, MOISTURE_LIMIT_PCT)
    }

    /// Water target after correction; never negative.
    pub fn adjust_water(&self, water_kg: f64) -> f64 {
        (water_kg * (1.0 + self.water_adjust_pct() / 100.0)).max(0.0)
    }
}

/// Immutable per-batch order. Targets are batch totals in kilograms.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    pub targets: PerMaterial<f64>,
    pub additive_kg: f64,
    /// Cement silos to draw from (1-based)
    pub silos: Vec<u8>,
    /// Sand bins (1 or 2); empty defaults to bin 1
    pub sand_bins: Vec<u8>,
    /// Stone bins (1 or 2); empty defaults to bin 1
    pub stone_bins: Vec<u8>,
    pub mixing_secs: u64,
    pub mixings: u32,
    pub moisture: Moisture,
}

impl BatchConfig {
    pub fn validate(&self, plant: &SequencerCfg) -> Result<(), PlantError> {
        for (m, v) in self.targets.iter() {
            if !v.is_finite() || v < 0.0 {
                return Err(PlantError::invalid(format!("target for {m} must be >= 0")));
            }
        }
        if !self.additive_kg.is_finite() || self.additive_kg < 0.0 {
            return Err(PlantError::invalid("additive must be >= 0"));
        }
        if self.targets.total() <= 0.0 {
            return Err(PlantError::invalid("targets are empty"));
        }
        if self.mixing_secs == 0 {
            return Err(PlantError::invalid("mixing time must be > 0"));
        }
        if self.mixings == 0 {
            return Err(PlantError::invalid("mixing count must be > 0"));
        }
        for (name, v) in [
            ("pasir", self.moisture.pasir),
            ("batu", self.moisture.batu),
            ("air", self.moisture.air),
        ] {
            if !v.is_finite() || v.abs() > MOISTURE_LIMIT_PCT {
                return Err(PlantError::invalid(format!(
                    "moisture {name} must be within ±50%"
                )));
            }
        }
        if self.targets.semen > 0.0 && self.silos.is_empty() {
            return Err(PlantError::invalid("cement target needs at least one silo"));
        }
        for (i, &s) in self.silos.iter().enumerate() {
            if s == 0 || s > plant.silos {
                return Err(PlantError::invalid(format!(
                    "silo {s} is not installed (plant has {})",
                    plant.silos
                )));
            }
            if self.silos[..i].contains(&s) {
                return Err(PlantError::invalid(format!("silo {s} selected twice")));
            }
        }
        for (label, bins) in [("sand", &self.sand_bins), ("stone", &self.stone_bins)] {
            if bins.len() > 2 {
                return Err(PlantError::invalid(format!("at most two {label} bins")));
            }
            if bins.iter().any(|b| !(1..=2).contains(b)) {
                return Err(PlantError::invalid(format!("{label} bins must be 1 or 2")));
            }
            if bins.len() == 2 && bins[0] == bins[1] {
                return Err(PlantError::invalid(format!("{label} bin selected twice")));
            }
        }
        Ok(())
    }

    /// Batch totals after moisture correction.
    pub fn adjusted_totals(&self) -> PerMaterial<f64> {
        let mut t = self.targets;
        t.air = self.moisture.adjust_water(t.air);
        t
    }

    /// Per-mixing targets; `per_mixing() × mixings` reconstructs the totals.
    pub fn per_mixing(&self) -> PerMaterial<f64> {
        let n = f64::from(self.mixings.max(1));
        self.adjusted_totals().map(|_, v| v / n)
    }

    pub fn additive_per_mixing(&self) -> f64 {
        self.additive_kg / f64::from(self.mixings.max(1))
    }

    pub fn bins(&self, m: Material) -> Vec<u8> {
        let bins = match m {
            Material::Pasir => &self.sand_bins,
            Material::Batu => &self.stone_bins,
            _ => return Vec::new(),
        };
        if bins.is_empty() { vec![1] } else { bins.clone() }
    }

    /// Gates feeding `m` during weighing (bins for aggregates, silos for cement).
    pub fn gates(&self, m: Material) -> Vec<Actuator> {
        match m {
            Material::Pasir => self.bins(m).into_iter().filter_map(Actuator::sand_gate).collect(),
            Material::Batu => self.bins(m).into_iter().filter_map(Actuator::stone_gate).collect(),
            Material::Semen => self.silos.iter().copied().filter_map(Actuator::silo).collect(),
            Material::Air => vec![Actuator::WaterFillValve],
        }
    }

    /// Cement split over the selected silos.
    pub fn cement_per_silo(&self, weighed: f64) -> Vec<(u8, f64)> {
        let each = share(weighed, self.silos.len());
        self.silos.iter().map(|s| (*s, each)).collect()
    }

    /// Every actuator this batch may switch on the given plant.
    pub fn required_actuators(&self, plant: &SequencerCfg) -> Vec<Actuator> {
        let mut out = vec![
            Actuator::Mixer,
            Actuator::UpperBelt,
            Actuator::LowerBelt,
            Actuator::Vibrator,
            Actuator::DoorOpen,
            Actuator::DoorClose,
            Actuator::Horn,
        ];
        let totals = self.adjusted_totals();
        for m in Material::ALL {
            if totals[m] <= 0.0 {
                continue;
            }
            out.extend(self.gates(m));
            match m {
                Material::Pasir if plant.variant == PlantVariant::Hoppers => {
                    out.push(Actuator::SandHopperValve);
                }
                Material::Batu if plant.variant == PlantVariant::Hoppers => {
                    out.push(Actuator::StoneHopperValve);
                }
                Material::Semen => out.push(Actuator::CementValve),
                Material::Air => out.push(Actuator::WaterDischargeValve),
                _ => {}
            }
        }
        if self.additive_kg > 0.0 {
            out.push(Actuator::AdditiveValve);
        }
        out
    }

    /// Full start-time check: order shape plus relay wiring.
    pub fn check(&self, plant: &SequencerCfg, relays: &RelayMap) -> Result<(), PlantError> {
        self.validate(plant)?;
        for a in self.required_actuators(plant) {
            if !relays.contains(a) {
                return Err(PlantError::invalid(format!("relay '{a}' is not mapped")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> BatchConfig {
        BatchConfig {
            targets: PerMaterial {
                pasir: 600.0,
                batu: 900.0,
                semen: 300.0,
                air: 150.0,
            },
            additive_kg: 0.0,
            silos: vec![1, 2],
            sand_bins: vec![],
            stone_bins: vec![1, 2],
            mixing_secs: 10,
            mixings: 3,
            moisture: Moisture::default(),
        }
    }

    #[test]
    fn water_correction_is_clamped_and_never_negative() {
        let m = Moisture {
            pasir: 40.0,
            batu: 30.0,
            air: 0.0,
        };
        assert!((m.water_adjust_pct() - 50.0).abs() < 1e-12);
        assert!((m.adjust_water(100.0) - 150.0).abs() < 1e-9);
        let dry = Moisture {
            pasir: -50.0,
            batu: -50.0,
            air: -50.0,
        };
        assert!((dry.adjust_water(100.0) - 50.0).abs() < 1e-9);
        assert!(dry.adjust_water(-1.0) >= 0.0);
    }

    #[test]
    fn per_mixing_splits_totals() {
        let b = order();
        let p = b.per_mixing();
        assert!((p.pasir - 200.0).abs() < 1e-9);
        assert!((p.semen * 3.0 - 300.0).abs() < 1e-9);
    }

    #[test]
    fn cement_splits_over_silos() {
        let b = order();
        assert_eq!(b.cement_per_silo(100.0), vec![(1, 50.0), (2, 50.0)]);
    }

    #[test]
    fn rejects_malformed_orders() {
        let plant = SequencerCfg::default();
        let mut b = order();
        b.mixings = 0;
        assert!(matches!(b.validate(&plant), Err(PlantError::InvalidConfig(m)) if m.contains("count")));
        let mut b = order();
        b.targets = PerMaterial::default();
        assert!(b.validate(&plant).is_err());
        let mut b = order();
        b.silos = vec![7];
        assert!(b.validate(&plant).is_err());
        let mut b = order();
        b.silos.clear();
        assert!(b.validate(&plant).is_err());
        let mut b = order();
        b.stone_bins = vec![2, 2];
        assert!(b.validate(&plant).is_err());
        let mut b = order();
        b.moisture.air = 60.0;
        assert!(b.validate(&plant).is_err());
    }

    #[test]
    fn silo_checks_follow_the_plant_size() {
        let big = SequencerCfg {
            silos: 12,
            ..SequencerCfg::default()
        };
        let mut b = order();
        b.silos = vec![7, 12];
        b.validate(&big).unwrap();
        b.silos = vec![12, 3, 12];
        assert!(matches!(b.validate(&big), Err(PlantError::InvalidConfig(m)) if m.contains("twice")));
        b.silos = vec![13];
        assert!(matches!(b.validate(&big), Err(PlantError::InvalidConfig(m)) if m.contains("not installed")));
    }

    #[test]
    fn missing_relay_fails_the_check() {
        let plant = SequencerCfg::default();
        let rows: Vec<(&str, u16, &[u64])> = vec![("mixer", 0, &[])];
        let map = RelayMap::from_rows(rows).unwrap();
        let err = order().check(&plant, &map).unwrap_err();
        assert!(matches!(err, PlantError::InvalidConfig(m) if m.contains("not mapped")));
        order().check(&plant, &RelayMap::standard()).unwrap();
    }
}
