//! Peak/drop discharge detection for manually operated weighers.
//!
//! Each material tracks the highest reading seen. A fall of more than
//! `drop_kg` from a peak above `min_peak_kg` marks a discharge in progress;
//! the detector then follows the fall down to its trough and reports one
//! event of `peak − trough` once the reading turns upward again (or the
//! session is flushed). After an event the peak restarts from the current
//! reading, not from zero.
use crate::config::DetectorCfg;
use crate::material::{Material, PerMaterial};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DischargeEvent {
    pub material: Material,
    /// When the trough was reached
    pub timestamp: DateTime<Utc>,
    pub peak: f64,
    pub remaining: f64,
    pub discharged: f64,
}

#[derive(Debug, Clone, Copy)]
struct Falling {
    peak: f64,
    trough: f64,
    at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DischargeDetector {
    cfg: DetectorCfg,
    peak: PerMaterial<f64>,
    falling: PerMaterial<Option<Falling>>,
}

impl DischargeDetector {
    pub fn new(cfg: DetectorCfg) -> Self {
        Self {
            cfg,
            peak: PerMaterial::default(),
            falling: PerMaterial::splat(None),
        }
    }

    pub fn reset(&mut self) {
        self.peak = PerMaterial::default();
        self.falling = PerMaterial::splat(None);
    }

    pub fn peak(&self, m: Material) -> f64 {
        self.peak[m]
    }

    fn close(&mut self, m: Material, f: Falling, baseline: f64) -> Option<DischargeEvent> {
        self.falling[m] = None;
        self.peak[m] = baseline;
        let discharged = f.peak - f.trough;
        if discharged < self.cfg.min_event_kg {
            return None;
        }
        Some(DischargeEvent {
            material: m,
            timestamp: f.at,
            peak: f.peak,
            remaining: f.trough,
            discharged,
        })
    }

    /// Feed one reading; returns a finished event when a fall just ended.
    pub fn observe(&mut self, m: Material, reading: f64, at: DateTime<Utc>) -> Option<DischargeEvent> {
        if !reading.is_finite() {
            return None;
        }
        if let Some(mut f) = self.falling[m] {
            if reading < f.trough {
                f.trough = reading;
                f.at = at;
                self.falling[m] = Some(f);
                return None;
            }
            if reading > f.trough {
                return self.close(m, f, reading);
            }
            return None;
        }

        if reading > self.peak[m] {
            self.peak[m] = reading;
            return None;
        }
        let peak = self.peak[m];
        let drop = peak - reading;
        if drop > self.cfg.drop_kg && peak > self.cfg.min_peak_kg {
            self.falling[m] = Some(Falling {
                peak,
                trough: reading,
                at,
            });
        }
        None
    }

    /// Close every fall still in progress at its current trough.
    pub fn flush(&mut self) -> Vec<DischargeEvent> {
        let mut out = Vec::new();
        for m in Material::ALL {
            if let Some(f) = self.falling[m] {
                if let Some(ev) = self.close(m, f, f.trough) {
                    out.push(ev);
                }
            }
        }
        out
    }
}
