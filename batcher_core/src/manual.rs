//! Manual production sessions: the operator drives the gates, the plant
//! only watches the weighers and books what left them.
use crate::config::DetectorCfg;
use crate::detector::{DischargeDetector, DischargeEvent};
use crate::material::{Material, PerMaterial};
use batcher_traits::Weights;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct ManualSession {
    started_at: DateTime<Utc>,
    detector: DischargeDetector,
    ledger: Vec<DischargeEvent>,
    totals: PerMaterial<f64>,
}

/// Closed session. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManualRecord {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub ledger: Vec<DischargeEvent>,
    pub totals: PerMaterial<f64>,
}

impl ManualSession {
    pub fn start(cfg: DetectorCfg, at: DateTime<Utc>) -> Self {
        tracing::info!(%at, "manual session started");
        Self {
            started_at: at,
            detector: DischargeDetector::new(cfg),
            ledger: Vec::new(),
            totals: PerMaterial::default(),
        }
    }

    fn book(&mut self, ev: DischargeEvent) {
        tracing::info!(
            material = %ev.material,
            peak = ev.peak,
            discharged = ev.discharged,
            "discharge booked"
        );
        self.totals[ev.material] += ev.discharged;
        self.ledger.push(ev);
    }

    pub fn observe(&mut self, m: Material, reading: f64, at: DateTime<Utc>) -> Option<DischargeEvent> {
        let ev = self.detector.observe(m, reading, at)?;
        self.book(ev);
        Some(ev)
    }

    /// Feed one full weigher frame.
    pub fn observe_weights(&mut self, w: &Weights, at: DateTime<Utc>) -> Vec<DischargeEvent> {
        let readings = PerMaterial::from(*w);
        Material::ALL
            .into_iter()
            .filter_map(|m| self.observe(m, readings[m], at))
            .collect()
    }

    pub fn ledger(&self) -> &[DischargeEvent] {
        &self.ledger
    }

    pub fn totals(&self) -> PerMaterial<f64> {
        self.totals
    }

    pub fn close(mut self, at: DateTime<Utc>) -> ManualRecord {
        for ev in self.detector.flush() {
            self.book(ev);
        }
        tracing::info!(events = self.ledger.len(), "manual session closed");
        ManualRecord {
            started_at: self.started_at,
            ended_at: at,
            ledger: self.ledger,
            totals: self.totals,
        }
    }
}
