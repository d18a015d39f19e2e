//! Single-owner timer registry.
//!
//! All delayed work of a run (phase timers, weighing steps, countdowns, dump
//! pulses) lives here, ordered by `(deadline, sequence)`. Nothing fires on its
//! own: the owner pops due entries on its tick, so the whole batch runs on one
//! ordered timeline. `cancel_all` bumps the generation, which makes every
//! outstanding [`TimerId`] inert.
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId {
    generation: u64,
    seq: u64,
}

#[derive(Debug)]
struct Frozen<E> {
    remaining: u64,
    seq: u64,
    event: E,
}

#[derive(Debug)]
pub struct TimerRegistry<E> {
    generation: u64,
    next_seq: u64,
    pending: BTreeMap<(u64, u64), E>,
    frozen: Option<Vec<Frozen<E>>>,
}

impl<E> Default for TimerRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> TimerRegistry<E> {
    pub fn new() -> Self {
        Self {
            generation: 0,
            next_seq: 0,
            pending: BTreeMap::new(),
            frozen: None,
        }
    }

    /// Schedule `event` at `now + delay`. While paused the entry is parked
    /// with `delay` as its remaining time.
    pub fn schedule(&mut self, now: u64, delay: u64, event: E) -> TimerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        match self.frozen.as_mut() {
            Some(frozen) => frozen.push(Frozen {
                remaining: delay,
                seq,
                event,
            }),
            None => {
                self.pending.insert((now.saturating_add(delay), seq), event);
            }
        }
        TimerId {
            generation: self.generation,
            seq,
        }
    }

    pub fn cancel(&mut self, id: TimerId) -> Option<E> {
        if id.generation != self.generation {
            return None;
        }
        if let Some(frozen) = self.frozen.as_mut() {
            let idx = frozen.iter().position(|f| f.seq == id.seq)?;
            return Some(frozen.remove(idx).event);
        }
        let key = *self.pending.keys().find(|(_, s)| *s == id.seq)?;
        self.pending.remove(&key)
    }

    /// Drop every entry matching `pred`.
    pub fn cancel_where(&mut self, mut pred: impl FnMut(&E) -> bool) {
        self.pending.retain(|_, e| !pred(e));
        if let Some(frozen) = self.frozen.as_mut() {
            frozen.retain(|f| !pred(&f.event));
        }
    }

    /// Drop everything, including paused entries, and invalidate all ids.
    pub fn cancel_all(&mut self) {
        self.pending.clear();
        self.frozen = None;
        self.generation += 1;
    }

    /// Pop the earliest entry due at `now`, with its deadline.
    pub fn pop_due(&mut self, now: u64) -> Option<(u64, E)> {
        let (&(deadline, seq), _) = self.pending.first_key_value()?;
        if deadline > now {
            return None;
        }
        self.pending.remove(&(deadline, seq)).map(|e| (deadline, e))
    }

    /// Freeze every pending entry, keeping its remaining time.
    pub fn pause(&mut self, now: u64) {
        if self.frozen.is_some() {
            return;
        }
        let frozen = std::mem::take(&mut self.pending)
            .into_iter()
            .map(|((deadline, seq), event)| Frozen {
                remaining: deadline.saturating_sub(now),
                seq,
                event,
            })
            .collect();
        self.frozen = Some(frozen);
    }

    /// Re-arm frozen entries from their remaining times. Relative order
    /// among entries with equal remaining time is preserved.
    pub fn resume(&mut self, now: u64) {
        if let Some(frozen) = self.frozen.take() {
            for f in frozen {
                self.pending
                    .insert((now.saturating_add(f.remaining), f.seq), f.event);
            }
        }
    }

    pub fn is_paused(&self) -> bool {
        self.frozen.is_some()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.pending.keys().next().map(|(d, _)| *d)
    }

    /// Time left until the first entry matching `pred`, paused or not.
    pub fn remaining_for(&self, now: u64, mut pred: impl FnMut(&E) -> bool) -> Option<u64> {
        if let Some(frozen) = self.frozen.as_ref() {
            return frozen
                .iter()
                .filter(|f| pred(&f.event))
                .map(|f| f.remaining)
                .min();
        }
        self.pending
            .iter()
            .find(|(_, e)| pred(e))
            .map(|((d, _), _)| d.saturating_sub(now))
    }

    pub fn len(&self) -> usize {
        self.pending.len() + self.frozen.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
