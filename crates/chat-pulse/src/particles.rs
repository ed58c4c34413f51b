//! Emote particle population and physics.
//!
//! [`ParticleField`] turns count snapshots into a bounded set of bouncing
//! particles. Reconciliation only adds or removes what changed, so existing
//! particles keep their motion between snapshots. Rendering is left to the
//! caller, which reads [`ParticleView`] snapshots.

use std::f64::consts::TAU;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, trace};

use crate::catalog::RenderMetadata;
use crate::config::ParticleConfig;
use crate::statistics::{KeyCount, rank_counts};

/// A bouncing emote marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub key: String,
    pub x: f64,
    pub y: f64,
    /// Horizontal velocity in distance per tick
    pub vx: f64,
    /// Vertical velocity in distance per tick
    pub vy: f64,
    pub rotation: f64,
    pub rotation_speed: f64,
    pub size: f64,
}

/// What a renderer needs to draw a particle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticleView {
    pub key: String,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub size: f64,
}

impl From<&Particle> for ParticleView {
    fn from(p: &Particle) -> Self {
        Self {
            key: p.key.clone(),
            x: p.x,
            y: p.y,
            rotation: p.rotation,
            size: p.size,
        }
    }
}

/// Desired population of one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub key: String,
    /// Count the key was selected with
    pub count: u64,
    /// Number of particles the key should have
    pub population: u64,
}

/// Pick the `max_keys` highest counts and cap each population at `max_per_key`.
///
/// Ties keep the snapshot order.
pub fn select_targets(counts: &[KeyCount], max_keys: usize, max_per_key: u64) -> Vec<Target> {
    rank_counts(counts.to_vec(), max_keys)
        .into_iter()
        .filter(|c| c.count > 0)
        .map(|c| Target {
            population: c.count.min(max_per_key),
            count: c.count,
            key: c.key,
        })
        .collect()
}

/// Outcome of one reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub spawned: usize,
    pub removed: usize,
    /// Keys that needed particles but had no usable render metadata
    pub suppressed: usize,
}

/// The live particle set and its bounds.
#[derive(Debug)]
pub struct ParticleField {
    config: ParticleConfig,
    width: f64,
    height: f64,
    particles: Vec<Particle>,
    rng: StdRng,
}

impl ParticleField {
    pub fn new(config: ParticleConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Deterministic field for reproducible runs.
    pub fn with_seed(config: ParticleConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: ParticleConfig, rng: StdRng) -> Self {
        Self {
            width: config.width,
            height: config.height,
            config,
            particles: Vec::new(),
            rng,
        }
    }

    /// Bring the population in line with a count snapshot.
    ///
    /// Particles of keys that dropped out of the top set are removed, keys
    /// over target lose exactly their surplus (oldest first) and keys under
    /// target gain particles when `metadata` has something to draw for them.
    /// Runs in time linear in the current plus target population.
    pub fn reconcile(
        &mut self,
        counts: &[KeyCount],
        metadata: &impl RenderMetadata,
    ) -> ReconcileStats {
        let targets = select_targets(counts, self.config.max_keys, self.config.max_per_key);
        let mut stats = ReconcileStats::default();

        let (mut surplus, deficits) = {
            let wanted: FxHashMap<&str, u64> = targets
                .iter()
                .map(|t| (t.key.as_str(), t.population))
                .collect();

            let mut have: FxHashMap<&str, u64> = FxHashMap::default();
            for p in &self.particles {
                *have.entry(p.key.as_str()).or_insert(0) += 1;
            }

            let deficits: Vec<u64> = targets
                .iter()
                .map(|t| {
                    let current = have.get(t.key.as_str()).copied().unwrap_or(0);
                    t.population.saturating_sub(current)
                })
                .collect();

            let surplus: FxHashMap<String, u64> = have
                .into_iter()
                .filter_map(|(key, n)| {
                    let keep = wanted.get(key).copied().unwrap_or(0);
                    (n > keep).then(|| (key.to_string(), n - keep))
                })
                .collect();

            (surplus, deficits)
        };

        if !surplus.is_empty() {
            let before = self.particles.len();
            self.particles
                .retain(|p| match surplus.get_mut(p.key.as_str()) {
                    Some(n) if *n > 0 => {
                        *n -= 1;
                        false
                    }
                    _ => true,
                });
            stats.removed = before - self.particles.len();
        }

        for (target, deficit) in targets.iter().zip(deficits) {
            if deficit == 0 {
                continue;
            }
            match metadata.render_meta(&target.key) {
                Some(meta) if meta.is_usable() => {
                    let size = self.size_for_count(target.count);
                    for _ in 0..deficit {
                        let particle = self.spawn(&target.key, size);
                        self.particles.push(particle);
                    }
                    stats.spawned += deficit as usize;
                }
                _ => {
                    debug!(key = %target.key, "No render metadata, not spawning particles");
                    stats.suppressed += 1;
                }
            }
        }

        trace!(
            spawned = stats.spawned,
            removed = stats.removed,
            total = self.particles.len(),
            "Reconciled particles"
        );
        stats
    }

    /// Size from invocation count: logarithmic growth, capped.
    pub fn size_for_count(&self, count: u64) -> f64 {
        let count = count.max(1) as f64;
        (self.config.size_min + count.ln() * self.config.size_slope).min(self.config.size_max)
    }

    fn spawn(&mut self, key: &str, size: f64) -> Particle {
        let rng = &mut self.rng;
        Particle {
            key: key.to_string(),
            x: rng.random::<f64>() * self.width,
            y: rng.random::<f64>() * self.height,
            vx: (rng.random::<f64>() - 0.5) * self.config.max_speed,
            vy: (rng.random::<f64>() - 0.5) * self.config.max_speed,
            rotation: rng.random::<f64>() * TAU,
            rotation_speed: (rng.random::<f64>() - 0.5) * self.config.max_spin,
            size,
        }
    }

    /// Advance every particle by one tick.
    ///
    /// Crossing a wall reflects the velocity on that axis without loss and
    /// clamps the particle back inside. A particle larger than the bounds on
    /// an axis is held at the centre of that axis.
    pub fn step(&mut self) {
        let (width, height) = (self.width, self.height);
        for p in &mut self.particles {
            p.x += p.vx;
            p.y += p.vy;
            p.rotation += p.rotation_speed;

            let half = p.size / 2.0;
            if p.x - half < 0.0 || p.x + half > width {
                p.vx = -p.vx;
                p.x = clamp_axis(p.x, half, width);
            }
            if p.y - half < 0.0 || p.y + half > height {
                p.vy = -p.vy;
                p.y = clamp_axis(p.y, half, height);
            }
        }
    }

    /// Change the bounds. Particles are pulled back inside on the next step;
    /// bounds smaller than a particle centre it on that axis.
    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width.max(0.0);
        self.height = height.max(0.0);
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    #[cfg(test)]
    pub(crate) fn particles_mut(&mut self) -> &mut Vec<Particle> {
        &mut self.particles
    }

    pub fn views(&self) -> Vec<ParticleView> {
        self.particles.iter().map(ParticleView::from).collect()
    }

    /// Number of particles of one key.
    pub fn population(&self, key: &str) -> usize {
        self.particles.iter().filter(|p| p.key == key).count()
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }
}

/// Keep a particle of half-size `half` inside `[0, extent]`.
fn clamp_axis(pos: f64, half: f64, extent: f64) -> f64 {
    if extent < half * 2.0 {
        extent / 2.0
    } else {
        pos.clamp(half, extent - half)
    }
}
