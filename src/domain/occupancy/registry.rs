use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::clock::clock::SharedClock;
use crate::domain::occupancy::claim::{ClaimOutcome, OccupancyClaim, OccupancyResource, QueueEntry, QueueSnapshot, ReleaseOutcome};
use crate::domain::occupancy::deadlock::{WaitForGraph, describe_cycle};
use crate::domain::occupancy::event_bus::EventBus;
use crate::domain::occupancy::events::{DeadlockDetectedEvent, DeadlockResolvedEvent, RailEvent};
use crate::domain::occupancy::signal::SignalAspect;
use crate::domain::utils::id::{TrainId, WorldId};
use crate::logger::ANALYTICS_TARGET;

type ResourceKey = (WorldId, String);

#[derive(Debug, Clone)]
struct Waiter {
    train_id: TrainId,
    requested_at: DateTime<Utc>,
}

/// Holder and FIFO wait queue of one resource.
#[derive(Debug)]
struct ResourceSlot {
    resource: OccupancyResource,
    claim: Option<OccupancyClaim>,
    queue: VecDeque<Waiter>,
}

impl ResourceSlot {
    fn position_of(&self, train: &TrainId) -> Option<usize> {
        self.queue.iter().position(|waiter| &waiter.train_id == train).map(|index| index + 1)
    }

    fn is_idle(&self) -> bool {
        self.claim.is_none() && self.queue.is_empty()
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    slots: HashMap<ResourceKey, ResourceSlot>,

    /// Cycles already reported, as (world, sorted member list). Cleared once a member releases.
    reported_deadlocks: HashSet<(WorldId, Vec<TrainId>)>,
}

impl RegistryInner {
    fn wait_for_graph(&self, world: WorldId) -> WaitForGraph {
        let mut graph = WaitForGraph::new();
        for ((slot_world, _), slot) in &self.slots {
            if *slot_world != world {
                continue;
            }
            if let Some(claim) = &slot.claim {
                for waiter in &slot.queue {
                    graph.add_wait(waiter.train_id.clone(), claim.train_id.clone());
                }
            }
        }
        graph
    }

    fn forget_deadlocks_of(&mut self, world: WorldId, train: &TrainId) {
        self.reported_deadlocks.retain(|(w, members)| *w != world || !members.contains(train));
    }

    /// Drops the claim held by `train` and grants the resource to the queue head.
    ///
    /// A hand-off makes the remaining waiters wait for the new holder, which can close a
    /// wait-for cycle without any new request, so the affected trains are checked again.
    fn release_claim(&mut self, key: &ResourceKey, train: &TrainId, now: DateTime<Utc>) -> (ReleaseOutcome, Vec<DeadlockDetectedEvent>) {
        let Some(slot) = self.slots.get_mut(key) else {
            return (ReleaseOutcome::NotHeld, Vec::new());
        };

        let outcome = match slot.claim.as_ref() {
            Some(claim) if &claim.train_id == train => {
                let released = slot.claim.take();
                let handed_to = slot.queue.pop_front().map(|waiter| OccupancyClaim {
                    train_id: waiter.train_id,
                    resource_type: slot.resource.resource_type,
                    resource_id: slot.resource.resource_id.clone(),
                    world_id: key.0,
                    claimed_at: now,
                    signal: SignalAspect::Proceed,
                });
                slot.claim = handed_to.clone();

                match released {
                    Some(claim) => ReleaseOutcome::Released { claim, handed_to },
                    None => ReleaseOutcome::NotHeld,
                }
            }
            _ => match slot.position_of(train) {
                Some(position) => {
                    slot.queue.remove(position - 1);
                    ReleaseOutcome::Dequeued
                }
                None => ReleaseOutcome::NotHeld,
            },
        };

        let resource = slot.resource.clone();
        let mut affected: Vec<TrainId> = Vec::new();
        if let ReleaseOutcome::Released { handed_to: Some(next), .. } = &outcome {
            affected.push(next.train_id.clone());
            affected.extend(slot.queue.iter().map(|waiter| waiter.train_id.clone()));
        }

        if slot.is_idle() {
            self.slots.remove(key);
        }

        if !matches!(outcome, ReleaseOutcome::NotHeld) {
            self.forget_deadlocks_of(key.0, train);
        }

        let deadlocks = affected.iter().filter_map(|affected_train| self.detect_deadlock(key.0, affected_train, &resource)).collect();

        (outcome, deadlocks)
    }

    /// Looks for a wait-for cycle through `train` and records it as reported.
    ///
    /// # Returns
    /// Returns the event to publish, or `None` if there is no cycle or it was reported before.
    fn detect_deadlock(&mut self, world: WorldId, train: &TrainId, resource: &OccupancyResource) -> Option<DeadlockDetectedEvent> {
        let cycle = self.wait_for_graph(world).find_cycle_through(train)?;

        let mut members = cycle.clone();
        members.sort();
        if !self.reported_deadlocks.insert((world, members)) {
            return None;
        }

        let reason = describe_cycle(&cycle);
        log::warn!("DeadlockDetected: World {} on {}: {}", world, resource, reason);
        tracing::warn!(target: ANALYTICS_TARGET, World = %world, Resource = %resource, Trains = cycle.len(), "Deadlock detected");

        Some(DeadlockDetectedEvent { world_id: world, involved_trains: cycle, conflict_resource: resource.clone(), reason })
    }
}

/// Registry of exclusive resource claims and their wait queues.
///
/// Every state transition happens under one write lock, which makes claim acquisition a
/// single check-and-set: two trains racing for the same free resource cannot both win.
/// Events are published after the lock has been released, in the order the transitions
/// happened, so subscribers may query the registry from their handlers.
#[derive(Debug)]
pub struct OccupancyRegistry {
    inner: RwLock<RegistryInner>,
    events: Arc<EventBus>,
    clock: SharedClock,
}

impl OccupancyRegistry {
    pub fn new(events: Arc<EventBus>, clock: SharedClock) -> Self {
        Self { inner: RwLock::new(RegistryInner::default()), events, clock }
    }

    //---------------------
    // --- Transitions ---
    //---------------------

    /// Requests `resource` for `train`.
    ///
    /// A free resource is granted immediately, a held one enqueues the requester behind
    /// earlier requesters. Repeating a request never creates a second queue entry.
    pub fn request(&self, world: WorldId, train: &TrainId, resource: &OccupancyResource) -> ClaimOutcome {
        let now = self.clock.now();
        let key: ResourceKey = (world, resource.resource_id.clone());
        let mut pending: Vec<RailEvent> = Vec::new();

        let outcome = {
            let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            let slot = guard.slots.entry(key.clone()).or_insert_with(|| ResourceSlot {
                resource: resource.clone(),
                claim: None,
                queue: VecDeque::new(),
            });

            let outcome = match &slot.claim {
                None => {
                    let claim = OccupancyClaim {
                        train_id: train.clone(),
                        resource_type: slot.resource.resource_type,
                        resource_id: slot.resource.resource_id.clone(),
                        world_id: world,
                        claimed_at: now,
                        signal: SignalAspect::Proceed,
                    };
                    slot.claim = Some(claim.clone());
                    pending.push(RailEvent::ClaimGranted(claim.clone()));
                    ClaimOutcome::Granted(claim)
                }
                Some(claim) if &claim.train_id == train => ClaimOutcome::AlreadyHeld(claim.clone()),
                Some(claim) => {
                    let holder = claim.train_id.clone();
                    let position = match slot.position_of(train) {
                        Some(position) => position,
                        None => {
                            slot.queue.push_back(Waiter { train_id: train.clone(), requested_at: now });
                            pending.push(RailEvent::ClaimQueued {
                                world_id: world,
                                train_id: train.clone(),
                                resource: slot.resource.clone(),
                                position: slot.queue.len(),
                            });
                            slot.queue.len()
                        }
                    };
                    ClaimOutcome::Queued { position, holder }
                }
            };

            if matches!(outcome, ClaimOutcome::Queued { .. }) {
                if let Some(event) = guard.detect_deadlock(world, train, resource) {
                    pending.push(RailEvent::DeadlockDetected(event));
                }
            }

            outcome
        };

        match &outcome {
            ClaimOutcome::Granted(claim) => {
                tracing::info!(target: ANALYTICS_TARGET, World = %world, Train = %claim.train_id, Resource = %resource, "Claim granted");
            }
            ClaimOutcome::Queued { position, holder } => {
                log::debug!("ClaimQueued: {} waits for {} held by {} (position {}).", train, resource, holder, position);
            }
            ClaimOutcome::AlreadyHeld(_) => {}
        }

        for event in pending {
            self.events.publish(event);
        }

        outcome
    }

    /// Releases `train`'s hold on (or queue entry for) `resource`.
    ///
    /// The head of the wait queue, if any, receives the resource in the same step.
    pub fn release(&self, world: WorldId, train: &TrainId, resource: &OccupancyResource) -> ReleaseOutcome {
        let now = self.clock.now();
        let key: ResourceKey = (world, resource.resource_id.clone());

        let (outcome, deadlocks) = {
            let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            guard.release_claim(&key, train, now)
        };

        self.publish_release(&outcome, deadlocks, now);
        outcome
    }

    fn publish_release(&self, outcome: &ReleaseOutcome, deadlocks: Vec<DeadlockDetectedEvent>, now: DateTime<Utc>) {
        if let ReleaseOutcome::Released { claim, handed_to } = outcome {
            log::debug!("ClaimReleased: {} released {}.", claim.train_id, claim.resource());
            self.events.publish(RailEvent::ClaimReleased {
                world_id: claim.world_id,
                train_id: claim.train_id.clone(),
                resource: claim.resource(),
                held_for: now - claim.claimed_at,
            });

            if let Some(next) = handed_to {
                log::debug!("ClaimHandedOver: {} now holds {}.", next.train_id, next.resource());
                self.events.publish(RailEvent::ClaimGranted(next.clone()));
            }
        }

        for event in deadlocks {
            self.events.publish(RailEvent::DeadlockDetected(event));
        }
    }

    /// Supervisor release of whatever train currently holds `resource`.
    ///
    /// The holder is looked up and released in one locked step. `ForcedRelease` is only
    /// published when a claim was actually dropped.
    pub fn force_release(&self, world: WorldId, resource: &OccupancyResource, reason: &str) -> ReleaseOutcome {
        let now = self.clock.now();
        let key: ResourceKey = (world, resource.resource_id.clone());

        let (outcome, deadlocks) = {
            let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            let holder = guard.slots.get(&key).and_then(|slot| slot.claim.as_ref()).map(|claim| claim.train_id.clone());
            match holder {
                Some(holder) => guard.release_claim(&key, &holder, now),
                None => (ReleaseOutcome::NotHeld, Vec::new()),
            }
        };

        if let ReleaseOutcome::Released { claim, .. } = &outcome {
            log::warn!("ForcedRelease: {} taken from {}: {}", resource, claim.train_id, reason);
            self.events.publish(RailEvent::ForcedRelease {
                world_id: world,
                train_id: claim.train_id.clone(),
                resource: resource.clone(),
                reason: reason.to_string(),
            });
        }

        self.publish_release(&outcome, deadlocks, now);
        outcome
    }

    /// Resolution hook for a detected deadlock: `train` gives up `resource`.
    ///
    /// # Returns
    /// Returns the published `DeadlockResolvedEvent`, or `None` if `train` did not hold the resource.
    pub fn yield_for_deadlock(&self, world: WorldId, train: &TrainId, resource: &OccupancyResource) -> Option<DeadlockResolvedEvent> {
        let ReleaseOutcome::Released { claim, .. } = self.release(world, train, resource) else {
            return None;
        };

        let event = DeadlockResolvedEvent {
            world_id: world,
            released_train: train.clone(),
            resource: resource.clone(),
            lock_duration: self.clock.now() - claim.claimed_at,
        };

        log::info!("DeadlockResolved: {} yielded {} after {}s.", train, resource, event.lock_duration.num_seconds());
        tracing::info!(target: ANALYTICS_TARGET, World = %world, Train = %train, Resource = %resource, LockDurationMs = event.lock_duration.num_milliseconds(), "Deadlock resolved");

        self.events.publish(RailEvent::DeadlockResolved(event.clone()));
        Some(event)
    }

    /// Drops every claim and queue entry of `train` in `world`.
    ///
    /// # Returns
    /// Returns the number of claims and queue entries removed.
    pub fn release_all(&self, world: WorldId, train: &TrainId) -> usize {
        let now = self.clock.now();

        let outcomes: Vec<(ReleaseOutcome, Vec<DeadlockDetectedEvent>)> = {
            let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            let mut keys: Vec<ResourceKey> = guard
                .slots
                .iter()
                .filter(|((w, _), slot)| {
                    *w == world && (slot.claim.as_ref().is_some_and(|c| &c.train_id == train) || slot.position_of(train).is_some())
                })
                .map(|(key, _)| key.clone())
                .collect();
            keys.sort();

            keys.iter().map(|key| guard.release_claim(key, train, now)).collect()
        };

        let mut removed = 0;
        for (outcome, deadlocks) in outcomes {
            if !matches!(outcome, ReleaseOutcome::NotHeld) {
                removed += 1;
            }
            self.publish_release(&outcome, deadlocks, now);
        }

        removed
    }

    /// Stores the resolved aspect on `train`'s claim.
    ///
    /// # Returns
    /// Returns the previous aspect, or `None` if `train` does not hold `resource`.
    pub fn set_signal(&self, world: WorldId, train: &TrainId, resource: &OccupancyResource, aspect: SignalAspect) -> Option<SignalAspect> {
        let key: ResourceKey = (world, resource.resource_id.clone());

        let previous = {
            let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            let claim = guard.slots.get_mut(&key)?.claim.as_mut().filter(|claim| &claim.train_id == train)?;
            std::mem::replace(&mut claim.signal, aspect)
        };

        if previous != aspect {
            self.events.publish(RailEvent::SignalChanged {
                world_id: world,
                train_id: train.clone(),
                resource: resource.clone(),
                previous,
                current: aspect,
            });
        }

        Some(previous)
    }

    //---------------------
    // --- Reads ---
    //---------------------

    pub fn claim(&self, world: WorldId, resource_id: &str) -> Option<OccupancyClaim> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.slots.get(&(world, resource_id.to_string())).and_then(|slot| slot.claim.clone())
    }

    /// All claims of a world, oldest first.
    pub fn claims(&self, world: WorldId) -> Vec<OccupancyClaim> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut claims: Vec<OccupancyClaim> =
            guard.slots.iter().filter(|((w, _), _)| *w == world).filter_map(|(_, slot)| slot.claim.clone()).collect();
        claims.sort_by(|a, b| a.claimed_at.cmp(&b.claimed_at).then_with(|| a.resource_id.cmp(&b.resource_id)));
        claims
    }

    pub fn claims_for_train(&self, world: WorldId, train: &TrainId) -> Vec<OccupancyClaim> {
        self.claims(world).into_iter().filter(|claim| &claim.train_id == train).collect()
    }

    pub fn queue_snapshot(&self, world: WorldId, resource_id: &str) -> Option<QueueSnapshot> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let slot = guard.slots.get(&(world, resource_id.to_string()))?;

        Some(QueueSnapshot {
            world_id: world,
            resource: slot.resource.clone(),
            holder: slot.claim.as_ref().map(|claim| claim.train_id.clone()),
            entries: slot
                .queue
                .iter()
                .enumerate()
                .map(|(index, waiter)| QueueEntry { train_id: waiter.train_id.clone(), requested_at: waiter.requested_at, position: index + 1 })
                .collect(),
        })
    }

    /// Resources `train` is queued for, with its 1-based position in each queue.
    pub fn waiting_for(&self, world: WorldId, train: &TrainId) -> Vec<(OccupancyResource, usize)> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut waits: Vec<(OccupancyResource, usize)> = guard
            .slots
            .iter()
            .filter(|((w, _), _)| *w == world)
            .filter_map(|(_, slot)| slot.position_of(train).map(|position| (slot.resource.clone(), position)))
            .collect();
        waits.sort_by(|a, b| a.0.resource_id.cmp(&b.0.resource_id));
        waits
    }
}
