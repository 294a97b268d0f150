//! Topic-based battle event bus.
//!
//! Listeners are plain boxed closures kept in a list; publishing walks the
//! list synchronously on the caller's thread.

use tracing::trace;

use crate::combatant::{CombatantId, TeamSide};

/// Topics for event routing.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Topic {
    /// Round start/end
    Round,
    /// Turn start/end
    Turn,
    /// Battle outcome
    Battle,
}

/// Lifecycle broadcasts emitted by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BattleEvent {
    RoundStarted { round: u32 },
    RoundEnded { round: u32 },
    TurnStarted { combatant: CombatantId },
    TurnEnded { combatant: CombatantId },
    /// `winner` is `None` when nobody is left standing.
    BattleEnded { winner: Option<TeamSide> },
}

impl BattleEvent {
    pub fn topic(&self) -> Topic {
        match self {
            BattleEvent::RoundStarted { .. } | BattleEvent::RoundEnded { .. } => Topic::Round,
            BattleEvent::TurnStarted { .. } | BattleEvent::TurnEnded { .. } => Topic::Turn,
            BattleEvent::BattleEnded { .. } => Topic::Battle,
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

type Listener = Box<dyn FnMut(&BattleEvent)>;

struct Subscription {
    id: SubscriptionId,
    topic: Option<Topic>,
    listener: Listener,
}

/// Event bus with per-topic filtering.
#[derive(Default)]
pub struct EventBus {
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a single topic.
    pub fn subscribe(
        &mut self,
        topic: Topic,
        listener: impl FnMut(&BattleEvent) + 'static,
    ) -> SubscriptionId {
        self.add(Some(topic), Box::new(listener))
    }

    /// Subscribe to every topic.
    pub fn subscribe_all(&mut self, listener: impl FnMut(&BattleEvent) + 'static) -> SubscriptionId {
        self.add(None, Box::new(listener))
    }

    /// Returns false if the subscription was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|subscription| subscription.id != id);
        before != self.subscriptions.len()
    }

    /// Publish an event to every listener of its topic.
    pub fn publish(&mut self, event: BattleEvent) {
        let topic = event.topic();
        let mut delivered = 0usize;
        for subscription in &mut self.subscriptions {
            if subscription.topic.is_none_or(|wanted| wanted == topic) {
                (subscription.listener)(&event);
                delivered += 1;
            }
        }
        trace!(%topic, ?event, delivered, "event published");
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    fn add(&mut self, topic: Option<Topic>, listener: Listener) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscriptions.push(Subscription {
            id,
            topic,
            listener,
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn topic_filtering_and_unsubscribe() {
        let mut bus = EventBus::new();
        let turns = Rc::new(RefCell::new(Vec::new()));
        let everything = Rc::new(RefCell::new(0));

        let sink = Rc::clone(&turns);
        let turn_id = bus.subscribe(Topic::Turn, move |event| sink.borrow_mut().push(*event));
        let counter = Rc::clone(&everything);
        bus.subscribe_all(move |_| *counter.borrow_mut() += 1);

        bus.publish(BattleEvent::RoundStarted { round: 1 });
        bus.publish(BattleEvent::TurnStarted {
            combatant: CombatantId(3),
        });

        assert_eq!(
            *turns.borrow(),
            vec![BattleEvent::TurnStarted {
                combatant: CombatantId(3)
            }]
        );
        assert_eq!(*everything.borrow(), 2);

        assert!(bus.unsubscribe(turn_id));
        assert!(!bus.unsubscribe(turn_id));
        bus.publish(BattleEvent::TurnEnded {
            combatant: CombatantId(3),
        });
        assert_eq!(turns.borrow().len(), 1);
        assert_eq!(*everything.borrow(), 3);
    }
}
