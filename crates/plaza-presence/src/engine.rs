//! Wiring for one presence session.
//!
//! The engine runs on a single thread. Network frames arrive through the
//! [`TransportInbox`] and are applied in [`Engine::pump`]; input arrives
//! through [`Engine::walk`] and [`Engine::stop`]; time advances in
//! [`Engine::tick`]. Every state change is published on the bus.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use plaza_bus::SubscriptionGuard;
use plaza_config::Config;
use plaza_world::World;
use tracing::{debug, info};

use crate::events::{PresenceBus, PresenceEvent};
use crate::identity::Uid;
use crate::inbox::{InboxSender, TransportInbox, inbox};
use crate::local::LocalController;
use crate::messages::InboundMessage;
use crate::player::{Direction, MoveOutcome, Player, PlayerTuning};
use crate::proximity::ProximityManager;
use crate::sync::PresenceSynchronizer;
use crate::transport::{MediaTransport, PresenceTransport};

/// A running presence session for one local player.
pub struct Engine {
    world: Rc<World>,
    bus: PresenceBus,
    local: LocalController,
    sync: PresenceSynchronizer,
    proximity: Rc<RefCell<ProximityManager>>,
    _proximity_subscriptions: Vec<SubscriptionGuard<PresenceEvent>>,
    inbox: TransportInbox,
    inbox_sender: InboxSender,
}

impl Engine {
    /// Builds an engine. The local player is placed at the realm spawn but
    /// not announced until [`Engine::spawn_local`].
    pub fn new(
        world: Rc<World>,
        config: &Config,
        local_uid: Uid,
        local_skin: impl Into<String>,
        transport: Box<dyn PresenceTransport>,
        media: Box<dyn MediaTransport>,
    ) -> Self {
        let now = Instant::now();
        let bus = PresenceBus::new();
        let tuning = PlayerTuning::from_config(&config.presence);
        let local = LocalController::new(Rc::clone(&world), tuning, local_uid.clone(), now);
        let sync = PresenceSynchronizer::new(
            Rc::clone(&world),
            bus.clone(),
            config,
            local_uid.clone(),
            local_skin,
            transport,
        );
        let proximity = Rc::new(RefCell::new(ProximityManager::new(
            local_uid,
            &config.proximity,
            media,
        )));
        let subscriptions = ProximityManager::attach(&proximity, &bus);
        let (inbox_sender, inbox) = inbox();

        Self {
            world,
            bus,
            local,
            sync,
            proximity,
            _proximity_subscriptions: subscriptions,
            inbox,
            inbox_sender,
        }
    }

    /// The presence bus. Subscribe here for renderer and UI updates.
    pub fn bus(&self) -> &PresenceBus {
        &self.bus
    }

    /// Handle network threads use to queue raw frames.
    pub fn inbox_sender(&self) -> InboxSender {
        self.inbox_sender.clone()
    }

    /// The realm.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Announces the local player on the bus and to the network.
    pub fn spawn_local(&mut self, now: Instant) {
        let player = self.local.player();
        info!(uid = %player.uid(), room = ?player.room(), "local player spawned");
        self.sync.note_local(player);
        self.publish(PresenceEvent::PlayerJoined(player.snapshot()));
        self.sync.flush_outbound(now);
    }

    /// Applies one decoded inbound message.
    pub fn handle_message(&mut self, msg: InboundMessage, now: Instant) -> bool {
        self.sync.handle(msg, now)
    }

    /// Drains queued frames. Returns the number of messages accepted.
    pub fn pump(&mut self, now: Instant) -> usize {
        let messages = self.inbox.drain();
        let total = messages.len();
        let accepted = messages
            .into_iter()
            .map(|msg| self.sync.handle(msg, now))
            .filter(|ok| *ok)
            .count();
        if total > 0 {
            debug!(total, accepted, "pumped inbox");
        }
        accepted
    }

    /// Walks the local player for `dt` seconds.
    pub fn walk(&mut self, direction: Direction, dt: f32, now: Instant) -> MoveOutcome {
        let (outcome, event) = self.local.walk(direction, dt, now);
        if let Some(event) = event {
            self.sync.note_local(self.local.player());
            self.publish(event);
        }
        outcome
    }

    /// Releases movement input.
    pub fn stop(&mut self, now: Instant) {
        if let Some(event) = self.local.stop(now) {
            self.sync.note_local(self.local.player());
            self.publish(event);
        }
    }

    /// Advances animation, evicts silent remotes, and sends the throttled
    /// local update.
    pub fn tick(&mut self, dt: f32, now: Instant) {
        if let Some(event) = self.local.animate(dt) {
            self.publish(event);
        }
        self.sync.animate(dt);
        self.sync.evict_stale(now);
        self.sync.flush_outbound(now);
    }

    /// The local player.
    pub fn local(&self) -> &Player {
        self.local.player()
    }

    /// A remote player by uid.
    pub fn remote(&self, uid: &Uid) -> Option<&Player> {
        self.sync.remote(uid)
    }

    /// The synchronizer, for read-only queries.
    pub fn sync(&self) -> &PresenceSynchronizer {
        &self.sync
    }

    /// Remote peers whose media is joined.
    pub fn proximity_peers(&self) -> Vec<Uid> {
        self.proximity.borrow().attached_peers()
    }

    /// Shared handle to the proximity manager.
    pub fn proximity(&self) -> Rc<RefCell<ProximityManager>> {
        Rc::clone(&self.proximity)
    }

    fn publish(&self, event: PresenceEvent) {
        if let Err(err) = self.bus.publish(event) {
            debug!(%err, "presence event not delivered");
        }
    }
}
