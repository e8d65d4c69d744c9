use chrono::{DateTime, Utc};
use futures::Stream;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::{self, error::TrySendError};
use ulid::Ulid;

pub const SESSION_QUEUE_CAPACITY: usize = 64;

pub mod events {
    pub const CONNECTED: &str = "connected";
    pub const ORDER_CREATED: &str = "order.created";
    pub const ORDER_STATUS_UPDATED: &str = "order.status_updated";
    pub const ORDER_ASSIGNED: &str = "order.assigned";
    pub const DELIVERY_LOCATION_UPDATED: &str = "delivery.location_updated";
    pub const NOTIFICATION: &str = "notification";
}

pub mod room {
    use crate::modules::user::repository::Role;

    pub fn user(user_id: &str) -> String {
        format!("user:{user_id}")
    }

    pub fn role(role: Role) -> String {
        format!("role:{role}")
    }

    pub fn restaurant(restaurant_id: &str) -> String {
        format!("restaurant:{restaurant_id}")
    }

    pub fn order(order_id: &str) -> String {
        format!("order:{order_id}")
    }
}

#[derive(Serialize, Clone, Debug)]
pub struct Event {
    pub name: String,
    pub payload: serde_json::Value,
    pub sent_at: DateTime<Utc>,
}

impl Event {
    pub fn new(name: &str, payload: serde_json::Value) -> Self {
        Self {
            name: name.to_string(),
            payload,
            sent_at: Utc::now(),
        }
    }
}

struct Session {
    user_id: String,
    rooms: HashSet<String>,
    sender: mpsc::Sender<Event>,
}

/// In-memory fan-out of events to connected sessions. Delivery is best
/// effort: an event is dropped for any session whose queue is full or closed.
#[derive(Default)]
pub struct Hub {
    sessions: RwLock<HashMap<String, Session>>,
}

impl Hub {
    pub fn connect(
        self: &Arc<Self>,
        user_id: &str,
        rooms: impl IntoIterator<Item = String>,
    ) -> Subscription {
        let (sender, receiver) = mpsc::channel(SESSION_QUEUE_CAPACITY);
        let id = Ulid::new().to_string();

        self.sessions.write().insert(
            id.clone(),
            Session {
                user_id: user_id.to_string(),
                rooms: rooms.into_iter().collect(),
                sender,
            },
        );

        tracing::debug!("Realtime session {} connected for user {}", id, user_id);

        Subscription {
            id,
            receiver,
            hub: Arc::downgrade(self),
        }
    }

    pub fn disconnect(&self, session_id: &str) {
        if self.sessions.write().remove(session_id).is_some() {
            tracing::debug!("Realtime session {} disconnected", session_id);
        }
    }

    pub fn session_owner(&self, session_id: &str) -> Option<String> {
        self.sessions
            .read()
            .get(session_id)
            .map(|session| session.user_id.clone())
    }

    pub fn join(&self, session_id: &str, room: String) -> bool {
        match self.sessions.write().get_mut(session_id) {
            Some(session) => {
                session.rooms.insert(room);
                true
            }
            None => false,
        }
    }

    pub fn leave(&self, session_id: &str, room: &str) -> bool {
        match self.sessions.write().get_mut(session_id) {
            Some(session) => session.rooms.remove(room),
            None => false,
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn publish(&self, room: &str, event: Event) -> usize {
        self.publish_many(&[room.to_string()], event)
    }

    /// Delivers `event` once to every session in any of `rooms` and returns
    /// how many sessions accepted it.
    pub fn publish_many(&self, rooms: &[String], event: Event) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        {
            let sessions = self.sessions.read();
            for (id, session) in sessions.iter() {
                if !rooms.iter().any(|room| session.rooms.contains(room)) {
                    continue;
                }

                match session.sender.try_send(event.clone()) {
                    Ok(_) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!("Dropping {} for slow realtime session {}", event.name, id);
                    }
                    Err(TrySendError::Closed(_)) => closed.push(id.clone()),
                }
            }
        }

        if !closed.is_empty() {
            let mut sessions = self.sessions.write();
            for id in closed {
                sessions.remove(&id);
            }
        }

        delivered
    }
}

/// Receiving end of a session. Dropping it removes the session from the hub.
pub struct Subscription {
    id: String,
    receiver: mpsc::Receiver<Event>,
    hub: Weak<Hub>,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    pub fn into_stream(self) -> impl Stream<Item = Event> {
        futures::stream::unfold(self, |mut subscription| async move {
            subscription
                .recv()
                .await
                .map(|event| (event, subscription))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.disconnect(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    fn event(name: &str) -> Event {
        Event::new(name, json!({}))
    }

    #[tokio::test]
    async fn publishes_only_to_room_members() {
        let hub = Arc::new(Hub::default());
        let mut alice = hub.connect("alice", [room::user("alice")]);
        let mut bob = hub.connect("bob", [room::user("bob")]);

        assert_eq!(hub.publish(&room::user("alice"), event("ping")), 1);

        assert_eq!(alice.recv().await.unwrap().name, "ping");
        assert!(bob.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_many_delivers_once_per_session() {
        let hub = Arc::new(Hub::default());
        let mut sub = hub.connect("alice", [room::user("alice"), room::order("o1")]);

        let delivered = hub.publish_many(&[room::user("alice"), room::order("o1")], event("x"));

        assert_eq!(delivered, 1);
        assert!(sub.recv().await.is_some());
        assert!(sub.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn join_and_leave_rooms() {
        let hub = Arc::new(Hub::default());
        let sub = hub.connect("alice", Vec::new());

        assert_eq!(hub.publish(&room::order("o1"), event("x")), 0);
        assert!(hub.join(sub.id(), room::order("o1")));
        assert_eq!(hub.publish(&room::order("o1"), event("x")), 1);
        assert!(hub.leave(sub.id(), &room::order("o1")));
        assert_eq!(hub.publish(&room::order("o1"), event("x")), 0);
        assert!(!hub.join("missing", room::order("o1")));
    }

    #[test]
    fn full_queues_drop_events() {
        let hub = Arc::new(Hub::default());
        let _sub = hub.connect("alice", [room::user("alice")]);

        for _ in 0..SESSION_QUEUE_CAPACITY {
            assert_eq!(hub.publish(&room::user("alice"), event("x")), 1);
        }
        assert_eq!(hub.publish(&room::user("alice"), event("x")), 0);
        assert_eq!(hub.session_count(), 1);
    }

    #[test]
    fn dropping_subscription_disconnects() {
        let hub = Arc::new(Hub::default());
        let sub = hub.connect("alice", [room::user("alice")]);
        let id = sub.id().to_string();

        assert_eq!(hub.session_owner(&id).as_deref(), Some("alice"));
        drop(sub);
        assert_eq!(hub.session_count(), 0);
        assert_eq!(hub.session_owner(&id), None);
    }

    #[tokio::test]
    async fn stream_yields_published_events() {
        let hub = Arc::new(Hub::default());
        let sub = hub.connect("alice", [room::role(crate::modules::user::repository::Role::Admin)]);

        hub.publish("role:ADMIN", event("hello"));

        let mut stream = Box::pin(sub.into_stream());
        assert_eq!(stream.next().await.unwrap().name, "hello");
        drop(stream);
        assert_eq!(hub.session_count(), 0);
    }
}
