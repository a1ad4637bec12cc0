use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::sleep;
use uuid::Uuid;

use protocol::Transport;

/// How often `pop_free` re-checks for an available handle while it's
/// cooperatively blocked (§4.5: "re-check at >= 1s").
pub const POP_FREE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Broker-side record of one registered game-server session (§3). Handlers
/// hold only this (via its `room_id`), never a back-pointer into the
/// registry — the registry stays the sole authority over pool membership
/// (§9 "Cyclic references").
#[derive(Debug)]
pub struct SessionHandle {
    pub room_id: Uuid,
    pub control_channel: Arc<Transport>,
    pub listen_address: SocketAddr,
}

impl SessionHandle {
    pub fn new(control_channel: Arc<Transport>, listen_address: SocketAddr) -> Arc<Self> {
        Arc::new(SessionHandle {
            room_id: Uuid::new_v4(),
            control_channel,
            listen_address,
        })
    }
}

#[derive(Default)]
struct State {
    all: HashMap<Uuid, Arc<SessionHandle>>,
    free_any: HashSet<Uuid>,
    free_multi: HashSet<Uuid>,
    waiting_by_username: HashMap<String, Uuid>,
}

/// The chatroom repository (C5): four named pools over session handles,
/// mutated only by the game-server handler (C6) and the client handler
/// (C7) (§5 "Shared resources").
#[derive(Default)]
pub struct Registry {
    state: Mutex<State>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Insert `handle` into `all` and `free_any`.
    pub async fn register(&self, handle: Arc<SessionHandle>) {
        let mut state = self.state.lock().await;
        state.free_any.insert(handle.room_id);
        state.all.insert(handle.room_id, handle);
    }

    /// Remove `handle` from `all`, `free_any`, `free_multi`, and any
    /// `waiting_by_username` entry referencing it.
    pub async fn unregister(&self, handle: &Arc<SessionHandle>) {
        let mut state = self.state.lock().await;
        state.all.remove(&handle.room_id);
        state.free_any.remove(&handle.room_id);
        state.free_multi.remove(&handle.room_id);
        state.waiting_by_username.retain(|_, id| *id != handle.room_id);
    }

    pub async fn to_free_any(&self, handle: &Arc<SessionHandle>) {
        let mut state = self.state.lock().await;
        state.free_multi.remove(&handle.room_id);
        state.waiting_by_username.retain(|_, id| *id != handle.room_id);
        state.free_any.insert(handle.room_id);
    }

    pub async fn to_free_multi(&self, handle: &Arc<SessionHandle>) {
        let mut state = self.state.lock().await;
        state.free_any.remove(&handle.room_id);
        state.waiting_by_username.retain(|_, id| *id != handle.room_id);
        state.free_multi.insert(handle.room_id);
    }

    /// Move `handle` exclusively into `waiting_by_username[username]`. A
    /// handle previously waiting under that username is displaced back
    /// into `free_any` (§4.5).
    pub async fn to_waiting(&self, username: &str, handle: &Arc<SessionHandle>) {
        let mut state = self.state.lock().await;
        state.free_any.remove(&handle.room_id);
        state.free_multi.remove(&handle.room_id);
        let displaced = state
            .waiting_by_username
            .insert(username.to_string(), handle.room_id);
        if let Some(displaced_id) = displaced {
            if displaced_id != handle.room_id {
                state.free_any.insert(displaced_id);
            }
        }
    }

    /// Remove and return `waiting_by_username[username]` if present.
    pub async fn pop_waiting(&self, username: &str) -> Option<Arc<SessionHandle>> {
        let mut state = self.state.lock().await;
        let id = state.waiting_by_username.remove(username)?;
        state.all.get(&id).cloned()
    }

    /// If `single` or `free_multi` is empty, remove and return any element
    /// of `free_any`; otherwise remove and return any element of
    /// `free_multi`. Cooperatively blocks, re-checking at
    /// [`POP_FREE_POLL_INTERVAL`], until a handle is available. Fairness
    /// across waiters is explicitly unspecified (§5).
    pub async fn pop_free(&self, single: bool) -> Arc<SessionHandle> {
        loop {
            {
                let mut state = self.state.lock().await;
                let use_multi = !single && !state.free_multi.is_empty();
                let set = if use_multi {
                    &mut state.free_multi
                } else {
                    &mut state.free_any
                };
                if let Some(&id) = set.iter().next() {
                    set.remove(&id);
                    if let Some(handle) = state.all.get(&id).cloned() {
                        return handle;
                    }
                    continue;
                }
            }
            sleep(POP_FREE_POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn transport_pair() -> (Arc<Transport>, Arc<Transport>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            Transport::new(stream)
        });
        let client = Transport::connect(addr).await.unwrap();
        let server = server.await.unwrap();
        (Arc::new(client), Arc::new(server))
    }

    async fn dummy_handle() -> Arc<SessionHandle> {
        let (_keepalive, transport) = transport_pair().await;
        SessionHandle::new(transport, "127.0.0.1:1".parse().unwrap())
    }

    #[tokio::test]
    async fn register_inserts_into_all_and_free_any() {
        let registry = Registry::new();
        let handle = dummy_handle().await;
        registry.register(handle.clone()).await;

        assert!(registry.pop_waiting("nobody").await.is_none());
        let popped = registry.pop_free(true).await;
        assert_eq!(popped.room_id, handle.room_id);
    }

    #[tokio::test]
    async fn to_waiting_displaces_previous_entry_back_to_free_any() {
        let registry = Registry::new();
        let first = dummy_handle().await;
        let second = dummy_handle().await;

        registry.to_waiting("alice", &first).await;
        registry.to_waiting("alice", &second).await;

        let popped_waiting = registry.pop_waiting("alice").await.unwrap();
        assert_eq!(popped_waiting.room_id, second.room_id);

        let popped_free = registry.pop_free(true).await;
        assert_eq!(popped_free.room_id, first.room_id);
    }

    #[tokio::test]
    async fn unregister_removes_handle_from_every_pool() {
        let registry = Registry::new();
        let handle = dummy_handle().await;
        registry.register(handle.clone()).await;
        registry.to_waiting("bob", &handle).await;
        registry.unregister(&handle).await;

        assert!(registry.pop_waiting("bob").await.is_none());
    }

    #[tokio::test]
    async fn pop_free_prefers_free_multi_unless_single_requested() {
        let registry = Registry::new();
        let multi_handle = dummy_handle().await;
        registry.to_free_multi(&multi_handle).await;

        let any_handle = dummy_handle().await;
        registry.register(any_handle.clone()).await;

        let popped = registry.pop_free(false).await;
        assert_eq!(popped.room_id, multi_handle.room_id);

        let popped_single = registry.pop_free(true).await;
        assert_eq!(popped_single.room_id, any_handle.room_id);
    }

    #[tokio::test(start_paused = true)]
    async fn pop_free_blocks_until_a_handle_is_registered() {
        let registry = Arc::new(Registry::new());
        let registry_for_task = registry.clone();
        let popper = tokio::spawn(async move { registry_for_task.pop_free(true).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        let handle = dummy_handle().await;
        registry.register(handle.clone()).await;

        let popped = tokio::time::timeout(Duration::from_secs(5), popper)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(popped.room_id, handle.room_id);
    }
}
