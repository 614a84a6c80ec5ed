//! One connection per discovered instance, each with its own state cache.
//!
//! Library callbacks are synchronous, so listeners only forward a
//! [`Command`] to the main loop, which owns the sessions and does the
//! async sends.

use bleatkan_core::message::{create_thumbnail_state_mini, list_state_mini, peek_state_mini};
use bleatkan_core::{
    Connection, ConnectionError, ConnectionListener, Instance, InstanceId, InstancesListener,
    InstancesManager, ResultMessage, ResultPayload, VeadoConnectionData,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// Work for the main loop.
#[derive(Debug)]
pub enum Command {
    Start(Instance),
    Change(Instance),
    End(InstanceId),
    Connected(InstanceId),
    Thumbnails(InstanceId, Vec<String>),
    Failed(InstanceId),
}

/// Forwards discovery events to the main loop.
pub struct DiscoveryForwarder {
    commands: UnboundedSender<Command>,
}

impl DiscoveryForwarder {
    pub fn new(commands: UnboundedSender<Command>) -> Self {
        Self { commands }
    }
}

impl InstancesListener for DiscoveryForwarder {
    fn on_instance_start(&self, instance: &Instance) {
        let _ = self.commands.send(Command::Start(instance.clone()));
    }

    fn on_instance_change(&self, new: &Instance, old: &Instance) {
        debug!("Replacing connection to {} with {}", old.server(), new.server());
        let _ = self.commands.send(Command::Change(new.clone()));
    }

    fn on_instance_end(&self, id: &InstanceId) {
        let _ = self.commands.send(Command::End(id.clone()));
    }
}

/// Connection listener for one instance. Owns that connection's cache.
pub struct SessionListener {
    id: InstanceId,
    data: Mutex<VeadoConnectionData>,
    commands: UnboundedSender<Command>,
}

impl SessionListener {
    pub fn new(id: InstanceId, commands: UnboundedSender<Command>) -> Self {
        Self {
            id,
            data: Mutex::new(VeadoConnectionData::default()),
            commands,
        }
    }

    /// Bind the cache to the connection this listener was registered with.
    pub fn attach(&self, connection: &Arc<Connection>) {
        *self.data.lock().unwrap_or_else(PoisonError::into_inner) = VeadoConnectionData::new(connection);
    }

    pub fn with_data<R>(&self, f: impl FnOnce(&mut VeadoConnectionData) -> R) -> R {
        f(&mut self.data.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl ConnectionListener for SessionListener {
    fn on_connection_error(&self, connection: &Connection, error: ConnectionError) {
        match error {
            ConnectionError::None => debug!("Connection to {} failed", connection.instance()),
            ConnectionError::ExceededRetries => {
                warn!("Giving up on {}: {}", connection.instance(), error);
                let _ = self.commands.send(Command::Failed(self.id.clone()));
            }
            other => warn!("Connection to {} failed: {}", connection.instance(), other),
        }
    }

    fn on_connection_change(&self, connection: &Connection, active: bool) {
        debug!("{} active: {}", connection.instance().id(), active);
        if active {
            let _ = self.commands.send(Command::Connected(self.id.clone()));
        }
    }

    fn on_connection_receive(&self, _connection: &Connection, message: ResultMessage) {
        if let Some(states) = self.with_data(|data| apply_message(data, &message)) {
            let _ = self.commands.send(Command::Thumbnails(self.id.clone(), states));
        }
    }
}

/// Fold a received message into the cache. Returns the state ids when a
/// state list arrived, so their thumbnails can be requested.
pub fn apply_message(data: &mut VeadoConnectionData, message: &ResultMessage) -> Option<Vec<String>> {
    match message.payload() {
        Some(ResultPayload::StateList(list)) => {
            data.update_states(list);
            let names: Vec<&str> = list.states.iter().map(|s| s.name.as_str()).collect();
            info!("{} states: {}", names.len(), names.join(", "));
            Some(list.states.iter().map(|s| s.id.clone()).collect())
        }
        Some(ResultPayload::State(peek)) => {
            if data.update_current_state(peek) {
                let name = data
                    .current_state()
                    .and_then(|s| s.name())
                    .unwrap_or_else(|| peek.state.clone());
                info!("Current state: {}", name);
            }
            None
        }
        Some(ResultPayload::Png(png)) => {
            if data.update_state_thumbnail(png, false) {
                debug!("Thumbnail for state {} ({}x{})", png.state, png.width, png.height);
            }
            None
        }
        None => {
            if let ResultMessage::WithEntryList(list) = message {
                debug!("{} entries on channel {}", list.entries.len(), list.channel);
            }
            None
        }
    }
}

struct Session {
    connection: Arc<Connection>,
    listener: Arc<SessionListener>,
}

/// Sessions keyed by instance.
pub struct Monitor {
    sessions: HashMap<InstanceId, Session>,
    commands: UnboundedSender<Command>,
    peek: bool,
}

impl Monitor {
    pub fn new(commands: UnboundedSender<Command>, peek: bool) -> Self {
        Self {
            sessions: HashMap::new(),
            commands,
            peek,
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn handle(&mut self, command: Command, manager: &InstancesManager) {
        match command {
            Command::Start(instance) | Command::Change(instance) => {
                self.remove(instance.id());
                self.open(&instance);
            }
            Command::End(id) => self.remove(&id),
            Command::Connected(id) => self.request_states(&id),
            Command::Thumbnails(id, states) => self.request_thumbnails(&id, states),
            Command::Failed(id) => {
                manager.mark_instance_failed(&id);
            }
        }
    }

    fn open(&mut self, instance: &Instance) {
        let listener = Arc::new(SessionListener::new(instance.id().clone(), self.commands.clone()));
        match instance.connect(listener.clone()) {
            Ok(connection) => {
                listener.attach(&connection);
                self.sessions
                    .insert(instance.id().clone(), Session { connection, listener });
            }
            Err(e) => warn!("Could not connect to {}: {}", instance, e),
        }
    }

    fn remove(&mut self, id: &InstanceId) {
        if let Some(session) = self.sessions.remove(id) {
            let stats = session.listener.with_data(|data| data.stats());
            debug!("Closing connection to {} ({:?})", id, stats);
            session.connection.close();
        }
    }

    fn live_connection(&self, id: &InstanceId) -> Option<Arc<Connection>> {
        self.sessions
            .get(id)
            .map(|s| Arc::clone(&s.connection))
            .filter(|c| c.is_active())
    }

    fn request_states(&self, id: &InstanceId) {
        let Some(connection) = self.live_connection(id) else {
            return;
        };
        let peek = self.peek;
        tokio::spawn(async move {
            if let Err(e) = connection.send_nodes(list_state_mini()).await {
                warn!("State list request failed: {}", e);
                return;
            }
            if peek {
                if let Err(e) = connection.send_nodes(peek_state_mini()).await {
                    warn!("Peek request failed: {}", e);
                }
            }
        });
    }

    fn request_thumbnails(&self, id: &InstanceId, states: Vec<String>) {
        let Some(connection) = self.live_connection(id) else {
            return;
        };
        tokio::spawn(async move {
            for state in states {
                let result = match create_thumbnail_state_mini(&state) {
                    Ok(request) => connection.send_nodes(&request).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = result {
                    warn!("Thumbnail request for state {} failed: {}", state, e);
                }
            }
        });
    }

    /// Close every session.
    pub fn close_all(&mut self) {
        let ids: Vec<InstanceId> = self.sessions.keys().cloned().collect();
        for id in ids {
            self.remove(&id);
        }
        Connection::close_all();
    }
}
