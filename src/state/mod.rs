pub mod bonus_wheel;
pub mod connections;
pub mod game;
pub mod lobby;
pub mod player;
pub mod question;
pub mod registry;
pub mod scoring;
pub mod settings;
mod sse;
pub mod state_machine;
pub mod timer;

use std::{sync::Arc, time::Instant};

use crate::{
    config::AppConfig,
    services::question_provider::{OfflineQuestionProvider, QuestionProvider},
};

pub use self::connections::{ConnectionHub, Notifier, PlayerConnection};
pub use self::sse::SseHub;

use self::{player::PlayerRegistry, registry::SessionRegistry};

pub type SharedState = Arc<AppState>;

const LOBBY_FEED_CAPACITY: usize = 32;

/// Central application state: registries, live connections and external collaborators.
pub struct AppState {
    config: Arc<AppConfig>,
    players: PlayerRegistry,
    sessions: SessionRegistry,
    connections: Arc<ConnectionHub>,
    notifier: Arc<dyn Notifier>,
    provider: Arc<dyn QuestionProvider>,
    lobby_feed: SseHub,
    started_at: Instant,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// Questions come from the offline provider.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_provider(config, Arc::new(OfflineQuestionProvider))
    }

    /// Build the state around a specific question provider.
    pub fn with_provider(config: AppConfig, provider: Arc<dyn QuestionProvider>) -> SharedState {
        let connections = Arc::new(ConnectionHub::new());
        Self::build(config, provider, connections.clone(), connections)
    }

    /// Build the state with explicit collaborators; notifications bypass the connection hub.
    pub fn with_components(
        config: AppConfig,
        provider: Arc<dyn QuestionProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> SharedState {
        Self::build(config, provider, Arc::new(ConnectionHub::new()), notifier)
    }

    fn build(
        config: AppConfig,
        provider: Arc<dyn QuestionProvider>,
        connections: Arc<ConnectionHub>,
        notifier: Arc<dyn Notifier>,
    ) -> SharedState {
        Arc::new(Self {
            config: Arc::new(config),
            players: PlayerRegistry::new(),
            sessions: SessionRegistry::new(),
            connections,
            notifier,
            provider,
            lobby_feed: SseHub::new(LOBBY_FEED_CAPACITY),
            started_at: Instant::now(),
        })
    }

    /// Loaded configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Registry of known players.
    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    /// Registry of lobbies and games.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Live websocket connections.
    pub fn connections(&self) -> &ConnectionHub {
        &self.connections
    }

    /// Delivery seam for player notifications.
    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    /// External question generator.
    pub fn provider(&self) -> Arc<dyn QuestionProvider> {
        self.provider.clone()
    }

    /// Broadcast hub behind the public lobby SSE stream.
    pub fn lobby_feed(&self) -> &SseHub {
        &self.lobby_feed
    }

    /// When the state was built.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }
}
