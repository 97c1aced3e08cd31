use std::time::Duration;

use tickwire::SessionConfig;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub tick_rate: u32,
    pub max_peers: usize,
    pub peer_timeout: Duration,
    pub session: SessionConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            max_peers: 32,
            peer_timeout: Duration::from_secs(10),
            session: SessionConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Session settings with the relay's tick rate applied.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            tick_rate: self.tick_rate,
            ..self.session.clone()
        }
    }
}
