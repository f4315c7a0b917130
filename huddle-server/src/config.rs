use huddle_core::IceServerConfig;

/// Public STUN used when a deployment configures nothing else.
pub const DEFAULT_STUN_SERVERS: &[&str] = &[
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Pushed to every client in the connect greeting.
    pub ice_servers: Vec<IceServerConfig>,
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn default_ice_servers() -> Vec<IceServerConfig> {
        vec![IceServerConfig::urls(
            DEFAULT_STUN_SERVERS.iter().map(|s| (*s).to_owned()).collect(),
        )]
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_owned(),
            port: 3000,
            ice_servers: Self::default_ice_servers(),
        }
    }
}
