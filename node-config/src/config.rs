use crate::env::{EnvSource, ProcessEnv};
use crate::port_map::{PortMap, PortMapError, parse_port_map};
use crate::secret::{Base64JsonDecoder, NodePayload, SecretDecodeError, SecretKeyDecoder};
use std::fmt;
use std::num::ParseIntError;

pub const DEFAULT_NODE_PORT: &str = "3000";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid NODE_PORT {value:?}: {source}")]
    InvalidNodePort {
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("{key} is not valid unicode")]
    NotUnicode { key: String },

    #[error("SECRET_KEY is required")]
    MissingSecretKey,

    #[error("failed to parse SECRET_KEY: {0}")]
    SecretKey(#[source] SecretDecodeError),

    #[error("invalid PORT_MAP: {0}")]
    InvalidPortMap(#[from] PortMapError),
}

/// Node configuration, read once from the environment at start-up.
#[derive(Clone)]
pub struct Config {
    /// Port the node's control API listens on.
    pub node_port: i64,
    /// Raw `SECRET_KEY` as supplied by the panel.
    pub secret_key: String,
    /// Decoded contents of `secret_key`.
    pub node_payload: NodePayload,
    pub disable_hashed_set_check: bool,
    /// Inbound port overrides for nodes behind NAT. `None` when `PORT_MAP`
    /// is not set.
    pub port_map: Option<PortMap>,
}

impl Config {
    /// Loads the configuration from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&ProcessEnv, &Base64JsonDecoder)
    }

    /// Loads the configuration from `env`, decoding `SECRET_KEY` with
    /// `decoder`. Stops at the first invalid variable. Reads the environment
    /// and nothing else.
    pub fn load_from<E, D>(env: &E, decoder: &D) -> Result<Self, ConfigError>
    where
        E: EnvSource + ?Sized,
        D: SecretKeyDecoder + ?Sized,
    {
        let node_port_value = env.get_or("NODE_PORT", DEFAULT_NODE_PORT)?;
        let node_port =
            node_port_value
                .parse::<i64>()
                .map_err(|source| ConfigError::InvalidNodePort {
                    value: node_port_value.clone(),
                    source,
                })?;

        let secret_key = env
            .non_empty("SECRET_KEY")?
            .ok_or(ConfigError::MissingSecretKey)?;
        let node_payload = decoder
            .decode(&secret_key)
            .map_err(ConfigError::SecretKey)?;

        let disable_hashed_set_check = env.get_bool("DISABLE_HASHED_SET_CHECK", false)?;

        let port_map = parse_port_map(&env.var("PORT_MAP")?.unwrap_or_default())?;

        Ok(Config {
            node_port,
            secret_key,
            node_payload,
            disable_hashed_set_check,
            port_map,
        })
    }

    /// The inbound port map, empty when `PORT_MAP` is unset.
    pub fn port_map(&self) -> &PortMap {
        self.port_map.as_ref().unwrap_or(PortMap::empty())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("node_port", &self.node_port)
            .field("secret_key", &"<redacted>")
            .field("node_payload", &self.node_payload)
            .field("disable_hashed_set_check", &self.disable_hashed_set_check)
            .field("port_map", &self.port_map)
            .finish()
    }
}
