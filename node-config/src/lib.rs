//! Node configuration read from environment variables.
//!
//! | Variable                   | Default | Notes                                  |
//! |----------------------------|---------|----------------------------------------|
//! | `NODE_PORT`                | `3000`  | control API port                       |
//! | `SECRET_KEY`               |         | required, base64 JSON from the panel   |
//! | `DISABLE_HASHED_SET_CHECK` | `false` | only `true` and `1` enable it          |
//! | `PORT_MAP`                 |         | `original:mapped[,original:mapped]*`   |

pub mod config;
pub mod env;
pub mod port_map;
pub mod secret;

pub use config::{Config, ConfigError};
pub use env::{EnvSource, ProcessEnv};
pub use port_map::{PortMap, PortMapError, parse_port_map};
pub use secret::{Base64JsonDecoder, NodePayload, SecretDecodeError, SecretKeyDecoder};
