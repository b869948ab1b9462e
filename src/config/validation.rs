//! Configuration validation functions.

use super::Config;
use crate::protocol::MIN_FRAME_LEN;
use std::net::IpAddr;

/// Reject settings the relay cannot run with.
pub fn validate_config(config: &Config) -> anyhow::Result<()> {
    if config.host.trim().parse::<IpAddr>().is_err() {
        anyhow::bail!("host must be an IP address, got '{}'", config.host);
    }

    let relay = &config.relay;
    if relay.max_frame_size < MIN_FRAME_LEN {
        anyhow::bail!(
            "relay.max_frame_size must be at least {MIN_FRAME_LEN} bytes, got {}",
            relay.max_frame_size
        );
    }
    if u32::try_from(relay.max_frame_size).is_err() {
        anyhow::bail!("relay.max_frame_size must fit in a 32-bit length prefix");
    }
    if relay.outbound_queue_capacity == 0 {
        anyhow::bail!("relay.outbound_queue_capacity must be greater than zero");
    }
    if relay.command_queue_capacity == 0 {
        anyhow::bail!("relay.command_queue_capacity must be greater than zero");
    }
    if relay.join_timeout_secs == 0 {
        anyhow::bail!("relay.join_timeout_secs must be greater than zero");
    }

    for room in &relay.default_rooms {
        if room.trim().is_empty() {
            anyhow::bail!("relay.default_rooms must not contain empty names");
        }
        if room.contains(',') {
            anyhow::bail!("relay.default_rooms entry '{room}' must not contain a comma");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn hostname_is_rejected() {
        let config = Config {
            host: "localhost".to_string(),
            ..Config::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn tiny_frame_limit_is_rejected() {
        let mut config = Config::default();
        config.relay.max_frame_size = MIN_FRAME_LEN - 1;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("max_frame_size"));
    }

    #[test]
    fn zero_queue_capacity_is_rejected() {
        let mut config = Config::default();
        config.relay.outbound_queue_capacity = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn room_names_with_commas_are_rejected() {
        let mut config = Config::default();
        config.relay.default_rooms = vec!["a,b".to_string()];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn ephemeral_port_is_allowed() {
        let config = Config {
            port: 0,
            ..Config::default()
        };
        assert!(validate_config(&config).is_ok());
    }
}
