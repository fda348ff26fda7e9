//! Application configuration.
//!
//! Shape preserved so existing host configuration files stay valid:
//! serialized with `serde_json` the same way structure snapshots are
//! (`src/snapshot.rs`), not redesigned for this crate's convenience.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfiguration {
    pub application_name: String,
    pub application_uri: String,
    pub security: SecurityConfiguration,
    pub client: ClientConfiguration,
    pub transport_quotas: TransportQuotas,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfiguration {
    pub application_certificate_path: PathBuf,
    pub trusted_store_path: PathBuf,
    pub rejected_store_path: PathBuf,
    pub issuer_store_path: PathBuf,
    pub auto_accept_untrusted: bool,
    pub min_certificate_key_size: u32,
    pub reject_sha1_signed_certificates: bool,
    /// When `false`, `connect` skips host-name validation of the server
    /// certificate; host-name-invalid errors are fatal only when this is
    /// `true`.
    pub skip_domain_validation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfiguration {
    #[serde(with = "duration_millis")]
    pub session_timeout: Duration,
    pub discovery_urls: Vec<String>,
    pub max_browse_continuation_points: u32,
    #[serde(with = "duration_millis")]
    pub operation_timeout: Duration,
    pub max_pool_size: usize,
    #[serde(with = "duration_millis")]
    pub keep_alive_interval: Duration,
    #[serde(with = "duration_millis")]
    pub reconnect_period: Duration,
    pub reconnect_exponential_backoff: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportQuotas {
    pub max_message_size: u32,
    pub max_buffer_size: u32,
    #[serde(with = "duration_millis")]
    pub channel_lifetime: Duration,
    #[serde(with = "duration_millis")]
    pub security_token_lifetime: Duration,
}

impl Default for ApplicationConfiguration {
    fn default() -> Self {
        Self {
            application_name: "s7-opcua-client".to_string(),
            application_uri: "urn:s7-opcua-client".to_string(),
            security: SecurityConfiguration {
                application_certificate_path: PathBuf::from("certs/client.der"),
                trusted_store_path: PathBuf::from("certs/trusted"),
                rejected_store_path: PathBuf::from("certs/rejected"),
                issuer_store_path: PathBuf::from("certs/issuers"),
                auto_accept_untrusted: false,
                min_certificate_key_size: 2048,
                reject_sha1_signed_certificates: true,
                skip_domain_validation: false,
            },
            client: ClientConfiguration {
                session_timeout: Duration::from_secs(60),
                discovery_urls: Vec::new(),
                max_browse_continuation_points: 0,
                operation_timeout: Duration::from_secs(10),
                max_pool_size: 4,
                keep_alive_interval: Duration::from_secs(5),
                reconnect_period: Duration::from_secs(2),
                reconnect_exponential_backoff: true,
            },
            transport_quotas: TransportQuotas {
                max_message_size: 4 * 1024 * 1024,
                max_buffer_size: 64 * 1024,
                channel_lifetime: Duration::from_secs(300),
                security_token_lifetime: Duration::from_secs(3600),
            },
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (d.as_millis() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_json() {
        let cfg = ApplicationConfiguration::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ApplicationConfiguration = serde_json::from_str(&json).unwrap();
        assert_eq!(back.client.max_pool_size, cfg.client.max_pool_size);
        assert_eq!(back.security.skip_domain_validation, false);
    }
}
