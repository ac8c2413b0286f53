//! TurnCredentialIssuer (C8) — HMAC-SHA1 time-limited TURN credentials,
//! coturn shared-secret style, plus the iceServers list.

use crate::config::TurnConfig;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha1::Sha1;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha1 = Hmac<Sha1>;

#[derive(Debug, Serialize)]
pub struct IceServer {
    pub urls: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TurnCredentials {
    pub ok: bool,
    pub username: String,
    pub credential: String,
    pub ttl: u64,
    #[serde(rename = "iceServers")]
    pub ice_servers: Vec<IceServer>,
}

pub struct TurnCredentialIssuer {
    config: TurnConfig,
}

impl TurnCredentialIssuer {
    pub fn new(config: TurnConfig) -> Self {
        Self { config }
    }

    /// Mints a time-limited credential, or `None` if no shared secret is
    /// configured (callers map that to a 503).
    pub fn issue(&self, requested_ttl: Option<u64>) -> Option<TurnCredentials> {
        let secret = self.config.secret.as_deref()?;
        if secret.is_empty() {
            return None;
        }
        let ttl = requested_ttl.unwrap_or(self.config.ttl_secs).clamp(60, 3600);
        let expires_at = now_secs() + ttl;
        let username = expires_at.to_string();

        let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
        mac.update(username.as_bytes());
        let credential = BASE64.encode(mac.finalize().into_bytes());

        Some(TurnCredentials { ok: true, username, credential, ttl, ice_servers: self.ice_servers() })
    }

    /// iceServers ordering: TURN UDP, TURN TCP, TURN TCP:443 (firewall
    /// piercing), then STUN — a deliberate reliability-first choice.
    fn ice_servers(&self) -> Vec<IceServer> {
        let mut servers = Vec::new();
        if let Some(ref host) = self.config.host {
            let port = self.config.port.unwrap_or(3478);
            servers.push(turn_server(format!("turn:{host}:{port}?transport=udp")));
            if self.config.enable_tcp {
                servers.push(turn_server(format!("turn:{host}:{port}?transport=tcp")));
                servers.push(turn_server(format!("turn:{host}:443?transport=tcp")));
            }
        }
        if let Some(ref stun_host) = self.config.stun_host {
            servers.push(IceServer { urls: format!("stun:{stun_host}"), username: None, credential: None });
        }
        servers.push(IceServer { urls: "stun:stun.l.google.com:19302".to_string(), username: None, credential: None });
        servers
    }
}

fn turn_server(urls: String) -> IceServer {
    IceServer { urls, username: None, credential: None }
}

fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_secret_returns_none() {
        let issuer = TurnCredentialIssuer::new(TurnConfig::default());
        assert!(issuer.issue(None).is_none());
    }

    #[test]
    fn ttl_is_clamped() {
        let issuer = TurnCredentialIssuer::new(TurnConfig { secret: Some("s".into()), ..Default::default() });
        let creds = issuer.issue(Some(10_000)).unwrap();
        assert_eq!(creds.ttl, 3600);
    }

    #[test]
    fn credential_is_deterministic_for_same_username() {
        let issuer = TurnCredentialIssuer::new(TurnConfig { secret: Some("shared".into()), ..Default::default() });
        let mut mac = HmacSha1::new_from_slice(b"shared").unwrap();
        mac.update(b"12345");
        let expected = BASE64.encode(mac.finalize().into_bytes());

        let mut mac2 = HmacSha1::new_from_slice(b"shared").unwrap();
        mac2.update(b"12345");
        let actual = BASE64.encode(mac2.finalize().into_bytes());
        assert_eq!(expected, actual);
    }
}
