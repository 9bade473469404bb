use once_cell::sync::Lazy;
use std::{env, net::SocketAddr, path::PathBuf};

pub static CONFIG: Lazy<ServerConfig> = Lazy::new(ServerConfig::from_env);

/// Process-level settings of the binary. Engine rules live in `GameConfig`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    /// Players allowed to start, end and advance any game. Empty allows everyone.
    pub venue_admins: Vec<String>,
    pub allowed_origin: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let bind_addr = env::var("MAFIA_BIND_ADDR")
            .ok()
            .and_then(|addr| addr.parse().ok())
            .unwrap_or_else(default_bind_addr);
        let data_dir = env::var("MAFIA_DATA_DIR")
            .ok()
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);
        let venue_admins = env::var("MAFIA_VENUE_ADMINS")
            .map(|ids| parse_ids(&ids))
            .unwrap_or_default();
        let allowed_origin = env::var("MAFIA_ALLOWED_ORIGIN")
            .ok()
            .filter(|origin| !origin.trim().is_empty());

        Self {
            bind_addr,
            data_dir,
            venue_admins,
            allowed_origin,
        }
    }

    pub fn is_admin(&self, player_id: &str) -> bool {
        self.venue_admins.is_empty() || self.venue_admins.iter().any(|id| id == player_id)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            data_dir: None,
            venue_admins: Vec::new(),
            allowed_origin: None,
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn parse_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_ids() {
        assert_eq!(parse_ids(" 1, 2 ,,3"), vec!["1", "2", "3"]);
        assert!(parse_ids("").is_empty());
    }

    #[test]
    fn test_empty_admin_list_allows_everyone() {
        let config = ServerConfig::default();
        assert!(config.is_admin("anyone"));

        let config = ServerConfig {
            venue_admins: vec!["42".to_string()],
            ..ServerConfig::default()
        };
        assert!(config.is_admin("42"));
        assert!(!config.is_admin("7"));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        env::set_var("MAFIA_BIND_ADDR", "0.0.0.0:9090");
        env::set_var("MAFIA_VENUE_ADMINS", "10,20");
        env::set_var("MAFIA_DATA_DIR", "");
        let config = ServerConfig::from_env();
        assert_eq!(config.bind_addr.port(), 9090);
        assert_eq!(config.venue_admins, vec!["10", "20"]);
        assert!(config.data_dir.is_none());

        env::set_var("MAFIA_BIND_ADDR", "not an address");
        assert_eq!(ServerConfig::from_env().bind_addr.to_string(), "127.0.0.1:8080");

        env::remove_var("MAFIA_BIND_ADDR");
        env::remove_var("MAFIA_VENUE_ADMINS");
        env::remove_var("MAFIA_DATA_DIR");
    }
}
