//! Deterministic connection identity and compose project naming
//!
//! Connection IDs key the pool: the same (team, server, service) triple must
//! always map to the same ID so every caller converges on one cached client.
//! Compose project names scope a service's containers, networks, and volumes
//! on a shared host; they carry a short hash suffix so two services with the
//! same display name never collide.

use sha2::{Digest, Sha256};

use crate::types::ConnectionId;

/// Length of the hex digest kept for a connection ID
const CONNECTION_ID_LEN: usize = 16;

/// Length of the hex suffix appended to project names
const PROJECT_SUFFIX_LEN: usize = 8;

/// Derive the connection ID for a (team, server, service) triple.
///
/// Stable across processes and hosts; any caller holding the same triple
/// resolves the same pooled client.
pub fn connection_id(team_id: &str, server_id: &str, service_id: &str) -> ConnectionId {
    let digest = Sha256::digest(format!("{team_id}/{server_id}/{service_id}"));
    let hex = hex::encode(digest);
    ConnectionId::new(&hex[..CONNECTION_ID_LEN])
}

/// Derive the compose project name for a service.
///
/// Docker compose project names must be lowercase alphanumeric with dashes
/// and must not start with a dash. The display name is slugified and a short
/// hash of the service ID is appended for uniqueness.
pub fn project_name(service_name: &str, service_id: &str) -> String {
    let slug = slugify(service_name);
    let digest = Sha256::digest(service_id.as_bytes());
    let suffix = &hex::encode(digest)[..PROJECT_SUFFIX_LEN];
    if slug.is_empty() {
        format!("svc-{suffix}")
    } else {
        format!("{slug}-{suffix}")
    }
}

/// Lowercase, map runs of non-alphanumerics to single dashes, trim dashes
fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_is_deterministic() {
        let a = connection_id("team-1", "srv-1", "svc-1");
        let b = connection_id("team-1", "srv-1", "svc-1");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 16);
    }

    #[test]
    fn test_connection_id_differs_per_triple() {
        let a = connection_id("team-1", "srv-1", "svc-1");
        let b = connection_id("team-1", "srv-1", "svc-2");
        let c = connection_id("team-2", "srv-1", "svc-1");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_project_name_is_slugged_and_suffixed() {
        let name = project_name("My Web App", "svc-42");
        assert!(name.starts_with("my-web-app-"), "{name}");
        assert_eq!(name.len(), "my-web-app-".len() + 8);
        assert!(name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    }

    #[test]
    fn test_project_name_deterministic() {
        assert_eq!(project_name("api", "svc-1"), project_name("api", "svc-1"));
        assert_ne!(project_name("api", "svc-1"), project_name("api", "svc-2"));
    }

    #[test]
    fn test_project_name_for_unfriendly_display_names() {
        let name = project_name("  Prod // DB!!  ", "svc-9");
        assert!(name.starts_with("prod-db-"), "{name}");

        let name = project_name("___", "svc-9");
        assert!(name.starts_with("svc-"), "{name}");
    }
}
