//! Compose definition parsing and validation
//!
//! The orchestrator never interprets a compose file beyond checking that it
//! is something `docker compose` will accept: valid YAML, at least one
//! service, and every service buildable or pullable. The raw YAML is what
//! actually travels to the remote host.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_yaml::Value;
use sv_core::error::OrchestrationError;

/// Root of a compose definition, parsed for validation only
#[derive(Debug, Clone, Deserialize)]
pub struct ComposeFile {
    /// Legacy version marker, ignored by modern compose but still common
    #[serde(default)]
    pub version: Option<String>,

    /// Services keyed by name
    #[serde(default)]
    pub services: BTreeMap<String, ComposeService>,

    /// Named volumes
    #[serde(default)]
    pub volumes: BTreeMap<String, Value>,

    /// Networks
    #[serde(default)]
    pub networks: BTreeMap<String, Value>,
}

/// One service entry
///
/// Only the fields validation looks at are modeled; everything else is
/// collected untyped so unknown compose features pass through untouched.
#[derive(Debug, Clone, Deserialize)]
pub struct ComposeService {
    /// Image to pull
    #[serde(default)]
    pub image: Option<String>,

    /// Build context, either a string or a mapping
    #[serde(default)]
    pub build: Option<Value>,

    #[serde(flatten)]
    pub rest: BTreeMap<String, Value>,
}

impl ComposeFile {
    /// Parse and validate a compose definition.
    ///
    /// Fails before any remote call when the YAML is malformed, declares no
    /// services, or has a service with neither an image nor a build
    /// context.
    pub fn parse(yaml: &str) -> Result<Self, OrchestrationError> {
        let compose: ComposeFile = serde_yaml::from_str(yaml)
            .map_err(|e| OrchestrationError::ComposeInvalid(e.to_string()))?;
        compose.validate()?;
        Ok(compose)
    }

    fn validate(&self) -> Result<(), OrchestrationError> {
        if self.services.is_empty() {
            return Err(OrchestrationError::ComposeInvalid(
                "no services defined".to_string(),
            ));
        }
        for (name, service) in &self.services {
            if service.image.is_none() && service.build.is_none() {
                return Err(OrchestrationError::ComposeInvalid(format!(
                    "service '{name}' has neither an image nor a build context"
                )));
            }
        }
        Ok(())
    }

    /// Names of the declared services
    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_compose() {
        let compose = ComposeFile::parse(
            r#"
services:
  web:
    image: nginx:1.25
    ports:
      - "8080:80"
"#,
        )
        .unwrap();
        assert_eq!(compose.service_names().collect::<Vec<_>>(), vec!["web"]);
        assert_eq!(
            compose.services["web"].image.as_deref(),
            Some("nginx:1.25")
        );
    }

    #[test]
    fn test_parse_build_only_service() {
        let compose = ComposeFile::parse(
            r#"
services:
  app:
    build:
      context: .
      dockerfile: Dockerfile
"#,
        )
        .unwrap();
        assert!(compose.services["app"].build.is_some());
    }

    #[test]
    fn test_version_and_extra_fields_pass_through() {
        let compose = ComposeFile::parse(
            r#"
version: "3.8"
services:
  db:
    image: postgres:16
    environment:
      POSTGRES_PASSWORD: secret
    volumes:
      - data:/var/lib/postgresql/data
volumes:
  data: {}
"#,
        )
        .unwrap();
        assert_eq!(compose.version.as_deref(), Some("3.8"));
        assert!(compose.services["db"].rest.contains_key("environment"));
        assert!(compose.volumes.contains_key("data"));
    }

    #[test]
    fn test_rejects_empty_services() {
        let err = ComposeFile::parse("services: {}\n").unwrap_err();
        assert!(matches!(err, OrchestrationError::ComposeInvalid(_)));
        assert!(err.to_string().contains("no services"));
    }

    #[test]
    fn test_rejects_service_without_image_or_build() {
        let err = ComposeFile::parse(
            r#"
services:
  web:
    ports:
      - "8080:80"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("web"));
    }

    #[test]
    fn test_rejects_malformed_yaml() {
        let err = ComposeFile::parse("services: [not: {a map").unwrap_err();
        assert!(matches!(err, OrchestrationError::ComposeInvalid(_)));
    }
}
