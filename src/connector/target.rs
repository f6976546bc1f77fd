use serde::Serialize;

/// Service provider identifier of this client, used for recipes it runs on its own behalf.
pub const CLIENT_SERVICE_PROVIDER: &str = "8e5cdaae";

/// What the orchestrator should deliver to the card.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Target {
    /// A service published by an application.
    #[serde(rename_all = "camelCase")]
    Service { app_id: String, service_id: String },
    /// An ad-hoc recipe run on behalf of a service provider. The recipe is
    /// forwarded without being looked at.
    #[serde(rename_all = "camelCase")]
    Recipe {
        service_provider_id: String,
        recipe: serde_json::Value,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("Invalid service reference {0:?}, expected <appId>/<serviceId>")]
    InvalidService(String),

    #[error("Application ID must be 4 bytes (8 hex characters): {0:?}")]
    InvalidAppId(String),
}

impl Target {
    pub fn service(app_id: impl Into<String>, service_id: impl Into<String>) -> Self {
        Target::Service {
            app_id: app_id.into(),
            service_id: service_id.into(),
        }
    }

    pub fn recipe(service_provider_id: impl Into<String>, recipe: serde_json::Value) -> Self {
        Target::Recipe {
            service_provider_id: service_provider_id.into(),
            recipe,
        }
    }

    /// Parses `<appId>/<serviceId>`, normalising the application ID to lower case.
    pub fn parse_service(reference: &str) -> Result<Self, TargetError> {
        let Some((app_id, service_id)) = reference.split_once('/') else {
            return Err(TargetError::InvalidService(reference.to_string()));
        };
        if service_id.is_empty() || service_id.contains('/') {
            return Err(TargetError::InvalidService(reference.to_string()));
        }
        if app_id.len() != 8 || !app_id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TargetError::InvalidAppId(app_id.to_string()));
        }
        Ok(Target::service(app_id.to_ascii_lowercase(), service_id))
    }

    /// The identifier the orchestrator bills the delivery to.
    pub fn owner(&self) -> &str {
        match self {
            Target::Service { app_id, .. } => app_id,
            Target::Recipe {
                service_provider_id,
                ..
            } => service_provider_id,
        }
    }
}
