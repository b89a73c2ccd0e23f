use crate::handshake::{AuthParams, ClientInfo, ConnectParams, ROLE_CONTROL};
use crate::{ModelError, PROTOCOL_VERSION};

/// Builder for validated handshake parameters.
///
/// Protocol defaults to [`PROTOCOL_VERSION`] and role to `control`; the
/// client identity is required.
#[derive(Debug, Default)]
pub struct ConnectParamsBuilder {
    protocol: Option<u32>,
    client_name: Option<String>,
    client_version: Option<String>,
    role: Option<String>,
    token: Option<String>,
}

impl ConnectParamsBuilder {
    pub fn with_protocol(mut self, protocol: u32) -> Self {
        self.protocol = Some(protocol);
        self
    }

    pub fn with_client(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self.client_version = Some(version.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Empty tokens are treated as absent.
    pub fn with_token(mut self, token: Option<&str>) -> Self {
        self.token = token.filter(|t| !t.is_empty()).map(str::to_string);
        self
    }

    /// Build the params with validation.
    #[track_caller]
    pub fn build(self) -> Result<ConnectParams, ModelError> {
        let protocol = self.protocol.unwrap_or(PROTOCOL_VERSION);
        if protocol == 0 {
            return Err(ModelError::validation("Protocol version must be non-zero"));
        }

        let name = self
            .client_name
            .ok_or_else(|| ModelError::validation("Client name is required"))?;
        if name.trim().is_empty() {
            return Err(ModelError::validation("Client name cannot be empty"));
        }

        let version = self
            .client_version
            .ok_or_else(|| ModelError::validation("Client version is required"))?;
        if version.trim().is_empty() {
            return Err(ModelError::validation("Client version cannot be empty"));
        }

        let role = self.role.unwrap_or_else(|| ROLE_CONTROL.to_string());
        if role.is_empty() {
            return Err(ModelError::validation("Role cannot be empty"));
        }

        Ok(ConnectParams {
            protocol,
            client: ClientInfo { name, version },
            role,
            auth: self.token.map(|token| AuthParams { token }),
        })
    }
}
