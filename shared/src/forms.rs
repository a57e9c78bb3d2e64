//! Create/edit forms and their client-side checks
//!
//! A form is turned into an API payload only after it passes validation,
//! so an invalid form never reaches the network. Field rules are declared
//! with `validator`; rules spanning several fields are checked by hand in
//! the `into_*` conversions.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use validator::Validate;

use crate::messages::{LoginRequest, NewConnector, NewGroup, NewRoute, NewUser};
use crate::models::{
    BindMode, ConnectorKind, Direction, HttpMethod, HttpSettings, PermissionMap,
    ReconnectPolicy, RouteFilter, RouteStatus, RouteType, SmppSettings,
};

// =============================================================================
// Validation Error
// =============================================================================

/// Field-level validation failures of a form
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[error("{}", summarize(.fields))]
pub struct ValidationError {
    fields: BTreeMap<String, Vec<String>>,
}

fn summarize(fields: &BTreeMap<String, Vec<String>>) -> String {
    fields
        .iter()
        .flat_map(|(field, messages)| messages.iter().map(move |m| format!("{}: {}", field, m)))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut error = Self::new();
        error.add(field, message);
        error
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Messages recorded for a field
    pub fn field(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    fn into_result(self) -> Result<(), ValidationError> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut result = ValidationError::new();
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors.iter() {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Invalid value".to_string());
                result.add(&field.to_string(), message);
            }
        }
        result
    }
}

/// Run the declared field rules
fn check<T: Validate>(form: &T) -> ValidationError {
    match form.validate() {
        Ok(()) => ValidationError::new(),
        Err(errors) => errors.into(),
    }
}

fn validate_cid(cid: &str) -> Result<(), validator::ValidationError> {
    let valid = cid
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        let mut error = validator::ValidationError::new("cid_pattern");
        error.message =
            Some("Connector ID can only contain letters, numbers, underscores and hyphens".into());
        Err(error)
    }
}

fn validate_http_url(url: &str) -> Result<(), validator::ValidationError> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"));
    match rest {
        Some(host) if !host.is_empty() && !host.contains(char::is_whitespace) => Ok(()),
        _ => {
            let mut error = validator::ValidationError::new("http_url");
            error.message = Some("Must be a valid URL starting with http:// or https://".into());
            Err(error)
        }
    }
}

fn non_blank(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Reject whitespace-only values the length rule let through
fn require_text(errors: &mut ValidationError, field: &str, value: &str, message: &str) {
    if !errors.has_field(field) && !non_blank(value) {
        errors.add(field, message);
    }
}

fn optional(value: String) -> Option<String> {
    if non_blank(&value) { Some(value.trim().to_string()) } else { None }
}

// =============================================================================
// Login
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct LoginForm {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

impl LoginForm {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }

    pub fn into_request(self) -> Result<LoginRequest, ValidationError> {
        let mut errors = check(&self);
        if !errors.has_field("username") && !non_blank(&self.username) {
            errors.add("username", "Username is required");
        }
        errors.into_result()?;
        Ok(LoginRequest {
            username: self.username.trim().to_string(),
            password: self.password,
        })
    }
}

// =============================================================================
// Connectors
// =============================================================================

/// SMPP client connector form
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SmppConnectorForm {
    #[validate(
        length(min = 1, message = "Connector ID is required"),
        custom(function = "validate_cid")
    )]
    pub cid: String,
    #[validate(length(min = 1, message = "Host is required"))]
    pub host: String,
    #[validate(range(min = 1, max = 65535, message = "Port must be a number between 1 and 65535"))]
    pub port: u32,
    #[validate(length(min = 1, message = "System ID is required"))]
    pub system_id: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    pub system_type: String,
    pub bind_mode: BindMode,
    pub address_range: String,
    pub use_ssl: bool,
    #[validate(range(min = 1, message = "Connection timeout must be at least 1 second"))]
    pub connection_timeout_secs: u32,
    pub reconnect_on_connection_failure: bool,
    pub reconnect_on_connection_loss: bool,
    #[validate(range(min = 0.0, message = "Reconnect interval cannot be negative"))]
    pub reconnect_interval_secs: f64,
}

impl Default for SmppConnectorForm {
    fn default() -> Self {
        let reconnect = ReconnectPolicy::default();
        Self {
            cid: String::new(),
            host: String::new(),
            port: 2775,
            system_id: String::new(),
            password: String::new(),
            system_type: String::new(),
            bind_mode: BindMode::Transceiver,
            address_range: String::new(),
            use_ssl: false,
            connection_timeout_secs: reconnect.connection_timeout_secs,
            reconnect_on_connection_failure: reconnect.reconnect_on_connection_failure,
            reconnect_on_connection_loss: reconnect.reconnect_on_connection_loss,
            reconnect_interval_secs: reconnect.reconnect_interval_secs,
        }
    }
}

/// HTTP client connector form
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct HttpConnectorForm {
    #[validate(
        length(min = 1, message = "Connector ID is required"),
        custom(function = "validate_cid")
    )]
    pub cid: String,
    #[validate(
        length(min = 1, message = "Base URL is required"),
        custom(function = "validate_http_url")
    )]
    pub base_url: String,
    pub method: HttpMethod,
    #[validate(range(min = 1, message = "Timeout must be at least 1 second"))]
    pub timeout_secs: u32,
    pub use_authentication: bool,
    pub username: String,
    pub password: String,
}

impl Default for HttpConnectorForm {
    fn default() -> Self {
        Self {
            cid: String::new(),
            base_url: String::new(),
            method: HttpMethod::Post,
            timeout_secs: 30,
            use_authentication: false,
            username: String::new(),
            password: String::new(),
        }
    }
}

/// Connector create form, one variant per transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConnectorForm {
    Smpp(SmppConnectorForm),
    Http(HttpConnectorForm),
}

impl ConnectorForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            ConnectorForm::Smpp(form) => {
                let mut errors = check(form);
                require_text(&mut errors, "host", &form.host, "Host is required");
                require_text(&mut errors, "system_id", &form.system_id, "System ID is required");
                errors.into_result()
            }
            ConnectorForm::Http(form) => {
                let mut errors = check(form);
                if form.use_authentication {
                    if !non_blank(&form.username) {
                        errors.add("username", "Username is required when authentication is enabled");
                    }
                    if !non_blank(&form.password) {
                        errors.add("password", "Password is required when authentication is enabled");
                    }
                }
                errors.into_result()
            }
        }
    }

    pub fn into_payload(self) -> Result<NewConnector, ValidationError> {
        self.validate()?;
        let payload = match self {
            ConnectorForm::Smpp(form) => NewConnector {
                cid: form.cid.trim().to_string(),
                kind: ConnectorKind::Smpp(SmppSettings {
                    host: form.host.trim().to_string(),
                    // range-checked above
                    port: form.port as u16,
                    system_id: form.system_id.trim().to_string(),
                    password: Some(form.password),
                    system_type: form.system_type,
                    bind_mode: form.bind_mode,
                    address_range: form.address_range,
                    use_ssl: form.use_ssl,
                }),
                reconnect: ReconnectPolicy {
                    connection_timeout_secs: form.connection_timeout_secs,
                    reconnect_on_connection_failure: form.reconnect_on_connection_failure,
                    reconnect_on_connection_loss: form.reconnect_on_connection_loss,
                    reconnect_interval_secs: form.reconnect_interval_secs,
                },
            },
            ConnectorForm::Http(form) => {
                let (username, password) = if form.use_authentication {
                    (Some(form.username), Some(form.password))
                } else {
                    (None, None)
                };
                NewConnector {
                    cid: form.cid.trim().to_string(),
                    kind: ConnectorKind::Http(HttpSettings {
                        base_url: form.base_url.trim().to_string(),
                        method: form.method,
                        timeout_secs: form.timeout_secs,
                        username,
                        password,
                    }),
                    reconnect: ReconnectPolicy::default(),
                }
            }
        };
        Ok(payload)
    }
}

// =============================================================================
// Routes
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RouteForm {
    pub direction: Direction,
    pub route_type: RouteType,
    #[validate(length(min = 1, message = "Connector is required"))]
    pub connector_id: String,
    pub rate: Option<f64>,
    pub filters: Vec<RouteFilter>,
    pub status: RouteStatus,
}

impl RouteForm {
    pub fn new(direction: Direction, connector_id: impl Into<String>) -> Self {
        Self {
            direction,
            route_type: RouteType::Default,
            connector_id: connector_id.into(),
            rate: None,
            filters: Vec::new(),
            status: RouteStatus::Active,
        }
    }

    pub fn validate_form(&self) -> Result<(), ValidationError> {
        let mut errors = check(self);
        require_text(&mut errors, "connector_id", &self.connector_id, "Connector is required");
        if let Some(rate) = self.rate {
            if !rate.is_finite() || rate < 0.0 {
                errors.add("rate", "Please enter a valid rate");
            }
        }
        if self.filters.iter().any(|f| !non_blank(&f.value)) {
            errors.add("filters", "Filter value is required");
        }
        if self.route_type != RouteType::Default && self.filters.is_empty() {
            errors.add("filters", "At least one filter is required for non-default routes");
        }
        errors.into_result()
    }

    pub fn into_payload(self) -> Result<NewRoute, ValidationError> {
        self.validate_form()?;
        Ok(NewRoute {
            direction: self.direction,
            route_type: self.route_type,
            connector_id: self.connector_id.trim().to_string(),
            rate: self.rate,
            filters: self.filters,
            status: self.status,
        })
    }
}

// =============================================================================
// Users & Groups
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserForm {
    #[validate(length(min = 1, max = 255, message = "Username is required"))]
    pub username: String,
    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Invalid email address")
    )]
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub confirm_password: String,
    pub roles: BTreeSet<String>,
    pub group_ids: BTreeSet<String>,
    pub is_active: bool,
}

impl UserForm {
    pub fn validate_form(&self) -> Result<(), ValidationError> {
        let mut errors = check(self);
        require_text(&mut errors, "username", &self.username, "Username is required");
        if !non_blank(&self.password) {
            errors.add("password", "Password is required");
        }
        if self.password != self.confirm_password {
            errors.add("confirm_password", "Passwords do not match");
        }
        if self.roles.is_empty() {
            errors.add("roles", "At least one role must be selected");
        }
        errors.into_result()
    }

    pub fn into_payload(self) -> Result<NewUser, ValidationError> {
        self.validate_form()?;
        Ok(NewUser {
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
            first_name: optional(self.first_name),
            last_name: optional(self.last_name),
            password: self.password,
            roles: self.roles,
            group_ids: self.group_ids,
            is_active: self.is_active,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GroupForm {
    #[validate(length(min = 1, max = 255, message = "Group name must be between 1-255 characters"))]
    pub name: String,
    pub description: String,
    pub permissions: PermissionMap,
}

impl GroupForm {
    pub fn into_payload(self) -> Result<NewGroup, ValidationError> {
        let mut errors = check(&self);
        if !errors.has_field("name") && !non_blank(&self.name) {
            errors.add("name", "Group name must be between 1-255 characters");
        }
        errors.into_result()?;
        Ok(NewGroup {
            name: self.name.trim().to_string(),
            description: optional(self.description),
            permissions: self.permissions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FilterOperator, FilterType};

    fn valid_smpp() -> SmppConnectorForm {
        SmppConnectorForm {
            cid: "carrier1".to_string(),
            host: "smsc.example.net".to_string(),
            system_id: "smppclient".to_string(),
            password: "password".to_string(),
            ..Default::default()
        }
    }

    fn valid_user() -> UserForm {
        UserForm {
            username: "jdoe".to_string(),
            email: "jdoe@example.com".to_string(),
            password: "hunter22".to_string(),
            confirm_password: "hunter22".to_string(),
            roles: ["user".to_string()].into_iter().collect(),
            is_active: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_smpp_form_defaults() {
        let form = SmppConnectorForm::default();
        assert_eq!(form.port, 2775);
        assert_eq!(form.bind_mode, BindMode::Transceiver);
        assert_eq!(form.connection_timeout_secs, 30);
    }

    #[test]
    fn test_valid_smpp_form_becomes_payload() {
        let payload = ConnectorForm::Smpp(valid_smpp()).into_payload().unwrap();
        assert_eq!(payload.cid, "carrier1");
        match payload.kind {
            ConnectorKind::Smpp(smpp) => {
                assert_eq!(smpp.port, 2775);
                assert_eq!(smpp.password.as_deref(), Some("password"));
            }
            other => panic!("Wrong connector kind: {:?}", other),
        }
    }

    #[test]
    fn test_each_required_smpp_field() {
        let cases: Vec<(&str, fn(&mut SmppConnectorForm))> = vec![
            ("cid", |f: &mut SmppConnectorForm| f.cid.clear()),
            ("host", |f: &mut SmppConnectorForm| f.host.clear()),
            ("system_id", |f: &mut SmppConnectorForm| f.system_id.clear()),
            ("password", |f: &mut SmppConnectorForm| f.password.clear()),
            ("port", |f: &mut SmppConnectorForm| f.port = 0),
            ("port", |f: &mut SmppConnectorForm| f.port = 70000),
            ("cid", |f: &mut SmppConnectorForm| f.cid = "bad cid!".to_string()),
        ];

        for (field, mutate) in cases {
            let mut form = valid_smpp();
            mutate(&mut form);
            let error = ConnectorForm::Smpp(form).into_payload().unwrap_err();
            assert!(error.has_field(field), "expected error on {}: {}", field, error);
        }
    }

    #[test]
    fn test_whitespace_only_required_fields() {
        let mut smpp = valid_smpp();
        smpp.host = "   ".to_string();
        smpp.system_id = "\t".to_string();
        let error = ConnectorForm::Smpp(smpp).into_payload().unwrap_err();
        assert_eq!(error.field("host"), ["Host is required"]);
        assert_eq!(error.field("system_id"), ["System ID is required"]);

        let error = RouteForm::new(Direction::Mt, "   ").into_payload().unwrap_err();
        assert_eq!(error.field("connector_id"), ["Connector is required"]);

        let mut user = valid_user();
        user.username = "   ".to_string();
        let error = user.into_payload().unwrap_err();
        assert_eq!(error.field("username"), ["Username is required"]);
    }

    #[test]
    fn test_smpp_system_id_is_trimmed() {
        let mut form = valid_smpp();
        form.system_id = " smppclient ".to_string();
        match ConnectorForm::Smpp(form).into_payload().unwrap().kind {
            ConnectorKind::Smpp(smpp) => assert_eq!(smpp.system_id, "smppclient"),
            other => panic!("Wrong connector kind: {:?}", other),
        }
    }

    #[test]
    fn test_http_form_requires_credentials_with_auth() {
        let form = HttpConnectorForm {
            cid: "api1".to_string(),
            base_url: "https://hooks.example.com".to_string(),
            use_authentication: true,
            ..Default::default()
        };
        let error = ConnectorForm::Http(form).into_payload().unwrap_err();
        assert!(error.has_field("username"));
        assert!(error.has_field("password"));
    }

    #[test]
    fn test_http_form_rejects_non_http_url() {
        let form = HttpConnectorForm {
            cid: "api1".to_string(),
            base_url: "ftp://hooks.example.com".to_string(),
            ..Default::default()
        };
        let error = ConnectorForm::Http(form).into_payload().unwrap_err();
        assert_eq!(
            error.field("base_url"),
            &["Must be a valid URL starting with http:// or https://".to_string()]
        );
    }

    #[test]
    fn test_http_form_drops_credentials_without_auth() {
        let form = HttpConnectorForm {
            cid: "api1".to_string(),
            base_url: "http://hooks.example.com".to_string(),
            username: "leftover".to_string(),
            ..Default::default()
        };
        match ConnectorForm::Http(form).into_payload().unwrap().kind {
            ConnectorKind::Http(http) => assert!(http.username.is_none()),
            other => panic!("Wrong connector kind: {:?}", other),
        }
    }

    #[test]
    fn test_route_form_rules() {
        assert!(RouteForm::new(Direction::Mt, "carrier1").into_payload().is_ok());

        let error = RouteForm::new(Direction::Mt, "").into_payload().unwrap_err();
        assert!(error.has_field("connector_id"));

        let mut form = RouteForm::new(Direction::Mt, "carrier1");
        form.rate = Some(-0.5);
        assert!(form.into_payload().unwrap_err().has_field("rate"));

        let mut form = RouteForm::new(Direction::Mo, "api1");
        form.route_type = RouteType::Static;
        assert!(form.clone().into_payload().unwrap_err().has_field("filters"));
        form.filters.push(RouteFilter {
            filter_type: FilterType::SourceAddress,
            operator: FilterOperator::Equal,
            value: "12345".to_string(),
        });
        assert!(form.into_payload().is_ok());
    }

    #[test]
    fn test_user_form_rules() {
        assert!(valid_user().into_payload().is_ok());

        let mut form = valid_user();
        form.email = "not-an-email".to_string();
        assert_eq!(form.into_payload().unwrap_err().field("email"), &["Invalid email address".to_string()]);

        let mut form = valid_user();
        form.confirm_password = "other".to_string();
        assert!(form.into_payload().unwrap_err().has_field("confirm_password"));

        let mut form = valid_user();
        form.roles.clear();
        assert!(form.into_payload().unwrap_err().has_field("roles"));

        let mut form = valid_user();
        form.username.clear();
        assert!(form.into_payload().unwrap_err().has_field("username"));
    }

    #[test]
    fn test_login_form_blank_fields() {
        let error = LoginForm::new("   ", "").into_request().unwrap_err();
        assert!(error.has_field("username"));
        assert!(error.has_field("password"));
        assert!(LoginForm::new("admin", "secret").into_request().is_ok());
    }

    #[test]
    fn test_group_form() {
        assert!(GroupForm::default().into_payload().unwrap_err().has_field("name"));
        let payload = GroupForm {
            name: " Operators ".to_string(),
            ..Default::default()
        }
        .into_payload()
        .unwrap();
        assert_eq!(payload.name, "Operators");
        assert!(payload.description.is_none());
    }

    #[test]
    fn test_validation_error_display() {
        let mut error = ValidationError::single("host", "Host is required");
        error.add("port", "Port must be a number between 1 and 65535");
        assert_eq!(
            error.to_string(),
            "host: Host is required, port: Port must be a number between 1 and 65535"
        );
    }
}
