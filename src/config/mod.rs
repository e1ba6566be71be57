//! Broker configuration.
//!
//! Every deployment-generation difference between upstream installations
//! (endpoint paths, query-key casing, single vs dual token login) is a setting
//! here rather than a constant in the client code. Account credentials have no
//! defaults and must come from the file or the environment.

use serde::Deserialize;
use std::time::Duration;

use crate::error::{BrokerError, Result};

/// Complete broker configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrokerConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub fms: FmsConfig,
    #[serde(default)]
    pub tms: TmsConfig,
}

/// Command endpoint listener
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// Outbound HTTP settings shared by both upstream clients
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Per-call timeout (seconds). The upstreams give no budget of their own.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    20
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// How the FMS login response hands out tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenMode {
    /// One session token, sent as `fms-token`.
    Single,
    /// Session token plus a longer-lived authorization token, sent as
    /// `fms-token` and `authorization`.
    Dual,
}

/// Order-management service (JSON endpoints)
#[derive(Debug, Clone, Deserialize)]
pub struct FmsConfig {
    #[serde(default = "default_fms_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_fms_login_path")]
    pub login_path: String,
    #[serde(default = "default_fms_bill_to_path")]
    pub bill_to_path: String,
    /// Query key for the bill-to code. Older deployments use `code`.
    #[serde(default = "default_fms_bill_to_query_key")]
    pub bill_to_query_key: String,
    #[serde(default = "default_fms_orders_path")]
    pub orders_path: String,
    /// Prefix the order number is appended to. Older deployments use `/files/`.
    #[serde(default = "default_fms_files_path")]
    pub files_path: String,
    #[serde(default = "default_fms_company_id")]
    pub company_id: String,
    #[serde(default = "default_fms_client_id")]
    pub client_id: String,
    #[serde(default = "default_fms_token_mode")]
    pub token_mode: TokenMode,
    /// Kept below the server-side session lifetime (60 minutes).
    #[serde(default = "default_fms_ttl_secs")]
    pub ttl_secs: u64,
    /// Status codes treated as "active" when filtering orders by bill-to.
    #[serde(default = "default_fms_active_status_codes")]
    pub active_status_codes: Vec<String>,
}

fn default_fms_base_url() -> String {
    "https://fms.item.com".to_string()
}

fn default_fms_login_path() -> String {
    "/fms-platform-user/Auth/Login".to_string()
}

fn default_fms_bill_to_path() -> String {
    "/fms-platform-order/shipment-orders/search-business-client".to_string()
}

fn default_fms_bill_to_query_key() -> String {
    "Code".to_string()
}

fn default_fms_orders_path() -> String {
    "/fms-platform-order/shipment-orders/query".to_string()
}

fn default_fms_files_path() -> String {
    "/fms-platform-order/shipper/order-file/".to_string()
}

fn default_fms_company_id() -> String {
    "SBFH".to_string()
}

fn default_fms_client_id() -> String {
    "FMS_WEB".to_string()
}

fn default_fms_token_mode() -> TokenMode {
    TokenMode::Single
}

fn default_fms_ttl_secs() -> u64 {
    55 * 60
}

fn default_fms_active_status_codes() -> Vec<String> {
    ["10", "20", "30", "40", "50"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for FmsConfig {
    fn default() -> Self {
        Self {
            base_url: default_fms_base_url(),
            account: None,
            password: None,
            login_path: default_fms_login_path(),
            bill_to_path: default_fms_bill_to_path(),
            bill_to_query_key: default_fms_bill_to_query_key(),
            orders_path: default_fms_orders_path(),
            files_path: default_fms_files_path(),
            company_id: default_fms_company_id(),
            client_id: default_fms_client_id(),
            token_mode: default_fms_token_mode(),
            ttl_secs: default_fms_ttl_secs(),
            active_status_codes: default_fms_active_status_codes(),
        }
    }
}

impl FmsConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Returns `(account, password)` or a configuration error if either is unset.
    pub fn login_credentials(&self) -> Result<(&str, &str)> {
        required(&self.account, "FMS_USER")
            .and_then(|account| Ok((account, required(&self.password, "FMS_PASS")?)))
    }
}

/// Tracking service (form-encoded PHP endpoints)
#[derive(Debug, Clone, Deserialize)]
pub struct TmsConfig {
    #[serde(default = "default_tms_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Base64-encode the configured password before login. Leave off when the
    /// configured value is already encoded.
    #[serde(default)]
    pub encode_password: bool,
    #[serde(default = "default_tms_login_path")]
    pub login_path: String,
    #[serde(default = "default_tms_group_path")]
    pub group_path: String,
    #[serde(default = "default_tms_trace_path")]
    pub trace_path: String,
    /// Operational group every fresh session is switched into.
    #[serde(default = "default_tms_group_id")]
    pub group_id: String,
    #[serde(default = "default_tms_login_page")]
    pub login_page: String,
    #[serde(default = "default_tms_group_page")]
    pub group_page: String,
    #[serde(default = "default_tms_trace_page")]
    pub trace_page: String,
    #[serde(default = "default_tms_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_tms_trace_rows")]
    pub trace_rows: u32,
    /// Complete default trace form, sent in this order on every trace.
    #[serde(default = "default_tms_trace_fields")]
    pub trace_fields: Vec<TraceField>,
    /// Trace field that carries the bill-to filter.
    #[serde(default = "default_tms_bill_to_field")]
    pub bill_to_field: String,
    /// Trace field that carries newline-separated PRO numbers.
    #[serde(default = "default_tms_pro_field")]
    pub pro_field: String,
}

/// One named field of the trace form with its default value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TraceField {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

fn default_tms_base_url() -> String {
    "https://tms.freightapp.com".to_string()
}

fn default_tms_login_path() -> String {
    "/write/check_login.php".to_string()
}

fn default_tms_group_path() -> String {
    "/write_new/write_change_user_group.php".to_string()
}

fn default_tms_trace_path() -> String {
    "/write_new/get_tms_trace.php".to_string()
}

fn default_tms_group_id() -> String {
    "28".to_string()
}

fn default_tms_login_page() -> String {
    "/index.html".to_string()
}

fn default_tms_group_page() -> String {
    "dashboard".to_string()
}

fn default_tms_trace_page() -> String {
    "/dev.html".to_string()
}

fn default_tms_ttl_secs() -> u64 {
    20 * 60
}

fn default_tms_trace_rows() -> u32 {
    5000
}

/// The full trace filter form with its default values, in wire order.
pub const DEFAULT_TRACE_FIELDS: &[(&str, &str)] = &[
    ("input_filter_tracking_num", ""),
    ("input_filter_pro", ""),
    ("input_filter_bol", ""),
    ("input_filter_po", ""),
    ("input_filter_pu", ""),
    ("input_filter_ref", ""),
    ("input_filter_invoice", ""),
    ("input_filter_trip", ""),
    ("input_filter_manifest", ""),
    ("input_filter_billto", ""),
    ("input_filter_customer", ""),
    ("input_filter_shipper", ""),
    ("input_filter_shipper_city", ""),
    ("input_filter_shipper_state", ""),
    ("input_filter_shipper_zip", ""),
    ("input_filter_consignee", ""),
    ("input_filter_consignee_city", ""),
    ("input_filter_consignee_state", ""),
    ("input_filter_consignee_zip", ""),
    ("input_filter_origin_terminal", ""),
    ("input_filter_dest_terminal", ""),
    ("input_filter_current_terminal", ""),
    ("input_filter_carrier", ""),
    ("input_filter_driver", ""),
    ("input_filter_truck", ""),
    ("input_filter_trailer", ""),
    ("input_filter_service_level", ""),
    ("input_filter_order_type", ""),
    ("input_filter_status", ""),
    ("input_filter_sub_status", ""),
    ("input_filter_exception", ""),
    ("input_filter_created_from", ""),
    ("input_filter_created_to", ""),
    ("input_filter_pickup_from", ""),
    ("input_filter_pickup_to", ""),
    ("input_filter_delivery_from", ""),
    ("input_filter_delivery_to", ""),
    ("input_filter_appt_from", ""),
    ("input_filter_appt_to", ""),
    ("input_filter_eta_from", ""),
    ("input_filter_eta_to", ""),
    ("input_filter_invoice_from", ""),
    ("input_filter_invoice_to", ""),
    ("input_filter_sales_rep", ""),
    ("input_filter_dispatcher", ""),
    ("input_filter_group", ""),
    ("input_filter_company", ""),
    ("input_filter_hazmat", "0"),
    ("input_filter_hold", "0"),
    ("input_filter_cod", "0"),
    ("input_filter_appointment_required", "0"),
    ("input_filter_liftgate", "0"),
    ("input_filter_inside_delivery", "0"),
    ("input_filter_residential", "0"),
    ("input_filter_pod_missing", "0"),
    ("input_filter_cancelled", "0"),
    ("input_filter_closed", "0"),
    ("input_filter_date_type", ""),
    ("sort", ""),
    ("order", ""),
];

fn default_tms_trace_fields() -> Vec<TraceField> {
    DEFAULT_TRACE_FIELDS
        .iter()
        .map(|(name, value)| TraceField {
            name: name.to_string(),
            value: value.to_string(),
        })
        .collect()
}

fn default_tms_bill_to_field() -> String {
    "input_filter_billto".to_string()
}

fn default_tms_pro_field() -> String {
    "input_filter_pro".to_string()
}

impl Default for TmsConfig {
    fn default() -> Self {
        Self {
            base_url: default_tms_base_url(),
            username: None,
            password: None,
            encode_password: false,
            login_path: default_tms_login_path(),
            group_path: default_tms_group_path(),
            trace_path: default_tms_trace_path(),
            group_id: default_tms_group_id(),
            login_page: default_tms_login_page(),
            group_page: default_tms_group_page(),
            trace_page: default_tms_trace_page(),
            ttl_secs: default_tms_ttl_secs(),
            trace_rows: default_tms_trace_rows(),
            trace_fields: default_tms_trace_fields(),
            bill_to_field: default_tms_bill_to_field(),
            pro_field: default_tms_pro_field(),
        }
    }
}

impl TmsConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Returns `(username, password)` or a configuration error if either is unset.
    pub fn login_credentials(&self) -> Result<(&str, &str)> {
        required(&self.username, "TMS_USER")
            .and_then(|username| Ok((username, required(&self.password, "TMS_PASS")?)))
    }

    /// Rejects an overridden trace form that is empty or has blank names.
    pub fn validate_trace_form(&self) -> Result<()> {
        if self.trace_fields.is_empty() {
            return Err(BrokerError::Configuration(
                "tms.trace_fields must not be empty".to_string(),
            ));
        }
        let blank = self.trace_fields.iter().any(|f| f.name.trim().is_empty())
            || self.bill_to_field.trim().is_empty()
            || self.pro_field.trim().is_empty();
        if blank {
            return Err(BrokerError::Configuration(
                "tms trace field names must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(BrokerError::Configuration(format!("{} is not set", name))),
    }
}

impl BrokerConfig {
    /// Build from `BROKER_CONFIG` (if set) and env vars.
    pub fn from_env() -> Result<Self> {
        let mut cfg = match std::env::var("BROKER_CONFIG") {
            Ok(path) => load_config(&path)?,
            Err(_) => Self::default(),
        };
        cfg.apply_env();
        Ok(cfg)
    }

    /// Overlay env vars on top of whatever was loaded.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("FMS_USER") {
            self.fms.account = Some(v);
        }
        if let Ok(v) = std::env::var("FMS_PASS") {
            self.fms.password = Some(v);
        }
        if let Ok(v) = std::env::var("FMS_BASE_URL") {
            self.fms.base_url = v;
        }
        if let Ok(v) = std::env::var("TMS_USER") {
            self.tms.username = Some(v);
        }
        if let Ok(v) = std::env::var("TMS_PASS") {
            self.tms.password = Some(v);
        }
        if let Ok(v) = std::env::var("TMS_BASE_URL") {
            self.tms.base_url = v;
        }
        if let Ok(v) = std::env::var("BROKER_BIND") {
            self.server.bind = v;
        }
        if let Ok(v) = std::env::var("BROKER_PORT") {
            if let Ok(port) = v.parse::<u16>() {
                self.server.port = port;
            }
        }
    }

    /// Fails fast when either service is missing its account settings.
    pub fn validate(&self) -> Result<()> {
        self.fms.login_credentials()?;
        self.tms.login_credentials()?;
        self.tms.validate_trace_form()?;
        Ok(())
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<BrokerConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        BrokerError::Configuration(format!("failed to read {}: {}", path, e))
    })?;
    toml::from_str(&contents)
        .map_err(|e| BrokerError::Configuration(format!("failed to parse {}: {}", path, e)))
}
