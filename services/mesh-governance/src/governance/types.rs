//! Central governance types

use serde::{Deserialize, Serialize};

/// Lake Formation access control mode of a data domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LfAccessControlMode {
    /// Named resource access control: direct grants per table
    Nrac,
    /// Tag based access control: grants through LF tag policies
    Tbac,
}

impl LfAccessControlMode {
    pub const ALL: [LfAccessControlMode; 2] =
        [LfAccessControlMode::Nrac, LfAccessControlMode::Tbac];

    pub fn as_str(&self) -> &'static str {
        match self {
            LfAccessControlMode::Nrac => "nrac",
            LfAccessControlMode::Tbac => "tbac",
        }
    }
}

impl std::fmt::Display for LfAccessControlMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LfAccessControlMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nrac" => Ok(LfAccessControlMode::Nrac),
            "tbac" => Ok(LfAccessControlMode::Tbac),
            other => Err(format!("Unknown access control mode: {}", other)),
        }
    }
}

/// Modes a data domain is registered with. No selection means both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessModes {
    NameBased,
    TagBased,
    Both,
}

impl AccessModes {
    pub fn from_selection(mode: Option<LfAccessControlMode>) -> Self {
        match mode {
            Some(LfAccessControlMode::Nrac) => AccessModes::NameBased,
            Some(LfAccessControlMode::Tbac) => AccessModes::TagBased,
            None => AccessModes::Both,
        }
    }

    /// Selected modes, name based first
    pub fn modes(&self) -> &'static [LfAccessControlMode] {
        match self {
            AccessModes::NameBased => &[LfAccessControlMode::Nrac],
            AccessModes::TagBased => &[LfAccessControlMode::Tbac],
            AccessModes::Both => &[LfAccessControlMode::Nrac, LfAccessControlMode::Tbac],
        }
    }

    pub fn includes_tag_based(&self) -> bool {
        matches!(self, AccessModes::TagBased | AccessModes::Both)
    }
}

/// LF tag declared in the central governance account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LfTag {
    pub key: String,
    pub values: Vec<String>,
}

impl LfTag {
    pub fn new<I, S>(key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Properties of the central governance registrar
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CentralGovernanceProps {
    /// LF tags shared with every tag based data domain
    #[serde(default)]
    pub lf_tags: Vec<LfTag>,
}

/// A data domain account to register
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataDomain {
    /// Construct id prefixing every resource declared for the domain
    pub id: String,
    /// Account id of the data domain
    pub account_id: String,
    /// Display name, e.g. the line of business
    pub name: String,
    /// Complete ARN of the domain configuration secret
    pub secret_arn: String,
    /// Access control mode; both modes when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lf_access_mode: Option<LfAccessControlMode>,
}

/// A table a producer asks the workflow to register
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub location: String,
}

/// Execution input of the registration state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub producer_acc_id: String,
    pub tables: Vec<TableDescriptor>,
    pub lf_access_mode: LfAccessControlMode,
}

impl RegistrationRequest {
    pub fn new(producer_acc_id: impl Into<String>, lf_access_mode: LfAccessControlMode) -> Self {
        Self {
            producer_acc_id: producer_acc_id.into(),
            tables: Vec::new(),
            lf_access_mode,
        }
    }

    pub fn table(mut self, name: impl Into<String>, location: impl Into<String>) -> Self {
        self.tables.push(TableDescriptor {
            name: name.into(),
            location: location.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mode_display_and_parse() {
        assert_eq!(LfAccessControlMode::Nrac.to_string(), "nrac");
        assert_eq!("TBAC".parse::<LfAccessControlMode>(), Ok(LfAccessControlMode::Tbac));
        assert!("abac".parse::<LfAccessControlMode>().is_err());
    }

    #[test]
    fn test_access_mode_selection() {
        assert_eq!(
            AccessModes::from_selection(None).modes(),
            &[LfAccessControlMode::Nrac, LfAccessControlMode::Tbac]
        );
        assert_eq!(
            AccessModes::from_selection(Some(LfAccessControlMode::Tbac)).modes(),
            &[LfAccessControlMode::Tbac]
        );
        assert!(!AccessModes::NameBased.includes_tag_based());
        assert!(AccessModes::Both.includes_tag_based());
    }

    #[test]
    fn test_registration_request_contract() {
        let request = RegistrationRequest::new("111111111111", LfAccessControlMode::Nrac)
            .table("orders", "s3://clean-1-us-east-1/data-products/orders");

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "producer_acc_id": "111111111111",
                "tables": [{
                    "name": "orders",
                    "location": "s3://clean-1-us-east-1/data-products/orders"
                }],
                "lf_access_mode": "nrac"
            })
        );
    }

    #[test]
    fn test_data_domain_defaults_to_both_modes() {
        let domain: DataDomain = serde_json::from_value(json!({
            "id": "Domain1",
            "account_id": "111111111111",
            "name": "Sales",
            "secret_arn": "arn:aws:secretsmanager:us-east-1:111111111111:secret:cfg-AbCdEf"
        }))
        .unwrap();
        assert_eq!(domain.lf_access_mode, None);
    }
}
