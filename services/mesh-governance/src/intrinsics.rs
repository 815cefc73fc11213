//! CloudFormation intrinsic functions and pseudo parameters

use serde_json::{json, Value};

pub const ACCOUNT_ID: &str = "AWS::AccountId";
pub const REGION: &str = "AWS::Region";
pub const PARTITION: &str = "AWS::Partition";

/// `{"Ref": name}`
pub fn reference(name: &str) -> Value {
    json!({ "Ref": name })
}

/// `{"Fn::GetAtt": [logical_id, attribute]}`
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// `{"Fn::Sub": template}`
pub fn sub(template: impl Into<String>) -> Value {
    json!({ "Fn::Sub": template.into() })
}

pub fn account_id() -> Value {
    reference(ACCOUNT_ID)
}

pub fn region() -> Value {
    reference(REGION)
}
