//! Data product registration workflow
//!
//! For each table of a registration request:
//! 1. create the table in the domain's central database (an existing table
//!    is accepted as already registered)
//! 2. in NRAC mode, grant ALL (grantable) on the table to the producer account
//!
//! Then one `createResourceLinks` event is sent to the producer's bus.
//!
//! The definition is meant for `Fn::Sub`: `${AWS::Partition}`,
//! `${AWS::AccountId}` and the central bus ARN placeholder are left for the
//! deployment engine.

use serde_json::json;

use super::{
    ChoiceState, MapState, PassState, ResultPath, State, TaskState, WorkflowError, WorkflowGraph,
};
use crate::governance::naming::{
    DOMAIN_DATABASE_PREFIX, EVENT_SOURCE, RESOURCE_LINKS_SUFFIX, TABLE_EXISTS_ERROR,
};
use crate::governance::types::LfAccessControlMode;

pub const FOR_EACH_TABLE: &str = "forEachTable";
pub const CREATE_TABLE: &str = "createTable";
pub const IS_MODE_NRAC: &str = "isModeNRAC";
pub const GRANT_TABLE_PERMISSIONS: &str = "grantTablePermissionsToProducer";
pub const PASS_TABLE_NAME: &str = "Pass";
pub const TRIGGER_RESOURCE_LINKS: &str = "triggerCreateResourceLinks";

fn sdk_integration(service_action: &str) -> String {
    format!("arn:${{AWS::Partition}}:states:::aws-sdk:{}", service_action)
}

/// `States.Format` expression of the central database name for the current item
fn central_database_expr() -> String {
    format!(
        "States.Format('{{}}-{}-{{}}', $.lf_access_mode, $.producer_acc_id)",
        DOMAIN_DATABASE_PREFIX
    )
}

/// Build the registration graph. `central_bus_arn` is substituted at deploy time.
pub fn registration_workflow(central_bus_arn: &str) -> Result<WorkflowGraph, WorkflowError> {
    let mut iterator = WorkflowGraph::new(CREATE_TABLE);

    iterator.add_state(
        CREATE_TABLE,
        State::Task(
            TaskState::new(sdk_integration("glue:createTable"))
                .parameters(json!({
                    "DatabaseName.$": central_database_expr(),
                    "TableInput": {
                        "Name.$": "$.tables.name",
                        "Owner.$": "$.producer_acc_id",
                        "StorageDescriptor": {
                            "Location.$": "$.tables.location"
                        }
                    }
                }))
                .result_path(ResultPath::Discard)
                .catch(
                    &[TABLE_EXISTS_ERROR],
                    ResultPath::Path("$.CreateTableException".to_string()),
                    IS_MODE_NRAC,
                )
                .next(IS_MODE_NRAC),
        ),
    )?;

    iterator.add_state(
        IS_MODE_NRAC,
        State::Choice(
            ChoiceState::new()
                .when_string_equals(
                    "$.lf_access_mode",
                    LfAccessControlMode::Nrac.as_str(),
                    GRANT_TABLE_PERMISSIONS,
                )
                .otherwise(PASS_TABLE_NAME),
        ),
    )?;

    iterator.add_state(
        GRANT_TABLE_PERMISSIONS,
        State::Task(
            TaskState::new(sdk_integration("lakeformation:grantPermissions"))
                .parameters(json!({
                    "Permissions": ["ALL"],
                    "PermissionsWithGrantOption": ["ALL"],
                    "Principal": {
                        "DataLakePrincipalIdentifier.$": "$.producer_acc_id"
                    },
                    "Resource": {
                        "Table": {
                            "DatabaseName.$": central_database_expr(),
                            "Name.$": "$.tables.name"
                        }
                    }
                }))
                .result_path(ResultPath::Discard)
                .output_path("$.tables.name")
                .end(),
        ),
    )?;

    iterator.add_state(
        PASS_TABLE_NAME,
        State::Pass(PassState {
            result_path: Some(ResultPath::Discard),
            output_path: Some("$.tables.name".to_string()),
            next: None,
            end: Some(true),
        }),
    )?;

    let mut graph = WorkflowGraph::new(FOR_EACH_TABLE)
        .with_comment("Register data products of a data domain in the central catalog");

    graph.add_state(
        FOR_EACH_TABLE,
        State::Map(MapState {
            items_path: "$.tables".to_string(),
            parameters: Some(json!({
                "producer_acc_id.$": "$.producer_acc_id",
                "tables.$": "$$.Map.Item.Value",
                "lf_access_mode.$": "$.lf_access_mode"
            })),
            iterator: Box::new(iterator),
            result_selector: Some(json!({ "flatten.$": "$[*]" })),
            result_path: Some(ResultPath::Path("$.map_result".to_string())),
            max_concurrency: None,
            next: Some(TRIGGER_RESOURCE_LINKS.to_string()),
            end: None,
        }),
    )?;

    graph.add_state(
        TRIGGER_RESOURCE_LINKS,
        State::Task(
            TaskState::new("arn:${AWS::Partition}:states:::events:putEvents")
                .parameters(json!({
                    "Entries": [{
                        "Detail": {
                            "central_database_name.$": format!(
                                "States.Format('{{}}-{{}}-{{}}', $.lf_access_mode, '{}', $.producer_acc_id)",
                                DOMAIN_DATABASE_PREFIX
                            ),
                            "central_account_id": "${AWS::AccountId}",
                            "producer_acc_id.$": "$.producer_acc_id",
                            "database_name.$": format!(
                                "States.Format('{{}}-{{}}', $.lf_access_mode, '{}')",
                                DOMAIN_DATABASE_PREFIX
                            ),
                            "table_names.$": "$.map_result.flatten",
                            "lf_access_mode.$": "$.lf_access_mode"
                        },
                        "DetailType.$": format!(
                            "States.Format('{{}}{}', $.producer_acc_id)",
                            RESOURCE_LINKS_SUFFIX
                        ),
                        "EventBusName": central_bus_arn,
                        "Source": EVENT_SOURCE
                    }]
                }))
                .end(),
        ),
    )?;

    graph.validate()?;
    Ok(graph)
}
