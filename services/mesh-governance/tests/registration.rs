//! Data domain registration against a complete governance template

use mesh_governance::governance::naming;
use mesh_governance::governance::onboarding::{declare_tag_sharing, DomainDatabase};
use mesh_governance::governance::DeclaredTag;
use mesh_governance::template::resources::{EventBusProps, LfTagProps};
use mesh_governance::template::{ResourceKind, TemplateError};
use mesh_governance::workflow::registration::{
    CREATE_TABLE, GRANT_TABLE_PERMISSIONS, IS_MODE_NRAC, PASS_TABLE_NAME,
};
use mesh_governance::workflow::State;
use mesh_governance::{
    CentralGovernance, CentralGovernanceProps, GovernanceError, LfAccessControlMode, LfTag,
    Template,
};
use mesh_secrets::{DomainReferences, StaticSecrets};
use serde_json::{json, Value};

const DOMAIN: &str = "111111111111";
const SECRET_ARN: &str =
    "arn:aws:secretsmanager:us-east-1:111111111111:secret:domain-config-AbCdEf";
const OTHER_DOMAIN: &str = "333333333333";
const OTHER_SECRET_ARN: &str =
    "arn:aws:secretsmanager:us-east-1:333333333333:secret:domain-config-GhIjKl";

const PRINCIPAL_PERMISSIONS: &str = "AWS::LakeFormation::PrincipalPermissions";

fn secrets() -> StaticSecrets {
    StaticSecrets::new()
        .with_references(
            SECRET_ARN,
            &DomainReferences::new("clean-222222222222-us-east-1", "data-products", "alias/key1"),
        )
        .with_references(
            OTHER_SECRET_ARN,
            &DomainReferences::new("clean-333333333333-us-east-1", "products", "1234abcd"),
        )
}

fn governance_in(template: Template, tags: Vec<LfTag>) -> CentralGovernance {
    CentralGovernance::new(
        template,
        CentralGovernanceProps { lf_tags: tags },
        Box::new(secrets()),
    )
    .unwrap()
}

fn governance(tags: Vec<LfTag>) -> CentralGovernance {
    governance_in(Template::new(), tags)
}

fn resource(doc: &Value, logical_id: &str) -> Value {
    let value = doc["Resources"][logical_id].clone();
    assert!(value.is_object(), "missing resource {}", logical_id);
    value
}

fn tag_policy_grants(doc: &Value) -> Vec<Value> {
    doc["Resources"]
        .as_object()
        .unwrap()
        .values()
        .filter(|r| r["Type"] == PRINCIPAL_PERMISSIONS)
        .filter(|r| r["Properties"]["Resource"]["LFTagPolicy"].is_object())
        .cloned()
        .collect()
}

#[test]
fn end_to_end_sales_domain() {
    let mut gov = governance(vec![LfTag::new("tag1", ["LfTagValue1", "LfTagValue2"])]);
    gov.register_data_domain("Domain1", DOMAIN, "Sales", SECRET_ARN, None)
        .unwrap();
    let doc = gov.template().render().unwrap();

    let nrac = resource(&doc, "Domain1DataDomainDatabasenrac");
    let tbac = resource(&doc, "Domain1DataDomainDatabasetbac");
    assert_eq!(nrac["Properties"]["DatabaseInput"]["Name"], "nrac-data-domain-111111111111");
    assert_eq!(tbac["Properties"]["DatabaseInput"]["Name"], "tbac-data-domain-111111111111");
    for db in [&nrac, &tbac] {
        assert_eq!(
            db["Properties"]["DatabaseInput"]["LocationUri"],
            "s3://clean-222222222222-us-east-1/data-products"
        );
        assert_eq!(db["DependsOn"], json!(["LfAdmins"]));
    }

    let location = resource(&doc, "Domain1LFLocationResource");
    assert_eq!(
        location["Properties"]["ResourceArn"],
        json!({"Fn::Sub": "arn:${AWS::Partition}:s3:::clean-222222222222-us-east-1/data-products"})
    );
    assert_eq!(location["Properties"]["UseServiceLinkedRole"], false);

    let data_access = resource(&doc, "Domain1LFLocationDataAccessPolicy");
    let key_statement = &data_access["Properties"]["PolicyDocument"]["Statement"][1];
    assert_eq!(
        key_statement["Resource"],
        json!([{"Fn::Sub": "arn:${AWS::Partition}:kms:${AWS::Region}:111111111111:alias/key1"}])
    );

    let bus_policy = resource(&doc, "Domain1Policy");
    assert_eq!(
        bus_policy["Properties"]["StatementId"],
        "AllowDataDomainAccToPutEvents_111111111111"
    );
    assert_eq!(bus_policy["Properties"]["Principal"], DOMAIN);

    let rule = resource(&doc, "Domain1Rule");
    assert_eq!(
        rule["Properties"]["EventPattern"]["detail-type"],
        json!(["111111111111_createResourceLinks"])
    );
    assert_eq!(rule["DeletionPolicy"], "Delete");

    let central_grant = resource(&doc, "Domain1GrantDataDomainTagtag1");
    assert_eq!(
        central_grant["Properties"]["Resource"]["LFTag"]["TagValues"],
        json!(["LfTagValue1", "LfTagValue2"])
    );
    assert_eq!(central_grant["DependsOn"], json!(["CentralLfTagtag1"]));
}

#[test]
fn name_based_domain_has_no_tag_sharing() {
    let mut gov = governance(vec![LfTag::new("tag1", ["a"])]);
    let reg = gov
        .register_data_domain(
            "Domain1",
            DOMAIN,
            "Sales",
            SECRET_ARN,
            Some(LfAccessControlMode::Nrac),
        )
        .unwrap()
        .clone();

    assert!(reg.tag_sharing.is_none());
    assert_eq!(reg.databases.len(), 1);
    assert!(reg.database(LfAccessControlMode::Tbac).is_none());

    let doc = gov.template().render().unwrap();
    assert!(tag_policy_grants(&doc).is_empty());
    assert!(doc["Resources"].get("Domain1DataDomainDatabasetbac").is_none());
    assert!(doc["Resources"].get("DataDomainLfTag").is_none());
    assert!(gov.domain_tag().is_none());
    assert!(doc["Resources"].get("Domain1GrantDataDomainTagtag1").is_none());

    // Each table branch grants at most once, and only on the nrac path
    let workflow = gov.workflow();
    assert_eq!(
        workflow.tasks_calling("lakeformation:grantPermissions"),
        vec![GRANT_TABLE_PERMISSIONS]
    );
    let choice = workflow
        .all_states()
        .into_iter()
        .find(|(name, _)| *name == IS_MODE_NRAC)
        .map(|(_, state)| state.clone())
        .unwrap();
    match choice {
        State::Choice(choice) => {
            assert_eq!(choice.choices.len(), 1);
            assert_eq!(choice.choices[0].string_equals, "nrac");
            assert_eq!(choice.choices[0].next, GRANT_TABLE_PERMISSIONS);
            assert_eq!(choice.default.as_deref(), Some(PASS_TABLE_NAME));
        }
        other => panic!("unexpected state {:?}", other),
    }
}

#[test]
fn tag_based_domain_shares_one_tag() {
    let mut gov = governance(vec![]);
    let reg = gov
        .register_data_domain(
            "Domain1",
            DOMAIN,
            "Sales",
            SECRET_ARN,
            Some(LfAccessControlMode::Tbac),
        )
        .unwrap()
        .clone();

    let sharing = reg.tag_sharing.as_ref().unwrap();
    assert!(sharing.central_tag_grants.is_empty());

    let template = gov.template();
    assert_eq!(template.resources_of_type("AWS::LakeFormation::Tag").count(), 1);
    assert_eq!(template.resources_of_type("AWS::LakeFormation::TagAssociation").count(), 1);
    assert_eq!(template.resources_of_type("AWS::Glue::Database").count(), 1);
    assert_eq!(gov.domain_tag(), Some(sharing.tag));

    let doc = template.render().unwrap();
    let grants = tag_policy_grants(&doc);
    assert_eq!(grants.len(), 2);
    for grant in &grants {
        assert_eq!(grant["DependsOn"], json!(["DataDomainLfTag"]));
        assert_eq!(
            grant["Properties"]["Resource"]["LFTagPolicy"]["Expression"],
            json!([{"TagKey": "LoB", "TagValues": ["Sales"]}])
        );
    }

    let tag = resource(&doc, "DataDomainLfTag");
    assert_eq!(tag["Properties"]["TagKey"], naming::DOMAIN_TAG_KEY);
    assert_eq!(tag["DependsOn"], json!(["Domain1DataDomainDatabasetbac"]));

    let association = resource(&doc, "Domain1DbTagAssoc");
    assert_eq!(
        association["Properties"]["Resource"]["Database"]["Name"],
        "tbac-data-domain-111111111111"
    );
    assert_eq!(
        association["DependsOn"],
        json!(["Domain1DataDomainDatabasetbac", "DataDomainLfTag"])
    );
}

#[test]
fn tag_based_domains_extend_the_shared_tag() {
    let mut gov = governance(vec![LfTag::new("tag1", ["a"])]);
    let first = gov
        .register_data_domain("D1", DOMAIN, "Sales", SECRET_ARN, Some(LfAccessControlMode::Tbac))
        .unwrap()
        .clone();
    let second = gov
        .register_data_domain(
            "D2",
            OTHER_DOMAIN,
            "Marketing",
            OTHER_SECRET_ARN,
            Some(LfAccessControlMode::Tbac),
        )
        .unwrap()
        .clone();

    let shared = first.tag_sharing.as_ref().unwrap().tag;
    assert_eq!(second.tag_sharing.as_ref().unwrap().tag, shared);

    let doc = gov.template().render().unwrap();
    let domain_tags: Vec<&Value> = doc["Resources"]
        .as_object()
        .unwrap()
        .values()
        .filter(|r| r["Type"] == "AWS::LakeFormation::Tag")
        .filter(|r| r["Properties"]["TagKey"] == naming::DOMAIN_TAG_KEY)
        .collect();
    assert_eq!(domain_tags.len(), 1);
    assert_eq!(
        domain_tags[0]["Properties"]["TagValues"],
        json!(["Sales", "Marketing"])
    );

    let association = resource(&doc, "D2DbTagAssoc");
    assert_eq!(
        association["DependsOn"],
        json!(["DataDomainLfTag", "D2DataDomainDatabasetbac"])
    );
    assert_eq!(
        association["Properties"]["LFTags"],
        json!([{
            "CatalogId": {"Ref": "AWS::AccountId"},
            "TagKey": "LoB",
            "TagValues": ["Marketing"]
        }])
    );
    assert_eq!(resource(&doc, "D2LFPolicyTable")["DependsOn"], json!(["DataDomainLfTag"]));
}

#[test]
fn tag_value_cannot_be_shared_by_two_domains() {
    let mut gov = governance(vec![]);
    gov.register_data_domain("D1", DOMAIN, "Sales", SECRET_ARN, None)
        .unwrap();

    let result = gov.register_data_domain(
        "D2",
        OTHER_DOMAIN,
        "Sales",
        OTHER_SECRET_ARN,
        Some(LfAccessControlMode::Tbac),
    );
    assert!(matches!(result, Err(GovernanceError::InvalidDomain { .. })));

    // Name based domains do not carry the tag
    gov.register_data_domain(
        "D2",
        OTHER_DOMAIN,
        "Sales",
        OTHER_SECRET_ARN,
        Some(LfAccessControlMode::Nrac),
    )
    .unwrap();
}

#[test]
fn failed_tag_based_registration_keeps_tag_values() {
    let mut template = Template::new();
    template
        .declare(
            "D2Rule",
            ResourceKind::EventBus(EventBusProps {
                name: "taken".to_string(),
            }),
        )
        .unwrap();

    let mut gov = governance_in(template, vec![]);
    gov.register_data_domain("D1", DOMAIN, "Sales", SECRET_ARN, Some(LfAccessControlMode::Tbac))
        .unwrap();
    let result = gov.register_data_domain(
        "D2",
        OTHER_DOMAIN,
        "Marketing",
        OTHER_SECRET_ARN,
        Some(LfAccessControlMode::Tbac),
    );
    assert!(result.is_err());

    let tag = gov.domain_tag().unwrap();
    let props = gov.template().resource(tag).unwrap().kind.properties().unwrap();
    assert_eq!(props["TagValues"], json!(["Sales"]));
}

#[test]
fn both_modes_when_unset() {
    let mut gov = governance(vec![]);
    let reg = gov
        .register_data_domain("Domain1", DOMAIN, "Sales", SECRET_ARN, None)
        .unwrap()
        .clone();

    assert_eq!(reg.databases.len(), 2);
    assert!(reg.tag_sharing.is_some());

    let doc = gov.template().render().unwrap();
    for mode in ["nrac", "tbac"] {
        let grant = resource(&doc, &format!("Domain1WorkflowRoleDbAccess{}", mode));
        assert_eq!(grant["Properties"]["Permissions"], json!(["ALL"]));
        assert_eq!(
            grant["Properties"]["Principal"]["DataLakePrincipalIdentifier"],
            json!({"Fn::GetAtt": ["WorkflowRole", "Arn"]})
        );
        assert_eq!(
            grant["DependsOn"],
            json!([format!("Domain1DataDomainDatabase{}", mode)])
        );
    }
    assert_eq!(tag_policy_grants(&doc).len(), 2);
}

#[test]
fn central_tags_must_exist_before_sharing() {
    let mut gov = governance(vec![]);
    let reg = gov
        .register_data_domain(
            "Domain1",
            DOMAIN,
            "Sales",
            SECRET_ARN,
            Some(LfAccessControlMode::Tbac),
        )
        .unwrap()
        .clone();
    let tbac: DomainDatabase = reg.database(LfAccessControlMode::Tbac).unwrap().clone();

    // A tag declared in another template is not visible to this one
    let mut foreign = Template::new();
    let foreign_tag = foreign
        .declare(
            "CentralLfTagtag9",
            ResourceKind::LfTag(LfTagProps {
                catalog_id: json!("111111111111"),
                tag_key: "tag9".to_string(),
                tag_values: vec!["v".to_string()],
            }),
        )
        .unwrap();
    let tags = vec![DeclaredTag {
        tag: LfTag::new("tag9", ["v"]),
        handle: foreign_tag,
    }];

    let domain_tag = gov.domain_tag();
    let mut template = gov.into_template();
    let result = declare_tag_sharing(
        &mut template,
        "Late",
        DOMAIN,
        "Sales",
        &tbac,
        domain_tag,
        &tags,
    );
    assert!(matches!(result, Err(TemplateError::UnknownDependency(_))));
}

#[test]
fn derivations_are_deterministic() {
    let mut first = governance(vec![]);
    let mut second = governance(vec![]);
    first
        .register_data_domain("Domain1", DOMAIN, "Sales", SECRET_ARN, None)
        .unwrap();
    second
        .register_data_domain("Domain1", DOMAIN, "Sales", SECRET_ARN, None)
        .unwrap();

    assert_eq!(
        first.template().render().unwrap(),
        second.template().render().unwrap()
    );
    assert_eq!(
        first.registrations()[0].detail_type,
        naming::resource_links_detail_type(DOMAIN)
    );
}

#[test]
fn two_domains_do_not_collide() {
    let mut gov = governance(vec![LfTag::new("tag1", ["a"])]);
    gov.register_data_domain("Domain1", DOMAIN, "Sales", SECRET_ARN, None)
        .unwrap();
    gov.register_data_domain("Domain2", OTHER_DOMAIN, "Marketing", OTHER_SECRET_ARN, None)
        .unwrap();

    assert_eq!(gov.registrations().len(), 2);
    let doc = gov.template().render().unwrap();
    assert!(doc["Resources"]["Domain2GrantDataDomainTagtag1"].is_object());
    assert_eq!(
        doc["Resources"]["Domain2LFLocationDataAccessPolicy"]["Properties"]["PolicyDocument"]
            ["Statement"][1]["Resource"],
        json!([{"Fn::Sub": "arn:${AWS::Partition}:kms:${AWS::Region}:333333333333:key/1234abcd"}])
    );
}

#[test]
fn same_account_registered_twice_is_rejected() {
    let mut gov = governance(vec![]);
    gov.register_data_domain("Domain1", DOMAIN, "Sales", SECRET_ARN, None)
        .unwrap();
    let before = gov.template().len();

    let result = gov.register_data_domain("Domain1Again", DOMAIN, "Sales", SECRET_ARN, None);
    assert!(matches!(result, Err(GovernanceError::DomainAlreadyRegistered(_))));
    assert_eq!(gov.template().len(), before);
}

#[test]
fn unresolvable_secret_declares_nothing() {
    let mut gov = governance(vec![]);
    let before = gov.template().len();

    let missing = "arn:aws:secretsmanager:us-east-1:111111111111:secret:missing-XyZ123";
    let result = gov.register_data_domain("Domain1", DOMAIN, "Sales", missing, None);
    assert!(matches!(result, Err(GovernanceError::Secret { .. })));
    assert_eq!(gov.template().len(), before);
    assert!(gov.registrations().is_empty());
}

#[test]
fn failed_registration_rolls_back() {
    let mut template = Template::new();
    template
        .declare(
            "Domain1Rule",
            ResourceKind::EventBus(EventBusProps {
                name: "taken".to_string(),
            }),
        )
        .unwrap();

    let mut gov = governance_in(template, vec![]);
    let before = gov.template().len();

    let result = gov.register_data_domain("Domain1", DOMAIN, "Sales", SECRET_ARN, None);
    assert!(matches!(
        result,
        Err(GovernanceError::Template(TemplateError::DuplicateLogicalId(_)))
    ));
    assert_eq!(gov.template().len(), before);
    assert_eq!(gov.template().resources_of_type("AWS::Glue::Database").count(), 0);
    assert!(gov.registrations().is_empty());
    gov.template().validate().unwrap();
}

#[test]
fn workflow_swallows_existing_tables_only() {
    let gov = governance(vec![]);
    let create = gov
        .workflow()
        .all_states()
        .into_iter()
        .find(|(name, _)| *name == CREATE_TABLE)
        .map(|(_, state)| state.clone())
        .unwrap();

    match create {
        State::Task(task) => {
            assert_eq!(task.catch.len(), 1);
            assert_eq!(task.catch[0].error_equals, vec![naming::TABLE_EXISTS_ERROR]);
            assert_eq!(task.catch[0].next, IS_MODE_NRAC);
        }
        other => panic!("unexpected state {:?}", other),
    }
}
