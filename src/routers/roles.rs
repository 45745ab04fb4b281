//! `datocms_roles`: collaborator roles and their permissions

use serde_json::{Value, json};

use super::{ResourceRouter, common};
use crate::clients::ClientKind;
use crate::handler::{ActionFn, HandlerFactory, OperationDescriptor, Shape, action};

const DOMAIN: &str = "roles";
const ENTITY: &str = "Role";

fn op(name: &'static str, shape: Shape, run: ActionFn) -> OperationDescriptor {
    OperationDescriptor::new(DOMAIN, name, ENTITY, shape, run).client(ClientKind::Collaborators)
}

fn permissions() -> Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "itemType": common::string("Model ID; omit for every model"),
                "action": {
                    "type": "string",
                    "enum": ["all", "read", "create", "update", "duplicate", "delete", "publish", "edit_creator", "take_over"]
                },
                "onCreator": { "type": "string", "enum": ["anyone", "self", "role"] },
                "localizationScope": { "type": "string", "enum": ["all", "localized", "not_localized"] }
            },
            "required": ["action"],
            "additionalProperties": true
        },
        "description": "Per-model permissions"
    })
}

fn role_props() -> Value {
    json!({
        "name": common::id("Role name"),
        "canEditSite": common::boolean("Edit project settings"),
        "canEditSchema": common::boolean("Edit models and fields"),
        "canEditFavicon": common::boolean("Edit favicon and SEO settings"),
        "canManageUsers": common::boolean("Invite and manage collaborators"),
        "canManageAccessTokens": common::boolean("Manage API tokens"),
        "canManageWebhooks": common::boolean("Manage webhooks"),
        "canManageEnvironments": common::boolean("Fork, promote and delete environments"),
        "canManageSharedFilters": common::boolean("Manage shared filters"),
        "canPerformSiteSearch": common::boolean("Use site search"),
        "canAccessAuditLog": common::boolean("Read the audit log"),
        "environmentsAccess": { "type": "string", "enum": ["all", "primary_only", "sandbox_only", "none"] },
        "inheritsPermissionsFrom": common::strings("Role IDs to inherit permissions from"),
        "positiveItemTypePermissions": permissions(),
        "negativeItemTypePermissions": permissions()
    })
}

/// Role payload: snake_case attributes, permission entries with linked models
fn role_payload(args: &crate::handler::ValidatedArgs, exclude: &[&str]) -> Value {
    let mut role = common::attributes(args, exclude);
    if let Value::Object(map) = &mut role {
        for key in ["positive_item_type_permissions", "negative_item_type_permissions"] {
            if let Some(Value::Array(rules)) = map.get_mut(key) {
                for rule in rules.iter_mut() {
                    if let Value::Object(rule) = rule {
                        let snake: serde_json::Map<String, Value> = std::mem::take(rule)
                            .into_iter()
                            .map(|(k, v)| (common::snake_case(&k), v))
                            .collect();
                        *rule = snake;
                    }
                }
            }
        }
        if let Some(Value::Array(ids)) = map.remove("inherits_permissions_from") {
            let links: Vec<Value> = ids
                .iter()
                .filter_map(Value::as_str)
                .map(|id| crate::cma::jsonapi::linkage("role", id))
                .collect();
            map.insert("inherits_permissions_from".to_string(), Value::Array(links));
        }
    }
    role
}

pub(super) fn router(factory: &HandlerFactory) -> ResourceRouter {
    let mut router = ResourceRouter::new(
        "datocms_roles",
        DOMAIN,
        "DatoCMS roles",
        "Manage collaborator roles and their permissions.",
    );

    router.register(
        factory,
        op(
            "list_roles",
            Shape::List(None),
            action(|client, _args| async move { client.collaborators()?.list_roles().await }),
        )
        .describe("List roles")
        .message("Found {count} role(s).")
        .schema(common::args_schema(json!({}), &[])),
    );

    router.register(
        factory,
        op(
            "get_role",
            Shape::Retrieve,
            action(|client, args| async move {
                client
                    .collaborators()?
                    .find_role(args.require_str("roleId")?)
                    .await
            }),
        )
        .describe("Fetch a role")
        .id_field("roleId")
        .schema(common::args_schema(
            json!({ "roleId": common::id("Role ID") }),
            &["roleId"],
        )),
    );

    router.register(
        factory,
        op(
            "create_role",
            Shape::Create,
            action(|client, args| async move {
                client
                    .collaborators()?
                    .create_role(role_payload(&args, &[]))
                    .await
            }),
        )
        .describe("Create a role")
        .message("Role '{name}' created with ID {id}.")
        .schema(common::args_schema(role_props(), &["name"])),
    );

    let mut update_props = role_props();
    if let Value::Object(map) = &mut update_props {
        map.insert("roleId".to_string(), common::id("Role ID"));
    }
    router.register(
        factory,
        op(
            "update_role",
            Shape::Update,
            action(|client, args| async move {
                let id = args.require_str("roleId")?;
                client
                    .collaborators()?
                    .update_role(id, role_payload(&args, &["roleId"]))
                    .await
            }),
        )
        .describe("Update a role")
        .id_field("roleId")
        .schema(common::args_schema(update_props, &["roleId"])),
    );

    router.register(
        factory,
        op(
            "destroy_role",
            Shape::Delete,
            action(|client, args| async move {
                client
                    .collaborators()?
                    .destroy_role(args.require_str("roleId")?)
                    .await
            }),
        )
        .describe("Delete a role")
        .id_field("roleId")
        .schema(common::args_schema(
            json!({ "roleId": common::id("Role ID") }),
            &["roleId"],
        )),
    );

    router
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::ValidatedArgs;
    use pretty_assertions::assert_eq;

    #[test]
    fn permissions_are_sent_in_api_shape() {
        // GIVEN: camelCase role arguments
        let args = ValidatedArgs::new(json!({
            "apiToken": "t",
            "name": "Editor",
            "canEditSchema": false,
            "inheritsPermissionsFrom": ["7"],
            "positiveItemTypePermissions": [{"itemType": "42", "action": "update", "onCreator": "self"}]
        }));

        // WHEN: building the payload
        let role = role_payload(&args, &[]);

        // THEN: keys are snake_case and inherited roles are linkages
        assert_eq!(
            role,
            json!({
                "name": "Editor",
                "can_edit_schema": false,
                "inherits_permissions_from": [{"type": "role", "id": "7"}],
                "positive_item_type_permissions": [
                    {"item_type": "42", "action": "update", "on_creator": "self"}
                ]
            })
        );
    }
}
