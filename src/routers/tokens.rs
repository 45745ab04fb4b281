//! `datocms_api_tokens`: API access tokens

use serde_json::{Value, json};

use super::{ResourceRouter, common};
use crate::clients::ClientKind;
use crate::handler::{ActionFn, HandlerFactory, OperationDescriptor, Shape, ValidatedArgs, action};

const DOMAIN: &str = "api_tokens";
const ENTITY: &str = "API token";

fn op(name: &'static str, shape: Shape, run: ActionFn) -> OperationDescriptor {
    OperationDescriptor::new(DOMAIN, name, ENTITY, shape, run).client(ClientKind::Collaborators)
}

fn token_props() -> Value {
    json!({
        "name": common::id("Token name"),
        "roleId": common::string("Role granting the token's permissions"),
        "canAccessCda": common::boolean("Read published content (Content Delivery API)"),
        "canAccessCdaPreview": common::boolean("Read draft content"),
        "canAccessCma": common::boolean("Use the Content Management API")
    })
}

fn token_payload(args: &ValidatedArgs, exclude: &[&str]) -> Value {
    let mut excluded = vec!["roleId"];
    excluded.extend_from_slice(exclude);
    let mut token = common::attributes(args, &excluded);
    common::link(&mut token, args, "roleId", "role", "role");
    token
}

fn token_id() -> Value {
    common::args_schema(json!({ "tokenId": common::id("API token ID") }), &["tokenId"])
}

pub(super) fn router(factory: &HandlerFactory) -> ResourceRouter {
    let mut router = ResourceRouter::new(
        "datocms_api_tokens",
        DOMAIN,
        "DatoCMS API tokens",
        "Manage API access tokens. Token values are secrets: only share them where needed.",
    );

    router.register(
        factory,
        op(
            "list_tokens",
            Shape::List(None),
            action(|client, _args| async move { client.collaborators()?.list_tokens().await }),
        )
        .describe("List API tokens")
        .message("Found {count} API token(s).")
        .schema(common::args_schema(json!({}), &[])),
    );

    router.register(
        factory,
        op(
            "get_token",
            Shape::Retrieve,
            action(|client, args| async move {
                client
                    .collaborators()?
                    .find_token(args.require_str("tokenId")?)
                    .await
            }),
        )
        .describe("Fetch an API token")
        .id_field("tokenId")
        .schema(token_id()),
    );

    router.register(
        factory,
        op(
            "create_token",
            Shape::Create,
            action(|client, args| async move {
                client
                    .collaborators()?
                    .create_token(token_payload(&args, &[]))
                    .await
            }),
        )
        .describe("Create an API token")
        .message("API token '{name}' created with ID {id}.")
        .schema(common::args_schema(
            token_props(),
            &["name", "canAccessCda", "canAccessCdaPreview", "canAccessCma"],
        )),
    );

    let mut update_props = token_props();
    if let Value::Object(map) = &mut update_props {
        map.insert("tokenId".to_string(), common::id("API token ID"));
    }
    router.register(
        factory,
        op(
            "update_token",
            Shape::Update,
            action(|client, args| async move {
                let id = args.require_str("tokenId")?;
                client
                    .collaborators()?
                    .update_token(id, token_payload(&args, &["tokenId"]))
                    .await
            }),
        )
        .describe("Update an API token")
        .id_field("tokenId")
        .schema(common::args_schema(update_props, &["tokenId"])),
    );

    router.register(
        factory,
        op(
            "destroy_token",
            Shape::Delete,
            action(|client, args| async move {
                client
                    .collaborators()?
                    .destroy_token(args.require_str("tokenId")?)
                    .await
            }),
        )
        .describe("Delete an API token")
        .id_field("tokenId")
        .schema(token_id()),
    );

    router.register(
        factory,
        op(
            "regenerate_token",
            Shape::Custom,
            action(|client, args| async move {
                client
                    .collaborators()?
                    .regenerate_token(args.require_str("tokenId")?)
                    .await
            }),
        )
        .describe("Replace the secret value of an API token")
        .id_field("tokenId")
        .message("API token {id} was regenerated; the previous value no longer works.")
        .schema(token_id()),
    );

    router
}
