//! `datocms_schema`: models, fields and fieldsets

use serde_json::{Value, json};

use super::{ResourceRouter, common};
use crate::cma::{Verb, segment};
use crate::handler::{ActionFn, HandlerFactory, OperationDescriptor, Shape, action};

const DOMAIN: &str = "schema";

fn op(name: &'static str, entity: &'static str, shape: Shape, run: ActionFn) -> OperationDescriptor {
    OperationDescriptor::new(DOMAIN, name, entity, shape, run)
}

fn model_path(id: &str) -> String {
    format!("/item-types/{}", segment(id))
}

fn model_props() -> Value {
    json!({
        "name": common::string("Display name"),
        "apiKey": common::string("API key (snake_case)"),
        "singleton": common::boolean("Single-instance model"),
        "sortable": common::boolean("Records can be manually sorted"),
        "tree": common::boolean("Records form a tree"),
        "modularBlock": common::boolean("Model is a block"),
        "draftModeActive": common::boolean("Enable draft/published workflow"),
        "allLocalesRequired": common::boolean("Require every locale"),
        "hint": common::string("Help text shown to editors"),
        "collectionAppearance": { "type": "string", "enum": ["compact", "table"] }
    })
}

fn field_props() -> Value {
    json!({
        "label": common::string("Display label"),
        "apiKey": common::string("API key (snake_case)"),
        "fieldType": common::string("Field type, e.g. string, text, boolean, link"),
        "localized": common::boolean("Per-locale values"),
        "hint": common::string("Help text shown to editors"),
        "position": common::integer("Position within the model"),
        "validators": common::object("Validators keyed by name"),
        "appearance": common::object("Editor appearance"),
        "defaultValue": { "description": "Default value" },
        "fieldsetId": common::string("Fieldset to place the field in")
    })
}

fn fieldset_props() -> Value {
    json!({
        "title": common::string("Title"),
        "hint": common::string("Help text"),
        "position": common::integer("Position within the model"),
        "collapsible": common::boolean("Can be collapsed"),
        "startCollapsed": common::boolean("Collapsed by default")
    })
}

fn with(mut props: Value, key: &str, value: Value) -> Value {
    if let Value::Object(map) = &mut props {
        map.insert(key.to_string(), value);
    }
    props
}

fn field_payload(args: &crate::handler::ValidatedArgs, exclude: &[&str]) -> Value {
    let mut excluded = vec!["fieldsetId"];
    excluded.extend_from_slice(exclude);
    let mut field = common::attributes(args, &excluded);
    common::link(&mut field, args, "fieldsetId", "fieldset", "fieldset");
    field
}

#[allow(clippy::too_many_lines)]
pub(super) fn router(factory: &HandlerFactory) -> ResourceRouter {
    let mut router = ResourceRouter::new(
        "datocms_schema",
        DOMAIN,
        "DatoCMS schema",
        "Manage DatoCMS models (item types), their fields and fieldsets.",
    );

    // ── models ──────────────────────────────────────────────────────────

    router.register(
        factory,
        op(
            "list_models",
            "model",
            Shape::List(None),
            action(|client, _args| async move { client.api().list("/item-types", &[]).await }),
        )
        .describe("List all models and blocks")
        .schema(common::args_schema(json!({}), &[])),
    );

    router.register(
        factory,
        op(
            "get_model",
            "Model",
            Shape::Retrieve,
            action(|client, args| async move {
                client
                    .api()
                    .find(&model_path(args.require_str("modelId")?), &[])
                    .await
            }),
        )
        .describe("Fetch a model by ID or API key")
        .id_field("modelId")
        .schema(common::args_schema(
            json!({ "modelId": common::id("Model ID or API key") }),
            &["modelId"],
        )),
    );

    router.register(
        factory,
        op(
            "create_model",
            "Model",
            Shape::Create,
            action(|client, args| async move {
                client
                    .api()
                    .create("/item-types", "item_type", common::attributes(&args, &[]))
                    .await
            }),
        )
        .describe("Create a model")
        .message("Model '{name}' created successfully with ID '{id}'.")
        .schema(common::args_schema(model_props(), &["name", "apiKey"])),
    );

    router.register(
        factory,
        op(
            "update_model",
            "Model",
            Shape::Update,
            action(|client, args| async move {
                let id = args.require_str("modelId")?;
                client
                    .api()
                    .update(&model_path(id), "item_type", common::attributes(&args, &["modelId"]))
                    .await
            }),
        )
        .describe("Update a model")
        .id_field("modelId")
        .schema(common::args_schema(
            with(model_props(), "modelId", common::id("Model ID")),
            &["modelId"],
        )),
    );

    router.register(
        factory,
        op(
            "duplicate_model",
            "Model",
            Shape::Create,
            action(|client, args| async move {
                let id = args.require_str("modelId")?;
                client
                    .api()
                    .perform(Verb::Post, &format!("{}/duplicate", model_path(id)), None)
                    .await
            }),
        )
        .describe("Duplicate a model with its fields")
        .id_field("modelId")
        .message("Model duplicated successfully; the copy has ID '{id}'.")
        .schema(common::args_schema(
            json!({ "modelId": common::id("Model ID") }),
            &["modelId"],
        )),
    );

    router.register(
        factory,
        op(
            "destroy_model",
            "Model",
            Shape::Delete,
            action(|client, args| async move {
                client
                    .api()
                    .destroy(&model_path(args.require_str("modelId")?))
                    .await
            }),
        )
        .describe("Delete a model and all its records")
        .id_field("modelId")
        .schema(common::args_schema(
            json!({ "modelId": common::id("Model ID") }),
            &["modelId"],
        )),
    );

    // ── fields ──────────────────────────────────────────────────────────

    router.register(
        factory,
        op(
            "list_fields",
            "field",
            Shape::List(None),
            action(|client, args| async move {
                let id = args.require_str("modelId")?;
                client
                    .api()
                    .list(&format!("{}/fields", model_path(id)), &[])
                    .await
            }),
        )
        .describe("List the fields of a model")
        .schema(common::args_schema(
            json!({ "modelId": common::id("Model ID or API key") }),
            &["modelId"],
        )),
    );

    router.register(
        factory,
        op(
            "get_field",
            "Field",
            Shape::Retrieve,
            action(|client, args| async move {
                let id = args.require_str("fieldId")?;
                client.api().find(&format!("/fields/{}", segment(id)), &[]).await
            }),
        )
        .describe("Fetch a field")
        .id_field("fieldId")
        .schema(common::args_schema(
            json!({ "fieldId": common::id("Field ID or model_api_key::field_api_key") }),
            &["fieldId"],
        )),
    );

    router.register(
        factory,
        op(
            "create_field",
            "Field",
            Shape::Create,
            action(|client, args| async move {
                let model = args.require_str("modelId")?;
                client
                    .api()
                    .create(
                        &format!("{}/fields", model_path(model)),
                        "field",
                        field_payload(&args, &["modelId"]),
                    )
                    .await
            }),
        )
        .describe("Add a field to a model")
        .message("Field '{label}' created successfully with ID '{id}'.")
        .schema(common::args_schema(
            with(field_props(), "modelId", common::id("Model ID")),
            &["modelId", "label", "apiKey", "fieldType"],
        )),
    );

    router.register(
        factory,
        op(
            "update_field",
            "Field",
            Shape::Update,
            action(|client, args| async move {
                let id = args.require_str("fieldId")?;
                client
                    .api()
                    .update(
                        &format!("/fields/{}", segment(id)),
                        "field",
                        field_payload(&args, &["fieldId"]),
                    )
                    .await
            }),
        )
        .describe("Update a field")
        .id_field("fieldId")
        .schema(common::args_schema(
            with(field_props(), "fieldId", common::id("Field ID")),
            &["fieldId"],
        )),
    );

    router.register(
        factory,
        op(
            "destroy_field",
            "Field",
            Shape::Delete,
            action(|client, args| async move {
                let id = args.require_str("fieldId")?;
                client.api().destroy(&format!("/fields/{}", segment(id))).await
            }),
        )
        .describe("Delete a field and its content")
        .id_field("fieldId")
        .schema(common::args_schema(
            json!({ "fieldId": common::id("Field ID") }),
            &["fieldId"],
        )),
    );

    // ── fieldsets ───────────────────────────────────────────────────────

    router.register(
        factory,
        op(
            "list_fieldsets",
            "fieldset",
            Shape::List(None),
            action(|client, args| async move {
                let id = args.require_str("modelId")?;
                client
                    .api()
                    .list(&format!("{}/fieldsets", model_path(id)), &[])
                    .await
            }),
        )
        .describe("List the fieldsets of a model")
        .schema(common::args_schema(
            json!({ "modelId": common::id("Model ID or API key") }),
            &["modelId"],
        )),
    );

    router.register(
        factory,
        op(
            "create_fieldset",
            "Fieldset",
            Shape::Create,
            action(|client, args| async move {
                let model = args.require_str("modelId")?;
                client
                    .api()
                    .create(
                        &format!("{}/fieldsets", model_path(model)),
                        "fieldset",
                        common::attributes(&args, &["modelId"]),
                    )
                    .await
            }),
        )
        .describe("Add a fieldset to a model")
        .message("Fieldset '{title}' created successfully with ID '{id}'.")
        .schema(common::args_schema(
            with(fieldset_props(), "modelId", common::id("Model ID")),
            &["modelId", "title"],
        )),
    );

    router.register(
        factory,
        op(
            "update_fieldset",
            "Fieldset",
            Shape::Update,
            action(|client, args| async move {
                let id = args.require_str("fieldsetId")?;
                client
                    .api()
                    .update(
                        &format!("/fieldsets/{}", segment(id)),
                        "fieldset",
                        common::attributes(&args, &["fieldsetId"]),
                    )
                    .await
            }),
        )
        .describe("Update a fieldset")
        .id_field("fieldsetId")
        .schema(common::args_schema(
            with(fieldset_props(), "fieldsetId", common::id("Fieldset ID")),
            &["fieldsetId"],
        )),
    );

    router.register(
        factory,
        op(
            "destroy_fieldset",
            "Fieldset",
            Shape::Delete,
            action(|client, args| async move {
                let id = args.require_str("fieldsetId")?;
                client.api().destroy(&format!("/fieldsets/{}", segment(id))).await
            }),
        )
        .describe("Delete a fieldset; its fields move to the model root")
        .id_field("fieldsetId")
        .schema(common::args_schema(
            json!({ "fieldsetId": common::id("Fieldset ID") }),
            &["fieldsetId"],
        )),
    );

    router
}
