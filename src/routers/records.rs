//! `datocms_records`: record CRUD, publishing, scheduling and versions

use serde_json::{Value, json};

use super::{ResourceRouter, common, query};
use crate::clients::{ClientHandle, ClientKind};
use crate::cma::{Page, SelectivePublish};
use crate::handler::{
    HandlerFactory, OperationDescriptor, Shape, ValidatedArgs, action,
};
use crate::{Error, Result};

const DOMAIN: &str = "records";
const ENTITY: &str = "Record";

fn op(name: &'static str, shape: Shape, run: crate::handler::ActionFn) -> OperationDescriptor {
    OperationDescriptor::new(DOMAIN, name, ENTITY, shape, run).client(ClientKind::Records)
}

fn item_schema(extra: Value, required: &[&str]) -> Value {
    let mut props = json!({ "itemId": common::id("Record ID") });
    if let (Value::Object(p), Value::Object(e)) = (&mut props, extra) {
        p.extend(e);
    }
    let mut req = vec!["itemId"];
    req.extend_from_slice(required);
    common::args_schema(props, &req)
}

fn selective(args: &ValidatedArgs) -> Option<SelectivePublish> {
    let locales: Vec<String> = args
        .get("contentInLocales")?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .map(String::from)
        .collect();
    Some(SelectivePublish {
        content_in_locales: locales,
        non_localized_content: args.flag("nonLocalizedContent"),
    })
}

fn read_query(args: &ValidatedArgs) -> Vec<(String, String)> {
    let mut query = Vec::new();
    if args.flag("nested") {
        query.push(("nested".to_string(), "true".to_string()));
    }
    if let Some(version) = args.str("version") {
        query.push(("version".to_string(), version.to_string()));
    }
    query
}

async fn run_query(client: ClientHandle, args: ValidatedArgs) -> Result<Page> {
    let page = client.records()?.list(&query::backend_query(&args)).await?;
    query::filter_page(page, &args)
}

async fn editor_url(client: ClientHandle, args: ValidatedArgs) -> Result<Value> {
    let records = client.records()?;
    let item_id = args.require_str("itemId")?;

    let model_id = match args.str("modelId") {
        Some(id) => id.to_string(),
        None => {
            let record = records
                .find(item_id, &[])
                .await?
                .ok_or_else(|| Error::not_found(ENTITY, item_id))?;
            record
                .pointer("/item_type/id")
                .and_then(Value::as_str)
                .map(String::from)
                .ok_or_else(|| Error::Protocol("record has no item_type".to_string()))?
        }
    };

    let site = records
        .site()
        .await?
        .ok_or_else(|| Error::Protocol("site not available".to_string()))?;
    let domain = site
        .get("internal_domain")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Protocol("site has no internal domain".to_string()))?;

    let environment = args
        .str("environment")
        .filter(|e| !e.is_empty())
        .map(|e| format!("/environments/{e}"))
        .unwrap_or_default();

    Ok(json!({
        "id": item_id,
        "item_type": model_id,
        "url": format!("https://{domain}{environment}/editor/item_types/{model_id}/items/{item_id}/edit"),
    }))
}

pub(super) fn router(factory: &HandlerFactory) -> ResourceRouter {
    let mut router = ResourceRouter::new(
        "datocms_records",
        DOMAIN,
        "DatoCMS records",
        "Query, read, create, update, publish and schedule DatoCMS records.",
    );

    router.register(
        factory,
        op("query", Shape::List(Some(query::format)), action(run_query))
            .describe("Find records by model, ids, text search and field conditions")
            .message("Found {count} record(s).")
            .schema(query::schema())
            .refine(query::refine),
    );

    router.register(
        factory,
        op(
            "get",
            Shape::Retrieve,
            action(|client, args| async move {
                let id = args.require_str("itemId")?;
                client.records()?.find(id, &read_query(&args)).await
            }),
        )
        .describe("Fetch one record")
        .id_field("itemId")
        .schema(item_schema(
            json!({
                "nested": common::boolean("Expand block fields"),
                "version": { "type": "string", "enum": ["published", "current"] }
            }),
            &[],
        )),
    );

    router.register(
        factory,
        op(
            "create",
            Shape::Create,
            action(|client, args| async move {
                let mut record = args.object("data");
                if let Value::Object(map) = &mut record {
                    let model = args.require_str("itemType")?;
                    map.insert(
                        "item_type".to_string(),
                        crate::cma::jsonapi::linkage("item_type", model),
                    );
                }
                client.records()?.create(record).await
            }),
        )
        .describe("Create a record of a model")
        .message("Record created successfully with ID '{id}'.")
        .schema(common::args_schema(
            json!({
                "itemType": common::id("Model ID"),
                "data": common::object("Field values keyed by field API key")
            }),
            &["itemType", "data"],
        )),
    );

    router.register(
        factory,
        op(
            "update",
            Shape::Update,
            action(|client, args| async move {
                let id = args.require_str("itemId")?;
                let mut record = args.object("data");
                if let (Some(version), Value::Object(map)) = (args.str("currentVersion"), &mut record) {
                    map.insert("meta".to_string(), json!({ "current_version": version }));
                }
                client.records()?.update(id, record).await
            }),
        )
        .describe("Update field values of a record")
        .id_field("itemId")
        .schema(item_schema(
            json!({
                "data": common::object("Field values keyed by field API key"),
                "currentVersion": common::string("Expected current version, for optimistic locking")
            }),
            &["data"],
        )),
    );

    router.register(
        factory,
        op(
            "duplicate",
            Shape::Create,
            action(|client, args| async move {
                client.records()?.duplicate(args.require_str("itemId")?).await
            }),
        )
        .describe("Duplicate a record")
        .id_field("itemId")
        .message("Record duplicated successfully; the copy has ID '{id}'.")
        .schema(item_schema(json!({}), &[])),
    );

    router.register(
        factory,
        op(
            "destroy",
            Shape::Delete,
            action(|client, args| async move {
                client.records()?.destroy(args.require_str("itemId")?).await
            }),
        )
        .describe("Delete a record")
        .id_field("itemId")
        .schema(item_schema(json!({}), &[])),
    );

    let locales = json!({
        "contentInLocales": common::strings("Only (un)publish these locales"),
        "nonLocalizedContent": common::boolean("Also publish non-localized fields (publish only)")
    });

    router.register(
        factory,
        op(
            "publish",
            Shape::Custom,
            action(|client, args| async move {
                let id = args.require_str("itemId")?;
                client.records()?.publish(id, selective(&args).as_ref()).await
            }),
        )
        .describe("Publish a record, optionally only some locales")
        .id_field("itemId")
        .message("Record {id} was successfully published.")
        .schema(item_schema(locales.clone(), &[])),
    );

    router.register(
        factory,
        op(
            "unpublish",
            Shape::Custom,
            action(|client, args| async move {
                let id = args.require_str("itemId")?;
                client.records()?.unpublish(id, selective(&args).as_ref()).await
            }),
        )
        .describe("Unpublish a record, optionally only some locales")
        .id_field("itemId")
        .message("Record {id} was successfully unpublished.")
        .schema(item_schema(locales, &[])),
    );

    router.register(
        factory,
        op(
            "schedule_publication",
            Shape::Custom,
            action(|client, args| async move {
                let id = args.require_str("itemId")?;
                let at = args.require_str("publicationScheduledAt")?;
                client.records()?.schedule_publication(id, at).await
            }),
        )
        .describe("Schedule a record to be published at a date-time")
        .id_field("itemId")
        .message("Record {id} scheduled for publication at {publication_scheduled_at}.")
        .schema(item_schema(
            json!({ "publicationScheduledAt": { "type": "string", "format": "date-time" } }),
            &["publicationScheduledAt"],
        )),
    );

    router.register(
        factory,
        op(
            "cancel_scheduled_publication",
            Shape::Custom,
            action(|client, args| async move {
                client
                    .records()?
                    .cancel_scheduled_publication(args.require_str("itemId")?)
                    .await
            }),
        )
        .describe("Cancel a scheduled publication")
        .id_field("itemId")
        .message("Scheduled publication of record {id} was cancelled.")
        .schema(item_schema(json!({}), &[])),
    );

    router.register(
        factory,
        op(
            "schedule_unpublishing",
            Shape::Custom,
            action(|client, args| async move {
                let id = args.require_str("itemId")?;
                let at = args.require_str("unpublishingScheduledAt")?;
                client.records()?.schedule_unpublishing(id, at).await
            }),
        )
        .describe("Schedule a record to be unpublished at a date-time")
        .id_field("itemId")
        .message("Record {id} scheduled for unpublishing at {unpublishing_scheduled_at}.")
        .schema(item_schema(
            json!({ "unpublishingScheduledAt": { "type": "string", "format": "date-time" } }),
            &["unpublishingScheduledAt"],
        )),
    );

    router.register(
        factory,
        op(
            "cancel_scheduled_unpublishing",
            Shape::Custom,
            action(|client, args| async move {
                client
                    .records()?
                    .cancel_scheduled_unpublishing(args.require_str("itemId")?)
                    .await
            }),
        )
        .describe("Cancel a scheduled unpublishing")
        .id_field("itemId")
        .message("Scheduled unpublishing of record {id} was cancelled.")
        .schema(item_schema(json!({}), &[])),
    );

    router.register(
        factory,
        op(
            "references",
            Shape::List(None),
            action(|client, args| async move {
                let id = args.require_str("itemId")?;
                client.records()?.references(id, &read_query(&args)).await
            }),
        )
        .describe("Records that link to a record")
        .id_field("itemId")
        .message("Found {count} record(s) referencing {id}.")
        .schema(item_schema(
            json!({
                "nested": common::boolean("Expand block fields"),
                "version": { "type": "string", "enum": ["published", "current"] }
            }),
            &[],
        )),
    );

    router.register(
        factory,
        op(
            "list_versions",
            Shape::List(None),
            action(|client, args| async move {
                let id = args.require_str("itemId")?;
                client.records()?.versions(id, &common::page_query(&args)).await
            }),
        )
        .describe("Version history of a record")
        .id_field("itemId")
        .message("Found {count} version(s) of record {id}.")
        .schema(item_schema(json!({ "page": common::page() }), &[])),
    );

    router.register(
        factory,
        op(
            "restore_version",
            Shape::Custom,
            action(|client, args| async move {
                client
                    .records()?
                    .restore_version(args.require_str("versionId")?)
                    .await
            }),
        )
        .describe("Restore a record to a previous version")
        .id_field("versionId")
        .message("Version {id} was restored.")
        .schema(common::args_schema(
            json!({ "versionId": common::id("Version ID") }),
            &["versionId"],
        )),
    );

    router.register(
        factory,
        op("editor_url", Shape::Custom, action(editor_url))
            .describe("Link to a record in the DatoCMS editor")
            .id_field("itemId")
            .message("Editor URL for record {id}: {url}")
            .schema(item_schema(
                json!({ "modelId": common::string("Model ID; looked up when omitted") }),
                &[],
            )),
    );

    router
}
