//! `datocms_ui`: navigation menu items, schema menu items and plugins

use serde_json::{Value, json};

use super::{ResourceRouter, common};
use crate::cma::segment;
use crate::handler::{ActionFn, HandlerFactory, OperationDescriptor, Shape, ValidatedArgs, action};

const DOMAIN: &str = "ui";

/// One UI resource family
#[derive(Clone, Copy)]
struct Resource {
    /// Collection path
    path: &'static str,
    /// JSON:API type
    kind: &'static str,
    /// Entity name used in messages
    entity: &'static str,
    /// Argument carrying the entity id
    id_arg: &'static str,
}

const MENU_ITEM: Resource = Resource {
    path: "/menu-items",
    kind: "menu_item",
    entity: "Menu item",
    id_arg: "menuItemId",
};

const SCHEMA_MENU_ITEM: Resource = Resource {
    path: "/schema-menu-items",
    kind: "schema_menu_item",
    entity: "Schema menu item",
    id_arg: "schemaMenuItemId",
};

const PLUGIN: Resource = Resource {
    path: "/plugins",
    kind: "plugin",
    entity: "Plugin",
    id_arg: "pluginId",
};

impl Resource {
    fn member(self, id: &str) -> String {
        format!("{}/{}", self.path, segment(id))
    }

    /// Payload with `itemTypeId` / `parentId` turned into relationships
    fn payload(self, args: &ValidatedArgs) -> Value {
        let mut entity = common::attributes(args, &[self.id_arg, "itemTypeId", "parentId"]);
        common::link(&mut entity, args, "itemTypeId", "item_type", "item_type");
        common::link(&mut entity, args, "parentId", "parent", self.kind);
        entity
    }

    fn id_schema(self) -> Value {
        common::args_schema(self.with_id(json!({})), &[self.id_arg])
    }

    fn with_id(self, mut props: Value) -> Value {
        if let Value::Object(map) = &mut props {
            map.insert(self.id_arg.to_string(), common::id("ID"));
        }
        props
    }

    fn list(self, name: &'static str, description: &'static str) -> OperationDescriptor {
        let run: ActionFn = action(move |client, _args| async move {
            client.api().list(self.path, &[]).await
        });
        OperationDescriptor::new(DOMAIN, name, self.kind, Shape::List(None), run)
            .describe(description)
            .schema(common::args_schema(json!({}), &[]))
    }

    fn get(self, name: &'static str, description: &'static str) -> OperationDescriptor {
        let run: ActionFn = action(move |client, args| async move {
            let id = args.require_str(self.id_arg)?;
            client.api().find(&self.member(id), &[]).await
        });
        OperationDescriptor::new(DOMAIN, name, self.entity, Shape::Retrieve, run)
            .describe(description)
            .id_field(self.id_arg)
            .schema(self.id_schema())
    }

    fn create(
        self,
        name: &'static str,
        description: &'static str,
        props: Value,
        required: &[&str],
    ) -> OperationDescriptor {
        let run: ActionFn = action(move |client, args| async move {
            client
                .api()
                .create(self.path, self.kind, self.payload(&args))
                .await
        });
        OperationDescriptor::new(DOMAIN, name, self.entity, Shape::Create, run)
            .describe(description)
            .schema(common::args_schema(props, required))
    }

    fn update(self, name: &'static str, description: &'static str, props: Value) -> OperationDescriptor {
        let run: ActionFn = action(move |client, args| async move {
            let id = args.require_str(self.id_arg)?;
            client
                .api()
                .update(&self.member(id), self.kind, self.payload(&args))
                .await
        });
        OperationDescriptor::new(DOMAIN, name, self.entity, Shape::Update, run)
            .describe(description)
            .id_field(self.id_arg)
            .schema(common::args_schema(self.with_id(props), &[self.id_arg]))
    }

    fn destroy(self, name: &'static str, description: &'static str) -> OperationDescriptor {
        let run: ActionFn = action(move |client, args| async move {
            let id = args.require_str(self.id_arg)?;
            client.api().destroy(&self.member(id)).await
        });
        OperationDescriptor::new(DOMAIN, name, self.entity, Shape::Delete, run)
            .describe(description)
            .id_field(self.id_arg)
            .schema(self.id_schema())
    }
}

fn menu_item_props() -> Value {
    json!({
        "label": common::id("Label shown in the navigation"),
        "position": common::integer("Position among siblings"),
        "externalUrl": common::string("Link to an external page"),
        "openInNewTab": common::boolean("Open the external link in a new tab"),
        "itemTypeId": common::string("Model whose records the item opens"),
        "parentId": common::string("Parent menu item")
    })
}

fn schema_menu_item_props() -> Value {
    json!({
        "label": common::id("Label shown in the schema navigation"),
        "position": common::integer("Position among siblings"),
        "kind": { "type": "string", "enum": ["item_type", "modular_block"] },
        "itemTypeId": common::string("Model or block the item opens"),
        "parentId": common::string("Parent schema menu item")
    })
}

fn plugin_props() -> Value {
    json!({
        "packageName": common::string("npm package of a marketplace plugin"),
        "name": common::string("Name of a private plugin"),
        "url": common::string("Entry point URL of a private plugin"),
        "description": common::string("Description"),
        "parameters": common::object("Global plugin configuration"),
        "permissions": common::strings("Requested permissions, e.g. currentUserAccessToken")
    })
}

pub(super) fn router(factory: &HandlerFactory) -> ResourceRouter {
    let mut router = ResourceRouter::new(
        "datocms_ui",
        DOMAIN,
        "DatoCMS interface",
        "Manage the editor navigation menu, the schema menu and installed plugins.",
    );

    let descriptors = [
        MENU_ITEM.list("list_menu_items", "List navigation menu items"),
        MENU_ITEM
            .create(
                "create_menu_item",
                "Add a navigation menu item",
                menu_item_props(),
                &["label"],
            )
            .message("Menu item '{label}' created with ID {id}."),
        MENU_ITEM.update("update_menu_item", "Update a navigation menu item", menu_item_props()),
        MENU_ITEM.destroy("destroy_menu_item", "Delete a navigation menu item"),
        SCHEMA_MENU_ITEM.list("list_schema_menu_items", "List schema menu items"),
        SCHEMA_MENU_ITEM
            .create(
                "create_schema_menu_item",
                "Add a schema menu item",
                schema_menu_item_props(),
                &["label", "kind"],
            )
            .message("Schema menu item '{label}' created with ID {id}."),
        SCHEMA_MENU_ITEM.update(
            "update_schema_menu_item",
            "Update a schema menu item",
            schema_menu_item_props(),
        ),
        SCHEMA_MENU_ITEM.destroy("destroy_schema_menu_item", "Delete a schema menu item"),
        PLUGIN.list("list_plugins", "List installed plugins"),
        PLUGIN.get("get_plugin", "Fetch a plugin"),
        PLUGIN
            .create(
                "create_plugin",
                "Install a plugin from the marketplace (packageName) or by URL",
                plugin_props(),
                &[],
            )
            .refine(plugin_source),
        PLUGIN.update("update_plugin", "Update a plugin's configuration", plugin_props()),
        PLUGIN.destroy("destroy_plugin", "Uninstall a plugin"),
    ];
    for descriptor in descriptors {
        router.register(factory, descriptor);
    }

    router
}

/// A plugin comes either from the marketplace or from a URL
fn plugin_source(args: &Value) -> Vec<crate::schema::Violation> {
    let has = |key: &str| args.get(key).and_then(Value::as_str).is_some_and(|s| !s.is_empty());
    match (has("packageName"), has("url")) {
        (true, false) | (false, true) => Vec::new(),
        (true, true) => vec![crate::schema::Violation::new(
            "packageName",
            "give either packageName or url, not both",
        )],
        (false, false) => vec![crate::schema::Violation::new(
            "packageName",
            "packageName or url is required",
        )],
    }
}
