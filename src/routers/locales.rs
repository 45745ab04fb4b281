//! `datocms_locales`: the project's locale list.
//!
//! Locales are an ordered attribute of the site, so every change is a
//! read-modify-write of `/site`. The first locale is the default one.

use serde_json::{Value, json};

use super::{ResourceRouter, common};
use crate::clients::ClientHandle;
use crate::handler::{ActionFn, HandlerFactory, OperationDescriptor, Shape, ValidatedArgs, action};
use crate::schema::Violation;
use crate::{Error, Result};

const DOMAIN: &str = "locales";
const ENTITY: &str = "Locale";

fn op(name: &'static str, shape: Shape, run: ActionFn) -> OperationDescriptor {
    OperationDescriptor::new(DOMAIN, name, ENTITY, shape, run)
}

fn locale_schema() -> Value {
    common::args_schema(
        json!({ "locale": common::id("Locale code, e.g. en or pt-BR") }),
        &["locale"],
    )
}

/// Current site id and locales
async fn current(client: &ClientHandle) -> Result<(Option<String>, Vec<String>)> {
    let site = client
        .api()
        .find("/site", &[])
        .await?
        .ok_or_else(|| Error::Protocol("site not available".to_string()))?;
    let id = site.get("id").and_then(Value::as_str).map(String::from);
    let locales = site
        .get("locales")
        .and_then(Value::as_array)
        .map(|l| l.iter().filter_map(Value::as_str).map(String::from).collect())
        .unwrap_or_default();
    Ok((id, locales))
}

async fn save(client: &ClientHandle, id: Option<String>, locales: &[String]) -> Result<Vec<String>> {
    let mut site = json!({ "locales": locales });
    if let (Some(id), Value::Object(map)) = (id, &mut site) {
        map.insert("id".to_string(), Value::String(id));
    }
    let saved = client.api().update("/site", "site", site).await?;
    Ok(saved
        .get("locales")
        .and_then(Value::as_array)
        .map(|l| l.iter().filter_map(Value::as_str).map(String::from).collect())
        .unwrap_or_else(|| locales.to_vec()))
}

async fn list_locales(client: ClientHandle, _args: ValidatedArgs) -> Result<Value> {
    let (_, locales) = current(&client).await?;
    Ok(json!({ "default": locales.first(), "locales": locales }))
}

async fn add_locale(client: ClientHandle, args: ValidatedArgs) -> Result<Value> {
    let locale = args.require_str("locale")?;
    let (id, mut locales) = current(&client).await?;
    if locales.iter().any(|l| l == locale) {
        return Err(Error::InvalidArguments(format!(
            "locale '{locale}' is already enabled"
        )));
    }
    locales.push(locale.to_string());
    let locales = save(&client, id, &locales).await?;
    Ok(json!({ "locale": locale, "locales": locales }))
}

async fn remove_locale(client: ClientHandle, args: ValidatedArgs) -> Result<Value> {
    let locale = args.require_str("locale")?;
    let (id, mut locales) = current(&client).await?;
    let Some(index) = locales.iter().position(|l| l == locale) else {
        return Err(Error::InvalidArguments(format!(
            "locale '{locale}' is not enabled; enabled locales: {}",
            locales.join(", ")
        )));
    };
    if locales.len() == 1 {
        return Err(Error::InvalidArguments(format!(
            "cannot remove '{locale}': a project needs at least one locale"
        )));
    }
    locales.remove(index);
    let locales = save(&client, id, &locales).await?;
    Ok(json!({ "locale": locale, "locales": locales }))
}

async fn set_locales(client: ClientHandle, args: ValidatedArgs) -> Result<Value> {
    let requested: Vec<String> = args
        .get("locales")
        .and_then(Value::as_array)
        .map(|l| l.iter().filter_map(Value::as_str).map(String::from).collect())
        .unwrap_or_default();
    let (id, _) = current(&client).await?;
    let locales = save(&client, id, &requested).await?;
    Ok(json!({ "locales": locales }))
}

fn unique_locales(args: &Value) -> Vec<Violation> {
    let Some(Value::Array(locales)) = args.get("locales") else {
        return Vec::new();
    };
    let mut seen = Vec::new();
    let mut violations = Vec::new();
    for (i, locale) in locales.iter().enumerate() {
        if seen.contains(&locale) {
            violations.push(Violation::new(
                format!("locales[{i}]"),
                format!("duplicate locale {locale}"),
            ));
        } else {
            seen.push(locale);
        }
    }
    violations
}

pub(super) fn router(factory: &HandlerFactory) -> ResourceRouter {
    let mut router = ResourceRouter::new(
        "datocms_locales",
        DOMAIN,
        "DatoCMS locales",
        "Read and change the project's locales. The first locale is the default.",
    );

    router.register(
        factory,
        op("list_locales", Shape::Custom, action(list_locales))
            .describe("List enabled locales, default first")
            .schema(common::args_schema(json!({}), &[])),
    );

    router.register(
        factory,
        op("add_locale", Shape::Custom, action(add_locale))
            .describe("Enable a locale, appended after the existing ones")
            .id_field("locale")
            .message("Locale {id} was added.")
            .schema(locale_schema()),
    );

    router.register(
        factory,
        op("remove_locale", Shape::Custom, action(remove_locale))
            .describe("Disable a locale; the last one cannot be removed")
            .id_field("locale")
            .message("Locale {id} was removed.")
            .schema(locale_schema()),
    );

    router.register(
        factory,
        op("set_locales", Shape::Custom, action(set_locales))
            .describe("Replace the whole locale list; the first becomes the default")
            .message("Locales set.")
            .schema(common::args_schema(
                json!({
                    "locales": {
                        "type": "array",
                        "minItems": 1,
                        "items": { "type": "string", "minLength": 1 },
                        "description": "Locale codes in order"
                    }
                }),
                &["locales"],
            ))
            .refine(unique_locales),
    );

    router
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn duplicate_locales_are_reported_by_index() {
        let violations = unique_locales(&json!({ "locales": ["en", "it", "en"] }));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "locales[2]");
    }

    #[test]
    fn distinct_locales_pass() {
        assert!(unique_locales(&json!({ "locales": ["en", "it"] })).is_empty());
    }
}
