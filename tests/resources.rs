//! Resource-specific behaviour of the routers against an in-memory CMA

mod common;

use pretty_assertions::assert_eq;
use serde_json::json;

use common::{FakeCma, call, server};
use datocms_mcp::handler::ErrorKind;
use datocms_mcp::schema::Violation;

fn site(api: &FakeCma, locales: &[&str]) {
    api.with_entity(
        "/site",
        json!({"id": "s1", "locales": locales, "internal_domain": "acme.admin.datocms.com"}),
    );
}

#[tokio::test]
async fn add_locale_appends_in_order() {
    // GIVEN: a site in en, it
    let api = FakeCma::new();
    site(&api, &["en", "it"]);
    let server = server(&api);

    // WHEN: adding de
    let envelope = call(&server, "datocms_locales", "add_locale", json!({"apiToken": "t", "locale": "de"})).await;

    // THEN: the site is saved with de last
    assert!(envelope.success, "{envelope:?}");
    assert_eq!(envelope.data, Some(json!({"locale": "de", "locales": ["en", "it", "de"]})));
    assert_eq!(envelope.message.as_deref(), Some("Locale de was added."));
    let save = api.calls().into_iter().find(|c| c.verb == "PUT").unwrap();
    assert_eq!(save.path, "/site");
    assert_eq!(save.body, Some(json!({"id": "s1", "locales": ["en", "it", "de"]})));
}

#[tokio::test]
async fn add_locale_refuses_duplicates() {
    let api = FakeCma::new();
    site(&api, &["en"]);
    let server = server(&api);

    let envelope = call(&server, "datocms_locales", "add_locale", json!({"apiToken": "t", "locale": "en"})).await;

    assert_eq!(envelope.meta.error_kind, Some(ErrorKind::Validation));
    assert_eq!(
        envelope.meta.validation_errors,
        Some(vec![Violation::new("", "locale 'en' is already enabled")])
    );
    assert!(envelope.error.unwrap().contains("already enabled"));
    assert!(api.calls().iter().all(|c| c.verb != "PUT"));
}

#[tokio::test]
async fn the_last_locale_cannot_be_removed() {
    let api = FakeCma::new();
    site(&api, &["en"]);
    let server = server(&api);

    let envelope = call(&server, "datocms_locales", "remove_locale", json!({"apiToken": "t", "locale": "en"})).await;

    assert_eq!(envelope.meta.error_kind, Some(ErrorKind::Validation));
    assert!(envelope.error.unwrap().contains("at least one locale"));
}

#[tokio::test]
async fn remove_locale_keeps_the_others_in_order() {
    let api = FakeCma::new();
    site(&api, &["en", "it", "de"]);
    let server = server(&api);

    let envelope = call(&server, "datocms_locales", "remove_locale", json!({"apiToken": "t", "locale": "it"})).await;

    assert_eq!(envelope.data, Some(json!({"locale": "it", "locales": ["en", "de"]})));
}

#[tokio::test]
async fn set_locales_rejects_duplicates_before_any_call() {
    let api = FakeCma::new();
    let server = server(&api);

    let envelope = call(
        &server,
        "datocms_locales",
        "set_locales",
        json!({"apiToken": "t", "locales": ["en", "en"]}),
    )
    .await;

    assert_eq!(envelope.meta.error_kind, Some(ErrorKind::Validation));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn editor_url_looks_up_the_model() {
    // GIVEN: a record of model 42 in a sandbox environment
    let api = FakeCma::new();
    site(&api, &["en"]);
    api.with_entity("/items/1", json!({"id": "1", "item_type": {"type": "item_type", "id": "42"}}));
    let server = server(&api);

    // WHEN: asking for its editor URL
    let envelope = call(
        &server,
        "datocms_records",
        "editor_url",
        json!({"apiToken": "t", "environment": "sandbox", "itemId": "1"}),
    )
    .await;

    // THEN: the URL points into the environment
    let url = "https://acme.admin.datocms.com/environments/sandbox/editor/item_types/42/items/1/edit";
    assert!(envelope.success, "{envelope:?}");
    assert_eq!(envelope.data.unwrap()["url"], url);
    assert_eq!(envelope.message, Some(format!("Editor URL for record 1: {url}")));
}

#[tokio::test]
async fn create_record_links_its_model() {
    let api = FakeCma::new();
    let server = server(&api);

    let envelope = call(
        &server,
        "datocms_records",
        "create",
        json!({"apiToken": "t", "itemType": "42", "data": {"title": "Hello"}}),
    )
    .await;

    assert_eq!(envelope.message.as_deref(), Some("Record created successfully with ID 'new-1'."));
    assert_eq!(
        api.calls()[0].body,
        Some(json!({"title": "Hello", "item_type": {"type": "item_type", "id": "42"}}))
    );
}

#[tokio::test]
async fn schedule_publication_requires_a_date_time() {
    let api = FakeCma::new();
    let server = server(&api);

    let envelope = call(
        &server,
        "datocms_records",
        "schedule_publication",
        json!({"apiToken": "t", "itemId": "1", "publicationScheduledAt": "next tuesday"}),
    )
    .await;

    assert_eq!(envelope.meta.error_kind, Some(ErrorKind::Validation));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn create_field_goes_under_its_model() {
    let api = FakeCma::new();
    let server = server(&api);

    let envelope = call(
        &server,
        "datocms_schema",
        "create_field",
        json!({
            "apiToken": "t", "modelId": "42", "label": "Title",
            "apiKey": "title", "fieldType": "string", "fieldsetId": "9"
        }),
    )
    .await;

    assert!(envelope.success, "{envelope:?}");
    assert_eq!(envelope.message.as_deref(), Some("Field 'Title' created successfully with ID 'new-1'."));
    let create = &api.calls()[0];
    assert_eq!(create.path, "/item-types/42/fields");
    assert_eq!(
        create.body,
        Some(json!({
            "label": "Title", "api_key": "title", "field_type": "string",
            "fieldset": {"type": "fieldset", "id": "9"}
        }))
    );
}

#[tokio::test]
async fn invite_collaborator_links_the_role() {
    let api = FakeCma::new();
    let server = server(&api);

    let envelope = call(
        &server,
        "datocms_collaborators",
        "invite_collaborator",
        json!({"apiToken": "t", "email": "ada@example.com", "roleId": "3"}),
    )
    .await;

    assert_eq!(envelope.message.as_deref(), Some("Invitation sent to ada@example.com with ID 'new-1'."));
    let invite = &api.calls()[0];
    assert_eq!(invite.path, "/site-invitations");
    assert_eq!(
        invite.body,
        Some(json!({"email": "ada@example.com", "role": {"type": "role", "id": "3"}}))
    );
}

#[tokio::test]
async fn regenerate_token_posts_the_verb() {
    let api = FakeCma::new();
    let server = server(&api);

    let envelope = call(&server, "datocms_api_tokens", "regenerate_token", json!({"apiToken": "t", "tokenId": "5"})).await;

    assert!(envelope.success, "{envelope:?}");
    let calls = api.calls();
    assert_eq!((calls[0].verb, calls[0].path.as_str()), ("POST", "/access_tokens/5/regenerate_token"));
}

#[tokio::test]
async fn plugins_need_a_source() {
    let api = FakeCma::new();
    let server = server(&api);

    let envelope = call(&server, "datocms_ui", "create_plugin", json!({"apiToken": "t"})).await;

    assert_eq!(envelope.meta.error_kind, Some(ErrorKind::Validation));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn menu_items_list_with_a_count() {
    let api = FakeCma::new();
    api.with_page("/menu-items", vec![json!({"id": "1"}), json!({"id": "2"})], Some(2));
    let server = server(&api);

    let envelope = call(&server, "datocms_ui", "list_menu_items", json!({"apiToken": "t"})).await;

    assert_eq!(envelope.message.as_deref(), Some("Found 2 menu_item(s)."));
    assert_eq!(envelope.meta.pagination.map(|p| p.has_more), Some(false));
}
