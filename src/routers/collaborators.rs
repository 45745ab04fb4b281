//! `datocms_collaborators`: project users and site invitations

use serde_json::json;

use super::{ResourceRouter, common};
use crate::clients::ClientKind;
use crate::handler::{ActionFn, HandlerFactory, OperationDescriptor, Shape, action};

const DOMAIN: &str = "collaborators";

fn op(name: &'static str, entity: &'static str, shape: Shape, run: ActionFn) -> OperationDescriptor {
    OperationDescriptor::new(DOMAIN, name, entity, shape, run).client(ClientKind::Collaborators)
}

fn user_schema() -> serde_json::Value {
    common::args_schema(
        json!({
            "userId": common::id("Collaborator (user) ID"),
            "roleId": common::id("Role to assign")
        }),
        &["userId", "roleId"],
    )
}

fn invitation_schema() -> serde_json::Value {
    common::args_schema(
        json!({ "invitationId": common::id("Invitation ID") }),
        &["invitationId"],
    )
}

#[allow(clippy::too_many_lines)]
pub(super) fn router(factory: &HandlerFactory) -> ResourceRouter {
    let mut router = ResourceRouter::new(
        "datocms_collaborators",
        DOMAIN,
        "DatoCMS collaborators",
        "Manage project collaborators and pending invitations.",
    );

    router.register(
        factory,
        op(
            "list_collaborators",
            "collaborator",
            Shape::List(None),
            action(|client, _args| async move { client.collaborators()?.list_users().await }),
        )
        .describe("List project collaborators")
        .schema(common::args_schema(json!({}), &[])),
    );

    router.register(
        factory,
        op(
            "get_collaborator",
            "Collaborator",
            Shape::Retrieve,
            action(|client, args| async move {
                client
                    .collaborators()?
                    .find_user(args.require_str("userId")?)
                    .await
            }),
        )
        .describe("Fetch a collaborator")
        .id_field("userId")
        .schema(common::args_schema(
            json!({ "userId": common::id("Collaborator (user) ID") }),
            &["userId"],
        )),
    );

    router.register(
        factory,
        op(
            "update_collaborator",
            "Collaborator",
            Shape::Update,
            action(|client, args| async move {
                let id = args.require_str("userId")?;
                let mut user = json!({});
                common::link(&mut user, &args, "roleId", "role", "role");
                client.collaborators()?.update_user(id, user).await
            }),
        )
        .describe("Change the role of a collaborator")
        .id_field("userId")
        .schema(user_schema()),
    );

    router.register(
        factory,
        op(
            "destroy_collaborator",
            "Collaborator",
            Shape::Delete,
            action(|client, args| async move {
                client
                    .collaborators()?
                    .destroy_user(args.require_str("userId")?)
                    .await
            }),
        )
        .describe("Remove a collaborator from the project")
        .id_field("userId")
        .schema(common::args_schema(
            json!({ "userId": common::id("Collaborator (user) ID") }),
            &["userId"],
        )),
    );

    router.register(
        factory,
        op(
            "invite_collaborator",
            "Invitation",
            Shape::Create,
            action(|client, args| async move {
                let mut invitation = common::attributes(&args, &["roleId"]);
                common::link(&mut invitation, &args, "roleId", "role", "role");
                client.collaborators()?.invite(invitation).await
            }),
        )
        .describe("Invite someone to the project with a role")
        .message("Invitation sent to {email} with ID '{id}'.")
        .schema(common::args_schema(
            json!({
                "email": { "type": "string", "minLength": 3, "description": "Invitee email address" },
                "roleId": common::id("Role to assign")
            }),
            &["email", "roleId"],
        )),
    );

    router.register(
        factory,
        op(
            "list_invitations",
            "invitation",
            Shape::List(None),
            action(|client, _args| async move {
                client.collaborators()?.list_invitations().await
            }),
        )
        .describe("List pending invitations")
        .schema(common::args_schema(json!({}), &[])),
    );

    router.register(
        factory,
        op(
            "resend_invitation",
            "Invitation",
            Shape::Custom,
            action(|client, args| async move {
                client
                    .collaborators()?
                    .resend_invitation(args.require_str("invitationId")?)
                    .await
            }),
        )
        .describe("Send an invitation email again")
        .id_field("invitationId")
        .message("Invitation {id} was resent.")
        .schema(invitation_schema()),
    );

    router.register(
        factory,
        op(
            "destroy_invitation",
            "Invitation",
            Shape::Delete,
            action(|client, args| async move {
                client
                    .collaborators()?
                    .destroy_invitation(args.require_str("invitationId")?)
                    .await
            }),
        )
        .describe("Revoke a pending invitation")
        .id_field("invitationId")
        .schema(invitation_schema()),
    );

    router
}
