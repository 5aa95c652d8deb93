//! Permission resolution against the seeded role graph.

mod common;

use axum::http::{HeaderMap, HeaderValue, header::AUTHORIZATION};
use gatehouse_auth::storage::{Permission, Role};
use gatehouse_auth::{AccessRequirement, AuthError, PermissionResolver, RoleStorage, UserStorage};
use uuid::Uuid;

use common::{PASSWORD, bearer, fixture};

#[tokio::test]
async fn test_user_role_grants_users_read_only() {
    let fx = fixture().await;
    let user = fx.register("a@x.com").await;
    let resolver = PermissionResolver::new(fx.storage.clone());

    let access = resolver.resolve(user.id).await.unwrap();
    assert_eq!(access.roles, vec!["user"]);
    assert!(access.has_permission("users:read"));
    assert!(!access.has_permission("admin"));
}

#[tokio::test]
async fn test_shared_permission_appears_once() {
    let fx = fixture().await;
    let user = fx.register("a@x.com").await;
    let moderator = fx
        .storage
        .find_role_by_name("moderator")
        .await
        .unwrap()
        .unwrap();
    fx.storage
        .assign_role_to_user(user.id, moderator.id)
        .await
        .unwrap();

    let access = PermissionResolver::new(fx.storage.clone())
        .resolve(user.id)
        .await
        .unwrap();
    let mut roles = access.roles.clone();
    roles.sort();
    assert_eq!(roles, vec!["moderator", "user"]);
    assert_eq!(
        access.permissions.into_iter().collect::<Vec<_>>(),
        vec!["users:read", "users:write"]
    );

    // The pair is unique.
    assert!(matches!(
        fx.storage.assign_role_to_user(user.id, moderator.id).await,
        Err(AuthError::Conflict { .. })
    ));
}

#[tokio::test]
async fn test_role_changes_apply_to_existing_tokens() {
    let fx = fixture().await;
    let user = fx.register("a@x.com").await;
    let token = fx.service.login("a@x.com", PASSWORD).await.unwrap().token;
    let state = fx.service.auth_state();

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&bearer(&token)).unwrap());
    let write = AccessRequirement::any_permission(["users:write"]);

    let identity = state.authenticate(&headers).await.unwrap();
    assert!(matches!(
        write.check(&identity),
        Err(AuthError::InsufficientPermission { .. })
    ));

    let moderator = fx
        .storage
        .find_role_by_name("moderator")
        .await
        .unwrap()
        .unwrap();
    fx.storage
        .assign_role_to_user(user.id, moderator.id)
        .await
        .unwrap();

    let identity = state.authenticate(&headers).await.unwrap();
    assert!(write.check(&identity).is_ok());
}

#[tokio::test]
async fn test_custom_roles_resolve_through_grants() {
    let fx = fixture().await;
    let user = fx.register("a@x.com").await;

    let auditor = fx
        .storage
        .upsert_role(&Role::new("auditor").with_description("Reads audit trails"))
        .await
        .unwrap();
    let read = fx
        .storage
        .upsert_permission(&Permission::new("audit:read"))
        .await
        .unwrap();
    fx.storage.grant_permission(auditor.id, read.id).await.unwrap();
    fx.storage.grant_permission(auditor.id, read.id).await.unwrap();
    fx.storage
        .assign_role_to_user(user.id, auditor.id)
        .await
        .unwrap();

    let loaded = fx.storage.load_with_roles(user.id).await.unwrap().unwrap();
    let grant = loaded.roles.iter().find(|g| g.role == "auditor").unwrap();
    assert_eq!(grant.permissions, vec!["audit:read"]);
}

#[tokio::test]
async fn test_unknown_account_resolves_to_no_access() {
    let fx = fixture().await;
    let access = PermissionResolver::new(fx.storage.clone())
        .resolve(Uuid::new_v4())
        .await
        .unwrap();
    assert!(access.roles.is_empty());
    assert!(access.permissions.is_empty());
}
