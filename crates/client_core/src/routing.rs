use shared::domain::Role;
use tracing::debug;

use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Landing,
    Login,
    Admin,
    Owner,
    Supplier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(Route),
}

impl Route {
    pub const ALL: [Route; 5] = [
        Route::Landing,
        Route::Login,
        Route::Admin,
        Route::Owner,
        Route::Supplier,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Self::Landing => "/",
            Self::Login => "/login",
            Self::Admin => Role::Admin.dashboard_path(),
            Self::Owner => Role::Owner.dashboard_path(),
            Self::Supplier => Role::Supplier.dashboard_path(),
        }
    }

    /// Query strings, fragments and trailing slashes are ignored.
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or_default().trim();
        let trimmed = path.trim_end_matches('/');
        let normalized = if trimmed.is_empty() { "/" } else { trimmed };
        Self::ALL
            .into_iter()
            .find(|route| route.path().eq_ignore_ascii_case(normalized))
    }

    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Admin => Self::Admin,
            Role::Owner => Self::Owner,
            Role::Supplier => Self::Supplier,
        }
    }

    /// Roles admitted to the route; `None` means the route is public.
    pub fn required_roles(self) -> Option<&'static [Role]> {
        match self {
            Self::Landing | Self::Login => None,
            Self::Admin => Some(&[Role::Admin]),
            Self::Owner => Some(&[Role::Owner]),
            Self::Supplier => Some(&[Role::Supplier]),
        }
    }
}

/// Decides whether a navigation to `route` may proceed for the given role
/// (`None` when signed out).
pub fn guard(route: Route, role: Option<Role>) -> GuardDecision {
    match (route.required_roles(), role) {
        (None, Some(role)) if route == Route::Login => GuardDecision::Redirect(Route::for_role(role)),
        (None, _) => GuardDecision::Allow,
        (Some(_), None) => GuardDecision::Redirect(Route::Login),
        (Some(roles), Some(role)) if roles.contains(&role) => GuardDecision::Allow,
        (Some(_), Some(role)) => GuardDecision::Redirect(Route::for_role(role)),
    }
}

/// Resolves a requested path to the route that ends up displayed. Unknown
/// paths land on `/`.
pub async fn navigate(session: &Session, path: &str) -> Route {
    let requested = Route::parse(path).unwrap_or(Route::Landing);
    let resolved = match guard(requested, session.role().await) {
        GuardDecision::Allow => requested,
        GuardDecision::Redirect(target) => target,
    };
    debug!(path, resolved = resolved.path(), "navigation");
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_paths_and_rejects_others() {
        assert_eq!(Route::parse("/"), Some(Route::Landing));
        assert_eq!(Route::parse(""), Some(Route::Landing));
        assert_eq!(Route::parse("/owner/"), Some(Route::Owner));
        assert_eq!(Route::parse("/supplier?tab=mine"), Some(Route::Supplier));
        assert_eq!(Route::parse("/nowhere"), None);
    }

    #[test]
    fn signed_out_users_go_to_login() {
        for route in [Route::Admin, Route::Owner, Route::Supplier] {
            assert_eq!(guard(route, None), GuardDecision::Redirect(Route::Login));
        }
        assert_eq!(guard(Route::Landing, None), GuardDecision::Allow);
        assert_eq!(guard(Route::Login, None), GuardDecision::Allow);
    }

    #[test]
    fn wrong_role_goes_to_own_dashboard() {
        assert_eq!(
            guard(Route::Admin, Some(Role::Supplier)),
            GuardDecision::Redirect(Route::Supplier)
        );
        assert_eq!(
            guard(Route::Supplier, Some(Role::Owner)),
            GuardDecision::Redirect(Route::Owner)
        );
        assert_eq!(guard(Route::Owner, Some(Role::Owner)), GuardDecision::Allow);
    }

    #[test]
    fn signed_in_users_skip_login() {
        assert_eq!(
            guard(Route::Login, Some(Role::Admin)),
            GuardDecision::Redirect(Route::Admin)
        );
        assert_eq!(guard(Route::Landing, Some(Role::Admin)), GuardDecision::Allow);
    }
}
