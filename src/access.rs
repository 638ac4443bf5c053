use serde::{Deserialize, Serialize};

/// Pages reachable without a principal. A `*` stands for any (possibly empty) run of characters.
pub const PUBLIC_ROUTES: &[&str] = &["/login", "/403", "/404", "/", "/courses"];

/// Roots of the admin area. Matched by prefix, so `/admin/courses/new` is restricted too.
pub const ADMIN_ROUTES: &[&str] = &["/admin/edit", "/admin/courses"];

/// RouteClass
///
/// Access category of a navigation target. Derived per request, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteClass {
    Public,
    AdminRestricted,
    Protected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Matcher {
    Prefix,
    Pattern,
}

/// One row of the classification table.
#[derive(Debug, Clone, Copy)]
pub struct Rule<'a> {
    class: RouteClass,
    matcher: Matcher,
    patterns: &'a [&'a str],
}

impl<'a> Rule<'a> {
    pub const fn prefix(class: RouteClass, patterns: &'a [&'a str]) -> Self {
        Self {
            class,
            matcher: Matcher::Prefix,
            patterns,
        }
    }

    pub const fn pattern(class: RouteClass, patterns: &'a [&'a str]) -> Self {
        Self {
            class,
            matcher: Matcher::Pattern,
            patterns,
        }
    }

    fn matches(&self, path: &str) -> bool {
        match self.matcher {
            Matcher::Prefix => self.patterns.iter().any(|root| path.starts_with(root)),
            Matcher::Pattern => self.patterns.iter().any(|p| pattern_matches(p, path)),
        }
    }
}

/// AccessRules
///
/// An ordered rule table; the first matching rule decides, anything unmatched is `Protected`.
/// The admin-prefix rule sits above the public rule so an admin path is never downgraded to
/// public by an overlapping pattern.
#[derive(Debug, Clone, Copy)]
pub struct AccessRules<'a> {
    rules: &'a [Rule<'a>],
}

const DEFAULT_TABLE: &[Rule<'static>] = &[
    Rule::prefix(RouteClass::AdminRestricted, ADMIN_ROUTES),
    Rule::pattern(RouteClass::Public, PUBLIC_ROUTES),
];

impl<'a> AccessRules<'a> {
    pub const fn new(rules: &'a [Rule<'a>]) -> Self {
        Self { rules }
    }

    pub fn classify(&self, path: &str) -> RouteClass {
        self.rules
            .iter()
            .find(|rule| rule.matches(path))
            .map(|rule| rule.class)
            .unwrap_or(RouteClass::Protected)
    }
}

impl Default for AccessRules<'static> {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE)
    }
}

/// classify
///
/// Classifies `path` against the site's built-in route table. Pure and deterministic.
pub fn classify(path: &str) -> RouteClass {
    AccessRules::default().classify(path)
}

/// Exact match, or a single-wildcard match anchored at both ends. Only the first `*` is a
/// wildcard; later ones are literal characters.
fn pattern_matches(pattern: &str, path: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == path,
        Some((head, tail)) => {
            path.len() >= head.len() + tail.len() && path.starts_with(head) && path.ends_with(tail)
        }
    }
}
