//! Static framework and ORM resolution table.
//!
//! Maps textual call shapes of well-known frameworks to canonical FQNs
//! so that ORM and routing calls resolve even though no project module
//! defines them. Local project modules shadow these rules: the resolver
//! only consults this table after import and same-module resolution
//! have failed.

use rustc_hash::FxHashSet;
use std::sync::OnceLock;

/// Category of a framework rule, used for diagnostics and stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameworkCategory {
    /// Django ORM manager / queryset access.
    DjangoOrm,
    /// Django REST Framework serializers.
    DrfSerializer,
    /// Flask routing.
    FlaskRouting,
    /// SQLAlchemy session and query API.
    SqlAlchemy,
    /// pytest fixtures and marks.
    Pytest,
    /// Stdlib convenience shortcuts (json, logging).
    StdlibShortcut,
    /// Bare canonical-prefix match.
    KnownPrefix,
}

/// A framework resolution produced by the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameworkResolution {
    /// Canonical FQN for the call.
    pub fqn: String,
    /// Which rule family matched.
    pub category: FrameworkCategory,
}

/// Django queryset operations recognized on `<Model>.objects`.
fn django_qs_ops() -> &'static FxHashSet<&'static str> {
    static OPS: OnceLock<FxHashSet<&'static str>> = OnceLock::new();
    OPS.get_or_init(|| {
        [
            "all", "filter", "exclude", "get", "create", "get_or_create", "update_or_create",
            "update", "delete", "count", "exists", "first", "last", "order_by", "values",
            "values_list", "annotate", "aggregate", "distinct", "bulk_create", "bulk_update",
            "raw", "only", "defer", "select_related", "prefetch_related",
        ]
        .into_iter()
        .collect()
    })
}

/// SQLAlchemy session methods recognized on a `session` receiver.
fn sqlalchemy_session_ops() -> &'static FxHashSet<&'static str> {
    static OPS: OnceLock<FxHashSet<&'static str>> = OnceLock::new();
    OPS.get_or_init(|| {
        [
            "query", "add", "add_all", "delete", "commit", "rollback", "flush", "execute",
            "scalar", "scalars", "get", "merge", "refresh", "close",
        ]
        .into_iter()
        .collect()
    })
}

/// Canonical prefixes accepted verbatim once import resolution has
/// produced them.
fn known_prefixes() -> &'static [&'static str] {
    &[
        "django.db.models",
        "django.urls",
        "django.shortcuts",
        "rest_framework.serializers",
        "rest_framework.viewsets",
        "rest_framework.decorators",
        "flask",
        "fastapi",
        "sqlalchemy",
        "celery",
        "pytest",
        "json",
        "logging",
    ]
}

/// HTTP-verb decorator methods shared by Flask blueprints and FastAPI
/// routers.
fn routing_verbs() -> &'static FxHashSet<&'static str> {
    static VERBS: OnceLock<FxHashSet<&'static str>> = OnceLock::new();
    VERBS.get_or_init(|| {
        ["get", "post", "put", "patch", "delete", "head", "options", "websocket"]
            .into_iter()
            .collect()
    })
}

/// Static framework/ORM resolution table.
#[derive(Debug, Default)]
pub struct FrameworkTable;

impl FrameworkTable {
    /// Creates the table. The rules are static; the constructor exists
    /// so the table can be threaded through the resolver like the other
    /// registries.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Attempts to resolve a textual call target (or an import-expanded
    /// candidate FQN) against the framework rules.
    #[must_use]
    pub fn resolve(&self, target: &str) -> Option<FrameworkResolution> {
        if target.is_empty() {
            return None;
        }

        // Django ORM: `<Model>.objects.<op>` collapses onto the Manager.
        if let Some(op) = django_orm_op(target) {
            return Some(FrameworkResolution {
                fqn: format!("django.db.models.Manager.{op}"),
                category: FrameworkCategory::DjangoOrm,
            });
        }

        let (head, rest) = match target.split_once('.') {
            Some((h, r)) => (h, Some(r)),
            None => (target, None),
        };

        // SQLAlchemy: a `session` receiver with a known session method.
        if head == "session" || head == "db_session" {
            if let Some(rest) = rest {
                let method = rest.split('.').next().unwrap_or(rest);
                if sqlalchemy_session_ops().contains(method) {
                    return Some(FrameworkResolution {
                        fqn: format!("sqlalchemy.orm.Session.{method}"),
                        category: FrameworkCategory::SqlAlchemy,
                    });
                }
            }
        }

        // Flask routing: `app.route` / `blueprint.route` decorators,
        // plus the verb-style shortcuts shared with FastAPI routers.
        if let Some(rest) = rest {
            let is_route = rest == "route" || rest.starts_with("route.");
            let is_verb = routing_verbs().contains(rest);
            if is_route || is_verb {
                if head == "app" || head == "application" {
                    return Some(FrameworkResolution {
                        fqn: format!("flask.Flask.{rest}"),
                        category: FrameworkCategory::FlaskRouting,
                    });
                }
                if head == "bp" || head == "blueprint" {
                    return Some(FrameworkResolution {
                        fqn: format!("flask.Blueprint.{rest}"),
                        category: FrameworkCategory::FlaskRouting,
                    });
                }
                if head == "router" {
                    return Some(FrameworkResolution {
                        fqn: format!("fastapi.APIRouter.{rest}"),
                        category: FrameworkCategory::FlaskRouting,
                    });
                }
            }
        }

        // DRF: `serializers.<Member>` maps onto rest_framework.
        if head == "serializers" {
            if let Some(rest) = rest {
                return Some(FrameworkResolution {
                    fqn: format!("rest_framework.serializers.{rest}"),
                    category: FrameworkCategory::DrfSerializer,
                });
            }
        }

        // pytest fixtures and marks keep their own FQN.
        if head == "pytest" {
            return Some(FrameworkResolution {
                fqn: target.to_owned(),
                category: FrameworkCategory::Pytest,
            });
        }

        // Stdlib convenience shortcuts.
        if (head == "json" || head == "logging") && rest.is_some() {
            return Some(FrameworkResolution {
                fqn: target.to_owned(),
                category: FrameworkCategory::StdlibShortcut,
            });
        }

        // Canonical-prefix fallthrough for import-expanded candidates.
        for prefix in known_prefixes() {
            if target == *prefix || target.starts_with(&format!("{prefix}.")) {
                return Some(FrameworkResolution {
                    fqn: target.to_owned(),
                    category: FrameworkCategory::KnownPrefix,
                });
            }
        }

        None
    }
}

fn django_orm_op(target: &str) -> Option<&str> {
    let (_, after) = target.split_once(".objects.")?;
    let op = after.split('.').next().unwrap_or(after);
    django_qs_ops().contains(op).then_some(op)
}
