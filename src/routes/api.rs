//! Route registry for one API namespace.
//!
//! An [`Api`] is built once at startup: registration functions take it by
//! `&mut` and add routes, after which it is frozen behind an `Arc` and shared
//! with the executor. Whether a route needs the host execution context is
//! declared here through the [`Handler`] variant, never inferred at call time.

use std::fmt;
use std::sync::Arc;

use axum::http::Method;

use crate::error::{ClientError, RegistrationError};
use crate::routes::envelope::{Fault, Request, Response};
use crate::routes::path::{PathMatch, PathParams, RoutePattern};

/// What a handler returns.
pub type HandlerResult = Result<Response, Fault>;

/// A handler that needs no host context.
pub type PlainFn = dyn Fn(&Request, &PathParams) -> HandlerResult + Send + Sync;

/// A handler that runs inside the host execution context `C`.
pub type ContextFn<C> = dyn Fn(&mut C, &Request, &PathParams) -> HandlerResult + Send + Sync;

/// A registered handler, tagged with its execution requirement.
pub enum Handler<C> {
    /// Runs on the calling task.
    Plain(Arc<PlainFn>),
    /// Runs serialised inside the host execution context.
    ContextBound(Arc<ContextFn<C>>),
}

impl<C> Handler<C> {
    /// Wraps a handler that needs no host context.
    pub fn plain<F>(f: F) -> Self
    where
        F: Fn(&Request, &PathParams) -> HandlerResult + Send + Sync + 'static,
    {
        Self::Plain(Arc::new(f))
    }

    /// Wraps a handler that needs exclusive access to the host context.
    pub fn context_bound<F>(f: F) -> Self
    where
        F: Fn(&mut C, &Request, &PathParams) -> HandlerResult + Send + Sync + 'static,
    {
        Self::ContextBound(Arc::new(f))
    }

    /// Returns `true` for [`Handler::ContextBound`].
    #[must_use]
    pub const fn is_context_bound(&self) -> bool {
        matches!(self, Self::ContextBound(_))
    }
}

impl<C> Clone for Handler<C> {
    fn clone(&self) -> Self {
        match self {
            Self::Plain(f) => Self::Plain(Arc::clone(f)),
            Self::ContextBound(f) => Self::ContextBound(Arc::clone(f)),
        }
    }
}

impl<C> fmt::Debug for Handler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("Handler::Plain"),
            Self::ContextBound(_) => f.write_str("Handler::ContextBound"),
        }
    }
}

/// A registered endpoint.
#[derive(Debug)]
pub struct Route<C> {
    /// Handler name, used as the fault source and in logs.
    pub name: String,
    /// Parsed path pattern.
    pub pattern: RoutePattern,
    /// Accepted methods.
    pub methods: Vec<Method>,
    /// The handler.
    pub handler: Handler<C>,
}

/// A resolved call: the route's name and handler plus its bound parameters.
#[derive(Debug)]
pub struct Resolved<C> {
    /// Route name.
    pub name: String,
    /// The handler to run.
    pub handler: Handler<C>,
    /// Parameters extracted from the path.
    pub params: PathParams,
}

/// The routes of one API namespace, e.g. `revit_mcp`.
#[derive(Debug)]
pub struct Api<C> {
    namespace: String,
    routes: Vec<Route<C>>,
}

impl<C> Api<C> {
    /// Creates an empty API mounted at `/<namespace>/`.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into().trim_matches('/').to_string(),
            routes: Vec::new(),
        }
    }

    /// The namespace this API is mounted under.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Registered routes, in registration order.
    #[must_use]
    pub fn routes(&self) -> &[Route<C>] {
        &self.routes
    }

    /// Registers a handler for `pattern` under the given methods.
    ///
    /// # Errors
    ///
    /// Fails when the pattern is invalid, no method is given, or any
    /// path+method pair is already taken.
    pub fn route(
        &mut self,
        name: &str,
        pattern: &str,
        methods: &[Method],
        handler: Handler<C>,
    ) -> Result<(), RegistrationError> {
        if methods.is_empty() {
            return Err(RegistrationError::NoMethods {
                pattern: pattern.to_string(),
            });
        }
        let parsed = RoutePattern::parse(pattern)?;

        for existing in self.routes.iter().filter(|r| r.pattern.same_shape(&parsed)) {
            if let Some(method) = methods.iter().find(|m| existing.methods.contains(m)) {
                return Err(RegistrationError::DuplicateRoute {
                    method: method.clone(),
                    path: parsed.to_string(),
                });
            }
        }

        tracing::debug!(
            api = %self.namespace,
            route = %parsed,
            name,
            context_bound = handler.is_context_bound(),
            "Registered route"
        );

        self.routes.push(Route {
            name: name.to_string(),
            pattern: parsed,
            methods: methods.to_vec(),
            handler,
        });
        Ok(())
    }

    /// Shorthand for a `GET` route.
    ///
    /// # Errors
    ///
    /// See [`Api::route`].
    pub fn get(
        &mut self,
        name: &str,
        pattern: &str,
        handler: Handler<C>,
    ) -> Result<(), RegistrationError> {
        self.route(name, pattern, &[Method::GET], handler)
    }

    /// Shorthand for a `POST` route.
    ///
    /// # Errors
    ///
    /// See [`Api::route`].
    pub fn post(
        &mut self,
        name: &str,
        pattern: &str,
        handler: Handler<C>,
    ) -> Result<(), RegistrationError> {
        self.route(name, pattern, &[Method::POST], handler)
    }

    /// Strips `/<namespace>` from a full request path.
    fn route_path<'a>(&self, full_path: &'a str) -> Option<&'a str> {
        let rest = full_path.trim_start_matches('/');
        let rest = rest.strip_prefix(self.namespace.as_str())?;
        (rest.is_empty() || rest.starts_with('/')).then_some(rest)
    }

    /// Finds the handler for a method and full request path.
    ///
    /// A route whose pattern fully matches wins over one that only rejected a
    /// typed segment, so overlapping patterns behave predictably.
    ///
    /// # Errors
    ///
    /// Returns the [`ClientError`] to send back when nothing can run.
    pub fn resolve(&self, method: &Method, full_path: &str) -> Result<Resolved<C>, ClientError> {
        let not_found = || ClientError::NotFound {
            path: full_path.to_string(),
        };
        let path = self.route_path(full_path).ok_or_else(not_found)?;

        let mut rejected = None;
        let mut wrong_method = false;
        for route in &self.routes {
            match route.pattern.matches(path) {
                PathMatch::Matched(params) => {
                    if route.methods.contains(method) {
                        return Ok(Resolved {
                            name: route.name.clone(),
                            handler: route.handler.clone(),
                            params,
                        });
                    }
                    wrong_method = true;
                }
                PathMatch::Rejected(err) => {
                    if rejected.is_none() && route.methods.contains(method) {
                        rejected = Some(err);
                    }
                }
                PathMatch::Miss => {}
            }
        }

        if let Some(err) = rejected {
            return Err(err);
        }
        if wrong_method {
            return Err(ClientError::MethodNotAllowed {
                method: method.clone(),
                path: full_path.to_string(),
            });
        }
        Err(not_found())
    }
}
