//! Host side of the bridge: a small HTTP route framework.
//!
//! Routes are grouped into an [`Api`] namespace (e.g. `revit_mcp`) and served
//! under `/<namespace>/<route>`. Each route declares whether its handler needs
//! the host's privileged execution context:
//!
//! ```text
//!  HTTP ─▶ server ─▶ CallbackDispatcher ─┬─▶ Executor ─┬─▶ Plain handler (calling task)
//!                                        │             └─▶ ContextSlot ─▶ ContextBound handler
//!                                        └─ callbackUrl? 204 now, POST result later
//! ```
//!
//! # Wire contract
//!
//! - Success: JSON body, or raw image bytes with an `image/*` content type.
//! - Handler fault: `{"exception": {"source": .., "message": ..}}`, status 500
//!   unless the handler chose another error status.
//! - Deferred (`callbackUrl` in the body): `204` with an empty body, then one
//!   POST of the JSON envelope to the callback URL.

pub mod api;
pub mod context;
pub mod dispatcher;
pub mod envelope;
pub mod executor;
pub mod path;
pub mod server;

pub use api::{Api, Handler, HandlerResult, Resolved, Route};
pub use context::{ContextSlot, SlotClosed};
pub use dispatcher::{CallbackDispatcher, JobState};
pub use envelope::{Fault, Request, Response, ResponseBody, CALLBACK_URL_FIELD};
pub use executor::Executor;
pub use path::{ParamType, ParamValue, PathParams, RoutePattern};
pub use server::{router, serve};
