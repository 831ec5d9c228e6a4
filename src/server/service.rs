use std::io;
use std::sync::Arc;

use http::Method;
use may_minihttp::{HttpService, Request, Response};
use serde_json::Value;
use tracing::{info, warn};

use super::request::{parse_request, ParsedRequest};
use super::response::write_handler_response;
use crate::coerce::coerce_body;
use crate::credentials::{rotation_requested, AuthGuard, AuthOutcome, ROTATION_HEADER};
use crate::dispatcher::{Dispatcher, HandlerResponse, HeaderVec};
use crate::router::{ParamVec, Router};

/// The per-request pipeline over a compiled route table.
///
/// Order per request: authenticate, resolve the route, run rotation if its
/// trigger conditions hold, coerce the body against the route's schema,
/// dispatch, apply staged headers. The pipeline core ([`AppService::handle`])
/// is transport-free; [`HttpService::call`] is a thin adapter around it.
#[derive(Clone)]
pub struct AppService {
    pub router: Arc<Router>,
    pub dispatcher: Arc<Dispatcher>,
    pub guard: Option<Arc<AuthGuard>>,
}

impl AppService {
    /// Build the service. Passing no guard serves every request
    /// anonymously, which is only sensible in development - it logs a
    /// warning so a misconfigured deployment is visible.
    #[must_use]
    pub fn new(
        router: Arc<Router>,
        dispatcher: Arc<Dispatcher>,
        guard: Option<Arc<AuthGuard>>,
    ) -> Self {
        if guard.is_none() {
            warn!("serving without an authentication guard - every request is anonymous");
        }
        Self {
            router,
            dispatcher,
            guard,
        }
    }

    /// Run one parsed request through the pipeline.
    pub fn handle(&self, req: ParsedRequest) -> HandlerResponse {
        let ParsedRequest {
            method,
            path,
            headers,
            cookies,
            query_params,
            body,
        } = req;

        // 1. Authentication. Rejection is uniform: no detail distinguishes
        // an unknown key from a wrong secret.
        let user = match &self.guard {
            Some(guard) => {
                let outcome = match headers.get("authorization") {
                    Some(header) => guard.verify_basic(header),
                    None => AuthOutcome::Rejected,
                };
                match outcome {
                    AuthOutcome::Authenticated(user) => Some(user),
                    AuthOutcome::Rejected => {
                        return HandlerResponse::error(401, "Unauthorized");
                    }
                }
            }
            None => None,
        };

        // 2. Route resolution: exact (method, path) match only.
        let method = match method.parse::<Method>() {
            Ok(method) => method,
            Err(_) => return HandlerResponse::error(404, "Not Found"),
        };
        let mut route_match = match self.router.route(method, &path) {
            Some(route_match) => route_match,
            None => return HandlerResponse::error(404, "Not Found"),
        };
        route_match.query_params = query_params
            .iter()
            .map(|(k, v)| (Arc::from(k.as_str()), v.clone()))
            .collect::<ParamVec>();

        // 3. Rotation, before the handler runs: the staged header must be
        // on the response before any handler output is written. A persist
        // failure degrades silently - this request completes on the old
        // credential, headerless.
        let mut rotated_pair: Option<String> = None;
        if let (Some(guard), Some(mut user)) = (self.guard.as_ref(), user) {
            if user.credential.rusty || rotation_requested(body.as_ref()) {
                match guard.rotate(&mut user) {
                    Ok(fresh) => rotated_pair = Some(fresh.wire_pair()),
                    Err(err) => {
                        warn!(
                            user_id = %user.id,
                            error = %err,
                            "rotation persist failed, response proceeds without header"
                        );
                    }
                }
            }
        }

        // 4. Body coercion when the path declares a schema; a structured
        // parse failure is a request-level error and the handler never runs.
        let body = match &route_match.route.schema {
            Some(schema) => {
                let raw = body.unwrap_or_else(|| Value::Object(Default::default()));
                match coerce_body(schema, &raw) {
                    Ok(coerced) => Some(coerced),
                    Err(err) => {
                        info!(
                            path = %path,
                            error = %err,
                            "body coercion failed"
                        );
                        return HandlerResponse::error(400, &err.to_string());
                    }
                }
            }
            None => body,
        };

        // 5. Dispatch and apply staged headers.
        let header_vec: HeaderVec = headers
            .iter()
            .map(|(k, v)| (Arc::from(k.as_str()), v.clone()))
            .collect();
        let cookie_vec: HeaderVec = cookies
            .iter()
            .map(|(k, v)| (Arc::from(k.as_str()), v.clone()))
            .collect();

        let mut response = match self
            .dispatcher
            .dispatch(route_match, body, header_vec, cookie_vec)
        {
            Some(response) => response,
            None => HandlerResponse::error(500, "Handler failed or not registered"),
        };

        if let Some(pair) = rotated_pair {
            response.set_header(ROTATION_HEADER, pair);
        }
        response
    }
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let parsed = parse_request(req);
        let response = self.handle(parsed);
        write_handler_response(res, response.status, &response.headers, response.body);
        Ok(())
    }
}
