//! Notifying connection.
//!
//! Wraps a [`Transport`] so that every response it produces is captured on
//! the connection, inspected for deprecation markers, and published as a
//! `request.detailed` event. Callers see exactly the result the transport
//! produced.

use crate::deprecation::DeprecationDetector;
use crate::error::RequestError;
use crate::events::{Instrumenter, REQUEST_EVENT};
use crate::metrics::ConnectionMetrics;
use crate::response::{Request, Response};
use crate::transport::Transport;
use reqwest::Method;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::debug;

/// Client connection with response capture and request notification.
pub struct Connection<T: Transport> {
    transport: T,
    detector: DeprecationDetector,
    instrumenter: Instrumenter,
    event_name: String,
    metrics: Option<Arc<ConnectionMetrics>>,
    /// Most recently captured response. Last writer wins.
    response: RwLock<Option<Response>>,
}

impl<T: Transport> Connection<T> {
    pub fn new(transport: T, detector: DeprecationDetector, instrumenter: Instrumenter) -> Self {
        Self {
            transport,
            detector,
            instrumenter,
            event_name: REQUEST_EVENT.to_string(),
            metrics: None,
            response: RwLock::new(None),
        }
    }

    /// Publish request events under a different category name.
    pub fn with_event_name(mut self, name: impl Into<String>) -> Self {
        self.event_name = name.into();
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<ConnectionMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn instrumenter(&self) -> &Instrumenter {
        &self.instrumenter
    }

    /// The last response that passed through [`Connection::handle_response`].
    pub fn last_response(&self) -> Option<Response> {
        match self.response.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Delegate to the transport's handle step and remember its output.
    /// Failures of the handle step are returned untouched and not captured.
    pub fn handle_response(&self, response: Response) -> Result<Response, RequestError> {
        let response = self.transport.handle_response(response)?;
        let mut slot = match self.response.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(response.clone());
        Ok(response)
    }

    /// Dispatch a request, then notify about the response on both the
    /// success and the response-carrying failure path.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        arguments: Vec<serde_json::Value>,
    ) -> Result<Response, RequestError> {
        let request = Request {
            method,
            path: path.to_string(),
            arguments,
        };
        self.dispatch(&request).await
    }

    /// [`Connection::request`] with a prebuilt [`Request`].
    pub async fn dispatch(&self, request: &Request) -> Result<Response, RequestError> {
        let started = Instant::now();
        let result = self.perform(request).await;
        self.record(request, &result, started);

        match result {
            Ok(response) => {
                self.notify(request, &response).await;
                Ok(response)
            }
            Err(err) => {
                if let Some(response) = err.response() {
                    self.notify(request, response).await;
                }
                Err(err)
            }
        }
    }

    /// The transport's dispatch: execute, then the (capturing) handle step.
    async fn perform(&self, request: &Request) -> Result<Response, RequestError> {
        let response = self.transport.execute(request).await?;
        self.handle_response(response)
    }

    /// Run deprecation detection, then publish the request event.
    async fn notify(&self, request: &Request, response: &Response) {
        self.detector
            .inspect(&request.method, &request.path, response, &request.arguments)
            .await;

        let event = self.instrumenter.instrument(&self.event_name, |payload| {
            payload.method = request.method.clone();
            payload.path = request.path.clone();
            payload.response = Some(response.clone());
            payload.data = request.arguments.clone();
        });

        debug!(
            event = %event.name,
            method = %request.method,
            path = %request.path,
            status = response.status,
            "Request event emitted"
        );
    }

    fn record(&self, request: &Request, result: &Result<Response, RequestError>, started: Instant) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        let status = match result {
            Ok(response) => response.status.to_string(),
            Err(err) => match err.response() {
                Some(response) => response.status.to_string(),
                None => "error".to_string(),
            },
        };
        metrics.record_request(
            request.method.as_str(),
            &status,
            started.elapsed().as_secs_f64(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertChannel;
    use crate::deprecation::{Console, DEPRECATION_MARKER};
    use crate::error::AlertError;
    use crate::events::Event;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Transport that replays scripted outcomes in order.
    #[derive(Default)]
    struct ScriptedTransport {
        replies: Mutex<VecDeque<Result<Response, RequestError>>>,
        seen: Mutex<Vec<Request>>,
    }

    impl ScriptedTransport {
        fn replying(replies: Vec<Result<Response, RequestError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn execute(&self, request: &Request) -> Result<Response, RequestError> {
            self.seen.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(RequestError::Connection("no scripted reply".to_string())))
        }
    }

    #[derive(Default)]
    struct RecordingConsole {
        lines: Mutex<Vec<String>>,
    }

    impl Console for RecordingConsole {
        fn warn(&self, message: &str) {
            self.lines.lock().unwrap().push(message.to_string());
        }
    }

    #[derive(Default)]
    struct RecordingChannel {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl AlertChannel for RecordingChannel {
        async fn ping(&self, text: &str) -> Result<(), AlertError> {
            self.sent.lock().unwrap().push(text.to_string());
            if self.fail {
                Err(AlertError::Rejected {
                    status: 500,
                    body: "down".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    struct Harness {
        connection: Connection<ScriptedTransport>,
        console: Arc<RecordingConsole>,
        channel: Arc<RecordingChannel>,
        events: Arc<Mutex<Vec<Event>>>,
    }

    fn harness(replies: Vec<Result<Response, RequestError>>, alerts_fail: bool) -> Harness {
        let console = Arc::new(RecordingConsole::default());
        let channel = Arc::new(RecordingChannel {
            sent: Mutex::new(Vec::new()),
            fail: alerts_fail,
        });
        let events = Arc::new(Mutex::new(Vec::new()));

        let instrumenter = Instrumenter::new();
        let sink = events.clone();
        instrumenter.subscribe(
            REQUEST_EVENT,
            Arc::new(move |event: &Event| sink.lock().unwrap().push(event.clone())),
        );

        let detector = DeprecationDetector::new(console.clone(), channel.clone());
        let connection = Connection::new(
            ScriptedTransport::replying(replies),
            detector,
            instrumenter,
        );

        Harness {
            connection,
            console,
            channel,
            events,
        }
    }

    #[tokio::test]
    async fn test_success_without_marker() {
        let h = harness(vec![Ok(Response::new(200).with_body("{\"shop\":{}}"))], false);

        let response = h
            .connection
            .request(Method::GET, "/shop.json", vec![])
            .await
            .unwrap();
        assert_eq!(response.status, 200);

        let events = h.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload.method, Method::GET);
        assert_eq!(events[0].payload.path, "/shop.json");
        assert_eq!(events[0].payload.response.as_ref(), Some(&response));
        assert!(events[0].payload.data.is_empty());

        assert!(h.console.lines.lock().unwrap().is_empty());
        assert!(h.channel.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_success_with_marker_warns_and_alerts() {
        let reply = Response::new(200).with_header(DEPRECATION_MARKER, "old param");
        let h = harness(vec![Ok(reply)], false);

        h.connection
            .request(Method::GET, "/shop.json", vec![])
            .await
            .unwrap();

        assert_eq!(h.events.lock().unwrap().len(), 1);

        let lines = h.console.lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("GET /shop.json"));
        assert!(lines[0].contains("old param"));

        let sent = h.channel.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("GET /shop.json"));
        assert!(sent[0].contains("old param"));
    }

    #[tokio::test]
    async fn test_status_failure_notifies_then_returns_same_error() {
        let reply = Response::new(422).with_body("{\"errors\":{\"name\":[\"invalid\"]}}");
        let h = harness(vec![Ok(reply.clone())], false);

        let err = h
            .connection
            .request(Method::PUT, "/orders/1.json", vec![json!({"name": "x"})])
            .await
            .unwrap_err();
        assert_eq!(err, RequestError::Status { response: reply.clone() });

        let events = h.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload.method, Method::PUT);
        assert_eq!(events[0].payload.response.as_ref(), Some(&reply));
        assert_eq!(events[0].payload.data, vec![json!({"name": "x"})]);
    }

    #[tokio::test]
    async fn test_connection_failure_emits_nothing() {
        let failure = RequestError::Connection("connection refused".to_string());
        let h = harness(vec![Err(failure.clone())], false);

        let err = h
            .connection
            .request(Method::GET, "/x.json", vec![])
            .await
            .unwrap_err();
        assert_eq!(err, failure);
        assert!(h.events.lock().unwrap().is_empty());
        assert!(h.connection.last_response().is_none());
    }

    #[tokio::test]
    async fn test_alert_failure_does_not_reach_caller() {
        let reply = Response::new(200).with_header("X-Shopify-Api-Deprecated-Reason", "gone soon");
        let h = harness(vec![Ok(reply.clone())], true);

        let response = h
            .connection
            .request(Method::GET, "/products.json", vec![])
            .await
            .unwrap();
        assert_eq!(response, reply);
        assert_eq!(h.console.lines.lock().unwrap().len(), 1);
        assert_eq!(h.channel.sent.lock().unwrap().len(), 1);
        assert_eq!(h.events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_alert_failure_on_error_path_keeps_original_error() {
        let reply = Response::new(404).with_header(DEPRECATION_MARKER, "endpoint removed");
        let h = harness(vec![Ok(reply.clone())], true);

        let err = h
            .connection
            .request(Method::GET, "/legacy.json", vec![])
            .await
            .unwrap_err();
        assert_eq!(err, RequestError::Status { response: reply });
        assert_eq!(h.console.lines.lock().unwrap().len(), 1);
        assert_eq!(h.events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_last_response_tracks_latest_capture() {
        let first = Response::new(200).with_body("first");
        let second = Response::new(201).with_body("second");
        let h = harness(
            vec![
                Ok(first.clone()),
                Ok(second.clone()),
                Ok(Response::new(500)),
            ],
            false,
        );

        assert!(h.connection.last_response().is_none());

        h.connection.request(Method::GET, "/a.json", vec![]).await.unwrap();
        assert_eq!(h.connection.last_response(), Some(first));

        h.connection.request(Method::POST, "/b.json", vec![]).await.unwrap();
        assert_eq!(h.connection.last_response(), Some(second.clone()));

        // An error status fails the handle step, so nothing new is captured.
        h.connection.request(Method::GET, "/c.json", vec![]).await.unwrap_err();
        assert_eq!(h.connection.last_response(), Some(second));
        assert_eq!(h.events.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_arguments_forwarded_to_transport() {
        let h = harness(vec![Ok(Response::new(201))], false);
        let args = vec![json!({"order": {"id": 1}}), json!({"X-Extra": "1"})];

        h.connection
            .request(Method::POST, "/orders.json", args.clone())
            .await
            .unwrap();

        let seen = h.connection.transport().seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, Method::POST);
        assert_eq!(seen[0].path, "/orders.json");
        assert_eq!(seen[0].arguments, args);
    }

    #[tokio::test]
    async fn test_custom_event_name_and_metrics() {
        let metrics = Arc::new(ConnectionMetrics::new("test"));
        let h = harness(
            vec![
                Ok(Response::new(200)),
                Err(RequestError::Timeout("slow".to_string())),
            ],
            false,
        );
        let custom = Arc::new(Mutex::new(0usize));
        let counter = custom.clone();
        h.connection.instrumenter().subscribe(
            "request.custom",
            Arc::new(move |_: &Event| *counter.lock().unwrap() += 1),
        );
        let connection = h
            .connection
            .with_event_name("request.custom")
            .with_metrics(metrics.clone());

        connection.request(Method::GET, "/shop.json", vec![]).await.unwrap();
        connection.request(Method::GET, "/shop.json", vec![]).await.unwrap_err();

        assert_eq!(*custom.lock().unwrap(), 1);
        assert!(h.events.lock().unwrap().is_empty());
        assert_eq!(
            metrics.requests_total.with_label_values(&["GET", "200"]).get(),
            1
        );
        assert_eq!(
            metrics.requests_total.with_label_values(&["GET", "error"]).get(),
            1
        );
    }

    /// Transport that treats 404 as an empty success.
    struct LenientTransport {
        executed: Mutex<usize>,
    }

    #[async_trait]
    impl Transport for LenientTransport {
        async fn execute(&self, _request: &Request) -> Result<Response, RequestError> {
            *self.executed.lock().unwrap() += 1;
            Ok(Response::new(404).with_header(DEPRECATION_MARKER, "use /shop/v2.json"))
        }

        fn handle_response(&self, response: Response) -> Result<Response, RequestError> {
            if response.status == 404 {
                return Ok(response.with_body("{}"));
            }
            if response.is_success() {
                Ok(response)
            } else {
                Err(RequestError::Status { response })
            }
        }
    }

    #[tokio::test]
    async fn test_dispatch_uses_transport_handle_step() {
        let console = Arc::new(RecordingConsole::default());
        let channel = Arc::new(RecordingChannel::default());
        let connection = Connection::new(
            LenientTransport {
                executed: Mutex::new(0),
            },
            DeprecationDetector::new(console.clone(), channel.clone()),
            Instrumenter::new(),
        );

        let response = connection
            .request(Method::GET, "/shop.json", vec![])
            .await
            .unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(response.body, "{}");
        assert_eq!(*connection.transport().executed.lock().unwrap(), 1);
        assert_eq!(connection.last_response(), Some(response));
        assert_eq!(console.lines.lock().unwrap().len(), 1);
        assert_eq!(channel.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_warning_and_alert_precede_event() {
        let reply = Response::new(200).with_header(DEPRECATION_MARKER, "old param");
        let h = harness(vec![Ok(reply)], false);

        let observed = Arc::new(Mutex::new(Vec::new()));
        let console = h.console.clone();
        let channel = h.channel.clone();
        let sink = observed.clone();
        h.connection.instrumenter().subscribe(
            REQUEST_EVENT,
            Arc::new(move |_: &Event| {
                let warned = console.lines.lock().unwrap().len();
                let alerted = channel.sent.lock().unwrap().len();
                sink.lock().unwrap().push((warned, alerted));
            }),
        );

        h.connection
            .request(Method::GET, "/shop.json", vec![])
            .await
            .unwrap();

        assert_eq!(*observed.lock().unwrap(), vec![(1, 1)]);
    }

    #[test]
    fn test_handle_response_captures_only_success() {
        let h = harness(vec![], false);

        let ok = h.connection.handle_response(Response::new(200)).unwrap();
        assert_eq!(h.connection.last_response(), Some(ok));

        let err = h.connection.handle_response(Response::new(503)).unwrap_err();
        assert_eq!(err.response().map(|r| r.status), Some(503));
        assert_eq!(h.connection.last_response().map(|r| r.status), Some(200));
    }
}
