use std::io;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::debug;

use crate::engine::{parse_date, parse_time, Engine, EngineError};
use crate::limits::MAX_LINE_BYTES;
use crate::model::{AvailabilitySummary, BookingId, DayStatus, DemandLevel};
use crate::observability;

/// One request per line, tagged by `op`. Dates and times arrive as strings so
/// that malformed values surface as `invalid_input`, not `bad_request`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    CheckConflicts {
        space_id: String,
        date: String,
        start_time: String,
        duration_hours: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exclude_booking_id: Option<String>,
    },
    CheckCoworking {
        plan_type: String,
        start_date: String,
        duration_days: u32,
    },
    AvailableSlots {
        space_id: String,
        date: String,
        duration_hours: f64,
    },
    Daily {
        space_id: String,
        date: String,
    },
    Weekly {
        space_id: String,
        start_date: String,
    },
}

impl Request {
    pub fn op(&self) -> &'static str {
        match self {
            Request::CheckConflicts { .. } => "check_conflicts",
            Request::CheckCoworking { .. } => "check_coworking",
            Request::AvailableSlots { .. } => "available_slots",
            Request::Daily { .. } => "daily",
            Request::Weekly { .. } => "weekly",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Not a well-formed request line.
    BadRequest,
    InvalidInput,
    /// Availability unknown: the store failed.
    Repository,
    Timeout,
    /// Booking refused at the admission gate.
    Rejected,
    /// The server could not encode its own answer.
    Internal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireError {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

impl Response {
    fn ok(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    fn err(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(WireError {
                kind,
                message: message.into(),
            }),
        }
    }
}

impl From<EngineError> for Response {
    fn from(e: EngineError) -> Self {
        let kind = match &e {
            // A stored event without a start time is a store data problem.
            EngineError::Repository(_) | EngineError::MissingStartTime(_) => ErrorKind::Repository,
            EngineError::Rejected(_) => ErrorKind::Rejected,
            _ => ErrorKind::InvalidInput,
        };
        Response::err(kind, e.to_string())
    }
}

/// Failure of one dispatched request.
#[derive(Debug)]
pub enum DispatchError {
    Engine(EngineError),
    Encode(serde_json::Error),
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::Engine(e) => write!(f, "{e}"),
            DispatchError::Encode(e) => write!(f, "could not encode result: {e}"),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::Engine(e) => Some(e),
            DispatchError::Encode(e) => Some(e),
        }
    }
}

impl From<EngineError> for DispatchError {
    fn from(e: EngineError) -> Self {
        DispatchError::Engine(e)
    }
}

impl From<DispatchError> for Response {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::Engine(e) => e.into(),
            DispatchError::Encode(e) => Response::err(ErrorKind::Internal, format!("could not encode result: {e}")),
        }
    }
}

/// A day summary with its demand band and calendar status.
#[derive(Debug, Serialize)]
struct DayView {
    #[serde(flatten)]
    summary: AvailabilitySummary,
    demand: DemandLevel,
    status: DayStatus,
}

impl From<AvailabilitySummary> for DayView {
    fn from(summary: AvailabilitySummary) -> Self {
        Self {
            demand: summary.demand(),
            status: summary.day_status(),
            summary,
        }
    }
}

fn to_value<T: Serialize>(value: T) -> Result<Value, DispatchError> {
    serde_json::to_value(value).map_err(DispatchError::Encode)
}

/// Run one decoded request against the engine.
pub async fn dispatch(engine: &Engine, request: Request) -> Result<Value, DispatchError> {
    match request {
        Request::CheckConflicts {
            space_id,
            date,
            start_time,
            duration_hours,
            exclude_booking_id,
        } => {
            let date = parse_date(&date)?;
            let start_time = parse_time(&start_time)?;
            let exclude = exclude_booking_id.map(BookingId);
            let result = engine
                .check_conflicts(&space_id, date, start_time, duration_hours, exclude.as_ref())
                .await?;
            to_value(result)
        }
        Request::CheckCoworking {
            plan_type,
            start_date,
            duration_days,
        } => {
            let start_date = parse_date(&start_date)?;
            let result = engine
                .check_coworking_availability(&plan_type, start_date, duration_days)
                .await?;
            to_value(result)
        }
        Request::AvailableSlots {
            space_id,
            date,
            duration_hours,
        } => {
            let date = parse_date(&date)?;
            to_value(engine.get_available_slots(&space_id, date, duration_hours).await?)
        }
        Request::Daily { space_id, date } => {
            let date = parse_date(&date)?;
            let summary = engine.get_daily_availability(&space_id, date).await?;
            to_value(DayView::from(summary))
        }
        Request::Weekly {
            space_id,
            start_date,
        } => {
            let start_date = parse_date(&start_date)?;
            let week = engine.get_weekly_availability(&space_id, start_date).await?;
            to_value(week.into_iter().map(DayView::from).collect::<Vec<_>>())
        }
    }
}

/// Decode, dispatch under `timeout`, and encode one request line.
pub async fn handle_line(engine: &Engine, line: &str, timeout: Duration) -> Response {
    let request: Request = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => return Response::err(ErrorKind::BadRequest, e.to_string()),
    };
    let op = request.op();
    match tokio::time::timeout(timeout, dispatch(engine, request)).await {
        Ok(Ok(result)) => Response::ok(result),
        Ok(Err(e)) => {
            debug!(op, "request failed: {e}");
            e.into()
        }
        Err(_) => {
            metrics::counter!(observability::REQUEST_TIMEOUTS_TOTAL, "op" => op).increment(1);
            Response::err(
                ErrorKind::Timeout,
                format!("{op} did not finish within {}ms; availability unknown", timeout.as_millis()),
            )
        }
    }
}

fn codec_to_io(e: LinesCodecError) -> io::Error {
    match e {
        LinesCodecError::Io(e) => e,
        other => io::Error::other(other),
    }
}

/// Serve newline-delimited JSON requests until the peer closes the stream.
pub async fn process_connection<S>(socket: S, engine: Arc<Engine>, timeout: Duration) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(socket, LinesCodec::new_with_max_length(MAX_LINE_BYTES));

    while let Some(line) = framed.next().await {
        let line = match line {
            Ok(line) => line,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                let resp = Response::err(ErrorKind::BadRequest, "request line too long");
                framed.send(serde_json::to_string(&resp)?).await.map_err(codec_to_io)?;
                return Ok(());
            }
            Err(e) => return Err(codec_to_io(e)),
        };
        if line.trim().is_empty() {
            continue;
        }
        let resp = handle_line(&engine, &line, timeout).await;
        framed.send(serde_json::to_string(&resp)?).await.map_err(codec_to_io)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::model::{Booking, BookingKind, BookingStatus};
    use crate::repository::{BookingRepository, InMemoryRepository, RepositoryError};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    const T: Duration = Duration::from_secs(5);

    fn engine() -> Engine {
        let booking = Booking {
            id: "BK001".into(),
            space_id: "conference-hall".into(),
            space_name: Some("Conference Hall".into()),
            date: "2024-02-01".parse().unwrap(),
            start_time: Some("09:00".parse().unwrap()),
            duration: 4.0,
            kind: BookingKind::Event,
            status: BookingStatus::Confirmed,
            user_id: None,
            owner_label: Some("John Doe".into()),
        };
        Engine::new(
            Arc::new(InMemoryRepository::from_bookings([booking])),
            EngineConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn request_decoding() {
        let req: Request = serde_json::from_str(
            r#"{"op":"check_conflicts","space_id":"hall","date":"2024-02-01","start_time":"10:00","duration_hours":2}"#,
        )
        .unwrap();
        assert_eq!(req.op(), "check_conflicts");
        assert!(matches!(req, Request::CheckConflicts { exclude_booking_id: None, .. }));

        assert!(serde_json::from_str::<Request>(r#"{"op":"book_now"}"#).is_err());
    }

    #[tokio::test]
    async fn conflict_over_the_wire() {
        let engine = engine();
        let resp = handle_line(
            &engine,
            r#"{"op":"check_conflicts","space_id":"conference-hall","date":"2024-02-01","start_time":"10:00","duration_hours":2}"#,
            T,
        )
        .await;
        assert!(resp.ok);
        let result = resp.result.unwrap();
        assert_eq!(result["hasConflict"], true);
        assert_eq!(result["conflicts"][0]["id"], "BK001");
        assert_eq!(result["suggestions"][0]["start"], "2024-02-01T13:00:00");
    }

    #[tokio::test]
    async fn malformed_values_are_invalid_input() {
        let engine = engine();
        let resp = handle_line(
            &engine,
            r#"{"op":"check_conflicts","space_id":"hall","date":"2024-02-31","start_time":"10:00","duration_hours":2}"#,
            T,
        )
        .await;
        assert!(!resp.ok);
        assert_eq!(resp.error.unwrap().kind, ErrorKind::InvalidInput);

        let resp = handle_line(
            &engine,
            r#"{"op":"available_slots","space_id":"hall","date":"2024-02-01","duration_hours":-2}"#,
            T,
        )
        .await;
        assert_eq!(resp.error.unwrap().kind, ErrorKind::InvalidInput);

        let resp = handle_line(&engine, "{not json", T).await;
        assert_eq!(resp.error.unwrap().kind, ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn daily_includes_demand_band() {
        let engine = engine();
        let resp = handle_line(&engine, r#"{"op":"daily","space_id":"conference-hall","date":"2024-02-01"}"#, T).await;
        let result = resp.result.unwrap();
        assert_eq!(result["bookedHours"], 4.0);
        assert_eq!(result["dayName"], "Thu");
        assert_eq!(result["demand"], "available");
        assert_eq!(result["status"], "partial");
    }

    #[tokio::test]
    async fn stored_event_without_start_is_a_store_error() {
        let booking = Booking {
            id: "BK009".into(),
            space_id: "studio".into(),
            space_name: None,
            date: "2024-02-01".parse().unwrap(),
            start_time: None,
            duration: 2.0,
            kind: BookingKind::Event,
            status: BookingStatus::Confirmed,
            user_id: None,
            owner_label: None,
        };
        let config = EngineConfig {
            default_start_time: None,
            ..EngineConfig::default()
        };
        let engine = Engine::new(Arc::new(InMemoryRepository::from_bookings([booking])), config).unwrap();
        let resp = handle_line(
            &engine,
            r#"{"op":"check_conflicts","space_id":"studio","date":"2024-02-01","start_time":"10:00","duration_hours":1}"#,
            T,
        )
        .await;
        assert!(!resp.ok);
        assert_eq!(resp.error.unwrap().kind, ErrorKind::Repository);
    }

    #[test]
    fn error_kinds_follow_the_failing_side() {
        let resp = Response::from(EngineError::Rejected("Found 1 scheduling conflict(s)".into()));
        assert_eq!(resp.error.unwrap().kind, ErrorKind::Rejected);

        let encode = serde_json::from_str::<Value>("{").unwrap_err();
        let resp = Response::from(DispatchError::Encode(encode));
        let error = resp.error.unwrap();
        assert_eq!(error.kind, ErrorKind::Internal);
        assert!(error.message.starts_with("could not encode result"));

        let resp = Response::from(DispatchError::from(EngineError::UnknownPlan("hot-desk".into())));
        assert_eq!(resp.error.unwrap().kind, ErrorKind::InvalidInput);
    }

    /// Store that never answers.
    struct StalledRepository;

    #[async_trait]
    impl BookingRepository for StalledRepository {
        async fn list_bookings(&self, _: &str, _: NaiveDate) -> Result<Vec<Booking>, RepositoryError> {
            futures::future::pending().await
        }

        async fn list_plan_bookings(&self, _: &str) -> Result<Vec<Booking>, RepositoryError> {
            futures::future::pending().await
        }
    }

    #[tokio::test]
    async fn stalled_store_times_out() {
        let engine = Engine::new(Arc::new(StalledRepository), EngineConfig::default()).unwrap();
        let resp = handle_line(
            &engine,
            r#"{"op":"check_coworking","plan_type":"day-pass","start_date":"2024-02-01","duration_days":1}"#,
            Duration::from_millis(50),
        )
        .await;
        assert!(!resp.ok);
        assert_eq!(resp.error.unwrap().kind, ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn connection_answers_each_line() {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let engine = Arc::new(engine());
        let task = tokio::spawn(process_connection(server, engine, T));

        let (read, mut write) = tokio::io::split(client);
        let mut lines = BufReader::new(read).lines();

        write
            .write_all(b"{\"op\":\"weekly\",\"space_id\":\"conference-hall\",\"start_date\":\"2024-02-01\"}\n\n")
            .await
            .unwrap();
        let line = lines.next_line().await.unwrap().unwrap();
        let resp: Response = serde_json::from_str(&line).unwrap();
        assert!(resp.ok);
        assert_eq!(resp.result.unwrap().as_array().unwrap().len(), 7);

        write.write_all(b"{\"op\":\"nope\"}\n").await.unwrap();
        let line = lines.next_line().await.unwrap().unwrap();
        let resp: Response = serde_json::from_str(&line).unwrap();
        assert_eq!(resp.error.unwrap().kind, ErrorKind::BadRequest);

        write.shutdown().await.unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn oversized_line_closes_connection() {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let task = tokio::spawn(process_connection(server, Arc::new(engine()), T));

        let (read, mut write) = tokio::io::split(client);
        let mut lines = BufReader::new(read).lines();
        let big = vec![b'x'; MAX_LINE_BYTES + 1];
        write.write_all(&big).await.unwrap();
        write.write_all(b"\n").await.unwrap();

        let line = lines.next_line().await.unwrap().unwrap();
        let resp: Response = serde_json::from_str(&line).unwrap();
        assert_eq!(resp.error.unwrap().kind, ErrorKind::BadRequest);
        task.await.unwrap().unwrap();
    }
}
