use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, NaiveTime};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Deserializer, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, error};
use ulid::Ulid;

use crate::engine::EngineError;
use crate::identity::IdentityProvider;
use crate::limits::MAX_LINE_LEN;
use crate::model::{ReservationSummary, Slot};
use crate::observability::{self, op_label, status_label};
use crate::service::ReservationService;

/// One request line. Field names follow the web client's camelCase.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Request {
    AvailableSlots {
        date: NaiveDate,
    },
    Book {
        token: Option<String>,
        date: NaiveDate,
        #[serde(deserialize_with = "de_time")]
        time: NaiveTime,
        number_of_guests: u32,
    },
    ByDate {
        token: Option<String>,
        date: NaiveDate,
    },
    Mine {
        token: Option<String>,
    },
}

/// One response line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Response {
    Slots(Vec<Slot>),
    Booked { id: Ulid },
    Reservations(Vec<ReservationSummary>),
    Error { code: &'static str, message: String },
}

impl Response {
    fn bad_request(message: impl ToString) -> Self {
        Response::Error {
            code: "bad_request",
            message: message.to_string(),
        }
    }
}

impl From<EngineError> for Response {
    fn from(e: EngineError) -> Self {
        let message = if e.is_client_error() {
            e.to_string()
        } else {
            "internal error".to_string()
        };
        Response::Error {
            code: e.code(),
            message,
        }
    }
}

/// Accepts `HH:MM` (as the web client sends) or `HH:MM:SS`.
fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

fn de_time<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
    let raw = String::deserialize(d)?;
    parse_time(raw.trim()).ok_or_else(|| serde::de::Error::custom(format!("invalid time: {raw}")))
}

async fn dispatch(
    service: &ReservationService,
    identities: &dyn IdentityProvider,
    request: Request,
) -> Result<Response, EngineError> {
    match request {
        Request::AvailableSlots { date } => {
            Ok(Response::Slots(service.list_availability(date).await?))
        }
        Request::Book {
            token,
            date,
            time,
            number_of_guests,
        } => {
            let identity = identities.resolve(token.as_deref())?;
            let reservation = service
                .book(date, time, number_of_guests, &identity)
                .await?;
            Ok(Response::Booked { id: reservation.id })
        }
        Request::ByDate { token, date } => {
            let identity = identities.resolve(token.as_deref())?;
            Ok(Response::Reservations(
                service.list_for_date(date, identity.role).await?,
            ))
        }
        Request::Mine { token } => {
            let identity = identities.resolve(token.as_deref())?;
            Ok(Response::Reservations(service.list_mine(&identity).await?))
        }
    }
}

/// Parse, execute and time a single request line.
pub async fn handle_line(
    service: &ReservationService,
    identities: &dyn IdentityProvider,
    line: &str,
) -> Response {
    let request: Request = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => return Response::bad_request(e),
    };
    let op = op_label(&request);
    debug!("request {op}");

    let start = Instant::now();
    let result = dispatch(service, identities, request).await;
    metrics::histogram!(observability::REQUEST_DURATION_SECONDS, "op" => op)
        .record(start.elapsed().as_secs_f64());
    metrics::counter!(
        observability::REQUESTS_TOTAL,
        "op" => op,
        "status" => status_label(result.as_ref().err())
    )
    .increment(1);

    match result {
        Ok(response) => response,
        Err(e) => {
            if !e.is_client_error() {
                error!("{op} failed: {e}");
            }
            Response::from(e)
        }
    }
}

/// Serve newline-delimited JSON requests until the peer hangs up.
pub async fn process_connection<S>(
    socket: S,
    service: Arc<ReservationService>,
    identities: Arc<dyn IdentityProvider>,
) -> Result<(), LinesCodecError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(socket, LinesCodec::new_with_max_length(MAX_LINE_LEN));

    while let Some(line) = framed.next().await {
        let response = match line {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => handle_line(&service, identities.as_ref(), &line).await,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                Response::bad_request(format!("request line exceeds {MAX_LINE_LEN} bytes"))
            }
            Err(e) => return Err(e),
        };
        let out = serde_json::to_string(&response)
            .map_err(|e| LinesCodecError::Io(std::io::Error::other(e)))?;
        framed.send(out).await?;
    }

    Ok(())
}
