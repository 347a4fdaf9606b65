use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use leadflow_core::config::CalendarConfig;
use leadflow_core::scheduling::{
    BookingConfirmation, BookingRequest, BusyInterval, CalendarClient, CalendarError, DayRange,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// REST client for the calendar service. Reached with a static bearer
/// token; interactive auth flows are out of scope.
pub struct HttpCalendarClient {
    http: reqwest::Client,
    base_url: String,
    api_token: Option<SecretString>,
    calendar_id: String,
}

impl HttpCalendarClient {
    pub fn from_config(config: &CalendarConfig) -> Result<Self, CalendarError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| CalendarError::Transport(error.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_token: config.api_token.clone(),
            calendar_id: config.calendar_id.clone(),
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }
}

#[async_trait]
impl CalendarClient for HttpCalendarClient {
    async fn busy_intervals(&self, range: DayRange) -> Result<Vec<BusyInterval>, CalendarError> {
        let url = format!("{}/v1/calendars/{}/busy", self.base_url, self.calendar_id);
        let request = self
            .http
            .get(&url)
            .query(&[("from", range.from.to_string()), ("to", range.to.to_string())]);

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|error| CalendarError::Transport(error.to_string()))?
            .error_for_status()
            .map_err(|error| CalendarError::Transport(error.to_string()))?;

        let body: BusyResponse =
            response.json().await.map_err(|error| CalendarError::Transport(error.to_string()))?;

        Ok(body
            .intervals
            .into_iter()
            .map(|interval| BusyInterval { start: interval.start, end: interval.end })
            .collect())
    }

    async fn book(&self, request: BookingRequest) -> Result<BookingConfirmation, CalendarError> {
        let url = format!("{}/v1/calendars/{}/events", self.base_url, self.calendar_id);
        let body = CreateEventRequest::from(&request);

        let response = self
            .authorize(self.http.post(&url).json(&body))
            .send()
            .await
            .map_err(|error| CalendarError::Transport(error.to_string()))?
            .error_for_status()
            .map_err(|error| CalendarError::Transport(error.to_string()))?;

        let created: CreateEventResponse =
            response.json().await.map_err(|error| CalendarError::Transport(error.to_string()))?;

        if created.id.is_empty() {
            return Err(CalendarError::Unconfirmed("event id missing in response".to_owned()));
        }

        Ok(BookingConfirmation { event_id: created.id, meet_link: created.meet_link })
    }
}

#[derive(Debug, Deserialize)]
struct BusyResponse {
    intervals: Vec<BusyIntervalBody>,
}

#[derive(Debug, Deserialize)]
struct BusyIntervalBody {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
struct CreateEventRequest {
    title: String,
    description: String,
    start: NaiveDateTime,
    end: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    attendee_email: Option<String>,
}

impl From<&BookingRequest> for CreateEventRequest {
    fn from(request: &BookingRequest) -> Self {
        Self {
            title: request.title.clone(),
            description: request.description.clone(),
            start: request.start,
            end: request.end,
            attendee_email: request.attendee_email.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateEventResponse {
    id: String,
    #[serde(default)]
    meet_link: Option<String>,
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use leadflow_core::config::CalendarConfig;
    use leadflow_core::scheduling::{BookingRequest, CalendarClient, CalendarError, DayRange};

    use super::{BusyResponse, CreateEventRequest, HttpCalendarClient};

    fn config() -> CalendarConfig {
        CalendarConfig {
            base_url: "http://127.0.0.1:9".to_owned(),
            api_token: None,
            calendar_id: "commercial".to_owned(),
        }
    }

    #[test]
    fn busy_response_decodes_iso_datetimes() {
        let body: BusyResponse = serde_json::from_str(
            r#"{"intervals":[{"start":"2026-08-10T14:00:00","end":"2026-08-10T15:00:00"}]}"#,
        )
        .expect("decode");

        assert_eq!(body.intervals.len(), 1);
        assert_eq!(
            body.intervals[0].start,
            NaiveDate::from_ymd_opt(2026, 8, 10).unwrap().and_hms_opt(14, 0, 0).unwrap()
        );
    }

    #[test]
    fn event_request_omits_absent_attendee() {
        let start = NaiveDate::from_ymd_opt(2026, 8, 10).unwrap().and_hms_opt(14, 0, 0).unwrap();
        let request = BookingRequest {
            title: "Reunião Comercial - Maria".to_owned(),
            description: "Reunião com lead.".to_owned(),
            start,
            end: start + chrono::Duration::minutes(30),
            attendee_email: None,
        };

        let value = serde_json::to_value(CreateEventRequest::from(&request)).expect("encode");
        assert!(value.get("attendee_email").is_none());
        assert_eq!(value["title"], "Reunião Comercial - Maria");
    }

    #[tokio::test]
    async fn transport_failures_are_classified() {
        let client = HttpCalendarClient::from_config(&config()).expect("client");
        let from = NaiveDate::from_ymd_opt(2026, 8, 10).unwrap();
        let result = client.busy_intervals(DayRange { from, to: from }).await;
        assert!(matches!(result, Err(CalendarError::Transport(_))));
    }
}
