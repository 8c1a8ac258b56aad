//! CRM adapter: projects applications onto the CRM's field keys and delivers them.
//!
//! Every call returns a typed [`IntegrationError`]; callers log and discard it.
//! There is no retry and no idempotency key, so repeated submissions produce
//! independent deliveries.

use std::time::Duration;

use chrono::{NaiveDate, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::CrmConfig;
use crate::models::application::{ApplicationStatus, NewApplication};

/// Failure talking to the CRM.
#[derive(Debug, thiserror::Error)]
pub enum IntegrationError {
    #[error("CRM request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("CRM rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Outcome of a delivery attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryReceipt {
    Delivered { status: u16 },
    /// The relevant endpoint or credential is not configured.
    Skipped,
}

impl DeliveryReceipt {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// A document signed outside the application form.
#[derive(Debug, Clone, Serialize)]
pub struct SignatureEvent {
    pub confirmation_number: String,
    pub document_id: String,
    pub document_name: Option<String>,
    pub driver_email: String,
    pub driver_name: Option<String>,
    pub signed_at: String,
}

#[derive(Debug, Clone)]
pub struct CrmClient {
    http: reqwest::Client,
    webhook_url: Option<String>,
    api_base: String,
    api_key: Option<String>,
    location_id: Option<String>,
    api_version: String,
}

/// Body of the duplicate-contact search.
#[derive(Debug, Deserialize)]
struct DuplicateSearch {
    contact: Option<ContactRef>,
}

#[derive(Debug, Deserialize)]
struct ContactRef {
    id: String,
}

impl CrmClient {
    /// Build a client, or `None` when neither a webhook nor an API key is configured.
    pub fn from_config(config: &CrmConfig) -> Result<Option<Self>, IntegrationError> {
        if config.webhook_url.is_none() && config.api_key.is_none() {
            return Ok(None);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Some(Self {
            http,
            webhook_url: config.webhook_url.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            location_id: config.location_id.clone(),
            api_version: config.api_version.clone(),
        }))
    }

    pub fn webhook_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Post a submitted application to the webhook.
    pub async fn deliver(
        &self,
        application: &NewApplication,
    ) -> Result<DeliveryReceipt, IntegrationError> {
        let Some(url) = self.webhook_url.as_deref() else {
            return Ok(DeliveryReceipt::Skipped);
        };

        let payload = webhook_payload(application);
        tracing::debug!(
            application_id = %application.application_id,
            fields = payload.len(),
            "Delivering application to CRM"
        );

        let response = self.http.post(url).json(&payload).send().await?;
        check_response(response).await
    }

    /// Post a signed-document record to the webhook.
    pub async fn deliver_signature(
        &self,
        event: &SignatureEvent,
    ) -> Result<DeliveryReceipt, IntegrationError> {
        let Some(url) = self.webhook_url.as_deref() else {
            return Ok(DeliveryReceipt::Skipped);
        };

        let payload = serde_json::json!({
            "type": "document_signature",
            "email": event.driver_email,
            "name": event.driver_name,
            "confirmation_number": event.confirmation_number,
            "document_id": event.document_id,
            "document_name": event.document_name,
            "signed_at": event.signed_at,
            "tags": "Document Signed",
        });

        let response = self.http.post(url).json(&payload).send().await?;
        check_response(response).await
    }

    /// Look up the CRM contact created for `email` by earlier deliveries.
    ///
    /// `Ok(None)` when the API key or location is not configured, or no contact matches.
    pub async fn find_contact_id(&self, email: &str) -> Result<Option<String>, IntegrationError> {
        let (Some(api_key), Some(location_id)) =
            (self.api_key.as_deref(), self.location_id.as_deref())
        else {
            return Ok(None);
        };

        let response = self
            .http
            .get(format!("{}/contacts/search/duplicate", self.api_base))
            .query(&[("locationId", location_id), ("email", email)])
            .bearer_auth(api_key)
            .header("Version", &self.api_version)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IntegrationError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let found: DuplicateSearch = response.json().await?;
        Ok(found.contact.map(|c| c.id))
    }

    /// Push a review status change onto an existing CRM contact.
    ///
    /// Skipped when no API key is configured or the contact was never linked.
    pub async fn update_contact_status(
        &self,
        contact_id: Option<&str>,
        status: ApplicationStatus,
    ) -> Result<DeliveryReceipt, IntegrationError> {
        let (Some(api_key), Some(contact_id)) = (self.api_key.as_deref(), contact_id) else {
            return Ok(DeliveryReceipt::Skipped);
        };

        let label = status_label(status);
        let body = serde_json::json!({
            "customFields": [{ "key": "application_status", "value": label }],
            "tags": [format!("Status: {label}")],
        });

        let response = self
            .http
            .put(format!("{}/contacts/{}", self.api_base, contact_id))
            .bearer_auth(api_key)
            .header("Version", &self.api_version)
            .json(&body)
            .send()
            .await?;
        check_response(response).await
    }
}

async fn check_response(response: reqwest::Response) -> Result<DeliveryReceipt, IntegrationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(DeliveryReceipt::Delivered {
            status: status.as_u16(),
        });
    }
    let body = response.text().await.unwrap_or_default();
    Err(IntegrationError::Rejected {
        status: status.as_u16(),
        body,
    })
}

/// Human label the CRM uses for a review status.
pub fn status_label(status: ApplicationStatus) -> &'static str {
    match status {
        ApplicationStatus::Pending => "Pending",
        ApplicationStatus::Review => "Under Review",
        ApplicationStatus::Background => "Background Check",
        ApplicationStatus::Approved => "Approved",
        ApplicationStatus::Rejected => "Rejected",
    }
}

/// Strip formatting and prefix a country code: 10 digits are assumed US.
pub fn format_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        0 => String::new(),
        10 => format!("+1{digits}"),
        _ => format!("+{digits}"),
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

/// Accumulates payload entries, dropping absent values.
struct Payload(Map<String, Value>);

impl Payload {
    fn put(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    fn text(&mut self, key: &str, value: Option<&str>) {
        if let Some(v) = value {
            self.put(key, v);
        }
    }

    fn date(&mut self, key: &str, value: Option<NaiveDate>) {
        if let Some(d) = value {
            self.put(key, d.format("%Y-%m-%d").to_string());
        }
    }

    fn flag(&mut self, key: &str, value: bool) {
        self.put(key, yes_no(value));
    }
}

/// Deterministic projection of an application onto the webhook's keys.
pub fn webhook_payload(app: &NewApplication) -> Map<String, Value> {
    let d = &app.details;
    let mut p = Payload(Map::new());

    p.put("firstName", app.first_name.as_str());
    p.put("lastName", app.last_name.as_str());
    p.put("email", app.email.as_str());
    p.put("phone", format_phone(&app.phone));

    p.put("application_id", app.application_id.as_str());
    p.put("application_status", status_label(app.status));
    p.put("position_type", app.position.label());
    p.put(
        "submitted_date",
        app.submitted_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    );

    p.date("date_of_birth", d.date_of_birth);
    p.date("earliest_start_date", d.start_date);
    p.text("street_address", d.street_address.as_deref());
    p.text("city", d.city.as_deref());
    p.text("state", d.state.as_deref());
    p.text("zip_code", d.zip_code.as_deref());

    p.text("cdl_number", d.cdl_number.as_deref());
    p.text("cdl_state", d.cdl_state.as_deref());
    p.text("cdl_class", d.cdl_class.as_deref());
    p.date("license_expiration", d.license_expiration);
    if let Some(endorsements) = &d.endorsements {
        p.put("endorsements", endorsements.join(", "));
    }
    p.flag("has_twic_card", d.has_twic);
    p.date("twic_expiration", d.twic_expiration);

    if let Some(years) = d.years_experience {
        p.put("years_experience", years);
    }
    p.flag("has_accidents_3yr", d.has_accidents);
    p.text("accident_details", d.accident_details.as_deref());
    p.flag("has_moving_violations", d.has_violations);
    p.text("violation_details", d.violation_details.as_deref());
    p.flag("has_duidwi", d.has_dui);

    p.text("employer_1_name", d.employer1_name.as_deref());
    p.text("employer_1_phone", d.employer1_phone.as_deref());
    p.date("employer_1_start_date", d.employer1_start_date);
    p.date("employer_1_end_date", d.employer1_end_date);
    p.text("employer_1_reason_leaving", d.employer1_reason_leaving.as_deref());
    p.text("employer_2_name", d.employer2_name.as_deref());
    p.text("employer_2_phone", d.employer2_phone.as_deref());
    p.date("employer_2_start_date", d.employer2_start_date);
    p.date("employer_2_end_date", d.employer2_end_date);
    p.text("employer_2_reason_leaving", d.employer2_reason_leaving.as_deref());

    p.flag("has_own_truck", d.has_own_truck);
    p.text("truck_year", d.truck_year.as_deref());
    p.text("truck_make", d.truck_make.as_deref());
    p.text("truck_model", d.truck_model.as_deref());
    p.text("truck_vin", d.truck_vin.as_deref());
    p.flag("has_trailer", d.has_trailer);
    p.text("trailer_type", d.trailer_type.as_deref());
    p.text("trailer_length", d.trailer_length.as_deref());

    p.text("reference_1_name", d.ref1_name.as_deref());
    p.text("reference_1_phone", d.ref1_phone.as_deref());
    p.text("reference_1_relationship", d.ref1_relationship.as_deref());
    p.text("reference_2_name", d.ref2_name.as_deref());
    p.text("reference_2_phone", d.ref2_phone.as_deref());
    p.text("reference_2_relationship", d.ref2_relationship.as_deref());

    p.text("electronic_signature", d.electronic_signature.as_deref());

    p.put("tags", format!("Driver Application,{}", app.position.label()));

    p.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::application::{ApplicationDetails, Position};
    use chrono::{TimeZone, Utc};

    fn sample_application() -> NewApplication {
        NewApplication {
            application_id: "JRML-2026-4821".to_string(),
            status: ApplicationStatus::Pending,
            submitted_at: Utc.with_ymd_and_hms(2026, 3, 2, 14, 30, 0).unwrap(),
            position: Position::OwnerOperator,
            first_name: "Jamie".to_string(),
            last_name: "Rivera".to_string(),
            email: "jamie@example.com".to_string(),
            phone: "(555) 123-4567".to_string(),
            details: ApplicationDetails {
                endorsements: Some(vec!["Hazmat".to_string(), "Tanker".to_string()]),
                has_twic: true,
                years_experience: Some(8),
                license_expiration: NaiveDate::from_ymd_opt(2028, 1, 31),
                ..Default::default()
            },
        }
    }

    fn config(webhook_url: Option<String>, api_base: String, api_key: Option<&str>) -> CrmConfig {
        CrmConfig {
            webhook_url,
            api_base,
            api_key: api_key.map(str::to_string),
            location_id: Some("loc-1".to_string()),
            api_version: "2021-07-28".to_string(),
            timeout_secs: 2,
        }
    }

    #[test]
    fn phone_normalization() {
        assert_eq!(format_phone("(555) 123-4567"), "+15551234567");
        assert_eq!(format_phone("44 20 7946 0958"), "+442079460958");
        assert_eq!(format_phone("n/a"), "");
    }

    #[test]
    fn payload_converts_values() {
        let payload = webhook_payload(&sample_application());
        assert_eq!(payload["phone"], "+15551234567");
        assert_eq!(payload["position_type"], "Owner Operator");
        assert_eq!(payload["application_status"], "Pending");
        assert_eq!(payload["endorsements"], "Hazmat, Tanker");
        assert_eq!(payload["has_twic_card"], "Yes");
        assert_eq!(payload["has_duidwi"], "No");
        assert_eq!(payload["years_experience"], 8);
        assert_eq!(payload["license_expiration"], "2028-01-31");
        assert_eq!(payload["submitted_date"], "2026-03-02T14:30:00.000Z");
        assert_eq!(payload["tags"], "Driver Application,Owner Operator");
    }

    #[test]
    fn payload_omits_absent_values() {
        let payload = webhook_payload(&sample_application());
        assert!(!payload.contains_key("city"));
        assert!(!payload.contains_key("truck_vin"));
        assert!(!payload.contains_key("employer_1_start_date"));
        assert!(payload.contains_key("has_own_truck"));
    }

    #[test]
    fn status_labels() {
        assert_eq!(status_label(ApplicationStatus::Review), "Under Review");
        assert_eq!(status_label(ApplicationStatus::Background), "Background Check");
    }

    #[test]
    fn unconfigured_client_is_absent() {
        let cfg = config(None, "http://localhost".to_string(), None);
        assert!(CrmClient::from_config(&cfg).unwrap().is_none());
    }

    #[tokio::test]
    async fn deliver_posts_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "application_id": "JRML-2026-4821",
                "email": "jamie@example.com"
            })))
            .with_status(200)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let cfg = config(Some(format!("{}/hook", server.url())), server.url(), None);
        let client = CrmClient::from_config(&cfg).unwrap().unwrap();
        let receipt = client.deliver(&sample_application()).await.unwrap();

        assert_eq!(receipt, DeliveryReceipt::Delivered { status: 200 });
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn deliver_reports_rejection() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/hook")
            .with_status(500)
            .with_body("upstream down")
            .create_async()
            .await;

        let cfg = config(Some(format!("{}/hook", server.url())), server.url(), None);
        let client = CrmClient::from_config(&cfg).unwrap().unwrap();
        let err = client.deliver(&sample_application()).await.unwrap_err();

        match err {
            IntegrationError::Rejected { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "upstream down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn deliver_reports_transport_failure() {
        let cfg = config(
            Some("http://127.0.0.1:9/hook".to_string()),
            "http://127.0.0.1:9".to_string(),
            None,
        );
        let client = CrmClient::from_config(&cfg).unwrap().unwrap();
        let err = client.deliver(&sample_application()).await.unwrap_err();
        assert!(matches!(err, IntegrationError::Transport(_)));
    }

    #[tokio::test]
    async fn status_update_requires_contact_and_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let cfg = config(Some(format!("{}/hook", server.url())), server.url(), None);
        let client = CrmClient::from_config(&cfg).unwrap().unwrap();
        let receipt = client
            .update_contact_status(Some("c-1"), ApplicationStatus::Approved)
            .await
            .unwrap();
        assert_eq!(receipt, DeliveryReceipt::Skipped);

        let cfg = config(None, server.url(), Some("key"));
        let client = CrmClient::from_config(&cfg).unwrap().unwrap();
        let receipt = client
            .update_contact_status(None, ApplicationStatus::Approved)
            .await
            .unwrap();
        assert_eq!(receipt, DeliveryReceipt::Skipped);

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn status_update_puts_label() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/contacts/c-42")
            .match_header("authorization", "Bearer secret-key")
            .match_header("version", "2021-07-28")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "tags": ["Status: Background Check"]
            })))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let cfg = config(None, server.url(), Some("secret-key"));
        let client = CrmClient::from_config(&cfg).unwrap().unwrap();
        let receipt = client
            .update_contact_status(Some("c-42"), ApplicationStatus::Background)
            .await
            .unwrap();

        assert!(receipt.is_delivered());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn contact_lookup_returns_matching_id() {
        let mut server = mockito::Server::new_async().await;
        let found = server
            .mock("GET", "/contacts/search/duplicate")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("locationId".into(), "loc-1".into()),
                mockito::Matcher::UrlEncoded("email".into(), "jamie@example.com".into()),
            ]))
            .match_header("authorization", "Bearer secret-key")
            .with_status(200)
            .with_body(r#"{"contact":{"id":"c-77","email":"jamie@example.com"}}"#)
            .expect(1)
            .create_async()
            .await;
        let missing = server
            .mock("GET", "/contacts/search/duplicate")
            .match_query(mockito::Matcher::UrlEncoded(
                "email".into(),
                "nobody@example.com".into(),
            ))
            .with_status(200)
            .with_body(r#"{"contact":null}"#)
            .expect(1)
            .create_async()
            .await;

        let cfg = config(None, server.url(), Some("secret-key"));
        let client = CrmClient::from_config(&cfg).unwrap().unwrap();

        let id = client.find_contact_id("jamie@example.com").await.unwrap();
        assert_eq!(id.as_deref(), Some("c-77"));
        let id = client.find_contact_id("nobody@example.com").await.unwrap();
        assert_eq!(id, None);

        found.assert_async().await;
        missing.assert_async().await;
    }

    #[tokio::test]
    async fn contact_lookup_needs_key_and_location() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let cfg = config(Some(format!("{}/hook", server.url())), server.url(), None);
        let client = CrmClient::from_config(&cfg).unwrap().unwrap();
        assert_eq!(client.find_contact_id("jamie@example.com").await.unwrap(), None);

        let mut cfg = config(None, server.url(), Some("secret-key"));
        cfg.location_id = None;
        let client = CrmClient::from_config(&cfg).unwrap().unwrap();
        assert_eq!(client.find_contact_id("jamie@example.com").await.unwrap(), None);

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn contact_lookup_reports_rejection() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/contacts/search/duplicate")
            .match_query(mockito::Matcher::Any)
            .with_status(401)
            .with_body("bad token")
            .create_async()
            .await;

        let cfg = config(None, server.url(), Some("secret-key"));
        let client = CrmClient::from_config(&cfg).unwrap().unwrap();
        let err = client.find_contact_id("jamie@example.com").await.unwrap_err();
        assert!(matches!(err, IntegrationError::Rejected { status: 401, .. }));
    }
}
