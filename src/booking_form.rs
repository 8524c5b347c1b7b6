// Booking form: local validation and the native submission the workflow finally releases

use std::fmt;
use std::num::{IntErrorKind, ParseIntError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::{build_http_client, ApiError, ClientError};
use crate::clash_query::TimeSpecInput;
use crate::config::ClientConfig;
use crate::roster::ItemRoster;

// Inline validation message attached to one form field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

// Caller-side bound check for a typed quantity, run before ItemRoster::update_quantity
pub fn parse_quantity_input(field: &str, raw: &str, max_quantity: u32) -> Result<u32, FieldError> {
    let value: i64 = raw.trim().parse().map_err(|e: ParseIntError| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
            FieldError::new(field, format!("{} is out of range", raw.trim()))
        }
        _ => FieldError::new(field, format!("{:?} is not a whole number", raw)),
    })?;

    if value < 0 {
        return Err(FieldError::new(field, "quantity cannot be negative"));
    }
    if value > max_quantity as i64 {
        return Err(FieldError::new(
            field,
            format!("only {} available", max_quantity),
        ));
    }
    Ok(value as u32)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingForm {
    pub action: String,
    pub method: FormMethod,
    pub location: Option<String>,
    pub time: TimeSpecInput,
    // Hidden inputs carried through untouched
    pub hidden: Vec<(String, String)>,
}

impl BookingForm {
    // Booking submission form for an activity, as rendered by the timings page
    pub fn for_activity(activity_id: u64, time: TimeSpecInput, location: &str) -> Self {
        Self {
            action: format!("/book/{}/submit", activity_id),
            method: FormMethod::Get,
            location: Some(location.to_string()),
            time,
            hidden: Vec::new(),
        }
    }

    // Every problem at once, so the page can mark all offending fields
    pub fn validate(&self, roster: &ItemRoster) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if self
            .location
            .as_deref()
            .map_or(true, |l| l.trim().is_empty())
        {
            errors.push(FieldError::new("location", "a location is required"));
        }

        if let Err(err) = self.time.resolve() {
            errors.push(FieldError::new("time", err.to_string()));
        }

        for entry in roster.entries() {
            if entry.quantity > entry.max_quantity {
                errors.push(FieldError::new(
                    roster.quantity_key(&entry.item_id),
                    format!(
                        "{} requested but only {} available",
                        entry.quantity, entry.max_quantity
                    ),
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    // Field set the browser would send; time fields go out as typed, the server parses them itself
    pub fn native_submission(&self, roster: &ItemRoster) -> NativeSubmission {
        let mut fields = self.time.form_pairs();

        if let Some(location) = &self.location {
            fields.push(("location".to_string(), location.trim().to_string()));
        }
        fields.extend(
            roster
                .entries()
                .iter()
                .map(|e| (roster.quantity_key(&e.item_id), e.quantity.to_string())),
        );
        fields.extend(self.hidden.iter().cloned());

        NativeSubmission {
            method: self.method,
            action: self.action.clone(),
            fields,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeSubmission {
    pub method: FormMethod,
    pub action: String,
    pub fields: Vec<(String, String)>,
}

// The control that initiated an attempt; consumed by the one submission it authorises
#[derive(Debug, PartialEq, Eq)]
pub struct SubmitTarget {
    control_id: String,
}

impl SubmitTarget {
    pub fn new(control_id: impl Into<String>) -> Self {
        Self {
            control_id: control_id.into(),
        }
    }

    pub fn control_id(&self) -> &str {
        &self.control_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub status: u16,
    pub location: String,
    pub booking_id: Option<u64>,
}

#[async_trait]
pub trait FormSubmitter: Send + Sync {
    async fn submit(
        &self,
        target: SubmitTarget,
        submission: NativeSubmission,
    ) -> Result<SubmitReceipt, ApiError>;
}

// Submits the form over HTTP the way a browser would, following the success redirect
pub struct HttpFormSubmitter {
    config: ClientConfig,
    http: reqwest::Client,
}

impl HttpFormSubmitter {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let http = build_http_client(&config)?;
        Ok(Self { config, http })
    }
}

#[async_trait]
impl FormSubmitter for HttpFormSubmitter {
    async fn submit(
        &self,
        target: SubmitTarget,
        submission: NativeSubmission,
    ) -> Result<SubmitReceipt, ApiError> {
        let url = self
            .config
            .endpoint(&submission.action)
            .map_err(|e| ApiError::ClientError(e.to_string()))?;

        let request = match submission.method {
            FormMethod::Get => self.http.get(url).query(&submission.fields),
            FormMethod::Post => self.http.post(url).form(&submission.fields),
        };

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(e, self.config.timeout_ms))?;

        let status = response.status().as_u16();
        let location = response.url().path().to_string();
        if !response.status().is_success() {
            let body = response
                .bytes()
                .await
                .map_err(|e| ApiError::from_reqwest(e, self.config.timeout_ms))?;
            let err = ApiError::from_status(status, &body);
            warn!(control = target.control_id(), error = %err, "booking submission refused");
            return Err(err);
        }

        let booking_id = booking_id_from_location(&location);
        info!(
            control = target.control_id(),
            status,
            location = %location,
            booking_id = ?booking_id,
            "booking form submitted"
        );
        Ok(SubmitReceipt {
            status,
            location,
            booking_id,
        })
    }
}

// The server redirects a successful booking to /book/success/<id>, possibly under a mount prefix
pub fn booking_id_from_location(path: &str) -> Option<u64> {
    path.trim_end_matches('/')
        .rsplit_once("/book/success/")
        .and_then(|(_, id)| id.parse().ok())
}
