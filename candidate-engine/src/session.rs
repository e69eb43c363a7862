//! Per-invocation telemetry records.
//!
//! A [`TelemetrySession`] holds one [`TelemetryRecord`] per session id. The
//! current record is filled from three sources:
//! - the host function the LLM looked at,
//! - every application attempt (the session is an [`Observer`]),
//! - the candidate the user finally picked.
//!
//! Records serialize to camelCase JSON; writing them anywhere is up to the
//! caller.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::candidate::{ApplicationPayload, ApplicationResult, Candidate, CandidateType};
use crate::errors::Result;
use crate::observer::{Notification, Observer};
use crate::suggestion::Suggestion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostFunctionTelemetry {
    pub host_function_size: usize,
    pub line_start: usize,
    pub line_end: usize,
    pub body_line_start: usize,
}

impl HostFunctionTelemetry {
    /// Host span derived from the function's source text and where it starts.
    pub fn from_snippet(code: &str, line_start: usize, body_line_start: usize) -> Self {
        let size = code.lines().count().max(1);
        Self {
            host_function_size: size,
            line_start,
            line_end: line_start + size - 1,
            body_line_start,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateTelemetry {
    pub line_start: i64,
    pub line_end: i64,
    pub candidate_type: CandidateType,
    pub application_result: ApplicationResult,
    pub reason: String,
}

impl From<&ApplicationPayload> for CandidateTelemetry {
    fn from(p: &ApplicationPayload) -> Self {
        Self {
            line_start: p.candidate.line_start,
            line_end: p.candidate.line_end,
            candidate_type: p.candidate.candidate_type,
            application_result: p.result,
            reason: p.reason.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidatesTelemetry {
    pub number_of_suggestions: usize,
    pub candidates: Vec<CandidateTelemetry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSelectionTelemetry {
    pub line_start: i64,
    pub line_end: i64,
    pub function_size: i64,
    /// Lines between the host body start and the candidate, `-1` if the
    /// host function is unknown.
    pub position_in_host_function: i64,
    pub selected_candidate_index: usize,
    pub candidate_type: CandidateType,
}

impl UserSelectionTelemetry {
    pub fn for_selection(
        candidate: &Candidate,
        selected_candidate_index: usize,
        host: Option<&HostFunctionTelemetry>,
    ) -> Self {
        let position_in_host_function = host
            .map(|h| candidate.line_start - h.body_line_start as i64)
            .unwrap_or(-1);
        Self {
            line_start: candidate.line_start,
            line_end: candidate.line_end,
            function_size: candidate.length(),
            position_in_host_function,
            selected_candidate_index,
            candidate_type: candidate.candidate_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_function: Option<HostFunctionTelemetry>,
    pub candidates: CandidatesTelemetry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_selection: Option<UserSelectionTelemetry>,
    #[serde(skip)]
    seen_suggestions: HashSet<Suggestion>,
}

impl TelemetryRecord {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            host_function: None,
            candidates: CandidatesTelemetry::default(),
            user_selection: None,
            seen_suggestions: HashSet::new(),
        }
    }

    /// One JSON object, no trailing newline.
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Default)]
pub struct TelemetrySession {
    records: Vec<TelemetryRecord>,
}

impl TelemetrySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh record and make it current.
    pub fn new_session(&mut self) -> Uuid {
        let record = TelemetryRecord::new();
        let id = record.id;
        self.records.push(record);
        debug!(%id, "telemetry session started");
        id
    }

    /// Id of the current record, starting one if none exists.
    pub fn current_session(&mut self) -> Uuid {
        self.current_mut().id
    }

    pub fn record_host_function(&mut self, host: HostFunctionTelemetry) -> &mut Self {
        self.current_mut().host_function = Some(host);
        self
    }

    pub fn record_user_selection(&mut self, candidate: &Candidate, index: usize) -> &mut Self {
        let record = self.current_mut();
        record.user_selection = Some(UserSelectionTelemetry::for_selection(
            candidate,
            index,
            record.host_function.as_ref(),
        ));
        self
    }

    pub fn get(&self, id: Uuid) -> Option<&TelemetryRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn current(&self) -> Option<&TelemetryRecord> {
        self.records.last()
    }

    pub fn records(&self) -> &[TelemetryRecord] {
        &self.records
    }

    fn current_mut(&mut self) -> &mut TelemetryRecord {
        if self.records.is_empty() {
            self.new_session();
        }
        let last = self.records.len() - 1;
        &mut self.records[last]
    }
}

impl Observer for TelemetrySession {
    fn update(&mut self, notification: &Notification) {
        let Some(payload) = notification.payload::<ApplicationPayload>() else {
            return;
        };
        let record = self.current_mut();
        if record.seen_suggestions.insert(payload.candidate.suggestion.as_ref().clone()) {
            record.candidates.number_of_suggestions += 1;
        }
        record.candidates.candidates.push(CandidateTelemetry::from(payload));
    }
}
