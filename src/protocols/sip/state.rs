//! SIP dialog state
//!
//! Dialogs are correlated by Call-ID, with From/To tags distinguishing
//! early and confirmed dialogs. State lives in the signaling flow's
//! context and survives any number of malformed packets in between.

use std::any::Any;
use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::protocols::traits::ProtocolStateData;

use super::types::{DialogState, MediaSummary};

/// One dialog, keyed by Call-ID in the dialog table.
#[derive(Debug, Clone)]
pub struct Dialog {
    pub state: DialogState,
    /// Tag of the dialog initiator (From on requests).
    pub local_tag: Option<String>,
    /// Tag assigned by the answering side (To on responses).
    pub remote_tag: Option<String>,
    /// Last seen CSeq sequence number.
    pub last_cseq: Option<u32>,
    /// Method of the most recent request.
    pub last_method: Option<String>,
    /// Media negotiated for this dialog, from the latest SDP seen.
    pub media: Vec<MediaSummary>,
    pub last_activity: DateTime<Utc>,
}

impl Dialog {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            state: DialogState::Trying,
            local_tag: None,
            remote_tag: None,
            last_cseq: None,
            last_method: None,
            media: Vec::new(),
            last_activity: now,
        }
    }

    /// Both tags known: the dialog is confirmed rather than early.
    pub fn is_confirmed(&self) -> bool {
        self.local_tag.is_some() && self.remote_tag.is_some()
    }
}

/// Dialog table for one signaling flow.
#[derive(Debug, Default)]
pub struct SipState {
    pub dialogs: HashMap<String, Dialog>,
}

impl SipState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dialog(&self, call_id: &str) -> Option<&Dialog> {
        self.dialogs.get(call_id)
    }

    /// Purge dialogs idle longer than `timeout`. Called lazily on
    /// dispatch; the engine itself runs no timers.
    pub fn expire(&mut self, now: DateTime<Utc>, timeout: Duration) -> usize {
        let before = self.dialogs.len();
        self.dialogs
            .retain(|_, d| d.last_activity + timeout >= now);
        before - self.dialogs.len()
    }

    /// Fold a request into the table. A request for an unknown Call-ID
    /// opens a dialog in `trying`; BYE and CANCEL terminate it; a fresh
    /// INVITE on a terminated Call-ID starts the dialog over.
    pub fn on_request(
        &mut self,
        call_id: &str,
        method: &str,
        from_tag: Option<&str>,
        cseq: Option<u32>,
        now: DateTime<Utc>,
    ) -> DialogState {
        let dialog = self
            .dialogs
            .entry(call_id.to_string())
            .or_insert_with(|| Dialog::new(now));

        dialog.last_activity = now;
        if cseq.is_some() {
            dialog.last_cseq = cseq;
        }
        if dialog.local_tag.is_none() {
            dialog.local_tag = from_tag.map(str::to_string);
        }
        dialog.last_method = Some(method.to_string());

        match method {
            "BYE" | "CANCEL" => dialog.state = DialogState::Terminated,
            "INVITE" if dialog.state == DialogState::Terminated => {
                dialog.state = DialogState::Trying;
                dialog.remote_tag = None;
            }
            _ => {}
        }
        dialog.state
    }

    /// Fold a response into the table. Responses never open dialogs: a
    /// response with no matching request reports `no-dialog`.
    pub fn on_response(
        &mut self,
        call_id: &str,
        code: u16,
        to_tag: Option<&str>,
        cseq: Option<u32>,
        now: DateTime<Utc>,
    ) -> DialogState {
        let Some(dialog) = self.dialogs.get_mut(call_id) else {
            return DialogState::NoDialog;
        };

        dialog.last_activity = now;
        if cseq.is_some() {
            dialog.last_cseq = cseq;
        }
        if dialog.remote_tag.is_none() {
            dialog.remote_tag = to_tag.map(str::to_string);
        }

        match code {
            100..=199 => {}
            200..=299 => {
                if dialog.state != DialogState::Terminated {
                    dialog.state = DialogState::Established;
                }
            }
            _ => {
                // Non-2xx final answers the pending request; it only kills
                // a dialog that never got established.
                if dialog.state == DialogState::Trying {
                    dialog.state = DialogState::Terminated;
                }
            }
        }
        dialog.state
    }

    /// Record the media negotiated by the latest SDP for a dialog.
    pub fn set_media(&mut self, call_id: &str, media: Vec<MediaSummary>) {
        if let Some(dialog) = self.dialogs.get_mut(call_id) {
            dialog.media = media;
        }
    }
}

impl ProtocolStateData for SipState {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
