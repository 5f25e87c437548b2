//! Reply composition.
//!
//! Builds a plain-text RFC 5322 message (header block, blank line, body)
//! and encodes it with the URL-safe base64 alphabet (`-` and `_` in place
//! of `+` and `/`, padding kept), which is what the send endpoint expects
//! in its `raw` field.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;

/// Addressing and optional threading headers of a reply.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Envelope {
    pub to: String,
    pub from: String,
    pub subject: Option<String>,
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
}

impl Envelope {
    pub fn new(to: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            from: from.into(),
            ..Default::default()
        }
    }
}

/// A transport-ready reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyPayload {
    /// Full message text, URL-safe base64.
    pub raw: String,
}

impl ReplyPayload {
    /// Decode `raw` back into message text.
    pub fn decode(&self) -> Result<String, String> {
        let bytes = URL_SAFE.decode(&self.raw).map_err(|e| e.to_string())?;
        String::from_utf8(bytes).map_err(|e| e.to_string())
    }
}

/// Collapse line breaks so a value cannot start a new header.
fn header_value(value: &str) -> String {
    value.replace(&['\r', '\n'][..], " ").trim().to_string()
}

/// `Re: ` prefixed subject, without stacking prefixes.
pub fn reply_subject(subject: &str) -> String {
    let subject = subject.trim();
    if subject.get(..3).is_some_and(|p| p.eq_ignore_ascii_case("re:")) {
        subject.to_string()
    } else {
        format!("Re: {subject}")
    }
}

/// Compose a reply from plain addressing.
pub fn compose(to: &str, from: &str, body: &str) -> ReplyPayload {
    compose_with(&Envelope::new(to, from), body)
}

/// Compose a reply including any threading headers on the envelope.
pub fn compose_with(envelope: &Envelope, body: &str) -> ReplyPayload {
    let encoding = if body.is_ascii() { "7bit" } else { "8bit" };

    let mut text = String::with_capacity(256 + body.len());
    text.push_str("Content-Type: text/plain; charset=\"UTF-8\"\r\n");
    text.push_str("MIME-Version: 1.0\r\n");
    text.push_str(&format!("Content-Transfer-Encoding: {encoding}\r\n"));
    text.push_str(&format!("to: {}\r\n", header_value(&envelope.to)));
    text.push_str(&format!("from: {}\r\n", header_value(&envelope.from)));
    if let Some(subject) = &envelope.subject {
        text.push_str(&format!("Subject: {}\r\n", header_value(subject)));
    }
    if let Some(id) = &envelope.in_reply_to {
        text.push_str(&format!("In-Reply-To: {}\r\n", header_value(id)));
    }
    if let Some(refs) = &envelope.references {
        text.push_str(&format!("References: {}\r\n", header_value(refs)));
    }
    text.push_str("\r\n");
    text.push_str(body);

    ReplyPayload {
        raw: URL_SAFE.encode(text.as_bytes()),
    }
}

/// Holds the fixed reply body.
#[derive(Clone, Debug)]
pub struct MessageComposer {
    body: String,
    /// Add `Subject`/`In-Reply-To`/`References`.
    thread_headers: bool,
}

impl MessageComposer {
    pub fn new(body: impl Into<String>, thread_headers: bool) -> Self {
        Self {
            body: body.into(),
            thread_headers,
        }
    }

    pub fn reply(&self, envelope: &Envelope) -> ReplyPayload {
        if self.thread_headers {
            compose_with(envelope, &self.body)
        } else {
            compose(&envelope.to, &envelope.from, &self.body)
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
