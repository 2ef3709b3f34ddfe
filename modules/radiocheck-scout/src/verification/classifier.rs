//! Content classification for stream probes.
//!
//! The HTTP layer reduces every probe to a [`ProbeObservation`]; the functions
//! here turn that into a verdict without touching the network, so the rules
//! can be exercised exhaustively in tests.

use radiocheck_common::VerificationOutcome;

/// Content types accepted as audio when verifying catalog entries.
pub const AUDIO_CONTENT_TYPES: &[&str] = &[
    "audio/",
    "mpegurl",
    "video/mp2t",
    "application/ogg",
    "application/x-mpegurl",
    "application/vnd.apple.mpegurl",
    "application/octet-stream",
    "video/mp4",
];

/// Narrower list used by passive network detection. Generic binary types are
/// left out because pages load plenty of those that are not streams.
pub const PASSIVE_AUDIO_CONTENT_TYPES: &[&str] = &[
    "audio/",
    "mpegurl",
    "video/mp2t",
    "application/ogg",
    "application/x-mpegurl",
    "application/vnd.apple.mpegurl",
];

/// What one probe saw on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeObservation {
    /// Headers arrived and the first body chunk (if any) was read.
    Response {
        status: u16,
        /// Lowercased `Content-Type`, empty when absent.
        content_type: String,
        /// Any `Icy-*` response header was present.
        icy: bool,
    },
    /// Connected, but headers or the first chunk did not arrive in time.
    Timeout(String),
    /// DNS, refused, reset, or connect timeout.
    Transport(String),
    /// TLS handshake or certificate failure.
    Tls(String),
    Other(String),
}

impl ProbeObservation {
    pub fn ok(status: u16, content_type: &str) -> Self {
        Self::Response {
            status,
            content_type: content_type.to_lowercase(),
            icy: false,
        }
    }

    pub fn icy(status: u16) -> Self {
        Self::Response {
            status,
            content_type: String::new(),
            icy: true,
        }
    }
}

pub fn is_audio_content_type(content_type: &str) -> bool {
    let ct = content_type.to_lowercase();
    AUDIO_CONTENT_TYPES.iter().any(|t| ct.contains(t))
}

pub fn is_passive_audio_content_type(content_type: &str) -> bool {
    let ct = content_type.to_lowercase();
    PASSIVE_AUDIO_CONTENT_TYPES.iter().any(|t| ct.contains(t))
}

fn is_page_content(ct: &str) -> bool {
    ct.contains("text/html") || ct.contains("image/")
}

/// Liveness verdict for a catalog entry.
pub fn classify(observation: &ProbeObservation) -> VerificationOutcome {
    match observation {
        ProbeObservation::Timeout(_) => VerificationOutcome::timeout("read timeout"),
        ProbeObservation::Transport(_) => VerificationOutcome::dead("connection error"),
        ProbeObservation::Tls(_) => VerificationOutcome::alive("SSL incompatible"),
        ProbeObservation::Other(msg) => VerificationOutcome::dead(msg.clone()),
        ProbeObservation::Response { status, .. } if *status >= 400 => {
            VerificationOutcome::dead(status.to_string())
        }
        ProbeObservation::Response {
            status,
            content_type,
            icy,
        } => {
            if *icy || is_audio_content_type(content_type) {
                VerificationOutcome::alive(status.to_string())
            } else if is_page_content(content_type) {
                VerificationOutcome::dead(format!("not audio ({content_type})"))
            } else {
                VerificationOutcome::alive(format!("{status} ({content_type})"))
            }
        }
    }
}

/// Acceptance check for discovery candidates. Pages, images and scripts are
/// rejected even when the status is fine; anything but a readable response
/// below 400 fails.
pub fn classify_strict(observation: &ProbeObservation) -> bool {
    match observation {
        ProbeObservation::Response {
            status,
            content_type,
            ..
        } => {
            if is_page_content(content_type) || content_type.contains("text/javascript") {
                return false;
            }
            *status < 400
        }
        _ => false,
    }
}
