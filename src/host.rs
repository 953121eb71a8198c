//! Host-frame messaging — outbound notifications for an embedding parent
//! page, written as JSON lines. The host reacts by resizing or stacking the
//! frame; nothing ever comes back, and a missing host just means the lines
//! go nowhere.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::log_warn;

/// Messages the embedding page understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HostMessage {
    /// Displayed content height changed.
    ResizeIframe { height: u32 },
    /// The lightbox opened — the frame should cover the page.
    ExpandIframe,
    /// The lightbox closed — back to inline size.
    ShrinkIframe,
}

/// Serializes [`HostMessage`]s onto a writer, one JSON object per line.
/// Repeated identical heights are coalesced so layout churn doesn't flood
/// the host.
pub struct HostLink {
    out: Box<dyn Write + Send>,
    last_height: Option<u32>,
}

impl HostLink {
    /// Link over stdout — the transport when the widget runs embedded.
    pub fn stdout() -> Self {
        Self::with_writer(Box::new(std::io::stdout()))
    }

    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out,
            last_height: None,
        }
    }

    /// Report a new content height (no-op when unchanged).
    pub fn resize(&mut self, height: u32) {
        if self.last_height == Some(height) {
            return;
        }
        self.last_height = Some(height);
        self.post(HostMessage::ResizeIframe { height });
    }

    pub fn expand(&mut self) {
        self.post(HostMessage::ExpandIframe);
    }

    pub fn shrink(&mut self) {
        self.post(HostMessage::ShrinkIframe);
    }

    fn post(&mut self, msg: HostMessage) {
        match serde_json::to_string(&msg) {
            Ok(line) => {
                if writeln!(self.out, "{}", line).is_err() {
                    log_warn!("host link write failed for {:?}", msg);
                }
                let _ = self.out.flush();
            }
            Err(e) => log_warn!("host message serialize failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn lines(capture: &Capture) -> Vec<String> {
        String::from_utf8(capture.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn messages_use_the_host_wire_shape() {
        assert_eq!(
            serde_json::to_string(&HostMessage::ResizeIframe { height: 420 }).unwrap(),
            r#"{"type":"resize-iframe","height":420}"#
        );
        assert_eq!(
            serde_json::to_string(&HostMessage::ExpandIframe).unwrap(),
            r#"{"type":"expand-iframe"}"#
        );
        assert_eq!(
            serde_json::to_string(&HostMessage::ShrinkIframe).unwrap(),
            r#"{"type":"shrink-iframe"}"#
        );
    }

    #[test]
    fn repeated_heights_are_coalesced() {
        let capture = Capture::default();
        let mut link = HostLink::with_writer(Box::new(capture.clone()));
        link.resize(300);
        link.resize(300);
        link.resize(360);
        assert_eq!(lines(&capture).len(), 2);
    }

    #[test]
    fn lightbox_transitions_emit_expand_and_shrink() {
        let capture = Capture::default();
        let mut link = HostLink::with_writer(Box::new(capture.clone()));
        link.expand();
        link.shrink();
        assert_eq!(
            lines(&capture),
            vec![
                r#"{"type":"expand-iframe"}"#.to_string(),
                r#"{"type":"shrink-iframe"}"#.to_string(),
            ]
        );
    }
}
