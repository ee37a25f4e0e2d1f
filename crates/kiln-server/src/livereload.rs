//! WebSocket-based live reload.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use kiln_build::Notifier;

/// Path of the live reload WebSocket.
pub const SOCKET_PATH: &str = "/__livereload";

/// Path of the injected client script.
pub const SCRIPT_PATH: &str = "/__livereload.js";

/// Messages sent to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadMessage {
    /// Full page reload
    Reload,

    /// A rebuild failed
    Error {
        /// Task that failed
        title: String,
        /// Error text
        message: String,
    },

    /// Connection established
    Connected,
}

/// Handle to every connected browser session.
///
/// There is one hub per dev server process. It is cloned into the server,
/// the coordinator and the notifier rather than kept in a global.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    sender: broadcast::Sender<ReloadMessage>,
}

impl ReloadHub {
    /// Create a new hub.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send a message to all connected browsers.
    pub fn send(&self, msg: ReloadMessage) {
        // No receivers just means no browser is open
        let _ = self.sender.send(msg);
    }

    /// Subscribe to messages.
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.sender.subscribe()
    }

    /// Number of connected browsers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Tell every browser connected to `hub` to refresh.
pub fn reload(hub: &ReloadHub) {
    tracing::info!("Reloading {} browser(s)", hub.subscriber_count());
    hub.send(ReloadMessage::Reload);
}

/// Notifier that logs and forwards failures to connected browsers.
#[derive(Debug, Clone)]
pub struct BrowserNotifier {
    hub: ReloadHub,
}

impl BrowserNotifier {
    pub fn new(hub: ReloadHub) -> Self {
        Self { hub }
    }
}

impl Notifier for BrowserNotifier {
    fn notify(&self, title: &str, message: &str) {
        tracing::error!("{}: {}", title, message);
        self.hub.send(ReloadMessage::Error {
            title: title.to_string(),
            message: message.to_string(),
        });
    }
}

/// Insert the client script tag before `</body>`, or append it.
pub fn inject_client(html: &str) -> String {
    let tag = format!(r#"<script src="{}"></script>"#, SCRIPT_PATH);

    match html.to_ascii_lowercase().rfind("</body>") {
        Some(idx) => {
            let mut out = String::with_capacity(html.len() + tag.len());
            out.push_str(&html[..idx]);
            out.push_str(&tag);
            out.push_str(&html[idx..]);
            out
        }
        None => format!("{}{}", html, tag),
    }
}

/// Generate the client-side live reload script.
pub fn client_script() -> String {
    format!(
        r#"
(function() {{
  'use strict';

  var retries = 0;

  function banner(text) {{
    var el = document.getElementById('__kiln_error');
    if (!el) {{
      el = document.createElement('pre');
      el.id = '__kiln_error';
      el.style.cssText = 'position:fixed;left:0;right:0;bottom:0;margin:0;padding:1rem;' +
        'background:#2b0b0b;color:#ffb4b4;font:12px/1.4 monospace;z-index:2147483647;' +
        'white-space:pre-wrap;max-height:40vh;overflow:auto';
      document.body.appendChild(el);
    }}
    el.textContent = text;
  }}

  function connect() {{
    var proto = location.protocol === 'https:' ? 'wss://' : 'ws://';
    var ws = new WebSocket(proto + location.host + '{}');

    ws.onopen = function() {{
      if (retries > 0) {{
        location.reload();
        return;
      }}
      console.log('[kiln] Live reload connected');
    }};

    ws.onmessage = function(event) {{
      var msg = JSON.parse(event.data);

      switch (msg.type) {{
        case 'reload':
          location.reload();
          break;

        case 'error':
          console.error('[kiln] ' + msg.title + ': ' + msg.message);
          banner(msg.title + '\n\n' + msg.message);
          break;

        case 'connected':
          break;
      }}
    }};

    ws.onclose = function() {{
      if (retries < 10) {{
        retries++;
        setTimeout(connect, 1000 * retries);
      }}
    }};
  }}

  connect();
}})();
"#,
        SOCKET_PATH
    )
}
