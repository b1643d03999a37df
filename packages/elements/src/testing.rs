//! Test fixtures and support utilities.
//!
//! These are useful for testing extractors built on the engine without
//! depending on real site documents: sample record specs, small bankish
//! documents, a tracing initializer, and a highlighter that records its
//! events for assertions.

use std::sync::{Mutex, Once};

use crate::document::{Document, Node};
use crate::highlight::Highlighter;
use crate::record::RecordSpec;
use std::sync::Arc;

/// Initialize tracing for tests, honoring `RUST_LOG`. Safe to call from
/// every test; only the first call installs the subscriber.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A bank-account record spec: `id` (identity), `label`, `balance`.
pub fn account_spec() -> Arc<RecordSpec> {
    RecordSpec::builder("account")
        .identity("id")
        .mandatory_field("label")
        .field("balance")
        .build()
}

/// A transaction record spec: `id` (identity), `date`, `label`,
/// `amount` (optional).
pub fn transaction_spec() -> Arc<RecordSpec> {
    RecordSpec::builder("transaction")
        .identity("id")
        .mandatory_field("label")
        .field("date")
        .field("amount")
        .build()
}

/// A small JSON accounts payload, two accounts in document order.
pub fn accounts_json() -> Document {
    Document::json(
        r#"{
            "accounts": {
                "main": {"id": "FR-001", "label": "  Compte courant ", "balance": "1 234,56"},
                "savings": {"id": "FR-002", "label": "Livret A", "balance": "10 000,00"}
            }
        }"#,
    )
    .expect("static fixture")
}

/// A small HTML transaction-history page with a header row.
pub fn history_html() -> Document {
    Document::html(
        r#"
        <html><body>
          <table id="history">
            <thead>
              <tr><th>Date</th><th>Libellé</th><th>Montant</th></tr>
            </thead>
            <tbody>
              <tr><td>12/03/2024</td><td>CB ACME</td><td>-12,34</td></tr>
              <tr><td>13/03/2024</td><td>VIR SALAIRE</td><td>2 000,00</td></tr>
            </tbody>
          </table>
          <a class="next" href="/history?page=2">Suivant</a>
        </body></html>
        "#,
    )
}

/// Highlighter recording enter/leave events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHighlighter {
    events: Mutex<Vec<String>>,
}

impl RecordingHighlighter {
    /// Fresh recorder.
    pub fn new() -> Self {
        RecordingHighlighter::default()
    }

    /// The events recorded so far, in order.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().expect("highlight events lock").clone()
    }
}

impl Highlighter for RecordingHighlighter {
    fn enter(&self, node: &Node<'_>) {
        self.events
            .lock()
            .expect("highlight events lock")
            .push(format!("enter {}", node.describe()));
    }

    fn leave(&self, node: &Node<'_>) {
        self.events
            .lock()
            .expect("highlight events lock")
            .push(format!("leave {}", node.describe()));
    }
}
