#![allow(dead_code)]
//! Shared fixtures for integration tests.

pub mod app;
pub mod failing_store;
pub mod mock_sender;

use alertgram::{Alert, AlertBatch, Annotations, Labels};

/// The sample payload used throughout the tests.
pub const DISK_FULL_PAYLOAD: &str = r#"{"status":"firing","alerts":[{"labels":{"severity":"critical"},"annotations":{"summary":"disk full","description":"95% used"},"generatorURL":"http://x"}]}"#;

pub fn alert(severity: &str, summary: &str) -> Alert {
    Alert {
        labels: Labels {
            severity: severity.to_string(),
        },
        annotations: Annotations {
            summary: summary.to_string(),
            description: format!("{summary} description"),
        },
        generator_url: "http://prometheus.local/graph".to_string(),
    }
}

pub fn batch(alerts: Vec<Alert>) -> AlertBatch {
    AlertBatch {
        status: "firing".to_string(),
        alerts,
    }
}
