use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::clients::mailer::{EmailMessage, Mailer};

/// Outcome of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
}

#[must_use]
pub fn course_update_message(course_title: &str, to: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: format!("Обновление курса: {course_title}"),
        body: format!("Курс '{course_title}' был обновлён. Проверьте материалы!"),
    }
}

/// Sends one course-update notice per recipient.
///
/// A failed delivery is recorded in the report and does not stop the
/// remaining sends.
pub async fn notify_course_update(
    mailer: &dyn Mailer,
    course_id: i32,
    course_title: &str,
    recipients: &[String],
    max_concurrent: usize,
) -> DeliveryReport {
    let results: Vec<(String, bool)> = stream::iter(recipients.iter().cloned())
        .map(|to| async move {
            let message = course_update_message(course_title, &to);
            match mailer.send(&message).await {
                Ok(()) => (to, true),
                Err(e) => {
                    warn!(course_id, to = %to, error = %e, "Course update e-mail failed");
                    (to, false)
                }
            }
        })
        .buffer_unordered(max_concurrent.max(1))
        .collect()
        .await;

    let mut report = DeliveryReport::default();
    for (to, ok) in results {
        if ok {
            report.delivered.push(to);
        } else {
            report.failed.push(to);
        }
    }
    report.delivered.sort();
    report.failed.sort();

    metrics::counter!("notifications_sent_total", "outcome" => "delivered")
        .increment(report.delivered.len() as u64);
    metrics::counter!("notifications_sent_total", "outcome" => "failed")
        .increment(report.failed.len() as u64);

    info!(
        course_id,
        delivered = report.delivered.len(),
        failed = report.failed.len(),
        "Course update notifications sent"
    );

    report
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Records sent messages; fails a recipient a given number of times first.
    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<EmailMessage>>,
        pub failures_left: Mutex<HashMap<String, u32>>,
    }

    impl RecordingMailer {
        pub fn failing(to: &str, times: u32) -> Self {
            let mailer = Self::default();
            mailer
                .failures_left
                .lock()
                .unwrap()
                .insert(to.to_string(), times);
            mailer
        }

        pub fn recipients(&self) -> Vec<String> {
            let mut to: Vec<String> = self
                .sent
                .lock()
                .unwrap()
                .iter()
                .map(|m| m.to.clone())
                .collect();
            to.sort();
            to
        }
    }

    #[async_trait::async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
            {
                let mut failures = self.failures_left.lock().unwrap();
                if let Some(left) = failures.get_mut(&message.to)
                    && *left > 0
                {
                    *left -= 1;
                    anyhow::bail!("mailbox unavailable");
                }
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingMailer;
    use super::*;

    #[test]
    fn test_message_text() {
        let message = course_update_message("Rust", "a@example.com");
        assert_eq!(message.subject, "Обновление курса: Rust");
        assert_eq!(message.body, "Курс 'Rust' был обновлён. Проверьте материалы!");
        assert_eq!(message.to, "a@example.com");
    }

    #[tokio::test]
    async fn test_partial_failure_continues() {
        let mailer = RecordingMailer::failing("b@example.com", u32::MAX);
        let recipients = vec![
            "a@example.com".to_string(),
            "b@example.com".to_string(),
            "c@example.com".to_string(),
        ];

        let report = notify_course_update(&mailer, 1, "Rust", &recipients, 2).await;

        assert_eq!(report.delivered, vec!["a@example.com", "c@example.com"]);
        assert_eq!(report.failed, vec!["b@example.com"]);
        assert_eq!(mailer.recipients(), vec!["a@example.com", "c@example.com"]);
    }

    #[tokio::test]
    async fn test_no_recipients_is_empty_report() {
        let mailer = RecordingMailer::default();
        let report = notify_course_update(&mailer, 1, "Rust", &[], 4).await;
        assert_eq!(report, DeliveryReport::default());
    }
}
