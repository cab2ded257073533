use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use super::{authenticated_request, mock_logged_in_state, spawn_app, test_request_with_db};
use async_trait::async_trait;
use newsroom_db::{DbPool, MIGRATOR};
use newsroom_mailer::{Delivery, DeliveryError, MailTransport, SharedTransport};
use newsroom_worker::{JobEvent, JobId, JobPayload, JobState};
use serde_json::{Value, json};

/// Keeps every delivered message in memory.
#[derive(Default)]
struct InboxTransport {
    inbox: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl MailTransport for InboxTransport {
    async fn send(
        &self,
        to_email: &str,
        subject: &str,
        _html_body: &str,
    ) -> Result<Delivery, DeliveryError> {
        self.inbox
            .lock()
            .unwrap()
            .push((to_email.to_string(), subject.to_string()));

        Ok(Delivery {
            message_id: format!("<{}@inbox>", subject.replace(' ', "-")),
        })
    }
}

#[sqlx::test(migrator = "MIGRATOR")]
async fn send_email_requires_login(pool: DbPool) {
    test_request_with_db::<_, _>(pool, |app| async move {
        app.server
            .get("/api/send-email")
            .add_query_param("email", "jane@example.com")
            .await
            .assert_status_unauthorized();

        assert!(app.email_queue.lease("test-worker").await.unwrap().is_none());
    })
    .await
}

#[sqlx::test(migrator = "MIGRATOR")]
async fn send_email_queues_five_test_emails(pool: DbPool) {
    authenticated_request::<_, _>(pool, |app, _user| async move {
        let response = app
            .server
            .get("/api/send-email")
            .add_query_param("email", "jane@example.com")
            .await;

        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["status"], 200);
        assert_eq!(body["message"], "Email sent successfully!");
        assert_eq!(body["job"]["queue"], "email-queue");

        let id = JobId(body["job"]["id"].as_i64().unwrap());
        let job = app.email_queue.find(id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Waiting);
        assert_eq!(job.attempts, 0);

        let JobPayload::SendEmails { emails } = job.payload().unwrap();
        let subjects: Vec<_> = emails.iter().map(|e| e.subject.as_str()).collect();
        assert_eq!(
            subjects,
            ["Test Email 1", "Test Email 2", "Test Email 3", "Test Email 4", "Test Email 5"]
        );
        assert!(emails.iter().all(|e| e.to_email == "jane@example.com"));
    })
    .await
}

#[sqlx::test(migrator = "MIGRATOR")]
async fn send_email_requires_an_address(pool: DbPool) {
    authenticated_request::<_, _>(pool, |app, _user| async move {
        app.server
            .get("/api/send-email")
            .await
            .assert_status_bad_request();
    })
    .await
}

#[sqlx::test(migrator = "MIGRATOR")]
async fn send_email_rejects_an_invalid_address(pool: DbPool) {
    authenticated_request::<_, _>(pool, |app, _user| async move {
        let response = app
            .server
            .get("/api/send-email")
            .add_query_param("email", "not-an-address")
            .await;

        response.assert_status_bad_request();
        response.assert_json(&json!({
            "errors": { "to_email": "must be a valid email address" }
        }));
        assert!(app.email_queue.lease("test-worker").await.unwrap().is_none());
    })
    .await
}

#[sqlx::test(migrator = "MIGRATOR")]
async fn send_email_fails_when_the_queue_is_unavailable(pool: DbPool) {
    authenticated_request::<_, _>(pool.clone(), |app, _user| async move {
        sqlx::query("drop table jobs").execute(&pool).await.unwrap();

        let response = app
            .server
            .get("/api/send-email")
            .add_query_param("email", "jane@example.com")
            .await;

        response.assert_status_internal_server_error();
        response.assert_json(&json!({
            "status": 500,
            "message": "Something went wrong. Please try again later",
        }));
    })
    .await
}

#[sqlx::test(migrator = "MIGRATOR")]
async fn embedded_workers_deliver_the_queued_batch(pool: DbPool) {
    let transport = Arc::new(InboxTransport::default());

    let shared: SharedTransport = transport.clone();
    let app = spawn_app(pool.clone(), move |state| {
        state.config.worker.embedded = true;
        state.mail_transport = shared;
    })
    .await;
    mock_logged_in_state(&app.server, &pool).await;

    let mut events = app.job_events.subscribe();

    app.server
        .get("/api/send-email")
        .add_query_param("email", "jane@example.com")
        .await
        .assert_status_ok();

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("no job event within 5 seconds")
        .unwrap();

    match event {
        JobEvent::Completed {
            delivered, failed, ..
        } => {
            assert_eq!(delivered, 5);
            assert_eq!(failed, 0);
        }
        other => panic!("expected a completed job, got {:?}", other),
    }

    let inbox = transport.inbox.lock().unwrap().clone();
    assert_eq!(inbox.len(), 5);
    assert_eq!(inbox[0], ("jane@example.com".to_string(), "Test Email 1".to_string()));
    assert_eq!(inbox[4].1, "Test Email 5");

    if let Some(monitor_task) = app.worker_monitor_task {
        monitor_task.abort();
        assert!(monitor_task.await.unwrap_err().is_cancelled());
    }
}
