//! Reconciliation of rendered views with live platform messages.

use std::future::Future;

use narrator_core::error::DomainError;
use narrator_core::ids::{ChatId, MessageId};
use narrator_core::transport::{MessageTransport, TransportError};
use narrator_roles::Scenario;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::menus::role_list;
use crate::view::RenderedView;

/// Runs `op`, retrying once after the platform-advised delay if throttled.
///
/// # Errors
///
/// Returns the error of the last attempt.
pub async fn with_throttle_retry<T, F, Fut>(mut op: F) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    match op().await {
        Err(TransportError::Throttled { retry_after }) => {
            warn!(?retry_after, "platform throttled, retrying once");
            tokio::time::sleep(retry_after).await;
            op().await
        }
        other => other,
    }
}

/// Pushes `view` to the live message `live`, returning the id of the message
/// that is authoritative afterwards.
///
/// Edits in place when possible. When the platform reports no text change,
/// only the menu is edited. When the live message is gone (or none is
/// recorded), a fresh message is sent and pinned on a best-effort basis.
///
/// # Errors
///
/// Returns `DomainError::Transport` for failures other than the stale and
/// unchanged cases, after one throttle retry.
pub async fn reconcile_view(
    transport: &dyn MessageTransport,
    chat_id: ChatId,
    live: Option<MessageId>,
    view: &RenderedView,
) -> Result<MessageId, DomainError> {
    if let Some(message_id) = live {
        let edited = with_throttle_retry(|| {
            transport.edit_message(chat_id, message_id, &view.text, &view.menu)
        })
        .await;
        let outcome = match edited {
            Err(TransportError::NotModified) => {
                with_throttle_retry(|| transport.edit_menu(chat_id, message_id, &view.menu)).await
            }
            other => other,
        };
        match outcome {
            Ok(()) | Err(TransportError::NotModified) => {
                debug!(%chat_id, %message_id, "view reconciled in place");
                return Ok(message_id);
            }
            Err(TransportError::MessageGone) => {
                debug!(%chat_id, %message_id, "live view is stale, sending a fresh one");
            }
            Err(err) => return Err(err.into()),
        }
    }

    let message_id =
        with_throttle_retry(|| transport.send_message(chat_id, &view.text, &view.menu)).await?;
    if let Err(err) = transport.pin_message(chat_id, message_id).await {
        warn!(%chat_id, %message_id, error = %err, "could not pin roster view");
    }
    debug!(%chat_id, %message_id, "fresh view is now authoritative");
    Ok(message_id)
}

/// The secondary role list message and the scenario it shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleListView {
    /// Live message id.
    pub message_id: MessageId,
    /// Scenario shown.
    pub scenario: String,
}

/// Shows `scenario`'s role list, re-rendering only when the scenario name
/// differs from the one currently shown. The superseded message is deleted
/// on a best-effort basis.
///
/// # Errors
///
/// Returns `DomainError::Transport` if the new list cannot be sent.
pub async fn reconcile_role_list(
    transport: &dyn MessageTransport,
    chat_id: ChatId,
    current: Option<RoleListView>,
    scenario: &Scenario,
) -> Result<RoleListView, DomainError> {
    if let Some(current) = current {
        if current.scenario == scenario.name {
            return Ok(current);
        }
        if let Err(err) = transport.delete_message(chat_id, current.message_id).await {
            debug!(%chat_id, error = %err, "superseded role list already gone");
        }
    }
    let view = role_list(scenario);
    let message_id =
        with_throttle_retry(|| transport.send_message(chat_id, &view.text, &view.menu)).await?;
    Ok(RoleListView {
        message_id,
        scenario: scenario.name.clone(),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use narrator_core::transport::{Choice, Menu};
    use narrator_test_support::{RecordingTransport, TransportCall, TransportOp};

    const CHAT: ChatId = ChatId(-100);

    fn view(text: &str) -> RenderedView {
        RenderedView {
            text: text.to_owned(),
            menu: Menu::empty().row(vec![Choice::new("1", "seat:take:1")]),
        }
    }

    #[tokio::test]
    async fn test_first_render_sends_and_pins() {
        let transport = RecordingTransport::new();

        let id = reconcile_view(&transport, CHAT, None, &view("roster")).await.unwrap();

        let calls = transport.calls();
        assert!(matches!(calls[0], TransportCall::Send { message_id, .. } if message_id == id));
        assert!(matches!(calls[1], TransportCall::Pin { message_id, .. } if message_id == id));
    }

    #[tokio::test]
    async fn test_changed_view_is_edited_in_place() {
        let transport = RecordingTransport::new();
        let id = reconcile_view(&transport, CHAT, None, &view("v1")).await.unwrap();

        let again = reconcile_view(&transport, CHAT, Some(id), &view("v2")).await.unwrap();

        assert_eq!(again, id);
        assert_eq!(transport.live_message(CHAT, id).unwrap().0, "v2");
        assert_eq!(transport.sent_texts(CHAT), vec!["v1".to_owned()]);
    }

    #[tokio::test]
    async fn test_unchanged_view_keeps_the_same_message() {
        let transport = RecordingTransport::new();
        let id = reconcile_view(&transport, CHAT, None, &view("same")).await.unwrap();
        transport.clear_calls();

        let again = reconcile_view(&transport, CHAT, Some(id), &view("same")).await.unwrap();

        assert_eq!(again, id);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_menu_only_change_edits_the_menu() {
        let transport = RecordingTransport::new();
        let id = reconcile_view(&transport, CHAT, None, &view("same")).await.unwrap();
        transport.clear_calls();
        transport.fail_next(TransportOp::Edit, TransportError::NotModified);
        let mut next = view("same");
        next.menu = Menu::empty().row(vec![Choice::new("2", "seat:take:2")]);

        reconcile_view(&transport, CHAT, Some(id), &next).await.unwrap();

        assert!(matches!(transport.calls()[0], TransportCall::EditMenu { .. }));
    }

    #[tokio::test]
    async fn test_stale_view_heals_with_a_fresh_message() {
        let transport = RecordingTransport::new();
        let old = reconcile_view(&transport, CHAT, None, &view("v1")).await.unwrap();
        transport.forget_message(CHAT, old);

        let fresh = reconcile_view(&transport, CHAT, Some(old), &view("v2")).await.unwrap();

        assert_ne!(fresh, old);
        assert_eq!(transport.live_message(CHAT, fresh).unwrap().0, "v2");
    }

    #[tokio::test]
    async fn test_pin_failure_is_tolerated() {
        let transport = RecordingTransport::new();
        transport.fail_next(TransportOp::Pin, TransportError::Rejected("not admin".into()));

        let result = reconcile_view(&transport, CHAT, None, &view("roster")).await;

        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_call_is_retried_once() {
        let transport = RecordingTransport::new();
        transport.fail_next(
            TransportOp::Send,
            TransportError::Throttled { retry_after: Duration::from_secs(3) },
        );

        let id = reconcile_view(&transport, CHAT, None, &view("roster")).await.unwrap();

        assert_eq!(transport.live_message(CHAT, id).unwrap().0, "roster");
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_throttling_surfaces_an_error() {
        let transport = RecordingTransport::new();
        for _ in 0..2 {
            transport.fail_next(
                TransportOp::Send,
                TransportError::Throttled { retry_after: Duration::from_secs(1) },
            );
        }

        let result = reconcile_view(&transport, CHAT, None, &view("roster")).await;

        assert!(matches!(
            result,
            Err(DomainError::Transport(TransportError::Throttled { .. }))
        ));
    }

    #[tokio::test]
    async fn test_role_list_rerenders_only_on_scenario_change() {
        let transport = RecordingTransport::new();
        let classic = Scenario::new("classic", [("citizen", 3), ("mafia", 2)]).unwrap();
        let big = Scenario::new("big", [("citizen", 4), ("mafia", 1)]).unwrap();

        let first = reconcile_role_list(&transport, CHAT, None, &classic).await.unwrap();
        let same = reconcile_role_list(&transport, CHAT, Some(first.clone()), &classic)
            .await
            .unwrap();
        let other = reconcile_role_list(&transport, CHAT, Some(same.clone()), &big)
            .await
            .unwrap();

        assert_eq!(first, same);
        assert_ne!(other.message_id, first.message_id);
        assert_eq!(transport.sent_texts(CHAT).len(), 2);
        assert!(transport.live_message(CHAT, first.message_id).is_none());
    }
}
