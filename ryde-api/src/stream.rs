use axum::{
    extract::{Extension, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::{future, Stream, StreamExt};
use ryde_notify::ConnectionRegistry;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::middleware::auth::AuthedUser;
use crate::state::AppState;

/// Deregisters the connection when the client goes away and the SSE stream
/// is dropped.
struct ConnectionGuard {
    registry: Arc<ConnectionRegistry>,
    connection_id: Uuid,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let registry = self.registry.clone();
        let connection_id = self.connection_id;
        tokio::spawn(async move {
            registry.disconnect(connection_id).await;
        });
    }
}

/// Live notification channel. Registers this session with the connection
/// registry; every notification dispatched to the user while the stream is
/// open arrives as an SSE event named after its kind.
pub async fn notification_stream(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::unbounded_channel();
    let connection_id = Uuid::new_v4();
    state
        .registry
        .authenticate(connection_id, user.id, tx)
        .await;
    debug!(%connection_id, user_id = %user.id, "live channel opened");

    let guard = ConnectionGuard {
        registry: state.registry.clone(),
        connection_id,
    };

    let stream = UnboundedReceiverStream::new(rx).filter_map(move |notification| {
        // the guard lives exactly as long as the stream
        let _ = &guard;
        let event = Event::default()
            .event(notification.kind.as_str())
            .json_data(&notification);
        future::ready(match event {
            Ok(event) => Some(Ok::<_, Infallible>(event)),
            Err(e) => {
                warn!(error = %e, "failed to encode live payload");
                None
            }
        })
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
