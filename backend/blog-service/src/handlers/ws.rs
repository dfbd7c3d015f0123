/// WebSocket endpoint feeding the real-time transport
use actix_web::{web, HttpRequest, HttpResponse};
use actix_ws::Message;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::realtime::{RealtimeMessage, RealtimeTransport};
use crate::services::UserService;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// GET /ws/{user_id}
pub async fn connect(
    req: HttpRequest,
    body: web::Payload,
    users: web::Data<UserService>,
    transport: web::Data<RealtimeTransport>,
    user_id: web::Path<String>,
) -> Result<HttpResponse> {
    let user_id = user_id.into_inner();
    users.get(&user_id).await?;

    let (response, mut session, mut msg_stream) = actix_ws::handle(&req, body)
        .map_err(|e| AppError::BadRequest(format!("WebSocket handshake failed: {}", e)))?;

    let (tx, mut rx) = mpsc::unbounded_channel::<RealtimeMessage>();
    let transport = transport.get_ref().clone();
    let connection_id = transport.subscribe(&user_id, tx).await;
    info!(user_id = %user_id, connection_id = %connection_id, "WebSocket connected");

    actix_web::rt::spawn(async move {
        let hello = RealtimeMessage::connected(user_id.as_str(), connection_id.to_string());
        let mut open = match hello.to_json() {
            Ok(text) => session.text(text).await.is_ok(),
            Err(_) => true,
        };
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        let mut reason = None;

        while open {
            tokio::select! {
                frame = rx.recv() => match frame {
                    Some(message) => match message.to_json() {
                        Ok(text) => open = session.text(text).await.is_ok(),
                        Err(e) => warn!(error = %e, "Dropping unencodable frame"),
                    },
                    None => open = false,
                },
                incoming = msg_stream.next() => match incoming {
                    Some(Ok(Message::Ping(bytes))) => open = session.pong(&bytes).await.is_ok(),
                    Some(Ok(Message::Close(close))) => {
                        reason = close;
                        open = false;
                    }
                    Some(Ok(Message::Text(_))) => {
                        let reply = RealtimeMessage::error(
                            "PUSH_ONLY",
                            "This connection only delivers notifications",
                        );
                        if let Ok(text) = reply.to_json() {
                            open = session.text(text).await.is_ok();
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "WebSocket protocol error");
                        open = false;
                    }
                    None => open = false,
                },
                _ = heartbeat.tick() => open = session.ping(b"").await.is_ok(),
            }
        }

        transport.unsubscribe(&user_id, connection_id).await;
        let _ = session.close(reason).await;
        info!(user_id = %user_id, connection_id = %connection_id, "WebSocket disconnected");
    });

    Ok(response)
}
