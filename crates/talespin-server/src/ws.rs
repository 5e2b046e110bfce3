use actix_web::HttpRequest;
use actix_web::HttpResponse;
use actix_web::web;
use futures::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::unbounded_channel;

use talespin_room::CLOSE_SENTINEL;
use talespin_room::ClientMessage;
use talespin_room::RoomConfig;
use talespin_room::RoomHandle;
use talespin_room::ServerMessage;
use talespin_room::bare_room_state;

use crate::state::Lobby;

/// `GET /ws` — a single upgrade endpoint for every room. A session isn't
/// addressed to a room until its first useful frame; `CreateRoom` allocates
/// one without binding, `JoinRoom` binds this session to a member of an
/// existing one.
pub async fn ws_route(req: HttpRequest, body: web::Payload, lobby: web::Data<Lobby>) -> actix_web::Result<HttpResponse> {
    let (response, mut session, mut stream) = actix_ws::handle(&req, body)?;
    let lobby = lobby.into_inner();

    actix_web::rt::spawn(async move {
        let (tx, mut rx) = unbounded_channel::<String>();
        let mut bound: Option<(RoomHandle, String)> = None;

        'sesh: loop {
            tokio::select! {
                biased;
                outgoing = rx.recv() => match outgoing {
                    Some(json) if json == CLOSE_SENTINEL => {
                        // This session's seat has been taken over by a newer
                        // one; forget `bound` so exit cleanup doesn't disconnect
                        // the seat out from under the session that now holds it.
                        bound = None;
                        let _ = session.close(None).await;
                        break 'sesh;
                    }
                    Some(json) => if session.text(json).await.is_err() { break 'sesh },
                    None => break 'sesh,
                },
                incoming = stream.next() => match incoming {
                    Some(Ok(actix_ws::Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(message) => on_message(&lobby, &tx, &mut session, &mut bound, message).await,
                            Err(e) => {
                                let _ = session.text(err_json(&format!("malformed message: {e}"))).await;
                                break 'sesh;
                            }
                        }
                    }
                    Some(Ok(actix_ws::Message::Close(_))) => break 'sesh,
                    Some(Err(_)) => break 'sesh,
                    None => break 'sesh,
                    _ => continue 'sesh,
                }
            }
        }

        if let Some((handle, name)) = bound {
            let _ = handle.disconnect(name);
        }
    });

    Ok(response)
}

async fn on_message(
    lobby: &Lobby,
    tx: &UnboundedSender<String>,
    session: &mut actix_ws::Session,
    bound: &mut Option<(RoomHandle, String)>,
    message: ClientMessage,
) {
    match message {
        ClientMessage::CreateRoom { win_condition, creator_name, password } => {
            let config = RoomConfig::new(win_condition, password);
            let reply = match lobby.directory.create(creator_name.clone(), config.clone()) {
                Ok(room_id) => bare_room_state(room_id, creator_name, &config),
                Err(e) => ServerMessage::ErrorMsg { reason: e.to_string() },
            };
            let _ = session.text(serde_json::to_string(&reply).expect("ServerMessage always serializes")).await;
        }
        ClientMessage::JoinRoom { room_id, name, token, password } if bound.is_none() => match lobby.directory.get(&room_id) {
            Some(handle) => {
                let _ = handle.join(name.clone(), token, password, tx.clone());
                *bound = Some((handle, name));
            }
            None => {
                let _ = session.text(serde_json::to_string(&ServerMessage::InvalidRoomId).expect("unit variant always serializes")).await;
            }
        },
        other => match bound.as_ref() {
            Some((handle, name)) => {
                let _ = handle.send(name.clone(), other);
            }
            None => {
                let _ = session.text(err_json("join or create a room before sending other commands")).await;
            }
        },
    }
}

fn err_json(reason: &str) -> String {
    serde_json::to_string(&ServerMessage::ErrorMsg { reason: reason.to_string() }).expect("ErrorMsg always serializes")
}
