use actix_web::HttpResponse;
use actix_web::Responder;
use actix_web::web;
use serde::Deserialize;

use talespin_room::RoomConfig;
use talespin_room::WinCondition;
use talespin_room::bare_room_state;

use crate::state::Lobby;

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub win_condition: Option<WinCondition>,
    pub creator_name: Option<String>,
    pub password: Option<String>,
}

/// `POST /create` — allocates a room and spawns its mailbox task. Returns
/// the zero-member `RoomState` snapshot; the creator still has to connect
/// over `/ws` and send `JoinRoom` to actually occupy a seat.
pub async fn create(lobby: web::Data<Lobby>, body: web::Json<CreateRequest>) -> impl Responder {
    let body = body.into_inner();
    let win_condition = body.win_condition.unwrap_or(WinCondition::Points { target: lobby.default_win_points });
    let config = RoomConfig::new(win_condition, body.password);
    match lobby.directory.create(body.creator_name.clone(), config.clone()) {
        Ok(room_id) => HttpResponse::Ok().json(bare_room_state(room_id, body.creator_name, &config)),
        Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
    }
}

/// `POST /exists` — JSON string body, boolean response.
pub async fn exists(lobby: web::Data<Lobby>, body: web::Json<String>) -> impl Responder {
    HttpResponse::Ok().json(lobby.directory.exists(&body.into_inner()))
}

/// `GET /cards/{id}` — serves a transcoded card artifact straight off disk.
pub async fn card(lobby: web::Data<Lobby>, path: web::Path<String>) -> impl Responder {
    match lobby.registry.read(&path.into_inner()).await {
        Ok((bytes, mime)) => HttpResponse::Ok().content_type(mime).body(bytes),
        Err(_) => HttpResponse::NotFound().finish(),
    }
}
