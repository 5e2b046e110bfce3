//! HTTP + WebSocket front end.
//!
//! Boot order: logging, interrupt handler, env config, image pipeline
//! bootstrap, then the room directory and its garbage-collector task.
//! Everything downstream receives its dependencies by value/`Arc`; nothing
//! re-reads the environment after `Config::from_env`.

mod handlers;
mod state;
mod ws;

use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::App;
use actix_web::HttpServer;
use actix_web::middleware::Logger;
use actix_web::web;

use talespin_room::RoomDirectory;

use state::Lobby;

/// How often the directory sweeps closed room handles out of its map.
/// Independent of a room's own idle timeout, which governs when a room
/// decides to close itself.
const DIRECTORY_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    talespin_core::runtime::init_logging();
    talespin_core::runtime::install_interrupt_handler();

    let config = talespin_core::Config::from_env().unwrap_or_else(|e| {
        log::error!("invalid configuration: {e}");
        std::process::exit(1);
    });

    let registry = talespin_images::bootstrap(&config).await.unwrap_or_else(|e| {
        log::error!("image pipeline bootstrap failed: {e}");
        std::process::exit(1);
    });

    let card_ids: Arc<Vec<String>> = Arc::new((&registry).into_iter().map(|card| card.id.clone()).collect());
    let registry = Arc::new(registry);

    let directory = Arc::new(RoomDirectory::new(card_ids, config.moderator_grace, config.room_gc_idle));
    tokio::spawn(talespin_room::run_gc(directory.clone(), DIRECTORY_SWEEP_INTERVAL));

    let lobby = web::Data::new(Lobby { directory, registry, default_win_points: config.default_win_points });
    let bind_addr = config.bind_addr.clone();

    log::info!("starting talespin server on {bind_addr}");
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%r %s %Ts"))
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header(),
            )
            .app_data(lobby.clone())
            .route("/create", web::post().to(handlers::create))
            .route("/exists", web::post().to(handlers::exists))
            .route("/cards/{id}", web::get().to(handlers::card))
            .route("/ws", web::get().to(ws::ws_route))
    })
    .workers(4)
    .bind(bind_addr)?
    .run()
    .await
}
