use std::sync::Arc;

use talespin_images::CardRegistry;
use talespin_room::RoomDirectory;

/// Process-wide handle shared across every request: the room directory and
/// the immutable card registry built at boot. Cheap to clone (everything
/// behind an `Arc`), handed to `actix-web` as `app_data`.
pub struct Lobby {
    pub directory: Arc<RoomDirectory>,
    pub registry: Arc<CardRegistry>,
    pub default_win_points: u32,
}
