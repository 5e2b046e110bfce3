//! Boot-time configuration, assembled once from `TALESPIN_*` environment
//! variables and passed down by value. No component re-reads the
//! environment after `Config::from_env` returns.

use std::path::PathBuf;
use std::time::Duration;

/// Output codec for transcoded cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardFormat {
    Avif { quality: u8, speed: u8 },
    Jpeg { quality: u8 },
}

impl CardFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            CardFormat::Avif { .. } => "avif",
            CardFormat::Jpeg { .. } => "jpg",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            CardFormat::Avif { .. } => "image/avif",
            CardFormat::Jpeg { .. } => "image/jpeg",
        }
    }

    /// Compact tag folded into the cache filename: encodes everything that
    /// changes the bytes written, so a parameter change invalidates old
    /// artifacts automatically instead of silently serving stale ones.
    pub fn tag(&self) -> String {
        match self {
            CardFormat::Avif { quality, speed } => format!("avif-q{quality}-s{speed}"),
            CardFormat::Jpeg { quality } => format!("jpeg-q{quality}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {field}: {value:?} ({reason})")]
    Invalid {
        field: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Full boot configuration. Built once in `main` and shared by reference.
#[derive(Debug, Clone)]
pub struct Config {
    pub extra_image_dirs: Vec<PathBuf>,
    pub disable_builtin_images: bool,
    pub sniff_extensionless_images: bool,
    pub cache_dir: PathBuf,
    pub card_aspect_ratio: (u32, u32),
    pub card_long_side: u32,
    pub card_format: CardFormat,
    pub card_avif_threads: usize,
    pub validate_cache_hits: bool,
    pub default_win_points: u32,
    pub bind_addr: String,
    pub room_gc_idle: Duration,
    pub moderator_grace: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let extra_image_dirs = std::env::var("TALESPIN_EXTRA_IMAGE_DIRS")
            .unwrap_or_default()
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| expand_tilde(l.to_string()))
            .collect();

        let disable_builtin_images = env_bool("TALESPIN_DISABLE_BUILTIN_IMAGES_P", false)?;
        let sniff_extensionless_images = env_bool("TALESPIN_SNIFF_EXTENSIONLESS_IMAGES_P", false)?;
        let validate_cache_hits = env_bool("TALESPIN_VALIDATE_CACHE_HITS_P", true)?;

        let cache_dir = std::env::var("TALESPIN_CACHE_DIR")
            .map(expand_tilde)
            .unwrap_or_else(|_| expand_tilde("~/.cache/talespin".to_string()));

        let card_aspect_ratio = match std::env::var("TALESPIN_CARD_ASPECT_RATIO") {
            Ok(raw) => parse_ratio(&raw)?,
            Err(_) => (2, 3),
        };

        let card_long_side = match std::env::var("TALESPIN_CARD_LONG_SIDE") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                field: "TALESPIN_CARD_LONG_SIDE",
                value: raw.clone(),
                reason: "must be a positive integer",
            })?,
            Err(_) => 1536,
        };

        let card_format = match std::env::var("TALESPIN_CARD_CACHE_FORMAT").as_deref() {
            Ok("jpeg") => CardFormat::Jpeg { quality: 90 },
            Ok("avif") | Err(_) => CardFormat::Avif {
                quality: 80,
                speed: 4,
            },
            Ok(other) => {
                return Err(ConfigError::Invalid {
                    field: "TALESPIN_CARD_CACHE_FORMAT",
                    value: other.to_string(),
                    reason: "must be \"avif\" or \"jpeg\"",
                });
            }
        };

        let card_avif_threads = std::env::var("TALESPIN_CARD_AVIF_THREADS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4));

        let default_win_points = std::env::var("TALESPIN_DEFAULT_WIN_POINTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let bind_addr =
            std::env::var("TALESPIN_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8081".to_string());

        let room_gc_idle = Duration::from_secs(
            std::env::var("TALESPIN_ROOM_GC_IDLE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(600),
        );

        let moderator_grace = Duration::from_secs(
            std::env::var("TALESPIN_MODERATOR_GRACE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
        );

        Ok(Self {
            extra_image_dirs,
            disable_builtin_images,
            sniff_extensionless_images,
            cache_dir,
            card_aspect_ratio,
            card_long_side,
            card_format,
            card_avif_threads,
            validate_cache_hits,
            default_win_points,
            bind_addr,
            room_gc_idle,
            moderator_grace,
        })
    }
}

fn env_bool(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "y" | "yes" | "true" | "1" => Ok(true),
            "n" | "no" | "false" | "0" => Ok(false),
            _ => Err(ConfigError::Invalid {
                field: key,
                value: raw,
                reason: "must be y/n",
            }),
        },
    }
}

fn parse_ratio(raw: &str) -> Result<(u32, u32), ConfigError> {
    let bad = || ConfigError::Invalid {
        field: "TALESPIN_CARD_ASPECT_RATIO",
        value: raw.to_string(),
        reason: "must look like \"2:3\"",
    };
    let (w, h) = raw.split_once(':').ok_or_else(bad)?;
    let w: u32 = w.trim().parse().map_err(|_| bad())?;
    let h: u32 = h.trim().parse().map_err(|_| bad())?;
    if w == 0 || h == 0 {
        return Err(bad());
    }
    Ok((w, h))
}

fn expand_tilde(raw: String) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_ratio() {
        assert_eq!(parse_ratio("2:3").unwrap(), (2, 3));
        assert_eq!(parse_ratio(" 16 : 9 ").unwrap(), (16, 9));
    }

    #[test]
    fn rejects_malformed_ratio() {
        assert!(parse_ratio("x").is_err());
        assert!(parse_ratio("2:0").is_err());
    }

    #[test]
    fn expands_home_relative_paths() {
        let old = std::env::var_os("HOME");
        unsafe { std::env::set_var("HOME", "/home/player") };
        assert_eq!(
            expand_tilde("~/cache".to_string()),
            PathBuf::from("/home/player/cache")
        );
        match old {
            Some(v) => unsafe { std::env::set_var("HOME", v) },
            None => unsafe { std::env::remove_var("HOME") },
        }
    }

    #[test]
    fn avif_tag_encodes_quality_and_speed() {
        let fmt = CardFormat::Avif {
            quality: 80,
            speed: 4,
        };
        assert_eq!(fmt.tag(), "avif-q80-s4");
        assert_eq!(fmt.extension(), "avif");
    }
}
