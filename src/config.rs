use crate::field::DEFAULT_SCATTERED;
use crate::scene::DEFAULT_STARS;
use crate::typing::RevealStyle;
use anyhow::{Context, Result};
use clap::Parser;
use directories::ProjectDirs;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

const FPS_MIN: u32 = 10;
const FPS_MAX: u32 = 240;

#[derive(Parser, Debug)]
#[command(name = "masaic-intro", about = "Masaic intro, in your terminal")]
pub(crate) struct Args {
    /// frame rate cap
    #[arg(long)]
    pub(crate) fps: Option<u32>,

    /// seed for the node field and animation (random if omitted)
    #[arg(long)]
    pub(crate) seed: Option<u64>,

    /// number of scattered nodes around the constellations
    #[arg(long)]
    pub(crate) nodes: Option<usize>,

    /// number of background stars
    #[arg(long)]
    pub(crate) stars: Option<usize>,

    /// how the intro text appears
    #[arg(long, value_enum)]
    pub(crate) reveal: Option<RevealStyle>,

    /// turn off the bloom pass
    #[arg(long)]
    pub(crate) no_bloom: bool,

    /// turn off film grain
    #[arg(long)]
    pub(crate) no_noise: bool,

    /// plain 16-colour output
    #[arg(long)]
    pub(crate) no_color: bool,

    /// settings file (JSON); defaults to settings.json in the config dir
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,

    /// write logs here (the terminal is busy drawing)
    #[arg(long)]
    pub(crate) log_file: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct Settings {
    pub(crate) fps_cap: u32,
    pub(crate) seed: Option<u64>,
    pub(crate) scattered_nodes: usize,
    pub(crate) stars: usize,
    pub(crate) reveal: RevealStyle,
    pub(crate) enable_bloom: bool,
    pub(crate) enable_noise: bool,
    pub(crate) enable_color: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fps_cap: 60,
            seed: None,
            scattered_nodes: DEFAULT_SCATTERED,
            stars: DEFAULT_STARS,
            reveal: RevealStyle::Typewriter,
            enable_bloom: true,
            enable_noise: true,
            enable_color: true,
        }
    }
}

impl Settings {
    /// Command line wins over whatever the file said.
    pub(crate) fn apply_args(&mut self, args: &Args) {
        if let Some(fps) = args.fps {
            self.fps_cap = fps;
        }
        if args.seed.is_some() {
            self.seed = args.seed;
        }
        if let Some(n) = args.nodes {
            self.scattered_nodes = n;
        }
        if let Some(n) = args.stars {
            self.stars = n;
        }
        if let Some(r) = args.reveal {
            self.reveal = r;
        }
        if args.no_bloom {
            self.enable_bloom = false;
        }
        if args.no_noise {
            self.enable_noise = false;
        }
        if args.no_color {
            self.enable_color = false;
        }
    }

    pub(crate) fn validate(&mut self) {
        let fps = self.fps_cap.clamp(FPS_MIN, FPS_MAX);
        if fps != self.fps_cap {
            log::warn!("fps cap {} out of range, using {}", self.fps_cap, fps);
            self.fps_cap = fps;
        }
    }
}

pub(crate) fn default_settings_path() -> Option<PathBuf> {
    ProjectDirs::from("ai", "masaic", "masaic-intro")
        .map(|p| p.config_dir().join("settings.json"))
}

/// Reads settings from `path`. A missing file is not an error.
pub(crate) fn load_settings(path: &Path) -> Result<Settings> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("no settings at {}, using defaults", path.display());
            return Ok(Settings::default());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("could not read {}", path.display()));
        }
    };
    let s = serde_json::from_str::<Settings>(&text)
        .with_context(|| format!("could not parse settings in {}", path.display()))?;
    log::info!("loaded settings from {}", path.display());
    Ok(s)
}

/// File (explicit or default location), then command line, then clamping.
pub(crate) fn resolve(args: &Args) -> Result<Settings> {
    let path = args.config.clone().or_else(default_settings_path);
    let mut settings = match path {
        Some(p) => load_settings(&p)?,
        None => Settings::default(),
    };
    settings.apply_args(args);
    settings.validate();
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, body: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("masaic-intro-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let p = dir.join(name);
        fs::write(&p, body).unwrap();
        p
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let p = temp_file("partial.json", r#"{ "fps_cap": 30, "reveal": "smooth" }"#);
        let s = load_settings(&p).unwrap();
        assert_eq!(s.fps_cap, 30);
        assert_eq!(s.reveal, RevealStyle::Smooth);
        assert_eq!(s.scattered_nodes, DEFAULT_SCATTERED);
        assert!(s.enable_bloom);
    }

    #[test]
    fn missing_file_is_defaults_and_garbage_is_an_error() {
        let missing = std::env::temp_dir().join("masaic-intro-definitely-missing.json");
        assert_eq!(load_settings(&missing).unwrap(), Settings::default());

        let bad = temp_file("bad.json", "{ fps_cap: ");
        let err = load_settings(&bad).unwrap_err();
        assert!(format!("{err:#}").contains("could not parse settings"));
    }

    #[test]
    fn args_override_file_and_fps_is_clamped() {
        let p = temp_file("over.json", r#"{ "fps_cap": 30, "seed": 1, "stars": 10 }"#);
        let args = Args::parse_from([
            "masaic-intro",
            "--config",
            p.to_str().unwrap(),
            "--fps",
            "1000",
            "--seed",
            "42",
            "--no-bloom",
            "--reveal",
            "smooth",
        ]);
        let s = resolve(&args).unwrap();
        assert_eq!(s.fps_cap, FPS_MAX);
        assert_eq!(s.seed, Some(42));
        assert_eq!(s.stars, 10);
        assert!(!s.enable_bloom);
        assert!(s.enable_noise);
        assert_eq!(s.reveal, RevealStyle::Smooth);
    }
}
