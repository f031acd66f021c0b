use std::path::PathBuf;

use clap::{Parser, Subcommand};
use effects::EffectId;
use renderer::GpuPowerPreference;

#[derive(Parser, Debug)]
#[command(
    name = "shadefx",
    author,
    version,
    about = "Live WGSL image effects",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Image to open (PNG, JPEG, BMP or GIF). A generated placeholder is shown when omitted.
    #[arg(value_name = "IMAGE")]
    pub image: Option<PathBuf>,

    /// Effect to start with (see `shadefx effects`). Defaults to the last one used.
    #[arg(long, short, value_name = "KEY", value_parser = parse_effect)]
    pub effect: Option<EffectId>,

    /// Parameter override applied on top of the effect defaults; repeatable.
    #[arg(long = "param", short, value_name = "KEY=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, String)>,

    /// WGSL fragment shader replacing the catalog shader; `r` reloads it.
    #[arg(long, value_name = "FILE")]
    pub shader: Option<PathBuf>,

    /// Initial window size in logical pixels (e.g. `1280x800`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Render a single frame into this PNG without showing the window, then exit.
    #[arg(long, value_name = "PATH", value_parser = parse_export_path)]
    pub export: Option<PathBuf>,

    /// Directory for `s` snapshots; remembered for the next run.
    #[arg(long, value_name = "DIR")]
    pub export_dir: Option<PathBuf>,

    /// Prefer the high-performance GPU over the integrated one.
    #[arg(long)]
    pub high_power: bool,

    /// Neither read nor write the preferences file.
    #[arg(long)]
    pub no_prefs: bool,
}

impl RunArgs {
    pub fn power(&self) -> GpuPowerPreference {
        if self.high_power {
            GpuPowerPreference::High
        } else {
            GpuPowerPreference::Low
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the effect catalog.
    Effects(EffectsArgs),
    /// Inspect persisted preferences.
    Prefs(PrefsCommand),
}

#[derive(Parser, Debug)]
pub struct EffectsArgs {
    /// Print the catalog as JSON, including parameter ranges.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct PrefsCommand {
    #[command(subcommand)]
    pub action: PrefsAction,
}

#[derive(Subcommand, Debug)]
pub enum PrefsAction {
    /// Print resolved config, data and cache directories.
    Where,
    /// Print the stored preferences.
    Show,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_effect(value: &str) -> Result<EffectId, String> {
    EffectId::from_key(value).map_err(|_| {
        let known = EffectId::ALL.map(EffectId::key).join(", ");
        format!("unknown effect '{}'; expected one of: {known}", value.trim())
    })
}

pub fn parse_param(value: &str) -> Result<(String, String), String> {
    let (key, raw) = value
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{value}'"))?;
    let key = key.trim();
    let raw = raw.trim();
    if key.is_empty() {
        return Err("parameter name must not be empty".to_string());
    }
    if raw.is_empty() {
        return Err(format!("parameter '{key}' needs a value"));
    }
    Ok((key.to_string(), raw.to_string()))
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid width in window size".to_string())?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid height in window size".to_string())?;
    if width == 0 || height == 0 {
        return Err("window size must be greater than zero".into());
    }
    Ok((width, height))
}

pub fn parse_export_path(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => Ok(path),
        None => Err("export path has no extension; expected .png".to_string()),
        Some(other) => Err(format!(
            "unsupported export format '.{other}'; expected .png"
        )),
    }
}
