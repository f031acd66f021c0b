use std::fmt::Write as _;

use anyhow::{Context, Result};
use effects::{EffectDescriptor, ParamSpec};
use renderer::{ExportTarget, RendererConfig};
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::paths::AppPaths;
use crate::prefs::Prefs;

pub fn run(args: RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let prefs_file = paths.prefs_file();
    let mut prefs = if args.no_prefs {
        Prefs::default()
    } else {
        Prefs::load_or_default(&prefs_file)?
    };
    tracing::debug!(
        config = %paths.config_dir().display(),
        data = %paths.data_dir().display(),
        prefs = ?prefs,
        "resolved shadefx paths"
    );

    let config = build_config(&args, &prefs, &paths);
    let headless = config.export.is_some();
    let export_dir = config.export_dir.clone();
    tracing::info!(effect = %config.effect, headless, "starting shadefx");

    let summary = renderer::run(config)?;

    if args.no_prefs || headless {
        return Ok(());
    }
    prefs.set_effect(summary.effect);
    if args.export_dir.is_some() {
        prefs.export_dir = Some(export_dir);
    }
    prefs
        .persist(&prefs_file)
        .context("failed to save preferences")
}

pub fn build_config(args: &RunArgs, prefs: &Prefs, paths: &AppPaths) -> RendererConfig {
    let defaults = RendererConfig::default();
    RendererConfig {
        window_size: args.size.unwrap_or(defaults.window_size),
        effect: args.effect.unwrap_or_else(|| prefs.effect()),
        params: args.params.clone(),
        shader_override: args.shader.clone(),
        image: args.image.clone(),
        export_dir: args
            .export_dir
            .clone()
            .or_else(|| prefs.export_dir.clone())
            .unwrap_or_else(|| paths.default_export_dir()),
        export: args
            .export
            .clone()
            .map(|path| ExportTarget { path }),
        power: args.power(),
        ..defaults
    }
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn list_effects(json: bool) -> Result<()> {
    let catalog: Vec<&EffectDescriptor> = effects::descriptors().collect();
    if json {
        let rendered =
            serde_json::to_string_pretty(&catalog).context("failed to encode effect catalog")?;
        println!("{rendered}");
    } else {
        print!("{}", describe_catalog(&catalog));
    }
    Ok(())
}

fn describe_catalog(catalog: &[&EffectDescriptor]) -> String {
    let mut out = String::new();
    for (index, descriptor) in catalog.iter().enumerate() {
        let animated = if descriptor.animated { " (animated)" } else { "" };
        let _ = writeln!(
            out,
            "{}  {:<10} {}{animated}",
            index + 1,
            descriptor.id.key(),
            descriptor.description
        );
        for def in descriptor.params {
            let range = match def.spec {
                ParamSpec::Number { min, max, .. } => {
                    format!("{}..{}", def.spec.format(min.into()), def.spec.format(max.into()))
                }
                ParamSpec::Boolean { .. } => "on|off".to_string(),
            };
            let _ = write!(
                out,
                "     {:<20} {:<12} default {}",
                def.key,
                range,
                def.describe(def.spec.default_value())
            );
            if !def.choices.is_empty() {
                let _ = write!(out, "  [{}]", def.choices.join(", "));
            }
            out.push('\n');
        }
    }
    out
}

pub fn prefs_where(paths: &AppPaths) {
    println!("Configuration directories:");
    println!("  config:     {}", paths.config_dir().display());
    println!("  data:       {}", paths.data_dir().display());
    println!("  cache:      {}", paths.cache_dir().display());
    println!("  prefs:      {}", paths.prefs_file().display());
    println!("  snapshots:  {}", paths.default_export_dir().display());
}

pub fn prefs_show(paths: &AppPaths) -> Result<()> {
    let prefs = Prefs::load_or_default(&paths.prefs_file())?;
    println!("effect:      {}", prefs.effect());
    match &prefs.export_dir {
        Some(dir) => println!("export_dir:  {}", dir.display()),
        None => println!(
            "export_dir:  {} (default)",
            paths.default_export_dir().display()
        ),
    }
    Ok(())
}
