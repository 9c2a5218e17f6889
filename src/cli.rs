// ============================================================================
// Aichitect CLI: one design edit from the command line
// ============================================================================
//
// Usage examples:
//   aichitect -p "a bright scandinavian living room"            (text to image)
//   aichitect -p "industrial style" -i room.jpg                  (structural edit)
//   aichitect -p "add a floor lamp" -i room.jpg -r 20,40,120,200 (inpaint)
//   aichitect -p "add a rug" -i room.jpg -r 10,300,400,90 --display-size 800x600 --dry-run
//
// Regions are given in image pixels unless --display-size is set, in which
// case they are read as coordinates on a view of that size and mapped back.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Instant;

use clap::Parser;

use crate::canvas::{DisplayRect, Region, screen_to_image};
use crate::io::{ImageAsset, decode_data_uri, load_image_file, summarize_reference};
use crate::ops::ai::{CommandPipeline, DirectoryAssetHost};
use crate::ops::dispatch::DispatchPlan;
use crate::ops::orchestrator::{EditOrchestrator, plan_edit};
use crate::project::{DesignSession, GenerationQuota};
use crate::settings::AppSettings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Aichitect interior design generator.
#[derive(Parser, Debug)]
#[command(
    name = "aichitect",
    about = "Generate and edit interior design images from a prompt",
    long_about = "Generate a room from a prompt, restyle an existing photo, or redraw\n\
                  selected regions of it.\n\n\
                  Without --image a new image is generated. With --image and no\n\
                  --region the whole room is restyled. With one or more --region\n\
                  rectangles only those areas are redrawn."
)]
pub struct CliArgs {
    /// What to generate or change.
    #[arg(short, long)]
    pub prompt: String,

    /// Local image file to edit (PNG, JPEG, WEBP, BMP).
    #[arg(short, long, value_name = "FILE", conflicts_with = "image_url")]
    pub image: Option<PathBuf>,

    /// Already-hosted image to edit as a whole. Regions need a local --image.
    #[arg(long, value_name = "URL")]
    pub image_url: Option<String>,

    /// Rectangle to redraw, as X,Y,WIDTH,HEIGHT. Repeatable.
    #[arg(short, long = "region", value_name = "X,Y,W,H", allow_hyphen_values = true)]
    pub regions: Vec<Region>,

    /// Size of the view the --region coordinates were measured on.
    #[arg(long, value_name = "WxH")]
    pub display_size: Option<DisplaySize>,

    /// Write the rasterized selection mask (grayscale PNG) to this file.
    #[arg(long, value_name = "FILE")]
    pub mask_out: Option<PathBuf>,

    /// Write the image with region outlines drawn over it to this file.
    #[arg(long, value_name = "FILE")]
    pub overlay_out: Option<PathBuf>,

    /// Directory uploads are stored in (overrides the settings file).
    #[arg(long, value_name = "DIR")]
    pub asset_dir: Option<PathBuf>,

    /// Generation bridge command line (overrides the settings file).
    #[arg(long, value_name = "CMD")]
    pub pipeline_cmd: Option<String>,

    /// Print the pipeline call that would be made and exit without generating.
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the free-generation limit (the user is signed in).
    #[arg(long)]
    pub signed_in: bool,

    /// Print per-step timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

/// `WIDTHxHEIGHT` of the view regions were drawn on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplaySize {
    pub width: f32,
    pub height: f32,
}

impl FromStr for DisplaySize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
        let width: f32 = w.trim().parse().map_err(|_| format!("invalid width '{}'", w))?;
        let height: f32 = h.trim().parse().map_err(|_| format!("invalid height '{}'", h))?;
        if !(width > 0.0 && height > 0.0) {
            return Err(format!("display size must be positive, got '{}'", s));
        }
        Ok(Self { width, height })
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run one edit and return an OS exit code.
pub fn run(args: CliArgs) -> ExitCode {
    let mut settings = AppSettings::load();
    if let Some(dir) = &args.asset_dir {
        settings.asset_dir = dir.display().to_string();
    }
    if let Some(cmd) = &args.pipeline_cmd {
        settings.pipeline_command = cmd.clone();
    }

    let mut quota = GenerationQuota::new(settings.free_generations);
    if !args.dry_run && !args.signed_in && quota.is_exhausted() {
        eprintln!(
            "error: no free generations left.\n\
             Sign in and re-run with --signed-in to keep generating."
        );
        return ExitCode::FAILURE;
    }

    if args.verbose
        && let Some(path) = crate::logger::log_path()
    {
        println!("log: {}", path.display());
    }

    let started = Instant::now();
    let mut session = DesignSession::new_untitled(1);
    let base_pixels = match prepare_session(&mut session, &args) {
        Ok(pixels) => pixels,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if args.verbose {
        println!(
            "[prepare] {} region(s), {} masked pixel(s) in {:.1}ms",
            session.editor.model().len(),
            session.editor.mask().selected_pixels(),
            started.elapsed().as_secs_f64() * 1000.0
        );
    }

    if let Err(e) = write_previews(&session, base_pixels.as_ref(), &args) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    if args.dry_run {
        return match plan_edit(&session, &args.prompt, &settings.generation) {
            Ok(plan) => match serde_json::to_string_pretty(&summarized(plan)) {
                Ok(json) => {
                    println!("{}", json);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("error: could not format plan: {}", e);
                    ExitCode::FAILURE
                }
            },
            Err(e) => {
                eprintln!("error: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let Some(pipeline) = CommandPipeline::from_command_line(&settings.pipeline_command) else {
        eprintln!(
            "error: no generation pipeline configured.\n\
             Pass --pipeline-cmd or set pipeline_command in {}.",
            AppSettings::settings_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "the settings file".to_string())
        );
        return ExitCode::FAILURE;
    };
    let host = DirectoryAssetHost::new(settings.resolved_asset_dir());
    let mut orchestrator = EditOrchestrator::new(host, pipeline, settings.generation.clone());

    let t0 = Instant::now();
    let entry = match pollster::block_on(orchestrator.submit(&mut session, &args.prompt)) {
        Ok(entry) => entry,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if args.verbose {
        println!("[generate] {:.1}ms", t0.elapsed().as_secs_f64() * 1000.0);
    }
    println!("{}", entry.output);

    if !args.signed_in {
        quota.consume();
        settings.free_generations = quota.remaining();
        settings.save();
        if args.verbose {
            println!("{} free generation(s) left", quota.remaining());
        }
    }
    ExitCode::SUCCESS
}

// ============================================================================
// Session setup
// ============================================================================

/// Loads the base image into the session and draws the requested regions.
/// Returns the decoded pixels when a local image was given.
fn prepare_session(session: &mut DesignSession, args: &CliArgs) -> Result<Option<image::RgbaImage>, String> {
    if let Some(url) = &args.image_url {
        if !args.regions.is_empty() {
            return Err("--region needs a local --image so the mask matches its pixel size".into());
        }
        session.set_current_image(ImageAsset::Hosted(url.clone()), None);
        return Ok(None);
    }

    let Some(path) = &args.image else {
        if !args.regions.is_empty() {
            return Err("--region needs an --image to draw on".into());
        }
        return Ok(None);
    };

    let loaded = load_image_file(path).map_err(|e| format!("could not load '{}': {}", path.display(), e))?;
    log_info!("Loaded {} ({}x{})", path.display(), loaded.width, loaded.height);
    let pixels = decode_pixels(&loaded.asset)?;
    session.set_current_image(loaded.asset, Some((loaded.width, loaded.height)));

    let rect = view_rect(args.display_size, loaded.width, loaded.height);
    for region in &args.regions {
        let mapped = map_region(region, rect, loaded.width, loaded.height);
        if mapped.pixel_bounds(loaded.width, loaded.height).is_none() {
            log_warn!("Region {:?} lies outside the image and was skipped", region);
            continue;
        }
        session.editor.add_region(mapped);
    }
    Ok(Some(pixels))
}

fn view_rect(display: Option<DisplaySize>, width: u32, height: u32) -> DisplayRect {
    match display {
        Some(d) => DisplayRect::new(0.0, 0.0, d.width, d.height),
        None => DisplayRect::new(0.0, 0.0, width as f32, height as f32),
    }
}

/// Maps a rectangle measured on the view back into image pixels.
fn map_region(region: &Region, rect: DisplayRect, width: u32, height: u32) -> Region {
    let r = region.normalized();
    let a = screen_to_image(r.x, r.y, Some(rect), width, height);
    let b = screen_to_image(r.x + r.width, r.y + r.height, Some(rect), width, height);
    Region::from_corners(a, b)
}

fn decode_pixels(asset: &ImageAsset) -> Result<image::RgbaImage, String> {
    let ImageAsset::Inline(uri) = asset else {
        return Err("image is not inline".into());
    };
    let data = decode_data_uri(uri).map_err(|e| e.to_string())?;
    let img = image::load_from_memory(&data.bytes).map_err(|e| e.to_string())?;
    Ok(img.into_rgba8())
}

// ============================================================================
// Outputs
// ============================================================================

fn write_previews(session: &DesignSession, base: Option<&image::RgbaImage>, args: &CliArgs) -> Result<(), String> {
    if let Some(path) = &args.mask_out {
        if !session.editor.is_bound() {
            return Err("--mask-out needs a local --image".into());
        }
        let png = session.editor.mask().to_png().map_err(|e| e.to_string())?;
        write_file(path, &png)?;
    }
    if let Some(path) = &args.overlay_out {
        let Some(base) = base else {
            return Err("--overlay-out needs a local --image".into());
        };
        session
            .editor
            .render(base)
            .save(path)
            .map_err(|e| format!("could not write '{}': {}", path.display(), e))?;
        log_info!("Wrote overlay to {}", path.display());
    }
    Ok(())
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("could not create '{}': {}", parent.display(), e))?;
    }
    std::fs::write(path, bytes).map_err(|e| format!("could not write '{}': {}", path.display(), e))?;
    log_info!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Replaces inline payloads with a short summary so the plan stays readable.
fn summarized(mut plan: DispatchPlan) -> DispatchPlan {
    let p = &mut plan.parameters;
    for field in [&mut p.image, &mut p.mask, &mut p.control_image] {
        if let Some(reference) = field.as_mut() {
            *reference = summarize_reference(reference);
        }
    }
    plan
}
