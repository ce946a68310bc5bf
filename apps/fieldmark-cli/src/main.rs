//! fieldmark command-line front end
//!
//! Inspect a PDF, replay a placement script through the editor, or export a
//! stored field list.

mod script;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fieldmark_core::{
    export_fields, page_boxes, validate_fields, Editor, Field, FieldmarkConfig, FieldmarkError,
    FileStore, KeyValueStore, MemoryStore, NoSignature, PngSignature, SignatureCapture,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "fieldmark")]
#[command(version, about = "Place text, checkbox, radio and signature fields on a PDF")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the page count and page sizes (points) as JSON
    Pages { pdf: PathBuf },

    /// Replay a placement script through the editor and export the result
    Annotate {
        pdf: PathBuf,

        /// JSON placement script
        #[arg(long)]
        script: PathBuf,

        /// Signature image: PNG file or a file holding a PNG data URL
        #[arg(long)]
        signature: Option<PathBuf>,

        /// Directory to persist the field list in
        #[arg(long)]
        state_dir: Option<PathBuf>,

        /// Output path (defaults to the configured file name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Burn a stored field list into a PDF
    Export {
        pdf: PathBuf,

        /// JSON list of fields
        #[arg(long)]
        fields: PathBuf,

        #[arg(long)]
        signature: Option<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check a stored field list against a PDF without exporting
    Validate {
        pdf: PathBuf,

        #[arg(long)]
        fields: PathBuf,

        #[arg(long)]
        signature: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries JSON results
    let filter = EnvFilter::try_from_env("FIELDMARK_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match &args.config {
        Some(path) => FieldmarkConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => FieldmarkConfig::default(),
    };

    match args.command {
        Command::Pages { pdf } => pages(&pdf),
        Command::Annotate {
            pdf,
            script,
            signature,
            state_dir,
            output,
        } => annotate(config, &pdf, &script, signature.as_deref(), state_dir, output),
        Command::Export {
            pdf,
            fields,
            signature,
            output,
        } => export(&config, &pdf, &fields, signature.as_deref(), output),
        Command::Validate {
            pdf,
            fields,
            signature,
        } => validate(&pdf, &fields, signature.as_deref()),
    }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn load_signature(path: Option<&Path>) -> Result<Box<dyn SignatureCapture>> {
    let Some(path) = path else {
        return Ok(Box::new(NoSignature));
    };
    let bytes = read(path)?;
    let signature = match std::str::from_utf8(&bytes) {
        Ok(text) if text.trim_start().starts_with("data:") => {
            PngSignature::from_data_url(text.trim())?
        }
        _ => PngSignature::from_bytes(bytes),
    };
    Ok(Box::new(signature))
}

fn load_fields(path: &Path) -> Result<Vec<Field>> {
    let json = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing fields in {}", path.display()))
}

/// Guess the MIME type the way a file picker would, from the content
fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"%PDF") {
        fieldmark_core::PDF_MIME_TYPE
    } else {
        "application/octet-stream"
    }
}

fn output_path(output: Option<PathBuf>, config: &FieldmarkConfig) -> PathBuf {
    output.unwrap_or_else(|| PathBuf::from(&config.output.file_name))
}

fn pages(pdf: &Path) -> Result<()> {
    let boxes = page_boxes(&read(pdf)?)?;
    let report = serde_json::json!({
        "pageCount": boxes.len(),
        "pages": boxes,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn annotate(
    config: FieldmarkConfig,
    pdf: &Path,
    script_path: &Path,
    signature: Option<&Path>,
    state_dir: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let script: script::Script = serde_json::from_str(
        &fs::read_to_string(script_path)
            .with_context(|| format!("reading {}", script_path.display()))?,
    )
    .with_context(|| format!("parsing script {}", script_path.display()))?;
    let signature = load_signature(signature)?;
    let output = output_path(output, &config);
    let scale = config.export.screen_scale;

    let storage: Box<dyn KeyValueStore> = match state_dir {
        Some(dir) => Box::new(FileStore::new(dir)),
        None => Box::new(MemoryStore::new()),
    };
    let mut editor = Editor::new(config, storage);

    let bytes = read(pdf)?;
    let file_name = pdf
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mime = sniff_mime(&bytes);
    editor.open_document(file_name, mime, bytes.clone())?;

    // Stand-in for the renderer: measuring pages is enough to place clicks
    let boxes = match page_boxes(&bytes) {
        Ok(boxes) => boxes,
        Err(e) => return Err(editor.render_failed(e.to_string()).into()),
    };
    editor.document_rendered(boxes.len() as u32)?;

    let geometry = script
        .geometry
        .clone()
        .unwrap_or_else(|| script::natural_geometry(&boxes, scale));
    let applied = script::replay(&mut editor, &script, &geometry)?;
    tracing::info!(applied, fields = editor.fields().len(), "Script replayed");

    // Persisted fields survive unless the file was actually written
    let result = editor.export_and_deliver(signature.as_ref(), |result| {
        fs::write(&output, &result.bytes).map_err(|e| {
            FieldmarkError::Delivery(format!("writing {}: {}", output.display(), e))
        })
    })?;
    println!("{}", serde_json::to_string_pretty(&result.report)?);
    tracing::info!(output = %output.display(), "Wrote annotated PDF");
    Ok(())
}

fn export(
    config: &FieldmarkConfig,
    pdf: &Path,
    fields_path: &Path,
    signature: Option<&Path>,
    output: Option<PathBuf>,
) -> Result<()> {
    let fields = load_fields(fields_path)?;
    let signature = load_signature(signature)?;
    let output = output_path(output, config);

    let result = export_fields(&read(pdf)?, &fields, signature.as_ref(), &config.export)?;
    fs::write(&output, &result.bytes)
        .with_context(|| format!("writing {}", output.display()))?;
    println!("{}", serde_json::to_string_pretty(&result.report)?);
    tracing::info!(output = %output.display(), "Wrote annotated PDF");
    Ok(())
}

fn validate(pdf: &Path, fields_path: &Path, signature: Option<&Path>) -> Result<()> {
    let fields = load_fields(fields_path)?;
    let signature = load_signature(signature)?;
    let page_count = fieldmark_core::get_page_count(&read(pdf)?)?;

    let report = validate_fields(&fields, page_count, signature.as_ref());
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.valid {
        anyhow::bail!("{} field(s) failed validation", report.errors.len());
    }
    Ok(())
}
