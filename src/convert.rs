use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::{
    error::{CardpressError, CardpressResult},
    pdf, source,
};

/// Convert each PNG in `src_dir` into a single-page PDF sized like the
/// template's first page, image stretched to the full page.
///
/// Scan order is sorted by file name. Files that fail to read or decode
/// are logged and skipped; the paths actually written come back.
#[tracing::instrument]
pub fn convert_pngs(
    src_dir: &Path,
    template: &Path,
    out_dir: &Path,
) -> CardpressResult<Vec<PathBuf>> {
    let template_doc = lopdf::Document::load(template).map_err(|e| {
        CardpressError::invalid_location(format!("open template '{}': {e}", template.display()))
    })?;
    let page_id = pdf::first_page_id(&template_doc).ok_or_else(|| {
        CardpressError::dimension(format!("template '{}' has no pages", template.display()))
    })?;
    let size = pdf::page_size(&template_doc, page_id)?;

    let files = sorted_files_with_extension(src_dir, "png")?;
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("create output directory '{}'", out_dir.display()))?;

    let mut written = Vec::new();
    for path in files {
        let img = match std::fs::read(&path)
            .map_err(|e| CardpressError::composite(format!("read '{}': {e}", path.display())))
            .and_then(|bytes| source::decode_raster(&bytes))
        {
            Ok(img) => img,
            Err(e) => {
                tracing::warn!("skipping '{}': {e}", path.display());
                continue;
            }
        };

        let (mut doc, page) = pdf::single_page_doc(size);
        let img_id = pdf::embed_raster(&mut doc, &img)?;
        pdf::register_xobject(&mut doc, page, "Im0", img_id)?;
        pdf::set_page_content(&mut doc, page, pdf::draw_image_ops("Im0", size.rect()))?;

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let out_path = out_dir.join(format!("{stem}.pdf"));
        pdf::save_compact(&mut doc, &out_path)?;
        written.push(out_path);
    }
    Ok(written)
}

/// Write a blank PDF matching the name and first-page size of every PDF in
/// `src_dir`.
///
/// Blank placeholders keep front/back sequences index-aligned when one
/// side of a card has no artwork.
#[tracing::instrument]
pub fn blank_copies(src_dir: &Path, out_dir: &Path) -> CardpressResult<Vec<PathBuf>> {
    let files = sorted_files_with_extension(src_dir, "pdf")?;
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("create output directory '{}'", out_dir.display()))?;

    let mut written = Vec::new();
    for path in files {
        let size = match lopdf::Document::load(&path)
            .map_err(|e| CardpressError::composite(format!("open '{}': {e}", path.display())))
            .and_then(|doc| {
                let page_id = pdf::first_page_id(&doc).ok_or_else(|| {
                    CardpressError::dimension(format!("'{}' has no pages", path.display()))
                })?;
                pdf::page_size(&doc, page_id)
            }) {
            Ok(size) => size,
            Err(e) => {
                tracing::warn!("skipping '{}': {e}", path.display());
                continue;
            }
        };

        let Some(name) = path.file_name() else {
            continue;
        };
        let (mut doc, _page) = pdf::single_page_doc(size);
        let out_path = out_dir.join(name);
        pdf::save_compact(&mut doc, &out_path)?;
        written.push(out_path);
    }
    Ok(written)
}

fn sorted_files_with_extension(dir: &Path, ext: &str) -> CardpressResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(CardpressError::invalid_location(format!(
            "'{}' is not a directory",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("read directory '{}'", dir.display()))?
    {
        let entry = entry.with_context(|| format!("read directory '{}'", dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let matched = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase() == ext)
            .unwrap_or(false);
        if matched {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
