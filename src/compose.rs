use std::path::Path;

use crate::{
    assets::{Asset, LayerEntry, RasterImage},
    blank,
    core::{PageSize, Rect},
    error::{CardpressError, CardpressResult},
    model::FitPolicy,
    pdf, raster,
};

/// SVG overlays rasterize above their target size so they stay sharp after
/// the PDF viewer scales them back down.
const SVG_OVERSAMPLE: f64 = 2.0;

const MAX_SVG_RASTER_DIM: u32 = 16_384;

/// Placement rectangle for an asset with the given natural size.
///
/// PDF user space has the origin at the bottom-left, so the native anchor
/// puts the asset's top edge at the page's top edge.
fn fit_rect(size: PageSize, natural_w: f64, natural_h: f64, fit: FitPolicy) -> Rect {
    match fit {
        FitPolicy::Stretch => size.rect(),
        FitPolicy::Native => Rect::new(0.0, size.height - natural_h, natural_w, size.height),
    }
}

/// Compose one combination bottom-to-top into a single-page PDF.
///
/// Raster layers embed as image XObjects, document layers graft as form
/// XObjects, SVG layers rasterize and embed. Blank vector overlays are
/// skipped without leaving a mark on the page.
#[tracing::instrument(skip(entries), fields(layers = entries.len()))]
pub fn compose_pdf(
    entries: &[&LayerEntry],
    size: PageSize,
    fit: FitPolicy,
    out_path: &Path,
) -> CardpressResult<()> {
    let (mut doc, page_id) = pdf::single_page_doc(size);
    let mut ops = Vec::new();
    let mut xobj_count = 0usize;

    for entry in entries {
        match &entry.asset {
            Asset::Raster(img) => {
                let rect = fit_rect(size, f64::from(img.width), f64::from(img.height), fit);
                let img_id = pdf::embed_raster(&mut doc, img)?;
                let name = format!("Im{xobj_count}");
                xobj_count += 1;
                pdf::register_xobject(&mut doc, page_id, &name, img_id)?;
                ops.extend(pdf::draw_image_ops(&name, rect));
            }
            Asset::Document(doc_ref) => {
                let src = pdf::load_document(&doc_ref.path)?;
                if blank::document_is_blank(&src).map_err(|e| {
                    CardpressError::composite(format!("'{}': {e}", doc_ref.path.display()))
                })? {
                    tracing::debug!("skipping blank overlay '{}'", doc_ref.path.display());
                    continue;
                }
                let src_page = pdf::first_page_id(&src).ok_or_else(|| {
                    CardpressError::composite(format!(
                        "'{}' has no pages",
                        doc_ref.path.display()
                    ))
                })?;
                // Validates the page has a usable, non-degenerate MediaBox.
                pdf::page_size(&src, src_page)?;
                let bbox = pdf::page_media_box(&src, src_page)?;

                let form_id = pdf::import_form_xobject(&mut doc, &src, src_page)?;
                let name = format!("Fm{xobj_count}");
                xobj_count += 1;
                pdf::register_xobject(&mut doc, page_id, &name, form_id)?;
                let rect = fit_rect(size, bbox.width(), bbox.height(), fit);
                ops.extend(pdf::draw_form_ops(&name, bbox, rect));
            }
            Asset::Svg(svg) => {
                if blank::svg_is_blank(&svg.tree) {
                    tracing::debug!("skipping blank svg overlay '{}'", entry.name);
                    continue;
                }
                let tree_size = svg.tree.size();
                let rect = fit_rect(
                    size,
                    f64::from(tree_size.width()),
                    f64::from(tree_size.height()),
                    fit,
                );
                let img = rasterize_svg(&svg.tree, rect.width(), rect.height(), SVG_OVERSAMPLE)?;
                let img_id = pdf::embed_raster(&mut doc, &img)?;
                let name = format!("Im{xobj_count}");
                xobj_count += 1;
                pdf::register_xobject(&mut doc, page_id, &name, img_id)?;
                ops.extend(pdf::draw_image_ops(&name, rect));
            }
        }
    }

    pdf::set_page_content(&mut doc, page_id, ops)?;
    pdf::save_compact(&mut doc, out_path)
}

/// Compose one combination bottom-to-top onto a transparent raster canvas.
///
/// Document layers cannot land on a raster canvas and fail the composite;
/// the batch driver rejects them before a run starts.
#[tracing::instrument(skip(entries), fields(layers = entries.len()))]
pub fn compose_png(
    entries: &[&LayerEntry],
    size: PageSize,
    fit: FitPolicy,
    out_path: &Path,
) -> CardpressResult<()> {
    let (width, height) = size.round_px();
    let mut canvas = raster::RasterCanvas::new(width, height)?;

    for entry in entries {
        match &entry.asset {
            Asset::Raster(img) => {
                let (buf, w, h) = place_raster(img, width, height, fit)?;
                canvas.blend_region(&buf, w, h, 0, 0)?;
            }
            Asset::Svg(svg) => {
                if blank::svg_is_blank(&svg.tree) {
                    tracing::debug!("skipping blank svg overlay '{}'", entry.name);
                    continue;
                }
                let (tw, th) = match fit {
                    FitPolicy::Stretch => (width, height),
                    FitPolicy::Native => {
                        let tree_size = svg.tree.size();
                        (
                            (tree_size.width().ceil() as u32).max(1),
                            (tree_size.height().ceil() as u32).max(1),
                        )
                    }
                };
                let img = rasterize_svg(&svg.tree, f64::from(tw), f64::from(th), 1.0)?;
                let mut buf = img.rgba8.as_slice().to_vec();
                raster::premultiply_rgba8_in_place(&mut buf);
                canvas.blend_region(&buf, img.width, img.height, 0, 0)?;
            }
            Asset::Document(doc_ref) => {
                return Err(CardpressError::precondition(format!(
                    "document '{}' cannot composite onto a raster canvas",
                    doc_ref.path.display()
                )));
            }
        }
    }

    canvas.save_png(out_path)
}

fn place_raster(
    img: &RasterImage,
    canvas_w: u32,
    canvas_h: u32,
    fit: FitPolicy,
) -> CardpressResult<(Vec<u8>, u32, u32)> {
    let needs_resize =
        fit == FitPolicy::Stretch && (img.width != canvas_w || img.height != canvas_h);
    let (mut buf, w, h) = if needs_resize {
        let buf = raster::resize_rgba(&img.rgba8, img.width, img.height, canvas_w, canvas_h)?;
        (buf, canvas_w, canvas_h)
    } else {
        (img.rgba8.as_slice().to_vec(), img.width, img.height)
    };
    raster::premultiply_rgba8_in_place(&mut buf);
    Ok((buf, w, h))
}

/// Rasterize an SVG tree to straight-alpha RGBA8 at roughly
/// `target_w x target_h` scaled by `oversample`.
fn rasterize_svg(
    tree: &usvg::Tree,
    target_w: f64,
    target_h: f64,
    oversample: f64,
) -> CardpressResult<RasterImage> {
    let width = (target_w * oversample).ceil().max(1.0) as u32;
    let height = (target_h * oversample).ceil().max(1.0) as u32;
    if width > MAX_SVG_RASTER_DIM || height > MAX_SVG_RASTER_DIM {
        return Err(CardpressError::composite(format!(
            "svg raster size too large: {width}x{height} (max {MAX_SVG_RASTER_DIM}x{MAX_SVG_RASTER_DIM})"
        )));
    }

    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| CardpressError::composite("failed to allocate svg pixmap"))?;

    let sx = (width as f32) / tree.size().width();
    let sy = (height as f32) / tree.size().height();
    let xform = resvg::tiny_skia::Transform::from_scale(sx, sy);
    resvg::render(tree, xform, &mut pixmap.as_mut());

    // Pixmap data is premultiplied; assets carry straight alpha.
    let mut rgba8 = pixmap.data().to_vec();
    raster::unpremultiply_rgba8_in_place(&mut rgba8);

    Ok(RasterImage {
        width,
        height,
        rgba8: std::sync::Arc::new(rgba8),
    })
}
