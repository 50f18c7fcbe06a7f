use crate::{
    assets::{Asset, LayerEntry},
    core::PageSize,
    error::{CardpressError, CardpressResult},
    model::DimensionPolicy,
    pdf,
};

/// Resolve the output size for one combination.
///
/// `FirstLayer` and `FirstVector` read the combination itself, so mixed
/// directories can yield differently sized artifacts within one run.
pub fn resolve(entries: &[&LayerEntry], policy: &DimensionPolicy) -> CardpressResult<PageSize> {
    match policy {
        DimensionPolicy::Fixed { width, height } => PageSize::new(*width, *height),
        DimensionPolicy::FirstLayer => {
            let entry = entries.first().ok_or_else(|| {
                CardpressError::precondition("combination has no layers to take dimensions from")
            })?;
            asset_size(entry)
        }
        DimensionPolicy::FirstVector => {
            let entry = entries
                .iter()
                .find(|e| matches!(e.asset, Asset::Document(_)))
                .ok_or_else(|| {
                    CardpressError::dimension(
                        "no document layer in the combination to inherit dimensions from",
                    )
                })?;
            asset_size(entry)
        }
    }
}

fn asset_size(entry: &LayerEntry) -> CardpressResult<PageSize> {
    match &entry.asset {
        Asset::Raster(img) => PageSize::new(f64::from(img.width), f64::from(img.height)),
        Asset::Svg(svg) => {
            let size = svg.tree.size();
            PageSize::new(f64::from(size.width()), f64::from(size.height()))
        }
        Asset::Document(doc_ref) => {
            // An unreadable reference document is a composite-time decode
            // failure, not a policy failure; the driver keys fatality off
            // the error kind.
            let doc = lopdf::Document::load(&doc_ref.path).map_err(|e| {
                CardpressError::composite(format!(
                    "open document '{}': {e}",
                    doc_ref.path.display()
                ))
            })?;
            let page_id = pdf::first_page_id(&doc).ok_or_else(|| {
                CardpressError::dimension(format!(
                    "'{}' has no pages to take dimensions from",
                    doc_ref.path.display()
                ))
            })?;
            pdf::page_size(&doc, page_id)
        }
    }
}
