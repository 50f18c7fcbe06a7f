use std::collections::BTreeMap;
use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

use crate::{
    assets::RasterImage,
    core::{PageSize, Rect},
    error::{CardpressError, CardpressResult},
};

const MAX_PARENT_DEPTH: usize = 32;
const MAX_REF_DEPTH: usize = 8;

pub fn load_document(path: &Path) -> CardpressResult<Document> {
    Document::load(path).map_err(|e| {
        CardpressError::composite(format!("open document '{}': {e}", path.display()))
    })
}

/// Create a document with one empty page of the given size.
///
/// The page starts with an inline empty resource dictionary and no content
/// stream; callers register XObjects and set the content afterwards.
pub fn single_page_doc(size: PageSize) -> (Document, ObjectId) {
    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => media_box_array(size),
        "Resources" => Dictionary::new(),
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    (doc, page_id)
}

fn media_box_array(size: PageSize) -> Vec<Object> {
    vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Real(size.width as f32),
        Object::Real(size.height as f32),
    ]
}

pub fn first_page_id(doc: &Document) -> Option<ObjectId> {
    doc.get_pages().into_iter().next().map(|(_, id)| id)
}

/// Follow reference chains to the pointed-to object.
pub fn resolve<'a>(doc: &'a Document, mut obj: &'a Object) -> &'a Object {
    for _ in 0..MAX_REF_DEPTH {
        match obj {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(inner) => obj = inner,
                Err(_) => return obj,
            },
            _ => return obj,
        }
    }
    obj
}

/// Look up a page attribute, walking `Parent` links for inheritable keys.
pub fn inherited_page_attr<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut id = page_id;
    for _ in 0..MAX_PARENT_DEPTH {
        let dict = doc.get_dictionary(id).ok()?;
        if let Ok(obj) = dict.get(key) {
            return Some(obj);
        }
        id = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

pub fn page_media_box(doc: &Document, page_id: ObjectId) -> CardpressResult<Rect> {
    let obj = inherited_page_attr(doc, page_id, b"MediaBox")
        .ok_or_else(|| CardpressError::dimension("page has no MediaBox"))?;
    let arr = resolve(doc, obj)
        .as_array()
        .map_err(|_| CardpressError::dimension("MediaBox is not an array"))?;
    if arr.len() != 4 {
        return Err(CardpressError::dimension(format!(
            "MediaBox has {} elements, expected 4",
            arr.len()
        )));
    }

    let mut v = [0.0f64; 4];
    for (slot, obj) in v.iter_mut().zip(arr.iter()) {
        *slot = number(resolve(doc, obj))
            .ok_or_else(|| CardpressError::dimension("MediaBox element is not a number"))?;
    }

    Ok(Rect::new(
        v[0].min(v[2]),
        v[1].min(v[3]),
        v[0].max(v[2]),
        v[1].max(v[3]),
    ))
}

/// Size of a page taken from its (possibly inherited) MediaBox.
pub fn page_size(doc: &Document, page_id: ObjectId) -> CardpressResult<PageSize> {
    let media = page_media_box(doc, page_id)?;
    PageSize::new(media.width(), media.height())
}

/// Embed straight-alpha RGBA8 pixels as an image XObject.
///
/// Color lands as a DeviceRGB stream; a DeviceGray SMask carries the alpha
/// channel and is omitted when the image is fully opaque.
pub fn embed_raster(doc: &mut Document, img: &RasterImage) -> CardpressResult<ObjectId> {
    let px = img.width as usize * img.height as usize;
    if img.rgba8.len() != px * 4 {
        return Err(CardpressError::composite(format!(
            "raster buffer is {} bytes, expected {} for {}x{}",
            img.rgba8.len(),
            px * 4,
            img.width,
            img.height
        )));
    }

    let mut rgb = Vec::with_capacity(px * 3);
    let mut alpha = Vec::with_capacity(px);
    let mut opaque = true;
    for p in img.rgba8.chunks_exact(4) {
        rgb.extend_from_slice(&p[..3]);
        alpha.push(p[3]);
        opaque &= p[3] == 255;
    }

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => img.width as i64,
        "Height" => img.height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };

    if !opaque {
        let smask = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => img.width as i64,
            "Height" => img.height as i64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        };
        let smask_id = doc.add_object(Object::Stream(Stream::new(smask, alpha)));
        dict.set("SMask", Object::Reference(smask_id));
    }

    Ok(doc.add_object(Object::Stream(Stream::new(dict, rgb))))
}

/// Graft a page of `src` into `dest` as a Form XObject.
///
/// The page's content streams become the form content; its resource
/// dictionary is imported object-by-object with all references remapped to
/// fresh ids in `dest`. The returned form normalizes the page's MediaBox
/// origin to (0, 0) via its Matrix, so callers scale against the BBox size
/// and translate to the target corner.
pub fn import_form_xobject(
    dest: &mut Document,
    src: &Document,
    src_page_id: ObjectId,
) -> CardpressResult<ObjectId> {
    let media = page_media_box(src, src_page_id)?;
    let content = src.get_page_content(src_page_id).map_err(|e| {
        CardpressError::composite(format!("read page content for grafting: {e}"))
    })?;

    let resources = inherited_page_attr(src, src_page_id, b"Resources")
        .cloned()
        .unwrap_or_else(|| Object::Dictionary(Dictionary::new()));
    let mut id_map = BTreeMap::new();
    let imported_resources = import_object(dest, src, &resources, &mut id_map);

    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Form",
        "BBox" => vec![
            Object::Real(media.x0 as f32),
            Object::Real(media.y0 as f32),
            Object::Real(media.x1 as f32),
            Object::Real(media.y1 as f32),
        ],
        "Matrix" => vec![
            Object::Integer(1),
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(1),
            Object::Real(-media.x0 as f32),
            Object::Real(-media.y0 as f32),
        ],
        "Resources" => imported_resources,
    };

    Ok(dest.add_object(Object::Stream(Stream::new(dict, content))))
}

/// Deep-copy an object graph from `src` into `dest`.
///
/// References are remapped through `id_map`; the mapping is recorded before
/// the referenced object is imported, which breaks reference cycles.
fn import_object(
    dest: &mut Document,
    src: &Document,
    obj: &Object,
    id_map: &mut BTreeMap<ObjectId, ObjectId>,
) -> Object {
    match obj {
        Object::Reference(id) => {
            if let Some(mapped) = id_map.get(id) {
                return Object::Reference(*mapped);
            }
            let new_id = dest.new_object_id();
            id_map.insert(*id, new_id);
            let imported = match src.get_object(*id) {
                Ok(inner) => import_object(dest, src, inner, id_map),
                Err(_) => Object::Null,
            };
            dest.objects.insert(new_id, imported);
            Object::Reference(new_id)
        }
        Object::Dictionary(dict) => Object::Dictionary(import_dictionary(dest, src, dict, id_map)),
        Object::Array(items) => Object::Array(
            items
                .iter()
                .map(|item| import_object(dest, src, item, id_map))
                .collect(),
        ),
        Object::Stream(stream) => {
            let dict = import_dictionary(dest, src, &stream.dict, id_map);
            Object::Stream(Stream::new(dict, stream.content.clone()))
        }
        other => other.clone(),
    }
}

fn import_dictionary(
    dest: &mut Document,
    src: &Document,
    dict: &Dictionary,
    id_map: &mut BTreeMap<ObjectId, ObjectId>,
) -> Dictionary {
    let mut out = Dictionary::new();
    for (key, value) in dict.iter() {
        out.set(key.clone(), import_object(dest, src, value, id_map));
    }
    out
}

/// Register an XObject under `name` in the page's resource dictionary.
pub fn register_xobject(
    doc: &mut Document,
    page_id: ObjectId,
    name: &str,
    xobj_id: ObjectId,
) -> CardpressResult<()> {
    let page = doc
        .get_dictionary(page_id)
        .map_err(|e| CardpressError::composite(format!("page dictionary: {e}")))?;

    let mut resources = match page.get(b"Resources").map(|obj| resolve(doc, obj)) {
        Ok(Object::Dictionary(d)) => d.clone(),
        _ => Dictionary::new(),
    };
    let mut xobjects = match resources.get(b"XObject") {
        Ok(Object::Dictionary(d)) => d.clone(),
        _ => Dictionary::new(),
    };
    xobjects.set(name, Object::Reference(xobj_id));
    resources.set("XObject", Object::Dictionary(xobjects));

    let page = doc
        .get_object_mut(page_id)
        .and_then(|obj| obj.as_dict_mut())
        .map_err(|e| CardpressError::composite(format!("page dictionary: {e}")))?;
    page.set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// `q cm /name Do Q`, mapping the image unit square onto `rect`.
pub fn draw_image_ops(name: &str, rect: Rect) -> Vec<Operation> {
    draw_ops(name, rect.width(), rect.height(), rect.x0, rect.y0)
}

/// `q cm /name Do Q`, scaling a form's BBox onto `rect`.
pub fn draw_form_ops(name: &str, bbox: Rect, rect: Rect) -> Vec<Operation> {
    let sx = rect.width() / bbox.width();
    let sy = rect.height() / bbox.height();
    draw_ops(name, sx, sy, rect.x0, rect.y0)
}

fn draw_ops(name: &str, sx: f64, sy: f64, tx: f64, ty: f64) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                Object::Real(sx as f32),
                Object::Real(0.0),
                Object::Real(0.0),
                Object::Real(sy as f32),
                Object::Real(tx as f32),
                Object::Real(ty as f32),
            ],
        ),
        Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
    ]
}

pub fn set_page_content(
    doc: &mut Document,
    page_id: ObjectId,
    operations: Vec<Operation>,
) -> CardpressResult<()> {
    let content = Content { operations };
    let bytes = content
        .encode()
        .map_err(|e| CardpressError::composite(format!("encode content stream: {e}")))?;
    let content_id = doc.add_object(Object::Stream(Stream::new(Dictionary::new(), bytes)));

    let page = doc
        .get_object_mut(page_id)
        .and_then(|obj| obj.as_dict_mut())
        .map_err(|e| CardpressError::composite(format!("page dictionary: {e}")))?;
    page.set("Contents", Object::Reference(content_id));
    Ok(())
}

/// Deflate eligible streams and write the document.
pub fn save_compact(doc: &mut Document, path: &Path) -> CardpressResult<()> {
    doc.compress();
    doc.save(path)
        .map_err(|e| CardpressError::composite(format!("write pdf '{}': {e}", path.display())))?;
    Ok(())
}
