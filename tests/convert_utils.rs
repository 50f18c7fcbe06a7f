use std::path::{Path, PathBuf};

use cardpress::PageSize;
use lopdf::content::Operation;

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "cardpress_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

fn write_png(path: &Path, width: u32, height: u32, rgba: [u8; 4]) {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    img.save(path).unwrap();
}

fn write_content_pdf(path: &Path, width: f64, height: f64) {
    let size = PageSize::new(width, height).unwrap();
    let (mut doc, page_id) = cardpress::pdf::single_page_doc(size);
    let ops = vec![
        Operation::new(
            "re",
            vec![0_i64.into(), 0_i64.into(), 20_i64.into(), 20_i64.into()],
        ),
        Operation::new("f", vec![]),
    ];
    cardpress::pdf::set_page_content(&mut doc, page_id, ops).unwrap();
    cardpress::pdf::save_compact(&mut doc, path).unwrap();
}

fn page_size_of(path: &Path) -> PageSize {
    let doc = lopdf::Document::load(path).unwrap();
    let page_id = cardpress::pdf::first_page_id(&doc).unwrap();
    cardpress::pdf::page_size(&doc, page_id).unwrap()
}

#[test]
fn convert_pngs_writes_template_sized_pdfs() {
    let tmp = temp_dir("convert_pngs");
    let src = tmp.join("src");
    let out = tmp.join("out");
    std::fs::create_dir_all(&src).unwrap();

    write_png(&src.join("a.png"), 3, 2, [255, 0, 0, 255]);
    write_png(&src.join("b.png"), 3, 2, [0, 255, 0, 255]);
    std::fs::write(src.join("readme.txt"), b"ignored").unwrap();

    let template = tmp.join("template.pdf");
    write_content_pdf(&template, 180.0, 252.0);

    let written = cardpress::convert::convert_pngs(&src, &template, &out).unwrap();
    assert_eq!(written.len(), 2);
    assert!(out.join("a.pdf").exists());
    assert!(out.join("b.pdf").exists());

    let size = page_size_of(&out.join("a.pdf"));
    assert!((size.width - 180.0).abs() < 0.01);
    assert!((size.height - 252.0).abs() < 0.01);

    // The page draws the PNG as an image XObject.
    let doc = lopdf::Document::load(out.join("a.pdf")).unwrap();
    let page_id = cardpress::pdf::first_page_id(&doc).unwrap();
    let page = doc.get_dictionary(page_id).unwrap();
    let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
    let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
    assert!(xobjects.get(b"Im0").is_ok());

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn blank_copies_mirror_names_and_page_sizes() {
    let tmp = temp_dir("blank_copies");
    let src = tmp.join("src");
    let out = tmp.join("out");
    std::fs::create_dir_all(&src).unwrap();

    write_content_pdf(&src.join("card.pdf"), 100.0, 140.0);
    write_content_pdf(&src.join("tall.pdf"), 90.0, 200.0);

    let written = cardpress::convert::blank_copies(&src, &out).unwrap();
    assert_eq!(written.len(), 2);

    let size = page_size_of(&out.join("card.pdf"));
    assert!((size.width - 100.0).abs() < 0.01);
    assert!((size.height - 140.0).abs() < 0.01);

    let doc = lopdf::Document::load(out.join("tall.pdf")).unwrap();
    assert!(cardpress::blank::document_is_blank(&doc).unwrap());

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn convert_requires_an_existing_source_directory() {
    let tmp = temp_dir("convert_missing_src");
    let template = tmp.join("template.pdf");
    std::fs::create_dir_all(&tmp).unwrap();
    write_content_pdf(&template, 50.0, 50.0);

    let err = cardpress::convert::convert_pngs(&tmp.join("nope"), &template, &tmp.join("out"))
        .err()
        .unwrap();
    assert!(err.to_string().starts_with("invalid location:"), "{err}");

    std::fs::remove_dir_all(&tmp).ok();
}
