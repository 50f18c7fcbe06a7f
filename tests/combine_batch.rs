use std::path::{Path, PathBuf};

use cardpress::{
    BatchSession, DimensionPolicy, FitPolicy, LayerSource, Mode, OutputFormat, PageSize, RunConfig,
};
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

// Surfaces the driver's skip/failure warnings under --nocapture.
fn init_logs() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
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
            vec![10_i64.into(), 10_i64.into(), 40_i64.into(), 20_i64.into()],
        ),
        Operation::new("f", vec![]),
    ];
    cardpress::pdf::set_page_content(&mut doc, page_id, ops).unwrap();
    cardpress::pdf::save_compact(&mut doc, path).unwrap();
}

fn write_blank_pdf(path: &Path, width: f64, height: f64) {
    let size = PageSize::new(width, height).unwrap();
    let (mut doc, _page_id) = cardpress::pdf::single_page_doc(size);
    cardpress::pdf::save_compact(&mut doc, path).unwrap();
}

fn pdf_config(layers: Vec<PathBuf>, out_dir: PathBuf) -> RunConfig {
    RunConfig {
        mode: Mode::Combine,
        layers: layers
            .into_iter()
            .map(|location| LayerSource {
                location,
                replicate: 1,
            })
            .collect(),
        out_dir,
        format: OutputFormat::Pdf,
        dimensions: DimensionPolicy::FirstLayer,
        fit: FitPolicy::Stretch,
        opacity_boost: None,
    }
}

fn xobject_names(doc: &lopdf::Document, page_id: lopdf::ObjectId) -> Vec<String> {
    let page = doc.get_dictionary(page_id).unwrap();
    let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
    match resources.get(b"XObject") {
        Ok(xobjects) => xobjects
            .as_dict()
            .unwrap()
            .iter()
            .map(|(key, _)| String::from_utf8_lossy(key).to_string())
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[test]
fn two_by_two_product_counts_every_artifact() {
    let tmp = temp_dir("combine_two_by_two");
    let bgs = tmp.join("bgs");
    let players = tmp.join("players");
    let out = tmp.join("out");
    std::fs::create_dir_all(&bgs).unwrap();
    std::fs::create_dir_all(&players).unwrap();

    write_png(&bgs.join("bg1.png"), 200, 150, [200, 30, 30, 255]);
    write_png(&bgs.join("bg2.png"), 200, 150, [30, 30, 200, 255]);
    write_content_pdf(&players.join("p1.pdf"), 200.0, 150.0);
    write_blank_pdf(&players.join("p2.pdf"), 200.0, 150.0);

    let config = pdf_config(vec![bgs, players], out.clone());
    let session = BatchSession::new(&config).unwrap();
    assert_eq!(session.total(), 4);

    let report = session.run().unwrap();
    assert_eq!(report.produced.len(), 4);
    assert!(report.failed.is_empty());
    assert!(report.skipped_sources.is_empty());

    for name in ["bg1_p1_1.pdf", "bg1_p2_2.pdf", "bg2_p1_3.pdf", "bg2_p2_4.pdf"] {
        assert!(out.join(name).exists(), "missing artifact {name}");
    }

    // First layer sets the page size: image pixels become points one-to-one.
    let doc = lopdf::Document::load(out.join("bg1_p1_1.pdf")).unwrap();
    let page_id = cardpress::pdf::first_page_id(&doc).unwrap();
    let size = cardpress::pdf::page_size(&doc, page_id).unwrap();
    assert!((size.width - 200.0).abs() < 0.01);
    assert!((size.height - 150.0).abs() < 0.01);

    // Non-blank overlay lands as a form on top of the background image.
    let names = xobject_names(&doc, page_id);
    assert!(names.contains(&"Im0".to_string()), "got {names:?}");
    assert!(names.contains(&"Fm1".to_string()), "got {names:?}");

    // Blank overlay contributes nothing; only the background remains.
    let doc = lopdf::Document::load(out.join("bg1_p2_2.pdf")).unwrap();
    let page_id = cardpress::pdf::first_page_id(&doc).unwrap();
    let names = xobject_names(&doc, page_id);
    assert_eq!(names, vec!["Im0".to_string()]);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn rerunning_a_batch_reproduces_the_same_names() {
    let tmp = temp_dir("combine_rerun");
    let bgs = tmp.join("bgs");
    let players = tmp.join("players");
    let out = tmp.join("out");
    std::fs::create_dir_all(&bgs).unwrap();
    std::fs::create_dir_all(&players).unwrap();

    write_png(&bgs.join("bg1.png"), 40, 30, [200, 30, 30, 255]);
    write_png(&bgs.join("bg2.png"), 40, 30, [30, 30, 200, 255]);
    write_png(&players.join("p1.png"), 40, 30, [10, 200, 10, 255]);
    write_png(&players.join("p2.png"), 40, 30, [200, 200, 10, 255]);

    let listing = |dir: &Path| -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    };

    let config = pdf_config(vec![bgs, players], out.clone());
    let first = BatchSession::new(&config).unwrap().run().unwrap();
    let produced: Vec<String> = first
        .produced
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(
        produced,
        ["bg1_p1_1.pdf", "bg1_p2_2.pdf", "bg2_p1_3.pdf", "bg2_p2_4.pdf"]
    );
    let first_listing = listing(&out);

    // A second pass over the populated directory assigns the same counters
    // to the same tuples and overwrites in place, adding nothing.
    let second = BatchSession::new(&config).unwrap().run().unwrap();
    assert_eq!(second.produced, first.produced);
    assert!(second.failed.is_empty());
    assert_eq!(listing(&out), first_listing);
    assert_eq!(first_listing.len(), 4);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn page_size_follows_each_combination_first_asset() {
    let tmp = temp_dir("combine_per_combination_size");
    let bgs = tmp.join("bgs");
    let overlays = tmp.join("overlays");
    let out = tmp.join("out");
    std::fs::create_dir_all(&bgs).unwrap();
    std::fs::create_dir_all(&overlays).unwrap();

    write_png(&bgs.join("big.png"), 300, 200, [255, 255, 255, 255]);
    write_png(&bgs.join("small.png"), 100, 80, [255, 255, 255, 255]);
    write_content_pdf(&overlays.join("frame.pdf"), 120.0, 90.0);

    let config = pdf_config(vec![bgs, overlays], out.clone());
    let report = BatchSession::new(&config).unwrap().run().unwrap();
    assert_eq!(report.produced.len(), 2);

    let doc = lopdf::Document::load(out.join("big_frame_1.pdf")).unwrap();
    let page_id = cardpress::pdf::first_page_id(&doc).unwrap();
    let size = cardpress::pdf::page_size(&doc, page_id).unwrap();
    assert!((size.width - 300.0).abs() < 0.01);

    let doc = lopdf::Document::load(out.join("small_frame_2.pdf")).unwrap();
    let page_id = cardpress::pdf::first_page_id(&doc).unwrap();
    let size = cardpress::pdf::page_size(&doc, page_id).unwrap();
    assert!((size.width - 100.0).abs() < 0.01);
    assert!((size.height - 80.0).abs() < 0.01);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn composite_failure_consumes_its_counter_and_continues() {
    init_logs();
    let tmp = temp_dir("combine_failure_continues");
    let bgs = tmp.join("bgs");
    let overlays = tmp.join("overlays");
    let out = tmp.join("out");
    std::fs::create_dir_all(&bgs).unwrap();
    std::fs::create_dir_all(&overlays).unwrap();

    write_png(&bgs.join("bg.png"), 100, 100, [10, 20, 30, 255]);
    // Documents are opened lazily, so a broken one only fails at composite
    // time and must not take the rest of the run down with it.
    std::fs::write(overlays.join("bad.pdf"), b"not a pdf").unwrap();
    write_content_pdf(&overlays.join("good.pdf"), 100.0, 100.0);

    let config = pdf_config(vec![bgs, overlays], out.clone());
    let session = BatchSession::new(&config).unwrap();
    assert_eq!(session.total(), 2);

    let report = session.run().unwrap();
    assert_eq!(report.produced.len(), 1);
    assert_eq!(report.failed.len(), 1);

    assert_eq!(report.failed[0].counter, 1);
    assert_eq!(report.failed[0].file_name, "bg_bad_1.pdf");
    assert!(!out.join("bg_bad_1.pdf").exists());

    // The failed slot keeps its number; the survivor is still number 2.
    assert!(out.join("bg_good_2.pdf").exists());

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn corrupt_dimension_reference_fails_only_its_combination() {
    init_logs();
    let tmp = temp_dir("combine_corrupt_reference");
    let bases = tmp.join("bases");
    let out = tmp.join("out");
    std::fs::create_dir_all(&bases).unwrap();

    // Under FirstLayer the bottom document is the dimension reference; a
    // corrupt one costs its own combination, not the run.
    write_content_pdf(&bases.join("a_good.pdf"), 100.0, 140.0);
    std::fs::write(bases.join("z_corrupt.pdf"), b"not a pdf").unwrap();
    let frame = tmp.join("frame.pdf");
    write_content_pdf(&frame, 100.0, 140.0);

    let config = pdf_config(vec![bases, frame], out.clone());
    let session = BatchSession::new(&config).unwrap();
    assert_eq!(session.total(), 2);

    let report = session.run().unwrap();
    assert_eq!(report.produced.len(), 1);
    assert_eq!(report.failed.len(), 1);

    assert!(out.join("a_good_frame_1.pdf").exists());
    assert_eq!(report.failed[0].counter, 2);
    assert_eq!(report.failed[0].file_name, "z_corrupt_frame_2.pdf");
    assert!(report.failed[0].reason.contains("open document"), "{}", report.failed[0].reason);
    assert!(!out.join("z_corrupt_frame_2.pdf").exists());

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn unreadable_directory_entries_are_skipped_with_note() {
    init_logs();
    let tmp = temp_dir("combine_scan_skips");
    let bgs = tmp.join("bgs");
    let overlays = tmp.join("overlays");
    let out = tmp.join("out");
    std::fs::create_dir_all(&bgs).unwrap();
    std::fs::create_dir_all(&overlays).unwrap();

    write_png(&bgs.join("good.png"), 64, 64, [1, 2, 3, 255]);
    std::fs::write(bgs.join("broken.png"), b"junk").unwrap();
    std::fs::write(bgs.join("notes.txt"), b"not an asset").unwrap();
    write_content_pdf(&overlays.join("frame.pdf"), 64.0, 64.0);

    let config = pdf_config(vec![bgs, overlays], out);
    let session = BatchSession::new(&config).unwrap();
    assert_eq!(session.total(), 1);

    let skipped = &session.report().skipped_sources;
    assert_eq!(skipped.len(), 1);
    assert!(skipped[0].path.ends_with("broken.png"));

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn missing_layer_location_is_invalid() {
    let tmp = temp_dir("combine_missing_location");
    let out = tmp.join("out");

    let config = pdf_config(vec![tmp.join("nowhere"), tmp.join("also_nowhere")], out);
    let err = BatchSession::new(&config).err().unwrap();
    assert!(err.to_string().starts_with("invalid location:"), "{err}");

    std::fs::remove_dir_all(&tmp).ok();
}
