mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use common::RampDecoder;
use iv::config::Preferences;
use iv::{ChannelView, Command, ImageAdjustment, IvImage, Viewer};

fn viewer_with(decoder: &Arc<RampDecoder>, background: bool) -> Viewer {
    let prefs = Preferences {
        background_decode: background,
        ..Preferences::default()
    };
    Viewer::new(decoder.clone(), prefs)
}

fn paths(names: &[&str]) -> Vec<PathBuf> {
    names.iter().map(PathBuf::from).collect()
}

fn current_name(viewer: &Viewer) -> String {
    viewer.current().map(IvImage::name).unwrap_or_default()
}

#[test]
fn test_navigation_wraps_over_three_images() {
    let names = ["one.png", "two.png", "three.png"];
    let decoder = Arc::new(RampDecoder::with_files(&names, 4, 4));
    let mut viewer = viewer_with(&decoder, false);
    viewer.apply(Command::Open(paths(&names)));

    viewer.apply(Command::PrevImage);
    assert_eq!(current_name(&viewer), "three.png");
    viewer.apply(Command::NextImage);
    assert_eq!(current_name(&viewer), "one.png");
    viewer.apply(Command::NextImage);
    viewer.apply(Command::NextImage);
    viewer.apply(Command::NextImage);
    assert_eq!(current_name(&viewer), "one.png");
}

#[test]
fn test_toggle_reuses_resident_pixels() {
    let names = ["a.png", "b.png"];
    let decoder = Arc::new(RampDecoder::with_files(&names, 8, 8));
    let mut viewer = viewer_with(&decoder, false);

    viewer.apply(Command::Open(paths(&names)));
    viewer.apply(Command::NextImage);
    assert_eq!(decoder.read_calls(), 2);

    for _ in 0..4 {
        viewer.apply(Command::ToggleImage);
    }
    assert_eq!(decoder.read_calls(), 2);
    assert_eq!(current_name(&viewer), "b.png");
}

#[test]
fn test_background_decode_reaches_current_image() {
    let decoder = Arc::new(RampDecoder::with_files(&["bg.png"], 32, 16));
    let mut viewer = viewer_with(&decoder, true);

    viewer.apply(Command::Open(paths(&["bg.png"])));
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while viewer.pending_decodes() > 0 && std::time::Instant::now() < deadline {
        viewer.wait_for_decodes(Duration::from_millis(50));
    }

    assert_eq!(viewer.pending_decodes(), 0);
    assert!(viewer.current().is_some_and(IvImage::pixels_valid));
    assert_eq!(decoder.read_calls(), 1);
}

#[test]
fn test_subimage_steps_stop_at_the_ends() {
    let decoder = Arc::new(RampDecoder::new());
    decoder.add("stack.tif", &[(4, 4), (2, 2)]);
    let mut viewer = viewer_with(&decoder, false);
    viewer.apply(Command::Open(paths(&["stack.tif"])));

    assert!(!viewer.apply(Command::PrevSubimage));
    assert!(viewer.apply(Command::NextSubimage));
    let image = viewer.current().unwrap();
    assert_eq!(image.subimage(), 1);
    assert_eq!(image.spec().map(|s| s.width), Some(2));
    assert!(!viewer.apply(Command::NextSubimage));
}

#[test]
fn test_title_reflects_channel_and_adjustments() {
    let decoder = Arc::new(RampDecoder::with_files(&["t.png"], 4, 4));
    let mut viewer = viewer_with(&decoder, false);
    assert_eq!(viewer.title(), "iv");

    viewer.apply(Command::Open(paths(&["t.png"])));
    viewer.apply(Command::SetChannel(ChannelView::Red));
    viewer.apply(Command::Adjust(ImageAdjustment::AdjustExposure(1.0)));

    let title = viewer.title();
    assert!(title.contains(" | Red"), "{}", title);
    assert!(title.contains("exp +1.00 gamma 1.00"), "{}", title);

    viewer.apply(Command::Adjust(ImageAdjustment::ResetAdjustments));
    assert!(!viewer.title().contains("exp "));
}
