use std::io::Cursor;

use super::*;
use crate::scene::model::{Blend, BlendMode, Brush, Font, FontStyle, HAlign, VAlign, Vector};

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "imagegen_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_png(path: &Path, w: u32, h: u32, px: [u8; 4]) {
    let bytes = px.iter().copied().cycle().take((w * h * 4) as usize).collect();
    let img = image::RgbaImage::from_raw(w, h, bytes).unwrap();
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    std::fs::write(path, buf).unwrap();
}

fn image(file: &str, pos: (f32, f32)) -> Drawable {
    Drawable {
        pos: Vector::new(pos.0, pos.1),
        ang: 0.0,
        blend: None,
        kind: DrawableKind::Image(ImageParams {
            file: file.to_owned(),
            size: None,
        }),
    }
}

fn processor(dir: &Path) -> Processor {
    Processor::new(
        &dir.join("t.lua"),
        ProcessorOpts {
            working_dir: Some(dir.to_path_buf()),
        },
    )
    .unwrap()
}

#[test]
fn background_sets_canvas_size() {
    let dir = temp_dir("proc_bg");
    write_png(&dir.join("bg.png"), 6, 4, [10, 20, 30, 255]);

    let mut p = processor(&dir);
    let stats = p
        .process(&Scene {
            background: "@bg.png".to_owned(),
            ..Scene::default()
        })
        .unwrap();
    assert_eq!((stats.width, stats.height), (6, 4));
    assert_eq!(stats.objects_drawn, 0);
    assert_eq!(p.canvas().unwrap().pixel(5, 3), Some([10, 20, 30, 255]));
}

#[test]
fn objects_draw_in_order_at_their_positions() {
    let dir = temp_dir("proc_order");
    write_png(&dir.join("bg.png"), 8, 8, [0, 0, 0, 255]);
    write_png(&dir.join("red.png"), 4, 4, [255, 0, 0, 255]);
    write_png(&dir.join("green.png"), 2, 2, [0, 255, 0, 255]);

    let mut p = processor(&dir);
    let stats = p
        .process(&Scene {
            background: "@bg.png".to_owned(),
            objects: vec![image("@red.png", (1.0, 1.0)), image("green.png", (3.0, 3.0))],
            fonts: Vec::new(),
        })
        .unwrap();
    assert_eq!(stats.objects_drawn, 2);
    let canvas = p.canvas().unwrap();
    assert_eq!(canvas.pixel(0, 0), Some([0, 0, 0, 255]));
    assert_eq!(canvas.pixel(1, 1), Some([255, 0, 0, 255]));
    assert_eq!(canvas.pixel(3, 3), Some([0, 255, 0, 255]));
    assert_eq!(canvas.pixel(4, 4), Some([0, 255, 0, 255]));
    assert_eq!(canvas.pixel(5, 5), Some([0, 0, 0, 255]));
}

#[test]
fn resize_keeps_canvas_size() {
    let dir = temp_dir("proc_resize");
    write_png(&dir.join("bg.png"), 10, 10, [0, 0, 0, 255]);
    write_png(&dir.join("dot.png"), 1, 1, [0, 0, 255, 255]);

    let mut obj = image("@dot.png", (2.0, 2.0));
    if let DrawableKind::Image(img) = &mut obj.kind {
        img.size = Some(Vector::new(3.0, 3.0));
    }
    let mut p = processor(&dir);
    p.process(&Scene {
        background: "@bg.png".to_owned(),
        objects: vec![obj],
        fonts: Vec::new(),
    })
    .unwrap();
    let canvas = p.canvas().unwrap();
    assert_eq!((canvas.width, canvas.height), (10, 10));
    assert_eq!(canvas.pixel(4, 4), Some([0, 0, 255, 255]));
    assert_eq!(canvas.pixel(5, 5), Some([0, 0, 0, 255]));
}

#[test]
fn rotated_image_stays_centred_when_an_axis_shrinks() {
    let dir = temp_dir("proc_rotate");
    write_png(&dir.join("bg.png"), 30, 30, [0, 0, 0, 255]);
    write_png(&dir.join("bar.png"), 8, 4, [255, 0, 0, 255]);

    // 8x4 at (10, 10) is centred on (14, 12); a quarter turn makes it 4x8 around that centre.
    let mut obj = image("@bar.png", (10.0, 10.0));
    obj.ang = 90.0;
    let mut p = processor(&dir);
    p.process(&Scene {
        background: "@bg.png".to_owned(),
        objects: vec![obj],
        fonts: Vec::new(),
    })
    .unwrap();

    let canvas = p.canvas().unwrap();
    let red = |x: u32, y: u32| canvas.pixel(x, y).unwrap()[0];
    for (x, y) in [(12, 8), (15, 8), (12, 15), (15, 15), (14, 12)] {
        assert!(red(x, y) > 200, "({x}, {y}) should be covered");
    }
    for (x, y) in [(11, 12), (16, 12), (13, 7), (13, 16), (10, 10)] {
        assert!(red(x, y) < 30, "({x}, {y}) should be background");
    }
}

#[test]
fn non_positive_size_is_a_processing_error() {
    let dir = temp_dir("proc_bad_size");
    write_png(&dir.join("bg.png"), 4, 4, [0, 0, 0, 255]);
    write_png(&dir.join("dot.png"), 1, 1, [0, 0, 255, 255]);

    let mut obj = image("@dot.png", (0.0, 0.0));
    if let DrawableKind::Image(img) = &mut obj.kind {
        img.size = Some(Vector::new(0.0, 3.0));
    }
    let err = processor(&dir)
        .process(&Scene {
            background: "@bg.png".to_owned(),
            objects: vec![obj],
            fonts: Vec::new(),
        })
        .unwrap_err();
    assert!(matches!(err, ImagegenError::Processing(_)));
    assert!(err.to_string().contains("object #1 (Image)"), "{err}");
}

#[test]
fn blend_applies_to_the_object() {
    let dir = temp_dir("proc_blend");
    write_png(&dir.join("bg.png"), 2, 2, [200, 200, 200, 255]);
    write_png(&dir.join("half.png"), 2, 2, [128, 128, 128, 255]);

    let mut obj = image("@half.png", (0.0, 0.0));
    obj.blend = Some(Blend {
        mode: BlendMode::Multiply,
        fraction: 1.0,
    });
    let mut p = processor(&dir);
    p.process(&Scene {
        background: "@bg.png".to_owned(),
        objects: vec![obj],
        fonts: Vec::new(),
    })
    .unwrap();
    let px = p.canvas().unwrap().pixel(0, 0).unwrap();
    assert!(px[0].abs_diff(100) <= 1, "{px:?}");
}

#[test]
fn missing_background_is_reported_with_context() {
    let dir = temp_dir("proc_missing_bg");
    let err = processor(&dir)
        .process(&Scene {
            background: "@nope.png".to_owned(),
            ..Scene::default()
        })
        .unwrap_err();
    assert!(matches!(err, ImagegenError::Processing(_)));
    let msg = err.to_string();
    assert!(msg.contains("background") && msg.contains("nope.png"), "{msg}");
}

#[test]
fn later_failure_keeps_earlier_pixels_but_errors() {
    let dir = temp_dir("proc_partial");
    write_png(&dir.join("bg.png"), 4, 4, [0, 0, 0, 255]);
    write_png(&dir.join("red.png"), 1, 1, [255, 0, 0, 255]);

    let mut p = processor(&dir);
    let err = p
        .process(&Scene {
            background: "@bg.png".to_owned(),
            objects: vec![image("@red.png", (0.0, 0.0)), image("@gone.png", (1.0, 1.0))],
            fonts: Vec::new(),
        })
        .unwrap_err();
    assert!(err.to_string().contains("object #2 (Image)"), "{err}");
    assert_eq!(p.canvas().unwrap().pixel(0, 0), Some([255, 0, 0, 255]));
}

#[test]
fn bad_font_files_are_counted_not_fatal() {
    let dir = temp_dir("proc_fonts");
    write_png(&dir.join("bg.png"), 2, 2, [0, 0, 0, 255]);
    std::fs::write(dir.join("broken.ttf"), b"nope").unwrap();

    let stats = processor(&dir)
        .process(&Scene {
            background: "@bg.png".to_owned(),
            objects: Vec::new(),
            fonts: vec!["@broken.ttf".to_owned(), "@absent.ttf".to_owned()],
        })
        .unwrap();
    assert_eq!(stats.fonts_failed, 2);
    assert_eq!(stats.fonts_installed, 0);
}

#[test]
fn unknown_font_family_fails_the_label() {
    let dir = temp_dir("proc_unknown_font");
    write_png(&dir.join("bg.png"), 2, 2, [0, 0, 0, 255]);

    let label = Drawable {
        pos: Vector::new(0.0, 0.0),
        ang: 0.0,
        blend: None,
        kind: DrawableKind::Label(LabelParams {
            text: "hi".to_owned(),
            font: Font {
                name: "No Such Family 1234".to_owned(),
                size: 12.0,
                style: FontStyle::Regular,
            },
            brush: Some(Brush { color: 0xFFFFFFFF }),
            pen: None,
            wrap: 0.0,
            halign: HAlign::Left,
            valign: VAlign::Top,
        }),
    };
    let err = processor(&dir)
        .process(&Scene {
            background: "@bg.png".to_owned(),
            objects: vec![label],
            fonts: Vec::new(),
        })
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("object #1 (Label)"), "{msg}");
    assert!(msg.contains("Font family 'No Such Family 1234' not found"), "{msg}");
}

#[test]
fn saved_png_round_trips_through_the_decoder() {
    let dir = temp_dir("proc_save");
    write_png(&dir.join("bg.png"), 3, 2, [1, 2, 3, 255]);

    let mut p = processor(&dir);
    p.process(&Scene {
        background: "@bg.png".to_owned(),
        ..Scene::default()
    })
    .unwrap();
    let out = dir.join("out.png");
    p.save_png(&out).unwrap();

    let decoded = image::open(&out).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (3, 2));
    assert_eq!(decoded.get_pixel(2, 1).0, [1, 2, 3, 255]);
}

#[test]
fn saving_before_processing_fails() {
    let dir = temp_dir("proc_nothing");
    let err = processor(&dir).save_png(&dir.join("x.png")).unwrap_err();
    assert!(matches!(err, ImagegenError::Processing(_)));
}

#[test]
fn unwritable_output_is_an_io_error() {
    let dir = temp_dir("proc_unwritable");
    write_png(&dir.join("bg.png"), 1, 1, [0, 0, 0, 255]);
    let mut p = processor(&dir);
    p.process(&Scene {
        background: "@bg.png".to_owned(),
        ..Scene::default()
    })
    .unwrap();
    let err = p
        .save_png(&dir.join("no_such_dir").join("out.png"))
        .unwrap_err();
    assert!(matches!(err, ImagegenError::Io { .. }), "{err:?}");
}
