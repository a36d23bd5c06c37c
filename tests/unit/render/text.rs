use super::*;
use crate::scene::model::{Brush, Font, Pen};

const DEJAVU: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

/// Registry with DejaVu Sans installed, or `None` when the font is not on this machine.
fn registry_with_dejavu() -> Option<FontRegistry> {
    if !Path::new(DEJAVU).exists() {
        eprintln!("skipping: {DEJAVU} not available");
        return None;
    }
    let mut reg = FontRegistry::new();
    reg.install_file(Path::new(DEJAVU)).unwrap();
    Some(reg)
}

fn label(text: &str) -> LabelParams {
    LabelParams {
        text: text.to_owned(),
        font: Font {
            name: "DejaVu Sans".to_owned(),
            size: 24.0,
            style: FontStyle::Regular,
        },
        brush: Some(Brush { color: 0xFF0000FF }),
        pen: None,
        wrap: 0.0,
        halign: HAlign::Left,
        valign: VAlign::Top,
    }
}

fn has_ink(bitmap: &Bitmap) -> bool {
    bitmap.rgba8_premul.chunks_exact(4).any(|px| px[3] > 0)
}

#[test]
fn garbage_bytes_are_not_a_font() {
    let mut reg = FontRegistry::new();
    assert!(reg.install_bytes(b"not a font".to_vec()).is_err());
    assert_eq!(reg.installed_families().count(), 0);
}

#[test]
fn missing_font_file_is_reported() {
    let mut reg = FontRegistry::new();
    let err = reg
        .install_file(Path::new("/definitely/missing/font.ttf"))
        .unwrap_err();
    assert!(err.to_string().contains("font.ttf"), "{err}");
}

#[test]
fn unknown_family_is_a_processing_error() {
    let mut reg = FontRegistry::new();
    let err = reg.resolve_family("No Such Family 1234").unwrap_err();
    assert!(matches!(err, ImagegenError::Processing(_)));
    assert!(
        err.to_string()
            .contains("Font family 'No Such Family 1234' not found"),
        "{err}"
    );
}

#[test]
fn unknown_family_fails_even_without_paint() {
    let mut reg = FontRegistry::new();
    let mut lbl = label("hi");
    lbl.font.name = "No Such Family 1234".to_owned();
    lbl.brush = None;
    assert!(reg.render_label(&lbl, Point::ZERO, 0.0).is_err());
}

#[test]
fn installed_family_resolves_case_insensitively() {
    let Some(mut reg) = registry_with_dejavu() else {
        return;
    };
    assert!(reg.installed_families().any(|f| f == "DejaVu Sans"));
    assert_eq!(reg.resolve_family("dejavu sans").unwrap(), "DejaVu Sans");
}

#[test]
fn filled_label_produces_ink_near_its_anchor() {
    let Some(mut reg) = registry_with_dejavu() else {
        return;
    };
    let layer = reg
        .render_label(&label("Hello"), Point::new(40.0, 30.0), 0.0)
        .unwrap()
        .unwrap();
    assert!(has_ink(&layer.bitmap));
    assert!(layer.origin.0 <= 40 && layer.origin.0 >= 30, "{:?}", layer.origin);
    assert!(layer.origin.1 <= 30 && layer.origin.1 >= 20, "{:?}", layer.origin);
}

#[test]
fn unpainted_label_draws_nothing() {
    let Some(mut reg) = registry_with_dejavu() else {
        return;
    };
    let mut lbl = label("Hello");
    lbl.brush = None;
    assert!(reg.render_label(&lbl, Point::ZERO, 0.0).unwrap().is_none());
}

#[test]
fn stroked_label_produces_ink() {
    let Some(mut reg) = registry_with_dejavu() else {
        return;
    };
    let mut lbl = label("Hi");
    lbl.brush = None;
    lbl.pen = Some(Pen {
        color: 0x000000FF,
        width: 2.0,
    });
    let layer = reg
        .render_label(&lbl, Point::new(10.0, 10.0), 0.0)
        .unwrap()
        .unwrap();
    assert!(has_ink(&layer.bitmap));
}

#[test]
fn alignment_moves_the_block_relative_to_the_anchor() {
    let Some(mut reg) = registry_with_dejavu() else {
        return;
    };
    let anchor = Point::new(200.0, 200.0);
    let left = reg.render_label(&label("Wide text"), anchor, 0.0).unwrap().unwrap();

    let mut centered = label("Wide text");
    centered.halign = HAlign::Center;
    centered.valign = VAlign::Bottom;
    let centered = reg.render_label(&centered, anchor, 0.0).unwrap().unwrap();

    assert!(centered.origin.0 < left.origin.0);
    assert!(centered.origin.1 < left.origin.1);
    assert!(centered.origin.1 + centered.bitmap.height as i32 <= 205);
}

#[test]
fn rotated_label_layer_swaps_aspect() {
    let Some(mut reg) = registry_with_dejavu() else {
        return;
    };
    let flat = reg
        .render_label(&label("Rotate me"), Point::new(100.0, 100.0), 0.0)
        .unwrap()
        .unwrap();
    let turned = reg
        .render_label(&label("Rotate me"), Point::new(100.0, 100.0), 90.0)
        .unwrap()
        .unwrap();
    assert!(flat.bitmap.width > flat.bitmap.height);
    assert!(turned.bitmap.height > turned.bitmap.width);
}

#[test]
fn zero_size_font_is_rejected_at_layout() {
    let Some(mut reg) = registry_with_dejavu() else {
        return;
    };
    let mut lbl = label("x");
    lbl.font.size = 0.0;
    assert!(reg.render_label(&lbl, Point::ZERO, 0.0).is_err());
}
