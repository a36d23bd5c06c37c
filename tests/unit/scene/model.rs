use super::*;

#[test]
fn keywords_parse_case_insensitively() {
    assert_eq!("Multiply".parse::<BlendMode>(), Ok(BlendMode::Multiply));
    assert_eq!("DESTOUT".parse::<BlendMode>(), Ok(BlendMode::DestOut));
    assert_eq!("BoldItalic".parse::<FontStyle>(), Ok(FontStyle::BoldItalic));
    assert_eq!("CENTER".parse::<HAlign>(), Ok(HAlign::Center));
    assert_eq!("bottom".parse::<VAlign>(), Ok(VAlign::Bottom));
}

#[test]
fn every_listed_name_round_trips() {
    for name in BlendMode::NAMES {
        let mode: BlendMode = name.parse().unwrap();
        assert_eq!(mode.name(), *name);
        assert_eq!(mode.to_string(), *name);
    }
    assert_eq!(BlendMode::NAMES.len(), 21);
}

#[test]
fn unknown_keyword_lists_alternatives() {
    let err = "diagonal".parse::<HAlign>().unwrap_err();
    assert_eq!(
        err.to_string(),
        "'diagonal' is not a valid horizontal alignment (expected one of: left, right, center)"
    );
    assert!("".parse::<FontStyle>().is_err());
}

#[test]
fn defaults_match_documented_values() {
    assert_eq!(BlendMode::default(), BlendMode::Normal);
    assert_eq!(FontStyle::default(), FontStyle::Regular);
    assert_eq!(HAlign::default(), HAlign::Left);
    assert_eq!(VAlign::default(), VAlign::Top);
    let blend = Blend::default();
    assert_eq!(blend.mode, BlendMode::Normal);
    assert_eq!(blend.fraction, 1.0);
}

#[test]
fn vector_conversions_truncate_toward_zero() {
    let v = Vector::new(10.9, -3.7);
    assert_eq!(v.to_pixel_point(), (10, -3));
    assert_eq!(v.to_point(), Point::new(f64::from(10.9f32), f64::from(-3.7f32)));
    assert_eq!(Vector::new(4.0, 2.0).to_size(), Size::new(4.0, 2.0));
}

#[test]
fn colors_unpack_as_rrggbbaa() {
    let brush = Brush { color: 0x11223344 };
    assert_eq!(
        brush.rgba(),
        Rgba8 {
            r: 0x11,
            g: 0x22,
            b: 0x33,
            a: 0x44
        }
    );
}

#[test]
fn drawable_blend_falls_back_to_normal() {
    let d = Drawable {
        pos: Vector::new(0.0, 0.0),
        ang: 0.0,
        blend: None,
        kind: DrawableKind::Image(ImageParams {
            file: "a.png".to_owned(),
            size: None,
        }),
    };
    assert_eq!(d.kind_name(), "Image");
    assert_eq!(d.effective_blend(), Blend::default());
}

#[test]
fn scene_serializes_with_tagged_drawables() {
    let scene = Scene {
        background: "@bg.png".to_owned(),
        objects: vec![Drawable {
            pos: Vector::new(1.0, 2.0),
            ang: 0.0,
            blend: Some(Blend {
                mode: BlendMode::Screen,
                fraction: 0.5,
            }),
            kind: DrawableKind::Image(ImageParams {
                file: "@logo.png".to_owned(),
                size: None,
            }),
        }],
        fonts: Vec::new(),
    };
    let json = serde_json::to_value(&scene).unwrap();
    assert_eq!(json["objects"][0]["type"], "image");
    assert_eq!(json["objects"][0]["file"], "@logo.png");
    assert_eq!(json["objects"][0]["blend"]["mode"], "screen");
}
