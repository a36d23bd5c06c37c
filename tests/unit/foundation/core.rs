use super::*;

#[test]
fn packed_colors_are_rrggbbaa() {
    let c = Rgba8::from_packed(0x11223344);
    assert_eq!(
        c,
        Rgba8 {
            r: 0x11,
            g: 0x22,
            b: 0x33,
            a: 0x44
        }
    );
    assert_eq!(c.to_packed(), 0x11223344);
}

#[test]
fn clamp_packed_color_saturates_and_truncates() {
    assert_eq!(clamp_packed_color(-5.0), 0);
    assert_eq!(clamp_packed_color(1e12), u32::MAX);
    assert_eq!(clamp_packed_color(255.9), 255);
    assert_eq!(clamp_packed_color(f64::NAN), 0);
}

#[test]
fn clamping_is_idempotent() {
    for v in [-1.0, 0.0, 12.5, 4_294_967_295.0, 9e15, f64::INFINITY] {
        let once = clamp_packed_color(v);
        assert_eq!(clamp_packed_color(f64::from(once)), once);
    }
}
