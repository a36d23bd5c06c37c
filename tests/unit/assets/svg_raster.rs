use super::*;

fn tree(svg: &str) -> usvg::Tree {
    usvg::Tree::from_data(svg.as_bytes(), &usvg::Options::default()).unwrap()
}

const SQUARE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="8" height="4">
    <rect width="8" height="4" fill="#ff0000"/></svg>"##;

#[test]
fn intrinsic_size_is_used_without_target() {
    assert_eq!(svg_raster_size(&tree(SQUARE), None).unwrap(), (8, 4));
}

#[test]
fn target_size_overrides_and_is_bounded() {
    let t = tree(SQUARE);
    assert_eq!(svg_raster_size(&t, Some((16, 16))).unwrap(), (16, 16));
    assert!(svg_raster_size(&t, Some((0, 16))).is_err());
    assert!(svg_raster_size(&t, Some((MAX_DIM + 1, 1))).is_err());
}

#[test]
fn rasterized_output_is_premultiplied_and_filled() {
    let t = tree(SQUARE);
    let px = rasterize_svg_to_premul_rgba8(&t, 4, 2).unwrap();
    assert_eq!(px.len(), 4 * 2 * 4);
    assert_eq!(&px[..4], &[255, 0, 0, 255]);
}
